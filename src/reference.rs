//! Average reference: subtract the cross-channel mean at each time point.
//!
//! `data[c, t] -= mean(data[:, t])`
use ndarray::{Array2, Axis};

use crate::buffer::SignalBuffer;

/// Average-reference stage: returns a re-referenced copy of `buffer`.
pub fn average_reference(buffer: &SignalBuffer) -> SignalBuffer {
    let mut out = buffer.clone();
    average_reference_inplace(&mut out.samples);
    out
}

pub fn average_reference_inplace(data: &mut Array2<f64>) {
    let means = data.mean_axis(Axis(0)).unwrap(); // shape [T]
    for mut row in data.rows_mut() {
        row -= &means;
    }
}
