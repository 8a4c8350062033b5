//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc band/highpass/lowpass design with the
//!   clamped proportional transition bandwidths from [`crate::band`].
//! - [`apply`]: overlap-add zero-phase convolution; [`apply::apply_band`] is
//!   the pipeline stage.

pub mod apply;
pub mod design;

pub use apply::{apply_band, apply_fir_zero_phase, filter_1d};
pub use design::{auto_filter_length, design_band, firwin, hamming};
