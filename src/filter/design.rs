//! Windowed-sinc FIR design for band, highpass and lowpass filters.
//!
//! For an edge at `f` Hz with transition width `tb` (see
//! [`crate::band::compute_transition`]):
//!   • the -6 dB point sits at the transition midpoint,
//!   • filter length N = ceil(3.3 / min_tb * sfreq), rounded to odd
//!     (odd N is required for a zero-phase linear-phase FIR).
//! Band-pass kernels are the difference of two unit-DC-gain lowpass kernels.
use std::f64::consts::PI;

use crate::band::FrequencyBand;
use crate::error::{PipelineError, Result};

/// Number of FIR taps for a transition bandwidth at a given sample rate.
/// Returns an odd integer.
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design the FIR kernel for `band` at sample rate `sfreq`.
///
/// Returns `None` for an identity band (both cutoffs absent). The kernel
/// length is driven by the narrower of the two transition bands so both
/// edges meet their specified roll-off.
pub fn design_band(band: &FrequencyBand, sfreq: f64) -> Result<Option<Vec<f64>>> {
    if band.is_identity() {
        return Ok(None);
    }
    let nyq = sfreq / 2.0;
    if let Some(hi) = band.high_cutoff {
        if hi + band.high_transition / 2.0 >= nyq {
            return Err(PipelineError::config(format!(
                "high cutoff {hi} Hz too close to Nyquist ({nyq} Hz)"
            )));
        }
    }

    let min_tb = match (band.low_cutoff, band.high_cutoff) {
        (Some(_), Some(_)) => band.low_transition.min(band.high_transition),
        (Some(_), None) => band.low_transition,
        (None, Some(_)) => band.high_transition,
        (None, None) => unreachable!(),
    };
    let n = auto_filter_length(min_tb, sfreq);

    // -6 dB points at the transition midpoints.
    let h = match (band.low_cutoff, band.high_cutoff) {
        (None, Some(hi)) => firwin(n, hi + band.high_transition / 2.0, sfreq, true),
        (Some(lo), None) => firwin(n, lo - band.low_transition / 2.0, sfreq, false),
        (Some(lo), Some(hi)) => {
            let lp_hi = firwin(n, hi + band.high_transition / 2.0, sfreq, true);
            let lp_lo = firwin(n, lo - band.low_transition / 2.0, sfreq, true);
            lp_hi.iter().zip(&lp_lo).map(|(a, b)| a - b).collect()
        }
        (None, None) => unreachable!(),
    };
    Ok(Some(h))
}

/// Hamming-windowed sinc kernel of odd length `n`.
///
/// `pass_zero=true` gives a lowpass (unit DC gain); `false` spectrally
/// inverts it into a highpass. `cutoff_hz` is the -6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;
    let fc = cutoff_hz / nyq; // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Normalise so sum = 1 (unit DC gain for lowpass).
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        // Highpass by spectral inversion.
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::FrequencyBand;

    #[test]
    fn filter_length_is_odd() {
        for tb in [0.4_f64, 0.8, 1.3, 1.5] {
            let n = auto_filter_length(tb, 256.0);
            assert!(n % 2 == 1, "N={n} is even for tb={tb}");
        }
    }

    #[test]
    fn bandpass_kernel_is_symmetric() {
        let band = FrequencyBand::band(8.0, 13.0).unwrap();
        let h = design_band(&band, 256.0).unwrap().unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_sum_near_zero() {
        // No DC component passes a band-pass.
        let band = FrequencyBand::band(4.0, 8.0).unwrap();
        let h = design_band(&band, 256.0).unwrap().unwrap();
        let s: f64 = h.iter().sum();
        assert!(s.abs() < 1e-9, "bandpass sum = {s}");
    }

    #[test]
    fn highpass_sum_near_zero() {
        let band = FrequencyBand::new(Some(0.5), None).unwrap();
        let h = design_band(&band, 256.0).unwrap().unwrap();
        let s: f64 = h.iter().sum();
        assert!(s.abs() < 1e-9, "highpass sum = {s}");
    }

    #[test]
    fn identity_band_designs_nothing() {
        let band = FrequencyBand::new(None, None).unwrap();
        assert!(design_band(&band, 256.0).unwrap().is_none());
    }

    #[test]
    fn cutoff_beyond_nyquist_rejected() {
        let band = FrequencyBand::band(0.5, 140.0).unwrap();
        assert!(design_band(&band, 256.0).is_err());
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-12);
    }
}
