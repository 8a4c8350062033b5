//! Fixed-length segmentation and automatic epoch rejection.
//!
//! Segmentation is exhaustive and deterministic: an epoch's identity is its
//! ordinal index from the start of the (resampled) signal, which is what
//! makes replay by stored indices sound. Trailing samples that do not fill a
//! complete epoch are discarded.
//!
//! Automatic rejection (the non-interactive selection mode used by batch
//! runs) applies two fixed policies per file:
//!   1. mask: an epoch containing any exactly-zero sample is invalid;
//!   2. dispersion: a single global mean and σ are computed over all samples
//!      of the mask-valid epochs, and an epoch with any sample further than
//!      [`DISPERSION_MULTIPLIER`]·σ from that mean is rejected.
use ndarray::{s, Array2};

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// Global dispersion-rejection multiplier: epochs with any amplitude above
/// this many standard deviations are rejected.
pub const DISPERSION_MULTIPLIER: f64 = 5.0;

/// Files whose auto selection keeps fewer epochs than this are reported and
/// skipped at export time.
pub const MIN_EPOCHS_FOR_EXPORT: usize = 8;

/// Samples per epoch: `floor(epoch_length_secs * sample_rate)`.
pub fn epoch_samples(epoch_length_secs: f64, sample_rate: f64) -> usize {
    (epoch_length_secs * sample_rate) as usize
}

/// Split `buffer` into non-overlapping `[C, epoch_samples]` windows.
///
/// `total_epoch_count = floor(total_samples / epoch_samples)`; the remainder
/// is discarded. Fails with `ConfigurationError` when the epoch length is
/// shorter than one sample.
pub fn segment(buffer: &SignalBuffer, epoch_length_secs: f64) -> Result<Vec<Array2<f64>>> {
    let n = epoch_samples(epoch_length_secs, buffer.sample_rate);
    if n == 0 {
        return Err(PipelineError::config(format!(
            "epoch length {epoch_length_secs} s too short at {} Hz",
            buffer.sample_rate
        )));
    }
    let n_epochs = buffer.n_samples() / n;
    let mut out = Vec::with_capacity(n_epochs);
    for e in 0..n_epochs {
        let start = e * n;
        out.push(buffer.samples.slice(s![.., start..start + n]).to_owned());
    }
    Ok(out)
}

/// Per-file rejection statistics, a derived read-only view of one auto
/// selection. Percentages are `(stage_in - stage_out) / total * 100`, rounded
/// to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionStats {
    pub total_epochs: usize,
    pub epochs_after_mask: usize,
    pub epochs_after_dispersion: usize,
    pub pct_rejected_mask: f64,
    pub pct_rejected_dispersion: f64,
    pub pct_rejected_total: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fully automatic epoch selection: mask pass, then the global-σ dispersion
/// pass. Returns the selected (retained) epoch indices, strictly increasing,
/// together with the stage statistics.
pub fn auto_select(epochs: &[Array2<f64>]) -> (Vec<usize>, RejectionStats) {
    let total = epochs.len();

    let mask_valid: Vec<usize> = (0..total)
        .filter(|&i| !epochs[i].iter().any(|&v| v == 0.0))
        .collect();

    // One global dispersion estimate per file, over all samples of the
    // mask-valid epochs — never per-epoch.
    let (mean, sd) = global_mean_std(epochs, &mask_valid);

    let selected: Vec<usize> = mask_valid
        .iter()
        .copied()
        .filter(|&i| {
            epochs[i]
                .iter()
                .all(|&v| (v - mean).abs() <= DISPERSION_MULTIPLIER * sd)
        })
        .collect();

    let after_mask = mask_valid.len();
    let after_sd = selected.len();
    let stats = RejectionStats {
        total_epochs: total,
        epochs_after_mask: after_mask,
        epochs_after_dispersion: after_sd,
        pct_rejected_mask: pct(total, after_mask, total),
        pct_rejected_dispersion: pct(after_mask, after_sd, total),
        pct_rejected_total: pct(total, after_sd, total),
    };
    (selected, stats)
}

fn pct(stage_in: usize, stage_out: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2((stage_in - stage_out) as f64 / total as f64 * 100.0)
}

/// Population mean and standard deviation over all samples of the listed
/// epochs.
fn global_mean_std(epochs: &[Array2<f64>], indices: &[usize]) -> (f64, f64) {
    let mut n = 0usize;
    let mut sum = 0.0_f64;
    for &i in indices {
        for &v in epochs[i].iter() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = indices
        .iter()
        .flat_map(|&i| epochs[i].iter())
        .map(|&v| (v - mean) * (v - mean))
        .sum::<f64>()
        / n as f64;
    (mean, var.sqrt())
}
