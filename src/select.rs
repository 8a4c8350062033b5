//! Epoch selection: one decision per file, applied uniformly everywhere.
//!
//! The engine moves a file through
//! `RAW_RESAMPLED → SEGMENTED → REVIEWED → SELECTED → FINALIZED`:
//! segmentation ([`crate::epoch::segment`]) is deterministic; the review step
//! produces `selected_epoch_indices` either from the operator (fresh mode),
//! verbatim from the run record (replay mode, no prompting) or from the
//! automatic mask/dispersion pass; [`validate_selection`] guards the
//! SELECTED transition; [`apply_selection`] performs FINALIZED by picking
//! the same index set out of *every* band and level variant of the file, so
//! "epoch 7" is the identical time window across all exports.
use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// Where a file's selected index set came from. Logged alongside the
/// decision; replayed and fresh selections are otherwise indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Operator reviewed the segmented epochs interactively.
    Fresh,
    /// Indices read verbatim from a previous run's record.
    Replayed,
    /// Mask + dispersion auto-rejection, no operator involved.
    Auto,
}

/// Check a selected index set against the current segmentation.
///
/// Requires a strictly increasing sequence with every index below `total`.
/// A violation is a `ValidationError` — it legitimately happens on replay
/// when the file was re-segmented with a different epoch length or sample
/// rate than originally recorded, and must surface rather than be truncated.
pub fn validate_selection(selected: &[usize], total: usize) -> Result<()> {
    let mut prev: Option<usize> = None;
    for &idx in selected {
        if idx >= total {
            return Err(PipelineError::validation(format!(
                "selected epoch index {idx} out of range: file segments into {total} epochs"
            )));
        }
        if let Some(p) = prev {
            if idx <= p {
                return Err(PipelineError::validation(format!(
                    "selected epoch indices must be strictly increasing ({p} then {idx})"
                )));
            }
        }
        prev = Some(idx);
    }
    Ok(())
}

/// Pick the selected epochs out of one segmented variant of the file.
///
/// Validates against this variant's epoch count first, so a variant that
/// segments differently (a replay mismatch) fails loudly instead of
/// exporting misaligned windows.
pub fn apply_selection<'a>(
    epochs: &'a [Array2<f64>],
    selected: &[usize],
) -> Result<Vec<&'a Array2<f64>>> {
    validate_selection(selected, epochs.len())?;
    Ok(selected.iter().map(|&i| &epochs[i]).collect())
}
