//! Batch-level options.
//!
//! [`BatchOptions`] holds every batch-scope choice frozen at batch start:
//! which optional stages run, the epoch length, the final downsample factor
//! and the band table. It is plain data, serialized verbatim into the run
//! record so a replay sees the exact options of the original run.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::band::default_band_names;

/// How the retained-epoch set of each file is decided.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SelectionMode {
    /// The operator reviews each file's epochs interactively (or a replayed
    /// record answers in their place).
    Operator,
    /// Fully automatic mask + dispersion rejection; no interaction.
    Auto,
}

/// Options for one processing batch. All fields are `pub` so a caller can
/// use struct-update syntax:
///
/// ```
/// use eegprep::BatchOptions;
///
/// let opts = BatchOptions {
///     epoch_length_secs: 4.0,
///     apply_ica: true,
///     ..BatchOptions::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchOptions {
    /// Re-reference the output signal to the channel average.
    pub apply_average_ref: bool,

    /// Run the decomposition-based artifact removal stage. When enabled,
    /// `n_components` components are fit per file and the operator (or the
    /// record, on replay) supplies the exclusion set.
    pub apply_ica: bool,

    /// Project the output into anatomical source space. Forces average
    /// referencing, which the spatial-filter builder requires.
    pub apply_beamformer: bool,

    /// Cut the output into fixed-length epochs and run the selection step.
    /// When disabled the whole signal is exported once per band instead.
    pub apply_epoch_selection: bool,

    /// Whether epoch selection is interactive or automatic.
    pub selection_mode: SelectionMode,

    /// Epoch duration in seconds. Samples per epoch is
    /// `floor(epoch_length_secs * sample_rate)`.
    pub epoch_length_secs: f64,

    /// Operator-chosen integer divisor applied to the output sample rate as
    /// the final processing stage. `1` disables downsampling.
    pub downsample_factor: u32,

    /// Number of decomposition components to fit when `apply_ica` is set.
    /// Must stay below the good-channel count of each file.
    pub n_components: usize,

    /// Names of the bands to export, in export order
    /// (see [`crate::band::FrequencyBand::named`]).
    pub bands: Vec<String>,

    /// Sample rate for headerless text-table inputs, where the rate is not
    /// discoverable from the file and is supplied once per batch.
    pub text_sample_rate: Option<f64>,

    /// Directory receiving one output subdirectory per input file plus the
    /// record, log and statistics files.
    pub output_root: PathBuf,

    /// Prefix for the timestamped record and log file names.
    pub batch_prefix: String,
}

impl Default for BatchOptions {
    /// 8 s epochs, no optional stages, no downsampling, the full band table.
    fn default() -> Self {
        Self {
            apply_average_ref: true,
            apply_ica: false,
            apply_beamformer: false,
            apply_epoch_selection: true,
            selection_mode: SelectionMode::Operator,
            epoch_length_secs: 8.0,
            downsample_factor: 1,
            n_components: 25,
            bands: default_band_names(),
            text_sample_rate: None,
            output_root: PathBuf::from("."),
            batch_prefix: "batch".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let opts = BatchOptions::default();
        assert!(opts.apply_average_ref);
        assert!(!opts.apply_ica);
        assert_eq!(opts.downsample_factor, 1);
        assert_eq!(opts.epoch_length_secs, 8.0);
        assert!(opts.bands.contains(&"broadband".to_string()));
    }

    #[test]
    fn options_round_trip_json() {
        let opts = BatchOptions {
            apply_beamformer: true,
            bands: vec!["alpha".into()],
            ..BatchOptions::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: BatchOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
