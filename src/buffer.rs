//! The in-memory signal type flowing through the pipeline.
//!
//! A [`SignalBuffer`] is a `[C, T]` matrix of amplitudes in volts plus the
//! metadata every stage needs: sample rate, channel names, optional 3-D
//! electrode positions and the current bad-channel set. Stages never mutate a
//! buffer they received; each returns a new one.
use std::collections::BTreeSet;

use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// A multichannel recording: `samples` is `[channels, samples]`.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    pub samples: Array2<f64>,
    /// Sampling rate in Hz, strictly positive.
    pub sample_rate: f64,
    /// One unique name per row of `samples`.
    pub channel_names: Vec<String>,
    /// 3-D electrode positions (metres), parallel to `channel_names`.
    /// Needed only for interpolation and spatial projection.
    pub channel_positions: Option<Vec<[f64; 3]>>,
    /// Channels currently flagged as unreliable. Always a subset of
    /// `channel_names`; rows are kept in `samples` until interpolated
    /// or dropped.
    pub bad_channels: BTreeSet<String>,
}

impl SignalBuffer {
    /// Build a buffer, checking the structural invariants:
    /// row count == name count, unique names, positive sample rate.
    pub fn new(samples: Array2<f64>, sample_rate: f64, channel_names: Vec<String>) -> Result<Self> {
        if sample_rate <= 0.0 {
            return Err(PipelineError::config(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if samples.nrows() != channel_names.len() {
            return Err(PipelineError::config(format!(
                "{} sample rows but {} channel names",
                samples.nrows(),
                channel_names.len()
            )));
        }
        let unique: BTreeSet<&String> = channel_names.iter().collect();
        if unique.len() != channel_names.len() {
            return Err(PipelineError::config("duplicate channel names"));
        }
        Ok(Self {
            samples,
            sample_rate,
            channel_names,
            channel_positions: None,
            bad_channels: BTreeSet::new(),
        })
    }

    /// Attach electrode positions (one `[x, y, z]` per channel).
    pub fn with_positions(mut self, positions: Vec<[f64; 3]>) -> Result<Self> {
        if positions.len() != self.channel_names.len() {
            return Err(PipelineError::config(format!(
                "{} positions for {} channels",
                positions.len(),
                self.channel_names.len()
            )));
        }
        self.channel_positions = Some(positions);
        Ok(self)
    }

    pub fn n_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.ncols()
    }

    /// Row index of a channel by name.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channel_names.iter().position(|n| n == name)
    }

    /// Channels not currently flagged bad, in row order.
    pub fn good_channels(&self) -> Vec<String> {
        self.channel_names
            .iter()
            .filter(|n| !self.bad_channels.contains(*n))
            .cloned()
            .collect()
    }

    /// Row indices of the good channels, in row order.
    pub fn good_indices(&self) -> Vec<usize> {
        self.channel_names
            .iter()
            .enumerate()
            .filter(|(_, n)| !self.bad_channels.contains(*n))
            .map(|(i, _)| i)
            .collect()
    }

    /// Check that every name in `set` is a known channel.
    pub(crate) fn check_channels_known(&self, set: &BTreeSet<String>) -> Result<()> {
        for name in set {
            if self.channel_index(name).is_none() {
                return Err(PipelineError::validation(format!(
                    "channel '{name}' not present in current channel set"
                )));
            }
        }
        Ok(())
    }
}
