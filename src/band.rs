//! Frequency bands and the transition-bandwidth rule.
//!
//! A [`FrequencyBand`] is a pair of optional cutoffs plus the FIR roll-off
//! width on each edge. Transition widths follow one fixed policy:
//! `clamp(cutoff * 0.1, 0.4, 1.5)`, further clamped to not exceed the cutoff
//! itself so the transition band never grows wider than the passband edge.
//!
//! The named band table matches the clinical defaults:
//! delta 0.5–4, theta 4–8, alpha 8–13, beta1 13–20, beta2 20–30,
//! broadband 0.5–47 Hz.
use crate::error::{PipelineError, Result};

/// Lower clamp bound for the proportional transition width (Hz).
pub const MIN_TRANSITION: f64 = 0.4;
/// Upper clamp bound for the proportional transition width (Hz).
pub const MAX_TRANSITION: f64 = 1.5;

/// Transition bandwidth for a band edge at `cutoff` Hz.
///
/// `clamp(cutoff * 0.1, 0.4, 1.5)`, then `min(.., cutoff)`.
pub fn compute_transition(cutoff: f64) -> f64 {
    let base = (cutoff * 0.1).clamp(MIN_TRANSITION, MAX_TRANSITION);
    base.min(cutoff)
}

/// A named frequency range with precomputed FIR transition widths.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBand {
    /// Lower cutoff in Hz; `None` means no highpass edge.
    pub low_cutoff: Option<f64>,
    /// Upper cutoff in Hz; `None` means no lowpass edge.
    pub high_cutoff: Option<f64>,
    /// Roll-off width at the lower edge (Hz); 0 when the edge is absent.
    pub low_transition: f64,
    /// Roll-off width at the upper edge (Hz); 0 when the edge is absent.
    pub high_transition: f64,
}

impl FrequencyBand {
    /// Build a band from optional cutoffs, deriving both transition widths.
    pub fn new(low_cutoff: Option<f64>, high_cutoff: Option<f64>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (low_cutoff, high_cutoff) {
            if lo >= hi {
                return Err(PipelineError::config(format!(
                    "band low cutoff {lo} Hz must be below high cutoff {hi} Hz"
                )));
            }
        }
        if let Some(lo) = low_cutoff {
            if lo <= 0.0 {
                return Err(PipelineError::config("low cutoff must be positive"));
            }
        }
        if let Some(hi) = high_cutoff {
            if hi <= 0.0 {
                return Err(PipelineError::config("high cutoff must be positive"));
            }
        }
        Ok(Self {
            low_cutoff,
            high_cutoff,
            low_transition: low_cutoff.map(compute_transition).unwrap_or(0.0),
            high_transition: high_cutoff.map(compute_transition).unwrap_or(0.0),
        })
    }

    /// Band-pass with both edges.
    pub fn band(low: f64, high: f64) -> Result<Self> {
        Self::new(Some(low), Some(high))
    }

    /// True when both cutoffs are absent: filtering is a no-op copy.
    pub fn is_identity(&self) -> bool {
        self.low_cutoff.is_none() && self.high_cutoff.is_none()
    }

    /// Look up a band by its conventional name.
    pub fn named(name: &str) -> Result<Self> {
        match name {
            "delta" => Self::band(0.5, 4.0),
            "theta" => Self::band(4.0, 8.0),
            "alpha" => Self::band(8.0, 13.0),
            "beta1" => Self::band(13.0, 20.0),
            "beta2" => Self::band(20.0, 30.0),
            "broadband" => Self::band(0.5, 47.0),
            "unfiltered" => Self::new(None, None),
            other => Err(PipelineError::config(format!("unknown band name '{other}'"))),
        }
    }
}

/// The default export band set, in export order.
pub fn default_band_names() -> Vec<String> {
    ["broadband", "delta", "theta", "alpha", "beta1", "beta2"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
