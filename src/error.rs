//! Error taxonomy for the preprocessing pipeline.
//!
//! Every failure mode is one of four kinds:
//! - [`PipelineError::Configuration`] — invalid static setup (channel count
//!   too low after a drop, component count exceeding good channels, …).
//!   Fatal for the current file; the batch moves on.
//! - [`PipelineError::Validation`] — replayed decisions inconsistent with the
//!   data currently on disk (epoch index out of range, unknown bad-channel
//!   name). Surfaced explicitly, never silently clamped.
//! - [`PipelineError::NotFound`] — a replay was requested for a file that was
//!   never recorded.
//! - [`PipelineError::Io`] — read/write failures.
//!
//! An operator's "skip this file" is *not* an error; it is modelled as
//! [`crate::pipeline::FileOutcome::Skipped`].
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Shorthand for a [`PipelineError::Configuration`] with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    /// Shorthand for a [`PipelineError::Validation`] with a formatted message.
    pub fn validation(msg: impl Into<String>) -> Self {
        PipelineError::Validation(msg.into())
    }
}
