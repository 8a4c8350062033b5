//! # eegprep — replayable EEG preprocessing batches in pure Rust
//!
//! `eegprep` cleans multichannel EEG recordings and exports them as
//! per-band, per-epoch text tables, while recording every operator decision
//! in a serializable [`RunRecord`] so the exact same batch can later be
//! replayed against the same (or re-exported) raw data without prompting
//! anyone.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.txt
//!   │
//!   ├─ io::read_text_table()      raw [C, T] volts + channel names
//!   ├─ repair::drop_channels()    batch-wide upfront exclusions
//!   ├─ filter::apply_band()       0.5–45 Hz working copy → bad-channel review
//!   ├─ repair::interpolate_bad()  position-weighted estimates for bad rows
//!   ├─ decompose::Decomposition   fit on 1–45 Hz copy, exclusions projected out
//!   ├─ project::project()         optional sensor → source matmul
//!   ├─ reference                  per-timepoint channel mean removed
//!   ├─ resample / downsample      working rate (256 or 250 Hz), then ÷ factor
//!   ├─ epoch::segment()           non-overlapping fixed-length windows
//!   ├─ selection                  operator, replayed, or mask + 5σ automatic
//!   └─ export                     <stem>_Sensor_level_<band>_Epoch_<n>.txt
//!        │
//!        └─→ RunRecord JSON + narrative log, flushed after every file
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use eegprep::{Batch, BatchOptions, ScriptedOperator, TextTableReader};
//!
//! let options = BatchOptions {
//!     output_root: PathBuf::from("out"),
//!     text_sample_rate: Some(512.0),
//!     ..BatchOptions::default()
//! };
//!
//! let reader = TextTableReader { sample_rate: 512.0 };
//! let mut operator = ScriptedOperator::default();
//! let mut batch = Batch::new(options, &reader, &mut operator, None).unwrap();
//! let summary = batch.run(&[PathBuf::from("recording.txt")]).unwrap();
//! println!("{} file(s) exported", summary.completed);
//! ```
//!
//! ## Replaying a batch
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! use eegprep::{Batch, ReplayOperator, RunRecord, TextTableReader};
//!
//! let record = RunRecord::load(Path::new("out/batch_20260829_101500.json")).unwrap();
//! let reader = TextTableReader { sample_rate: 512.0 };
//! let oracle = record.clone();
//! let mut operator = ReplayOperator::new(&oracle);
//! let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();
//! batch.run(&[PathBuf::from("recording.txt")]).unwrap();
//! ```
//!
//! Every stage is a pure function of its inputs, so a replayed batch
//! reproduces the original exports bit for bit.

pub mod band;
pub mod buffer;
pub mod config;
pub mod decompose;
pub mod epoch;
pub mod error;
pub mod export;
pub mod filter;
pub mod io;
pub mod operator;
pub mod pipeline;
pub mod project;
pub mod record;
pub mod reference;
pub mod repair;
pub mod resample;
pub mod runlog;
pub mod select;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `eegprep::Foo` without having to know the internal module layout.

// band
pub use band::{compute_transition, default_band_names, FrequencyBand};

// buffer
pub use buffer::SignalBuffer;

// config
pub use config::{BatchOptions, SelectionMode};

// decompose
pub use decompose::Decomposition;

// epoch
pub use epoch::{
    auto_select, segment, RejectionStats, DISPERSION_MULTIPLIER, MIN_EPOCHS_FOR_EXPORT,
};

// error
pub use error::{PipelineError, Result};

// export
pub use export::{export_epochs, export_signal, output_subdir_name, ExportLevel};

// filter
pub use filter::{apply_band, auto_filter_length, design_band};

// io
pub use io::{read_text_table, RawReader, TextTableReader};

// operator
pub use operator::{Operator, ReplayOperator, ScriptedOperator};

// pipeline
pub use pipeline::{Batch, BatchSummary, FileOutcome};

// project
pub use project::{project, SpatialFilter, SpatialFilterBuilder};

// record
pub use record::{FileDecisions, RunRecord};

// reference
pub use reference::average_reference;

// repair
pub use repair::{drop_channels, interpolate_bad, mark_bad};

// resample
pub use resample::{downsample, resample, working_rate};

// select
pub use select::{apply_selection, validate_selection, SelectionSource};
