//! The run record: every decision of a batch, serializable and replayable.
//!
//! A [`RunRecord`] captures the frozen batch options, the upfront
//! channel-drop list and one [`FileDecisions`] entry per processed file. It
//! contains plain data only — no signal buffers and no fitted decomposition
//! or spatial-filter objects; anything heavy is recomputed from the recorded
//! inputs on replay. Persisted as pretty JSON with `BTreeMap` keys so the
//! on-disk form is deterministic.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::BatchOptions;
use crate::error::{PipelineError, Result};

/// One file's recorded decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileDecisions {
    /// Channels the operator flagged as bad for this file.
    pub bad_channels: BTreeSet<String>,
    /// Decomposition component indices excluded from the output.
    pub excluded_components: BTreeSet<usize>,
    /// Epochs retained after review, strictly increasing. `None` when epoch
    /// selection was disabled for the batch.
    pub selected_epochs: Option<Vec<usize>>,
    /// True when the operator skipped the file after channel review.
    pub skipped: bool,
}

/// The serializable decision set of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub batch_id: String,
    /// Creation timestamp, `YYYYmmdd_HHMMSS` local time.
    pub created_at: String,
    /// Options frozen at batch start.
    pub options: BatchOptions,
    /// Channels excluded from all analysis, chosen once per batch.
    pub channels_dropped_upfront: BTreeSet<String>,
    /// Per-file decisions, keyed by file name.
    pub files: BTreeMap<String, FileDecisions>,
}

impl RunRecord {
    /// Begin a new record with `options` frozen.
    pub fn start_batch(options: BatchOptions) -> Self {
        let now = Local::now();
        Self {
            batch_id: format!("{}_{}", options.batch_prefix, now.format("%Y%m%d_%H%M%S")),
            created_at: now.format("%Y%m%d_%H%M%S").to_string(),
            options,
            channels_dropped_upfront: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }

    /// Append or overwrite one file's entry. Idempotent: re-recording the
    /// same `file_id` replaces the previous entry.
    pub fn record_file_decision(&mut self, file_id: &str, decisions: FileDecisions) {
        self.files.insert(file_id.to_string(), decisions);
    }

    /// Recorded decisions for `file_id`, for replay. Fails with
    /// `NotFoundError` when the file was never processed in this record.
    pub fn replay(&self, file_id: &str) -> Result<&FileDecisions> {
        self.files.get(file_id).ok_or_else(|| {
            PipelineError::NotFound(format!(
                "file '{file_id}' was never recorded in batch '{}'",
                self.batch_id
            ))
        })
    }

    /// Write the record as pretty JSON.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a previously persisted record.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decisions(bads: &[&str], epochs: &[usize]) -> FileDecisions {
        FileDecisions {
            bad_channels: bads.iter().map(|s| s.to_string()).collect(),
            excluded_components: BTreeSet::new(),
            selected_epochs: Some(epochs.to_vec()),
            skipped: false,
        }
    }

    #[test]
    fn record_overwrites_not_duplicates() {
        let mut rec = RunRecord::start_batch(BatchOptions::default());
        rec.record_file_decision("a.txt", decisions(&["Cz"], &[0, 1]));
        rec.record_file_decision("a.txt", decisions(&["Fp1"], &[2]));
        assert_eq!(rec.files.len(), 1);
        assert_eq!(rec.replay("a.txt").unwrap().selected_epochs, Some(vec![2]));
    }

    #[test]
    fn replay_unknown_file_is_not_found() {
        let rec = RunRecord::start_batch(BatchOptions::default());
        assert!(matches!(
            rec.replay("never.txt"),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");

        let mut rec = RunRecord::start_batch(BatchOptions {
            apply_ica: true,
            ..BatchOptions::default()
        });
        rec.channels_dropped_upfront.insert("HR".into());
        let mut d = decisions(&["Oz"], &[0, 2, 5]);
        d.excluded_components.insert(1);
        rec.record_file_decision("s041.txt", d);

        rec.persist(&path).unwrap();
        let back = RunRecord::load(&path).unwrap();

        assert_eq!(back.batch_id, rec.batch_id);
        assert_eq!(back.options, rec.options);
        assert_eq!(back.channels_dropped_upfront, rec.channels_dropped_upfront);
        assert_eq!(back.replay("s041.txt").unwrap(), rec.replay("s041.txt").unwrap());
    }

    #[test]
    fn persisted_form_is_plain_data() {
        // The JSON must contain decisions and options only — a quick guard
        // that nothing buffer-sized sneaks into the serialized form.
        let mut rec = RunRecord::start_batch(BatchOptions::default());
        rec.record_file_decision("f.txt", decisions(&[], &[0]));
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("selected_epochs"));
        assert!(!json.contains("samples"));
    }
}
