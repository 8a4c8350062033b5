//! The operator decision oracle.
//!
//! Every point where the original workflow blocked on a human — which
//! channels to drop, which are bad, which components and epochs to exclude,
//! whether to skip a file — is a method on [`Operator`]. The pipeline calls
//! these synchronously and waits. A presentation layer implements it with
//! real prompts; [`ReplayOperator`] implements it from a persisted
//! [`RunRecord`] so replay runs never prompt; [`ScriptedOperator`] answers
//! from prepared lists and backs tests and non-interactive batch runs.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;

use crate::buffer::SignalBuffer;
use crate::decompose::Decomposition;
use crate::error::Result;
use crate::record::{FileDecisions, RunRecord};

/// Blocking request/response interface to whoever decides.
pub trait Operator {
    /// Channels to exclude from all analysis, asked once per batch with the
    /// first file's channel list.
    fn channels_to_drop(&mut self, available: &[String]) -> Result<BTreeSet<String>>;

    /// Confirm or edit the bad-channel set for one file, shown a filtered
    /// working copy of the signal.
    fn review_bad_channels(&mut self, file_id: &str, working: &SignalBuffer)
        -> Result<BTreeSet<String>>;

    /// Asked once per file after channel review: skip this file entirely?
    fn skip_file(&mut self, file_id: &str) -> Result<bool>;

    /// Component indices to exclude, shown the fitted decomposition.
    fn excluded_components(
        &mut self,
        file_id: &str,
        decomposition: &Decomposition,
    ) -> Result<BTreeSet<usize>>;

    /// Review the segmented epochs; return the retained indices, strictly
    /// increasing.
    fn review_epochs(&mut self, file_id: &str, epochs: &[Array2<f64>]) -> Result<Vec<usize>>;
}

/// Replays a previous batch: every answer comes verbatim from the record,
/// failing with `NotFoundError` for files the record never saw.
pub struct ReplayOperator<'a> {
    record: &'a RunRecord,
}

impl<'a> ReplayOperator<'a> {
    pub fn new(record: &'a RunRecord) -> Self {
        Self { record }
    }
}

impl Operator for ReplayOperator<'_> {
    fn channels_to_drop(&mut self, _available: &[String]) -> Result<BTreeSet<String>> {
        Ok(self.record.channels_dropped_upfront.clone())
    }

    fn review_bad_channels(
        &mut self,
        file_id: &str,
        _working: &SignalBuffer,
    ) -> Result<BTreeSet<String>> {
        Ok(self.record.replay(file_id)?.bad_channels.clone())
    }

    fn skip_file(&mut self, file_id: &str) -> Result<bool> {
        Ok(self.record.replay(file_id)?.skipped)
    }

    fn excluded_components(
        &mut self,
        file_id: &str,
        _decomposition: &Decomposition,
    ) -> Result<BTreeSet<usize>> {
        Ok(self.record.replay(file_id)?.excluded_components.clone())
    }

    fn review_epochs(&mut self, file_id: &str, epochs: &[Array2<f64>]) -> Result<Vec<usize>> {
        let decisions = self.record.replay(file_id)?;
        // Absent selection (recorded with selection disabled) means keep all.
        Ok(decisions
            .selected_epochs
            .clone()
            .unwrap_or_else(|| (0..epochs.len()).collect()))
    }
}

/// Answers from prepared per-file decision entries. Files without an entry
/// get the permissive defaults: nothing dropped, nothing bad, nothing
/// excluded, every epoch kept.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    pub drop_upfront: BTreeSet<String>,
    pub per_file: BTreeMap<String, FileDecisions>,
}

impl ScriptedOperator {
    pub fn new(drop_upfront: BTreeSet<String>) -> Self {
        Self { drop_upfront, per_file: BTreeMap::new() }
    }

    pub fn with_file(mut self, file_id: &str, decisions: FileDecisions) -> Self {
        self.per_file.insert(file_id.to_string(), decisions);
        self
    }
}

impl Operator for ScriptedOperator {
    fn channels_to_drop(&mut self, _available: &[String]) -> Result<BTreeSet<String>> {
        Ok(self.drop_upfront.clone())
    }

    fn review_bad_channels(
        &mut self,
        file_id: &str,
        _working: &SignalBuffer,
    ) -> Result<BTreeSet<String>> {
        Ok(self
            .per_file
            .get(file_id)
            .map(|d| d.bad_channels.clone())
            .unwrap_or_default())
    }

    fn skip_file(&mut self, file_id: &str) -> Result<bool> {
        Ok(self.per_file.get(file_id).map(|d| d.skipped).unwrap_or(false))
    }

    fn excluded_components(
        &mut self,
        file_id: &str,
        _decomposition: &Decomposition,
    ) -> Result<BTreeSet<usize>> {
        Ok(self
            .per_file
            .get(file_id)
            .map(|d| d.excluded_components.clone())
            .unwrap_or_default())
    }

    fn review_epochs(&mut self, file_id: &str, epochs: &[Array2<f64>]) -> Result<Vec<usize>> {
        Ok(self
            .per_file
            .get(file_id)
            .and_then(|d| d.selected_epochs.clone())
            .unwrap_or_else(|| (0..epochs.len()).collect()))
    }
}
