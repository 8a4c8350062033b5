//! The per-file pipeline and the sequential batch loop.
//!
//! [`Batch`] owns the run state of one batch: the frozen options, the
//! [`RunRecord`] being written, the narrative log and the rejection
//! statistics accumulated so far. Files are processed strictly one after
//! another; every per-file error is caught at the loop boundary, logged,
//! recorded and turned into a [`FileOutcome`] so one broken recording never
//! takes the batch down. The record and log are flushed after every file and
//! before any error is surfaced.
//!
//! Stage order per file:
//!
//! 1. read raw, apply the batch-wide upfront channel drops (asked once, on
//!    the first file)
//! 2. filter a 0.5–45 Hz working copy and let the operator review bad
//!    channels on it; then the skip decision
//! 3. optionally fit the artifact decomposition on a 1–45 Hz copy with bads
//!    still marked, and collect the exclusion set
//! 4. build the output signal: interpolate bads, broadband-filter when
//!    decomposition or projection runs, remove excluded components,
//!    average-reference
//! 5. optionally project to source space on a copy with the former bad
//!    channels dropped
//! 6. resample to the working rate, then apply the operator's integer
//!    downsample factor
//! 7. segment, select epochs (operator, replay or automatic), and export the
//!    one selected index set across every configured band at sensor level
//!    (and source level when projection ran)
use std::fs;
use std::path::{Path, PathBuf};

use crate::band::FrequencyBand;
use crate::buffer::SignalBuffer;
use crate::config::{BatchOptions, SelectionMode};
use crate::decompose::Decomposition;
use crate::epoch::{auto_select, segment, RejectionStats, MIN_EPOCHS_FOR_EXPORT};
use crate::error::{PipelineError, Result};
use crate::export::{self, ExportLevel};
use crate::filter::apply_band;
use crate::io::RawReader;
use crate::operator::Operator;
use crate::project::{project, SpatialFilterBuilder};
use crate::record::{FileDecisions, RunRecord};
use crate::reference::average_reference;
use crate::repair::{drop_channels, interpolate_bad, mark_bad};
use crate::resample::{downsample, resample, working_rate};
use crate::runlog::BatchLog;
use crate::select::{apply_selection, validate_selection, SelectionSource};

/// Band shown to the operator for bad-channel review, also the broadband
/// pre-filter of the output when decomposition or projection runs.
const REVIEW_LOW_HZ: f64 = 0.5;
const REVIEW_HIGH_HZ: f64 = 45.0;

/// Band the artifact decomposition is fit on. Slow drifts hurt the fit, so
/// the low edge sits above the review band's.
const FIT_LOW_HZ: f64 = 1.0;
const FIT_HIGH_HZ: f64 = 45.0;

/// Name of the per-batch rejection-statistics table, written to the output
/// root when automatic selection ran for at least one file.
pub const REJECTION_STATS_FILE: &str = "epoch_rejection_statistics.txt";

/// How one file's processing ended. Skips are routine outcomes, not errors.
#[derive(Debug)]
pub enum FileOutcome {
    /// Exports written, decisions recorded.
    Completed,
    /// Operator skipped the file after channel review, or automatic
    /// selection left too few epochs to export. Decisions still recorded.
    Skipped,
    /// A per-file error; the batch continues with the next file.
    Failed(PipelineError),
}

/// Counts returned by [`Batch::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One running batch: options, record, log, and the collaborators.
pub struct Batch<'a> {
    options: BatchOptions,
    record: RunRecord,
    record_path: PathBuf,
    log: BatchLog,
    reader: &'a dyn RawReader,
    operator: &'a mut dyn Operator,
    spatial_builder: Option<&'a dyn SpatialFilterBuilder>,
    stats_rows: Vec<(String, RejectionStats)>,
    /// Whether the upfront channel-drop set has been decided (asked on the
    /// first file of a fresh batch, pre-decided on replay).
    drops_decided: bool,
    replaying: bool,
}

impl<'a> Batch<'a> {
    /// Start a fresh batch: creates the output root and the timestamped
    /// record and log files (`<prefix>_<timestamp>.{json,log}`).
    pub fn new(
        options: BatchOptions,
        reader: &'a dyn RawReader,
        operator: &'a mut dyn Operator,
        spatial_builder: Option<&'a dyn SpatialFilterBuilder>,
    ) -> Result<Self> {
        let record = RunRecord::start_batch(options.clone());
        Self::with_record(options, record, reader, operator, spatial_builder, false)
    }

    /// Resume from a persisted record: options come from the record, the
    /// upfront drop list is taken as already decided, and epoch selections
    /// are labelled as replayed. Pair this with a
    /// [`crate::operator::ReplayOperator`] over the same record to re-run a
    /// batch without prompting.
    pub fn resume(
        record: RunRecord,
        reader: &'a dyn RawReader,
        operator: &'a mut dyn Operator,
        spatial_builder: Option<&'a dyn SpatialFilterBuilder>,
    ) -> Result<Self> {
        let options = record.options.clone();
        Self::with_record(options, record, reader, operator, spatial_builder, true)
    }

    fn with_record(
        options: BatchOptions,
        record: RunRecord,
        reader: &'a dyn RawReader,
        operator: &'a mut dyn Operator,
        spatial_builder: Option<&'a dyn SpatialFilterBuilder>,
        replaying: bool,
    ) -> Result<Self> {
        // Batch-level failure: nothing to flush yet, surface immediately.
        fs::create_dir_all(&options.output_root)?;
        let record_path = options.output_root.join(format!("{}.json", record.batch_id));
        let log = BatchLog::open(&options.output_root.join(format!("{}.log", record.batch_id)))?;
        Ok(Self {
            options,
            record,
            record_path,
            log,
            reader,
            operator,
            spatial_builder,
            stats_rows: Vec::new(),
            drops_decided: replaying,
            replaying,
        })
    }

    /// The record as accumulated so far.
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Where the record JSON is persisted.
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Process every file in order. Per-file failures are absorbed into the
    /// summary; only batch-level failures (statistics table, final record
    /// flush) propagate, and the record is flushed first even then.
    pub fn run(&mut self, paths: &[PathBuf]) -> Result<BatchSummary> {
        self.log.write(&format!(
            "batch {} started, {} file(s)",
            self.record.batch_id,
            paths.len()
        ))?;

        let mut summary = BatchSummary::default();
        for path in paths {
            match self.process_file(path) {
                FileOutcome::Completed => summary.completed += 1,
                FileOutcome::Skipped => summary.skipped += 1,
                FileOutcome::Failed(err) => {
                    summary.failed += 1;
                    log::error!("{}: {err}", path.display());
                }
            }
        }

        if !self.stats_rows.is_empty() {
            let stats_path = self.options.output_root.join(REJECTION_STATS_FILE);
            if let Err(err) = export::write_rejection_stats(&stats_path, &self.stats_rows) {
                self.flush();
                return Err(err);
            }
        }

        self.record.persist(&self.record_path)?;
        self.log.write(&format!(
            "batch {} finished: {} completed, {} skipped, {} failed",
            self.record.batch_id, summary.completed, summary.skipped, summary.failed
        ))?;
        Ok(summary)
    }

    /// Process one file, catching every per-file error at this boundary.
    /// The record and log are flushed whichever way the file ends.
    pub fn process_file(&mut self, path: &Path) -> FileOutcome {
        let file_id = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                return FileOutcome::Failed(PipelineError::config(format!(
                    "input path '{}' has no usable file name",
                    path.display()
                )))
            }
        };
        let _ = self.log.write(&format!("processing {file_id}"));

        let outcome = match self.run_file(path, &file_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = self.log.write(&format!("{file_id} failed: {err}"));
                FileOutcome::Failed(err)
            }
        };
        self.flush();
        outcome
    }

    /// Best-effort record flush; failures go to the log facade rather than
    /// masking the outcome already in hand.
    fn flush(&mut self) {
        if let Err(err) = self.record.persist(&self.record_path) {
            log::error!("failed to persist run record: {err}");
        }
    }

    // ── the per-file pipeline ──

    fn run_file(&mut self, path: &Path, file_id: &str) -> Result<FileOutcome> {
        let out_dir = self
            .options
            .output_root
            .join(export::output_subdir_name(file_id));
        fs::create_dir_all(&out_dir)?;

        let raw = self.reader.read(path)?;

        if !self.drops_decided {
            let drops = self.operator.channels_to_drop(&raw.channel_names)?;
            self.record.channels_dropped_upfront = drops;
            self.drops_decided = true;
        }
        let raw = drop_channels(&raw, &self.record.channels_dropped_upfront)?;

        // Bad-channel review happens on a filtered working copy; drifts and
        // line noise would otherwise dominate what the operator sees.
        let review_band = FrequencyBand::band(REVIEW_LOW_HZ, REVIEW_HIGH_HZ)?;
        let working = apply_band(&raw, &review_band)?;
        let bad = self.operator.review_bad_channels(file_id, &working)?;
        // Validates the names against the current channel set, which is how
        // a stale replayed bad-channel list surfaces.
        mark_bad(&working, &bad)?;

        let mut decisions = FileDecisions {
            bad_channels: bad.clone(),
            ..FileDecisions::default()
        };

        if self.operator.skip_file(file_id)? {
            decisions.skipped = true;
            self.record.record_file_decision(file_id, decisions);
            self.log
                .write(&format!("{file_id} skipped after channel review"))?;
            return Ok(FileOutcome::Skipped);
        }

        let decomposition = if self.options.apply_ica {
            let fit_band = FrequencyBand::band(FIT_LOW_HZ, FIT_HIGH_HZ)?;
            let narrow = mark_bad(&apply_band(&raw, &fit_band)?, &bad)?;
            let fitted = Decomposition::fit(&narrow, self.options.n_components)?;
            let excluded = self.operator.excluded_components(file_id, &fitted)?;
            decisions.excluded_components = excluded.clone();
            self.log.write(&format!(
                "{file_id}: {} of {} components excluded",
                excluded.len(),
                fitted.n_components()
            ))?;
            Some((fitted, excluded))
        } else {
            None
        };

        // The output signal: fit happened on the narrow copy, exclusions are
        // applied to this broader one.
        let mut output = interpolate_bad(&mark_bad(&raw, &bad)?)?;
        if self.options.apply_ica || self.options.apply_beamformer {
            output = apply_band(&output, &review_band)?;
        }
        if let Some((fitted, excluded)) = &decomposition {
            output = fitted.apply(&output, excluded)?;
        }
        if self.options.apply_average_ref || self.options.apply_beamformer {
            output = average_reference(&output);
        }

        let source = if self.options.apply_beamformer {
            let builder = self.spatial_builder.ok_or_else(|| {
                PipelineError::config(
                    "spatial projection enabled but no spatial-filter builder supplied",
                )
            })?;
            // Former bad channels are synthetic estimates by now; the
            // projector gets only originally clean sensors.
            let sensor = drop_channels(&output, &bad)?;
            let filter = builder.build_filter(&sensor)?;
            Some(project(&sensor, &filter)?)
        } else {
            None
        };

        // The beamformer path stays at the native rate (the projection
        // weights are built for it); otherwise the signal drops to the
        // working rate before segmentation.
        let mut output = if self.options.apply_beamformer {
            output
        } else {
            resample(&output, working_rate(output.sample_rate))?
        };
        output = downsample(&output, self.options.downsample_factor)?;
        let source = match source {
            Some(src) => Some(downsample(&src, self.options.downsample_factor)?),
            None => None,
        };

        if self.options.apply_epoch_selection {
            let epochs = segment(&output, self.options.epoch_length_secs)?;
            // On replay the recorded indices are read verbatim, whatever
            // mode produced them originally; nothing is recomputed.
            let (selected, origin) = if self.replaying {
                let sel = self.operator.review_epochs(file_id, &epochs)?;
                (sel, SelectionSource::Replayed)
            } else {
                match self.options.selection_mode {
                    SelectionMode::Auto => {
                        let (sel, stats) = auto_select(&epochs);
                        self.stats_rows.push((file_id.to_string(), stats));
                        (sel, SelectionSource::Auto)
                    }
                    SelectionMode::Operator => {
                        let sel = self.operator.review_epochs(file_id, &epochs)?;
                        (sel, SelectionSource::Fresh)
                    }
                }
            };
            validate_selection(&selected, epochs.len())?;
            self.log.write(&format!(
                "{file_id}: {} of {} epochs kept ({})",
                selected.len(),
                epochs.len(),
                origin_label(origin)
            ))?;

            if origin == SelectionSource::Auto && selected.len() < MIN_EPOCHS_FOR_EXPORT {
                decisions.selected_epochs = Some(selected);
                self.record.record_file_decision(file_id, decisions);
                self.log.write(&format!(
                    "{file_id}: fewer than {MIN_EPOCHS_FOR_EXPORT} epochs survive \
                     auto-rejection, nothing exported"
                ))?;
                return Ok(FileOutcome::Skipped);
            }
            decisions.selected_epochs = Some(selected);
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_id);
        self.export_all(&out_dir, stem, &output, source.as_ref(), &decisions)?;

        self.record.record_file_decision(file_id, decisions);
        self.log.write(&format!("{file_id} complete"))?;
        Ok(FileOutcome::Completed)
    }

    /// The one selected index set applied to every band and level variant,
    /// so epoch *n* is the identical time window across all exports.
    fn export_all(
        &self,
        out_dir: &Path,
        stem: &str,
        output: &SignalBuffer,
        source: Option<&SignalBuffer>,
        decisions: &FileDecisions,
    ) -> Result<()> {
        for band_name in &self.options.bands {
            let band = FrequencyBand::named(band_name)?;
            let sensor_band = apply_band(output, &band)?;
            match &decisions.selected_epochs {
                Some(selected) => {
                    let epochs = segment(&sensor_band, self.options.epoch_length_secs)?;
                    let picked = apply_selection(&epochs, selected)?;
                    export::export_epochs(
                        out_dir,
                        stem,
                        ExportLevel::Sensor,
                        band_name,
                        &picked,
                        &sensor_band.channel_names,
                    )?;
                }
                None => {
                    export::export_signal(out_dir, stem, ExportLevel::Sensor, band_name, &sensor_band)?;
                }
            }

            if let Some(src) = source {
                let source_band = apply_band(src, &band)?;
                match &decisions.selected_epochs {
                    Some(selected) => {
                        let epochs = segment(&source_band, self.options.epoch_length_secs)?;
                        let picked = apply_selection(&epochs, selected)?;
                        export::export_epochs(
                            out_dir,
                            stem,
                            ExportLevel::Source,
                            band_name,
                            &picked,
                            &source_band.channel_names,
                        )?;
                    }
                    None => {
                        export::export_signal(
                            out_dir,
                            stem,
                            ExportLevel::Source,
                            band_name,
                            &source_band,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn origin_label(origin: SelectionSource) -> &'static str {
    match origin {
        SelectionSource::Fresh => "operator",
        SelectionSource::Replayed => "replayed",
        SelectionSource::Auto => "auto",
    }
}
