//! Tab-separated exports: per-epoch files, whole-signal files and the batch
//! rejection-statistics table.
//!
//! File naming follows the established convention:
//! `<stem>_Sensor_level_<band>_Epoch_<n>.txt` (n starting at 1) per selected
//! epoch, or `<stem>_Sensor_level_<band>.txt` for whole-signal exports;
//! source-level files use `Source` in place of `Sensor`. Values are volts
//! scaled back to microvolts, rounded to 4 decimals, one column per good
//! channel.
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::buffer::SignalBuffer;
use crate::epoch::RejectionStats;
use crate::error::Result;

/// Decimal places in exported amplitude values.
pub const EXPORT_DECIMALS: usize = 4;

/// Volt → microvolt scaling applied on export (inverse of the reader's).
const V_TO_UV: f64 = 1e6;

/// Sensor- or source-space naming for export files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportLevel {
    Sensor,
    Source,
}

impl ExportLevel {
    fn tag(self) -> &'static str {
        match self {
            ExportLevel::Sensor => "Sensor",
            ExportLevel::Source => "Source",
        }
    }
}

/// Per-file output subdirectory name: the file name with spaces and dots
/// stripped.
pub fn output_subdir_name(file_name: &str) -> String {
    file_name.replace([' ', '.'], "")
}

/// Export one selected epoch set: one file per epoch, numbered from 1 in
/// selection order. `epochs` must already be the selected windows (the same
/// index set across every band/level variant). Returns the written paths.
pub fn export_epochs(
    dir: &Path,
    file_stem: &str,
    level: ExportLevel,
    band_name: &str,
    epochs: &[&Array2<f64>],
    channel_names: &[String],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(epochs.len());
    for (n, epoch) in epochs.iter().enumerate() {
        let name = format!(
            "{file_stem}_{}_level_{band_name}_Epoch_{}.txt",
            level.tag(),
            n + 1
        );
        let path = dir.join(name);
        fs::write(&path, format_table(epoch, channel_names))?;
        written.push(path);
    }
    Ok(written)
}

/// Export the whole signal as one table (epoch selection disabled).
pub fn export_signal(
    dir: &Path,
    file_stem: &str,
    level: ExportLevel,
    band_name: &str,
    buffer: &SignalBuffer,
) -> Result<PathBuf> {
    let name = format!("{file_stem}_{}_level_{band_name}.txt", level.tag());
    let path = dir.join(name);
    fs::write(&path, format_table(&buffer.samples, &buffer.channel_names))?;
    Ok(path)
}

/// Render `[C, T]` data as a tab-separated table: header of channel names,
/// one row per sample, microvolts at 4 decimals.
fn format_table(data: &Array2<f64>, channel_names: &[String]) -> String {
    debug_assert_eq!(data.nrows(), channel_names.len());
    let mut out = String::new();
    out.push_str(&channel_names.join("\t"));
    out.push('\n');
    for t in 0..data.ncols() {
        for c in 0..data.nrows() {
            if c > 0 {
                out.push('\t');
            }
            let _ = write!(out, "{:.*}", EXPORT_DECIMALS, data[[c, t]] * V_TO_UV);
        }
        out.push('\n');
    }
    out
}

/// Append-or-create the batch rejection-statistics table, one row per file.
pub fn write_rejection_stats(path: &Path, rows: &[(String, RejectionStats)]) -> Result<()> {
    let mut out = String::from(
        "File\tTotal Epochs\tEpochs After Mask\tEpochs After SD\t\
         Epochs Rejected (Mask) %\tEpochs Rejected (SD) %\tTotal Epochs Rejected %\n",
    );
    for (file, s) in rows {
        let _ = writeln!(
            out,
            "{file}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}",
            s.total_epochs,
            s.epochs_after_mask,
            s.epochs_after_dispersion,
            s.pct_rejected_mask,
            s.pct_rejected_dispersion,
            s.pct_rejected_total
        );
    }
    fs::write(path, out)?;
    Ok(())
}
