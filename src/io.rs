//! Raw-reader collaborator for tab-separated text recordings.
//!
//! The reader contract: given a path (and, for text tables, the batch-scope
//! sample rate, since text files do not carry one), produce a
//! [`SignalBuffer`]. Vendor binary formats plug in behind the same
//! [`RawReader`] trait; only the text-table reader lives in this crate.
//!
//! Text layout: header row of channel names, one row per sample, tab
//! separated, amplitudes in microvolts (scaled to volts on read).
use std::fs;
use std::path::Path;

use ndarray::Array2;

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// Microvolt → volt scaling applied to text-table amplitudes.
const UV_TO_V: f64 = 1e-6;

/// Produces a [`SignalBuffer`] from a file on disk.
pub trait RawReader {
    fn read(&self, path: &Path) -> Result<SignalBuffer>;
}

/// Reader for tab-separated text tables at a fixed batch-scope sample rate.
#[derive(Debug, Clone)]
pub struct TextTableReader {
    pub sample_rate: f64,
}

impl RawReader for TextTableReader {
    fn read(&self, path: &Path) -> Result<SignalBuffer> {
        read_text_table(path, self.sample_rate)
    }
}

/// Read a tab-separated recording: header of channel names, rows of
/// microvolt samples.
pub fn read_text_table(path: &Path, sample_rate: f64) -> Result<SignalBuffer> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or_else(|| {
        PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{}: empty file", path.display()),
        ))
    })?;
    let channel_names: Vec<String> = header.split('\t').map(|s| s.trim().to_string()).collect();
    let n_ch = channel_names.len();

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let values: Vec<f64> = line
            .split('\t')
            .map(|tok| {
                tok.trim().parse::<f64>().map_err(|_| {
                    PipelineError::validation(format!(
                        "{}: non-numeric value '{}' at data row {}",
                        path.display(),
                        tok.trim(),
                        lineno + 1
                    ))
                })
            })
            .collect::<Result<_>>()?;
        if values.len() != n_ch {
            return Err(PipelineError::validation(format!(
                "{}: row {} has {} values for {} channels",
                path.display(),
                lineno + 1,
                values.len(),
                n_ch
            )));
        }
        rows.push(values);
    }

    // Transpose to [C, T] and scale µV → V.
    let n_t = rows.len();
    let mut samples = Array2::<f64>::zeros((n_ch, n_t));
    for (t, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            samples[[c, t]] = v * UV_TO_V;
        }
    }

    SignalBuffer::new(samples, sample_rate, channel_names)
}
