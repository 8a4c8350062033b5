//! Per-batch narrative log file.
//!
//! An append-only, human-readable account of a batch run: one timestamped
//! line per operational event, flushed on every write so partial batch
//! progress survives a crash. Lines also go to the `log` facade at info
//! level for whatever subscriber the host application installed.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::Result;

pub struct BatchLog {
    path: PathBuf,
    file: File,
}

impl BatchLog {
    /// Open (append) the log file at `path`, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one narrative line, timestamped, and flush immediately.
    pub fn write(&mut self, msg: &str) -> Result<()> {
        log::info!("{msg}");
        writeln!(self.file, "{} {msg}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        self.file.flush()?;
        Ok(())
    }
}
