//! # Storage Module
//!
//! Append-only CSV sink for decoded samples.
//!
//! This module handles:
//! - Creating the data directory and artifact on first write
//! - Writing the header exactly once (only when the file does not exist yet)
//! - Appending rows with no persistent handle held across flushes, so
//!   external readers can consume completed rows between flushes

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{EcgBridgeError, Result};
use crate::session::Sample;

/// Two-column header written once per artifact
pub const CSV_HEADER: &str = "Time,ECG";

/// Wall-clock format of the Time column
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Append-only CSV writer bound to one artifact path
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Artifact path this sink appends to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch of samples
    ///
    /// Creates the parent directory and the file as needed; the header goes
    /// out only when the file is new. The file is opened, written, flushed,
    /// and closed within this call.
    ///
    /// # Arguments
    ///
    /// * `rows` - Samples to append, one CSV row each
    ///
    /// # Errors
    ///
    /// Returns `Persistence` on any filesystem failure. The caller decides
    /// what to do with the unwritten batch.
    pub fn append_rows(&self, rows: &[Sample]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
            }
        }

        let write_header = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.persistence_error(e))?;
        let mut writer = BufWriter::new(file);

        if write_header {
            writeln!(writer, "{}", CSV_HEADER).map_err(|e| self.persistence_error(e))?;
        }

        for row in rows {
            writeln!(
                writer,
                "{},{}",
                row.wall_clock.format(TIME_FORMAT),
                row.signal_value
            )
            .map_err(|e| self.persistence_error(e))?;
        }

        writer.flush().map_err(|e| self.persistence_error(e))?;
        Ok(())
    }

    fn persistence_error(&self, e: std::io::Error) -> EcgBridgeError {
        EcgBridgeError::Persistence(format!("{}: {}", self.path.display(), e))
    }
}
