//! # Session Module
//!
//! In-memory state for one recording session.
//!
//! This module handles:
//! - The decoded [`Sample`] type carrying both timestamps
//! - The [`SessionBuffer`] accumulating samples between flushes
//! - The [`SessionInfo`] identity that names the output artifact
//! - Battery warning tracking (see [`battery`])

pub mod battery;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Timestamp format used in the artifact file name
const SESSION_STAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// One decoded ECG amplitude reading
///
/// Immutable once created. `device_timestamp_us` is shared by every sample
/// decoded from the same frame; `wall_clock` is stamped at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Signed ECG amplitude (microvolts)
    pub signal_value: i32,

    /// Device clock for the frame this sample arrived in, in microseconds
    pub device_timestamp_us: u64,

    /// Host wall clock at decode time
    pub wall_clock: DateTime<Local>,
}

/// Append-only sample buffer drained once per flush tick
///
/// The notification forwarder pushes from its own task while the acquisition
/// loop drains, so both operations go through one mutex: no sample can be
/// lost or duplicated across a drain boundary.
#[derive(Debug, Default)]
pub struct SessionBuffer {
    samples: Mutex<Vec<Sample>>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples in arrival order
    pub fn push<I>(&self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        self.samples
            .lock()
            .expect("sample buffer lock poisoned")
            .extend(samples);
    }

    /// Drain the buffer, leaving it empty
    ///
    /// The only way to remove samples. Atomic with respect to concurrent
    /// `push` calls.
    pub fn take_and_clear(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock().expect("sample buffer lock poisoned"))
    }

    /// Splice a drained-but-unwritten batch back in front of anything that
    /// arrived since, preserving time order for the next flush
    pub fn requeue_front(&self, mut batch: Vec<Sample>) {
        let mut samples = self.samples.lock().expect("sample buffer lock poisoned");
        batch.append(&mut samples);
        *samples = batch;
    }

    pub fn len(&self) -> usize {
        self.samples
            .lock()
            .expect("sample buffer lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity of one recording session, fixed at process start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Device identifier baked into the artifact name
    pub device_id: String,

    /// Process start time; every flush appends to the same artifact
    pub started_at: DateTime<Local>,
}

impl SessionInfo {
    /// Begin a session now
    pub fn begin(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            started_at: Local::now(),
        }
    }

    /// Path of the session's output artifact under `data_dir`
    ///
    /// Format: `<data_dir>/<YYYY_MM_DD_HH_MM_SS>_ID_<device-id>.csv`
    pub fn output_path(&self, data_dir: &Path) -> PathBuf {
        let stamp = self.started_at.format(SESSION_STAMP_FORMAT);
        data_dir.join(format!("{}_ID_{}.csv", stamp, self.device_id))
    }
}
