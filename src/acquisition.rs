//! # Acquisition Loop
//!
//! Ties the sensor stream into the session buffer and the CSV sink.
//!
//! This module handles:
//! - Decoding raw notifications into buffered samples (forwarder task)
//! - The periodic flush tick that drains the buffer to disk
//! - Low-battery warnings on each tick
//! - Cooperative termination: the flag is checked only after a tick's work
//!   completes, and a final drain runs before teardown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::pmd::decoder::decode_ecg_frame;
use crate::sensor::{transport::BleTransport, SensorConnection};
use crate::session::battery::BatteryState;
use crate::session::{Sample, SessionBuffer};
use crate::storage::CsvSink;

/// Orchestrates one streaming session from armed stream to disconnect
pub struct AcquisitionLoop {
    /// Sample accumulator shared with the forwarder task
    buffer: Arc<SessionBuffer>,
    /// Low-battery warning tracker
    battery: BatteryState,
    /// Battery percentage captured at identification, fed to the monitor on
    /// every tick. The sensor is not re-read during streaming, so the
    /// warnings describe the level at session start.
    battery_level_pct: u8,
    /// Output artifact writer
    sink: CsvSink,
    /// Termination flag, set by the interrupt listener
    shutdown: Arc<AtomicBool>,
    /// Flush period
    flush_interval: Duration,
}

impl AcquisitionLoop {
    pub fn new(
        buffer: Arc<SessionBuffer>,
        battery: BatteryState,
        battery_level_pct: u8,
        sink: CsvSink,
        shutdown: Arc<AtomicBool>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            battery,
            battery_level_pct,
            sink,
            shutdown,
            flush_interval,
        }
    }

    /// Run the acquisition loop until the termination flag is observed
    ///
    /// Spawns the notification forwarder, then on each tick drains the
    /// buffer, appends the batch to the sink, and feeds the battery monitor.
    /// The flag is checked after the tick's work completes, so in-flight
    /// work always finishes. On exit, one final drain-and-flush catches
    /// samples buffered since the last tick, then the sensor is stopped and
    /// disconnected (best effort).
    ///
    /// # Arguments
    ///
    /// * `sensor` - Streaming sensor connection, torn down on exit
    /// * `notifications` - Raw payload channel handed to the transport at
    ///   subscribe time
    pub async fn run<T: BleTransport>(
        mut self,
        sensor: &mut SensorConnection<T>,
        notifications: mpsc::Receiver<Vec<u8>>,
    ) {
        let forwarder = tokio::spawn(forward_notifications(
            notifications,
            Arc::clone(&self.buffer),
        ));

        let mut ticker = interval(self.flush_interval);
        // The first tick completes immediately; consume it so the first
        // flush happens one full period after the stream is armed
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.flush_once();
            self.check_battery();

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
        }

        info!("Termination requested; draining remaining samples");
        self.flush_once();

        forwarder.abort();
        sensor.stop_streaming().await;
        sensor.disconnect().await;
    }

    /// Drain the buffer and append the batch to the sink
    ///
    /// An empty buffer skips the write entirely (no header-only churn). A
    /// failed write re-queues the drained batch at the buffer front so the
    /// next tick retries it and nothing is lost.
    fn flush_once(&mut self) {
        let batch = self.buffer.take_and_clear();
        if batch.is_empty() {
            warn!(
                "No samples buffered; skipping write to {}",
                self.sink.path().display()
            );
            return;
        }

        let count = batch.len();
        match self.sink.append_rows(&batch) {
            Ok(()) => debug!("Flushed {} samples to {}", count, self.sink.path().display()),
            Err(e) => {
                error!("Flush failed, re-queueing {} samples: {}", count, e);
                self.buffer.requeue_front(batch);
            }
        }
    }

    fn check_battery(&mut self) {
        if let Some(warning) = self.battery.observe(self.battery_level_pct) {
            warn!(
                "Battery level {}% below {}% threshold",
                warning.level_pct, warning.threshold_pct
            );
        }
    }
}

/// Decode raw notification payloads into buffered samples
///
/// Runs until the channel closes. Non-ECG and malformed frames are dropped
/// silently; every sample from one frame shares the frame's device
/// timestamp and the wall clock taken at decode time.
async fn forward_notifications(mut notifications: mpsc::Receiver<Vec<u8>>, buffer: Arc<SessionBuffer>) {
    while let Some(payload) = notifications.recv().await {
        if let Some(frame) = decode_ecg_frame(&payload) {
            let wall_clock = Local::now();
            buffer.push(frame.samples.iter().map(|&signal_value| Sample {
                signal_value,
                device_timestamp_us: frame.timestamp_us,
                wall_clock,
            }));
        }
    }
    debug!("Notification channel closed");
}
