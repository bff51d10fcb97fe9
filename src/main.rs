//! # ECG Bridge
//!
//! Record single-lead ECG from a Polar H10 heart-rate sensor via BLE.
//!
//! This application connects to the sensor, arms the PMD ECG stream, and
//! appends decoded samples to a per-session CSV file once per second so that
//! an interrupted recording keeps everything written so far.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber;

use ecg_bridge::acquisition::AcquisitionLoop;
use ecg_bridge::config::Config;
use ecg_bridge::sensor::btle::BtleTransport;
use ecg_bridge::sensor::SensorConnection;
use ecg_bridge::session::battery::BatteryState;
use ecg_bridge::session::{SessionBuffer, SessionInfo};
use ecg_bridge::storage::CsvSink;

/// Optional configuration file; defaults apply when absent
const CONFIG_PATH: &str = "config/default.toml";

/// Capacity of the raw-notification channel between transport and decoder
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Main entry point for ECG Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (built-in defaults when no file is present)
///    - Fix the session identity and output artifact path
///
/// 2. **Session setup** (failures here are fatal: non-zero exit)
///    - Scan for and connect to the sensor at the configured address
///    - Read model number, manufacturer name, and battery level
///    - Arm the ECG stream via the PMD control point and subscribe
///
/// 3. **Acquisition**
///    - Buffer decoded samples and flush them to CSV once per interval
///    - Warn when the battery level crosses descending thresholds
///
/// 4. **Graceful Shutdown** (Ctrl+C)
///    - Finish the tick in flight, drain the buffer one final time
///    - Unsubscribe and disconnect, best effort
///
/// # Errors
///
/// Returns error if the configuration is invalid, the sensor cannot be
/// found or connected, or the streaming handshake fails.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("ECG Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH)?;

    // Fixed at process start; every flush appends to the same artifact
    let session = SessionInfo::begin(config.sensor.device_id.clone());
    let sink = CsvSink::new(session.output_path(Path::new(&config.acquisition.data_dir)));

    let transport = BtleTransport::connect(
        &config.sensor.address,
        Duration::from_secs(config.sensor.scan_timeout_secs),
    )
    .await?;
    let mut sensor = SensorConnection::new(transport);

    let device = sensor.identify().await?;
    info!("Model Number: {}", device.model);
    info!("Manufacturer Name: {}", device.manufacturer);
    info!("Battery Level: {}%", device.battery_pct);

    let (raw_tx, raw_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
    sensor.start_streaming(raw_tx).await?;

    info!("Collecting ECG data...");
    info!("Writing to {}", sink.path().display());
    info!("Press Ctrl+C to stop");

    // Interrupt sets the flag; the loop observes it at the next tick
    // boundary, after the tick's flush has completed
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, finishing current tick...");
        flag.store(true, Ordering::SeqCst);
    });

    let acquisition = AcquisitionLoop::new(
        Arc::new(SessionBuffer::new()),
        BatteryState::new(
            config.battery.warn_threshold_pct,
            config.battery.warn_step_pct,
        ),
        device.battery_pct,
        sink,
        shutdown,
        Duration::from_secs(config.acquisition.flush_interval_secs),
    );
    acquisition.run(&mut sensor, raw_rx).await;

    info!("Shutdown complete");
    Ok(())
}
