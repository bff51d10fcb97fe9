//! # Sensor Connection Module
//!
//! Owns the BLE link to the heart-rate sensor.
//!
//! This module handles:
//! - The session lifecycle: connect, identify, arm streaming, stop, disconnect
//! - Reading the device information characteristics
//! - The PMD control-point handshake that starts the ECG stream
//! - Best-effort teardown that never blocks shutdown

pub mod btle;
pub mod transport;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EcgBridgeError, Result};
use crate::pmd::protocol::{
    BATTERY_LEVEL_UUID, MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID, PMD_CONTROL_UUID, PMD_DATA_UUID,
    START_ECG_STREAM_COMMAND,
};
use self::transport::BleTransport;

/// Lifecycle state of the sensor link
///
/// Transitions: `Connected → Identified → Streaming → Stopping → Disconnected`.
/// The pre-connect `Disconnected` state has no value here; a
/// [`SensorConnection`] is only constructed from an already connected
/// transport, and `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link established, device not yet identified
    Connected,
    /// Device information read, ready to arm streaming
    Identified,
    /// ECG stream armed and notifications flowing
    Streaming,
    /// Teardown in progress
    Stopping,
    /// Link released; terminal
    Disconnected,
}

/// Informational characteristics read during identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Model number string (e.g. "H10")
    pub model: String,

    /// Manufacturer name string (e.g. "Polar Electro Oy")
    pub manufacturer: String,

    /// Battery level percentage at connect time (0-100)
    pub battery_pct: u8,
}

/// Sensor connection manager
///
/// Drives the lifecycle state machine over a [`BleTransport`]. Setup
/// failures (identify, arm) are fatal; teardown failures are logged and
/// swallowed so shutdown always completes.
#[derive(Debug)]
pub struct SensorConnection<T: BleTransport> {
    transport: T,
    state: LinkState,
}

impl<T: BleTransport> SensorConnection<T> {
    /// Wrap an established transport link
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: LinkState::Connected,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Read the device information characteristics
    ///
    /// Reads model number, manufacturer name, and battery level, in that
    /// order.
    ///
    /// # Returns
    ///
    /// * `Result<DeviceInfo>` - Decoded device information
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if called outside the `Connected` state or if any
    /// characteristic read fails. Fatal to the session; there is no retry.
    pub async fn identify(&mut self) -> Result<DeviceInfo> {
        self.expect_state(LinkState::Connected, "identify")?;

        let model = self.read_string(MODEL_NUMBER_UUID, "model number").await?;
        let manufacturer = self
            .read_string(MANUFACTURER_NAME_UUID, "manufacturer name")
            .await?;

        let battery = self
            .transport
            .read_characteristic(BATTERY_LEVEL_UUID)
            .await
            .map_err(|e| EcgBridgeError::Protocol(format!("Failed to read battery level: {}", e)))?;
        let battery_pct = *battery.first().ok_or_else(|| {
            EcgBridgeError::Protocol("Battery level response was empty".to_string())
        })?;

        self.state = LinkState::Identified;

        Ok(DeviceInfo {
            model,
            manufacturer,
            battery_pct,
        })
    }

    /// Arm the ECG stream
    ///
    /// Queries the PMD control point for the advertised stream capabilities,
    /// writes the fixed ECG start command, then subscribes to the data
    /// characteristic. Raw notification payloads are forwarded into `sink`.
    ///
    /// # Arguments
    ///
    /// * `sink` - Channel receiving raw frame payloads from the transport
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if called outside the `Identified` state or if the
    /// control read, command write, or subscribe fails. Fatal to the session.
    pub async fn start_streaming(&mut self, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        self.expect_state(LinkState::Identified, "start_streaming")?;

        let features = self
            .transport
            .read_characteristic(PMD_CONTROL_UUID)
            .await
            .map_err(|e| {
                EcgBridgeError::Protocol(format!("Failed to read PMD control point: {}", e))
            })?;
        debug!("PMD control point features: {:02X?}", features);

        self.transport
            .write_characteristic(PMD_CONTROL_UUID, &START_ECG_STREAM_COMMAND)
            .await
            .map_err(|e| {
                EcgBridgeError::Protocol(format!("Failed to write ECG start command: {}", e))
            })?;

        self.transport
            .subscribe(PMD_DATA_UUID, sink)
            .await
            .map_err(|e| {
                EcgBridgeError::Protocol(format!("Failed to subscribe to PMD data: {}", e))
            })?;

        self.state = LinkState::Streaming;
        info!("ECG stream armed");
        Ok(())
    }

    /// Stop the ECG stream
    ///
    /// Unsubscribes from the data characteristic. An unsubscribe failure is
    /// logged and swallowed; shutdown proceeds to disconnect regardless.
    pub async fn stop_streaming(&mut self) {
        self.state = LinkState::Stopping;
        if let Err(e) = self.transport.unsubscribe(PMD_DATA_UUID).await {
            warn!("Failed to unsubscribe from data stream: {}", e);
        }
    }

    /// Release the link; terminal
    ///
    /// A transport failure here is logged and swallowed.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", e);
        }
        self.state = LinkState::Disconnected;
        info!("Sensor disconnected");
    }

    async fn read_string(&mut self, uuid: Uuid, what: &str) -> Result<String> {
        let bytes = self
            .transport
            .read_characteristic(uuid)
            .await
            .map_err(|e| EcgBridgeError::Protocol(format!("Failed to read {}: {}", what, e)))?;
        Ok(String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .trim()
            .to_string())
    }

    fn expect_state(&self, expected: LinkState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(EcgBridgeError::Protocol(format!(
                "{} requires the {:?} state, link is {:?}",
                operation, expected, self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::transport::mocks::MockTransport;
    use std::io;

    fn identified_mock() -> MockTransport {
        let mock = MockTransport::new();
        mock.set_read(MODEL_NUMBER_UUID, b"H10".to_vec());
        mock.set_read(MANUFACTURER_NAME_UUID, b"Polar Electro Oy".to_vec());
        mock.set_read(BATTERY_LEVEL_UUID, vec![87]);
        mock.set_read(PMD_CONTROL_UUID, vec![0x0F, 0x00]);
        mock
    }

    #[tokio::test]
    async fn test_identify_reads_device_info() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock.clone());
        assert_eq!(sensor.state(), LinkState::Connected);

        let info = sensor.identify().await.unwrap();
        assert_eq!(info.model, "H10");
        assert_eq!(info.manufacturer, "Polar Electro Oy");
        assert_eq!(info.battery_pct, 87);
        assert_eq!(sensor.state(), LinkState::Identified);

        // Model, manufacturer, battery in that order
        let calls = mock.get_calls();
        assert_eq!(calls[0], format!("read {}", MODEL_NUMBER_UUID));
        assert_eq!(calls[1], format!("read {}", MANUFACTURER_NAME_UUID));
        assert_eq!(calls[2], format!("read {}", BATTERY_LEVEL_UUID));
    }

    #[tokio::test]
    async fn test_identify_read_failure_is_protocol_error() {
        let mock = MockTransport::new();
        mock.set_read_error(io::ErrorKind::TimedOut);
        let mut sensor = SensorConnection::new(mock);

        let result = sensor.identify().await;
        assert!(matches!(result, Err(EcgBridgeError::Protocol(_))));
        // State unchanged on failure
        assert_eq!(sensor.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn test_identify_twice_is_protocol_error() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock);
        sensor.identify().await.unwrap();

        let result = sensor.identify().await;
        assert!(matches!(result, Err(EcgBridgeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_start_streaming_before_identify_is_protocol_error() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock);

        let (tx, _rx) = mpsc::channel(8);
        let result = sensor.start_streaming(tx).await;
        assert!(matches!(result, Err(EcgBridgeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_start_streaming_handshake_order() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock.clone());
        sensor.identify().await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        sensor.start_streaming(tx).await.unwrap();
        assert_eq!(sensor.state(), LinkState::Streaming);

        // Control point queried, then armed, then data subscribed
        let calls = mock.get_calls();
        assert_eq!(calls[3], format!("read {}", PMD_CONTROL_UUID));
        assert_eq!(calls[4], format!("write {}", PMD_CONTROL_UUID));
        assert_eq!(calls[5], format!("subscribe {}", PMD_DATA_UUID));

        // The exact vendor command goes out verbatim
        let written = mock.get_written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PMD_CONTROL_UUID);
        assert_eq!(written[0].1, START_ECG_STREAM_COMMAND.to_vec());
    }

    #[tokio::test]
    async fn test_subscribed_sink_receives_payloads() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock.clone());
        sensor.identify().await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        sensor.start_streaming(tx).await.unwrap();

        let sender = mock.notification_sender().unwrap();
        sender.send(vec![0x00, 0x01, 0x02]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), vec![0x00, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_stop_streaming_tolerates_unsubscribe_failure() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock.clone());
        sensor.identify().await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        sensor.start_streaming(tx).await.unwrap();

        mock.set_unsubscribe_error(io::ErrorKind::BrokenPipe);
        sensor.stop_streaming().await;
        assert_eq!(sensor.state(), LinkState::Stopping);

        // Disconnect still completes the lifecycle
        sensor.disconnect().await;
        assert_eq!(sensor.state(), LinkState::Disconnected);
        assert!(mock.get_calls().contains(&"disconnect".to_string()));
    }

    #[tokio::test]
    async fn test_full_lifecycle_states() {
        let mock = identified_mock();
        let mut sensor = SensorConnection::new(mock);
        assert_eq!(sensor.state(), LinkState::Connected);

        sensor.identify().await.unwrap();
        assert_eq!(sensor.state(), LinkState::Identified);

        let (tx, _rx) = mpsc::channel(8);
        sensor.start_streaming(tx).await.unwrap();
        assert_eq!(sensor.state(), LinkState::Streaming);

        sensor.stop_streaming().await;
        assert_eq!(sensor.state(), LinkState::Stopping);

        sensor.disconnect().await;
        assert_eq!(sensor.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_empty_battery_response_is_protocol_error() {
        let mock = identified_mock();
        mock.set_read(BATTERY_LEVEL_UUID, vec![]);
        let mut sensor = SensorConnection::new(mock);

        let result = sensor.identify().await;
        assert!(matches!(result, Err(EcgBridgeError::Protocol(_))));
    }
}
