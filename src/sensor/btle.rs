//! # btleplug Transport Backend
//!
//! Implements [`BleTransport`] on top of the platform BLE stack.
//!
//! This module handles:
//! - Scanning for the sensor by Bluetooth address
//! - Connecting and discovering GATT services
//! - Characteristic read/write by UUID
//! - Forwarding data notifications into the acquisition channel

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EcgBridgeError, Result};
use crate::sensor::transport::BleTransport;

/// Hard timeout on the BLE connect call. The platform stack can block
/// indefinitely when the sensor is out of range or the strap has no skin
/// contact; a normal connection completes in under 2 seconds.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard timeout on GATT service discovery
const DISCOVER_TIMEOUT: Duration = Duration::from_secs(15);

/// Poll period while waiting for the sensor to appear in scan results
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE link to the sensor backed by btleplug
pub struct BtleTransport {
    /// Connected peripheral handle
    peripheral: Peripheral,
    /// Notification forwarding task, alive while subscribed
    forwarder: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BtleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleTransport")
            .field("peripheral", &self.peripheral.id())
            .finish_non_exhaustive()
    }
}

impl BtleTransport {
    /// Open the link to the sensor at a fixed Bluetooth address
    ///
    /// Scans until the address shows up, connects, and discovers services.
    ///
    /// # Arguments
    ///
    /// * `address` - Bluetooth address of the sensor (e.g. "F7:15:B8:15:A1:F1")
    /// * `scan_timeout` - How long to scan before giving up
    ///
    /// # Returns
    ///
    /// * `Result<BtleTransport>` - Connected transport or error
    ///
    /// # Errors
    ///
    /// Returns `Link` if no adapter is present, the sensor is not found
    /// within `scan_timeout`, or connect/discovery fails or times out.
    pub async fn connect(address: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| EcgBridgeError::Link(format!("BLE manager unavailable: {}", e)))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| EcgBridgeError::Link(format!("Failed to enumerate adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| EcgBridgeError::Link("No Bluetooth adapter found".to_string()))?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| EcgBridgeError::Link(format!("Failed to start scan: {}", e)))?;

        debug!("Scanning for {} (timeout {:?})", address, scan_timeout);
        let found = Self::find_by_address(&adapter, address, scan_timeout).await;
        adapter.stop_scan().await.ok();
        let peripheral = found?;

        timeout(CONNECT_TIMEOUT, peripheral.connect())
            .await
            .map_err(|_| {
                EcgBridgeError::Link(format!("Connect to {} timed out", address))
            })?
            .map_err(|e| EcgBridgeError::Link(format!("Connect to {} failed: {}", address, e)))?;

        timeout(DISCOVER_TIMEOUT, peripheral.discover_services())
            .await
            .map_err(|_| EcgBridgeError::Link("Service discovery timed out".to_string()))?
            .map_err(|e| EcgBridgeError::Link(format!("Service discovery failed: {}", e)))?;

        info!("Connected to sensor at {}", address);

        Ok(Self {
            peripheral,
            forwarder: None,
        })
    }

    /// Poll scan results until a peripheral with the given address appears
    async fn find_by_address(
        adapter: &Adapter,
        address: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let result = timeout(scan_timeout, async {
            loop {
                let peripherals = adapter.peripherals().await.unwrap_or_default();
                for peripheral in peripherals {
                    if let Ok(Some(props)) = peripheral.properties().await {
                        if props.address.to_string().eq_ignore_ascii_case(address) {
                            return peripheral;
                        }
                    }
                }
                sleep(SCAN_POLL_INTERVAL).await;
            }
        })
        .await;

        result.map_err(|_| {
            EcgBridgeError::Link(format!(
                "Sensor {} not found after scanning for {:?}",
                address, scan_timeout
            ))
        })
    }

    /// Look up a discovered characteristic by UUID
    fn find_characteristic(&self, uuid: Uuid) -> io::Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Characteristic {} not found", uuid),
                )
            })
    }

    fn stop_forwarder(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}

fn to_io_error(e: btleplug::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[async_trait]
impl BleTransport for BtleTransport {
    async fn read_characteristic(&mut self, uuid: Uuid) -> io::Result<Vec<u8>> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(to_io_error)
    }

    async fn write_characteristic(&mut self, uuid: Uuid, data: &[u8]) -> io::Result<()> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(to_io_error)
    }

    async fn subscribe(&mut self, uuid: Uuid, sink: mpsc::Sender<Vec<u8>>) -> io::Result<()> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(to_io_error)?;

        let mut notifications = self.peripheral.notifications().await.map_err(to_io_error)?;

        // Forward raw payloads until the stream or the receiver closes
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if sink.send(notification.value).await.is_err() {
                    debug!("Notification receiver dropped; stopping forwarder");
                    break;
                }
            }
            debug!("Notification stream ended");
        }));

        Ok(())
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> io::Result<()> {
        let characteristic = self.find_characteristic(uuid)?;
        let result = self.peripheral.unsubscribe(&characteristic).await;
        self.stop_forwarder();
        result.map_err(to_io_error)
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.stop_forwarder();
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("BLE disconnect reported: {}", e);
            return Err(to_io_error(e));
        }
        Ok(())
    }
}
