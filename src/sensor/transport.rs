//! Trait abstraction for BLE transport operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Trait for the GATT operations the acquisition pipeline consumes
///
/// Notification delivery is modeled as a channel: `subscribe` hands the
/// transport a sender, and every raw payload from the subscribed
/// characteristic is forwarded through it until `unsubscribe` or disconnect.
#[async_trait]
pub trait BleTransport: Send {
    /// Read the current value of a characteristic
    async fn read_characteristic(&mut self, uuid: Uuid) -> io::Result<Vec<u8>>;

    /// Write data to a characteristic
    async fn write_characteristic(&mut self, uuid: Uuid, data: &[u8]) -> io::Result<()>;

    /// Subscribe to notifications, forwarding raw payloads into `sink`
    async fn subscribe(&mut self, uuid: Uuid, sink: mpsc::Sender<Vec<u8>>) -> io::Result<()>;

    /// Stop notifications from a previously subscribed characteristic
    async fn unsubscribe(&mut self, uuid: Uuid) -> io::Result<()>;

    /// Release the link
    async fn disconnect(&mut self) -> io::Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock BLE transport for testing
    ///
    /// Records every call in order, serves canned characteristic reads, and
    /// captures the notification sender so tests can inject raw frames.
    #[derive(Clone)]
    pub struct MockTransport {
        pub reads: Arc<Mutex<HashMap<Uuid, Vec<u8>>>>,
        pub written: Arc<Mutex<Vec<(Uuid, Vec<u8>)>>>,
        pub notification_sink: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
        pub calls: Arc<Mutex<Vec<String>>>,
        pub read_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub subscribe_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub unsubscribe_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub disconnect_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                reads: Arc::new(Mutex::new(HashMap::new())),
                written: Arc::new(Mutex::new(Vec::new())),
                notification_sink: Arc::new(Mutex::new(None)),
                calls: Arc::new(Mutex::new(Vec::new())),
                read_error: Arc::new(Mutex::new(None)),
                write_error: Arc::new(Mutex::new(None)),
                subscribe_error: Arc::new(Mutex::new(None)),
                unsubscribe_error: Arc::new(Mutex::new(None)),
                disconnect_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn set_read(&self, uuid: Uuid, value: Vec<u8>) {
            self.reads.lock().unwrap().insert(uuid, value);
        }

        pub fn set_read_error(&self, error: io::ErrorKind) {
            *self.read_error.lock().unwrap() = Some(error);
        }

        pub fn set_unsubscribe_error(&self, error: io::ErrorKind) {
            *self.unsubscribe_error.lock().unwrap() = Some(error);
        }

        pub fn get_written(&self) -> Vec<(Uuid, Vec<u8>)> {
            self.written.lock().unwrap().clone()
        }

        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// The sender captured at subscribe time, for injecting frames
        pub fn notification_sender(&self) -> Option<mpsc::Sender<Vec<u8>>> {
            self.notification_sink.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl BleTransport for MockTransport {
        async fn read_characteristic(&mut self, uuid: Uuid) -> io::Result<Vec<u8>> {
            self.record(format!("read {uuid}"));
            if let Some(error) = *self.read_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock read error"));
            }
            self.reads
                .lock()
                .unwrap()
                .get(&uuid)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "No canned read"))
        }

        async fn write_characteristic(&mut self, uuid: Uuid, data: &[u8]) -> io::Result<()> {
            self.record(format!("write {uuid}"));
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written.lock().unwrap().push((uuid, data.to_vec()));
            Ok(())
        }

        async fn subscribe(&mut self, uuid: Uuid, sink: mpsc::Sender<Vec<u8>>) -> io::Result<()> {
            self.record(format!("subscribe {uuid}"));
            if let Some(error) = *self.subscribe_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock subscribe error"));
            }
            *self.notification_sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        async fn unsubscribe(&mut self, uuid: Uuid) -> io::Result<()> {
            self.record(format!("unsubscribe {uuid}"));
            if let Some(error) = *self.unsubscribe_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock unsubscribe error"));
            }
            *self.notification_sink.lock().unwrap() = None;
            Ok(())
        }

        async fn disconnect(&mut self) -> io::Result<()> {
            self.record("disconnect".to_string());
            if let Some(error) = *self.disconnect_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock disconnect error"));
            }
            Ok(())
        }
    }
}
