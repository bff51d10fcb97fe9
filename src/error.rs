//! # Error Types
//!
//! Custom error types for ECG Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for ECG Bridge
#[derive(Debug, Error)]
pub enum EcgBridgeError {
    /// Cannot establish or maintain the BLE connection
    #[error("Link error: {0}")]
    Link(String),

    /// Handshake, characteristic read/write, or subscribe failure
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Write failure on the output artifact
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ECG Bridge
pub type Result<T> = std::result::Result<T, EcgBridgeError>;
