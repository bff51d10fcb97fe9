//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The configuration file is optional: when it is absent, the built-in
//! defaults describe a complete session against the fixed sensor address.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub battery: BatteryConfig,
}

/// Sensor link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    /// Bluetooth address of the sensor
    #[serde(default = "default_address")]
    pub address: String,

    /// Device identifier baked into the artifact name
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// How long to scan for the sensor before giving up
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

/// Acquisition loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Seconds between buffer flushes
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Directory receiving the session artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// Battery warning configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    /// Initial warning threshold in percent
    #[serde(default = "default_warn_threshold_pct")]
    pub warn_threshold_pct: u8,

    /// How far the threshold drops after each fired warning
    #[serde(default = "default_warn_step_pct")]
    pub warn_step_pct: u8,
}

// Default value functions
fn default_address() -> String { "F7:15:B8:15:A1:F1".to_string() }
fn default_device_id() -> String { "6054012C".to_string() }
fn default_scan_timeout_secs() -> u64 { 15 }

fn default_flush_interval_secs() -> u64 { 1 }
fn default_data_dir() -> String { "./data".to_string() }

fn default_warn_threshold_pct() -> u8 { 30 }
fn default_warn_step_pct() -> u8 { 5 }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            device_id: default_device_id(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            warn_threshold_pct: default_warn_threshold_pct(),
            warn_step_pct: default_warn_step_pct(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::default(),
            acquisition: AcquisitionConfig::default(),
            battery: BatteryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.sensor.address.is_empty() {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("sensor address cannot be empty")
            ));
        }

        if self.sensor.device_id.is_empty() {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("device_id cannot be empty")
            ));
        }

        if self.sensor.scan_timeout_secs == 0 || self.sensor.scan_timeout_secs > 120 {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("scan_timeout_secs must be between 1 and 120")
            ));
        }

        if self.acquisition.flush_interval_secs == 0 || self.acquisition.flush_interval_secs > 60 {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("flush_interval_secs must be between 1 and 60")
            ));
        }

        if self.acquisition.data_dir.is_empty() {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("data_dir cannot be empty")
            ));
        }

        if self.battery.warn_threshold_pct > 100 {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("warn_threshold_pct must be between 0 and 100")
            ));
        }

        if self.battery.warn_step_pct == 0 {
            return Err(crate::error::EcgBridgeError::Config(
                toml::de::Error::custom("warn_step_pct must be greater than 0")
            ));
        }

        Ok(())
    }
}
