//! # PMD Protocol Constants and Types
//!
//! Core protocol definitions for Polar Measurement Data (PMD) streaming.

use uuid::Uuid;

/// Model Number String characteristic (standard GATT, 0x2A24)
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x00002A24_0000_1000_8000_00805f9b34fb);

/// Manufacturer Name String characteristic (standard GATT, 0x2A29)
pub const MANUFACTURER_NAME_UUID: Uuid = Uuid::from_u128(0x00002A29_0000_1000_8000_00805f9b34fb);

/// Battery Level characteristic (standard GATT, 0x2A19)
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002A19_0000_1000_8000_00805f9b34fb);

/// PMD service (vendor-specific)
pub const PMD_SERVICE_UUID: Uuid = Uuid::from_u128(0xFB005C80_02E7_F387_1CAD_8ACD2D8DF0C8);

/// PMD control point: write-only channel used to arm a streaming mode
pub const PMD_CONTROL_UUID: Uuid = Uuid::from_u128(0xFB005C81_02E7_F387_1CAD_8ACD2D8DF0C8);

/// PMD data point: notify channel carrying streamed frames once armed
pub const PMD_DATA_UUID: Uuid = Uuid::from_u128(0xFB005C82_02E7_F387_1CAD_8ACD2D8DF0C8);

/// Control command that starts the ECG stream.
///
/// Opaque vendor command: start measurement (0x02) of type ECG (0x00) at
/// 130 Hz with 14-bit resolution. Written verbatim to the PMD control point;
/// the settings bytes are not re-derived at runtime.
pub const START_ECG_STREAM_COMMAND: [u8; 10] =
    [0x02, 0x00, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0E, 0x00];

/// Measurement-type tag carried in byte 0 of every PMD data frame
pub const ECG_FRAME_TAG: u8 = 0x00;

/// Offset of the 8-byte little-endian device timestamp within a frame
pub const FRAME_TIMESTAMP_OFFSET: usize = 1;

/// Offset of the packed sample data within a frame.
/// Byte 9 (between timestamp and samples) is the PMD frame-type byte.
pub const FRAME_SAMPLES_OFFSET: usize = 10;

/// Width of one packed ECG sample (3-byte little-endian two's complement)
pub const SAMPLE_STEP: usize = 3;

/// Polar H10 ECG sampling frequency in Hz
pub const ECG_SAMPLING_FREQ_HZ: u32 = 130;

/// One decoded ECG notification frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcgFrame {
    /// Device timestamp shared by every sample in the frame, in microseconds
    pub timestamp_us: u64,

    /// Decoded sample values in frame order (signed microvolts)
    pub samples: Vec<i32>,
}
