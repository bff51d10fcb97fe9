//! # PMD Frame Decoder
//!
//! Decodes raw ECG notification frames into timestamped sample values.

use super::protocol::*;

/// Decode one PMD data notification into an ECG frame
///
/// # Arguments
///
/// * `payload` - Raw notification payload from the PMD data characteristic
///
/// # Returns
///
/// * `Option<EcgFrame>` - Decoded frame, or `None` if the payload is not an
///   ECG frame the pipeline cares about
///
/// Returns `None` (not an error) when the payload is empty or its
/// measurement-type tag is not the ECG tag: the sensor multiplexes other
/// measurement types over the same characteristic and those frames are
/// silently ignored. A payload too short to carry the timestamp and
/// frame-type byte is dropped the same way.
///
/// Trailing bytes that do not form a complete 3-byte sample (0, 1, or 2 of
/// them) are discarded, never mis-parsed as a sample.
pub fn decode_ecg_frame(payload: &[u8]) -> Option<EcgFrame> {
    if payload.first() != Some(&ECG_FRAME_TAG) {
        return None;
    }

    if payload.len() < FRAME_SAMPLES_OFFSET {
        return None;
    }

    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(&payload[FRAME_TIMESTAMP_OFFSET..FRAME_TIMESTAMP_OFFSET + 8]);
    let timestamp_us = u64::from_le_bytes(ts_bytes);

    let body = &payload[FRAME_SAMPLES_OFFSET..];
    let mut samples = Vec::with_capacity(body.len() / SAMPLE_STEP);
    for chunk in body.chunks_exact(SAMPLE_STEP) {
        samples.push(sample_from_le_bytes(chunk));
    }

    Some(EcgFrame {
        timestamp_us,
        samples,
    })
}

/// Sign-extend a 3-byte little-endian two's-complement field to i32
///
/// # Arguments
///
/// * `bytes` - Exactly 3 bytes, least significant first
///
/// # Returns
///
/// * `i32` - Value in −8,388,608..=8,388,607
fn sample_from_le_bytes(bytes: &[u8]) -> i32 {
    let raw = (bytes[0] as i32) | ((bytes[1] as i32) << 8) | ((bytes[2] as i32) << 16);
    // Shift the 24-bit sign bit into position 31 and back down
    (raw << 8) >> 8
}
