//! # PMD Protocol Module
//!
//! Implementation of the Polar Measurement Data (PMD) protocol used by the
//! Polar H10 to stream raw biosignals.
//!
//! This module handles:
//! - GATT identifiers for the PMD service, control point, and data point
//! - The vendor command that arms the ECG stream
//! - ECG notification frame decoding (device timestamp + packed samples)

pub mod decoder;
pub mod protocol;
