//! Data types for gateway entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Serial numbers
//! - Device details and integration-id records
//! - Decoded device updates

pub mod device;
pub mod serial;

pub use device::{
    DeviceDetails, DeviceTarget, DeviceUpdate, INTEGRATION_ID_NOT_SET, IntegrationIdKind,
    IntegrationIdRecord, OutputAddress,
};
pub use serial::SerialNumber;
