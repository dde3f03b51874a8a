//! Device and integration-id records reported by the gateway.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::protocol::DeviceAction;
use crate::types::serial::SerialNumber;

/// Integration id value the gateway reports for devices without one.
pub const INTEGRATION_ID_NOT_SET: &[u8] = b"(Not Set)";

/// Attributes of one physical device, from a `~DETAILS` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDetails {
    /// Device serial number (`SN`).
    pub serial_number: SerialNumber,
    /// Integration id (`INTEGRATIONID`), or `None` when it is `(Not Set)`.
    pub integration_id: Option<Bytes>,
    /// Device family (`FAMILY`), e.g. `GRAFIK_EYE(2)`.
    pub family: Bytes,
    /// Product (`PRODUCT`), e.g. `QSG-ECO(2)`.
    pub product: Bytes,
    /// Every key/value pair on the line, including `CODE`, `BOOT` and `HW`.
    pub raw_attrs: BTreeMap<Bytes, Bytes>,
}

/// Whether an integration id names a whole device or one of its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationIdKind {
    /// `DEVICE` style.
    Device,
    /// `OUTPUT` style, with the device's output (zone) number.
    Output { output: u32 },
}

/// One line of a `~INTEGRATIONID` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationIdRecord {
    /// The integration id.
    pub integration_id: Bytes,
    /// Device or output style.
    pub kind: IntegrationIdKind,
    /// Serial number of the device the id belongs to.
    pub serial_number: SerialNumber,
}

/// The device and output number an output integration id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputAddress {
    /// Serial number of the owning device.
    pub serial_number: SerialNumber,
    /// Output number on that device.
    pub output: u32,
}

/// How a device is named in a `DEVICE` command or notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceTarget {
    /// By serial number.
    Serial(SerialNumber),
    /// By integration id.
    IntegrationId(Bytes),
}

impl DeviceTarget {
    /// Interprets a wire token.
    ///
    /// Tokens that are well-formed serial numbers are taken as serial numbers,
    /// everything else as an integration id.
    #[must_use]
    pub fn from_token(token: &[u8]) -> Self {
        SerialNumber::parse(token).map_or_else(
            |_| Self::IntegrationId(Bytes::copy_from_slice(token)),
            Self::Serial,
        )
    }
}

impl From<SerialNumber> for DeviceTarget {
    fn from(sn: SerialNumber) -> Self {
        Self::Serial(sn)
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(sn) => write!(f, "{sn}"),
            Self::IntegrationId(iid) => f.write_str(&String::from_utf8_lossy(iid)),
        }
    }
}

/// A decoded `~DEVICE` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUpdate {
    /// The device the update is about.
    pub target: DeviceTarget,
    /// Raw component number.
    pub component: u32,
    /// Raw action code.
    pub action: u32,
    /// Trailing parameters, possibly none.
    pub values: Vec<Bytes>,
}

impl DeviceUpdate {
    /// Returns the action if it is one of the documented codes.
    #[must_use]
    pub const fn known_action(&self) -> Option<DeviceAction> {
        DeviceAction::from_code(self.action)
    }
}
