//! The directory of devices behind a gateway.
//!
//! A [`LutronUniverse`] is a snapshot built by two queries: `?DETAILS` for
//! every device and `?INTEGRATIONID,3` for the integration ids assigned to
//! outputs. It is not updated by later notifications; enumerate again to
//! refresh it.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::Connection;
use crate::devices::{Component, DeviceFamily};
use crate::error::Result;
use crate::protocol::{
    DETAILS_ALL_DEVICES, INTEGRATION_IDS, parse_details, parse_device_update,
    parse_integration_ids,
};
use crate::types::{
    DeviceDetails, DeviceTarget, DeviceUpdate, IntegrationIdKind, IntegrationIdRecord,
    OutputAddress, SerialNumber,
};

/// Known devices and output integration ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LutronUniverse {
    devices: HashMap<SerialNumber, DeviceDetails>,
    device_iids: HashMap<Bytes, SerialNumber>,
    output_iids: HashMap<Bytes, OutputAddress>,
}

/// A device update with its device and component looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpdate<'a> {
    /// The decoded update.
    pub update: DeviceUpdate,
    /// The device the update is about.
    pub device: &'a DeviceDetails,
    /// The device's family, if it has a built-in component table.
    pub family: Option<DeviceFamily>,
    /// The component, if the family's table contains it.
    pub component: Option<Component<'static>>,
}

impl LutronUniverse {
    /// Builds the directory by querying the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) if either reply does not
    /// parse; no partial directory is returned. Connection errors are passed
    /// through.
    pub async fn enumerate<R, W>(connection: &Connection<R, W>) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let details = connection.query(DETAILS_ALL_DEVICES).await?;
        let devices = parse_details(&details)?;

        let ids = connection.query(INTEGRATION_IDS).await?;
        let records = parse_integration_ids(&ids)?;

        let universe = Self::new(devices, records);
        tracing::info!(
            "enumerated {} devices and {} output integration ids",
            universe.devices.len(),
            universe.output_iids.len()
        );
        Ok(universe)
    }

    /// Builds the directory from parsed replies.
    ///
    /// Devices are indexed by serial number and by integration id, unless it
    /// is unset. `DEVICE` integration-id records are skipped since the
    /// device details already carry them.
    #[must_use]
    pub fn new(devices: Vec<DeviceDetails>, records: Vec<IntegrationIdRecord>) -> Self {
        let mut universe = Self::default();

        for device in devices {
            let serial_number = device.serial_number;
            if let Some(iid) = &device.integration_id {
                if let Some(other) = universe.device_iids.insert(iid.clone(), serial_number) {
                    tracing::warn!(
                        "integration id {:?} is shared by {} and {}",
                        iid,
                        other,
                        serial_number
                    );
                }
            }
            if universe.devices.insert(serial_number, device).is_some() {
                tracing::warn!("device {} listed more than once", serial_number);
            }
        }

        for record in records {
            match record.kind {
                IntegrationIdKind::Device => {}
                IntegrationIdKind::Output { output } => {
                    universe.output_iids.insert(
                        record.integration_id,
                        OutputAddress {
                            serial_number: record.serial_number,
                            output,
                        },
                    );
                }
            }
        }

        universe
    }

    /// Returns the device with the given serial number.
    #[must_use]
    pub fn device(&self, serial_number: SerialNumber) -> Option<&DeviceDetails> {
        self.devices.get(&serial_number)
    }

    /// Returns the device with the given integration id.
    #[must_use]
    pub fn device_by_iid(&self, integration_id: &[u8]) -> Option<&DeviceDetails> {
        self.device_iids
            .get(integration_id)
            .and_then(|sn| self.devices.get(sn))
    }

    /// Returns the device a command or notification refers to.
    #[must_use]
    pub fn resolve_target(&self, target: &DeviceTarget) -> Option<&DeviceDetails> {
        match target {
            DeviceTarget::Serial(sn) => self.device(*sn),
            DeviceTarget::IntegrationId(iid) => self.device_by_iid(iid),
        }
    }

    /// Returns the device and output an output integration id refers to.
    #[must_use]
    pub fn output(&self, integration_id: &[u8]) -> Option<OutputAddress> {
        self.output_iids.get(integration_id).copied()
    }

    /// Iterates over all devices in no particular order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceDetails> {
        self.devices.values()
    }

    /// Iterates over all output integration ids in no particular order.
    pub fn outputs(&self) -> impl Iterator<Item = (&Bytes, &OutputAddress)> {
        self.output_iids.iter()
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no devices are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Looks up the device and component of a decoded update.
    ///
    /// Returns `None` if the device is unknown.
    #[must_use]
    pub fn resolve_update(&self, update: DeviceUpdate) -> Option<ResolvedUpdate<'_>> {
        let device = self.resolve_target(&update.target)?;
        let family = DeviceFamily::from_family(&device.family);
        let component = family.and_then(|f| f.device_class().resolve(update.component));
        Some(ResolvedUpdate {
            update,
            device,
            family,
            component,
        })
    }

    /// Decodes a `~DEVICE` notification and resolves it.
    ///
    /// Returns `Ok(None)` if the device is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) if the notification is
    /// not a well-formed `~DEVICE` line.
    pub fn decode_update(&self, message: &[u8]) -> Result<Option<ResolvedUpdate<'_>>> {
        let update = parse_device_update(message)?;
        if self.resolve_target(&update.target).is_none() {
            tracing::debug!("update for unknown device {}", update.target);
        }
        Ok(self.resolve_update(update))
    }
}
