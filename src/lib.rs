//! # lutron-integration
//!
//! A Rust client library for the Lutron integration protocol, as spoken by
//! QS network interfaces such as the QSE-CI-NWK-E.
//!
//! The gateway sends replies to queries and unsolicited status updates over
//! the same Telnet-style stream with nothing but a prompt separating them.
//! This library keeps the two apart so one task can issue queries while any
//! number of others wait for notifications.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Cancel-safe reads shared between concurrent callers without a
//!   background task
//! - Device and integration-id enumeration
//! - Component tables for Grafik Eye QS controllers and shades
//!
//! ## Quick Start
//!
//! ```no_run
//! use lutron_integration::{LutronUniverse, TcpConfig, transport::tcp};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lutron_integration::Error> {
//!     let config = TcpConfig::new("192.168.1.50", "nwk");
//!     let connection = tcp::connect(&config).await?;
//!
//!     let universe = LutronUniverse::enumerate(&connection).await?;
//!     println!("{} devices", universe.len());
//!
//!     loop {
//!         let message = connection.read_notification().await?;
//!         if let Ok(Some(update)) = universe.decode_update(&message) {
//!             match update.component {
//!                 Some(component) => println!("{}: {}", update.device.serial_number, component),
//!                 None => println!("{}: {}", update.device.serial_number, update.update.component),
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Message framing, command text and reply parsing
//! - [`types`] - Data structures (serial numbers, device records, updates)
//! - [`devices`] - Component addressing and built-in device classes
//! - [`transport`] - Login handshake and TCP transport
//! - [`connection`] - The [`Connection`] reply/notification demultiplexer
//! - [`universe`] - The [`LutronUniverse`] device directory

pub mod connection;
pub mod devices;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod universe;

// Re-exports for convenience
pub use connection::{Connection, ConnectionState};
pub use devices::{ArraySpec, Component, ComponentGroup, DeviceClass, DeviceFamily};
pub use error::{Error, FrameError, ParseError, Result};
pub use protocol::{DeviceAction, MonitoringMode, Prompt};
pub use transport::{
    login,
    tcp::{TcpConfig, TcpConnection},
};
pub use types::{
    DeviceDetails, DeviceTarget, DeviceUpdate, IntegrationIdKind, IntegrationIdRecord,
    OutputAddress, SerialNumber,
};
pub use universe::{LutronUniverse, ResolvedUpdate};
