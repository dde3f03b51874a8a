//! Protocol definitions for the integration protocol.
//!
//! This module contains the low-level protocol types including:
//! - Message framing and reply/notification classification
//! - Command text
//! - Reply and notification parsing

pub mod command;
pub mod frame;
pub mod parser;

pub use command::{
    CRLF, DETAILS_ALL_DEVICES, DeviceAction, INTEGRATION_IDS, MonitoringMode, PROBE_QUERY,
    PROBE_REPLY, device_action, device_query,
};
pub use frame::{MAX_MESSAGE_SIZE, MessageDecoder, MessageKind, Prompt, REPLY_PREFIXES, classify};
pub use parser::{parse_details, parse_device_update, parse_integration_ids};
