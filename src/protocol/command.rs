//! Command text for the integration protocol.
//!
//! Commands are single ASCII lines. `#` commands perform an action, `?`
//! commands query state, and the gateway answers with `~` lines.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::DeviceTarget;

/// Line terminator used in both directions.
pub const CRLF: &[u8] = b"\r\n";

/// Query listing the details of every device.
pub const DETAILS_ALL_DEVICES: &[u8] = b"?DETAILS,ALL_DEVICES";

/// Query listing every assigned integration id.
pub const INTEGRATION_IDS: &[u8] = b"?INTEGRATIONID,3";

/// Probe sent during session establishment. Nothing else in the session
/// produces its reply, so it marks where the negotiated stream begins.
pub const PROBE_QUERY: &[u8] = b"?MONITORING,2";

/// Leading fragment of the probe's reply.
pub const PROBE_REPLY: &[u8] = b"~MONITORING,2,";

/// Monitoring modes that can be switched with `#MONITORING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MonitoringMode {
    /// Diagnostic monitoring; without it errors are silently dropped.
    Diagnostic = 1,
    /// Reply state; without it queries are never answered.
    Reply = 11,
    /// Prompt state; the prompt is what terminates every message.
    Prompt = 12,
}

impl MonitoringMode {
    /// Modes a session needs enabled before it can be demultiplexed.
    pub const REQUIRED: [Self; 3] = [Self::Diagnostic, Self::Reply, Self::Prompt];

    /// Returns the `#MONITORING` command enabling this mode.
    #[must_use]
    pub fn enable_command(self) -> Bytes {
        Bytes::from(format!("#MONITORING,{},1", self as u8))
    }
}

/// Actions used with `DEVICE` commands and notifications.
///
/// `OUTPUT` actions are numbered differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceAction {
    /// Enable.
    Enable = 1,
    /// Disable.
    Disable = 2,
    /// Button press, contact close, or occupied.
    PressCloseUnoccupied = 3,
    /// Button release, contact open, or unoccupied.
    ReleaseOpenOccupied = 4,
    /// Button hold.
    Hold = 5,
    /// Button double tap.
    DoubleTap = 6,
    /// Current scene.
    CurrentScene = 7,
    /// LED state.
    LedState = 9,
    /// Save scene.
    SceneSave = 12,
    /// Light level; shades also use it for position.
    LightLevel = 14,
    /// Zone lock.
    ZoneLock = 15,
    /// Scene lock.
    SceneLock = 16,
    /// Sequence state.
    SequenceState = 17,
    /// Start raising.
    StartRaising = 18,
    /// Start lowering.
    StartLowering = 19,
    /// Stop raising or lowering.
    StopRaisingLowering = 20,
    /// Undocumented shade motor status; nonzero while moving.
    MotorStatus = 21,
    /// Keypad hold release.
    HoldRelease = 32,
    /// Timeclock state (0 disabled, 1 enabled).
    TimeclockState = 34,
}

impl DeviceAction {
    /// Parses an action from its wire code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Enable,
            2 => Self::Disable,
            3 => Self::PressCloseUnoccupied,
            4 => Self::ReleaseOpenOccupied,
            5 => Self::Hold,
            6 => Self::DoubleTap,
            7 => Self::CurrentScene,
            9 => Self::LedState,
            12 => Self::SceneSave,
            14 => Self::LightLevel,
            15 => Self::ZoneLock,
            16 => Self::SceneLock,
            17 => Self::SequenceState,
            18 => Self::StartRaising,
            19 => Self::StartLowering,
            20 => Self::StopRaisingLowering,
            21 => Self::MotorStatus,
            32 => Self::HoldRelease,
            34 => Self::TimeclockState,
            _ => return None,
        })
    }

    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Returns the upper-case name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enable => "ENABLE",
            Self::Disable => "DISABLE",
            Self::PressCloseUnoccupied => "PRESS_CLOSE_UNOCC",
            Self::ReleaseOpenOccupied => "RELEASE_OPEN_OCC",
            Self::Hold => "HOLD",
            Self::DoubleTap => "DOUBLE_TAP",
            Self::CurrentScene => "CURRENT_SCENE",
            Self::LedState => "LED_STATE",
            Self::SceneSave => "SCENE_SAVE",
            Self::LightLevel => "LIGHT_LEVEL",
            Self::ZoneLock => "ZONE_LOCK",
            Self::SceneLock => "SCENE_LOCK",
            Self::SequenceState => "SEQUENCE_STATE",
            Self::StartRaising => "START_RAISING",
            Self::StartLowering => "START_LOWERING",
            Self::StopRaisingLowering => "STOP_RAISING_LOWERING",
            Self::MotorStatus => "MOTOR_STATUS",
            Self::HoldRelease => "HOLD_RELEASE",
            Self::TimeclockState => "TIMECLOCK_STATE",
        }
    }
}

impl From<DeviceAction> for u32 {
    fn from(action: DeviceAction) -> Self {
        action as Self
    }
}

impl std::fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

fn device_line(
    sigil: u8,
    target: &DeviceTarget,
    component: u32,
    action: DeviceAction,
    values: &[&[u8]],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(32);
    buf.put_u8(sigil);
    buf.put_slice(format!("DEVICE,{target},{component},{}", action.code()).as_bytes());
    for value in values {
        buf.put_u8(b',');
        buf.put_slice(value);
    }
    buf.freeze()
}

/// Builds a `#DEVICE` action command.
#[must_use]
pub fn device_action(
    target: &DeviceTarget,
    component: u32,
    action: DeviceAction,
    values: &[&[u8]],
) -> Bytes {
    device_line(b'#', target, component, action, values)
}

/// Builds a `?DEVICE` query.
///
/// The gateway answers with a `~DEVICE` line that looks exactly like an
/// unsolicited notification, so the answer arrives through the
/// notification path rather than as the query's reply.
#[must_use]
pub fn device_query(target: &DeviceTarget, component: u32, action: DeviceAction) -> Bytes {
    device_line(b'?', target, component, action, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SerialNumber;

    #[test]
    fn test_monitoring_mode_values() {
        assert_eq!(MonitoringMode::Diagnostic as u8, 1);
        assert_eq!(MonitoringMode::Reply as u8, 11);
        assert_eq!(MonitoringMode::Prompt as u8, 12);
    }

    #[test]
    fn test_enable_commands() {
        let commands: Vec<Bytes> = MonitoringMode::REQUIRED
            .iter()
            .map(|mode| mode.enable_command())
            .collect();
        assert_eq!(
            commands,
            vec![
                Bytes::from_static(b"#MONITORING,1,1"),
                Bytes::from_static(b"#MONITORING,11,1"),
                Bytes::from_static(b"#MONITORING,12,1"),
            ]
        );
    }

    #[test]
    fn test_device_action_codes() {
        for code in 0..64 {
            if let Some(action) = DeviceAction::from_code(code) {
                assert_eq!(action.code(), code);
            }
        }
        assert_eq!(DeviceAction::from_code(14), Some(DeviceAction::LightLevel));
        assert_eq!(DeviceAction::from_code(8), None);
        assert_eq!(DeviceAction::LightLevel.to_string(), "LIGHT_LEVEL(14)");
    }

    #[test]
    fn test_device_action_command() {
        let target = DeviceTarget::Serial(SerialNumber::from_u32(0x02A6_DF67));
        let cmd = device_action(&target, 0, DeviceAction::LightLevel, &[b"50.00"]);
        assert_eq!(cmd, Bytes::from_static(b"#DEVICE,02A6DF67,0,14,50.00"));
    }

    #[test]
    fn test_device_query_by_integration_id() {
        let target = DeviceTarget::IntegrationId(Bytes::from_static(b"PH Grafik Eye"));
        let cmd = device_query(&target, 8, DeviceAction::LightLevel);
        assert_eq!(cmd, Bytes::from_static(b"?DEVICE,PH Grafik Eye,8,14"));
    }
}
