//! Device serial numbers.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Number of hex digits in a canonical serial number.
pub const SERIAL_NUMBER_DIGITS: usize = 8;

/// A canonicalized device serial number.
///
/// The gateway reports serial numbers as an optional `0x` followed by up to
/// eight hex digits in inconsistent case. Every accepted spelling maps to the
/// same value, so `0x00f535eb`, `F535EB` and `00F535EB` compare and hash
/// equal. The canonical text form is eight upper-case digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(u32);

impl SerialNumber {
    /// Parses a serial number from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSerialNumber`] for non-hex characters or more
    /// than eight digits.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidSerialNumber {
            input: String::from_utf8_lossy(input).into_owned(),
            reason: reason.to_owned(),
        };

        let digits = input.strip_prefix(b"0x").unwrap_or(input);
        if digits.len() > SERIAL_NUMBER_DIGITS {
            return Err(invalid("more than 8 hex digits"));
        }

        let mut padded = [b'0'; SERIAL_NUMBER_DIGITS];
        padded[SERIAL_NUMBER_DIGITS - digits.len()..].copy_from_slice(digits);

        let mut raw = [0u8; 4];
        hex::decode_to_slice(padded, &mut raw).map_err(|_| invalid("not hexadecimal"))?;
        Ok(Self(u32::from_be_bytes(raw)))
    }

    /// Creates a serial number from its numeric value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl FromStr for SerialNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

impl TryFrom<&[u8]> for SerialNumber {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({self})")
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
