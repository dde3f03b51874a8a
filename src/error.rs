//! Error types for the lutron-integration library.

use bytes::Bytes;
use thiserror::Error;

/// The main error type for lutron-integration operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message framing error. Fatal to the session.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Protocol violation. Fatal to the session.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The gateway closed the stream.
    #[error("disconnected")]
    Disconnected,

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,

    /// The gateway rejected the login.
    #[error("login rejected: {}", String::from_utf8_lossy(.response))]
    Login { response: Bytes },

    /// A reply or notification did not parse.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Malformed serial number text.
    #[error("invalid serial number {input:?}: {reason}")]
    InvalidSerialNumber { input: String, reason: String },

    /// Misconfigured component group.
    #[error("invalid component group {name}: {reason}")]
    InvalidComponentGroup { name: String, reason: String },

    /// Misconfigured device class.
    #[error("invalid device class: {reason}")]
    InvalidDeviceClass { reason: String },

    /// A command that cannot be sent as a single line.
    #[error("invalid command {command:?}")]
    InvalidCommand { command: String },

    /// The gateway answered a command with `~ERROR`.
    #[error("gateway error: {message}")]
    Gateway { message: String },

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Message framing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A message started with the prompt's first byte but the rest did not match.
    #[error("expected prompt {expected:?}, got {got:?}")]
    UnexpectedMarker { expected: Bytes, got: Bytes },

    /// A notification did not contain exactly one trailing CRLF.
    #[error("malformed notification {0:?}")]
    MalformedNotification(Bytes),

    /// The probe reply did not contain a usable prompt.
    #[error("could not parse prompt from {0:?}")]
    BadPrompt(Bytes),

    /// Buffered data exceeds the maximum message size.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
}

/// Errors from parsing replies and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The reply was not a sequence of CRLF-terminated lines.
    #[error("{what} reply is not CRLF-terminated")]
    Unterminated { what: &'static str },

    /// A line did not match its grammar.
    #[error("unexpected {what} line {line:?}")]
    BadLine { what: &'static str, line: Bytes },

    /// A details record lacks a required key.
    #[error("details line is missing key {key}")]
    MissingKey { key: &'static str },

    /// A serial number inside a reply is malformed.
    #[error("bad serial number {0:?}")]
    BadSerialNumber(Bytes),
}

/// Result type alias for lutron-integration operations.
pub type Result<T> = std::result::Result<T, Error>;
