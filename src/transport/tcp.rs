//! TCP transport implementation.
//!
//! Integration access points listen for telnet-style connections, by default
//! on port 23.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport::login;

/// Default telnet port.
pub const DEFAULT_PORT: u16 = 23;

/// Default time allowed for the TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for login plus session establishment.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection over TCP.
pub type TcpConnection = Connection<OwnedReadHalf, OwnedWriteHalf>;

/// Configuration for the TCP transport.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Gateway host name or address.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Login user name.
    pub username: String,
    /// Time allowed for the TCP connect.
    pub connect_timeout: Duration,
    /// Time allowed for login plus session establishment.
    pub login_timeout: Duration,
}

impl TcpConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the login timeout.
    #[must_use]
    pub const fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }
}

fn timeout_error(timeout: Duration) -> Error {
    Error::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Connects to a gateway, logs in, and establishes a session.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if either phase exceeds its timeout, or any
/// connect, login, or establishment error.
pub async fn connect(config: &TcpConfig) -> Result<TcpConnection> {
    tracing::info!("connecting to {}:{}", config.host, config.port);

    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    .map_err(|_| timeout_error(config.connect_timeout))??;

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!("failed to set TCP_NODELAY: {}", e);
    }

    let (reader, writer) = stream.into_split();
    let connection = tokio::time::timeout(
        config.login_timeout,
        login(reader, writer, config.username.as_bytes()),
    )
    .await
    .map_err(|_| timeout_error(config.login_timeout))??;

    tracing::info!("connected to {}:{}", config.host, config.port);
    Ok(connection)
}
