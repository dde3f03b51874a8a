//! Transport layer for gateway communication.
//!
//! This module provides the buffered stream reader shared by login and the
//! connection engine, the login handshake, and the TCP transport.

pub mod tcp;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::{CRLF, MessageDecoder, Prompt};

/// Literal prompt the gateway sends before login.
pub const LOGIN_PROMPT: &[u8] = b"login: ";

/// Line the gateway sends after a successful login.
pub const LOGIN_ACCEPTED: &[u8] = b"connection established";

const READ_CHUNK: usize = 4096;

/// Reads whole messages from a byte stream.
///
/// Received bytes are kept in a [`MessageDecoder`] until a complete message
/// has arrived. Every read is cancel-safe: dropping a pending read future
/// leaves all bytes received so far in the buffer for the next call.
#[derive(Debug)]
pub struct StreamReader<R> {
    reader: R,
    decoder: MessageDecoder,
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    /// Wraps a byte stream.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: MessageDecoder::new(),
        }
    }

    /// Reads up to and including the first `delimiter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] on end of stream.
    pub async fn read_until(&mut self, delimiter: &[u8]) -> Result<Bytes> {
        loop {
            if let Some(data) = self.decoder.decode_until(delimiter)? {
                return Ok(data);
            }
            self.fill().await?;
        }
    }

    /// Reads the next message terminated by `prompt`.
    ///
    /// Returns the message with its prompt stripped; an empty message is the
    /// bare prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] on end of stream or [`Error::Frame`] if
    /// the bytes do not frame as a message.
    pub async fn read_message(&mut self, prompt: &Prompt) -> Result<Bytes> {
        loop {
            if let Some(message) = self.decoder.decode(prompt)? {
                return Ok(message);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let buffer = self.decoder.buffer_mut();
        buffer.reserve(READ_CHUNK);
        match self.reader.read_buf(buffer).await {
            Ok(0) => {
                tracing::debug!("gateway closed the stream");
                Err(Error::Disconnected)
            }
            Ok(n) => {
                tracing::trace!("received {} bytes", n);
                Ok(())
            }
            Err(e) => {
                tracing::error!("read error: {}", e);
                Err(Error::Disconnected)
            }
        }
    }
}

/// Logs in to a gateway and establishes a session.
///
/// Waits for `login: `, sends `username`, and expects the single line
/// `connection established` in return. On success the stream is handed to
/// [`Connection::establish_with`].
///
/// # Errors
///
/// Returns [`Error::Login`] carrying the server's line if the login is
/// rejected, or any error from session establishment.
pub async fn login<R, W>(reader: R, mut writer: W, username: &[u8]) -> Result<Connection<R, W>>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = StreamReader::new(reader);

    reader.read_until(LOGIN_PROMPT).await?;

    let mut line = Vec::with_capacity(username.len() + CRLF.len());
    line.extend_from_slice(username);
    line.extend_from_slice(CRLF);
    writer.write_all(&line).await?;
    writer.flush().await?;

    let response = reader.read_until(b"\n").await?;
    let response = response.slice_ref(response.trim_ascii());
    if response != LOGIN_ACCEPTED {
        tracing::warn!("login rejected: {:?}", response);
        return Err(Error::Login { response });
    }

    tracing::debug!("login accepted");
    Connection::establish_with(reader, writer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex, split};

    #[tokio::test]
    async fn test_read_until_across_chunks() {
        let (client, mut server) = duplex(64);
        let mut reader = StreamReader::new(client);

        server.write_all(b"Welcome\r\nlog").await.unwrap();
        let pending = tokio::spawn(async move {
            let data = reader.read_until(LOGIN_PROMPT).await.unwrap();
            (data, reader)
        });
        server.write_all(b"in: ").await.unwrap();

        let (data, _reader) = pending.await.unwrap();
        assert_eq!(data, Bytes::from_static(b"Welcome\r\nlogin: "));
    }

    #[tokio::test]
    async fn test_read_message_eof() {
        let (client, mut server) = duplex(64);
        let mut reader = StreamReader::new(client);
        let prompt = Prompt::new(b"QSE").unwrap();

        server.write_all(b"~DEVICE,1,2,3\r\nQSE>~DEV").await.unwrap();
        drop(server);

        assert_eq!(
            reader.read_message(&prompt).await.unwrap(),
            Bytes::from_static(b"~DEVICE,1,2,3\r\n")
        );
        assert!(matches!(
            reader.read_message(&prompt).await,
            Err(Error::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_read_survives_cancellation() {
        let (client, mut server) = duplex(64);
        let mut reader = StreamReader::new(client);
        let prompt = Prompt::new(b"QSE").unwrap();

        server.write_all(b"~DEVICE,1,2").await.unwrap();
        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            reader.read_message(&prompt),
        )
        .await;
        assert!(cancelled.is_err());

        server.write_all(b",3\r\nQSE>").await.unwrap();
        assert_eq!(
            reader.read_message(&prompt).await.unwrap(),
            Bytes::from_static(b"~DEVICE,1,2,3\r\n")
        );
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let (client, server) = duplex(1024);
        let (read, write) = split(client);
        let (server_read, mut server_write) = split(server);

        let gateway = tokio::spawn(async move {
            server_write.write_all(b"\r\nlogin: ").await.unwrap();
            let mut lines = BufReader::new(server_read);
            let mut line = String::new();
            lines.read_line(&mut line).await.unwrap();
            assert_eq!(line, "intruder\r\n");
            server_write.write_all(b"login incorrect\r\n").await.unwrap();
        });

        let result = login(read, write, b"intruder").await;
        gateway.await.unwrap();

        match result {
            Err(Error::Login { response }) => {
                assert_eq!(response, Bytes::from_static(b"login incorrect"));
            }
            other => panic!("expected login error, got {:?}", other.err()),
        }
    }
}
