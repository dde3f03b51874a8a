//! The [`Connection`] engine.
//!
//! One gateway connection carries two interleaved kinds of traffic: replies
//! to the query in flight and unsolicited notifications. Nothing on the wire
//! links a reply to its query, so the engine relies on these rules:
//!
//! - every message ends with the session's prompt marker;
//! - a message is a reply if it is empty or starts with a reply token (see
//!   [`classify`]), otherwise it is a notification;
//! - at most one query is in flight, so any reply belongs to it.
//!
//! There is no background reader task. A caller that needs data and finds
//! nobody reading becomes the reader for one message, files it in the reply
//! slot or the notification queue, and wakes everyone else to re-check.
//! Waiters can be cancelled at any time. A cancelled reader leaves any
//! partially received message in the stream buffer for the next reader.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::error::{Error, FrameError, Result};
use crate::protocol::{
    CRLF, MessageKind, MonitoringMode, PROBE_QUERY, PROBE_REPLY, Prompt, classify,
};

/// Maximum number of unread notifications kept. When a new one arrives
/// with the queue full, the oldest is dropped and a warning logged.
pub const MAX_PENDING_NOTIFICATIONS: usize = 1024;
use crate::transport::StreamReader;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Queries and notifications can be exchanged.
    Established,
    /// [`Connection::disconnect`] was called.
    Closed,
    /// The stream ended or the protocol was violated.
    Broken,
}

/// Why a session ended. Kept so every later caller sees the same error.
#[derive(Debug, Clone)]
enum Failure {
    Disconnected,
    Frame(FrameError),
    Protocol(String),
    Closed,
}

impl Failure {
    fn from_error(error: &Error) -> Self {
        match error {
            Error::Frame(e) => Self::Frame(e.clone()),
            Error::Protocol { message } => Self::Protocol(message.clone()),
            Error::Closed => Self::Closed,
            Error::Disconnected | Error::Io(_) => Self::Disconnected,
            other => Self::Protocol(other.to_string()),
        }
    }

    fn to_error(&self) -> Error {
        match self {
            Self::Disconnected => Error::Disconnected,
            Self::Frame(e) => Error::Frame(e.clone()),
            Self::Protocol(message) => Error::Protocol {
                message: message.clone(),
            },
            Self::Closed => Error::Closed,
        }
    }
}

#[derive(Debug, Default)]
struct PendingQuery {
    // Notifications seen while the query is in flight, if requested.
    collected: Option<Vec<Bytes>>,
}

/// Shared demultiplexer state, guarded by one mutex.
#[derive(Debug, Default)]
struct SessionState {
    query: Option<PendingQuery>,
    reply: Option<Bytes>,
    notifications: VecDeque<Bytes>,
    reading: bool,
    failure: Option<Failure>,
}

impl SessionState {
    /// Files one message as the pending reply or a queued notification.
    fn dispatch(&mut self, message: Bytes) -> std::result::Result<(), FrameError> {
        match classify(&message)? {
            MessageKind::Notification => {
                match self.query.as_mut().and_then(|q| q.collected.as_mut()) {
                    Some(collected) => {
                        tracing::debug!("received semi-solicited message: {:?}", message);
                        collected.push(message.clone());
                    }
                    None => tracing::debug!("received unsolicited message: {:?}", message),
                }
                if self.notifications.len() >= MAX_PENDING_NOTIFICATIONS {
                    if let Some(dropped) = self.notifications.pop_front() {
                        tracing::warn!("notification queue full, dropping {:?}", dropped);
                    }
                }
                self.notifications.push_back(message);
            }
            MessageKind::Reply => {
                if self.query.is_none() {
                    tracing::error!("received reply {:?} with no query in flight", message);
                    return Ok(());
                }
                tracing::debug!("received reply: {:?}", message);
                if let Some(stale) = self.reply.replace(message) {
                    tracing::error!(
                        "reply {:?} arrived before reply {:?} was consumed; discarding the older one",
                        self.reply,
                        stale
                    );
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, failure: Failure) {
        if self.failure.is_none() {
            tracing::error!("session failed: {}", failure.to_error());
            self.failure = Some(failure);
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        self.failure.as_ref().map_or(Ok(()), |f| Err(f.to_error()))
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the end of one physical read, however it ends.
struct ReadingGuard<'a> {
    state: &'a Mutex<SessionState>,
    changed: &'a Notify,
}

impl Drop for ReadingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).reading = false;
        self.changed.notify_waiters();
    }
}

/// An established session with a gateway.
///
/// All operations take `&self`; share the connection between tasks with an
/// [`Arc`](std::sync::Arc). Queries are serialized against each other, while
/// any number of tasks may wait for notifications at once.
pub struct Connection<R, W> {
    prompt: Prompt,
    state: Mutex<SessionState>,
    changed: Notify,
    reader: AsyncMutex<StreamReader<R>>,
    writer: AsyncMutex<W>,
    query_lock: AsyncMutex<()>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Establishes a session on an already authenticated stream.
    ///
    /// # Errors
    ///
    /// See [`Connection::establish_with`].
    pub async fn establish(reader: R, writer: W) -> Result<Self> {
        Self::establish_with(StreamReader::new(reader), writer).await
    }

    /// Establishes a session on an already authenticated stream whose reader
    /// may hold buffered bytes.
    ///
    /// The monitoring state of a fresh session is unknown, so this enables
    /// diagnostic, reply and prompt monitoring, then sends a probe whose reply
    /// cannot come from anything earlier. Everything up to the probe's reply
    /// is discarded and the prompt that follows it becomes the session's
    /// message terminator.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BadPrompt`] if the probe reply has no usable
    /// prompt, or [`Error::Disconnected`] if the stream ends first.
    pub async fn establish_with(mut reader: StreamReader<R>, mut writer: W) -> Result<Self> {
        let mut setup = BytesMut::new();
        for mode in MonitoringMode::REQUIRED {
            setup.put_slice(&mode.enable_command());
            setup.put_slice(CRLF);
        }
        setup.put_slice(PROBE_QUERY);
        setup.put_slice(CRLF);
        writer.write_all(&setup).await?;
        writer.flush().await?;

        reader.read_until(PROBE_REPLY).await?;
        let tail = reader.read_until(b">").await?;
        let prompt = Prompt::from_probe_reply(&tail)?;
        tracing::info!("session established, prompt {}", prompt);

        Ok(Self {
            prompt,
            state: Mutex::new(SessionState::default()),
            changed: Notify::new(),
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            query_lock: AsyncMutex::new(()),
        })
    }

    /// Returns the protocol name inferred from the prompt, e.g. `QSE` for
    /// QS Standalone.
    #[must_use]
    pub fn protocol_name(&self) -> &[u8] {
        self.prompt.name()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match lock(&self.state).failure {
            None => ConnectionState::Established,
            Some(Failure::Closed) => ConnectionState::Closed,
            Some(_) => ConnectionState::Broken,
        }
    }

    /// Returns the number of notifications received but not yet read.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        lock(&self.state).notifications.len()
    }

    /// Sends a query and returns its reply.
    ///
    /// The reply is returned without the prompt; it is empty for commands
    /// that produce no output and otherwise ends with CRLF. Notifications
    /// that arrive meanwhile stay queued for [`Connection::read_notification`].
    ///
    /// Cancelling this call after the command was written leaves the
    /// session unable to match replies, and the next query fails with
    /// [`Error::Protocol`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if `command` contains a line break,
    /// [`Error::Protocol`] if a previous query's reply is still outstanding,
    /// or the session's fatal error.
    pub async fn query(&self, command: &[u8]) -> Result<Bytes> {
        let (reply, _) = self.run_query(command, false).await?;
        Ok(reply)
    }

    /// Sends a query and returns its reply plus a copy of every notification
    /// received while it was in flight.
    ///
    /// This is useful for queries like `?DEVICE` whose answer arrives as a
    /// notification. The collected notifications are also delivered to
    /// [`Connection::read_notification`] as usual, and may include unrelated
    /// ones that happened to arrive at the same time.
    ///
    /// # Errors
    ///
    /// See [`Connection::query`].
    pub async fn query_collect(&self, command: &[u8]) -> Result<(Bytes, Vec<Bytes>)> {
        self.run_query(command, true).await
    }

    /// Sends an action command and checks that the gateway accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gateway`] if the reply is `~ERROR`, or any error from
    /// [`Connection::query`].
    pub async fn command(&self, command: &[u8]) -> Result<()> {
        let reply = self.query(command).await?;
        let error_prefix = b"~ERROR";
        if reply.len() >= error_prefix.len()
            && reply[..error_prefix.len()].eq_ignore_ascii_case(error_prefix)
        {
            return Err(Error::Gateway {
                message: String::from_utf8_lossy(reply.trim_ascii()).into_owned(),
            });
        }
        Ok(())
    }

    /// Waits for the next notification.
    ///
    /// Notifications are delivered in arrival order, each to exactly one
    /// caller, however many tasks are waiting. Unread notifications are kept
    /// up to [`MAX_PENDING_NOTIFICATIONS`], oldest dropped first.
    ///
    /// # Errors
    ///
    /// Returns the session's fatal error once no queued notification is left.
    pub async fn read_notification(&self) -> Result<Bytes> {
        self.wait_for(|state| state.notifications.pop_front()).await
    }

    /// Returns a stream of notifications that ends after the first error.
    pub fn notifications(&self) -> impl Stream<Item = Result<Bytes>> + '_ {
        futures::stream::unfold(Some(self), |connection| async move {
            let connection = connection?;
            match connection.read_notification().await {
                Ok(message) => Some((Ok(message), Some(connection))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Closes the session.
    ///
    /// Callers waiting on the connection fail with [`Error::Closed`] once
    /// they wake.
    ///
    /// # Errors
    ///
    /// Returns an error if shutting down the write side fails.
    pub async fn disconnect(&self) -> Result<()> {
        lock(&self.state).fail(Failure::Closed);
        self.changed.notify_waiters();

        tracing::info!("disconnecting");
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }

    async fn run_query(&self, command: &[u8], collect: bool) -> Result<(Bytes, Vec<Bytes>)> {
        if command.iter().any(|&b| b == b'\r' || b == b'\n') {
            return Err(Error::InvalidCommand {
                command: String::from_utf8_lossy(command).into_owned(),
            });
        }

        let _query = self.query_lock.lock().await;
        {
            let mut state = lock(&self.state);
            state.ensure_usable()?;
            if state.query.is_some() || state.reply.is_some() {
                let error = Error::Protocol {
                    message: "query issued while a previous reply is outstanding".into(),
                };
                state.fail(Failure::from_error(&error));
                drop(state);
                self.changed.notify_waiters();
                return Err(error);
            }
            state.query = Some(PendingQuery {
                collected: collect.then(Vec::new),
            });
        }

        tracing::debug!("sending query: {:?}", Bytes::copy_from_slice(command));
        if let Err(e) = self.send_line(command).await {
            lock(&self.state).fail(Failure::Disconnected);
            self.changed.notify_waiters();
            return Err(e);
        }

        self.wait_for(|state| {
            let reply = state.reply.take()?;
            let collected = state
                .query
                .take()
                .and_then(|query| query.collected)
                .unwrap_or_default();
            Some((reply, collected))
        })
        .await
    }

    async fn send_line(&self, command: &[u8]) -> Result<()> {
        let mut line = BytesMut::with_capacity(command.len() + CRLF.len());
        line.put_slice(command);
        line.put_slice(CRLF);

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Waits until `ready` yields a value, reading messages as needed.
    ///
    /// `ready` runs under the state lock every time something changes. If
    /// no one else is reading, this caller reads and dispatches the next
    /// message itself.
    async fn wait_for<T, F>(&self, mut ready: F) -> Result<T>
    where
        F: FnMut(&mut SessionState) -> Option<T>,
    {
        loop {
            let notified = {
                let mut state = lock(&self.state);
                if let Some(value) = ready(&mut state) {
                    return Ok(value);
                }
                state.ensure_usable()?;
                if state.reading {
                    Some(self.changed.notified())
                } else {
                    state.reading = true;
                    None
                }
            };

            match notified {
                Some(notified) => notified.await,
                None => self.read_and_dispatch().await,
            }
        }
    }

    /// Reads one message and files it. The caller must have set `reading`.
    async fn read_and_dispatch(&self) {
        let _reading = ReadingGuard {
            state: &self.state,
            changed: &self.changed,
        };

        let result = self.reader.lock().await.read_message(&self.prompt).await;

        let mut state = lock(&self.state);
        let outcome = result.and_then(|message| state.dispatch(message).map_err(Error::from));
        if let Err(e) = outcome {
            state.fail(Failure::from_error(&e));
        }
    }
}

impl<R, W> fmt::Debug for Connection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("prompt", &self.prompt)
            .field("state", &*lock(&self.state))
            .finish_non_exhaustive()
    }
}
