//! Message framing for the integration protocol.
//!
//! Once prompts are enabled, every message the gateway sends ends with the
//! session's prompt marker. A message with no content is the bare marker,
//! anything else is one or more lines followed by the marker:
//! ```text
//! QSE>                                  empty reply
//! ~DETAILS,SN:00F535EB,...\r\nQSE>      reply
//! ~DEVICE,00F535EB,2,14,50.00\r\nQSE>   notification
//! ```
//! Replies and notifications look alike on the wire; [`classify`] tells them
//! apart by their leading token.

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::command::CRLF;

/// Maximum number of bytes buffered while waiting for a message to end.
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Leading tokens (compared case-insensitively) that mark a message as a
/// synchronous reply. Everything else is a notification, including `~DEVICE`
/// and `~OUTPUT` lines triggered by a query.
pub const REPLY_PREFIXES: [&[u8]; 5] = [
    b"~DETAILS",
    b"~ERROR",
    b"~INTEGRATIONID",
    b"~PROGRAMMING",
    b"~ETHERNET",
];

/// The prompt marker negotiated for one session, e.g. `QSE`.
#[derive(Clone, PartialEq, Eq)]
pub struct Prompt {
    name: Bytes,
    // "\r\nQSE>"; the bare marker "QSE>" is its tail.
    suffix: Bytes,
}

impl Prompt {
    /// Creates a prompt from its alphanumeric name.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BadPrompt`] if the name is empty or not alphanumeric.
    pub fn new(name: &[u8]) -> Result<Self, FrameError> {
        if name.is_empty() || !name.iter().all(u8::is_ascii_alphanumeric) {
            return Err(FrameError::BadPrompt(Bytes::copy_from_slice(name)));
        }
        let mut suffix = Vec::with_capacity(name.len() + 3);
        suffix.extend_from_slice(CRLF);
        suffix.extend_from_slice(name);
        suffix.push(b'>');
        Ok(Self {
            name: Bytes::copy_from_slice(name),
            suffix: Bytes::from(suffix),
        })
    }

    /// Parses the tail of the probe reply.
    ///
    /// `data` is everything after `~MONITORING,2,` up to and including the
    /// next `>`, which has the shape `<digit>\r\n<prompt>>`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BadPrompt`] if `data` does not have that shape.
    pub fn from_probe_reply(data: &[u8]) -> Result<Self, FrameError> {
        let bad = || FrameError::BadPrompt(Bytes::copy_from_slice(data));
        match data {
            [digit, b'\r', b'\n', name @ .., b'>'] if digit.is_ascii_digit() => {
                Self::new(name).map_err(|_| bad())
            }
            _ => Err(bad()),
        }
    }

    /// Returns the prompt name, e.g. `QSE`.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the bare marker, e.g. `QSE>`.
    #[must_use]
    pub fn marker(&self) -> &[u8] {
        &self.suffix[CRLF.len()..]
    }

    /// Returns the terminator of a non-empty message, e.g. `\r\nQSE>`.
    #[must_use]
    pub fn suffix(&self) -> &[u8] {
        &self.suffix
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prompt({self})")
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))
    }
}

/// Whether a message answers the in-flight query or arrived on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Synchronous reply to a query.
    Reply,
    /// Unsolicited notification.
    Notification,
}

/// Classifies a message with its prompt stripped.
///
/// # Errors
///
/// Returns [`FrameError::MalformedNotification`] if a notification does not
/// consist of exactly one CRLF-terminated line. That can only happen when the
/// framing itself has gone wrong.
pub fn classify(message: &[u8]) -> Result<MessageKind, FrameError> {
    if message.is_empty() {
        return Ok(MessageKind::Reply);
    }

    let is_reply = REPLY_PREFIXES.iter().any(|prefix| {
        message.len() >= prefix.len() && message[..prefix.len()].eq_ignore_ascii_case(prefix)
    });
    if is_reply {
        return Ok(MessageKind::Reply);
    }

    match message.strip_suffix(CRLF) {
        Some(line) if find(line, CRLF).is_none() => Ok(MessageKind::Notification),
        _ => Err(FrameError::MalformedNotification(Bytes::copy_from_slice(
            message,
        ))),
    }
}

/// Returns the position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Message decoder that handles partial data.
///
/// Bytes received from the gateway are fed in as they arrive and whole
/// messages are decoded out. Anything not yet consumed stays buffered, so a
/// caller that stops reading halfway through a message loses nothing.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: BytesMut,
    // Bytes already searched for the current terminator.
    scanned: usize,
}

impl MessageDecoder {
    /// Creates a new message decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the internal buffer for reading directly into it.
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Consumes everything up to and including the first `delimiter`.
    ///
    /// Returns `Ok(None)` if the delimiter has not arrived yet.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the buffer grows past
    /// [`MAX_MESSAGE_SIZE`] without the delimiter.
    pub fn decode_until(&mut self, delimiter: &[u8]) -> Result<Option<Bytes>, FrameError> {
        match self.search(0, delimiter) {
            Some(pos) => Ok(Some(self.take(pos + delimiter.len()))),
            None => self.incomplete(),
        }
    }

    /// Attempts to decode the next complete message.
    ///
    /// Only the first buffered byte decides how the message is read: if it is
    /// the prompt's first byte the message must be the bare marker and is
    /// returned as empty; otherwise it is content running up to the next
    /// `\r\n<prompt>>`, returned with its CRLF but without the marker.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::UnexpectedMarker`] if a bare marker is wrong, or
    /// [`FrameError::TooLarge`] if a message outgrows [`MAX_MESSAGE_SIZE`].
    pub fn decode(&mut self, prompt: &Prompt) -> Result<Option<Bytes>, FrameError> {
        let Some(&first) = self.buffer.first() else {
            return Ok(None);
        };

        let marker = prompt.marker();
        if first == marker[0] {
            if self.buffer.len() < marker.len() {
                return Ok(None);
            }
            if &self.buffer[..marker.len()] != marker {
                return Err(FrameError::UnexpectedMarker {
                    expected: Bytes::copy_from_slice(marker),
                    got: Bytes::copy_from_slice(&self.buffer[..marker.len()]),
                });
            }
            self.buffer.advance(marker.len());
            self.scanned = 0;
            return Ok(Some(Bytes::new()));
        }

        let suffix = prompt.suffix();
        match self.search(1, suffix) {
            Some(pos) => {
                let mut message = self.buffer.split_to(pos + suffix.len());
                message.truncate(pos + CRLF.len());
                self.scanned = 0;
                Ok(Some(message.freeze()))
            }
            None => self.incomplete(),
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn search(&mut self, from: usize, needle: &[u8]) -> Option<usize> {
        // Resume where the last attempt stopped, backing up in case the
        // needle straddled the end of the previous data.
        let start = self
            .scanned
            .saturating_sub(needle.len().saturating_sub(1))
            .max(from);
        if start >= self.buffer.len() {
            return None;
        }
        let found = find(&self.buffer[start..], needle).map(|pos| start + pos);
        if found.is_none() {
            self.scanned = self.buffer.len();
        }
        found
    }

    fn take(&mut self, len: usize) -> Bytes {
        self.scanned = 0;
        self.buffer.split_to(len).freeze()
    }

    fn incomplete(&self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() > MAX_MESSAGE_SIZE {
            return Err(FrameError::TooLarge {
                size: self.buffer.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qse() -> Prompt {
        Prompt::new(b"QSE").unwrap()
    }

    #[test]
    fn test_prompt_parts() {
        let prompt = qse();
        assert_eq!(prompt.name(), b"QSE");
        assert_eq!(prompt.marker(), b"QSE>");
        assert_eq!(prompt.suffix(), b"\r\nQSE>");
        assert_eq!(prompt.to_string(), "QSE");
    }

    #[test]
    fn test_prompt_from_probe_reply() {
        let prompt = Prompt::from_probe_reply(b"2\r\nQSE>").unwrap();
        assert_eq!(prompt, qse());

        assert!(Prompt::from_probe_reply(b"2\r\n>").is_err());
        assert!(Prompt::from_probe_reply(b"x\r\nQSE>").is_err());
        assert!(Prompt::from_probe_reply(b"2\nQSE>").is_err());
        assert!(Prompt::from_probe_reply(b"2\r\nQ-E>").is_err());
        assert!(Prompt::from_probe_reply(b"2\r\nQSE").is_err());
    }

    #[test]
    fn test_decode_empty_reply() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"QSE>");
        assert_eq!(decoder.decode(&qse()).unwrap(), Some(Bytes::new()));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_one_line_reply() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"~DETAILS,SN:00F535EB\r\nQSE>");
        assert_eq!(
            decoder.decode(&qse()).unwrap(),
            Some(Bytes::from_static(b"~DETAILS,SN:00F535EB\r\n"))
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_partial_message() {
        let prompt = qse();
        let mut decoder = MessageDecoder::new();

        decoder.feed(b"~DEVICE,00F535EB,2,14,50.00\r\nQS");
        assert_eq!(decoder.decode(&prompt).unwrap(), None);

        decoder.feed(b"E>Q");
        assert_eq!(
            decoder.decode(&prompt).unwrap(),
            Some(Bytes::from_static(b"~DEVICE,00F535EB,2,14,50.00\r\n"))
        );

        // A lone prompt byte is not enough to decide anything.
        assert_eq!(decoder.decode(&prompt).unwrap(), None);
        decoder.feed(b"SE>");
        assert_eq!(decoder.decode(&prompt).unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn test_decode_multiple_messages() {
        let prompt = qse();
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"QSE>~ERROR,1\r\nQSE>~DETAILS,SN:1\r\n~DETAILS,SN:2\r\nQSE>");

        assert_eq!(decoder.decode(&prompt).unwrap(), Some(Bytes::new()));
        assert_eq!(
            decoder.decode(&prompt).unwrap(),
            Some(Bytes::from_static(b"~ERROR,1\r\n"))
        );
        assert_eq!(
            decoder.decode(&prompt).unwrap(),
            Some(Bytes::from_static(b"~DETAILS,SN:1\r\n~DETAILS,SN:2\r\n"))
        );
        assert_eq!(decoder.decode(&prompt).unwrap(), None);
    }

    #[test]
    fn test_decode_bad_marker() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"QXY>");
        assert!(matches!(
            decoder.decode(&qse()),
            Err(FrameError::UnexpectedMarker { .. })
        ));
    }

    #[test]
    fn test_decode_too_large() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(&vec![b'a'; MAX_MESSAGE_SIZE]);
        assert_eq!(decoder.decode(&qse()).unwrap(), None);

        decoder.feed(b"a");
        assert_eq!(
            decoder.decode(&qse()),
            Err(FrameError::TooLarge {
                size: MAX_MESSAGE_SIZE + 1,
                max: MAX_MESSAGE_SIZE,
            })
        );
        assert!(matches!(
            decoder.decode_until(b"login: "),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_until() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"garbage\r\nQNET> ~MONITORING,2,2\r\nQSE>");
        assert_eq!(
            decoder.decode_until(b"~MONITORING,2,").unwrap(),
            Some(Bytes::from_static(b"garbage\r\nQNET> ~MONITORING,2,"))
        );
        assert_eq!(
            decoder.decode_until(b">").unwrap(),
            Some(Bytes::from_static(b"2\r\nQSE>"))
        );
        assert_eq!(decoder.decode_until(b">").unwrap(), None);
    }

    #[test]
    fn test_decode_until_split_delimiter() {
        let mut decoder = MessageDecoder::new();
        decoder.feed(b"hello log");
        assert_eq!(decoder.decode_until(b"login: ").unwrap(), None);
        decoder.feed(b"in: rest");
        assert_eq!(
            decoder.decode_until(b"login: ").unwrap(),
            Some(Bytes::from_static(b"hello login: "))
        );
        assert_eq!(decoder.buffered(), 4);
    }

    #[test]
    fn test_classify_replies() {
        assert_eq!(classify(b"").unwrap(), MessageKind::Reply);
        assert_eq!(
            classify(b"~ERROR,COMMAND NOT FOUND\r\n").unwrap(),
            MessageKind::Reply
        );
        assert_eq!(
            classify(b"~details,SN:1\r\n~details,SN:2\r\n").unwrap(),
            MessageKind::Reply
        );
        assert_eq!(
            classify(b"~INTEGRATIONID,x,OUTPUT,1,1\r\n").unwrap(),
            MessageKind::Reply
        );
    }

    #[test]
    fn test_classify_notifications() {
        assert_eq!(
            classify(b"~DEVICE,00F535EB,2,14,50.00\r\n").unwrap(),
            MessageKind::Notification
        );
        assert_eq!(
            classify(b"~OUTPUT,5,1,100.00\r\n").unwrap(),
            MessageKind::Notification
        );
    }

    #[test]
    fn test_classify_malformed_notification() {
        assert!(classify(b"~DEVICE,1,2,3").is_err());
        assert!(classify(b"~DEVICE,1,2,3\r\n~DEVICE,1,2,4\r\n").is_err());
    }
}
