//! The `Message` type: an SP header plus a body.
//!
//! Wire framing never encodes the header/body split; it is reconstructed by
//! each protocol (see `sproto_core::wire` and the REQ/SURVEYOR/REP stamps).
//! Both halves are `Bytes`, so a message handed to multiple subscribers
//! (PUB/SUB fan-out) clones cheaply via refcount rather than copying.

use bytes::Bytes;

/// An SP message: an optional protocol header plus an opaque body.
///
/// `header` carries protocol-specific framing state — the 4-byte
/// request/reply/survey stamp, a REP/RESPONDENT backtrace stack, nothing at
/// all for PAIR/PUB/SUB/PUSH/PULL/BUS. It never appears on the wire as a
/// separate field; each protocol concatenates it with the body before
/// handing the frame to the stream session, and splits it back out on
/// receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: Bytes,
    body: Bytes,
}

impl Message {
    /// An empty message: no header, no body.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header: Bytes::new(),
            body: Bytes::new(),
        }
    }

    /// A message with a body and no protocol header.
    #[must_use]
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self {
            header: Bytes::new(),
            body: body.into(),
        }
    }

    /// A message with both header and body already split.
    #[must_use]
    pub fn with_header(header: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub const fn header_bytes(&self) -> &Bytes {
        &self.header
    }

    #[must_use]
    pub const fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Total size of the message once framed (header length + body length).
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    /// Replace the header, keeping the body.
    #[must_use]
    pub fn with_new_header(mut self, header: impl Into<Bytes>) -> Self {
        self.header = header.into();
        self
    }

    /// Strip the header off, returning it along with the remaining message.
    #[must_use]
    pub fn take_header(mut self) -> (Bytes, Self) {
        let header = std::mem::take(&mut self.header);
        (header, self)
    }

    /// Concatenate header and body into a single contiguous buffer, the
    /// shape the stream session frames onto the wire.
    #[must_use]
    pub fn to_wire_bytes(&self) -> Bytes {
        if self.header.is_empty() {
            return self.body.clone();
        }
        let mut buf = bytes::BytesMut::with_capacity(self.wire_len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.body);
        buf.freeze()
    }

    /// Split a contiguous wire buffer into header/body given a known header
    /// length (used by protocols with a fixed-size stamp, e.g. REQ's 4 bytes).
    #[must_use]
    pub fn from_wire_bytes(mut raw: Bytes, header_len: usize) -> Option<Self> {
        if raw.len() < header_len {
            return None;
        }
        let header = raw.split_to(header_len);
        Some(Self { header, body: raw })
    }
}

impl From<Bytes> for Message {
    fn from(body: Bytes) -> Self {
        Self::from_body(body)
    }
}

impl From<Message> for Bytes {
    fn from(msg: Message) -> Self {
        msg.to_wire_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_only_round_trips() {
        let msg = Message::from_body(&b"hello"[..]);
        assert_eq!(msg.header(), b"");
        assert_eq!(msg.body(), b"hello");
        assert_eq!(msg.to_wire_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn header_and_body_concatenate_on_wire() {
        let msg = Message::with_header(&[0x80, 0, 0, 1][..], &b"payload"[..]);
        let wire = msg.to_wire_bytes();
        assert_eq!(&wire[..4], &[0x80, 0, 0, 1]);
        assert_eq!(&wire[4..], b"payload");
    }

    #[test]
    fn from_wire_bytes_splits_known_header_len() {
        let raw = Bytes::from_static(&[0x80, 0, 0, 1, b'h', b'i']);
        let msg = Message::from_wire_bytes(raw, 4).unwrap();
        assert_eq!(msg.header(), &[0x80, 0, 0, 1]);
        assert_eq!(msg.body(), b"hi");
    }

    #[test]
    fn from_wire_bytes_rejects_short_buffer() {
        let raw = Bytes::from_static(&[0x80, 0]);
        assert!(Message::from_wire_bytes(raw, 4).is_none());
    }
}
