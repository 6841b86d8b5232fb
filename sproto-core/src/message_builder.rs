//! Growable message assembly.
//!
//! Used while a protocol is constructing an outbound body (e.g. SUB topic
//! filters concatenated with a payload, or REP stamping a backtrace) before
//! handing it to the stream session as frozen `Bytes`. Mirrors the
//! arena/freeze discipline in `alloc`: mutate through `BytesMut`, then
//! `finish()` hands back an immutable, cheaply cloneable value.

use crate::message::Message;
use bytes::{BufMut, Bytes, BytesMut};

/// A builder for a single message's header and body, growable in place.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    header: BytesMut,
    body: BytesMut,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(header_cap: usize, body_cap: usize) -> Self {
        Self {
            header: BytesMut::with_capacity(header_cap),
            body: BytesMut::with_capacity(body_cap),
        }
    }

    /// Append bytes to the header (e.g. push one more backtrace hop).
    pub fn push_header(&mut self, bytes: &[u8]) -> &mut Self {
        self.header.extend_from_slice(bytes);
        self
    }

    /// Prepend bytes to the header (REP/RESPONDENT backtrace grows at the
    /// front as a message travels further from its originator).
    pub fn prepend_header(&mut self, bytes: &[u8]) -> &mut Self {
        let mut combined = BytesMut::with_capacity(bytes.len() + self.header.len());
        combined.extend_from_slice(bytes);
        combined.extend_from_slice(&self.header);
        self.header = combined;
        self
    }

    /// Write a big-endian u32 stamp as the entire header (REQ/SURVEYOR).
    pub fn set_u32_header(&mut self, stamp: u32) -> &mut Self {
        self.header.clear();
        self.header.put_u32(stamp);
        self
    }

    pub fn push_body(&mut self, bytes: &[u8]) -> &mut Self {
        self.body.extend_from_slice(bytes);
        self
    }

    #[must_use]
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Freeze into an immutable [`Message`].
    #[must_use]
    pub fn finish(self) -> Message {
        Message::with_header(self.header.freeze(), self.body.freeze())
    }

    /// Freeze into a single contiguous wire buffer (header ++ body), the
    /// shape handed to the stream session for framing.
    #[must_use]
    pub fn finish_wire(self) -> Bytes {
        if self.header.is_empty() {
            return self.body.freeze();
        }
        let mut combined = BytesMut::with_capacity(self.header.len() + self.body.len());
        combined.extend_from_slice(&self.header);
        combined.extend_from_slice(&self.body);
        combined.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_header_and_body_independently() {
        let mut b = MessageBuilder::new();
        b.set_u32_header(0x8000_0001).push_body(b"ping");
        let msg = b.finish();
        assert_eq!(msg.header(), &0x8000_0001u32.to_be_bytes());
        assert_eq!(msg.body(), b"ping");
    }

    #[test]
    fn prepend_header_grows_backtrace_at_front() {
        let mut b = MessageBuilder::new();
        b.push_header(&[1, 2, 3, 4]);
        b.prepend_header(&[5, 6, 7, 8]);
        let msg = b.finish();
        assert_eq!(msg.header(), &[5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn finish_wire_concatenates() {
        let mut b = MessageBuilder::new();
        b.set_u32_header(7).push_body(b"x");
        let wire = b.finish_wire();
        assert_eq!(wire.len(), 5);
    }
}
