//! Stream message framing: after the handshake, every message is an
//! 8-byte big-endian length followed by that many bytes of concatenated
//! SP-header+body. The split between header and body is not on the wire
//! — each protocol reconstructs it from the flat payload.
//!
//! The decoder has a fast path (whole frame already buffered → zero-copy
//! slice) and a slow path (reassemble into a staging `BytesMut`), unlike
//! ZMTP's flag-byte-prefixed, possibly-9-byte header, SP's length prefix
//! is fixed at 8 bytes with no flags.

use bytes::{Bytes, BytesMut};
use sproto_core::buffer::SegmentedBuffer;
use sproto_core::error::Error;
use sproto_core::wire;
use std::io;
use thiserror::Error;

/// Stream framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("message of {size} bytes exceeds RCVMAXSIZE of {max} bytes")]
    TooLarge { size: u64, max: u64 },
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        Self::new(io::ErrorKind::InvalidData, err)
    }
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooLarge { size, max } => Self::MessageTooLarge {
                size: size as usize,
                max: max as usize,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

const LENGTH_PREFIX_SIZE: usize = 8;

/// Stateful frame decoder: 8-byte BE length prefix, then that many raw
/// bytes. `max_size` is the socket's `RCVMAXSIZE` (`None` disables the
/// check, matching the `-1` wire value).
pub struct FrameDecoder {
    pending_len: Option<u64>,
    staging: BytesMut,
    max_size: Option<u64>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(max_size: Option<u64>) -> Self {
        Self {
            pending_len: None,
            staging: BytesMut::new(),
            max_size,
        }
    }

    /// Decode a single frame from `src`.
    ///
    /// - `Ok(Some(payload))`: one full frame decoded (header+body, flat).
    /// - `Ok(None)`: need more data.
    /// - `Err`: the frame exceeds `RCVMAXSIZE` — the caller must close the
    ///   connection.
    pub fn decode(&mut self, src: &mut SegmentedBuffer) -> Result<Option<Bytes>> {
        if let Some(len) = self.pending_len {
            let needed = (len as usize) - self.staging.len();
            let take = needed.min(src.len());
            if let Some(bytes) = src.take_bytes(take) {
                self.staging.extend_from_slice(&bytes);
            }
            if (self.staging.len() as u64) < len {
                return Ok(None);
            }
            self.pending_len = None;
            return Ok(Some(self.staging.split().freeze()));
        }

        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut hdr = [0u8; LENGTH_PREFIX_SIZE];
        if !src.copy_prefix(LENGTH_PREFIX_SIZE, &mut hdr) {
            return Ok(None);
        }
        let len = wire::get_u64(&hdr);

        if let Some(max) = self.max_size {
            if len > max {
                return Err(FrameError::TooLarge { size: len, max });
            }
        }

        src.advance(LENGTH_PREFIX_SIZE);

        // Zero-length body fast path: no second read needed.
        if len == 0 {
            return Ok(Some(Bytes::new()));
        }

        let usize_len = len as usize;

        // Fast path: whole body already buffered.
        if src.len() >= usize_len {
            let payload = src
                .take_bytes(usize_len)
                .expect("len check ensures body is available");
            return Ok(Some(payload));
        }

        // Slow path: reassemble across reads.
        self.pending_len = Some(len);
        self.staging = BytesMut::with_capacity(usize_len);
        let available = src.len();
        if let Some(bytes) = src.take_bytes(available) {
            self.staging.extend_from_slice(&bytes);
        }

        Ok(None)
    }
}

/// Encode a flat header+body payload into `[8-byte BE length][payload]`.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    wire::put_u64(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out.freeze()
}

/// Encode directly from separate header/body slices, avoiding an
/// intermediate concatenation allocation on the hot send path — a
/// `[length, SP header, body]` 3-vector iovec framing.
#[must_use]
pub fn encode_frame_parts(header: &[u8], body: &[u8]) -> Bytes {
    let total = header.len() + body.len();
    let mut out = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + total);
    wire::put_u64(&mut out, total as u64);
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_whole_frame_in_one_shot() {
        let mut buf = SegmentedBuffer::new();
        buf.push(encode_frame(b"hello"));
        let mut dec = FrameDecoder::new(None);
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"hello");
    }

    #[test]
    fn decodes_zero_length_body_without_second_read() {
        let mut buf = SegmentedBuffer::new();
        buf.push(encode_frame(b""));
        let mut dec = FrameDecoder::new(None);
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn reassembles_fragmented_frame() {
        let whole = encode_frame(b"0123456789");
        let mut dec = FrameDecoder::new(None);

        let mut buf = SegmentedBuffer::new();
        buf.push(whole.slice(0..5));
        assert!(dec.decode(&mut buf).unwrap().is_none());

        buf.push(whole.slice(5..));
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"0123456789");
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut buf = SegmentedBuffer::new();
        buf.push(encode_frame(&[0u8; 100]));
        let mut dec = FrameDecoder::new(Some(10));
        assert!(matches!(dec.decode(&mut buf), Err(FrameError::TooLarge { size: 100, max: 10 })));
    }

    #[test]
    fn accepts_body_at_exactly_max_size() {
        let mut buf = SegmentedBuffer::new();
        buf.push(encode_frame(&[0u8; 10]));
        let mut dec = FrameDecoder::new(Some(10));
        assert!(dec.decode(&mut buf).unwrap().is_some());
    }
}
