//! WebSocket binary-frame codec: the WebSocket binary/text frame boundary
//! stands in for the message boundary that length-prefixed framing gives
//! the TCP/IPC transports; all other behavior is preserved. The HTTP
//! upgrade handshake itself is out of
//! scope — callers hand this codec an already-upgraded byte stream — but
//! the RFC 6455 frame header (opcode, mask bit, extended length, masking
//! key) still has to be parsed and produced for real, since it's the thing
//! that actually delimits one SP message from the next on this transport.
//!
//! Grounded on `codec.rs`'s `SegmentedBuffer`-backed reassembly: same
//! incremental-decode shape, different header format.

use crate::base::PipeId;
use sproto_core::buffer::SegmentedBuffer;
use sproto_core::error::{Error, Result};
use bytes::{Bytes, BytesMut};

const OPCODE_CONTINUATION: u8 = 0x0;
const OPCODE_TEXT: u8 = 0x1;
const OPCODE_BINARY: u8 = 0x2;
const OPCODE_CLOSE: u8 = 0x8;
const OPCODE_PING: u8 = 0x9;
const OPCODE_PONG: u8 = 0xA;

/// One fully decoded WS frame's payload, tagged by what kind of frame
/// carried it. A `Control` frame (ping/pong/close) never becomes an SP
/// message; the byte-pump loop answers it directly and keeps decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Message(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

/// Incremental WS frame decoder — the WS-transport analog of
/// `codec::FrameDecoder`. Reassembles one frame at a time out of whatever
/// partial bytes have arrived so far; never buffers more than one frame's
/// worth beyond `max_size`.
pub struct WsFrameDecoder {
    max_size: usize,
}

impl WsFrameDecoder {
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Attempt to decode one frame from the front of `buf`. Returns
    /// `Ok(None)` if the header or payload isn't fully buffered yet.
    /// Continuation/fragmented frames are not supported — every message is
    /// expected to arrive as a single complete frame, matching how PAIR/
    /// PUB/PUSH/etc. already treat "one send = one frame" on every other
    /// transport.
    pub fn decode(&self, buf: &mut SegmentedBuffer) -> Result<Option<WsFrame>> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let mut head = [0u8; 2];
        buf.copy_prefix(2, &mut head);
        let fin = head[0] & 0x80 != 0;
        let opcode = head[0] & 0x0F;
        let masked = head[1] & 0x80 != 0;
        let len7 = head[1] & 0x7F;

        if !fin && opcode != OPCODE_CONTINUATION {
            return Err(Error::Protocol("WS fragmented frames are not supported".into()));
        }

        let mut header_len = 2usize;
        let payload_len: usize = match len7 {
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                let mut ext = [0u8; 4];
                buf.copy_prefix(4, &mut ext);
                header_len = 4;
                u16::from_be_bytes([ext[2], ext[3]]) as usize
            }
            127 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut ext = [0u8; 10];
                buf.copy_prefix(10, &mut ext);
                header_len = 10;
                u64::from_be_bytes(ext[2..10].try_into().unwrap()) as usize
            }
            n => n as usize,
        };

        if payload_len > self.max_size {
            return Err(Error::MessageTooLarge { size: payload_len, max: self.max_size });
        }

        let mask_len = if masked { 4 } else { 0 };
        let total = header_len + mask_len + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let frame = buf.take_bytes(total).expect("len check above ensures total bytes are buffered");
        let mask = if masked {
            Some([frame[header_len], frame[header_len + 1], frame[header_len + 2], frame[header_len + 3]])
        } else {
            None
        };
        let payload_start = header_len + mask_len;
        let mut payload = BytesMut::from(&frame[payload_start..]);
        if let Some(key) = mask {
            for (i, b) in payload.iter_mut().enumerate() {
                *b ^= key[i % 4];
            }
        }
        let payload = payload.freeze();

        Ok(Some(match opcode {
            OPCODE_TEXT | OPCODE_BINARY | OPCODE_CONTINUATION => WsFrame::Message(payload),
            OPCODE_PING => WsFrame::Ping(payload),
            OPCODE_PONG => WsFrame::Pong(payload),
            OPCODE_CLOSE => WsFrame::Close,
            other => return Err(Error::Protocol(format!("unknown WS opcode {other}"))),
        }))
    }
}

/// Encode `payload` as a single unfragmented binary frame. `masked`
/// distinguishes the client role (every client-to-server frame must be
/// masked per RFC 6455 §5.3) from the server role (never masked); the
/// connector/acceptor side of a transport sets this once at connect time.
#[must_use]
pub fn encode_binary_frame(payload: &[u8], masked: bool) -> Bytes {
    encode_frame(OPCODE_BINARY, payload, masked)
}

#[must_use]
pub fn encode_pong(payload: &[u8], masked: bool) -> Bytes {
    encode_frame(OPCODE_PONG, payload, masked)
}

fn encode_frame(opcode: u8, payload: &[u8], masked: bool) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + 14);
    out.extend_from_slice(&[0x80 | opcode]);

    let mask_bit = if masked { 0x80 } else { 0x00 };
    let len = payload.len();
    if len < 126 {
        out.extend_from_slice(&[mask_bit | len as u8]);
    } else if len <= u16::MAX as usize {
        out.extend_from_slice(&[mask_bit | 126]);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&[mask_bit | 127]);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if masked {
        let key: [u8; 4] = rand::random();
        out.extend_from_slice(&key);
        let start = out.len();
        out.extend_from_slice(payload);
        for (i, b) in out[start..].iter_mut().enumerate() {
            *b ^= key[i % 4];
        }
    } else {
        out.extend_from_slice(payload);
    }

    out.freeze()
}

/// Marker type identifying which pipe a WS-carried SP frame belongs to,
/// reused by the transport layer's bookkeeping — distinct from `PipeId`
/// only in name, kept separate so transport code never accidentally mixes
/// up a wire-level handle with the protocol-level one.
pub type WsPipeId = PipeId;

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buf: &mut SegmentedBuffer, bytes: Bytes) {
        buf.push(bytes);
    }

    #[test]
    fn round_trips_a_small_unmasked_frame() {
        let encoded = encode_binary_frame(b"hello", false);
        let mut buf = SegmentedBuffer::new();
        feed(&mut buf, encoded);
        let decoder = WsFrameDecoder::new(1 << 20);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, WsFrame::Message(Bytes::from_static(b"hello")));
    }

    #[test]
    fn round_trips_a_masked_frame() {
        let encoded = encode_binary_frame(b"client payload", true);
        let mut buf = SegmentedBuffer::new();
        feed(&mut buf, encoded);
        let decoder = WsFrameDecoder::new(1 << 20);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, WsFrame::Message(Bytes::from_static(b"client payload")));
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let encoded = encode_binary_frame(b"0123456789", false);
        let mut buf = SegmentedBuffer::new();
        feed(&mut buf, encoded.slice(0..3));
        let decoder = WsFrameDecoder::new(1 << 20);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let encoded = encode_binary_frame(&vec![0u8; 100], false);
        let mut buf = SegmentedBuffer::new();
        feed(&mut buf, encoded);
        let decoder = WsFrameDecoder::new(10);
        assert!(matches!(decoder.decode(&mut buf), Err(Error::MessageTooLarge { .. })));
    }

    #[test]
    fn long_length_uses_16_bit_extended_field() {
        let payload = vec![7u8; 200];
        let encoded = encode_binary_frame(&payload, false);
        let mut buf = SegmentedBuffer::new();
        feed(&mut buf, encoded);
        let decoder = WsFrameDecoder::new(1 << 20);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, WsFrame::Message(Bytes::from(payload)));
    }
}
