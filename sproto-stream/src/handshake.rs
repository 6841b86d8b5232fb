//! Stream transport opening handshake: an 8-byte sequence exchanged
//! by both peers before any framed message may flow.
//!
//! Layout: `0x00 'S' 'P' 0x00 P1 P0 0x00 0x00` where `P1 P0` is the
//! big-endian 16-bit protocol identifier (the peer's socket type). A
//! fixed-size, synchronously-parseable preamble exchanged before the
//! framed data path opens, replacing ZMTP's 64-byte greeting/mechanism
//! negotiation with
//! the much smaller SP preamble.

use bytes::{Bytes, BytesMut};

/// Handshake is always exactly 8 bytes.
pub const HANDSHAKE_SIZE: usize = 8;

const PREFIX: [u8; 4] = [0x00, b'S', b'P', 0x00];

/// Build the 8-byte handshake this socket sends to its peer.
#[must_use]
pub fn build_handshake(protocol_id: u16) -> Bytes {
    let mut b = BytesMut::with_capacity(HANDSHAKE_SIZE);
    b.extend_from_slice(&PREFIX);
    b.extend_from_slice(&protocol_id.to_be_bytes());
    b.extend_from_slice(&[0x00, 0x00]);
    b.freeze()
}

/// Error rejecting a peer's handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake prefix mismatch")]
    PrefixMismatch,
    #[error("peer protocol identifier not accepted by this socket")]
    UnacceptedPeer,
}

/// Parse the peer's 8-byte handshake, returning its protocol identifier.
/// Does not check acceptance — that's `is_peer`'s job, since it depends on
/// this socket's own protocol.
pub fn parse_handshake(src: &[u8]) -> Result<u16, HandshakeError> {
    debug_assert_eq!(src.len(), HANDSHAKE_SIZE);
    if src[0..4] != PREFIX {
        return Err(HandshakeError::PrefixMismatch);
    }
    Ok(u16::from_be_bytes([src[4], src[5]]))
}

/// Whether `peer_protocol` is an acceptable partner for `local_protocol`.
/// SP protocol peering is symmetric-by-convention (REQ peers with REP,
/// SURVEYOR with RESPONDENT, etc.) but the wire handshake itself doesn't
/// encode the pairing rule — each protocol module supplies its own
/// accepted-peer set via this function so the session stays protocol-agnostic.
#[must_use]
pub fn is_peer(accepted: &[u16], peer_protocol: u16) -> bool {
    accepted.contains(&peer_protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = build_handshake(0x0010);
        assert_eq!(bytes.len(), HANDSHAKE_SIZE);
        assert_eq!(parse_handshake(&bytes).unwrap(), 0x0010);
    }

    #[test]
    fn rejects_bad_prefix() {
        let mut bad = [0u8; 8];
        bad[1] = b'X';
        assert_eq!(parse_handshake(&bad), Err(HandshakeError::PrefixMismatch));
    }

    #[test]
    fn is_peer_checks_accepted_set() {
        assert!(is_peer(&[0x0010, 0x0011], 0x0011));
        assert!(!is_peer(&[0x0010], 0x0030));
    }
}
