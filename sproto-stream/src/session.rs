//! Stream-framing session: turns a connected byte-stream endpoint
//! into a message-oriented pipe for the protocol above. Sans-IO — the
//! session only ever sees bytes in and produces events out; the endpoint
//! socket owns the actual I/O.
//!
//! An `on_bytes` accumulate-and-drain loop over a two-state sequence
//! (`Handshake`, `Active`), since SP has no separate
//! mechanism-negotiation phase.

use crate::codec::{FrameDecoder, FrameError};
use crate::handshake::{self, HandshakeError, HANDSHAKE_SIZE};
use bytes::{Bytes, BytesMut};
use sproto_core::buffer::SegmentedBuffer;

/// Events emitted by the session (transport-agnostic; the endpoint socket
/// is responsible for actually writing `SendBytes` payloads to the wire).
pub enum SessionEvent {
    /// Send raw bytes immediately (used for the handshake only).
    SendBytes(Bytes),

    /// A fully decoded message frame (flat header+body payload).
    Frame(Bytes),

    /// Handshake completed successfully.
    HandshakeComplete { peer_protocol: u16 },

    /// Fatal protocol error; the caller must close the connection.
    Error(SessionError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error("{size} byte frame exceeds RCVMAXSIZE of {max} bytes")]
    FrameTooLarge { size: u64, max: u64 },
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooLarge { size, max } => Self::FrameTooLarge { size, max },
        }
    }
}

enum State {
    Handshake { buffer: BytesMut },
    Active { decoder: FrameDecoder },
}

/// Sans-IO stream session. One instance per connected endpoint.
pub struct StreamSession {
    state: State,
    local_protocol: u16,
    accepted_peers: Vec<u16>,
    max_size: Option<u64>,
    recv: SegmentedBuffer,
}

impl StreamSession {
    /// `local_protocol` is this socket's own protocol identifier;
    /// `accepted_peers` lists the protocol identifiers this socket will
    /// peer with (e.g. REQ accepts REP, SURVEYOR accepts RESPONDENT).
    #[must_use]
    pub fn new(local_protocol: u16, accepted_peers: Vec<u16>, max_size: Option<u64>) -> Self {
        Self {
            state: State::Handshake {
                buffer: BytesMut::with_capacity(HANDSHAKE_SIZE),
            },
            local_protocol,
            accepted_peers,
            max_size,
            recv: SegmentedBuffer::new(),
        }
    }

    /// The 8-byte handshake this session must write to the wire as soon as
    /// the connection is established — call once, before the first
    /// `on_bytes`.
    #[must_use]
    pub fn local_handshake(&self) -> Bytes {
        handshake::build_handshake(self.local_protocol)
    }

    /// Feed incoming bytes into the session.
    pub fn on_bytes(&mut self, src: Bytes) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.recv.push(src);

        loop {
            match &mut self.state {
                State::Handshake { buffer } => {
                    let needed = HANDSHAKE_SIZE - buffer.len();
                    let take = needed.min(self.recv.len());
                    if let Some(bytes) = self.recv.take_bytes(take) {
                        buffer.extend_from_slice(&bytes);
                    }

                    if buffer.len() < HANDSHAKE_SIZE {
                        break;
                    }

                    let raw = buffer.split().freeze();
                    match handshake::parse_handshake(&raw) {
                        Ok(peer_protocol) => {
                            if !handshake::is_peer(&self.accepted_peers, peer_protocol) {
                                events.push(SessionEvent::Error(SessionError::Handshake(
                                    HandshakeError::UnacceptedPeer,
                                )));
                                break;
                            }
                            self.state = State::Active {
                                decoder: FrameDecoder::new(self.max_size),
                            };
                            events.push(SessionEvent::HandshakeComplete { peer_protocol });
                        }
                        Err(e) => {
                            events.push(SessionEvent::Error(SessionError::Handshake(e)));
                            break;
                        }
                    }
                }

                State::Active { decoder } => match decoder.decode(&mut self.recv) {
                    Ok(Some(payload)) => events.push(SessionEvent::Frame(payload)),
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e.into()));
                        break;
                    }
                },
            }
        }

        events
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    const REQ_PROTOCOL: u16 = 0x0030;
    const REP_PROTOCOL: u16 = 0x0031;

    #[test]
    fn completes_handshake_and_decodes_frame() {
        let mut session = StreamSession::new(REQ_PROTOCOL, vec![REP_PROTOCOL], None);
        let _ = session.local_handshake();

        let peer_handshake = handshake::build_handshake(REP_PROTOCOL);
        let mut events = session.on_bytes(peer_handshake);
        assert!(matches!(
            events.remove(0),
            SessionEvent::HandshakeComplete { peer_protocol: REP_PROTOCOL }
        ));
        assert!(session.is_active());

        let events = session.on_bytes(encode_frame(b"hello"));
        match &events[0] {
            SessionEvent::Frame(payload) => assert_eq!(&payload[..], b"hello"),
            _ => panic!("expected frame"),
        }
    }

    #[test]
    fn rejects_unaccepted_peer_protocol() {
        let mut session = StreamSession::new(REQ_PROTOCOL, vec![REP_PROTOCOL], None);
        let peer_handshake = handshake::build_handshake(0x0099);
        let events = session.on_bytes(peer_handshake);
        assert!(matches!(events[0], SessionEvent::Error(_)));
    }

    #[test]
    fn handles_handshake_split_across_reads() {
        let mut session = StreamSession::new(REQ_PROTOCOL, vec![REP_PROTOCOL], None);
        let peer_handshake = handshake::build_handshake(REP_PROTOCOL);
        assert!(session.on_bytes(peer_handshake.slice(0..4)).is_empty());
        let events = session.on_bytes(peer_handshake.slice(4..));
        assert!(matches!(events[0], SessionEvent::HandshakeComplete { .. }));
    }

    #[test]
    fn enforces_rcvmaxsize() {
        let mut session = StreamSession::new(REQ_PROTOCOL, vec![REP_PROTOCOL], Some(4));
        session.on_bytes(handshake::build_handshake(REP_PROTOCOL));
        let events = session.on_bytes(encode_frame(b"toolong"));
        assert!(matches!(events[0], SessionEvent::Error(_)));
    }
}
