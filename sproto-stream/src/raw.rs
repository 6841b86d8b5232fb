//! `SP_RAW` domain: a socket that bypasses protocol FSM semantics entirely
//! and just exposes the fair-queued raw base directly. The only consumer
//! is `device(a, b)` — a raw socket never stamps, matches, or times
//! anything out, it just forwards whatever arrives to whichever pipe is
//! next in line.
//!
//! The "cooked" behavior lives entirely in `dispatch::AnyProtocol`;
//! `RawProtocol` is what's left once that's stripped away.

use crate::base::{PipeId, RawBase};
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::{Pipe, Priority};

/// A raw socket's pipe capacity, in bytes. Devices bridge two already-bound
/// sockets and don't expose `RCVBUF`/`SNDBUF` of their own, so this stays a
/// fixed allowance rather than something `SocketOptions` can tune.
const RAW_PIPE_CAPACITY: usize = crate::DEFAULT_HWM;

pub struct RawProtocol {
    base: RawBase,
    protocol_id: u16,
    accepted_peers: &'static [u16],
    header_len: usize,
}

impl RawProtocol {
    /// `protocol_id`/`accepted_peers` govern the handshake this raw socket
    /// presents to its peer; `header_len` must match whatever stamp size
    /// the bridged protocol family uses (4 bytes for the REQ/REP/SURVEYOR/
    /// RESPONDENT family devices are specified against).
    #[must_use]
    pub fn new(protocol_id: u16, accepted_peers: &'static [u16], header_len: usize) -> Self {
        Self {
            base: RawBase::new(),
            protocol_id,
            accepted_peers,
            header_len,
        }
    }
}

impl Protocol for RawProtocol {
    fn protocol_id(&self) -> u16 {
        self.protocol_id
    }

    fn accepted_peers(&self) -> &'static [u16] {
        self.accepted_peers
    }

    fn header_len(&self) -> usize {
        self.header_len
    }

    fn add_pipe(&mut self) -> PipeId {
        self.base.add_pipe(RAW_PIPE_CAPACITY, RAW_PIPE_CAPACITY, Priority::default())
    }

    fn rm_pipe(&mut self, id: PipeId) {
        self.base.rm_pipe(id);
    }

    fn stop(&mut self) -> StopOutcome {
        if self.base.is_empty() {
            StopOutcome::Idle
        } else {
            StopOutcome::Pending
        }
    }

    fn in_event(&mut self, _id: PipeId) {}

    fn out_event(&mut self, _id: PipeId) {}

    fn events(&self) -> Readiness {
        Readiness {
            readable: self.base.any_readable(),
            writable: self.base.any_writable(),
        }
    }

    /// Devices never call this through the application-facing `send` path
    /// (they move messages pipe-to-pipe via [`sproto_stream::proxy::pump`]
    /// instead), but it's implemented for completeness: round-robin like
    /// PUSH, since a raw socket has no notion of which peer should answer.
    fn send(&mut self, msg: Message) -> Result<()> {
        self.base.send_round_robin(msg).map(|_| ()).ok_or(Error::Again)
    }

    fn recv(&mut self) -> Result<Message> {
        self.base
            .recv_fair()
            .map(|(_, msg)| msg)
            .ok_or(Error::Again)
    }

    fn pipe_deliver_inbound(&mut self, id: PipeId, msg: Message) -> Result<bool> {
        self.base.get_mut(id).map_or(Ok(false), |p| p.deliver_inbound(msg))
    }

    fn pipe_take_outbound(&mut self, id: PipeId) -> Option<Message> {
        self.base.get_mut(id).and_then(Pipe::next_outbound)
    }

    fn pipe_mark_flushed(&mut self, id: PipeId) {
        if let Some(p) = self.base.get_mut(id) {
            p.mark_flushed();
        }
    }
}

/// Raw-socket variant of [`crate::proxy::RawEndpoint`]: `try_recv`/
/// `try_send` go straight through the fair-queued base, `is_closed` is
/// `true` once every pipe has been torn down and none remain pending.
pub struct RawEndpointAdapter<'a> {
    protocol: &'a mut RawProtocol,
    torn_down: bool,
}

impl<'a> RawEndpointAdapter<'a> {
    #[must_use]
    pub fn new(protocol: &'a mut RawProtocol) -> Self {
        Self { protocol, torn_down: false }
    }

    pub fn mark_closed(&mut self) {
        self.torn_down = true;
    }
}

impl crate::proxy::RawEndpoint for RawEndpointAdapter<'_> {
    fn try_recv(&mut self) -> Result<Message> {
        self.protocol.recv()
    }

    fn try_send(&mut self, msg: Message) -> Result<()> {
        self.protocol.send(msg)
    }

    fn is_closed(&self) -> bool {
        self.torn_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy;
    use sproto_core::message_builder::MessageBuilder;

    #[test]
    fn raw_socket_forwards_messages_fairly() {
        let mut raw = RawProtocol::new(0, &[], 4);
        let a = raw.add_pipe();
        let b = raw.add_pipe();

        let mut msg = MessageBuilder::new();
        msg.set_u32_header(2).push_body(b"hi");
        raw.pipe_deliver_inbound(a, msg.finish()).unwrap();

        let got = raw.recv().unwrap();
        assert_eq!(got.body(), b"hi");

        raw.send(Message::with_header(1u32.to_be_bytes().to_vec(), b"echo".to_vec())).unwrap();
        let out = raw.pipe_take_outbound(b).unwrap();
        assert_eq!(out.body(), b"echo");
    }

    #[test]
    fn device_pump_runs_over_two_raw_sockets() {
        let mut a = RawProtocol::new(0, &[], 4);
        let mut b = RawProtocol::new(0, &[], 4);
        let pa = a.add_pipe();
        let pb = b.add_pipe();

        let mut msg = MessageBuilder::new();
        msg.set_u32_header(0x8000_0002).push_body(b"req");
        a.pipe_deliver_inbound(pa, msg.finish()).unwrap();

        let mut adapter_a = RawEndpointAdapter::new(&mut a);
        let mut adapter_b = RawEndpointAdapter::new(&mut b);
        proxy::pump(&mut adapter_a, &mut adapter_b).unwrap();

        let forwarded = b.pipe_take_outbound(pb).unwrap();
        assert_eq!(forwarded.header()[0] & 0x7F, 1);
        assert_eq!(forwarded.body(), b"req");
    }
}
