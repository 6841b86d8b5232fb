//! BUS: undirected broadcast. Every message received from one pipe is
//! rebroadcast to every other connected pipe but never echoed back to its
//! origin — grounded on `RawBase::broadcast_except`, which already
//! implements exactly this exclusion for device forwarding.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::BUS];

pub struct BusProtocol {
    base: RawBase,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for BusProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl BusProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self { base: RawBase::new(), send_hwm, recv_hwm }
    }
}

impl Protocol for BusProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::BUS
    }

    fn accepted_peers(&self) -> &'static [u16] {
        &ACCEPTED_PEERS
    }

    fn add_pipe(&mut self) -> PipeId {
        self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default())
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

    fn send(&mut self, msg: Message) -> Result<()> {
        // No origin to exclude for an application-originated send: goes to
        // every connected peer.
        if self.base.broadcast(&msg).is_empty() && !self.base.is_empty() {
            return Err(Error::Again);
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Message> {
        self.base.recv_fair().map(|(_, msg)| msg).ok_or(Error::Again)
    }

    fn pipe_deliver_inbound(&mut self, id: PipeId, msg: Message) -> Result<bool> {
        self.base.get_mut(id).map_or(Ok(false), |p| p.deliver_inbound(msg))
    }

    fn pipe_take_outbound(&mut self, id: PipeId) -> Option<Message> {
        self.base.get_mut(id).and_then(sproto_core::pipe::Pipe::next_outbound)
    }

    fn pipe_mark_flushed(&mut self, id: PipeId) {
        if let Some(p) = self.base.get_mut(id) {
            p.mark_flushed();
        }
    }
}

/// Forward a message just received on `origin` to every other pipe, never
/// echoing it back. The socket core calls this from its `in_event` pump
/// once it has pulled the message off `origin`'s inbound queue.
pub fn relay_from(base: &mut RawBase, origin: PipeId, msg: Message) {
    base.broadcast_except(&msg, origin);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_does_not_echo_to_origin() {
        let mut bus = BusProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        bus.add_pipe();
        bus.add_pipe();
        bus.add_pipe();
        let ids = bus.base.pipe_ids();

        relay_from(&mut bus.base, ids[0], Message::from_body("hello"));

        assert!(bus.base.get(ids[0]).unwrap().outbound_len() == 0);
        assert!(bus.base.get(ids[1]).unwrap().outbound_len() == 1);
        assert!(bus.base.get(ids[2]).unwrap().outbound_len() == 1);
    }

    #[test]
    fn application_send_reaches_all_peers() {
        let mut bus = BusProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        bus.add_pipe();
        bus.add_pipe();
        bus.send(Message::from_body("x")).unwrap();
        for id in bus.base.pipe_ids() {
            assert_eq!(bus.base.get(id).unwrap().outbound_len(), 1);
        }
    }
}
