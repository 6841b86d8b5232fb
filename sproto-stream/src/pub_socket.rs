//! PUB: one-to-many broadcast. No subscription state lives here —
//! the topic is a prefix of the message body itself, and filtering happens
//! entirely on the SUB side (`sub.rs`); PUB just fans every send out to
//! every connected peer via `RawBase::broadcast`.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::SUB];

pub struct PubProtocol {
    base: RawBase,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for PubProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl PubProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self { base: RawBase::new(), send_hwm, recv_hwm }
    }
}

impl Protocol for PubProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::PUB
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
            readable: false,
            writable: self.base.any_writable() || self.base.is_empty(),
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        // A PUB with no subscribers still accepts and drops the message —
        // broadcast semantics never block on a slow or absent reader.
        self.base.broadcast(&msg);
        Ok(())
    }

    fn recv(&mut self) -> Result<Message> {
        Err(Self::unsupported("recv"))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasts_to_every_subscriber() {
        let mut publ = PubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        publ.add_pipe();
        publ.add_pipe();
        publ.send(Message::from_body("topic.a: hi")).unwrap();
        for id in publ.base.pipe_ids() {
            assert_eq!(publ.base.get(id).unwrap().outbound_len(), 1);
        }
    }

    #[test]
    fn send_with_no_subscribers_succeeds() {
        let mut publ = PubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(publ.send(Message::from_body("x")).is_ok());
    }

    #[test]
    fn recv_is_unsupported() {
        let mut publ = PubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(publ.recv().is_err());
    }
}
