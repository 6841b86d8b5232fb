//! PULL: receive-only pipeline endpoint. Fair-queues inbound
//! messages across connected PUSH peers via `RawBase`; `send` is
//! unsupported.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::PUSH];

pub struct PullProtocol {
    base: RawBase,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for PullProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl PullProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self { base: RawBase::new(), send_hwm, recv_hwm }
    }
}

impl Protocol for PullProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::PULL
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
            writable: false,
        }
    }

    fn send(&mut self, _msg: Message) -> Result<()> {
        Err(Self::unsupported("send"))
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

    fn recv(&mut self) -> Result<Message> {
        self.base.recv_fair().map(|(_, msg)| msg).ok_or(Error::Again)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_queues_across_pipes() {
        let mut pull = PullProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        pull.add_pipe();
        pull.add_pipe();
        let ids = pull.base.pipe_ids();

        pull.base.get_mut(ids[0]).unwrap().deliver_inbound(Message::from_body("a")).unwrap();
        pull.base.get_mut(ids[1]).unwrap().deliver_inbound(Message::from_body("b")).unwrap();

        let first = pull.recv().unwrap();
        let second = pull.recv().unwrap();
        assert_ne!(first.body(), second.body());
    }

    #[test]
    fn send_is_unsupported() {
        let mut pull = PullProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(pull.send(Message::from_body("x")).is_err());
    }

    #[test]
    fn recv_with_nothing_queued_is_again() {
        let mut pull = PullProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(matches!(pull.recv(), Err(Error::Again)));
    }
}
