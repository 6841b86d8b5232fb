//! PUSH: send-only pipeline endpoint. Distributes outbound messages
//! round-robin across connected PULL peers via `RawBase`; `recv` is
//! unsupported.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::PULL];

pub struct PushProtocol {
    base: RawBase,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for PushProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl PushProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self { base: RawBase::new(), send_hwm, recv_hwm }
    }
}

impl Protocol for PushProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::PUSH
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
            writable: self.base.any_writable(),
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        self.base.send_round_robin(msg).map(|_| ()).ok_or(Error::Again)
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
        Err(Self::unsupported("recv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_balances_round_robin() {
        let mut push = PushProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        push.add_pipe();
        push.add_pipe();
        let ids = push.base.pipe_ids();

        let first = push.base.send_round_robin(Message::from_body("noop")).unwrap();
        let _ = first;
        push.send(Message::from_body("a")).unwrap();
        push.send(Message::from_body("b")).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn recv_is_unsupported() {
        let mut push = PushProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(push.recv().is_err());
    }

    #[test]
    fn send_with_no_pipes_is_again() {
        let mut push = PushProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(matches!(push.send(Message::from_body("x")), Err(Error::Again)));
    }

    #[test]
    fn send_hwm_is_byte_counted_not_message_counted() {
        let mut push = PushProtocol::new(200, crate::DEFAULT_HWM);
        push.add_pipe();

        let mut successes = 0;
        loop {
            match push.send(Message::from_body("0123456789")) {
                Ok(()) => successes += 1,
                Err(Error::Again) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(successes, 20, "200-byte SNDBUF / 10-byte messages holds exactly 20");
    }
}
