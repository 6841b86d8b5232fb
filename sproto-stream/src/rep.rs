//! REP: strict request/reply server. Remembers each request's
//! originating pipe and its backtrace stack — the SP header accumulated by
//! devices as a chain of upstream request IDs (glossary) — and replies
//! by routing along that stored backtrace. Structurally close to
//! `respondent.rs`: a request answered at most once before the next recv.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::{PipeResult, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepState {
    Idle,
    ReplyPending,
}

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::REQ];

pub struct RepProtocol {
    base: RawBase,
    state: RepState,
    /// Pipe the pending request arrived on, plus its full backtrace-stack
    /// header — replied verbatim (a device further up the chain strips its
    /// own hop before forwarding on).
    pending: Option<(PipeId, Vec<u8>)>,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for RepProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl RepProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            base: RawBase::new(),
            state: RepState::Idle,
            pending: None,
            send_hwm,
            recv_hwm,
        }
    }
}

impl Protocol for RepProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::REP
    }

    fn accepted_peers(&self) -> &'static [u16] {
        &ACCEPTED_PEERS
    }

    fn header_len(&self) -> usize {
        4
    }

    fn add_pipe(&mut self) -> PipeId {
        self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default())
    }

    fn rm_pipe(&mut self, id: PipeId) {
        self.base.rm_pipe(id);
        if matches!(self.pending, Some((pending_id, _)) if pending_id == id) {
            self.pending = None;
            self.state = RepState::Idle;
        }
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
            readable: self.state == RepState::Idle && self.base.any_readable(),
            writable: self.state == RepState::ReplyPending,
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        let (id, backtrace) = self.pending.take().ok_or(Error::Fsm("no request to reply to"))?;
        self.state = RepState::Idle;
        let reply = Message::with_header(backtrace, msg.body().to_vec());
        let pipe = self.base.get_mut(id).ok_or(Error::Fsm("request's pipe disconnected"))?;
        match pipe.send(reply) {
            PipeResult::Ok => Ok(()),
            PipeResult::Again => Err(Error::Again),
        }
    }

    fn recv(&mut self) -> Result<Message> {
        if self.state == RepState::ReplyPending {
            return Err(Error::Fsm("must reply before receiving the next request"));
        }
        match self.base.recv_fair() {
            Some((id, msg)) => {
                self.pending = Some((id, msg.header().to_vec()));
                self.state = RepState::ReplyPending;
                Ok(Message::from_body(msg.body_bytes().clone()))
            }
            None => Err(Error::Again),
        }
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
    fn reply_routes_back_along_backtrace() {
        let mut rep = RepProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        rep.add_pipe();
        let id = rep.base.pipe_ids()[0];

        let backtrace = vec![0x00, 0x00, 0x00, 0x2A];
        rep.base
            .get_mut(id)
            .unwrap()
            .deliver_inbound(Message::with_header(backtrace.clone(), b"request".to_vec()))
            .unwrap();

        let req = rep.recv().unwrap();
        assert_eq!(req.body(), b"request");

        rep.send(Message::from_body("reply")).unwrap();
        let out = rep.base.get_mut(id).unwrap().next_outbound().unwrap();
        assert_eq!(out.header(), backtrace.as_slice());
        assert_eq!(out.body(), b"reply");
    }

    #[test]
    fn recv_while_reply_pending_is_fsm_error() {
        let mut rep = RepProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        rep.add_pipe();
        let id = rep.base.pipe_ids()[0];
        rep.base
            .get_mut(id)
            .unwrap()
            .deliver_inbound(Message::with_header(vec![0; 4], b"a".to_vec()))
            .unwrap();
        rep.recv().unwrap();
        assert!(matches!(rep.recv(), Err(Error::Fsm(_))));
    }

    #[test]
    fn send_without_pending_request_is_fsm_error() {
        let mut rep = RepProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(matches!(rep.send(Message::from_body("x")), Err(Error::Fsm(_))));
    }
}
