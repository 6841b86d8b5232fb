//! RESPONDENT: replies to SURVEYOR queries, preserving the stamp's
//! final-hop bit so the originating SURVEYOR's response matching
//! succeeds. Structurally a mirror of `surveyor.rs`: same `RawBase`
//! composition and fair-queue recv, but passive — it never originates a
//! survey, only answers the most recently received one.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RespondentState {
    Idle,
    ReplyPending,
}

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::SURVEYOR];

pub struct RespondentProtocol {
    base: RawBase,
    state: RespondentState,
    /// Pipe the pending survey arrived on, plus its stamp header — replied
    /// verbatim so the originator's id match succeeds.
    pending: Option<(PipeId, Vec<u8>)>,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for RespondentProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl RespondentProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            base: RawBase::new(),
            state: RespondentState::Idle,
            pending: None,
            send_hwm,
            recv_hwm,
        }
    }
}

impl Protocol for RespondentProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::RESPONDENT
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
            self.state = RespondentState::Idle;
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
            readable: self.base.any_readable(),
            writable: self.state == RespondentState::ReplyPending,
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        let (id, header) = self.pending.take().ok_or(Error::Fsm("no survey to reply to"))?;
        self.state = RespondentState::Idle;
        let reply = Message::with_header(header.to_vec(), msg.body().to_vec());
        let pipe = self.base.get_mut(id).ok_or(Error::Fsm("survey's pipe disconnected"))?;
        match pipe.send(reply) {
            sproto_core::pipe::PipeResult::Ok => Ok(()),
            sproto_core::pipe::PipeResult::Again => Err(Error::Again),
        }
    }

    fn recv(&mut self) -> Result<Message> {
        loop {
            match self.base.recv_fair() {
                Some((id, msg)) => {
                    if msg.header().len() != 4 {
                        continue;
                    }
                    self.pending = Some((id, msg.header().to_vec()));
                    self.state = RespondentState::ReplyPending;
                    return Ok(Message::from_body(msg.body_bytes().clone()));
                }
                None => return Err(Error::Again),
            }
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
    use sproto_core::message_builder::MessageBuilder;

    #[test]
    fn replies_preserve_the_stamp() {
        let mut resp = RespondentProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        resp.add_pipe();
        let id = resp.base.pipe_ids()[0];

        let mut b = MessageBuilder::new();
        b.set_u32_header(0x8000_0007).push_body(b"survey");
        resp.base.get_mut(id).unwrap().deliver_inbound(b.finish()).unwrap();

        let survey = resp.recv().unwrap();
        assert_eq!(survey.body(), b"survey");

        resp.send(Message::from_body("answer")).unwrap();
        let out = resp.base.get_mut(id).unwrap().next_outbound().unwrap();
        assert_eq!(out.header(), &0x8000_0007u32.to_be_bytes());
        assert_eq!(out.body(), b"answer");
    }

    #[test]
    fn send_without_pending_survey_is_fsm_error() {
        let mut resp = RespondentProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(matches!(resp.send(Message::from_body("x")), Err(Error::Fsm(_))));
    }
}
