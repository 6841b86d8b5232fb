//! SURVEYOR: multicast query with a bounded deadline. Composed the
//! same way as `req.rs` — a `RawBase` plus the exhaustive six-state match —
//! but broadcasts instead of round-robins and tracks a single shared
//! deadline rather than a per-request resend timer.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use rand::Rng;
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::message_builder::MessageBuilder;
use sproto_core::pipe::Priority;
use sproto_core::wire;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyorState {
    Idle,
    Passive,
    Active,
    Cancelling,
    StoppingTimer,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Arm(Duration),
    Cancel,
}

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::RESPONDENT];

pub struct SurveyorProtocol {
    state: SurveyorState,
    base: RawBase,
    current_id: u32,
    deadline: Duration,
    timed_out: bool,
    pending_survey: Option<Message>,
    pending_action: Option<TimerAction>,
    send_hwm: usize,
    recv_hwm: usize,
}

impl SurveyorProtocol {
    #[must_use]
    pub fn new(deadline: Duration, send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            state: SurveyorState::Passive,
            base: RawBase::new(),
            current_id: wire::strip_final_hop(rand::thread_rng().gen::<u32>()),
            deadline,
            timed_out: false,
            pending_survey: None,
            pending_action: None,
            send_hwm,
            recv_hwm,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SurveyorState {
        self.state
    }

    fn next_id(&mut self) -> u32 {
        self.current_id = wire::strip_final_hop(self.current_id.wrapping_add(1));
        wire::with_final_hop(self.current_id)
    }

    fn stamp(&mut self, msg: Message) -> Message {
        let id = self.next_id();
        let mut b = MessageBuilder::new();
        b.set_u32_header(id).push_body(msg.body());
        b.finish()
    }

    fn start_survey(&mut self, msg: Message) {
        let stamped = self.stamp(msg);
        self.base.broadcast(&stamped);
        self.state = SurveyorState::Active;
        self.timed_out = false;
        self.pending_action = Some(TimerAction::Arm(self.deadline));
    }

    pub fn take_timer_action(&mut self) -> Option<TimerAction> {
        self.pending_action.take()
    }

    /// The deadline timer fired with no (further) responses pending.
    pub fn on_deadline(&mut self) {
        if self.state == SurveyorState::Active {
            self.state = SurveyorState::StoppingTimer;
            self.timed_out = true;
            self.pending_action = Some(TimerAction::Cancel);
        }
    }

    pub fn on_timer_stopped(&mut self) {
        match self.state {
            SurveyorState::StoppingTimer => {
                self.state = SurveyorState::Passive;
            }
            SurveyorState::Cancelling => {
                if let Some(msg) = self.pending_survey.take() {
                    self.start_survey(msg);
                }
            }
            _ => {}
        }
    }
}

impl Protocol for SurveyorProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::SURVEYOR
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
    }

    fn stop(&mut self) -> StopOutcome {
        self.state = SurveyorState::Stopping;
        if self.base.is_empty() {
            self.state = SurveyorState::Idle;
            StopOutcome::Idle
        } else {
            StopOutcome::Pending
        }
    }

    fn in_event(&mut self, id: PipeId) {
        for msg in self.base.drain_pipe(id) {
            if msg.header().len() != 4 {
                continue;
            }
            if wire::strip_final_hop(wire::get_u32(msg.header())) != self.current_id {
                continue;
            }
            // Responses queue on the pipe itself; `recv` drains them via
            // the base's fair-queue recv, matching pipes that still carry
            // a matching-id response.
            let _ = self.base.get_mut(id).map(|p| p.deliver_inbound(msg));
        }
    }

    fn out_event(&mut self, _id: PipeId) {}

    fn events(&self) -> Readiness {
        Readiness {
            // Forced IN when no survey is in progress so a blocked
            // receiver wakes and reports EFSM/ETIMEDOUT.
            readable: self.state != SurveyorState::Active || self.base.any_readable(),
            writable: matches!(self.state, SurveyorState::Passive | SurveyorState::Active),
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        match self.state {
            SurveyorState::Passive => {
                self.start_survey(msg);
                Ok(())
            }
            SurveyorState::Active => {
                if !self.base.any_writable() {
                    return Err(Error::Again);
                }
                self.pending_survey = Some(msg);
                self.state = SurveyorState::Cancelling;
                self.pending_action = Some(TimerAction::Cancel);
                Ok(())
            }
            _ => Err(Error::Fsm("survey not accepting sends in this state")),
        }
    }

    fn recv(&mut self) -> Result<Message> {
        loop {
            match self.base.recv_fair() {
                Some((_, msg)) => {
                    let stamp = wire::get_u32(msg.header());
                    if wire::strip_final_hop(stamp) != self.current_id {
                        continue;
                    }
                    return Ok(Message::from_body(msg.body_bytes()));
                }
                None => break,
            }
        }

        if self.state == SurveyorState::Active {
            return Err(Error::Again);
        }

        if self.timed_out {
            self.timed_out = false;
            return Err(Error::TimedOut);
        }

        Err(Error::Fsm("recv without an active survey"))
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
