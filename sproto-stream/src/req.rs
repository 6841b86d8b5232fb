//! REQ: the request/reply client, built as a protocol struct wrapping a
//! `RawBase`, matched exhaustively by `(state, event)`. The state list and
//! transitions themselves are not a ZMTP pattern at all;
//! every arm here is named transition-for-transition.

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
pub enum ReqState {
    Idle,
    ReadyToRequest,
    WaitingForPipe,
    RequestInFlight,
    PreparingToResend,
    Cancelling,
    FinalizingRoundTrip,
    ReplyArrived,
    Stopping,
}

/// What the socket core must do in response to a state transition: arm or
/// cancel the resend timer. The FSM never touches the worker pool
/// directly — it hands back an action, kept sans-IO like `StreamSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Arm(Duration),
    Cancel,
}

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::REP];

pub struct ReqProtocol {
    state: ReqState,
    base: RawBase,
    current_id: u32,
    resend_ivl: Duration,
    request: Option<Message>,
    reply: Option<Message>,
    via: Option<PipeId>,
    /// A new request staged while a previous one was in flight; sent once
    /// the resend timer reports stopped after `CANCELLING`.
    pending_request: Option<Message>,
    pending_action: Option<TimerAction>,
    send_hwm: usize,
    recv_hwm: usize,
}

impl ReqProtocol {
    #[must_use]
    pub fn new(resend_ivl: Duration, send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            state: ReqState::ReadyToRequest,
            base: RawBase::new(),
            current_id: wire::strip_final_hop(rand::thread_rng().gen::<u32>()),
            resend_ivl,
            request: None,
            reply: None,
            via: None,
            pending_request: None,
            pending_action: None,
            send_hwm,
            recv_hwm,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ReqState {
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

    /// Attempt to hand `request` to a pipe, transitioning to
    /// `RequestInFlight` (with the resend timer armed) on success or
    /// `WaitingForPipe` otherwise.
    fn try_send_request(&mut self) {
        let msg = self.request.clone().expect("try_send_request called with no pending request");
        match self.base.send_round_robin(msg) {
            Some(pipe) => {
                self.via = Some(pipe);
                self.state = ReqState::RequestInFlight;
                self.pending_action = Some(TimerAction::Arm(self.resend_ivl));
            }
            None => {
                self.state = ReqState::WaitingForPipe;
            }
        }
    }

    /// Take the action the last transition queued, if any — the socket
    /// core calls this once per `Protocol` method invocation and acts on
    /// it (arming/cancelling the resend timer via the worker pool).
    pub fn take_timer_action(&mut self) -> Option<TimerAction> {
        self.pending_action.take()
    }

    /// The resend timer fired.
    pub fn on_resend_timeout(&mut self) {
        if self.state == ReqState::RequestInFlight {
            self.via = None;
            self.state = ReqState::PreparingToResend;
            self.pending_action = Some(TimerAction::Cancel);
        }
    }

    /// A pipe carrying the in-flight request disconnected.
    pub fn on_pipe_gone(&mut self, id: PipeId) {
        if self.state == ReqState::RequestInFlight && self.via == Some(id) {
            self.via = None;
            self.state = ReqState::PreparingToResend;
            self.pending_action = Some(TimerAction::Cancel);
        }
    }

    /// The worker confirms the timer has actually stopped (cancellation is
    /// asynchronous relative to the worker thread, ).
    pub fn on_timer_stopped(&mut self) {
        match self.state {
            ReqState::FinalizingRoundTrip => {
                self.state = ReqState::ReplyArrived;
            }
            ReqState::PreparingToResend => {
                self.try_send_request();
            }
            ReqState::Cancelling => {
                self.request = self.pending_request.take();
                self.try_send_request();
            }
            _ => {}
        }
    }
}

impl Protocol for ReqProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::REQ
    }

    fn accepted_peers(&self) -> &'static [u16] {
        &ACCEPTED_PEERS
    }

    fn header_len(&self) -> usize {
        4
    }

    fn add_pipe(&mut self) -> PipeId {
        let id = self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default());
        if self.state == ReqState::WaitingForPipe {
            self.try_send_request();
        }
        id
    }

    fn rm_pipe(&mut self, id: PipeId) {
        self.base.rm_pipe(id);
        self.on_pipe_gone(id);
    }

    fn stop(&mut self) -> StopOutcome {
        self.state = ReqState::Stopping;
        if self.base.is_empty() {
            self.state = ReqState::Idle;
            StopOutcome::Idle
        } else {
            StopOutcome::Pending
        }
    }

    fn in_event(&mut self, id: PipeId) {
        // Reply matching: pop a message from the raw
        // base. Drop it unless a request is currently in flight and the
        // header matches our stamped id exactly.
        for msg in self.base.drain_pipe(id) {
            if self.state != ReqState::RequestInFlight {
                continue;
            }
            if msg.header().len() != 4 {
                continue;
            }
            let stamp = wire::get_u32(msg.header());
            if !wire::is_final_hop(stamp) {
                continue;
            }
            if wire::strip_final_hop(stamp) != self.current_id {
                continue;
            }
            self.reply = Some(Message::from_body(msg.body_bytes()));
            self.state = ReqState::FinalizingRoundTrip;
            self.pending_action = Some(TimerAction::Cancel);
        }
    }

    fn out_event(&mut self, id: PipeId) {
        if self.state == ReqState::WaitingForPipe {
            let _ = id;
            self.try_send_request();
        }
    }

    fn events(&self) -> Readiness {
        Readiness {
            // Sending a new request always cancels any previous one, so
            // OUT is unconditional.
            writable: true,
            readable: self.state == ReqState::ReplyArrived,
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        match self.state {
            ReqState::ReadyToRequest => {
                let stamped = self.stamp(msg);
                self.request = Some(stamped);
                self.try_send_request();
                Ok(())
            }
            ReqState::ReplyArrived => {
                // Implicitly discards the unread reply — a new request
                // always supersedes the previous round trip.
                self.reply = None;
                let stamped = self.stamp(msg);
                self.request = Some(stamped);
                self.try_send_request();
                Ok(())
            }
            ReqState::WaitingForPipe
            | ReqState::RequestInFlight
            | ReqState::PreparingToResend
            | ReqState::FinalizingRoundTrip => {
                let stamped = self.stamp(msg);
                self.pending_request = Some(stamped);
                self.state = ReqState::Cancelling;
                self.pending_action = Some(TimerAction::Cancel);
                Ok(())
            }
            ReqState::Cancelling => {
                // Supersede the already-staged cancellation target.
                let stamped = self.stamp(msg);
                self.pending_request = Some(stamped);
                Ok(())
            }
            ReqState::Idle | ReqState::Stopping => Err(Error::Fsm("socket is stopping")),
        }
    }

    fn recv(&mut self) -> Result<Message> {
        match self.state {
            ReqState::ReplyArrived => {
                let reply = self.reply.take().expect("ReplyArrived implies reply is Some");
                self.state = ReqState::ReadyToRequest;
                Ok(reply)
            }
            _ => Err(Error::Again),
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

    fn new_req() -> ReqProtocol {
        ReqProtocol::new(Duration::from_millis(100), crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }

    fn reply_to(req: &ReqProtocol, body: &[u8]) -> Message {
        let mut b = MessageBuilder::new();
        b.set_u32_header(wire::with_final_hop(req.current_id)).push_body(body);
        b.finish()
    }

    #[test]
    fn send_without_pipe_waits() {
        let mut req = new_req();
        req.send(Message::from_body("ping")).unwrap();
        assert_eq!(req.state(), ReqState::WaitingForPipe);
    }

    #[test]
    fn full_round_trip() {
        let mut req = new_req();
        let pipe = req.add_pipe();

        req.send(Message::from_body("ping")).unwrap();
        assert_eq!(req.state(), ReqState::RequestInFlight);
        assert_eq!(req.take_timer_action(), Some(TimerAction::Arm(Duration::from_millis(100))));

        let reply = reply_to(&req, b"pong");
        req.base.get_mut(pipe).unwrap().deliver_inbound(reply).unwrap();
        req.in_event(pipe);
        assert_eq!(req.state(), ReqState::FinalizingRoundTrip);
        assert_eq!(req.take_timer_action(), Some(TimerAction::Cancel));

        req.on_timer_stopped();
        assert_eq!(req.state(), ReqState::ReplyArrived);

        let got = req.recv().unwrap();
        assert_eq!(got.body(), b"pong");
        assert_eq!(req.state(), ReqState::ReadyToRequest);
    }

    #[test]
    fn stale_reply_with_wrong_id_is_dropped() {
        let mut req = new_req();
        let pipe = req.add_pipe();
        req.send(Message::from_body("ping")).unwrap();

        let mut b = MessageBuilder::new();
        b.set_u32_header(wire::with_final_hop(0xDEAD_BEEF)).push_body(b"wrong");
        req.base.get_mut(pipe).unwrap().deliver_inbound(b.finish()).unwrap();
        req.in_event(pipe);

        assert_eq!(req.state(), ReqState::RequestInFlight);
    }

    #[test]
    fn resend_timeout_clears_via_and_resends_after_timer_stops() {
        let mut req = new_req();
        let pipe = req.add_pipe();
        req.send(Message::from_body("ping")).unwrap();
        req.take_timer_action();

        req.on_resend_timeout();
        assert_eq!(req.state(), ReqState::PreparingToResend);
        assert_eq!(req.take_timer_action(), Some(TimerAction::Cancel));

        req.on_timer_stopped();
        assert_eq!(req.state(), ReqState::RequestInFlight);
    }

    #[test]
    fn new_send_while_in_flight_cancels_then_sends() {
        let mut req = new_req();
        let pipe = req.add_pipe();
        req.send(Message::from_body("first")).unwrap();
        req.take_timer_action();

        req.send(Message::from_body("second")).unwrap();
        assert_eq!(req.state(), ReqState::Cancelling);
        assert_eq!(req.take_timer_action(), Some(TimerAction::Cancel));

        req.on_timer_stopped();
        assert_eq!(req.state(), ReqState::RequestInFlight);
    }

    #[test]
    fn events_reports_in_only_when_reply_arrived() {
        let req = new_req();
        assert!(!req.events().readable);
        assert!(req.events().writable);
    }
}
