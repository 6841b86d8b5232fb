//! Tagged-enum dispatch over the ten protocol FSMs: enumerate every
//! protocol as a variant and dispatch via a match rather than a vtable.
//! `Protocol` itself isn't object-safe — `unsupported` has
//! no `self` receiver — so a facade socket holds one `AnyProtocol` instead
//! of a `Box<dyn Protocol>`, and every method here is a one-line match.

use crate::bus::BusProtocol;
use crate::pair::PairProtocol;
use crate::protocol_ids;
use crate::pub_socket::PubProtocol;
use crate::pull::PullProtocol;
use crate::push::PushProtocol;
use crate::rep::RepProtocol;
use crate::req::{ReqProtocol, TimerAction as ReqTimerAction};
use crate::respondent::RespondentProtocol;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use crate::sub::SubProtocol;
use crate::surveyor::{SurveyorProtocol, TimerAction as SurveyorTimerAction};
use crate::PipeId;
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use std::time::Duration;

/// Which protocol a socket was created with — the domain half of the
/// `socket(domain, protocol)` application call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Pair,
    Pub,
    Sub,
    Req,
    Rep,
    Push,
    Pull,
    Surveyor,
    Respondent,
    Bus,
}

impl ProtocolKind {
    #[must_use]
    pub const fn wire_id(self) -> u16 {
        match self {
            Self::Pair => protocol_ids::PAIR,
            Self::Pub => protocol_ids::PUB,
            Self::Sub => protocol_ids::SUB,
            Self::Req => protocol_ids::REQ,
            Self::Rep => protocol_ids::REP,
            Self::Push => protocol_ids::PUSH,
            Self::Pull => protocol_ids::PULL,
            Self::Surveyor => protocol_ids::SURVEYOR,
            Self::Respondent => protocol_ids::RESPONDENT,
            Self::Bus => protocol_ids::BUS,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        protocol_ids::name(self.wire_id())
    }
}

/// One socket's concrete protocol FSM, selected at `socket()` time and
/// fixed for its lifetime.
pub enum AnyProtocol {
    Pair(PairProtocol),
    Pub(PubProtocol),
    Sub(SubProtocol),
    Req(ReqProtocol),
    Rep(RepProtocol),
    Push(PushProtocol),
    Pull(PullProtocol),
    Surveyor(SurveyorProtocol),
    Respondent(RespondentProtocol),
    Bus(BusProtocol),
}

/// What the socket core must do in response to a REQ/SURVEYOR transition:
/// arm or cancel their shared notion of a resend/deadline timer. Unifies
/// `req::TimerAction` and `surveyor::TimerAction`, which are structurally
/// identical but kept as separate types in their own sans-IO modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Arm(Duration),
    Cancel,
}

impl From<ReqTimerAction> for TimerAction {
    fn from(a: ReqTimerAction) -> Self {
        match a {
            ReqTimerAction::Arm(d) => Self::Arm(d),
            ReqTimerAction::Cancel => Self::Cancel,
        }
    }
}

impl From<SurveyorTimerAction> for TimerAction {
    fn from(a: SurveyorTimerAction) -> Self {
        match a {
            SurveyorTimerAction::Arm(d) => Self::Arm(d),
            SurveyorTimerAction::Cancel => Self::Cancel,
        }
    }
}

impl AnyProtocol {
    #[must_use]
    pub fn new(
        kind: ProtocolKind,
        resend_ivl: Duration,
        survey_deadline: Duration,
        send_hwm: usize,
        recv_hwm: usize,
    ) -> Self {
        match kind {
            ProtocolKind::Pair => Self::Pair(PairProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Pub => Self::Pub(PubProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Sub => Self::Sub(SubProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Req => Self::Req(ReqProtocol::new(resend_ivl, send_hwm, recv_hwm)),
            ProtocolKind::Rep => Self::Rep(RepProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Push => Self::Push(PushProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Pull => Self::Pull(PullProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Surveyor => Self::Surveyor(SurveyorProtocol::new(survey_deadline, send_hwm, recv_hwm)),
            ProtocolKind::Respondent => Self::Respondent(RespondentProtocol::new(send_hwm, recv_hwm)),
            ProtocolKind::Bus => Self::Bus(BusProtocol::new(send_hwm, recv_hwm)),
        }
    }

    /// Subscribe to a topic prefix. Only meaningful for SUB; every other
    /// protocol reports `ENOTSUP`.
    pub fn subscribe(&mut self, prefix: bytes::Bytes) -> Result<()> {
        match self {
            Self::Sub(s) => {
                s.subscribe(prefix);
                Ok(())
            }
            _ => Err(Self::unsupported("subscribe")),
        }
    }

    pub fn unsubscribe(&mut self, prefix: bytes::Bytes) -> Result<()> {
        match self {
            Self::Sub(s) => {
                s.unsubscribe(prefix);
                Ok(())
            }
            _ => Err(Self::unsupported("unsubscribe")),
        }
    }

    /// Drain whatever timer action the last state transition queued, for
    /// REQ/SURVEYOR. Every other protocol has no timer and always reports
    /// `None`.
    pub fn take_timer_action(&mut self) -> Option<TimerAction> {
        match self {
            Self::Req(r) => r.take_timer_action().map(Into::into),
            Self::Surveyor(s) => s.take_timer_action().map(Into::into),
            _ => None,
        }
    }

    pub fn on_timer_fired(&mut self) {
        match self {
            Self::Req(r) => r.on_resend_timeout(),
            Self::Surveyor(s) => s.on_deadline(),
            _ => {}
        }
    }

    pub fn on_timer_stopped(&mut self) {
        match self {
            Self::Req(r) => r.on_timer_stopped(),
            Self::Surveyor(s) => s.on_timer_stopped(),
            _ => {}
        }
    }

    pub fn on_pipe_gone(&mut self, id: PipeId) {
        if let Self::Req(r) = self {
            r.on_pipe_gone(id);
        }
    }
}

impl Protocol for AnyProtocol {
    fn protocol_id(&self) -> u16 {
        match self {
            Self::Pair(p) => p.protocol_id(),
            Self::Pub(p) => p.protocol_id(),
            Self::Sub(p) => p.protocol_id(),
            Self::Req(p) => p.protocol_id(),
            Self::Rep(p) => p.protocol_id(),
            Self::Push(p) => p.protocol_id(),
            Self::Pull(p) => p.protocol_id(),
            Self::Surveyor(p) => p.protocol_id(),
            Self::Respondent(p) => p.protocol_id(),
            Self::Bus(p) => p.protocol_id(),
        }
    }

    fn accepted_peers(&self) -> &'static [u16] {
        match self {
            Self::Pair(p) => p.accepted_peers(),
            Self::Pub(p) => p.accepted_peers(),
            Self::Sub(p) => p.accepted_peers(),
            Self::Req(p) => p.accepted_peers(),
            Self::Rep(p) => p.accepted_peers(),
            Self::Push(p) => p.accepted_peers(),
            Self::Pull(p) => p.accepted_peers(),
            Self::Surveyor(p) => p.accepted_peers(),
            Self::Respondent(p) => p.accepted_peers(),
            Self::Bus(p) => p.accepted_peers(),
        }
    }

    fn header_len(&self) -> usize {
        match self {
            Self::Pair(p) => p.header_len(),
            Self::Pub(p) => p.header_len(),
            Self::Sub(p) => p.header_len(),
            Self::Req(p) => p.header_len(),
            Self::Rep(p) => p.header_len(),
            Self::Push(p) => p.header_len(),
            Self::Pull(p) => p.header_len(),
            Self::Surveyor(p) => p.header_len(),
            Self::Respondent(p) => p.header_len(),
            Self::Bus(p) => p.header_len(),
        }
    }

    fn add_pipe(&mut self) -> PipeId {
        match self {
            Self::Pair(p) => p.add_pipe(),
            Self::Pub(p) => p.add_pipe(),
            Self::Sub(p) => p.add_pipe(),
            Self::Req(p) => p.add_pipe(),
            Self::Rep(p) => p.add_pipe(),
            Self::Push(p) => p.add_pipe(),
            Self::Pull(p) => p.add_pipe(),
            Self::Surveyor(p) => p.add_pipe(),
            Self::Respondent(p) => p.add_pipe(),
            Self::Bus(p) => p.add_pipe(),
        }
    }

    fn rm_pipe(&mut self, id: PipeId) {
        match self {
            Self::Pair(p) => p.rm_pipe(id),
            Self::Pub(p) => p.rm_pipe(id),
            Self::Sub(p) => p.rm_pipe(id),
            Self::Req(p) => p.rm_pipe(id),
            Self::Rep(p) => p.rm_pipe(id),
            Self::Push(p) => p.rm_pipe(id),
            Self::Pull(p) => p.rm_pipe(id),
            Self::Surveyor(p) => p.rm_pipe(id),
            Self::Respondent(p) => p.rm_pipe(id),
            Self::Bus(p) => p.rm_pipe(id),
        }
    }

    fn stop(&mut self) -> StopOutcome {
        match self {
            Self::Pair(p) => p.stop(),
            Self::Pub(p) => p.stop(),
            Self::Sub(p) => p.stop(),
            Self::Req(p) => p.stop(),
            Self::Rep(p) => p.stop(),
            Self::Push(p) => p.stop(),
            Self::Pull(p) => p.stop(),
            Self::Surveyor(p) => p.stop(),
            Self::Respondent(p) => p.stop(),
            Self::Bus(p) => p.stop(),
        }
    }

    fn in_event(&mut self, id: PipeId) {
        match self {
            Self::Pair(p) => p.in_event(id),
            Self::Pub(p) => p.in_event(id),
            Self::Sub(p) => p.in_event(id),
            Self::Req(p) => p.in_event(id),
            Self::Rep(p) => p.in_event(id),
            Self::Push(p) => p.in_event(id),
            Self::Pull(p) => p.in_event(id),
            Self::Surveyor(p) => p.in_event(id),
            Self::Respondent(p) => p.in_event(id),
            Self::Bus(p) => p.in_event(id),
        }
    }

    fn out_event(&mut self, id: PipeId) {
        match self {
            Self::Pair(p) => p.out_event(id),
            Self::Pub(p) => p.out_event(id),
            Self::Sub(p) => p.out_event(id),
            Self::Req(p) => p.out_event(id),
            Self::Rep(p) => p.out_event(id),
            Self::Push(p) => p.out_event(id),
            Self::Pull(p) => p.out_event(id),
            Self::Surveyor(p) => p.out_event(id),
            Self::Respondent(p) => p.out_event(id),
            Self::Bus(p) => p.out_event(id),
        }
    }

    fn events(&self) -> Readiness {
        match self {
            Self::Pair(p) => p.events(),
            Self::Pub(p) => p.events(),
            Self::Sub(p) => p.events(),
            Self::Req(p) => p.events(),
            Self::Rep(p) => p.events(),
            Self::Push(p) => p.events(),
            Self::Pull(p) => p.events(),
            Self::Surveyor(p) => p.events(),
            Self::Respondent(p) => p.events(),
            Self::Bus(p) => p.events(),
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        match self {
            Self::Pair(p) => p.send(msg),
            Self::Pub(p) => p.send(msg),
            Self::Sub(p) => p.send(msg),
            Self::Req(p) => p.send(msg),
            Self::Rep(p) => p.send(msg),
            Self::Push(p) => p.send(msg),
            Self::Pull(p) => p.send(msg),
            Self::Surveyor(p) => p.send(msg),
            Self::Respondent(p) => p.send(msg),
            Self::Bus(p) => p.send(msg),
        }
    }

    fn recv(&mut self) -> Result<Message> {
        match self {
            Self::Pair(p) => p.recv(),
            Self::Pub(p) => p.recv(),
            Self::Sub(p) => p.recv(),
            Self::Req(p) => p.recv(),
            Self::Rep(p) => p.recv(),
            Self::Push(p) => p.recv(),
            Self::Pull(p) => p.recv(),
            Self::Surveyor(p) => p.recv(),
            Self::Respondent(p) => p.recv(),
            Self::Bus(p) => p.recv(),
        }
    }

    fn pipe_deliver_inbound(&mut self, id: PipeId, msg: Message) -> Result<bool> {
        match self {
            Self::Pair(p) => p.pipe_deliver_inbound(id, msg),
            Self::Pub(p) => p.pipe_deliver_inbound(id, msg),
            Self::Sub(p) => p.pipe_deliver_inbound(id, msg),
            Self::Req(p) => p.pipe_deliver_inbound(id, msg),
            Self::Rep(p) => p.pipe_deliver_inbound(id, msg),
            Self::Push(p) => p.pipe_deliver_inbound(id, msg),
            Self::Pull(p) => p.pipe_deliver_inbound(id, msg),
            Self::Surveyor(p) => p.pipe_deliver_inbound(id, msg),
            Self::Respondent(p) => p.pipe_deliver_inbound(id, msg),
            Self::Bus(p) => p.pipe_deliver_inbound(id, msg),
        }
    }

    fn pipe_take_outbound(&mut self, id: PipeId) -> Option<Message> {
        match self {
            Self::Pair(p) => p.pipe_take_outbound(id),
            Self::Pub(p) => p.pipe_take_outbound(id),
            Self::Sub(p) => p.pipe_take_outbound(id),
            Self::Req(p) => p.pipe_take_outbound(id),
            Self::Rep(p) => p.pipe_take_outbound(id),
            Self::Push(p) => p.pipe_take_outbound(id),
            Self::Pull(p) => p.pipe_take_outbound(id),
            Self::Surveyor(p) => p.pipe_take_outbound(id),
            Self::Respondent(p) => p.pipe_take_outbound(id),
            Self::Bus(p) => p.pipe_take_outbound(id),
        }
    }

    fn pipe_mark_flushed(&mut self, id: PipeId) {
        match self {
            Self::Pair(p) => p.pipe_mark_flushed(id),
            Self::Pub(p) => p.pipe_mark_flushed(id),
            Self::Sub(p) => p.pipe_mark_flushed(id),
            Self::Req(p) => p.pipe_mark_flushed(id),
            Self::Rep(p) => p.pipe_mark_flushed(id),
            Self::Push(p) => p.pipe_mark_flushed(id),
            Self::Pull(p) => p.pipe_mark_flushed(id),
            Self::Surveyor(p) => p.pipe_mark_flushed(id),
            Self::Respondent(p) => p.pipe_mark_flushed(id),
            Self::Bus(p) => p.pipe_mark_flushed(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_right_wire_id() {
        let p = AnyProtocol::new(
            ProtocolKind::Push,
            Duration::from_secs(1),
            Duration::from_secs(1),
            crate::DEFAULT_HWM,
            crate::DEFAULT_HWM,
        );
        assert_eq!(p.protocol_id(), protocol_ids::PUSH);
        assert_eq!(p.accepted_peers(), &[protocol_ids::PULL]);
    }

    #[test]
    fn req_and_respondent_carry_a_four_byte_header() {
        let req = AnyProtocol::new(
            ProtocolKind::Req,
            Duration::from_secs(1),
            Duration::from_secs(1),
            crate::DEFAULT_HWM,
            crate::DEFAULT_HWM,
        );
        assert_eq!(req.header_len(), 4);
        let pair = AnyProtocol::new(
            ProtocolKind::Pair,
            Duration::from_secs(1),
            Duration::from_secs(1),
            crate::DEFAULT_HWM,
            crate::DEFAULT_HWM,
        );
        assert_eq!(pair.header_len(), 0);
    }

    #[test]
    fn subscribe_on_non_sub_is_unsupported() {
        let mut push = AnyProtocol::new(
            ProtocolKind::Push,
            Duration::from_secs(1),
            Duration::from_secs(1),
            crate::DEFAULT_HWM,
            crate::DEFAULT_HWM,
        );
        assert!(matches!(push.subscribe(bytes::Bytes::from_static(b"x")), Err(Error::NotSupported(_))));
    }
}
