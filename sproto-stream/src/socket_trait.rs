//! The protocol vtable: `create`/`destroy`/`stop`/`add_pipe`/`rm_pipe`/
//! `in`/`out`/`events`/`send`/`recv`/`setopt`/`getopt`, realized as a
//! plain trait. Dispatch happens through a tagged enum of concrete
//! protocols, not a trait object, so every FSM still gets an exhaustive
//! `match (state, event)` at its own call sites.

use crate::base::PipeId;
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;

/// What a protocol is currently ready for — mirrors the socket core's
/// `{IN?, OUT?}` readiness poll used to drive the send/recv event FDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

/// Outcome of asking a protocol to stop: either it's already idle, or it
/// has outstanding pipes/timers to drain and the socket core must wait for
/// a later `Event::Stopped`-equivalent notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Idle,
    Pending,
}

/// The protocol-FSM vtable every SP protocol implements.
pub trait Protocol {
    /// This protocol's wire identifier, sent in the stream handshake.
    fn protocol_id(&self) -> u16;

    /// Protocol identifiers this protocol will peer with.
    fn accepted_peers(&self) -> &'static [u16];

    /// Length in bytes of this protocol's SP header stamp, used to split a
    /// reassembled wire frame (header+body concatenated, per the framing
    /// rule) back into [`sproto_core::message::Message`]'s two parts.
    /// Zero for protocols with no stamp (PAIR/PUB/SUB/PUSH/PULL/BUS); 4 for
    /// REQ/REP/SURVEYOR/RESPONDENT's request-id stamp.
    fn header_len(&self) -> usize {
        0
    }

    /// A newly attached pipe (post-handshake). Returns the id this
    /// protocol's `RawBase` assigned it — the caller must use that id, not
    /// one of its own, for every later `rm_pipe`/`in_event`/`out_event`.
    fn add_pipe(&mut self) -> PipeId;

    /// A pipe has disconnected or is being torn down.
    fn rm_pipe(&mut self, id: PipeId);

    /// Begin shutdown. `Idle` means the protocol has nothing left to
    /// drain; `Pending` means the socket core must wait for further
    /// pipe/timer events before the protocol can be destroyed.
    fn stop(&mut self) -> StopOutcome;

    /// The pipe named by `id` has become readable.
    fn in_event(&mut self, id: PipeId);

    /// The pipe named by `id` has become writable.
    fn out_event(&mut self, id: PipeId);

    /// Current `{IN?, OUT?}` readiness, polled by the socket core's
    /// `onleave` hook.
    fn events(&self) -> Readiness;

    /// Submit a message from the application. Returns `Error::Again` if
    /// the protocol cannot accept it right now (the socket core's
    /// blocking wrapper retries after the send-ready event FD signals).
    fn send(&mut self, msg: Message) -> Result<()>;

    /// Retrieve a message for the application. Returns `Error::Again` if
    /// none is available, or a protocol-specific error (`Error::Fsm` for
    /// SURVEYOR's "no survey in progress", `Error::TimedOut` for an
    /// expired survey) per the per-protocol `recv` rules.
    fn recv(&mut self) -> Result<Message>;

    /// Push inbound bytes already reconstructed into a `Message` onto pipe
    /// `id`. Used by the transport layer bridging bytes read off the wire
    /// into this protocol's internal pipe queue, ahead of `in_event`.
    fn pipe_deliver_inbound(&mut self, id: PipeId, msg: Message) -> Result<bool>;

    /// Pull the next outbound message queued on pipe `id`, if any — the
    /// transport layer encodes and writes it, then calls
    /// `pipe_mark_flushed`.
    fn pipe_take_outbound(&mut self, id: PipeId) -> Option<Message>;

    /// Acknowledge that the message last returned by `pipe_take_outbound`
    /// has been written to the wire.
    fn pipe_mark_flushed(&mut self, id: PipeId);

    /// Unconditionally return `EAGAIN` for an operation this protocol
    /// doesn't support at all — e.g. `send` on PULL, `recv` on PUSH.
    fn unsupported(op: &'static str) -> Error {
        Error::NotSupported(op.to_string())
    }
}
