//! Pipe abstraction: the message-oriented link between one endpoint
//! and the protocol FSM multiplexing over it.
//!
//! A pipe wraps one connected endpoint (stream session or in-process
//! session) with flow-control bookkeeping: `send`/`recv` return `OK` or
//! `EAGAIN`, and the pipe raises `IN`/`OUT` to the owning protocol exactly
//! once per readiness transition — it stays readable/writable until the
//! corresponding operation actually returns `EAGAIN`.

use crate::error::{Error, Result};
use crate::message::Message;
use std::collections::VecDeque;

/// Outcome of a non-blocking pipe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeResult {
    Ok,
    Again,
}

/// Priority assigned to a pipe from its owning endpoint's template
/// (`SNDPRIO`/`RCVPRIO`), 1 (highest) to 16 (lowest). Devices and
/// fair-queuing protocols use this to decide which ready pipe to service
/// next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    #[must_use]
    pub fn new(p: u8) -> Self {
        Self(p.clamp(1, 16))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(8)
    }
}

/// One pipe's send/recv queues and readiness bookkeeping.
///
/// The outbound queue represents messages handed to the peer-facing
/// transport but not yet flushed; `send_capacity` bytes of framed messages
/// (`Message::wire_len`) may be outstanding before `send` starts returning
/// `Again`. The inbound queue holds messages the transport has fully
/// decoded but the protocol hasn't yet drained via `recv`, bounded the same
/// way by `recv_capacity` bytes — this is `RCVBUF`/`SNDBUF`'s byte-counted
/// backpressure, not a message count.
pub struct Pipe {
    outbound: VecDeque<Message>,
    inbound: VecDeque<Message>,
    outbound_bytes: usize,
    inbound_bytes: usize,
    send_capacity: usize,
    recv_capacity: usize,
    send_priority: Priority,
    recv_priority: Priority,
    writable: bool,
    readable: bool,
}

impl Pipe {
    /// `send_capacity`/`recv_capacity` are byte limits (`RCVBUF`/`SNDBUF`),
    /// not message counts.
    #[must_use]
    pub fn new(send_capacity: usize, recv_capacity: usize) -> Self {
        Self {
            outbound: VecDeque::new(),
            inbound: VecDeque::new(),
            outbound_bytes: 0,
            inbound_bytes: 0,
            send_capacity: send_capacity.max(1),
            recv_capacity: recv_capacity.max(1),
            send_priority: Priority::default(),
            recv_priority: Priority::default(),
            writable: true,
            readable: false,
        }
    }

    #[must_use]
    pub fn with_priorities(mut self, send: Priority, recv: Priority) -> Self {
        self.send_priority = send;
        self.recv_priority = recv;
        self
    }

    #[must_use]
    pub const fn send_priority(&self) -> Priority {
        self.send_priority
    }

    #[must_use]
    pub const fn recv_priority(&self) -> Priority {
        self.recv_priority
    }

    /// Hand a message to the peer-facing side. Once the outbound queue's
    /// cumulative wire size reaches `send_capacity` bytes, further sends
    /// return `Again` until the transport reports a drained slot via
    /// `mark_flushed`.
    pub fn send(&mut self, msg: Message) -> PipeResult {
        if !self.writable {
            return PipeResult::Again;
        }
        self.outbound_bytes += msg.wire_len();
        self.outbound.push_back(msg);
        if self.outbound_bytes >= self.send_capacity {
            self.writable = false;
        }
        PipeResult::Ok
    }

    /// Pop the next message the transport should flush to the wire.
    pub fn next_outbound(&mut self) -> Option<Message> {
        let msg = self.outbound.pop_front()?;
        self.outbound_bytes -= msg.wire_len();
        Some(msg)
    }

    /// The transport confirms one outbound message was flushed, freeing up
    /// send-buffer bytes. Returns `true` if this transitions the pipe from
    /// not-writable to writable — the caller should then raise `OUT`.
    pub fn mark_flushed(&mut self) -> bool {
        let was_blocked = !self.writable;
        if self.outbound_bytes < self.send_capacity {
            self.writable = true;
        }
        was_blocked && self.writable
    }

    /// Retrieve a completed inbound message.
    pub fn recv(&mut self) -> PipeResult2 {
        match self.inbound.pop_front() {
            Some(msg) => {
                self.inbound_bytes -= msg.wire_len();
                if self.inbound_bytes < self.recv_capacity {
                    self.readable = !self.inbound.is_empty();
                }
                PipeResult2::Ok(msg)
            }
            None => {
                self.readable = false;
                PipeResult2::Again
            }
        }
    }

    /// The transport delivers a fully decoded message. Returns `true` if
    /// this transitions the pipe from not-readable to readable — the
    /// caller should then raise `IN`. Returns an error if the inbound
    /// buffer is already saturated in bytes (the transport should apply
    /// backpressure before this happens).
    pub fn deliver_inbound(&mut self, msg: Message) -> Result<bool> {
        if self.inbound_bytes >= self.recv_capacity {
            return Err(Error::Fsm("inbound queue saturated"));
        }
        let was_empty = self.inbound.is_empty();
        self.inbound_bytes += msg.wire_len();
        self.inbound.push_back(msg);
        self.readable = true;
        Ok(was_empty)
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.readable
    }

    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    #[must_use]
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }
}

/// `recv`'s result carries the message on success, unlike `send`'s plain
/// `PipeResult` — named distinctly to keep the `Ok(Message)` payload out of
/// the simpler enum used for pure readiness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeResult2 {
    Ok(Message),
    Again,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_blocks_at_capacity() {
        let mut pipe = Pipe::new(2, 2);
        assert_eq!(pipe.send(Message::from_body("a")), PipeResult::Ok);
        assert_eq!(pipe.send(Message::from_body("b")), PipeResult::Ok);
        assert!(!pipe.is_writable());
        assert_eq!(pipe.send(Message::from_body("c")), PipeResult::Again);
    }

    #[test]
    fn mark_flushed_reopens_writability() {
        let mut pipe = Pipe::new(1, 2);
        pipe.send(Message::from_body("a"));
        assert!(!pipe.is_writable());
        pipe.next_outbound();
        assert!(pipe.mark_flushed());
        assert!(pipe.is_writable());
    }

    #[test]
    fn recv_stays_readable_until_drained() {
        let mut pipe = Pipe::new(2, 2);
        assert!(pipe.deliver_inbound(Message::from_body("x")).unwrap());
        assert!(pipe.is_readable());
        assert_eq!(pipe.recv(), PipeResult2::Ok(Message::from_body("x")));
        assert!(!pipe.is_readable());
        assert_eq!(pipe.recv(), PipeResult2::Again);
    }

    #[test]
    fn deliver_inbound_rejects_when_saturated() {
        let mut pipe = Pipe::new(2, 1);
        pipe.deliver_inbound(Message::from_body("a")).unwrap();
        assert!(pipe.deliver_inbound(Message::from_body("b")).is_err());
    }

    #[test]
    fn priority_clamped_to_valid_range() {
        assert_eq!(Priority::new(0).get(), 1);
        assert_eq!(Priority::new(200).get(), 16);
        assert_eq!(Priority::default().get(), 8);
    }
}
