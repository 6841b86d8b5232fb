//! Raw pipe bookkeeping shared by every protocol FSM: every protocol
//! composes this rather than reimplementing pipe add/remove/fair-queueing.
//!
//! `RawBase` owns the set of pipes currently attached to a socket and
//! implements the send/recv distribution policies common across protocols:
//! round-robin fair send, round-robin fair recv, and broadcast. Concrete
//! protocol FSMs (`req`, `surveyor`, `pair`, ...) compose a `RawBase`
//! rather than inheriting from it — every protocol struct holds one as a
//! field instead of using trait inheritance.

use sproto_core::message::Message;
use sproto_core::pipe::{Pipe, PipeResult, PipeResult2, Priority};
use std::collections::VecDeque;

/// Identifies one pipe within a socket's `RawBase`. Stable for the pipe's
/// lifetime; never reused while any reference to it might still be live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(pub u64);

struct Slot {
    id: PipeId,
    pipe: Pipe,
}

/// Shared pipe bookkeeping: attach/detach, fair-queue recv, round-robin
/// send, and broadcast. Iteration order is insertion order, which combined
/// with the rotating "last served" cursor gives round-robin fairness
/// without per-pipe extra state.
pub struct RawBase {
    slots: Vec<Slot>,
    next_id: u64,
    send_cursor: usize,
    recv_cursor: usize,
}

impl Default for RawBase {
    fn default() -> Self {
        Self::new()
    }
}

impl RawBase {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
            send_cursor: 0,
            recv_cursor: 0,
        }
    }

    /// Attach a new pipe (typically freshly connected/accepted), returning
    /// its id.
    pub fn add_pipe(&mut self, send_capacity: usize, recv_capacity: usize, priority: Priority) -> PipeId {
        let id = PipeId(self.next_id);
        self.next_id += 1;
        let pipe = Pipe::new(send_capacity, recv_capacity).with_priorities(priority, priority);
        self.slots.push(Slot { id, pipe });
        id
    }

    /// Detach a pipe (it has disconnected or the socket is tearing down).
    pub fn rm_pipe(&mut self, id: PipeId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        self.slots.len() != before
    }

    #[must_use]
    pub fn get_mut(&mut self, id: PipeId) -> Option<&mut Pipe> {
        self.slots.iter_mut().find(|s| s.id == id).map(|s| &mut s.pipe)
    }

    #[must_use]
    pub fn get(&self, id: PipeId) -> Option<&Pipe> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.pipe)
    }

    #[must_use]
    pub fn pipe_ids(&self) -> Vec<PipeId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Round-robin send (PUSH's load-balance policy, and REQ/SURVEYOR's
    /// single-pipe send are a degenerate case of the same rotation).
    /// Returns the pipe the message was handed to, or `None` if every pipe
    /// is currently not writable.
    pub fn send_round_robin(&mut self, msg: Message) -> Option<PipeId> {
        let n = self.slots.len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let idx = (self.send_cursor + offset) % n;
            if self.slots[idx].pipe.is_writable() {
                let id = self.slots[idx].id;
                if self.slots[idx].pipe.send(msg) == PipeResult::Ok {
                    self.send_cursor = (idx + 1) % n;
                    return Some(id);
                }
                return None;
            }
        }
        None
    }

    /// Broadcast to every writable pipe (PUB, BUS, SURVEYOR). Returns the
    /// ids that accepted the message; pipes that were not writable are
    /// silently skipped (slow subscriber semantics — no backpressure on
    /// fan-out).
    pub fn broadcast(&mut self, msg: &Message) -> Vec<PipeId> {
        let mut sent = Vec::new();
        for slot in &mut self.slots {
            if slot.pipe.is_writable() && slot.pipe.send(msg.clone()) == PipeResult::Ok {
                sent.push(slot.id);
            }
        }
        sent
    }

    /// Broadcast to every writable pipe except `excluding` (BUS: "received
    /// messages are not echoed back to the pipe they came from").
    pub fn broadcast_except(&mut self, msg: &Message, excluding: PipeId) -> Vec<PipeId> {
        let mut sent = Vec::new();
        for slot in &mut self.slots {
            if slot.id == excluding {
                continue;
            }
            if slot.pipe.is_writable() && slot.pipe.send(msg.clone()) == PipeResult::Ok {
                sent.push(slot.id);
            }
        }
        sent
    }

    /// Fair-queue recv across all readable pipes (PULL, SUB, RESPONDENT).
    /// Returns the message and which pipe it arrived on.
    pub fn recv_fair(&mut self) -> Option<(PipeId, Message)> {
        let n = self.slots.len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let idx = (self.recv_cursor + offset) % n;
            if self.slots[idx].pipe.is_readable() {
                if let PipeResult2::Ok(msg) = self.slots[idx].pipe.recv() {
                    let id = self.slots[idx].id;
                    self.recv_cursor = (idx + 1) % n;
                    return Some((id, msg));
                }
            }
        }
        None
    }

    /// Drain every message currently queued on `id`, oldest first.
    pub fn drain_pipe(&mut self, id: PipeId) -> VecDeque<Message> {
        let mut out = VecDeque::new();
        if let Some(pipe) = self.get_mut(id) {
            while let PipeResult2::Ok(msg) = pipe.recv() {
                out.push_back(msg);
            }
        }
        out
    }

    #[must_use]
    pub fn any_readable(&self) -> bool {
        self.slots.iter().any(|s| s.pipe.is_readable())
    }

    #[must_use]
    pub fn any_writable(&self) -> bool {
        self.slots.iter().any(|s| s.pipe.is_writable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with(n: usize) -> (RawBase, Vec<PipeId>) {
        let mut base = RawBase::new();
        let ids = (0..n).map(|_| base.add_pipe(4, 4, Priority::default())).collect();
        (base, ids)
    }

    #[test]
    fn round_robin_send_rotates_across_pipes() {
        let (mut base, ids) = base_with(2);
        let first = base.send_round_robin(Message::from_body("a")).unwrap();
        let second = base.send_round_robin(Message::from_body("b")).unwrap();
        assert_eq!(first, ids[0]);
        assert_eq!(second, ids[1]);
    }

    #[test]
    fn broadcast_reaches_every_writable_pipe() {
        let (mut base, ids) = base_with(3);
        let sent = base.broadcast(&Message::from_body("x"));
        assert_eq!(sent.len(), ids.len());
    }

    #[test]
    fn broadcast_except_skips_origin() {
        let (mut base, ids) = base_with(3);
        let sent = base.broadcast_except(&Message::from_body("x"), ids[1]);
        assert!(!sent.contains(&ids[1]));
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn fair_recv_rotates_across_ready_pipes() {
        let (mut base, ids) = base_with(2);
        base.get_mut(ids[0]).unwrap().deliver_inbound(Message::from_body("p0")).unwrap();
        base.get_mut(ids[1]).unwrap().deliver_inbound(Message::from_body("p1")).unwrap();

        let (first_id, _) = base.recv_fair().unwrap();
        let (second_id, _) = base.recv_fair().unwrap();
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn rm_pipe_removes_from_bookkeeping() {
        let (mut base, ids) = base_with(2);
        assert!(base.rm_pipe(ids[0]));
        assert_eq!(base.len(), 1);
        assert!(base.get(ids[0]).is_none());
    }
}
