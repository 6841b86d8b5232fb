//! Ordered timer list for the worker pool.
//!
//! A worker owns one [`TimerWheel`] per reactor thread: a min-heap ordered
//! by deadline. `next_delay` tells the main loop how long to wait for
//! readiness before timers need servicing; `expired` drains everything due.
//!
//! Cancellation is asynchronous relative to the worker thread: `cancel`
//! removes the entry if still pending, but the caller always gets a
//! `TimerStopped` event (never silently dropped), matching the owning FSM's
//! expectation that every `add_timer` is eventually answered by exactly one
//! of `Timeout`/`TimerStopped`.

use crate::context::{FsmId, TimerId};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    deadline: Instant,
    id: TimerId,
    owner: FsmId,
}

// Ordered by deadline only; ties broken by insertion id for determinism.
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.id.0.cmp(&other.id.0))
    }
}

/// A worker's min-heap of pending timers, keyed by deadline.
#[derive(Default)]
pub struct TimerWheel {
    heap: BinaryHeap<Reverse<Entry>>,
    next_id: AtomicU64,
    cancelled: std::collections::HashSet<u64>,
}

impl TimerWheel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `owner`, firing in `delay`. Returns the id needed to
    /// cancel it.
    pub fn add(&mut self, owner: FsmId, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now() + delay;
        self.heap.push(Reverse(Entry { deadline, id, owner }));
        id
    }

    /// Cancel a pending timer. Does not itself raise the `TimerStopped`
    /// event — the worker's main loop does that for every cancelled id on
    /// its next pass, since cancellation must be answered even if the timer
    /// has already (concurrently) fired.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id.0);
    }

    /// Remaining time until the next timer is due, or `None` if the wheel
    /// is empty (the worker should then wait indefinitely for I/O).
    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(e)| {
            e.deadline.saturating_duration_since(Instant::now())
        })
    }

    /// Pop every timer whose deadline has passed, returning `(owner, id,
    /// fired)` where `fired` is `false` for an entry that was cancelled
    /// before it expired (the owner still gets a `TimerStopped`, just not a
    /// `Timeout`).
    pub fn expired(&mut self) -> Vec<(FsmId, TimerId, bool)> {
        let now = Instant::now();
        let mut out = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().unwrap();
            let fired = !self.cancelled.remove(&entry.id.0);
            out.push((entry.owner, entry.id, fired));
        }
        out
    }

    /// Immediately resolve every cancelled-but-not-yet-popped timer,
    /// reporting them as stopped without waiting for their deadline.
    pub fn drain_cancelled(&mut self) -> Vec<(FsmId, TimerId)> {
        if self.cancelled.is_empty() {
            return Vec::new();
        }
        let mut remaining = BinaryHeap::new();
        let mut stopped = Vec::new();
        while let Some(Reverse(entry)) = self.heap.pop() {
            if self.cancelled.remove(&entry.id.0) {
                stopped.push((entry.owner, entry.id));
            } else {
                remaining.push(Reverse(entry));
            }
        }
        self.heap = remaining;
        stopped
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm(n: u64) -> FsmId {
        // FsmId fields are private; use the public Context registry in
        // integration tests. Here we only need distinct opaque values for
        // ordering checks, so route through a throwaway context.
        let ctx = std::sync::Arc::new(crate::context::Context::new());
        struct Noop;
        impl crate::context::FsmHandler for Noop {
            fn handle(&mut self, _ctx: &std::sync::Arc<crate::context::Context>, _event: crate::context::Event) {}
        }
        let mut id = ctx.register(Box::new(Noop));
        for _ in 1..n {
            id = ctx.register(Box::new(Noop));
        }
        id
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        let owner = fsm(1);
        let t1 = wheel.add(owner, Duration::from_millis(50));
        let _t2 = wheel.add(owner, Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(60));
        let expired = wheel.expired();
        assert_eq!(expired.len(), 2);
        // t2 (shorter delay) should come first.
        assert_ne!(expired[0].1, t1);
    }

    #[test]
    fn cancel_before_expiry_marks_not_fired() {
        let mut wheel = TimerWheel::new();
        let owner = fsm(1);
        let id = wheel.add(owner, Duration::from_millis(10));
        wheel.cancel(id);

        std::thread::sleep(Duration::from_millis(20));
        let expired = wheel.expired();
        assert_eq!(expired, vec![(owner, id, false)]);
    }

    #[test]
    fn next_delay_reflects_soonest_timer() {
        let mut wheel = TimerWheel::new();
        assert!(wheel.next_delay().is_none());
        let owner = fsm(1);
        wheel.add(owner, Duration::from_millis(500));
        assert!(wheel.next_delay().unwrap() <= Duration::from_millis(500));
    }
}
