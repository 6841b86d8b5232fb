//! FSM runtime & context locking.
//!
//! A [`Context`] is the reentrant critical section every FSM belonging to one
//! socket runs inside. `enter` acquires the lock (reentrantly — the same
//! thread may call it again from within a handler) and runs the supplied
//! closure; on return it drains the incoming queue (FIFO, delivering each
//! event to its registered [`FsmHandler`]), then the outgoing queue
//! (entering the destination context for each cross-context event in turn),
//! then fires the `onleave` hook, all still under the lock.
//!
//! Cross-context events are always batched into `outgoing` rather than
//! dispatched immediately, so a handler never holds two context locks at
//! once — it only ever reaches another context's lock at the precise
//! delivery site inside that context's own `enter` call.
//!
//! The reentrant-critical-section idiom generalizes the sans-IO
//! `on_bytes(&mut self, ...) -> Vec<Event>` shape used elsewhere in this
//! crate from one FSM's private state to a shared registry of FSMs that
//! all dispatch through one lock.

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Identifies one FSM registered against a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsmId(u64);

/// Identifies a worker-pool timer; carried by `Event::Timeout` /
/// `Event::TimerStopped` so a handler can tell which of its own timers fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// The generic event vocabulary the context runtime dispatches. Protocol
/// FSMs (REQ, SURVEYOR, ...) are driven through their own richer sans-IO
/// state machines by the socket core rather than through this enum directly
/// — this is the vocabulary for the infrastructure layer: pipes, endpoint
/// sockets, the worker pool, and the in-process transport's flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    Stopped,
    In,
    Out,
    Err,
    Timeout(TimerId),
    TimerStopped(TimerId),
    Sent,
    Received,
    Receiving,
    Sending,
    Disconnect,
    /// Opaque protocol-specific signal, carrying a small tag the receiving
    /// FSM interprets itself (used for transport-specific flow-control
    /// signals that don't warrant their own variant).
    Signal(u32),
}

/// An FSM that can be registered with a [`Context`] and receive dispatched
/// events. Implementors hold their own state enum and transition table;
/// `handle` is the `(state, event)` match spec.md's design notes call for —
/// exhaustive, with `unreachable!()` naming the offending pair for anything
/// genuinely impossible rather than a silent no-op.
pub trait FsmHandler: Send {
    fn handle(&mut self, ctx: &Arc<Context>, event: Event);
}

struct Inner {
    handlers: HashMap<FsmId, Box<dyn FsmHandler>>,
    incoming: VecDeque<(FsmId, Event)>,
    outgoing: VecDeque<(Arc<Context>, FsmId, Event)>,
    holds: usize,
    onleave: Option<Box<dyn FnMut(&Arc<Context>) + Send>>,
}

/// One socket's reentrant critical section: the FSM runtime's unit of
/// mutual exclusion. Every pipe, endpoint, and protocol-adjacent FSM that
/// belongs to a given socket is registered against that socket's `Context`;
/// a different socket's FSMs live in a different `Context` and are only
/// ever reached via `raise_to`.
pub struct Context {
    lock: ReentrantMutex<RefCell<Inner>>,
    release: (Mutex<()>, Condvar),
    next_id: AtomicU64,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(RefCell::new(Inner {
                handlers: HashMap::new(),
                incoming: VecDeque::new(),
                outgoing: VecDeque::new(),
                holds: 0,
                onleave: None,
            })),
            release: (Mutex::new(()), Condvar::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        f(&mut inner)
    }

    /// Register an FSM, returning the id other FSMs use to address it with
    /// `raise`/`raise_to`.
    pub fn register(&self, handler: Box<dyn FsmHandler>) -> FsmId {
        let id = FsmId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.with_inner(|inner| {
            inner.handlers.insert(id, handler);
        });
        id
    }

    pub fn unregister(&self, id: FsmId) {
        self.with_inner(|inner| {
            inner.handlers.remove(&id);
        });
    }

    /// Enqueue `event` for `target` within this same context. Must be
    /// called from within an `enter` call (i.e. from inside a handler, or
    /// by a caller that already holds the lock via its own `enter`).
    pub fn raise(&self, target: FsmId, event: Event) {
        self.with_inner(|inner| inner.incoming.push_back((target, event)));
    }

    /// Enqueue `event` for `target` in a *different* context. Delivery is
    /// deferred to this context's `leave` phase, which enters `dest`,
    /// delivers the event, and leaves — never holding both locks at once.
    pub fn raise_to(&self, dest: &Arc<Context>, target: FsmId, event: Event) {
        self.with_inner(|inner| inner.outgoing.push_back((dest.clone(), target, event)));
    }

    /// Increment the hold counter. Call only from `{init, active}` socket
    /// states — holds model outstanding application-visible work that must
    /// complete before the context (and its owning socket) can be torn down.
    pub fn hold(&self) {
        self.with_inner(|inner| inner.holds += 1);
    }

    /// Decrement the hold counter, signalling any `wait_til_released` caller
    /// once it reaches zero.
    pub fn release(&self) {
        let reached_zero = self.with_inner(|inner| {
            inner.holds = inner.holds.saturating_sub(1);
            inner.holds == 0
        });
        if reached_zero {
            let (m, cv) = &self.release;
            let _g = m.lock().unwrap();
            cv.notify_all();
        }
    }

    /// Block until the hold counter reaches zero. On wake, both queues are
    /// guaranteed empty (every FSM has run its shutdown path to completion).
    pub fn wait_til_released(&self) {
        let (m, cv) = &self.release;
        let mut guard = m.lock().unwrap();
        while !self.with_inner(|inner| inner.holds == 0) {
            guard = cv.wait(guard).unwrap();
        }
        drop(guard);
        self.with_inner(|inner| {
            debug_assert!(inner.incoming.is_empty(), "wait_til_released with non-empty incoming");
            debug_assert!(inner.outgoing.is_empty(), "wait_til_released with non-empty outgoing");
        });
    }

    /// Install the `onleave` hook, invoked at the end of every top-level
    /// `enter` call while the lock is still held. The socket core uses this
    /// to poll the protocol for `{IN?, OUT?}` and signal the readiness event
    /// FDs so external pollers never need the lock themselves.
    pub fn set_onleave(&self, f: impl FnMut(&Arc<Context>) + Send + 'static) {
        self.with_inner(|inner| inner.onleave = Some(Box::new(f)));
    }

    /// Acquire the context lock (reentrant on the calling thread), run `f`,
    /// then drain `incoming`/`outgoing` and fire `onleave` before returning.
    /// This is `enter` and `leave` fused into one call, matching how every
    /// real call site uses them: do one piece of work, then let the runtime
    /// flush whatever events that work produced.
    pub fn enter<R>(self: &Arc<Self>, f: impl FnOnce(&Arc<Context>) -> R) -> R {
        let _outer = self.lock.lock();
        let result = f(self);
        self.leave();
        result
    }

    fn leave(self: &Arc<Self>) {
        loop {
            let next = self.with_inner(Inner::pop_incoming);
            let Some((target, event)) = next else { break };
            self.dispatch(target, event);
        }
        loop {
            let next = self.with_inner(Inner::pop_outgoing);
            let Some((dest, target, event)) = next else { break };
            if Arc::ptr_eq(&dest, self) {
                self.dispatch(target, event);
            } else {
                dest.enter(|ctx| ctx.raise(target, event));
            }
        }

        let mut onleave = self.with_inner(|inner| inner.onleave.take());
        if let Some(cb) = onleave.as_mut() {
            cb(self);
        }
        if let Some(cb) = onleave {
            self.with_inner(|inner| inner.onleave = Some(cb));
        }
    }

    fn dispatch(self: &Arc<Self>, target: FsmId, event: Event) {
        let handler = self.with_inner(|inner| inner.handlers.remove(&target));
        if let Some(mut h) = handler {
            h.handle(self, event);
            self.with_inner(|inner| {
                inner.handlers.insert(target, h);
            });
        }
    }
}

impl Inner {
    fn pop_incoming(&mut self) -> Option<(FsmId, Event)> {
        self.incoming.pop_front()
    }

    fn pop_outgoing(&mut self) -> Option<(Arc<Context>, FsmId, Event)> {
        self.outgoing.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct Recorder(Arc<StdMutex<Vec<Event>>>);
    impl FsmHandler for Recorder {
        fn handle(&mut self, _ctx: &Arc<Context>, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn events_delivered_in_fifo_order() {
        let ctx = Arc::new(Context::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let id = ctx.register(Box::new(Recorder(log.clone())));

        ctx.enter(|c| {
            c.raise(id, Event::Start);
            c.raise(id, Event::In);
            c.raise(id, Event::Out);
        });

        assert_eq!(*log.lock().unwrap(), vec![Event::Start, Event::In, Event::Out]);
    }

    #[test]
    fn cross_context_event_delivered_via_raise_to() {
        let a = Arc::new(Context::new());
        let b = Arc::new(Context::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let id_b = b.register(Box::new(Recorder(log.clone())));

        a.enter(|ctx_a| {
            ctx_a.raise_to(&b, id_b, Event::Disconnect);
        });

        assert_eq!(*log.lock().unwrap(), vec![Event::Disconnect]);
    }

    #[test]
    fn hold_release_wakes_waiter() {
        let ctx = Arc::new(Context::new());
        ctx.hold();
        ctx.hold();

        let waiter_ctx = ctx.clone();
        let handle = std::thread::spawn(move || {
            waiter_ctx.wait_til_released();
        });

        ctx.release();
        ctx.release();
        handle.join().unwrap();
    }

    #[test]
    fn onleave_runs_after_drain() {
        let ctx = Arc::new(Context::new());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let id = ctx.register(Box::new(Recorder(seen.clone())));

        let fired = Arc::new(StdMutex::new(false));
        let fired2 = fired.clone();
        ctx.set_onleave(move |_| {
            *fired2.lock().unwrap() = true;
        });

        ctx.enter(|c| c.raise(id, Event::Start));
        assert!(*fired.lock().unwrap());
    }
}
