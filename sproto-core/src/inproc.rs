//! In-process transport: `binproc`/`cinproc`/`sinproc`, a
//! process-wide registry keyed by address, and the zero-copy channel that
//! backs an established pairing.
//!
//! Grounded on the original `bind_inproc`/`connect_inproc` registry
//! (single-channel-pair, flume-backed) generalized into the three-FSM
//! design of `examples/original_source/src/transports/inproc/
//! {binproc,cinproc,sinproc}.c`: a listener (`Binproc`) holding a queue of
//! not-yet-accepted connect requests, a connecting endpoint (`Cinproc`)
//! that retries until a matching bind appears, and the paired session
//! (`Sinproc`) once both sides are up. Dataflow itself reuses `Pipe`
//! directly rather than re-deriving SENT/RECEIVED/RECEIVING/SENDING flow
//! control from scratch — two `Pipe`s wired back to back by `pump` give
//! the same backpressure semantics `Pipe` already provides every other
//! transport.

use crate::message::Message;
use crate::pipe::Pipe;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Observable state of one side of an inproc pairing. `Sinproc` exposes
/// this purely for introspection/testing; the actual byte flow is driven
/// by `InprocChannel::pump`, which doesn't need to consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Ready,
    Active,
    Disconnected,
    StoppingPeer,
    Stopping,
}

/// Two `Pipe`s wired back to back: `a`'s outbound feeds `b`'s inbound and
/// vice versa. `pump` is the synchronous equivalent of the C FSM's
/// SENT/RECEIVED event exchange — call it once per tick to move whatever
/// either side has queued.
pub struct InprocChannel {
    pub a: Pipe,
    pub b: Pipe,
}

impl InprocChannel {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            a: Pipe::new(capacity, capacity),
            b: Pipe::new(capacity, capacity),
        }
    }

    /// Move every queued outbound message on each side into the other
    /// side's inbound queue. Returns the number of messages moved.
    pub fn pump(&mut self) -> usize {
        let mut moved = 0;
        while let Some(msg) = self.a.next_outbound() {
            if self.b.deliver_inbound(msg).is_ok() {
                self.a.mark_flushed();
                moved += 1;
            } else {
                break;
            }
        }
        while let Some(msg) = self.b.next_outbound() {
            if self.a.deliver_inbound(msg).is_ok() {
                self.b.mark_flushed();
                moved += 1;
            } else {
                break;
            }
        }
        moved
    }
}

/// One not-yet-accepted connect request sitting in a `Binproc`'s queue.
struct PendingConnect {
    channel: Arc<Mutex<InprocChannel>>,
}

/// A bound inproc listener. Holds the queue of connections `cinproc` has
/// initiated but `binproc`'s owning socket hasn't yet accepted.
pub struct Binproc {
    addr: String,
    pending: VecDeque<PendingConnect>,
}

impl Binproc {
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Accept the next queued connection, if any, returning the
    /// listener-side channel handle the new pipe should read/write
    /// through.
    pub fn accept(&mut self) -> Option<Arc<Mutex<InprocChannel>>> {
        self.pending.pop_front().map(|c| c.channel)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Process-wide registry of bound inproc addresses. One process may
/// bind the same address only once; `connect` queues against whatever
/// `Binproc` is currently registered for the address, or fails immediately
/// if nothing is bound (the socket core is responsible for the
/// reconnect-interval retry loop, same as any other transport).
#[derive(Default)]
pub struct Registry {
    bindings: HashMap<String, Arc<Mutex<Binproc>>>,
}

static REGISTRY: once_cell::sync::Lazy<Mutex<Registry>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Registry::default()));

/// Errors specific to the in-process transport's registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InprocError {
    #[error("inproc address already bound: {0}")]
    AlreadyBound(String),
    #[error("no inproc listener bound at: {0}")]
    NoListener(String),
}

impl From<InprocError> for crate::error::Error {
    fn from(e: InprocError) -> Self {
        match e {
            InprocError::AlreadyBound(addr) => crate::error::Error::AddressInUse(addr),
            InprocError::NoListener(addr) => crate::error::Error::AddressNotAvailable(addr),
        }
    }
}

/// `binproc`'s `bind`: register `addr`, failing if it is already taken.
pub fn bind(addr: &str) -> Result<Arc<Mutex<Binproc>>, InprocError> {
    let mut registry = REGISTRY.lock();
    if registry.bindings.contains_key(addr) {
        return Err(InprocError::AlreadyBound(addr.to_string()));
    }
    let binproc = Arc::new(Mutex::new(Binproc {
        addr: addr.to_string(),
        pending: VecDeque::new(),
    }));
    registry.bindings.insert(addr.to_string(), binproc.clone());
    Ok(binproc)
}

/// `cinproc`'s `connect`: look up `addr` and queue a new pairing against
/// it, returning the connecting side's channel handle immediately
/// (`SessionState::Ready`, paired, but not yet accepted on the bound side —
/// messages queue in the channel's `Pipe`s either way since `Pipe` itself
/// buffers up to its capacity).
pub fn connect(addr: &str, capacity: usize) -> Result<Arc<Mutex<InprocChannel>>, InprocError> {
    let registry = REGISTRY.lock();
    let binproc = registry
        .bindings
        .get(addr)
        .ok_or_else(|| InprocError::NoListener(addr.to_string()))?
        .clone();
    drop(registry);

    let channel = Arc::new(Mutex::new(InprocChannel::new(capacity)));
    binproc.lock().pending.push_back(PendingConnect {
        channel: channel.clone(),
    });
    Ok(channel)
}

/// Remove `addr` from the registry (the bound socket is closing).
pub fn unbind(addr: &str) {
    REGISTRY.lock().bindings.remove(addr);
}

#[must_use]
pub fn is_bound(addr: &str) -> bool {
    REGISTRY.lock().bindings.contains_key(addr)
}

/// `sinproc`: the paired session once a connection has been accepted.
/// `send`/`recv` delegate straight to whichever half of the shared
/// `InprocChannel` belongs to this side; `pump` must be called (by either
/// side, or by the socket core's tick) to actually move queued bytes
/// across.
pub struct Sinproc {
    state: SessionState,
    channel: Arc<Mutex<InprocChannel>>,
    is_a: bool,
}

impl Sinproc {
    #[must_use]
    pub fn for_connector(channel: Arc<Mutex<InprocChannel>>) -> Self {
        Self {
            state: SessionState::Active,
            channel,
            is_a: true,
        }
    }

    #[must_use]
    pub fn for_acceptor(channel: Arc<Mutex<InprocChannel>>) -> Self {
        Self {
            state: SessionState::Active,
            channel,
            is_a: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn send(&mut self, msg: Message) -> crate::error::Result<()> {
        if self.state != SessionState::Active {
            return Err(crate::error::Error::ConnectionReset("inproc peer gone".into()));
        }
        let mut channel = self.channel.lock();
        let pipe = if self.is_a { &mut channel.a } else { &mut channel.b };
        match pipe.send(msg) {
            crate::pipe::PipeResult::Ok => Ok(()),
            crate::pipe::PipeResult::Again => Err(crate::error::Error::Again),
        }
    }

    pub fn recv(&mut self) -> crate::error::Result<Message> {
        let mut channel = self.channel.lock();
        let pipe = if self.is_a { &mut channel.a } else { &mut channel.b };
        match pipe.recv() {
            crate::pipe::PipeResult2::Ok(msg) => Ok(msg),
            crate::pipe::PipeResult2::Again => Err(crate::error::Error::Again),
        }
    }

    /// Move any queued messages across the shared channel. Idempotent;
    /// safe to call from either side.
    pub fn pump(&mut self) -> usize {
        self.channel.lock().pump()
    }

    /// Tear down this side's half of the pairing (`STOPPING_PEER` →
    /// `STOPPING` in the original FSM); the peer observes this the next
    /// time it tries to send and gets `ConnectionReset`.
    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_without_bind_fails() {
        assert!(matches!(connect("inproc://nope-yet", 8), Err(InprocError::NoListener(_))));
    }

    #[test]
    fn double_bind_is_rejected() {
        let addr = "inproc://test-double-bind";
        let _first = bind(addr).unwrap();
        assert!(matches!(bind(addr), Err(InprocError::AlreadyBound(_))));
        unbind(addr);
    }

    #[test]
    fn connect_then_accept_then_pump_delivers_both_ways() {
        let addr = "inproc://test-pair";
        let binproc = bind(addr).unwrap();

        let client_channel = connect(addr, 8).unwrap();
        let mut client = Sinproc::for_connector(client_channel);

        let server_channel = binproc.lock().accept().unwrap();
        let mut server = Sinproc::for_acceptor(server_channel);

        client.send(Message::from_body("ping")).unwrap();
        client.pump();
        assert_eq!(server.recv().unwrap().body(), b"ping");

        server.send(Message::from_body("pong")).unwrap();
        server.pump();
        assert_eq!(client.recv().unwrap().body(), b"pong");

        unbind(addr);
    }

    #[test]
    fn accept_with_nothing_pending_returns_none() {
        let addr = "inproc://test-empty-accept";
        let binproc = bind(addr).unwrap();
        assert!(binproc.lock().accept().is_none());
        unbind(addr);
    }
}
