//! Public blocking socket API: `Socket` for the cooked `SP` domain,
//! `RawSocket` for `SP_RAW` (devices only), and the `device(a, b)` forwarder.
//!
//! A thin struct wrapping a shared, lockable core plus whatever background
//! machinery its domain needs (here: endpoint threads from
//! [`crate::transport`], and for `Socket` a timer thread driving REQ's
//! resend and SURVEYOR's deadline).

use crate::transport::{self, Shared};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::options::SocketOptions;
use sproto_stream::dispatch::{AnyProtocol, ProtocolKind, TimerAction};
use sproto_stream::proxy;
use sproto_stream::raw::{RawEndpointAdapter, RawProtocol};
use sproto_stream::socket_trait::Protocol;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A cooked-domain SP socket: PAIR/PUB/SUB/REQ/REP/PUSH/PULL/SURVEYOR/
/// RESPONDENT/BUS, selected at construction by [`ProtocolKind`].
pub struct Socket {
    shared: Arc<Shared<AnyProtocol>>,
    timer: Arc<TimerState>,
    timer_shutdown: Arc<AtomicBool>,
    timer_join: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// The deadline REQ/SURVEYOR's last state transition armed, plus the
/// doorbell the background timer thread waits on. Kept separate from
/// [`transport::Shared`]'s own doorbell since it's meaningless for
/// protocols with no timer (every `Socket` still runs this thread, but it
/// sits parked on `wake_rx` forever if `take_timer_action` never arms
/// anything).
struct TimerState {
    deadline: parking_lot::Mutex<Option<Instant>>,
    wake_tx: flume::Sender<()>,
    wake_rx: flume::Receiver<()>,
}

impl TimerState {
    fn new() -> Self {
        let (wake_tx, wake_rx) = flume::bounded(0);
        Self { deadline: parking_lot::Mutex::new(None), wake_tx, wake_rx }
    }

    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }
}

impl Socket {
    /// `socket(SP, protocol)`. `options.resend_ivl`/`survey_deadline`
    /// seed REQ/SURVEYOR's timers; every other protocol ignores them.
    #[must_use]
    pub fn new(kind: ProtocolKind, options: SocketOptions) -> Self {
        let resend_ivl = options.resend_ivl;
        let survey_deadline = options.survey_deadline;
        let protocol = AnyProtocol::new(kind, resend_ivl, survey_deadline, options.send_hwm, options.recv_hwm);
        let shared = Shared::new(protocol, options);
        let timer = Arc::new(TimerState::new());
        let timer_shutdown = Arc::new(AtomicBool::new(false));

        let timer_join = {
            let shared = Arc::clone(&shared);
            let timer = Arc::clone(&timer);
            let shutdown = Arc::clone(&timer_shutdown);
            thread::Builder::new()
                .name("sp-timer".to_string())
                .spawn(move || run_timer(shared, timer, shutdown))
                .expect("failed to spawn timer thread")
        };

        Self { shared, timer, timer_shutdown, timer_join: parking_lot::Mutex::new(Some(timer_join)) }
    }

    pub fn bind(&self, addr: &str) -> Result<()> {
        transport::bind(&self.shared, addr)
    }

    pub fn connect(&self, addr: &str) -> Result<()> {
        transport::connect(&self.shared, addr)
    }

    /// Subscribe to a topic prefix (SUB only). `ENOTSUP` on every other
    /// protocol.
    pub fn subscribe(&self, prefix: impl Into<bytes::Bytes>) -> Result<()> {
        let prefix = prefix.into();
        self.shared.core.lock().protocol.subscribe(prefix)?;
        self.shared.notify_all();
        Ok(())
    }

    pub fn unsubscribe(&self, prefix: impl Into<bytes::Bytes>) -> Result<()> {
        let prefix = prefix.into();
        self.shared.core.lock().protocol.unsubscribe(prefix)?;
        Ok(())
    }

    /// Blocking send, honoring `options.send_timeout`.
    pub fn send(&self, msg: Message) -> Result<()> {
        let timeout = self.shared.core.lock().options.send_timeout;
        let result = self.shared.blocking_op(timeout, |core| core.protocol.send(msg.clone()));
        self.poll_timer_action();
        result
    }

    /// Blocking recv, honoring `options.recv_timeout`.
    pub fn recv(&self) -> Result<Message> {
        let timeout = self.shared.core.lock().options.recv_timeout;
        let result = self.shared.blocking_op(timeout, |core| core.protocol.recv());
        self.poll_timer_action();
        result
    }

    #[must_use]
    pub fn get_statistic(&self, name: &str) -> Option<i64> {
        self.shared.stats.get(name)
    }

    /// `close()`: stop every endpoint thread and the timer thread, after
    /// waiting up to `LINGER` for queued sends to drain. Takes `&self`
    /// rather than consuming the socket so a thread holding an `Arc<Socket>`
    /// can shut it down out from under another thread blocked in
    /// [`Self::recv`]/[`Self::send`] — `transport::close` marks the core
    /// closed and rings the doorbell, which is what actually unparks them.
    pub fn close(&self) {
        transport::close(&self.shared);
        self.stop_timer();
    }

    fn stop_timer(&self) {
        self.timer_shutdown.store(true, Ordering::SeqCst);
        self.timer.wake();
        if let Some(join) = self.timer_join.lock().take() {
            let _ = join.join();
        }
    }

    /// After any operation that might have armed/cancelled REQ/SURVEYOR's
    /// timer (send, recv), pick up the new state and wake the timer
    /// thread so it recomputes its wait.
    fn poll_timer_action(&self) {
        let action = self.shared.core.lock().protocol.take_timer_action();
        if let Some(action) = action {
            self.apply_timer_action(action);
        }
    }

    fn apply_timer_action(&self, action: TimerAction) {
        let mut deadline = self.timer.deadline.lock();
        *deadline = match action {
            TimerAction::Arm(d) => Some(Instant::now() + d),
            TimerAction::Cancel => None,
        };
        drop(deadline);
        self.timer.wake();
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background thread driving REQ's resend / SURVEYOR's deadline: wait
/// until `deadline` (if any) or the doorbell rings, then if the deadline
/// has actually passed call `on_timer_fired` and pick up whatever new
/// action that produced (REQ re-arms itself once `on_timer_stopped` would
/// run as part of re-sending; SURVEYOR's deadline is one-shot).
fn run_timer(shared: Arc<Shared<AnyProtocol>>, timer: Arc<TimerState>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        let wait = {
            let deadline = *timer.deadline.lock();
            match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => Duration::from_millis(250),
            }
        };
        let _ = timer.wake_rx.recv_timeout(wait);
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let fired = {
            let mut deadline = timer.deadline.lock();
            match *deadline {
                Some(d) if Instant::now() >= d => {
                    *deadline = None;
                    true
                }
                _ => false,
            }
        };
        if fired {
            let mut core = shared.core.lock();
            core.protocol.on_timer_fired();
            core.protocol.on_timer_stopped();
            let next = core.protocol.take_timer_action();
            drop(core);
            if let Some(next) = next {
                let mut deadline = timer.deadline.lock();
                *deadline = match next {
                    TimerAction::Arm(d) => Some(Instant::now() + d),
                    TimerAction::Cancel => None,
                };
            }
            // A resend re-queues an outbound message; wake anyone blocked
            // in `send`/`recv` so they notice the new readiness.
            shared.notify_all();
        }
    }
}

/// A raw-domain SP socket: no protocol FSM, just a fair-queued pipe set.
/// The only supported use is as one half of [`device`].
pub struct RawSocket {
    shared: Arc<Shared<RawProtocol>>,
}

impl RawSocket {
    /// `socket(SP_RAW, protocol)`. `protocol_id`/`accepted_peers` govern
    /// the handshake this raw socket presents; `header_len` must match the
    /// bridged protocol family's stamp size (4 bytes for REQ/REP/
    /// SURVEYOR/RESPONDENT, 0 otherwise).
    #[must_use]
    pub fn new(protocol_id: u16, accepted_peers: &'static [u16], header_len: usize, options: SocketOptions) -> Self {
        let protocol = RawProtocol::new(protocol_id, accepted_peers, header_len);
        Self { shared: Shared::new(protocol, options) }
    }

    pub fn bind(&self, addr: &str) -> Result<()> {
        transport::bind(&self.shared, addr)
    }

    pub fn connect(&self, addr: &str) -> Result<()> {
        transport::connect(&self.shared, addr)
    }

    pub fn close(&self) {
        transport::close(&self.shared);
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/// One tick of `device(a, b)`'s forwarding loop, run from a dedicated
/// `RawEndpointAdapter` around each side's locked protocol. `device` itself
/// loops this until either side reports closed.
struct SocketEndpoint<'a> {
    adapter: RawEndpointAdapter<'a>,
}

impl proxy::RawEndpoint for SocketEndpoint<'_> {
    fn try_recv(&mut self) -> Result<Message> {
        self.adapter.try_recv()
    }

    fn try_send(&mut self, msg: Message) -> Result<()> {
        self.adapter.try_send(msg)
    }

    fn is_closed(&self) -> bool {
        self.adapter.is_closed()
    }
}

/// `device(a, b)`: forward messages between two raw sockets, decrementing
/// TTL each hop, until either is closed. Blocks the calling thread for the
/// device's lifetime — callers run it on its own thread, same as the
/// reference implementation's `nn_device`.
pub fn device(a: &RawSocket, b: &RawSocket) -> Result<()> {
    loop {
        let mut core_a = a.shared.core.lock();
        let mut core_b = b.shared.core.lock();
        let mut ep_a = SocketEndpoint { adapter: RawEndpointAdapter::new(&mut core_a.protocol) };
        let mut ep_b = SocketEndpoint { adapter: RawEndpointAdapter::new(&mut core_b.protocol) };
        if core_a.closed || core_b.closed {
            return Err(Error::BadFd);
        }
        let result = proxy::pump(&mut ep_a, &mut ep_b);
        drop(core_a);
        drop(core_b);
        result?;
        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sproto_stream::protocol_ids;

    #[test]
    fn pair_socket_send_recv_over_inproc() {
        let a = Socket::new(ProtocolKind::Pair, SocketOptions::new());
        let b = Socket::new(ProtocolKind::Pair, SocketOptions::new());
        a.bind("inproc://socket-test-pair").unwrap();
        b.connect("inproc://socket-test-pair").unwrap();

        thread::sleep(Duration::from_millis(50));
        b.send(Message::from_body("hi")).unwrap();

        let got = a.recv();
        assert!(got.is_ok() || matches!(got, Err(Error::Again)));
    }

    #[test]
    fn recv_timeout_returns_timed_out() {
        let a = Socket::new(ProtocolKind::Pull, SocketOptions::new().with_recv_timeout(Duration::from_millis(20)));
        assert!(matches!(a.recv(), Err(Error::TimedOut)));
    }

    #[test]
    fn device_rejects_when_already_closed() {
        let a = RawSocket::new(protocol_ids::REQ, &[protocol_ids::REP], 4, SocketOptions::new());
        let b = RawSocket::new(protocol_ids::REP, &[protocol_ids::REQ], 4, SocketOptions::new());
        transport::close(&a.shared);
        assert!(matches!(device(&a, &b), Err(Error::BadFd)));
    }
}
