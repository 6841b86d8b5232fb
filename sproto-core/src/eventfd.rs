//! Event FD: a kernel-backed signalable handle.
//!
//! Backs the socket core's send-ready/recv-ready readiness FDs and
//! the worker pool's cross-thread task wakeup. On platforms with a real
//! `eventfd` this would wrap it directly; here it is modeled portably on a
//! bounded `flume` channel of capacity 1, which gives the same
//! level-triggered "signalled until drained" semantics without `libc`.
//!
//! `wait` polls in bounded slices so a concurrent `close` is observed
//! promptly rather than blocking indefinitely on a single long recv.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_SLICE: Duration = Duration::from_millis(100);

/// Outcome of a bounded wait on an [`EventFd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ok,
    TimedOut,
    Closed,
}

/// A signalable handle: `signal` sets it, `unsignal` drains it, `wait`
/// blocks (in bounded slices) until signalled, timed out, or closed.
pub struct EventFd {
    tx: flume::Sender<()>,
    rx: flume::Receiver<()>,
    closed: Arc<AtomicBool>,
}

impl Default for EventFd {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFd {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self {
            tx,
            rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal the handle. Idempotent while already signalled: a full
    /// channel (capacity 1) means the signal is already pending, so the
    /// redundant `try_send` failure is silently ignored.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }

    /// Drain any pending signal. No-op if not signalled.
    pub fn unsignal(&self) {
        let _ = self.rx.try_recv();
    }

    #[must_use]
    pub fn is_signalled(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Mark this event FD closed, waking any `wait` caller with
    /// [`WaitOutcome::Closed`] within one poll slice.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Block until signalled, `timeout` elapses, or `close` is called,
    /// polling in slices no larger than 100ms so a concurrent close is
    /// observed promptly rather than after the full timeout.
    ///
    /// The signal is left in place (peeked, not consumed) — callers that
    /// need edge-triggered behavior should follow a successful wait with
    /// `unsignal`.
    #[must_use]
    pub fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|d| Instant::now() + d);

        loop {
            if self.is_closed() {
                return WaitOutcome::Closed;
            }
            if self.is_signalled() {
                return WaitOutcome::Ok;
            }

            let slice = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return WaitOutcome::TimedOut;
                    }
                    remaining.min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };

            match self.rx.recv_timeout(slice) {
                Ok(()) => {
                    // Put the signal back; wait peeks rather than consumes.
                    let _ = self.tx.try_send(());
                    return WaitOutcome::Ok;
                }
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => return WaitOutcome::Closed,
            }
        }
    }

    /// A second handle that can independently signal or close this event FD.
    #[must_use]
    pub fn sender(&self) -> EventFdSignaller {
        EventFdSignaller {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

/// A cloneable signalling handle, for waking or closing an [`EventFd`] from
/// another thread without granting access to `wait`/`unsignal`.
#[derive(Clone)]
pub struct EventFdSignaller {
    tx: flume::Sender<()>,
    closed: Arc<AtomicBool>,
}

impl EventFdSignaller {
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn signal_then_wait_returns_immediately() {
        let fd = EventFd::new();
        fd.signal();
        assert_eq!(fd.wait(Some(Duration::from_millis(50))), WaitOutcome::Ok);
    }

    #[test]
    fn wait_times_out_when_not_signalled() {
        let fd = EventFd::new();
        assert_eq!(
            fd.wait(Some(Duration::from_millis(150))),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn unsignal_drains_pending_signal() {
        let fd = EventFd::new();
        fd.signal();
        fd.unsignal();
        assert!(!fd.is_signalled());
    }

    #[test]
    fn concurrent_close_wakes_waiter() {
        let fd = Arc::new(EventFd::new());
        let closer = fd.sender();

        let waiter = {
            let fd = fd.clone();
            thread::spawn(move || fd.wait(Some(Duration::from_secs(30))))
        };

        thread::sleep(Duration::from_millis(20));
        closer.close();

        assert_eq!(waiter.join().unwrap(), WaitOutcome::Closed);
    }

    #[test]
    fn sender_handle_signals_original() {
        let fd = EventFd::new();
        let signaller = fd.sender();
        signaller.signal();
        assert!(fd.is_signalled());
    }
}
