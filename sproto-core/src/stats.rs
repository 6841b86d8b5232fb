//! Socket statistics (`get_statistic`): atomics-based counters and
//! gauges, safe to read from any thread without acquiring the socket's
//! context lock.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// One named statistic's storage. Counters only increase; gauges move in
/// either direction (e.g. `CURRENT_CONNECTIONS`).
#[derive(Debug, Default)]
pub struct Statistics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    current_connections: AtomicI64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    accept_failures: AtomicU64,
    dropped_messages: AtomicU64,
    current_endpoints: AtomicI64,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accept_failure(&self) {
        self.accept_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.current_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.current_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn endpoint_added(&self) {
        self.current_endpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_removed(&self) {
        self.current_endpoints.fetch_sub(1, Ordering::Relaxed);
    }

    /// Snapshot a single named statistic by its SP statistic-id name,
    /// returning `None` for an unrecognized name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        Some(match name {
            "MESSAGES_SENT" => self.messages_sent.load(Ordering::Relaxed) as i64,
            "MESSAGES_RECEIVED" => self.messages_received.load(Ordering::Relaxed) as i64,
            "BYTES_SENT" => self.bytes_sent.load(Ordering::Relaxed) as i64,
            "BYTES_RECEIVED" => self.bytes_received.load(Ordering::Relaxed) as i64,
            "CURRENT_CONNECTIONS" => self.current_connections.load(Ordering::Relaxed),
            "CONNECT_ATTEMPTS" => self.connect_attempts.load(Ordering::Relaxed) as i64,
            "CONNECT_FAILURES" => self.connect_failures.load(Ordering::Relaxed) as i64,
            "ACCEPT_FAILURES" => self.accept_failures.load(Ordering::Relaxed) as i64,
            "DROPPED_MESSAGES" => self.dropped_messages.load(Ordering::Relaxed) as i64,
            "CURRENT_EP" => self.current_endpoints.load(Ordering::Relaxed),
            _ => return None,
        })
    }

    /// The full list of statistic names this socket reports.
    #[must_use]
    pub fn names() -> &'static [&'static str] {
        &[
            "MESSAGES_SENT",
            "MESSAGES_RECEIVED",
            "BYTES_SENT",
            "BYTES_RECEIVED",
            "CURRENT_CONNECTIONS",
            "CONNECT_ATTEMPTS",
            "CONNECT_FAILURES",
            "ACCEPT_FAILURES",
            "DROPPED_MESSAGES",
            "CURRENT_EP",
        ]
    }
}
