//! Socket configuration options.
//!
//! A builder struct in the usual `with_*`/`Default` style, covering the
//! option set this protocol family actually exposes rather than
//! ZMTP-specific knobs (ROUTER/XPUB/XSUB behaviors, conflation).

use std::time::Duration;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use sproto_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_send_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Receive timeout (`RCVTIMEO`).
    ///
    /// - `None`: block indefinitely (default)
    /// - `Some(Duration::ZERO)`: non-blocking, return `EAGAIN` immediately
    /// - `Some(d)`: wait up to `d` before returning `EAGAIN`
    pub recv_timeout: Option<Duration>,

    /// Send timeout (`SNDTIMEO`). Same semantics as `recv_timeout`.
    pub send_timeout: Option<Duration>,

    /// Handshake timeout. Maximum time to complete the stream-framing
    /// handshake after a TCP/WS connection completes.
    /// Default: 30 seconds; `Duration::ZERO` disables the timeout.
    pub handshake_timeout: Duration,

    /// Linger (`LINGER`): time to wait for pending outbound messages to
    /// drain before a `close()` tears the socket down.
    /// - `None` or `Some(Duration::ZERO)`: close immediately, discard queued messages
    /// - `Some(d)`: wait up to `d`
    pub linger: Option<Duration>,

    /// Initial reconnection delay (`RECONNECT_IVL`). Default: 100ms.
    pub reconnect_ivl: Duration,

    /// Maximum reconnection delay (`RECONNECT_IVL_MAX`) for exponential
    /// backoff. `Duration::ZERO` (default) disables backoff — `reconnect_ivl`
    /// is used for every attempt.
    pub reconnect_ivl_max: Duration,

    /// Connection timeout. Maximum time to wait for the underlying
    /// TCP/WS connect to complete. `Duration::ZERO` uses the OS default.
    pub connect_timeout: Duration,

    /// Receive buffer, in bytes (`RCVBUF`): the most a pipe's inbound
    /// queue may hold (summed `Message::wire_len`) before the transport
    /// must stop decoding further frames. Default: 128 KiB.
    pub recv_hwm: usize,

    /// Send buffer, in bytes (`SNDBUF`): the most a pipe's outbound queue
    /// may hold before `send` starts returning `EAGAIN`. Default: 128 KiB.
    pub send_hwm: usize,

    /// Maximum receivable message size (`RCVMAXSIZE`), in bytes.
    /// `None` (default): no limit. Exceeding it reports `EMSGSIZE`.
    pub max_msg_size: Option<usize>,

    /// Send priority (`SNDPRIO`), 1 (highest) to 16 (lowest). Default: 8.
    /// Used by devices to weight which pipe to read from next.
    pub send_priority: u8,

    /// Receive priority (`RCVPRIO`), 1..16. Default: 8.
    pub recv_priority: u8,

    /// Restrict TCP/WS endpoints to IPv4 only (`IPV4ONLY`). Default: false.
    pub ipv4_only: bool,

    /// Time-to-live for messages forwarded through a device (`MAXTTL`).
    /// Default: 8 hops; 0 disables the TTL check.
    pub max_ttl: u8,

    /// Human-readable socket name (`SOCKET_NAME`), surfaced in statistics
    /// and log output. Default: unset.
    pub socket_name: Option<String>,

    /// Read buffer size (bytes): size of arena-allocated buffers for
    /// reading from the network.
    /// Default: 8192 (8KB).
    pub read_buffer_size: usize,

    /// Write buffer size (bytes): initial capacity of write buffers for
    /// encoding outbound frames.
    /// Default: 8192 (8KB).
    pub write_buffer_size: usize,

    /// REQ resend interval (`REQ_RESEND_IVL`): how long a REQ socket waits
    /// for a reply before re-sending the outstanding request.
    /// Default: 60 seconds.
    pub resend_ivl: Duration,

    /// SURVEYOR deadline (`SURVEYOR_DEADLINE`): how long a SURVEYOR socket
    /// collects responses before a `recv()` on the round times out.
    /// Default: 1 second.
    pub survey_deadline: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            handshake_timeout: Duration::from_secs(30),
            linger: Some(Duration::from_secs(30)),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            recv_hwm: 128 * 1024,
            send_hwm: 128 * 1024,
            max_msg_size: None,
            send_priority: 8,
            recv_priority: 8,
            ipv4_only: false,
            max_ttl: 8,
            socket_name: None,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            resend_ivl: Duration::from_secs(60),
            survey_deadline: Duration::from_secs(1),
        }
    }
}

impl SocketOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use sproto_core::options::SocketOptions;
    /// use std::time::Duration;
    ///
    /// let opts = SocketOptions::new().with_recv_timeout(Duration::ZERO);
    /// let opts = SocketOptions::new().with_recv_timeout(Duration::from_secs(5));
    /// ```
    #[must_use]
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    #[must_use]
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    #[must_use]
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the receive buffer size, in bytes.
    #[must_use]
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    /// Set the send buffer size, in bytes.
    #[must_use]
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    #[must_use]
    pub fn with_max_msg_size(mut self, size: Option<usize>) -> Self {
        self.max_msg_size = size;
        self
    }

    /// Set both send and receive priority, clamped to 1..16.
    #[must_use]
    pub fn with_priorities(mut self, send: u8, recv: u8) -> Self {
        self.send_priority = send.clamp(1, 16);
        self.recv_priority = recv.clamp(1, 16);
        self
    }

    #[must_use]
    pub fn with_ipv4_only(mut self, enabled: bool) -> Self {
        self.ipv4_only = enabled;
        self
    }

    #[must_use]
    pub fn with_max_ttl(mut self, ttl: u8) -> Self {
        self.max_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    /// Set read buffer size.
    ///
    /// # Examples
    ///
    /// ```
    /// use sproto_core::options::SocketOptions;
    ///
    /// let opts = SocketOptions::new().with_read_buffer_size(4096);
    /// let opts = SocketOptions::new().with_read_buffer_size(16384);
    /// ```
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_buffer_sizes(mut self, read_size: usize, write_size: usize) -> Self {
        self.read_buffer_size = read_size;
        self.write_buffer_size = write_size;
        self
    }

    #[must_use]
    pub fn with_resend_ivl(mut self, ivl: Duration) -> Self {
        self.resend_ivl = ivl;
        self
    }

    #[must_use]
    pub fn with_survey_deadline(mut self, deadline: Duration) -> Self {
        self.survey_deadline = deadline;
        self
    }

    #[must_use]
    pub fn is_recv_nonblocking(&self) -> bool {
        matches!(self.recv_timeout, Some(d) if d.is_zero())
    }

    #[must_use]
    pub fn is_send_nonblocking(&self) -> bool {
        matches!(self.send_timeout, Some(d) if d.is_zero())
    }

    /// Current reconnection interval for the given zero-based attempt
    /// number, applying exponential backoff when `reconnect_ivl_max` is set.
    #[must_use]
    pub fn next_reconnect_ivl(&self, attempt: u32) -> Duration {
        if self.reconnect_ivl_max.is_zero() {
            return self.reconnect_ivl;
        }
        let backoff = self
            .reconnect_ivl
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.reconnect_ivl_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert!(opts.recv_timeout.is_none());
        assert!(opts.send_timeout.is_none());
        assert_eq!(opts.handshake_timeout, Duration::from_secs(30));
        assert_eq!(opts.reconnect_ivl, Duration::from_millis(100));
        assert_eq!(opts.recv_hwm, 128 * 1024);
        assert_eq!(opts.send_hwm, 128 * 1024);
        assert_eq!(opts.max_ttl, 8);
        assert_eq!(opts.send_priority, 8);
    }

    #[test]
    fn test_protocol_timer_defaults_and_builders() {
        let opts = SocketOptions::default();
        assert_eq!(opts.resend_ivl, Duration::from_secs(60));
        assert_eq!(opts.survey_deadline, Duration::from_secs(1));

        let opts = SocketOptions::new()
            .with_resend_ivl(Duration::from_millis(250))
            .with_survey_deadline(Duration::from_millis(50));
        assert_eq!(opts.resend_ivl, Duration::from_millis(250));
        assert_eq!(opts.survey_deadline, Duration::from_millis(50));
    }

    #[test]
    fn test_builder_pattern() {
        let opts = SocketOptions::new()
            .with_recv_timeout(Duration::from_secs(5))
            .with_send_timeout(Duration::from_secs(10))
            .with_recv_hwm(2000);

        assert_eq!(opts.recv_timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.send_timeout, Some(Duration::from_secs(10)));
        assert_eq!(opts.recv_hwm, 2000);
    }

    #[test]
    fn test_nonblocking_checks() {
        let blocking = SocketOptions::new();
        assert!(!blocking.is_recv_nonblocking());
        assert!(!blocking.is_send_nonblocking());

        let nonblocking = SocketOptions::new()
            .with_recv_timeout(Duration::ZERO)
            .with_send_timeout(Duration::ZERO);
        assert!(nonblocking.is_recv_nonblocking());
        assert!(nonblocking.is_send_nonblocking());
    }

    #[test]
    fn test_exponential_backoff() {
        let opts = SocketOptions::new()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        assert_eq!(opts.next_reconnect_ivl(0), Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(1), Duration::from_millis(200));
        assert_eq!(opts.next_reconnect_ivl(2), Duration::from_millis(400));
        assert_eq!(opts.next_reconnect_ivl(10), Duration::from_secs(10));
    }

    #[test]
    fn test_no_exponential_backoff() {
        let opts = SocketOptions::new().with_reconnect_ivl(Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(0), Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(1), Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(10), Duration::from_millis(100));
    }

    #[test]
    fn test_priorities_clamped() {
        let opts = SocketOptions::new().with_priorities(0, 200);
        assert_eq!(opts.send_priority, 1);
        assert_eq!(opts.recv_priority, 16);
    }

    #[test]
    fn test_socket_name() {
        let opts = SocketOptions::new().with_socket_name("worker-01");
        assert_eq!(opts.socket_name.as_deref(), Some("worker-01"));
    }
}
