//! SP error taxonomy.
//!
//! Mirrors the errno-shaped taxonomy of the reference implementation: argument,
//! resource, state, timing, and transport errors. A single `thiserror` enum at
//! each crate boundary, with an `errno()`-shaped accessor so callers that still
//! think in POSIX error codes (the `sproto` facade's blocking `send`/`recv`) can
//! answer "which of EINVAL/EAGAIN/ETIMEDOUT/etc. was this".

use std::io;
use thiserror::Error;

/// Main error type for `sproto-core` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // --- Argument errors ---
    /// Bad address syntax, bad option value, or bad message buffer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Unknown socket option.
    #[error("unknown option: {0}")]
    NoProtoOpt(String),
    /// Operation not supported by this protocol (e.g. send on PULL).
    #[error("operation not supported by this protocol: {0}")]
    NotSupported(String),
    /// Message exceeds `RCVMAXSIZE`.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    // --- Resource errors ---
    /// Allocation failure.
    #[error("out of memory")]
    NoMemory,
    /// File descriptor exhaustion.
    #[error("file descriptor limit reached")]
    FileTableFull,
    /// Duplicate bind to the same address.
    #[error("address already in use: {0}")]
    AddressInUse(String),
    /// Bind address unavailable on this host.
    #[error("address not available: {0}")]
    AddressNotAvailable(String),
    /// Unresolvable interface or host name.
    #[error("no such device: {0}")]
    NoDevice(String),

    // --- State errors ---
    /// Socket closed or in a terminal state.
    #[error("bad file descriptor")]
    BadFd,
    /// Library is shutting down (`term()` was called).
    #[error("library is terminating")]
    Term,
    /// Operation not valid in the protocol's current FSM state.
    #[error("operation not valid in current state: {0}")]
    Fsm(&'static str),

    // --- Timing errors ---
    /// Blocking call exceeded its configured timeout.
    #[error("operation timed out")]
    TimedOut,
    /// Non-blocking call would have blocked.
    #[error("operation would block")]
    Again,
    /// Call interrupted before completion.
    #[error("interrupted")]
    Interrupted,

    // --- Transport errors ---
    /// Peer reset the connection.
    #[error("connection reset by peer: {0}")]
    ConnectionReset(String),
    /// Peer refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// Connection aborted locally.
    #[error("connection aborted")]
    ConnectionAborted,
    /// Handshake did not complete within the configured timeout.
    #[error("handshake timeout after {0:?}")]
    HandshakeTimeout(std::time::Duration),
    /// Peer sent an unrecognized opening handshake.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
    /// Malformed stream frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    /// Network unreachable at the OS level.
    #[error("network unreachable")]
    NetworkUnreachable,
    /// Host unreachable at the OS level.
    #[error("host unreachable")]
    HostUnreachable,
    /// Socket not connected.
    #[error("not connected")]
    NotConnected,
    /// Protocol violation on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for `sproto-core` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct an [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Construct an [`Error::Protocol`].
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Construct an [`Error::InvalidFrame`].
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Whether the connection backing this error can be retried locally
    /// (endpoint moves to reconnecting) rather than surfaced to the caller.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::ConnectionReset(_)
            | Self::ConnectionRefused(_)
            | Self::ConnectionAborted
            | Self::HandshakeTimeout(_)
            | Self::InvalidHandshake(_)
            | Self::InvalidFrame(_)
            | Self::Protocol(_)
            | Self::NetworkUnreachable
            | Self::HostUnreachable
            | Self::NotConnected => true,
            _ => false,
        }
    }

    /// Whether this error represents the peer going away (as opposed to a
    /// purely local failure).
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionReset(_)
                | Self::ConnectionRefused(_)
                | Self::ConnectionAborted
                | Self::HandshakeTimeout(_)
                | Self::NotConnected
        )
    }

    /// The POSIX-flavored errno name this error corresponds to, for the
    /// facade crate's blocking API surface.
    #[must_use]
    pub const fn errno(&self) -> &'static str {
        match self {
            Self::Io(_) => "EIO",
            Self::InvalidArgument(_) => "EINVAL",
            Self::NoProtoOpt(_) => "ENOPROTOOPT",
            Self::NotSupported(_) => "ENOTSUP",
            Self::MessageTooLarge { .. } => "EMSGSIZE",
            Self::NoMemory => "ENOMEM",
            Self::FileTableFull => "EMFILE",
            Self::AddressInUse(_) => "EADDRINUSE",
            Self::AddressNotAvailable(_) => "EADDRNOTAVAIL",
            Self::NoDevice(_) => "ENODEV",
            Self::BadFd => "EBADF",
            Self::Term => "ETERM",
            Self::Fsm(_) => "EFSM",
            Self::TimedOut => "ETIMEDOUT",
            Self::Again => "EAGAIN",
            Self::Interrupted => "EINTR",
            Self::ConnectionReset(_) => "ECONNRESET",
            Self::ConnectionRefused(_) => "ECONNREFUSED",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::HandshakeTimeout(_) | Self::InvalidHandshake(_) => "EPROTO",
            Self::InvalidFrame(_) => "EPROTO",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::HostUnreachable => "EHOSTUNREACH",
            Self::NotConnected => "ENOTCONN",
            Self::Protocol(_) => "EPROTO",
        }
    }
}
