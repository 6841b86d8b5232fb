//! # sproto
//!
//! A nanomsg-style Scalability Protocols messaging runtime: ten wire-
//! compatible socket patterns (PAIR, PUB/SUB, REQ/REP, PUSH/PULL,
//! SURVEYOR/RESPONDENT, BUS) over TCP, WebSocket, UNIX domain sockets, and
//! an in-process transport, plus TTL-decrementing devices for bridging two
//! sockets.
//!
//! ## Architecture
//!
//! Layered bottom-up, kernel to wire:
//!
//! - [`sproto_core`]: allocation, wire framing primitives, socket options,
//!   statistics, the in-process transport registry — the pieces with no
//!   protocol-specific logic.
//! - [`sproto_stream`]: the stream-framing handshake/session and the ten
//!   protocol state machines, all sans-IO — no socket, no thread, just
//!   `fn(state, event) -> state`.
//! - `sproto` (this crate): [`socket::Socket`]/[`socket::RawSocket`], the
//!   blocking `bind`/`connect`/`send`/`recv` API, and the background
//!   threads in [`transport`] that pump bytes between the wire and a
//!   protocol's pipes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sproto::socket::Socket;
//! use sproto::{Message, ProtocolKind, SocketOptions};
//!
//! # fn example() -> sproto_core::error::Result<()> {
//! let rep = Socket::new(ProtocolKind::Rep, SocketOptions::new());
//! rep.bind("tcp://127.0.0.1:5555")?;
//!
//! let req = Socket::new(ProtocolKind::Req, SocketOptions::new());
//! req.connect("tcp://127.0.0.1:5555")?;
//!
//! req.send(Message::from_body("ping"))?;
//! let reply = rep.recv()?;
//! rep.send(reply)?;
//! let pong = req.recv()?;
//! # let _ = pong;
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety
//!
//! `unsafe` is confined to `sproto_core::alloc`'s slab arena; every layer
//! above it, including every protocol FSM and this crate's socket/transport
//! plumbing, is 100% safe Rust.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub use bytes::Bytes;
pub use sproto_core::error::{Error, Result};
pub use sproto_core::message::Message;
pub use sproto_core::options::SocketOptions;
pub use sproto_core::reconnect::{ReconnectError, ReconnectState};
pub use sproto_core::stats::Statistics;
pub use sproto_stream::dispatch::ProtocolKind;

pub mod socket;
pub mod symbols;
pub(crate) mod transport;

/// Development helper (benches/tests): best-effort `tracing` subscriber
/// init from `RUST_LOG`.
pub mod dev_tracing;
