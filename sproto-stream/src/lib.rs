//! sproto-stream: the stream-transport framing session and the protocol
//! FSMs that run on top of it.
//!
//! - Opening handshake and post-handshake length-prefixed framing
//!   (`handshake`, `codec`, `session`)
//! - Shared pipe bookkeeping every protocol composes (`base`)
//! - The protocol vtable every FSM implements (`socket_trait`)
//! - Wire protocol identifiers (`protocol_ids`)
//! - Protocol FSMs: PAIR, PUB/SUB, REQ/REP, PUSH/PULL, SURVEYOR/RESPONDENT,
//!   BUS
//! - Devices: raw TTL-decrementing forwarders (`proxy`)

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::while_let_loop)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::never_loop)]

pub mod base;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod handshake;
pub mod protocol_ids;
pub mod raw;
pub mod session;
pub mod socket_trait;
pub mod ws;

pub mod bus;
pub mod pair;
pub mod proxy;
pub mod pub_socket;
pub mod pull;
pub mod push;
pub mod rep;
pub mod req;
pub mod respondent;
pub mod sub;
pub mod surveyor;

/// Fallback pipe buffer size, in bytes, for protocol constructors exercised
/// directly (tests, `Default` impls) rather than through `Socket::new`,
/// which always threads `SocketOptions::recv_hwm`/`send_hwm` through instead.
pub const DEFAULT_HWM: usize = 128 * 1024;

pub use base::{PipeId, RawBase};
pub use config::BufferConfig;
pub use dispatch::{AnyProtocol, ProtocolKind, TimerAction};
pub use raw::RawProtocol;
pub use session::{SessionEvent, StreamSession};
pub use socket_trait::{Protocol, Readiness, StopOutcome};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::bus::BusProtocol;
    pub use super::dispatch::{AnyProtocol, ProtocolKind, TimerAction};
    pub use super::pair::PairProtocol;
    pub use super::protocol_ids;
    pub use super::pub_socket::PubProtocol;
    pub use super::pull::PullProtocol;
    pub use super::push::PushProtocol;
    pub use super::rep::RepProtocol;
    pub use super::req::ReqProtocol;
    pub use super::respondent::RespondentProtocol;
    pub use super::sub::SubProtocol;
    pub use super::surveyor::SurveyorProtocol;
    pub use super::{Protocol, Readiness, StopOutcome};
    pub use bytes::Bytes;
}
