//! sproto-core: the protocol-agnostic kernel shared by every transport and
//! protocol FSM — context locking, the worker pool, pipes, messages,
//! endpoint addressing, and socket options/statistics.
//!
//! - FSM runtime & context locking (`context`)
//! - Worker pool: reactor + timer wheel (`worker`, `timer`)
//! - Pipe abstraction (`pipe`)
//! - Message model (`message`, `message_builder`)
//! - Endpoint address parsing (`endpoint`, `hostname`)
//! - In-process transport registry (`inproc`)
//! - Socket options and statistics (`options`, `stats`)
//! - SUB topic-prefix matching (`subscription`)
//! - Wire byte-order helpers (`wire`)
//! - Slab-arena allocation (`alloc`)
//! - Reconnection backoff, cancellation-safe write guard, event FD (`reconnect`, `poison`, `eventfd`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod alloc;
pub mod buffer;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod eventfd;
pub mod hostname;
pub mod inproc;
pub mod message;
pub mod message_builder;
pub mod options;
pub mod pipe;
pub mod poison;
pub mod reconnect;
pub mod stats;
pub mod subscription;
pub mod timer;
pub mod wire;
pub mod worker;

/// A small prelude for downstream crates.
pub mod prelude {
    pub use crate::alloc::{IoArena, IoBytes, SlabMut};
    pub use crate::context::{Context, Event, FsmId, FsmHandler, TimerId};
    pub use crate::endpoint::{Endpoint, Host, StreamAddr};
    pub use crate::error::{Error, Result};
    pub use crate::eventfd::{EventFd, WaitOutcome};
    pub use crate::message::Message;
    pub use crate::message_builder::MessageBuilder;
    pub use crate::options::SocketOptions;
    pub use crate::pipe::{Pipe, PipeResult, Priority};
    pub use crate::stats::Statistics;
    pub use crate::worker::{Worker, WorkerHandle, WorkerPool};
}
