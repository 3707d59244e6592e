//! Keelson Core
//!
//! Runtime-agnostic kernel for the keelson TCP session framework:
//! - Linear-cursor byte buffer (`buffer`)
//! - TCP endpoint addressing (`endpoint`)
//! - Session and reactor-pool configuration (`options`)
//! - Cancellable/rearmable timers (`timer`)
//! - Outbound byte-rate limiting (`rate_limit`)
//! - Exponential-backoff reconnection state (`reconnect`)
//! - The reactor thread pool (`reactor`)
//! - The session registry (`registry`)
//! - Socket tuning (`tcp`)
//! - Error types (`error`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod options;
pub mod rate_limit;
pub mod reactor;
pub mod reconnect;
pub mod registry;
pub mod tcp;
pub mod timer;

/// A small prelude to make downstream crates ergonomic. Kept minimal to
/// avoid API lock-in.
pub mod prelude {
    pub use crate::buffer::ByteBuffer;
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{Result, SessionError};
    pub use crate::options::{ReactorPoolOptions, SessionOptions};
    pub use crate::rate_limit::RateLimiter;
    pub use crate::reactor::{Reactor, ReactorPool};
    pub use crate::reconnect::ReconnectState;
    pub use crate::registry::{SessionIdAllocator, SessionRegistry};
    pub use crate::timer::Timer;
}
