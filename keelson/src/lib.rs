//! # Keelson
//!
//! A reusable asynchronous TCP networking framework built on `compio`
//! (`io_uring` on Linux, IOCP/kqueue elsewhere). Keelson owns the lifecycle of
//! a single TCP connection — connect, framed or stream-oriented reception,
//! send-queue serialization with optional rate limiting, heartbeat injection,
//! idle-read timeouts, and orderly shutdown — behind a small façade surface
//! you build servers and clients on top of.
//!
//! ## Architecture
//!
//! Keelson is structured as a session kernel plus two thin façades:
//!
//! - **`keelson-core`**: runtime-agnostic kernel — the reactor thread pool,
//!   the linear-cursor byte buffer, timers, the rate limiter, the session
//!   registry, and structured error/config types.
//! - **`keelson`** (this crate): the per-connection `Session` state machine
//!   and the `Server`/`Client` façades built on it.
//!
//! ## Modes (opt-in via features)
//!
//! Exactly one of the two receive disciplines is compiled in:
//!
//! - **`framed-mode`** (default) — fixed-length header probe, variable-length
//!   body probe, one `on_message(header, body)` callback per frame.
//! - **`stream-mode`** — arbitrary byte chunks handed to `on_recv` as they
//!   arrive, no framing imposed.
//!
//! ```toml
//! [dependencies]
//! keelson = { version = "0.1", default-features = false, features = ["stream-mode"] }
//! ```
//!
//! ## Quick start
//!
//! ### Framed echo server
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keelson::{Server, Session, SessionHandler};
//! use keelson_core::error::SessionError;
//!
//! struct Echo;
//!
//! impl SessionHandler for Echo {
//!     fn header_length(&self) -> usize { 4 }
//!
//!     fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64 {
//!         i32::from_be_bytes(header.try_into().unwrap()) as i64
//!     }
//!
//!     fn on_message(&self, session: &Arc<Session<Self>>, header: &[u8], body: &[u8]) {
//!         let mut framed = header.to_vec();
//!         framed.extend_from_slice(body);
//!         session.send(framed);
//!     }
//!
//!     fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {}
//! }
//!
//! # fn main() -> std::io::Result<()> {
//! let server = Server::new(18080, 4, Echo);
//! server.start()?;
//! # server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Performance
//!
//! - **Zero-copy sends**: outbound messages are `bytes::Bytes`, cheaply
//!   sliced when the rate limiter splits a write head.
//! - **`io_uring`**: native Linux async I/O via `compio`.
//! - **Reactor affinity**: each session's I/O and timers run on exactly one
//!   reactor thread, so only the send queue needs a lock.
//!
//! ## Safety
//!
//! `unsafe` is confined to `keelson-core::tcp` (raw-fd socket tuning and the
//! cross-reactor handoff a server's accept loop performs); the session state
//! machine, façades, and timers are 100% safe Rust.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

#[cfg(all(feature = "stream-mode", feature = "framed-mode"))]
compile_error!("keelson: the `stream-mode` and `framed-mode` features are mutually exclusive");
#[cfg(not(any(feature = "stream-mode", feature = "framed-mode")))]
compile_error!("keelson: exactly one of the `stream-mode` or `framed-mode` features must be enabled");

pub use bytes::Bytes;
pub use keelson_core::endpoint::Endpoint;
pub use keelson_core::error::SessionError;
pub use keelson_core::options::{ReactorPoolOptions, SessionOptions};
pub use keelson_core::reconnect::ReconnectState;

mod acceptor;
pub mod client;
pub mod handler;
pub mod server;
pub mod session;

pub use client::Client;
#[cfg(feature = "stream-mode")]
pub use handler::RecvAction;
pub use handler::SessionHandler;
pub use server::Server;
pub use session::{Session, SessionStatus};

/// Development helpers (benches/tests): opt-in `tracing` subscriber init.
pub mod dev_tracing;
