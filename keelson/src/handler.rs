//! The user-overridable callback surface.
//!
//! `Server<H>` and `Client<H>` are both generic over one `SessionHandler`
//! implementation shared across every session they own, mirroring the
//! virtual-hook style of the system this crate is modeled on rather than a
//! closure-per-session design — a handler is typically stateless (or holds
//! its own shared state behind an `Arc` inside `H`), and one instance serves
//! every connection a façade manages.
//!
//! Exactly one of the `stream-mode` / `framed-mode` Cargo features must be
//! enabled; each selects a different shape for the data-arrival hook.

#[cfg(all(feature = "stream-mode", feature = "framed-mode"))]
compile_error!("keelson: the `stream-mode` and `framed-mode` features are mutually exclusive");
#[cfg(not(any(feature = "stream-mode", feature = "framed-mode")))]
compile_error!("keelson: exactly one of the `stream-mode` or `framed-mode` features must be enabled");

use std::sync::Arc;

use keelson_core::error::SessionError;

use crate::session::Session;

/// Outcome of a stream-mode `on_recv` invocation: how many leading bytes of
/// `data` the handler actually consumed, and whether the receive loop
/// re-issues its next read. Bytes past `consumed` stay in the session's
/// receive buffer and are prepended to the next read's `data`, so a handler
/// that only found a partial message may report a `consumed` short of
/// `data.len()` and pick up where it left off next call.
#[cfg(feature = "stream-mode")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvAction {
    /// `consumed` bytes were fully parsed and may be discarded; re-issue the
    /// next read.
    Success {
        /// Leading bytes of `data` to discard. Must not exceed `data.len()`.
        consumed: usize,
    },
    /// Equivalent to `Success` for loop purposes — kept distinct so a
    /// handler can signal "keep going, but I made no progress this call".
    Continue {
        /// Leading bytes of `data` to discard. Must not exceed `data.len()`.
        consumed: usize,
    },
    /// Suspend the read loop after discarding `consumed` bytes; the
    /// remainder stays buffered for whenever a higher layer resumes the loop
    /// (this crate does not provide an automatic resume path).
    Pause {
        /// Leading bytes of `data` to discard. Must not exceed `data.len()`.
        consumed: usize,
    },
    /// Suspend the read loop, as if a transport error occurred, after
    /// discarding `consumed` bytes.
    Error {
        /// Leading bytes of `data` to discard. Must not exceed `data.len()`.
        consumed: usize,
    },
}

#[cfg(feature = "stream-mode")]
impl RecvAction {
    /// How many leading bytes of `data` this action discards, whichever
    /// variant it is.
    #[must_use]
    pub const fn consumed(self) -> usize {
        match self {
            Self::Success { consumed } | Self::Continue { consumed } | Self::Pause { consumed } | Self::Error { consumed } => consumed,
        }
    }

    /// Whether the receive loop should re-issue its next read.
    #[must_use]
    pub const fn should_continue(self) -> bool {
        matches!(self, Self::Success { .. } | Self::Continue { .. })
    }
}

/// Callback surface implemented once per `Server`/`Client` and shared by
/// every `Session` it manages.
pub trait SessionHandler: Send + Sync + 'static {
    /// Fires exactly once, after a session reaches `Running`.
    fn on_connect(&self, _session: &Arc<Session<Self>>)
    where
        Self: Sized,
    {
    }

    /// Fires exactly once for a client session that never reaches `Running`.
    fn on_connect_failure(&self, _session: &Arc<Session<Self>>, _err: &SessionError)
    where
        Self: Sized,
    {
    }

    /// Fires exactly once, when a session leaves `Running` for good.
    fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError)
    where
        Self: Sized,
    {
    }

    /// A server's accept loop failed to accept a connection. The loop
    /// continues regardless.
    fn on_accept_failed(&self, _err: &SessionError) {}

    /// Stream-mode data arrival. `data` is the session's receive buffer's
    /// readable slice at the moment of the callback — everything read off the
    /// socket so far that the handler hasn't yet reported as consumed. The
    /// session only discards `data[..action.consumed()]`; any trailing bytes
    /// the handler didn't finish parsing stay buffered and are re-offered,
    /// with whatever arrives next appended, on the following call.
    #[cfg(feature = "stream-mode")]
    fn on_recv(&self, _session: &Arc<Session<Self>>, data: &[u8]) -> RecvAction
    where
        Self: Sized,
    {
        RecvAction::Success { consumed: data.len() }
    }

    /// Fixed length, in bytes, of every frame header. Queried once at
    /// session setup.
    #[cfg(feature = "framed-mode")]
    fn header_length(&self) -> usize;

    /// Body length encoded by `header`. A negative return is a protocol
    /// error and shuts the session down.
    #[cfg(feature = "framed-mode")]
    fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64
    where
        Self: Sized;

    /// A complete frame has arrived.
    #[cfg(feature = "framed-mode")]
    fn on_message(&self, _session: &Arc<Session<Self>>, header: &[u8], body: &[u8])
    where
        Self: Sized;
}
