//! Outbound send-rate limiter.
//!
//! Grounded on the teacher's `backpressure` module — "backpressure scales
//! with bytes, not message count" — generalized from an async permit gate
//! into the concrete one-second sliding-window counter the session's write
//! path needs: a write head may be split, with the remainder spliced back
//! onto the queue and deferred until the next window.
//!
//! `0` in `bytes_per_second` means disabled, matching `set_send_rate_limit`'s
//! contract.

use std::sync::atomic::{AtomicU32, Ordering};

/// Byte-based sliding-window rate limiter for one session's outbound writes.
#[derive(Debug, Default)]
pub struct RateLimiter {
    bytes_per_second: AtomicU32,
    bytes_sent_this_second: AtomicU32,
    observed_speed: AtomicU32,
}

impl RateLimiter {
    #[must_use]
    pub fn new(bytes_per_second: u32) -> Self {
        Self {
            bytes_per_second: AtomicU32::new(bytes_per_second),
            bytes_sent_this_second: AtomicU32::new(0),
            observed_speed: AtomicU32::new(0),
        }
    }

    /// Change the limit. `0` disables rate limiting.
    pub fn set_limit(&self, bytes_per_second: u32) {
        self.bytes_per_second.store(bytes_per_second, Ordering::Release);
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.bytes_per_second.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.limit() > 0
    }

    /// The throughput observed over the most recently completed one-second
    /// window, as published by `roll_window`. Backs `get_realtime_speed()`.
    #[must_use]
    pub fn observed_speed(&self) -> u32 {
        self.observed_speed.load(Ordering::Acquire)
    }

    /// How many of the next `len` candidate bytes may be handed to the
    /// kernel right now without exceeding the current window's budget.
    ///
    /// Returns `len` unchanged when rate limiting is disabled. Returns `0`
    /// when the window is already exhausted — the caller must defer the
    /// whole write until `roll_window` fires.
    #[must_use]
    pub fn admit(&self, len: usize) -> usize {
        let limit = self.limit();
        if limit == 0 {
            return len;
        }
        let sent = self.bytes_sent_this_second.load(Ordering::Acquire);
        if sent >= limit {
            return 0;
        }
        let remaining = (limit - sent) as usize;
        remaining.min(len)
    }

    /// Account for `n` bytes just handed to the kernel in the current window.
    pub fn record_sent(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.bytes_sent_this_second.fetch_add(n as u32, Ordering::AcqRel);
    }

    /// Called by the one-second rate-limit timer: publishes the observed
    /// speed and resets the per-second counter.
    ///
    /// Returns `true` if the prior window was exhausted (writes may have
    /// been stalled waiting for budget), signalling the caller to rewake the
    /// write path.
    pub fn roll_window(&self) -> bool {
        let sent = self.bytes_sent_this_second.swap(0, Ordering::AcqRel);
        self.observed_speed.store(sent, Ordering::Release);
        let limit = self.limit();
        limit > 0 && sent >= limit
    }
}
