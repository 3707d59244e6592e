//! Exponential-backoff helper for user-driven reconnection.
//!
//! The framework itself never auto-reconnects: a `Client`'s `on_close`
//! override decides whether and when to call `connect` again. This module
//! carries the one reusable piece of that decision — the backoff schedule —
//! so callers don't reinvent it.

use std::time::Duration;

/// Tracks reconnection attempts and computes the exponential-backoff delay
/// before the next one.
///
/// # Example
///
/// ```
/// use keelson_core::reconnect::ReconnectState;
/// use std::time::Duration;
///
/// let mut reconnect = ReconnectState::new(Duration::from_millis(100), Duration::from_secs(10));
///
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(400));
///
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    base_interval: Duration,
    max_interval: Duration,
    attempt: u32,
    current_interval: Duration,
}

impl ReconnectState {
    /// Create a new tracker. `max_interval == Duration::ZERO` disables
    /// backoff growth — every attempt waits `base_interval`.
    #[must_use]
    pub const fn new(base_interval: Duration, max_interval: Duration) -> Self {
        Self {
            base_interval,
            max_interval,
            attempt: 0,
            current_interval: base_interval,
        }
    }

    /// The delay to wait before the next reconnection attempt, advancing the
    /// internal backoff state.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;

        self.attempt += 1;
        self.current_interval = self.base_interval.saturating_mul(1_u32 << self.attempt.min(10));

        if !self.max_interval.is_zero() && self.current_interval > self.max_interval {
            self.current_interval = self.max_interval;
        }

        delay
    }

    /// Reset the backoff state after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn base_interval(&self) -> Duration {
        self.base_interval
    }

    #[inline]
    #[must_use]
    pub const fn max_interval(&self) -> Duration {
        self.max_interval
    }

    #[inline]
    #[must_use]
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_each_attempt() {
        let mut state = ReconnectState::new(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.attempt(), 1);
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.next_delay(), Duration::from_millis(800));
        assert_eq!(state.attempt(), 4);
    }

    #[test]
    fn caps_at_max_interval() {
        let mut state = ReconnectState::new(Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.next_delay(), Duration::from_millis(500));
        assert_eq!(state.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn reset_returns_to_base_interval() {
        let mut state = ReconnectState::new(Duration::from_millis(100), Duration::from_secs(10));
        state.next_delay();
        state.next_delay();
        state.next_delay();
        assert_eq!(state.attempt(), 3);

        state.reset();
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn zero_max_interval_disables_backoff_growth() {
        let mut state = ReconnectState::new(Duration::from_millis(250), Duration::ZERO);
        assert_eq!(state.next_delay(), Duration::from_millis(250));
        assert_eq!(state.next_delay(), Duration::from_millis(250));
        assert_eq!(state.next_delay(), Duration::from_millis(250));
    }
}
