//! Session and reactor-pool configuration.
//!
//! Builder-style options structs, in the same spirit as the teacher's
//! `SocketOptions`: a `Default` baseline plus chained `with_*` setters.

use std::time::Duration;

/// Defaults a freshly constructed `Session` starts with.
///
/// A façade (`Server`/`Client`) applies these at session construction time;
/// individual sessions may still override any of them at runtime through
/// their own setters (`set_heartbeat`, `set_recv_timeout`,
/// `set_send_rate_limit`).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Default idle-read timeout. `None` disables the idle timer.
    pub recv_timeout: Option<Duration>,

    /// Whether `recv_timeout` is armed immediately on `Running`, before the
    /// first read is even issued (used by the idle-timeout test scenario).
    pub recv_timeout_immediate: bool,

    /// Default connect timeout. `Duration::ZERO` disables it.
    pub connect_timeout: Duration,

    /// Default connect-delay, applied before the first connect attempt.
    pub connect_delay: Duration,

    /// Default heartbeat interval. `Duration::ZERO` disables the heartbeat.
    pub heartbeat_interval: Duration,

    /// Default heartbeat payload, sent only when the send queue is empty.
    pub heartbeat_payload: Vec<u8>,

    /// Default outbound rate limit in bytes/second. `0` disables it.
    pub send_rate_limit: u32,

    /// Initial capacity reserved for the stream-mode receive buffer.
    pub recv_buffer_capacity: usize,

    /// Initial capacity reserved for assembling an outbound write.
    pub send_buffer_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            recv_timeout_immediate: false,
            connect_timeout: Duration::ZERO,
            connect_delay: Duration::ZERO,
            heartbeat_interval: Duration::ZERO,
            heartbeat_payload: Vec::new(),
            send_rate_limit: 0,
            recv_buffer_capacity: 8192,
            send_buffer_capacity: 8192,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_recv_timeout(mut self, timeout: Duration, immediate: bool) -> Self {
        self.recv_timeout = Some(timeout);
        self.recv_timeout_immediate = immediate;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, payload: impl Into<Vec<u8>>, interval: Duration) -> Self {
        self.heartbeat_payload = payload.into();
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn with_send_rate_limit(mut self, bytes_per_second: u32) -> Self {
        self.send_rate_limit = bytes_per_second;
        self
    }

    #[must_use]
    pub fn with_buffer_capacities(mut self, recv: usize, send: usize) -> Self {
        self.recv_buffer_capacity = recv;
        self.send_buffer_capacity = send;
        self
    }
}

/// Configuration for a `ReactorPool`.
#[derive(Debug, Clone)]
pub struct ReactorPoolOptions {
    /// Number of reactor worker threads. `0` is coerced to `1` by the pool.
    pub pool_size: usize,

    /// Bound on the number of jobs a reactor's dispatch channel will buffer
    /// before `dispatch`/`post` starts applying backpressure to the caller.
    ///
    /// `0` means unbounded, matching `flume::unbounded`.
    pub queue_depth: usize,
}

impl Default for ReactorPoolOptions {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get().max(1),
            queue_depth: 0,
        }
    }
}

impl ReactorPoolOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }
}
