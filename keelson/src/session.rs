//! The per-connection session state machine.
//!
//! A `Session` is always held behind an `Arc`, shared between its owning
//! `SessionRegistry` entry (as a `Weak`) and every outstanding asynchronous
//! continuation spawned on its owning `Reactor` — the read loop, the current
//! write, and any armed timer. The last such `Arc` to drop releases the
//! socket and any buffers.
//!
//! All of a session's single-threaded state (status, buffers, timers) is
//! only ever touched from its owning `Reactor`'s thread; the send queue is
//! the one piece of state genuinely shared with arbitrary caller threads, so
//! it alone is guarded by a mutex.

use std::collections::VecDeque;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use keelson_core::buffer::ByteBuffer;
use keelson_core::endpoint::Endpoint;
use keelson_core::error::SessionError;
use keelson_core::options::SessionOptions;
use keelson_core::rate_limit::RateLimiter;
use keelson_core::reactor::Reactor;
use keelson_core::timer::Timer;

use crate::handler::SessionHandler;

#[cfg(feature = "stream-mode")]
use crate::handler::RecvAction;

/// Lifecycle state of a `Session`. See the state machine in the design
/// notes: `Init` → `Connecting` → `Running` → `ShuttingDown` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Init = 0,
    Connecting = 1,
    Running = 2,
    ShuttingDown = 3,
}

impl SessionStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Init,
            1 => Self::Connecting,
            2 => Self::Running,
            _ => Self::ShuttingDown,
        }
    }
}

/// Framed-mode read phase: waiting for the fixed header, or waiting for a
/// body of a length already determined from the header.
#[cfg(feature = "framed-mode")]
enum FramedPhase {
    Header,
    Body { header: Vec<u8>, len: usize },
}

/// Socket-half used for the write chain, checked out for the duration of one
/// write and checked back in on completion. A session's writes are strictly
/// sequential, so at most one piece of code ever holds it checked out.
struct WriteHalf {
    stream: Option<TcpStream>,
}

pub struct Session<H: SessionHandler> {
    id: u64,
    reactor: Arc<Reactor>,
    handler: Arc<H>,
    options: SessionOptions,

    status: AtomicU8,

    read_stream: Mutex<Option<TcpStream>>,
    write_stream: Mutex<WriteHalf>,
    /// A socket clone never checked out for an actual read or write, kept
    /// only so `do_shutdown` always has a handle to call `shutdown(how)` on
    /// even while both halves above are checked out by an in-flight
    /// operation. `shutdown()` acts on the shared underlying socket, so
    /// issuing it through this clone still unblocks the outstanding read or
    /// write on the other two.
    shutdown_stream: Mutex<Option<TcpStream>>,

    local_endpoint: Mutex<Option<Endpoint>>,
    remote_endpoint: Mutex<Option<Endpoint>>,

    send_queue: Mutex<VecDeque<Bytes>>,

    #[cfg(feature = "stream-mode")]
    recv_buffer: Mutex<ByteBuffer>,
    #[cfg(feature = "framed-mode")]
    framed_phase: Mutex<Option<FramedPhase>>,

    rate_limiter: RateLimiter,

    heartbeat_payload: Mutex<Vec<u8>>,
    heartbeat_interval: Mutex<Duration>,
    recv_timeout: Mutex<Option<Duration>>,

    connect_delay_timer: Timer,
    connect_timeout_timer: Timer,
    heartbeat_timer: Timer,
    recv_idle_timer: Timer,
    rate_limit_timer: Timer,

    connect_generation: AtomicU32,

    /// Framework-level (not user-overridable) hook run exactly once, when the
    /// session leaves play for good — either `ShuttingDown` from `Running` or
    /// a connect failure that never reached `Running`. `Server`/`Client` wire
    /// this to their registry's `remove`, independent of whatever the user's
    /// `SessionHandler::on_close` override does.
    release_hook: Option<Arc<dyn Fn(u64) + Send + Sync>>,
}

impl<H: SessionHandler> Session<H> {
    pub(crate) fn new(
        id: u64,
        reactor: Arc<Reactor>,
        handler: Arc<H>,
        options: SessionOptions,
        release_hook: Option<Arc<dyn Fn(u64) + Send + Sync>>,
    ) -> Arc<Self> {
        #[cfg(feature = "stream-mode")]
        let recv_buffer = Mutex::new(ByteBuffer::with_capacity(options.recv_buffer_capacity));

        let session = Arc::new(Self {
            id,
            reactor,
            rate_limiter: RateLimiter::new(options.send_rate_limit),
            heartbeat_payload: Mutex::new(options.heartbeat_payload.clone()),
            heartbeat_interval: Mutex::new(options.heartbeat_interval),
            recv_timeout: Mutex::new(options.recv_timeout),
            handler,
            options,
            status: AtomicU8::new(SessionStatus::Init as u8),
            read_stream: Mutex::new(None),
            write_stream: Mutex::new(WriteHalf { stream: None }),
            shutdown_stream: Mutex::new(None),
            local_endpoint: Mutex::new(None),
            remote_endpoint: Mutex::new(None),
            send_queue: Mutex::new(VecDeque::new()),
            #[cfg(feature = "stream-mode")]
            recv_buffer,
            #[cfg(feature = "framed-mode")]
            framed_phase: Mutex::new(None),
            connect_delay_timer: Timer::new(),
            connect_timeout_timer: Timer::new(),
            heartbeat_timer: Timer::new(),
            recv_idle_timer: Timer::new(),
            rate_limit_timer: Timer::new(),
            connect_generation: AtomicU32::new(0),
            release_hook,
        });
        session.rate_limiter.set_limit(session.options.send_rate_limit);
        session
    }

    #[must_use]
    pub fn get_session_id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn get_local_endpoint(&self) -> Option<Endpoint> {
        *self.local_endpoint.lock()
    }

    #[must_use]
    pub fn get_remote_endpoint(&self) -> Option<Endpoint> {
        *self.remote_endpoint.lock()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Throughput observed over the most recently completed one-second
    /// rate-limit window.
    #[must_use]
    pub fn get_realtime_speed(&self) -> u32 {
        self.rate_limiter.observed_speed()
    }

    /// Arm (or, with `interval == Duration::ZERO`, cancel) the heartbeat.
    ///
    /// Callable from any thread: the actual timer (re)arm is dispatched onto
    /// the owning reactor, since `Timer::arm` must run there.
    pub fn set_heartbeat(self: &Arc<Self>, payload: impl Into<Vec<u8>>, interval: Duration) {
        *self.heartbeat_payload.lock() = payload.into();
        *self.heartbeat_interval.lock() = interval;
        let this = Arc::clone(self);
        self.reactor.dispatch(move || {
            if this.status() != SessionStatus::Running {
                return;
            }
            if interval.is_zero() {
                this.heartbeat_timer.cancel();
            } else {
                this.arm_heartbeat(interval);
            }
        });
    }

    /// Arm (or, with `timeout == None`, cancel) the idle-read timeout.
    ///
    /// Callable from any thread: the actual timer (re)arm is dispatched onto
    /// the owning reactor, since `Timer::arm` must run there.
    pub fn set_recv_timeout(self: &Arc<Self>, timeout: Option<Duration>, immediate: bool) {
        *self.recv_timeout.lock() = timeout;
        let this = Arc::clone(self);
        self.reactor.dispatch(move || {
            match timeout {
                Some(timeout) if immediate && this.status() == SessionStatus::Running => {
                    this.arm_recv_idle(timeout);
                }
                None => this.recv_idle_timer.cancel(),
                _ => {}
            }
        });
    }

    /// `0` disables rate limiting. Always succeeds.
    pub fn set_send_rate_limit(&self, bytes_per_second: u32) -> bool {
        self.rate_limiter.set_limit(bytes_per_second);
        true
    }

    /// Returns queued-but-unsent messages, but only if the session is no
    /// longer connected — callers use this to decide whether to reissue on
    /// reconnect.
    pub fn clear_send_queue(&self) -> Vec<Bytes> {
        if self.is_connected() {
            return Vec::new();
        }
        self.send_queue.lock().drain(..).collect()
    }

    /// Queue `bytes` for sending. Returns `false` with no side effect if the
    /// session is not `Running`.
    pub fn send(self: &Arc<Self>, bytes: impl Into<Bytes>) -> bool {
        if !self.is_connected() {
            return false;
        }
        let bytes = bytes.into();
        let mut queue = self.send_queue.lock();
        let was_empty = queue.is_empty();
        queue.push_back(bytes);
        drop(queue);
        if was_empty {
            let this = Arc::clone(self);
            self.reactor.dispatch(move || this.issue_write());
        }
        true
    }

    /// Request orderly shutdown. Idempotent: a no-op unless the session is
    /// currently `Running`. `post = true` forces the request to run strictly
    /// after currently-queued reactor work; `post = false` allows it to run
    /// inline if the caller is already on the owning reactor.
    pub fn shutdown(self: &Arc<Self>, how: Shutdown, post: bool) {
        let this = Arc::clone(self);
        let job = move || this.do_shutdown(how, SessionError::operation_aborted());
        if post {
            self.reactor.post(job);
        } else {
            self.reactor.dispatch(job);
        }
    }

    // ---- connect path (client) ----

    pub(crate) fn connect(self: &Arc<Self>, endpoint: Endpoint, delay: Duration, timeout: Duration) {
        self.set_status(SessionStatus::Connecting);
        *self.remote_endpoint.lock() = Some(endpoint);
        let generation = self.connect_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let this = Arc::clone(self);
        self.reactor.dispatch(move || {
            if delay.is_zero() {
                this.start_connect(generation, timeout);
            } else {
                let started = Arc::clone(&this);
                this.connect_delay_timer.arm(delay, move || started.start_connect(generation, timeout));
            }
        });
    }

    fn start_connect(self: &Arc<Self>, generation: u32, timeout: Duration) {
        if self.connect_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let Some(endpoint) = self.get_remote_endpoint() else {
            return;
        };

        if !timeout.is_zero() {
            let this = Arc::clone(self);
            self.connect_timeout_timer.arm(timeout, move || {
                this.do_shutdown_before_running(SessionError::operation_aborted());
            });
        }

        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            match TcpStream::connect(endpoint.addr()).await {
                Ok(stream) => {
                    if this.connect_generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    this.connect_timeout_timer.cancel();
                    let local = stream.local_addr().ok().map(Endpoint::from);
                    this.start_running(stream, local, Some(endpoint));
                }
                Err(err) => {
                    if this.connect_generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    this.connect_timeout_timer.cancel();
                    warn!(session = this.id, error = %err, "connect failed");
                    this.handler.on_connect_failure(&this, &SessionError::from_io(err));
                }
            }
        })
        .detach();
    }

    /// A connect-timeout fired (or any pre-Running failure) while still
    /// `Connecting`: route to on-connect-failure rather than on-close, since
    /// the session never reached `Running`.
    fn do_shutdown_before_running(self: &Arc<Self>, err: SessionError) {
        if self.status() != SessionStatus::Connecting {
            return;
        }
        self.set_status(SessionStatus::ShuttingDown);
        self.handler.on_connect_failure(self, &err);
        if let Some(hook) = &self.release_hook {
            hook(self.id);
        }
    }

    // ---- shared run-start path (connect success or accept) ----

    pub(crate) fn start_running(self: &Arc<Self>, stream: TcpStream, local: Option<Endpoint>, remote: Option<Endpoint>) {
        if let Err(err) = keelson_core::tcp::enable_tcp_nodelay(&stream) {
            debug!(session = self.id, error = %err, "failed to set TCP_NODELAY");
        }

        let write_stream = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(session = self.id, error = %err, "failed to clone socket for write half");
                self.handler.on_connect_failure(self, &SessionError::from_io(err));
                return;
            }
        };
        let shutdown_stream = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(session = self.id, error = %err, "failed to clone socket for shutdown handle");
                self.handler.on_connect_failure(self, &SessionError::from_io(err));
                return;
            }
        };

        *self.local_endpoint.lock() = local;
        if remote.is_some() {
            *self.remote_endpoint.lock() = remote;
        }
        *self.read_stream.lock() = Some(stream);
        self.write_stream.lock().stream = Some(write_stream);
        *self.shutdown_stream.lock() = Some(shutdown_stream);

        self.connect_delay_timer.cancel();
        self.connect_timeout_timer.cancel();
        self.set_status(SessionStatus::Running);

        debug!(session = self.id, "session running");

        let this = Arc::clone(self);
        self.reactor.dispatch(move || {
            this.handler.on_connect(&this);

            let heartbeat_interval = *this.heartbeat_interval.lock();
            if !heartbeat_interval.is_zero() {
                this.arm_heartbeat(heartbeat_interval);
            }

            let recv_timeout = *this.recv_timeout.lock();
            if let Some(timeout) = recv_timeout {
                if this.options.recv_timeout_immediate {
                    this.arm_recv_idle(timeout);
                }
            }

            this.arm_rate_limit_timer();
            this.issue_read();
        });
    }

    // ---- receive loop ----

    fn issue_read(self: &Arc<Self>) {
        if self.status() != SessionStatus::Running {
            return;
        }
        if let Some(timeout) = *self.recv_timeout.lock() {
            self.arm_recv_idle(timeout);
        }

        #[cfg(feature = "stream-mode")]
        self.issue_read_stream();
        #[cfg(feature = "framed-mode")]
        self.issue_read_framed();
    }

    #[cfg(feature = "stream-mode")]
    fn issue_read_stream(self: &Arc<Self>) {
        self.recv_buffer.lock().compact();
        let capacity = self.options.recv_buffer_capacity.max(4096);
        let buf = vec![0u8; capacity];

        let Some(mut stream) = self.read_stream.lock().take() else {
            return;
        };
        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            let BufResult(res, buf) = stream.read(buf).await;
            *this.read_stream.lock() = Some(stream);
            match res {
                Ok(0) => this.do_shutdown(Shutdown::Both, SessionError::eof()),
                Ok(n) => {
                    trace!(session = this.id, bytes = n, "read");
                    this.recv_buffer.lock().write(&buf[..n]);
                    let data = this.recv_buffer.lock().readable_slice().to_vec();
                    let action = this.handler.on_recv(&this, &data);
                    let consumed = action.consumed().min(data.len());
                    let _ = this.recv_buffer.lock().skip(consumed);
                    if action.should_continue() {
                        this.issue_read();
                    }
                }
                Err(err) => this.do_shutdown(Shutdown::Both, SessionError::from_io(err)),
            }
        })
        .detach();
    }

    #[cfg(feature = "framed-mode")]
    fn issue_read_framed(self: &Arc<Self>) {
        let phase_len = {
            let mut phase = self.framed_phase.lock();
            if phase.is_none() {
                *phase = Some(FramedPhase::Header);
            }
            match phase.as_ref().unwrap() {
                FramedPhase::Header => self.handler.header_length(),
                FramedPhase::Body { len, .. } => *len,
            }
        };

        let buf = vec![0u8; phase_len];
        let Some(mut stream) = self.read_stream.lock().take() else {
            return;
        };
        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            let BufResult(res, buf) = stream.read_exact(buf).await;
            *this.read_stream.lock() = Some(stream);
            match res {
                Ok(()) => this.on_framed_read_complete(buf),
                Err(err) => {
                    let kind = err.kind();
                    let mapped = if kind == std::io::ErrorKind::UnexpectedEof {
                        SessionError::eof()
                    } else {
                        SessionError::from_io(err)
                    };
                    this.do_shutdown(Shutdown::Both, mapped);
                }
            }
        })
        .detach();
    }

    #[cfg(feature = "framed-mode")]
    fn on_framed_read_complete(self: &Arc<Self>, data: Vec<u8>) {
        enum Next {
            BadLength(i64),
            AwaitingBody,
            Message(Vec<u8>, Vec<u8>),
        }

        let next_phase = {
            let mut phase = self.framed_phase.lock();
            match phase.take() {
                Some(FramedPhase::Header) => {
                    let body_len = self.handler.body_length(self, &data);
                    if body_len < 0 {
                        *phase = None;
                        Next::BadLength(body_len)
                    } else {
                        *phase = Some(FramedPhase::Body {
                            header: data,
                            len: body_len as usize,
                        });
                        Next::AwaitingBody
                    }
                }
                Some(FramedPhase::Body { header, .. }) => {
                    *phase = Some(FramedPhase::Header);
                    Next::Message(header, data)
                }
                None => Next::AwaitingBody,
            }
        };

        match next_phase {
            Next::BadLength(len) => {
                let err = SessionError::protocol(format!("negative body length: {len}"));
                warn!(session = self.id, error = %err, "protocol error");
                self.do_shutdown(Shutdown::Both, err);
            }
            Next::AwaitingBody => self.issue_read(),
            Next::Message(header, body) => {
                self.handler.on_message(self, &header, &body);
                self.issue_read();
            }
        }
    }

    // ---- write chain ----

    fn issue_write(self: &Arc<Self>) {
        if self.status() != SessionStatus::Running {
            return;
        }

        let head = {
            let queue = self.send_queue.lock();
            queue.front().cloned()
        };
        let Some(head) = head else {
            return;
        };

        let admitted = self.rate_limiter.admit(head.len());
        if admitted == 0 {
            trace!(session = self.id, "write stalled by rate limit");
            return;
        }

        let (to_send, remainder) = if admitted < head.len() {
            (head.slice(0..admitted), Some(head.slice(admitted..)))
        } else {
            (head, None)
        };

        if let Some(remainder) = remainder {
            let mut queue = self.send_queue.lock();
            if let Some(front) = queue.front_mut() {
                *front = remainder;
            }
        }

        let Some(mut stream) = self.write_stream.lock().stream.take() else {
            return;
        };
        let len = to_send.len();
        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            let BufResult(res, _) = stream.write_all(to_send.to_vec()).await;
            this.write_stream.lock().stream = Some(stream);
            match res {
                Ok(()) => {
                    this.rate_limiter.record_sent(len);
                    if remainder.is_none() {
                        let mut queue = this.send_queue.lock();
                        queue.pop_front();
                        let more = !queue.is_empty();
                        drop(queue);
                        if more {
                            this.issue_write();
                        }
                    } else {
                        this.issue_write();
                    }
                }
                Err(err) => this.do_shutdown(Shutdown::Both, SessionError::from_io(err)),
            }
        })
        .detach();
    }

    // ---- timers ----

    fn arm_heartbeat(self: &Arc<Self>, interval: Duration) {
        let this = Arc::clone(self);
        self.heartbeat_timer.arm(interval, move || this.on_heartbeat_fire());
    }

    fn on_heartbeat_fire(self: &Arc<Self>) {
        if self.status() != SessionStatus::Running {
            return;
        }
        let payload = self.heartbeat_payload.lock().clone();
        if !payload.is_empty() && self.send_queue.lock().is_empty() {
            self.send(Bytes::from(payload));
        }
        let interval = *self.heartbeat_interval.lock();
        if !interval.is_zero() {
            self.arm_heartbeat(interval);
        }
    }

    fn arm_recv_idle(self: &Arc<Self>, timeout: Duration) {
        let this = Arc::clone(self);
        self.recv_idle_timer.arm(timeout, move || this.on_recv_idle_fire());
    }

    fn on_recv_idle_fire(self: &Arc<Self>) {
        if self.status() != SessionStatus::Running {
            return;
        }
        debug!(session = self.id, "idle-read timeout");
        self.do_shutdown(Shutdown::Both, SessionError::TimedOut);
    }

    /// Rolls the rate limiter's one-second window for the whole `Running`
    /// lifetime of the session, independent of whether a limit is currently
    /// set — `RateLimiter::observed_speed` stays meaningful either way, and
    /// `get_realtime_speed()` has something to report.
    fn arm_rate_limit_timer(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.rate_limit_timer.arm(Duration::from_secs(1), move || this.on_rate_limit_tick());
    }

    fn on_rate_limit_tick(self: &Arc<Self>) {
        if self.status() != SessionStatus::Running {
            return;
        }
        let was_stalled = self.rate_limiter.roll_window();
        if was_stalled {
            trace!(session = self.id, "rate limit window rolled over, rewaking write path");
            self.issue_write();
        }
        self.arm_rate_limit_timer();
    }

    // ---- shutdown ----

    fn do_shutdown(self: &Arc<Self>, how: Shutdown, err: SessionError) {
        if self.status() != SessionStatus::Running {
            return;
        }
        self.set_status(SessionStatus::ShuttingDown);

        self.connect_delay_timer.cancel();
        self.connect_timeout_timer.cancel();
        self.heartbeat_timer.cancel();
        self.recv_idle_timer.cancel();
        self.rate_limit_timer.cancel();

        // `read_stream`/`write_stream` are checked out (and thus `None` here)
        // for essentially the whole lifetime of a `Running` session — one or
        // both are routinely mid-read/mid-write when shutdown is requested.
        // `shutdown_stream` is never checked out, so it is always present and
        // always able to issue the OS-level shutdown; `shutdown()` acts on
        // the underlying socket shared by every clone, so it still unblocks
        // whichever of the other two halves is in flight.
        if let Some(stream) = self.shutdown_stream.lock().take() {
            let _ = stream.shutdown(how);
        }
        let _ = self.read_stream.lock().take();
        let _ = self.write_stream.lock().stream.take();

        if err.is_routine() {
            debug!(session = self.id, error = %err, "session shutting down");
        } else {
            warn!(session = self.id, error = %err, "session shutting down");
        }
        self.handler.on_close(self, &err);
        if let Some(hook) = &self.release_hook {
            hook(self.id);
        }
    }
}
