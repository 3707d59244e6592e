//! Reactor thread pool.
//!
//! Each `Reactor` owns one OS thread running its own single-threaded `compio`
//! runtime. All I/O and timer completions for a session are serialized onto
//! the one reactor it was assigned at construction — this is what
//! lets `Session` use plain `Cell`-like interior state for anything only its
//! own reactor thread touches, reserving `parking_lot::Mutex` for the handful
//! of fields a foreign thread can reach (the send queue, the registry).
//!
//! Jobs reach a reactor over a `flume` channel. `post` always goes through
//! the channel, even when called from the reactor's own thread, so ordering
//! against other posted jobs is preserved. `dispatch` is the fast path used
//! by code that already knows it is running on the target reactor's thread
//! (for example, a completion callback scheduling the next step of the same
//! session) — it runs the job inline instead of round-tripping through the
//! channel.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A message on a reactor's dispatch channel: either a job to run, or the
/// stop signal.
enum Message {
    Job(Job),
    Stop,
}

thread_local! {
    static CURRENT_REACTOR: Cell<Option<usize>> = const { Cell::new(None) };
}

/// A single reactor worker thread.
pub struct Reactor {
    id: usize,
    sender: flume::Sender<Message>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Reactor {
    /// Spawn the worker thread and return a handle to it. `queue_depth == 0`
    /// means an unbounded dispatch channel.
    #[must_use]
    pub fn start(id: usize, queue_depth: usize) -> Arc<Self> {
        let (sender, receiver) = if queue_depth == 0 {
            flume::unbounded()
        } else {
            flume::bounded(queue_depth)
        };

        let thread_name = format!("keelson-reactor-{id}");
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || Self::run(id, receiver))
            .expect("failed to spawn reactor thread");

        Arc::new(Self {
            id,
            sender,
            handle: parking_lot::Mutex::new(Some(handle)),
        })
    }

    fn run(id: usize, receiver: flume::Receiver<Message>) {
        CURRENT_REACTOR.with(|cell| cell.set(Some(id)));

        let runtime = compio::runtime::Runtime::new().expect("failed to build compio runtime");
        runtime.block_on(async move {
            while let Ok(message) = receiver.recv_async().await {
                match message {
                    Message::Job(job) => {
                        compio::runtime::spawn(async move { job() }).detach();
                    }
                    Message::Stop => break,
                }
            }
        });
    }

    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// True if the calling thread is this reactor's own worker thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT_REACTOR.with(|cell| cell.get() == Some(self.id))
    }

    /// Run `job` on this reactor's thread, inline if already running on it.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            job();
        } else {
            self.post(job);
        }
    }

    /// Enqueue `job` to run on this reactor's thread, preserving order
    /// relative to other posted jobs regardless of the caller's thread.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::Job(Box::new(job))).is_err() {
            tracing::warn!(reactor = self.id, "dropped job posted to a stopped reactor");
        }
    }

    /// Stop accepting new jobs and join the worker thread. Jobs already
    /// queued are still run before the stop signal is reached, since the
    /// channel preserves send order.
    pub fn stop(&self) {
        let handle = self.handle.lock().take();
        let _ = self.sender.send(Message::Stop);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Round-robin pool of reactor workers, shared by a `Server`'s accepted
/// sessions.
pub struct ReactorPool {
    reactors: Vec<Arc<Reactor>>,
    next: AtomicUsize,
}

impl ReactorPool {
    /// Start `pool_size` reactor threads (coerced to at least one).
    #[must_use]
    pub fn start(pool_size: usize, queue_depth: usize) -> Self {
        let pool_size = pool_size.max(1);
        let reactors = (0..pool_size)
            .map(|id| Reactor::start(id, queue_depth))
            .collect();
        Self {
            reactors,
            next: AtomicUsize::new(0),
        }
    }

    /// The next reactor in round-robin order.
    #[must_use]
    pub fn acquire(&self) -> Arc<Reactor> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.reactors.len();
        Arc::clone(&self.reactors[index])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Stop every reactor in the pool, joining each worker thread in turn.
    pub fn stop(&self) {
        for reactor in &self.reactors {
            reactor.stop();
        }
    }
}
