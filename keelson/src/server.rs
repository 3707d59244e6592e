//! `Server<H>`: the listening façade.
//!
//! Owns a `ReactorPool` that accepted sessions are handed out from
//! round-robin, plus an [`Acceptor`] running the accept loop on its own
//! separate reactor. `start`/`stop` are idempotent; calling `send` for an id
//! that has already closed is a harmless no-op (the registry lookup simply
//! fails), matching `Session::send`'s own "not connected" contract.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use keelson_core::endpoint::Endpoint;
use keelson_core::options::{ReactorPoolOptions, SessionOptions};
use keelson_core::reactor::ReactorPool;
use keelson_core::registry::{SessionIdAllocator, SessionRegistry};

use crate::acceptor::Acceptor;
use crate::handler::SessionHandler;
use crate::session::Session;

struct Running<H: SessionHandler> {
    pool: Arc<ReactorPool>,
    acceptor: Arc<Acceptor<H>>,
}

/// A TCP server accepting connections on one port, handing each off to a
/// round-robin pool of reactors.
pub struct Server<H: SessionHandler> {
    port: u16,
    handler: Arc<H>,
    session_options: SessionOptions,
    pool_options: ReactorPoolOptions,
    registry: Arc<SessionRegistry<Session<H>>>,
    id_alloc: Arc<SessionIdAllocator>,
    running: Mutex<Option<Running<H>>>,
}

impl<H: SessionHandler> Server<H> {
    /// A server bound to `port` at `start()` time, handing sessions out across
    /// `pool_size` reactors (coerced to at least one).
    #[must_use]
    pub fn new(port: u16, pool_size: usize, handler: H) -> Self {
        Self::with_options(
            port,
            handler,
            SessionOptions::default(),
            ReactorPoolOptions::new().with_pool_size(pool_size),
        )
    }

    /// As [`Server::new`], with explicit per-session defaults and pool tuning.
    #[must_use]
    pub fn with_options(
        port: u16,
        handler: H,
        session_options: SessionOptions,
        pool_options: ReactorPoolOptions,
    ) -> Self {
        Self {
            port,
            handler: Arc::new(handler),
            session_options,
            pool_options,
            registry: Arc::new(SessionRegistry::new()),
            id_alloc: Arc::new(SessionIdAllocator::new()),
            running: Mutex::new(None),
        }
    }

    /// Start the reactor pool and the accept loop. Idempotent: returns `Ok(())`
    /// without rebinding if already running.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from binding the listener.
    pub fn start(&self) -> io::Result<()> {
        let mut guard = self.running.lock();
        if guard.is_some() {
            return Ok(());
        }

        let pool = Arc::new(ReactorPool::start(self.pool_options.pool_size, self.pool_options.queue_depth));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        let acceptor = match Acceptor::start(
            addr,
            Arc::clone(&pool),
            Arc::clone(&self.handler),
            self.session_options.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.id_alloc),
        ) {
            Ok(acceptor) => acceptor,
            Err(err) => {
                pool.stop();
                return Err(err);
            }
        };

        *guard = Some(Running { pool, acceptor });
        Ok(())
    }

    /// Stop the accept loop and every reactor in the pool, joining all worker
    /// threads. Idempotent.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.acceptor.stop();
            running.pool.stop();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The bound local address, once `start()` has succeeded.
    #[must_use]
    pub fn local_addr(&self) -> Option<Endpoint> {
        self.running.lock().as_ref().map(|r| r.acceptor.local_addr())
    }

    /// Queue `bytes` for `session_id`. Returns `false` if the id is unknown or
    /// the session is no longer `Running` — same contract as `Session::send`.
    pub fn send(&self, session_id: u64, bytes: impl Into<Bytes>) -> bool {
        self.registry.get(session_id).is_some_and(|session| session.send(bytes))
    }

    /// Request shutdown of a specific session by id. A no-op if the id is
    /// unknown or the session has already left `Running`.
    pub fn shutdown_session(&self, session_id: u64, how: std::net::Shutdown) {
        if let Some(session) = self.registry.get(session_id) {
            session.shutdown(how, true);
        }
    }

    /// Look up a live session handle by id.
    #[must_use]
    pub fn session(&self, session_id: u64) -> Option<Arc<Session<H>>> {
        self.registry.get(session_id)
    }

    /// Number of sessions currently tracked (live or not-yet-garbage-collected).
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}

impl<H: SessionHandler> Drop for Server<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
