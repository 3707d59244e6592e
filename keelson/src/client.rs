//! `Client<H>`: the connecting façade.
//!
//! Owns exactly one `Reactor` — never a pool, since a client-side façade does
//! not multiplex accepted connections the way a server does. `run()` starts
//! that reactor; `stop()` joins it. `connect()` constructs a fresh `Session`
//! with a new id, inserts it into the registry immediately (so a session is
//! always reachable by id across its whole `Connecting`→`Running`→
//! `ShuttingDown` lifetime, not just once `Running`), and drives its
//! `Session::connect`.
//!
//! Reconnection is a user concern: nothing here calls `connect` again
//! automatically. The idiom is for the handler struct to hold a `Weak<Client<H>>`
//! set after construction and, from its `on_close` override, call
//! `client.connect(...)` again — optionally pacing attempts with
//! [`keelson_core::reconnect::ReconnectState`].

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use keelson_core::endpoint::Endpoint;
use keelson_core::options::SessionOptions;
use keelson_core::reactor::Reactor;
use keelson_core::registry::{SessionIdAllocator, SessionRegistry};

use crate::handler::SessionHandler;
use crate::session::Session;

/// A client façade owning one reactor and the sessions it has connected.
pub struct Client<H: SessionHandler> {
    handler: Arc<H>,
    options: SessionOptions,
    reactor: Mutex<Option<Arc<Reactor>>>,
    registry: Arc<SessionRegistry<Session<H>>>,
    id_alloc: Arc<SessionIdAllocator>,
}

impl<H: SessionHandler> Client<H> {
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::with_options(handler, SessionOptions::default())
    }

    #[must_use]
    pub fn with_options(handler: H, options: SessionOptions) -> Self {
        Self {
            handler: Arc::new(handler),
            options,
            reactor: Mutex::new(None),
            registry: Arc::new(SessionRegistry::new()),
            id_alloc: Arc::new(SessionIdAllocator::new()),
        }
    }

    /// Start this client's reactor. Idempotent.
    pub fn run(&self) {
        let mut guard = self.reactor.lock();
        if guard.is_none() {
            *guard = Some(Reactor::start(0, 0));
        }
    }

    /// Stop the reactor, joining its worker thread. Idempotent.
    pub fn stop(&self) {
        if let Some(reactor) = self.reactor.lock().take() {
            reactor.stop();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.reactor.lock().is_some()
    }

    /// Connect to `ip:port`. `delay`/`connect_timeout` of `Duration::ZERO`
    /// disable the corresponding timer. Returns the new session handle
    /// immediately; the connection itself proceeds asynchronously and resolves
    /// through `on_connect`/`on_connect_failure`.
    ///
    /// # Errors
    ///
    /// Returns an error if `run()` has not been called yet.
    pub fn connect(&self, ip: IpAddr, port: u16, delay: Duration, connect_timeout: Duration) -> io::Result<Arc<Session<H>>> {
        let reactor = self
            .reactor
            .lock()
            .clone()
            .ok_or_else(|| io::Error::other("Client::run() must be called before connect()"))?;

        let endpoint = Endpoint::new(SocketAddr::new(ip, port));
        let id = self.id_alloc.next();

        let release_registry = Arc::clone(&self.registry);
        let release_hook: Arc<dyn Fn(u64) + Send + Sync> = Arc::new(move |id| {
            release_registry.remove(id);
        });

        let session = Session::new(id, reactor, Arc::clone(&self.handler), self.options.clone(), Some(release_hook));
        self.registry.insert(id, &session);
        session.connect(endpoint, delay, connect_timeout);
        Ok(session)
    }

    /// Queue `bytes` for `session_id`. Returns `false` if the id is unknown or
    /// the session is no longer `Running`.
    pub fn send(&self, session_id: u64, bytes: impl Into<Bytes>) -> bool {
        self.registry.get(session_id).is_some_and(|session| session.send(bytes))
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

impl<H: SessionHandler> Drop for Client<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
