//! The server-side accept loop.
//!
//! An `Acceptor` owns one dedicated `Reactor` of its own — separate from the
//! `ReactorPool` a `Server` hands sessions out to — and runs nothing but a
//! `listener.accept()` loop on it. Every accepted connection is handed to the
//! *next* pool reactor round-robin; since the socket was accepted on the
//! acceptor's own reactor thread, it has to cross a thread boundary to reach
//! the reactor it will actually live on, via
//! [`keelson_core::tcp::detach_for_handoff`].
//!
//! A transient accept error never kills the loop: it is reported through
//! `on_accept_failed` and the loop re-issues the next accept.

use std::io;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;

use compio::net::TcpListener;
use tracing::warn;

use keelson_core::endpoint::Endpoint;
use keelson_core::error::SessionError;
use keelson_core::options::SessionOptions;
use keelson_core::reactor::{Reactor, ReactorPool};
use keelson_core::registry::{SessionIdAllocator, SessionRegistry};

use crate::handler::SessionHandler;
use crate::session::Session;

/// Runs a server's accept loop on its own reactor. See the module docs.
pub(crate) struct Acceptor<H: SessionHandler> {
    reactor: Arc<Reactor>,
    local_addr: Endpoint,
    _handler: std::marker::PhantomData<Arc<H>>,
}

impl<H: SessionHandler> Acceptor<H> {
    /// Bind `addr` and start accepting. Blocks the calling thread only long
    /// enough to learn the bind result (or failure) from the acceptor's own
    /// reactor thread; the accept loop itself runs asynchronously from then on.
    pub(crate) fn start(
        addr: SocketAddr,
        pool: Arc<ReactorPool>,
        handler: Arc<H>,
        options: SessionOptions,
        registry: Arc<SessionRegistry<Session<H>>>,
        id_alloc: Arc<SessionIdAllocator>,
    ) -> io::Result<Arc<Self>> {
        // A reactor id distinct from the pool's own 0..N numbering; collision
        // is harmless regardless (the reactor-affinity check is thread-local,
        // per `Reactor::is_current`), but a distinct id keeps log lines honest.
        let reactor = Reactor::start(usize::MAX, 0);

        let (bind_tx, bind_rx) = mpsc::channel::<io::Result<SocketAddr>>();

        let loop_pool = Arc::clone(&pool);
        let loop_handler = Arc::clone(&handler);
        let loop_registry = Arc::clone(&registry);
        let loop_id_alloc = Arc::clone(&id_alloc);
        let loop_options = options.clone();

        reactor.post(move || {
            compio::runtime::spawn(async move {
                match TcpListener::bind(addr).await {
                    Ok(listener) => {
                        let _ = bind_tx.send(listener.local_addr());
                        Self::accept_loop(listener, loop_pool, loop_handler, loop_options, loop_registry, loop_id_alloc).await;
                    }
                    Err(err) => {
                        let _ = bind_tx.send(Err(err));
                    }
                }
            })
            .detach();
        });

        let local_addr = bind_rx
            .recv()
            .map_err(|_| io::Error::other("acceptor reactor exited before binding"))??;

        Ok(Arc::new(Self {
            reactor,
            local_addr: Endpoint::from(local_addr),
            _handler: std::marker::PhantomData,
        }))
    }

    async fn accept_loop(
        listener: TcpListener,
        pool: Arc<ReactorPool>,
        handler: Arc<H>,
        options: SessionOptions,
        registry: Arc<SessionRegistry<Session<H>>>,
        id_alloc: Arc<SessionIdAllocator>,
    ) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let std_stream = match keelson_core::tcp::detach_for_handoff(stream) {
                        Ok(s) => s,
                        Err(err) => {
                            handler.on_accept_failed(&SessionError::from_io(err));
                            continue;
                        }
                    };

                    let target_reactor = pool.acquire();
                    let id = id_alloc.next();

                    let release_registry = Arc::clone(&registry);
                    let release_hook: Arc<dyn Fn(u64) + Send + Sync> =
                        Arc::new(move |id| { release_registry.remove(id); });

                    let session = Session::new(id, Arc::clone(&target_reactor), Arc::clone(&handler), options.clone(), Some(release_hook));
                    registry.insert(id, &session);

                    let accept_handler = Arc::clone(&handler);
                    let attach_registry = Arc::clone(&registry);
                    target_reactor.dispatch(move || match compio::net::TcpStream::from_std(std_stream) {
                        Ok(stream) => {
                            let local = stream.local_addr().ok().map(Endpoint::from);
                            session.start_running(stream, local, Some(Endpoint::from(peer)));
                        }
                        Err(err) => {
                            attach_registry.remove(id);
                            accept_handler.on_accept_failed(&SessionError::from_io(err));
                        }
                    });
                }
                Err(err) => {
                    warn!(error = %err, "accept failed, re-issuing");
                    handler.on_accept_failed(&SessionError::from_io(err));
                }
            }
        }
    }

    /// The bound local address, available once `start` returns successfully.
    #[must_use]
    pub(crate) fn local_addr(&self) -> Endpoint {
        self.local_addr
    }

    /// Stop the accept loop and join its reactor thread. Dropping the reactor's
    /// `compio` runtime aborts the in-flight `accept()` and releases the listener.
    pub(crate) fn stop(&self) {
        self.reactor.stop();
    }
}
