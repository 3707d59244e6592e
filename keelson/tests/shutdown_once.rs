//! `on_close` fires exactly once even when several threads race to shut the
//! same session down concurrently.

#![cfg(feature = "framed-mode")]

use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keelson::{Client, Session, SessionError, SessionHandler};

struct CountingHandler {
    close_count: Arc<AtomicUsize>,
}

impl SessionHandler for CountingHandler {
    fn header_length(&self) -> usize {
        4
    }

    fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64 {
        i32::from_be_bytes(header.try_into().unwrap()) as i64
    }

    fn on_message(&self, _session: &Arc<Session<Self>>, _header: &[u8], _body: &[u8]) {}

    fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn concurrent_shutdown_calls_close_exactly_once() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind peer listener");
    let peer_addr = listener.local_addr().unwrap();

    let accept_thread = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        // Keep the peer socket open for the session's whole lifetime.
        stream
    });

    let close_count = Arc::new(AtomicUsize::new(0));
    let client = Client::new(CountingHandler { close_count: Arc::clone(&close_count) });
    client.run();

    let session = client
        .connect(peer_addr.ip(), peer_addr.port(), Duration::ZERO, Duration::from_secs(2))
        .expect("connect");

    let _peer: TcpStream = accept_thread.join().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(session.is_connected());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let session = Arc::clone(&session);
            scope.spawn(move || {
                session.shutdown(Shutdown::Both, true);
            });
        }
    });

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(close_count.load(Ordering::SeqCst), 1);

    client.stop();
}
