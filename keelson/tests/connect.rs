//! A client session that reaches `Running` fires `on_connect` exactly once
//! and never `on_connect_failure`; a session that cannot complete its async
//! connect (nothing listening on the target port) fires `on_connect_failure`
//! exactly once and never `on_connect`.

#![cfg(feature = "framed-mode")]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keelson::{Client, Session, SessionError, SessionHandler};

struct CountingHandler {
    connects: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl SessionHandler for CountingHandler {
    fn header_length(&self) -> usize {
        4
    }

    fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64 {
        i32::from_be_bytes(header.try_into().unwrap()) as i64
    }

    fn on_message(&self, _session: &Arc<Session<Self>>, _header: &[u8], _body: &[u8]) {}

    fn on_connect(&self, _session: &Arc<Session<Self>>) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connect_failure(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {}
}

#[test]
fn successful_connect_fires_on_connect_exactly_once() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind peer listener");
    let addr = listener.local_addr().unwrap();
    let accept_thread = std::thread::spawn(move || listener.accept().expect("accept"));

    let connects = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let client = Client::new(CountingHandler {
        connects: Arc::clone(&connects),
        failures: Arc::clone(&failures),
    });
    client.run();

    let session = client
        .connect(addr.ip(), addr.port(), Duration::ZERO, Duration::from_secs(2))
        .expect("connect");

    let _peer = accept_thread.join().unwrap();
    std::thread::sleep(Duration::from_millis(150));

    assert!(session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    client.stop();
}

#[test]
fn refused_connect_fires_on_connect_failure_exactly_once() {
    // Bind then drop immediately: the port is very likely refused on the
    // next connect attempt since nothing is left listening on it.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind throwaway listener");
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connects = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let client = Client::new(CountingHandler {
        connects: Arc::clone(&connects),
        failures: Arc::clone(&failures),
    });
    client.run();

    let session = client
        .connect(addr.ip(), addr.port(), Duration::ZERO, Duration::from_secs(2))
        .expect("connect");

    std::thread::sleep(Duration::from_millis(300));

    assert!(!session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    client.stop();
}
