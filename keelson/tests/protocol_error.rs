//! A framed-mode header decoding to a negative body length is a protocol
//! error: the session shuts itself down rather than trying to read a
//! nonsensical body length, and the peer observes the connection close.

#![cfg(feature = "framed-mode")]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keelson::{Server, Session, SessionError, SessionHandler};

struct Handler {
    saw_protocol_error: Arc<AtomicBool>,
}

impl SessionHandler for Handler {
    fn header_length(&self) -> usize {
        4
    }

    fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64 {
        i32::from_be_bytes(header.try_into().unwrap()) as i64
    }

    fn on_message(&self, _session: &Arc<Session<Self>>, _header: &[u8], _body: &[u8]) {
        panic!("a negative body length must never reach on_message");
    }

    fn on_close(&self, _session: &Arc<Session<Self>>, err: &SessionError) {
        if matches!(err, SessionError::OperationAborted) {
            self.saw_protocol_error.store(true, Ordering::SeqCst);
        }
    }
}

#[test]
fn negative_body_length_shuts_the_session_down() {
    let saw_protocol_error = Arc::new(AtomicBool::new(false));
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, Handler { saw_protocol_error: Arc::clone(&saw_protocol_error) });
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(&(-1i32).to_be_bytes()).unwrap();

    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "server should have closed the connection");

    std::thread::sleep(Duration::from_millis(200));
    assert!(saw_protocol_error.load(Ordering::SeqCst));

    server.stop();
}
