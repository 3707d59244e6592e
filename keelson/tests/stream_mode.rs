//! Stream-mode `on_recv` reports how many bytes it actually consumed, and
//! the session leaves the rest buffered rather than discarding it — a
//! message split across two separate socket writes still reassembles
//! correctly across two `on_recv` calls.
#![cfg(feature = "stream-mode")]

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keelson::{RecvAction, Server, Session, SessionError, SessionHandler};

/// Assembles newline-terminated lines out of an arbitrarily chunked byte
/// stream, the way a handler with no framing would have to.
struct LineAssembler {
    lines: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SessionHandler for LineAssembler {
    fn on_recv(&self, _session: &Arc<Session<Self>>, data: &[u8]) -> RecvAction {
        match data.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.lines.lock().unwrap().push(data[..pos].to_vec());
                RecvAction::Success { consumed: pos + 1 }
            }
            None => RecvAction::Continue { consumed: 0 },
        }
    }

    fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {}
}

#[test]
fn split_write_reassembles_across_two_reads() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, LineAssembler { lines: Arc::clone(&lines) });
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    // Split "hello world\n" across two writes separated by a pause, so the
    // first read leaves an unterminated, unconsumed partial line sitting in
    // the session's receive buffer.
    stream.write_all(b"hello ").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    stream.write_all(b"world\n").unwrap();

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(lines.lock().unwrap().as_slice(), &[b"hello world".to_vec()]);

    server.stop();
}

#[test]
fn two_lines_in_one_write_are_both_assembled_in_order() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, LineAssembler { lines: Arc::clone(&lines) });
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(b"one\ntwo\n").unwrap();

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(lines.lock().unwrap().as_slice(), &[b"one".to_vec(), b"two".to_vec()]);

    server.stop();
}
