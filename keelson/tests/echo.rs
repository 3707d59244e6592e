//! Framed echo round trip against a real TCP peer, driven from a plain
//! `std::net` socket rather than a second `compio` runtime (nested
//! `compio` runtimes inside a `#[test]` body don't exit cleanly).

#![cfg(feature = "framed-mode")]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use keelson::{Server, Session, SessionError, SessionHandler};

struct Echo;

impl SessionHandler for Echo {
    fn header_length(&self) -> usize {
        4
    }

    fn body_length(&self, _session: &Arc<Session<Self>>, header: &[u8]) -> i64 {
        i32::from_be_bytes(header.try_into().unwrap()) as i64
    }

    fn on_message(&self, session: &Arc<Session<Self>>, header: &[u8], body: &[u8]) {
        let mut framed = Vec::with_capacity(header.len() + body.len());
        framed.extend_from_slice(header);
        framed.extend_from_slice(body);
        session.send(framed);
    }

    fn on_close(&self, _session: &Arc<Session<Self>>, _err: &SessionError) {}
}

fn write_frame(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(&(payload.len() as i32).to_be_bytes()).unwrap();
    stream.write_all(payload).unwrap();
}

fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let len = i32::from_be_bytes(header) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    body
}

#[test]
fn single_frame_round_trip() {
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, Echo);
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    write_frame(&mut stream, b"hello keelson");
    let reply = read_frame(&mut stream);
    assert_eq!(reply, b"hello keelson");

    assert_eq!(server.session_count(), 1);
    server.stop();
}

#[test]
fn send_queue_preserves_fifo_order() {
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, Echo);
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");

    // Write three distinct frames back to back before reading anything, so
    // the server's send queue necessarily has more than one entry queued at
    // once; the replies must still come back in the order the frames were
    // sent.
    for msg in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        write_frame(&mut stream, msg);
    }

    assert_eq!(read_frame(&mut stream), b"one");
    assert_eq!(read_frame(&mut stream), b"two");
    assert_eq!(read_frame(&mut stream), b"three");

    server.stop();
}

#[test]
fn peer_disconnect_runs_on_close_with_eof() {
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::new(port, 2, Echo);
    server.start().expect("bind");

    let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    drop(stream);

    // Give the server's reactor a moment to observe the close.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(server.session_count(), 0);

    server.stop();
}
