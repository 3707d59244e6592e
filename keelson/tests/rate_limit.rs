//! A send-rate limit on the server side measurably paces an echoed reply;
//! a large single frame takes noticeably longer to come back than the
//! payload size alone would explain at loopback speed.

#![cfg(feature = "framed-mode")]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keelson::{Server, Session, SessionError, SessionHandler};
use keelson_core::options::SessionOptions;

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

#[test]
fn rate_limited_echo_takes_multiple_windows() {
    const LIMIT: u32 = 4000; // bytes/sec
    const BODY_LEN: usize = LIMIT as usize * 3; // should take ~3 one-second windows

    let options = SessionOptions::new().with_send_rate_limit(LIMIT);
    let port = portpicker::pick_unused_port().expect("no free port");
    let server = Server::with_options(port, Echo, options, Default::default());
    server.start().expect("bind");

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(15))).unwrap();

    let payload = vec![0x5au8; BODY_LEN];
    let start = Instant::now();
    stream.write_all(&(BODY_LEN as i32).to_be_bytes()).unwrap();
    stream.write_all(&payload).unwrap();

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let len = i32::from_be_bytes(header) as usize;
    assert_eq!(len, BODY_LEN);

    let mut received = vec![0u8; BODY_LEN];
    stream.read_exact(&mut received).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(received, payload);
    assert!(
        elapsed >= Duration::from_millis(1500),
        "expected the rate limit to pace the reply over multiple windows, only took {elapsed:?}"
    );

    server.stop();
}
