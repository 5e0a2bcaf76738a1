//! In-process stand-in for a Fluentd forward input.
//!
//! Each accepted connection is read until the client closes it and the raw
//! bytes are handed back over a channel, so tests can assert on exactly what
//! went over the wire.

use std::{
    io::Read,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::Duration,
};

use native_tls::{Identity, TlsAcceptor};

const CA_PEM: &[u8] = include_bytes!("../fixtures/ca.pem");
const OTHER_CA_PEM: &[u8] = include_bytes!("../fixtures/other_ca.pem");
const SERVER_CERT_PEM: &[u8] = include_bytes!("../fixtures/server.pem");
const SERVER_KEY_PEM: &[u8] = include_bytes!("../fixtures/server.key");

/// CA that signed the TLS collector's certificate.
pub fn collector_ca() -> &'static [u8] {
    CA_PEM
}

/// A CA unrelated to the TLS collector's certificate.
pub fn unrelated_ca() -> &'static [u8] {
    OTHER_CA_PEM
}

/// Handle on a running collector.
pub struct Collector {
    pub addr: SocketAddr,
    received: mpsc::Receiver<Vec<u8>>,
}

impl Collector {
    /// Wait for the payload of the next closed connection.
    pub fn next_payload(&self) -> Vec<u8> {
        self.received
            .recv_timeout(Duration::from_secs(2))
            .expect("collector should receive a payload")
    }

    /// Whether any payload arrives within `wait`.
    pub fn received_within(&self, wait: Duration) -> bool {
        self.received.recv_timeout(wait).is_ok()
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }
}

/// Accept `connections` plain TCP connections on an ephemeral port.
pub fn spawn_collector(connections: usize) -> Collector {
    spawn(connections, |mut stream| {
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).ok()?;
        Some(payload)
    })
}

/// Accept `connections` TLS connections presenting a `localhost`
/// certificate signed by [`collector_ca`]. Failed handshakes yield no
/// payload.
pub fn spawn_tls_collector(connections: usize) -> Collector {
    let identity =
        Identity::from_pkcs8(SERVER_CERT_PEM, SERVER_KEY_PEM).expect("load server identity");
    let acceptor = TlsAcceptor::new(identity).expect("build tls acceptor");
    spawn(connections, move |stream| {
        let mut stream = acceptor.accept(stream).ok()?;
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).ok()?;
        Some(payload)
    })
}

fn spawn<F>(connections: usize, read: F) -> Collector
where
    F: Fn(TcpStream) -> Option<Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener has address");
    let (tx, received) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..connections {
            let (stream, _) = listener.accept().expect("accept connection");
            let Some(payload) = read(stream) else {
                continue;
            };
            if tx.send(payload).is_err() {
                return;
            }
        }
    });
    Collector { addr, received }
}
