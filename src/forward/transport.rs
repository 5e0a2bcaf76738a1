//! Transport primitives for the forward client.
//!
//! A [`Transport`] exposes the four blocking steps the client drives for
//! each entry: `open`, `connect`, `send` and `close`. [`SocketTransport`] is
//! the production implementation, a tagged union over plain TCP and TLS.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{Certificate, TlsConnector, TlsStream};

use super::{
    config::{ForwardConfig, TransportKind},
    error::{TransportError, TransportOp},
};

/// Blocking connection lifecycle used by the forward client.
pub trait Transport: Send {
    /// Allocate the handle. Fails if it is already open.
    fn open(&mut self) -> Result<(), TransportError>;
    /// Connect an open handle to `host:port`. A failed attempt releases the
    /// handle, so the next entry starts again from `open`.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;
    /// Write `bytes` as one contiguous payload.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    /// Release the handle and any connection it holds.
    fn close(&mut self) -> Result<(), TransportError>;
    /// Whether this transport wraps its connection in TLS.
    fn is_tls(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        (**self).connect(host, port)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_tls(&self) -> bool {
        (**self).is_tls()
    }
}

/// Handle state shared by both socket flavours.
enum Handle<S> {
    Closed,
    Open,
    Connected(S),
}

impl<S> Handle<S> {
    fn open(&mut self) -> Result<(), TransportError> {
        match self {
            Handle::Closed => {
                *self = Handle::Open;
                Ok(())
            }
            _ => Err(TransportError::AlreadyOpen),
        }
    }

    fn ensure_connectable(&self) -> Result<(), TransportError> {
        match self {
            Handle::Closed => Err(TransportError::NotOpen),
            Handle::Open => Ok(()),
            Handle::Connected(_) => Err(TransportError::AlreadyConnected),
        }
    }

    fn stream(&mut self) -> Result<&mut S, TransportError> {
        match self {
            Handle::Closed => Err(TransportError::NotOpen),
            Handle::Open => Err(TransportError::NotConnected),
            Handle::Connected(stream) => Ok(stream),
        }
    }

    fn take(&mut self) -> Result<Option<S>, TransportError> {
        match std::mem::replace(self, Handle::Closed) {
            Handle::Closed => Err(TransportError::NotOpen),
            Handle::Open => Ok(None),
            Handle::Connected(stream) => Ok(Some(stream)),
        }
    }
}

fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|iter| iter.collect())
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = socket_addrs(host, port)?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {host}:{port}"),
        )
    }))
}

fn write_payload<W: Write>(stream: &mut W, bytes: &[u8]) -> Result<(), TransportError> {
    stream
        .write_all(bytes)
        .and_then(|()| stream.flush())
        .map_err(|err| TransportError::io(TransportOp::Send, err))
}

/// Plain TCP transport.
pub struct TcpTransport {
    timeout: Duration,
    handle: Handle<TcpStream>,
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            handle: Handle::Closed,
        }
    }
}

impl Transport for TcpTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.handle.open()
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.handle.ensure_connectable()?;
        match connect_tcp(host, port, self.timeout) {
            Ok(stream) => {
                self.handle = Handle::Connected(stream);
                Ok(())
            }
            Err(err) => {
                self.handle = Handle::Closed;
                Err(TransportError::io(TransportOp::Connect, err))
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_payload(self.handle.stream()?, bytes)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.handle.take()? {
            Some(stream) => stream
                .shutdown(Shutdown::Both)
                .or_else(ignore_not_connected)
                .map_err(|err| TransportError::io(TransportOp::Close, err)),
            None => Ok(()),
        }
    }

    fn is_tls(&self) -> bool {
        false
    }
}

/// A peer that already hung up leaves nothing to shut down.
fn ignore_not_connected(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotConnected {
        Ok(())
    } else {
        Err(err)
    }
}

/// TLS transport that optionally trusts a single pinned CA certificate.
pub struct TlsTransport {
    timeout: Duration,
    ca: Option<Certificate>,
    connector: Option<TlsConnector>,
    handle: Handle<TlsStream<TcpStream>>,
}

impl TlsTransport {
    /// Create a TLS transport. When `ca` is set, the built-in roots are
    /// disabled and only that certificate is trusted.
    pub fn new(ca: Option<Certificate>, timeout: Duration) -> Self {
        Self {
            timeout,
            ca,
            connector: None,
            handle: Handle::Closed,
        }
    }

    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if let Some(ca) = &self.ca {
            builder.add_root_certificate(ca.clone());
            builder.disable_built_in_roots(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

impl Transport for TlsTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if !matches!(self.handle, Handle::Closed) {
            return Err(TransportError::AlreadyOpen);
        }
        let connector = self
            .connector()
            .map_err(|err| TransportError::io(TransportOp::Open, err))?;
        self.connector = Some(connector);
        self.handle.open()
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.handle.ensure_connectable()?;
        let connector = self.connector.as_ref().ok_or(TransportError::NotOpen)?;
        let handshake = || -> io::Result<TlsStream<TcpStream>> {
            let stream = connect_tcp(host, port, self.timeout)?;
            stream.set_read_timeout(Some(self.timeout))?;
            let stream = connector.connect(host, stream).map_err(io::Error::other)?;
            stream.get_ref().set_read_timeout(None)?;
            Ok(stream)
        };
        match handshake() {
            Ok(stream) => {
                self.handle = Handle::Connected(stream);
                Ok(())
            }
            Err(err) => {
                self.handle = Handle::Closed;
                self.connector = None;
                Err(TransportError::io(TransportOp::Connect, err))
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_payload(self.handle.stream()?, bytes)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.connector = None;
        match self.handle.take()? {
            Some(mut stream) => stream
                .shutdown()
                .or_else(ignore_not_connected)
                .map_err(|err| TransportError::io(TransportOp::Close, err)),
            None => Ok(()),
        }
    }

    fn is_tls(&self) -> bool {
        true
    }
}

/// Socket transport selected by [`TransportKind`].
pub enum SocketTransport {
    Plain(TcpTransport),
    Tls(TlsTransport),
}

impl SocketTransport {
    /// Build the transport described by `config`.
    pub fn from_config(config: &ForwardConfig) -> Self {
        match &config.transport {
            TransportKind::Plain => SocketTransport::Plain(TcpTransport::new(config.connect_timeout)),
            TransportKind::Tls { ca } => {
                SocketTransport::Tls(TlsTransport::new(ca.clone(), config.connect_timeout))
            }
        }
    }
}

impl Transport for SocketTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        match self {
            SocketTransport::Plain(t) => t.open(),
            SocketTransport::Tls(t) => t.open(),
        }
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        match self {
            SocketTransport::Plain(t) => t.connect(host, port),
            SocketTransport::Tls(t) => t.connect(host, port),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        match self {
            SocketTransport::Plain(t) => t.send(bytes),
            SocketTransport::Tls(t) => t.send(bytes),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self {
            SocketTransport::Plain(t) => t.close(),
            SocketTransport::Tls(t) => t.close(),
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self, SocketTransport::Tls(_))
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketTransport::Plain(_) => f.write_str("SocketTransport::Plain"),
            SocketTransport::Tls(_) => f.write_str("SocketTransport::Tls"),
        }
    }
}
