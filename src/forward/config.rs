//! Configuration consumed by the forward client.
//!
//! [`ForwardClientBuilder`](super::ForwardClientBuilder) validates these
//! values before the client is constructed; after that they never change.

use std::time::Duration;

use native_tls::Certificate;

use crate::{packer::DEFAULT_BUFFER_SIZE, rate_limited_warner::DEFAULT_WARN_INTERVAL};

/// Default port of a Fluentd forward input.
pub const DEFAULT_PORT: u16 = 24224;
/// Default bound on each blocking transport step.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Which transport family the client speaks.
#[derive(Clone)]
pub enum TransportKind {
    /// Plain TCP; the connection lives for one entry.
    Plain,
    /// TLS over TCP, trusting only `ca` when it is set.
    Tls { ca: Option<Certificate> },
}

impl TransportKind {
    pub fn is_tls(&self) -> bool {
        matches!(self, TransportKind::Tls { .. })
    }
}

impl std::fmt::Debug for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Plain => f.write_str("Plain"),
            TransportKind::Tls { ca } => f
                .debug_struct("Tls")
                .field("pinned_ca", &ca.is_some())
                .finish(),
        }
    }
}

/// How a TLS session is managed between entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsSessionPolicy {
    /// Keep one session open across entries. Open and connect failures are
    /// returned to the caller, and a failed send closes the session so the
    /// next entry reconnects.
    #[default]
    Persistent,
    /// Legacy behaviour: open and connect failures are only counted and
    /// warned about, the send is attempted regardless and its result
    /// returned, and the session is never closed by `log`.
    Lenient,
}

impl std::str::FromStr for TlsSessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown tls policy {other:?}")),
        }
    }
}

/// Collector endpoint and client tuning.
#[derive(Clone, Debug)]
pub struct ForwardConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub buffer_size: usize,
    pub transport: TransportKind,
    pub tls_policy: TlsSessionPolicy,
    pub warn_interval: Duration,
}

/// Defaults point at a local Fluentd over plain TCP.
impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            transport: TransportKind::Plain,
            tls_policy: TlsSessionPolicy::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl ForwardConfig {
    /// Point the configuration at `host:port`.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Override the transport family.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }
}
