//! Builder for [`ForwardClient`](super::ForwardClient).
//!
//! Collects the endpoint, transport family, TLS material and tuning knobs,
//! validates them, and produces either a [`ForwardConfig`] or a ready
//! client backed by [`SocketTransport`].

use std::{fs, io, path::Path, time::Duration};

use native_tls::Certificate;
use thiserror::Error;

use super::{
    client::ForwardClient,
    config::{ForwardConfig, TlsSessionPolicy, TransportKind},
    transport::SocketTransport,
};

/// Errors that may occur while building a client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid forward client configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst reading configuration material.
    #[error(transparent)]
    Io(#[from] io::Error),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    ca_pem: Option<Vec<u8>>,
}

/// Builder for constructing [`ForwardClient`] instances.
#[derive(Clone, Debug, Default)]
pub struct ForwardClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<TlsConfig>,
    connect_timeout_ms: Option<u64>,
    buffer_size: Option<usize>,
    tls_policy: Option<TlsSessionPolicy>,
    warn_interval_ms: Option<u64>,
}

impl ForwardClientBuilder {
    /// Create a builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send entries to `host:port`.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Send entries to `host` on the default forward port.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    option_setter!(with_port, port, u16);

    /// Wrap the connection in TLS using the platform trust store.
    pub fn with_tls(mut self) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default);
        self
    }

    /// Wrap the connection in TLS and trust only the PEM encoded CA.
    pub fn with_tls_ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.tls = Some(TlsConfig {
            ca_pem: Some(pem.into()),
        });
        self
    }

    /// Wrap the connection in TLS and trust only the CA stored at `path`.
    pub fn with_tls_ca_file(self, path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let pem = fs::read(path).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("failed to read CA file {}: {err}", path.display()),
            )
        })?;
        Ok(self.with_tls_ca_pem(pem))
    }

    option_setter!(
        #[doc = "Bound each blocking transport step, in milliseconds."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the encode buffer capacity in bytes."]
        with_buffer_size,
        buffer_size,
        usize
    );
    option_setter!(with_tls_policy, tls_policy, TlsSessionPolicy);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_endpoint()?;
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(size) = self.buffer_size {
            ensure_positive!(size, "buffer_size")?;
        }
        if self.tls_policy.is_some() && self.tls.is_none() {
            return Err(BuildError::InvalidConfig(
                "tls_policy requires a tls transport".into(),
            ));
        }
        Ok(())
    }

    fn validate_endpoint(&self) -> Result<(), BuildError> {
        match self.host.as_deref() {
            None => Err(BuildError::InvalidConfig(
                "forward client requires a host".into(),
            )),
            Some(host) if host.trim().is_empty() => Err(BuildError::InvalidConfig(
                "host must not be empty".into(),
            )),
            Some(_) => {
                if let Some(port) = self.port {
                    ensure_positive!(port, "port")?;
                }
                Ok(())
            }
        }
    }

    fn build_transport_kind(&self) -> Result<TransportKind, BuildError> {
        let Some(tls) = &self.tls else {
            return Ok(TransportKind::Plain);
        };
        let ca = tls
            .ca_pem
            .as_deref()
            .map(Certificate::from_pem)
            .transpose()
            .map_err(|err| BuildError::InvalidConfig(format!("invalid CA certificate: {err}")))?;
        Ok(TransportKind::Tls { ca })
    }

    /// Validate the settings and produce the configuration.
    pub fn build_config(&self) -> Result<ForwardConfig, BuildError> {
        self.validate()?;
        let mut config = ForwardConfig::default();
        if let Some(host) = &self.host {
            config.host = host.trim().to_owned();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(policy) = self.tls_policy {
            config.tls_policy = policy;
        }
        if let Some(interval) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(interval);
        }
        config.transport = self.build_transport_kind()?;
        Ok(config)
    }

    /// Build a client backed by [`SocketTransport`].
    pub fn build(&self) -> Result<ForwardClient<SocketTransport>, BuildError> {
        let config = self.build_config()?;
        Ok(ForwardClient::from_config(config))
    }
}
