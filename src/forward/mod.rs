//! Fluentd forward protocol client.
//!
//! [`ForwardClient`] encodes each log entry as a message-mode array
//! `[tag, time, record]` into its bounded [`PackedBuffer`] and hands the
//! bytes to a [`Transport`] in one contiguous write. The production
//! transport, [`SocketTransport`], speaks plain TCP or TLS with an optional
//! pinned CA certificate; tests substitute their own implementations.
//!
//! [`PackedBuffer`]: crate::packer::PackedBuffer

mod builder;
mod client;
mod clock;
mod config;
mod entry;
mod error;
mod shared;
mod transport;

#[cfg(test)]
mod tests;

pub use builder::{BuildError, ForwardClientBuilder};
pub use client::ForwardClient;
pub use clock::{Clock, SystemClock};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, ForwardConfig, TlsSessionPolicy, TransportKind,
};
pub use entry::{ENTRY_ARITY, Record, encode_entry};
pub use error::{ForwardError, TransportError, TransportOp};
pub use shared::SharedForwardClient;
pub use transport::{SocketTransport, TcpTransport, TlsTransport, Transport};
