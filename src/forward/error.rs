//! Error types surfaced by the forward client and its transports.

use std::{fmt, io};

use thiserror::Error;

use crate::packer::PackError;

/// Transport lifecycle step that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportOp {
    Open,
    Connect,
    Send,
    Close,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportOp::Open => "open",
            TransportOp::Connect => "connect",
            TransportOp::Send => "send",
            TransportOp::Close => "close",
        };
        f.write_str(s)
    }
}

/// Failures reported by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,
    #[error("transport is already open")]
    AlreadyOpen,
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport is already connected")]
    AlreadyConnected,
    /// Socket or TLS failure while performing `op`.
    #[error("{op} failed: {source}")]
    Io {
        op: TransportOp,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    pub(crate) fn io(op: TransportOp, source: io::Error) -> Self {
        Self::Io { op, source }
    }

    /// The underlying I/O error kind, when there is one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TransportError::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Error returned by [`ForwardClient::log`](super::ForwardClient::log).
///
/// Encoding failures are kept apart from transport failures so callers can
/// tell an oversized record from an unreachable collector.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to encode entry: {0}")]
    Encoding(#[from] PackError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ForwardError {
    pub fn is_encoding(&self) -> bool {
        matches!(self, ForwardError::Encoding(_))
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            ForwardError::Transport(err) => Some(err),
            ForwardError::Encoding(_) => None,
        }
    }
}
