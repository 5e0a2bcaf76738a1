//! The forward client: one encode buffer, one transport, one entry per call.

use log::{debug, warn};

use crate::{packer::PackedBuffer, rate_limited_warner::RateLimitedWarner};

use super::{
    clock::Clock,
    config::{ForwardConfig, TlsSessionPolicy},
    entry::{Record, encode_entry},
    error::{ForwardError, TransportError, TransportOp},
    transport::{SocketTransport, Transport},
};

/// Ships entries to a Fluentd-compatible collector.
///
/// The client exclusively owns its encode buffer and transport handle and
/// is not meant to be shared between threads without a lock; see
/// [`SharedForwardClient`](super::SharedForwardClient).
///
/// Every call to [`log`](Self::log) encodes the entry first, so an entry
/// that does not fit never reaches the transport. Delivery then follows the
/// transport family:
///
/// * plain TCP opens, connects, sends and closes for each entry; a failed
///   send still closes and returns the send error;
/// * TLS keeps its session between entries and is governed by
///   [`TlsSessionPolicy`].
///
/// A close failure after a delivered plain entry is logged, not returned,
/// so callers never resend an entry the collector already has.
pub struct ForwardClient<T: Transport = SocketTransport> {
    config: ForwardConfig,
    transport: T,
    packer: PackedBuffer,
    clock: Option<Box<dyn Clock>>,
    session_established: bool,
    warner: RateLimitedWarner,
}

impl ForwardClient<SocketTransport> {
    /// Build a client using the socket transport described by `config`.
    pub fn from_config(config: ForwardConfig) -> Self {
        let transport = SocketTransport::from_config(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ForwardClient<T> {
    /// Build a client around an explicit transport.
    pub fn with_transport(config: ForwardConfig, transport: T) -> Self {
        let packer = PackedBuffer::new(config.buffer_size);
        let warner = RateLimitedWarner::new(config.warn_interval);
        Self {
            config,
            transport,
            packer,
            clock: None,
            session_established: false,
            warner,
        }
    }

    /// Stamp entries with `clock`. Without a clock every entry carries 0.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn set_clock(&mut self, clock: Option<Box<dyn Clock>>) {
        self.clock = clock;
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    /// The most recently encoded entry.
    pub fn buffer(&self) -> &PackedBuffer {
        &self.packer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Discard the encoded entry held in the buffer.
    pub fn reset(&mut self) {
        self.packer.reset();
    }

    /// Encode `[tag, now, record]` and deliver it.
    ///
    /// `record` is either text or a pre-encoded value such as another
    /// [`PackedBuffer`].
    pub fn log<'a>(
        &mut self,
        tag: &str,
        record: impl Into<Record<'a>>,
    ) -> Result<(), ForwardError> {
        let time = self.clock.as_ref().map_or(0, |clock| clock.now());
        encode_entry(&mut self.packer, tag, time, record.into()).inspect_err(|err| {
            warn!("ForwardClient could not encode entry for tag {tag:?}: {err}");
        })?;
        if self.transport.is_tls() {
            self.deliver_tls()
        } else {
            self.deliver_plain()
        }
    }

    /// Open and connect the transport ahead of the first entry.
    ///
    /// Only TLS sessions outlive a single entry, so this is a no-op for the
    /// plain transport, which connects inside every [`log`](Self::log).
    pub fn open(&mut self) -> Result<(), ForwardError> {
        if !self.transport.is_tls() || self.session_established {
            return Ok(());
        }
        self.establish()?;
        self.session_established = true;
        Ok(())
    }

    /// Tear down the transport handle.
    pub fn close(&mut self) -> Result<(), ForwardError> {
        self.session_established = false;
        self.transport.close().inspect_err(|err| {
            warn!("ForwardClient could not close transport: {err}");
        })?;
        Ok(())
    }

    /// Report suppressed TLS failures that are still waiting for the rate
    /// limit interval to pass.
    pub fn flush_warnings(&self) {
        self.warner.flush(|count| {
            warn!("ForwardClient suppressed {count} TLS open/connect failures");
        });
    }

    fn deliver_plain(&mut self) -> Result<(), ForwardError> {
        self.establish()?;
        let sent = self.send_buffer();
        let closed = self.transport.close();
        sent?;
        // The entry was delivered; a failed close must not invite a resend.
        if let Err(err) = closed {
            warn!("ForwardClient could not close transport after send: {err}");
        }
        debug!("ForwardClient sent {} bytes", self.packer.len());
        Ok(())
    }

    fn deliver_tls(&mut self) -> Result<(), ForwardError> {
        match self.config.tls_policy {
            TlsSessionPolicy::Persistent => self.deliver_tls_persistent(),
            TlsSessionPolicy::Lenient => self.deliver_tls_lenient(),
        }
    }

    fn deliver_tls_persistent(&mut self) -> Result<(), ForwardError> {
        if !self.session_established {
            self.establish()?;
            self.session_established = true;
        }
        if let Err(err) = self.send_buffer() {
            self.session_established = false;
            if let Err(close_err) = self.transport.close() {
                debug!("ForwardClient ignored close error after failed send: {close_err}");
            }
            return Err(err.into());
        }
        debug!("ForwardClient sent {} bytes over TLS", self.packer.len());
        Ok(())
    }

    fn deliver_tls_lenient(&mut self) -> Result<(), ForwardError> {
        if !self.session_established {
            if let Err(err) = self.transport.open() {
                self.suppress(TransportOp::Open, &err);
            }
            match self.transport.connect(&self.config.host, self.config.port) {
                Ok(()) | Err(TransportError::AlreadyConnected) => self.session_established = true,
                Err(err) => self.suppress(TransportOp::Connect, &err),
            }
        }
        if let Err(err) = self.send_buffer() {
            self.session_established = false;
            return Err(err.into());
        }
        debug!("ForwardClient sent {} bytes over TLS", self.packer.len());
        Ok(())
    }

    fn establish(&mut self) -> Result<(), TransportError> {
        self.transport.open().inspect_err(|err| {
            warn!("ForwardClient could not open transport: {err}");
        })?;
        self.transport
            .connect(&self.config.host, self.config.port)
            .inspect_err(|err| {
                warn!(
                    "ForwardClient could not connect to {}:{}: {err}",
                    self.config.host, self.config.port
                );
            })
    }

    fn send_buffer(&mut self) -> Result<(), TransportError> {
        self.transport
            .send(self.packer.as_bytes())
            .inspect_err(|err| warn!("ForwardClient send failed: {err}"))
    }

    fn suppress(&self, op: TransportOp, err: &TransportError) {
        if matches!(err, TransportError::AlreadyOpen) {
            debug!("ForwardClient reusing TLS handle left open by an earlier entry");
            return;
        }
        debug!("ForwardClient ignoring TLS {op} failure: {err}");
        self.warner.record();
        self.warner.warn_if_due(|count| {
            warn!("ForwardClient suppressed {count} TLS open/connect failures; last: {err}");
        });
    }
}

impl<T: Transport> std::fmt::Debug for ForwardClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("tls", &self.transport.is_tls())
            .field("buffer", &self.packer)
            .finish()
    }
}
