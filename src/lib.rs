//! Compact log forwarding for small devices.
//!
//! `femtofluent` encodes log entries into a fixed-size MessagePack buffer
//! and ships them to a Fluentd-compatible collector in forward protocol
//! message mode, over plain TCP or TLS.
//!
//! ```no_run
//! use femtofluent::{ForwardClientBuilder, PackedBuffer, SystemClock};
//!
//! let mut client = ForwardClientBuilder::new()
//!     .with_endpoint("127.0.0.1", 24224)
//!     .build()?
//!     .with_clock(SystemClock);
//! client.log("device.boot", "hello")?;
//!
//! let mut record = PackedBuffer::new(64);
//! record.start_map(2)?;
//! record.map("temp", 21.5f32)?;
//! record.map("door", "open")?;
//! client.log("device.sensor", &record)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod file_config;
pub mod forward;
pub mod packer;
pub mod rate_limited_warner;

pub use file_config::{builder_from_ini_file, builder_from_ini_str};
pub use forward::{
    BuildError, Clock, ForwardClient, ForwardClientBuilder, ForwardConfig, ForwardError, Record,
    SharedForwardClient, SocketTransport, SystemClock, TlsSessionPolicy, Transport,
    TransportError, TransportKind, TransportOp,
};
pub use packer::{DEFAULT_BUFFER_SIZE, MapValue, PackError, PackedBuffer, Tag};
