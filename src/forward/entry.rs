//! Forward protocol entry encoding.
//!
//! Message mode sends one array per write: `[tag, time, record]`.

use crate::packer::{PackError, PackedBuffer};

/// Number of elements in a message-mode entry.
pub const ENTRY_ARITY: usize = 3;

/// The record element of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Record<'a> {
    /// Encoded as a MessagePack string.
    Text(&'a str),
    /// An already encoded value, spliced in verbatim.
    Packed(&'a [u8]),
}

impl<'a> From<&'a str> for Record<'a> {
    fn from(text: &'a str) -> Self {
        Record::Text(text)
    }
}

impl<'a> From<&'a String> for Record<'a> {
    fn from(text: &'a String) -> Self {
        Record::Text(text.as_str())
    }
}

impl<'a> From<&'a PackedBuffer> for Record<'a> {
    fn from(packed: &'a PackedBuffer) -> Self {
        Record::Packed(packed.as_bytes())
    }
}

/// Reset `packer` and encode `[tag, time, record]` into it.
pub fn encode_entry(
    packer: &mut PackedBuffer,
    tag: &str,
    time: u32,
    record: Record<'_>,
) -> Result<(), PackError> {
    packer.reset();
    packer.start_array(ENTRY_ARITY)?;
    packer.write_str(tag)?;
    packer.write_unsigned(time)?;
    match record {
        Record::Text(text) => packer.write_str(text),
        Record::Packed(bytes) => packer.write_raw(bytes),
    }
}
