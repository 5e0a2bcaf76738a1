//! Bounded MessagePack encoder.
//!
//! [`PackedBuffer`] writes a closed subset of MessagePack into a byte array
//! whose capacity is fixed at construction. The buffer never grows: every
//! call checks the remaining capacity before touching the array and fails
//! with [`PackError::Capacity`] instead of truncating. Numeric writers pick
//! the smallest canonical representation and always emit big-endian
//! payloads.
//!
//! Atomicity is per call. A failing call leaves the buffer exactly as it was
//! before the call, but headers and bodies written by earlier calls stay in
//! place, so an aborted sequence may leave an incomplete message behind until
//! [`PackedBuffer::reset`] is called.

mod tag;
mod value;


use std::fmt;

use thiserror::Error;

pub use tag::{
    FIX_CONTAINER_MAX, FIXSTR_MAX, NEGATIVE_FIXNUM_MIN, POSITIVE_FIXNUM_MAX, STR8_MAX, Tag,
};
pub use value::MapValue;

/// Capacity used when no explicit size is requested.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Errors raised while encoding into a [`PackedBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The write needs more bytes than the buffer has left.
    #[error("buffer capacity exceeded: need {needed} bytes, {remaining} remaining")]
    Capacity { needed: usize, remaining: usize },
    /// Arrays and maps are limited to the fix family.
    #[error("container of {0} elements exceeds the 15 element limit")]
    ContainerTooLarge(usize),
    /// Strings longer than the selected header can describe.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong { len: usize, max: usize },
}

/// Fixed-capacity MessagePack writer.
pub struct PackedBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl PackedBuffer {
    /// Allocate a buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Rewind the write cursor. The allocation is reused.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes written since the last reset.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Encoded bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn write_nil(&mut self) -> Result<(), PackError> {
        self.put(Tag::Nil.to_byte(), &[])
    }

    pub fn write_true(&mut self) -> Result<(), PackError> {
        self.put(Tag::True.to_byte(), &[])
    }

    pub fn write_false(&mut self) -> Result<(), PackError> {
        self.put(Tag::False.to_byte(), &[])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), PackError> {
        if value {
            self.write_true()
        } else {
            self.write_false()
        }
    }

    /// Write a fixarray header announcing `len` elements.
    pub fn start_array(&mut self, len: usize) -> Result<(), PackError> {
        let n = fix_container_len(len)?;
        self.put(Tag::FixArray(n).to_byte(), &[])
    }

    /// Write a fixmap header announcing `len` key/value pairs.
    pub fn start_map(&mut self, len: usize) -> Result<(), PackError> {
        let n = fix_container_len(len)?;
        self.put(Tag::FixMap(n).to_byte(), &[])
    }

    /// Write `value` using the narrowest unsigned form.
    ///
    /// Values up to `0x7f` become a single literal byte; larger values use
    /// uint8, uint16 or uint32. uint64 is only produced by
    /// [`write_u64`](Self::write_u64).
    pub fn write_unsigned(&mut self, value: u32) -> Result<(), PackError> {
        if value <= POSITIVE_FIXNUM_MAX {
            return self.put(Tag::PositiveFixnum(value as u8).to_byte(), &[]);
        }
        if let Ok(v) = u8::try_from(value) {
            return self.write_u8(v);
        }
        if let Ok(v) = u16::try_from(value) {
            return self.write_u16(v);
        }
        self.write_u32(value)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), PackError> {
        self.put(Tag::U8.to_byte(), &[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), PackError> {
        self.put(Tag::U16.to_byte(), &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), PackError> {
        self.put(Tag::U32.to_byte(), &value.to_be_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), PackError> {
        self.put(Tag::U64.to_byte(), &value.to_be_bytes())
    }

    /// Write `value` using the narrowest signed form.
    ///
    /// Non-negative values share the unsigned path, `-32..0` becomes a
    /// negative fixnum, anything else uses int8, int16 or int32.
    pub fn write_signed(&mut self, value: i32) -> Result<(), PackError> {
        if let Ok(unsigned) = u32::try_from(value) {
            return self.write_unsigned(unsigned);
        }
        if value >= NEGATIVE_FIXNUM_MIN {
            return self.put(Tag::NegativeFixnum(value as i8).to_byte(), &[]);
        }
        if let Ok(v) = i8::try_from(value) {
            return self.write_i8(v);
        }
        if let Ok(v) = i16::try_from(value) {
            return self.write_i16(v);
        }
        self.write_i32(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), PackError> {
        self.put(Tag::I8.to_byte(), &value.to_be_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), PackError> {
        self.put(Tag::I16.to_byte(), &value.to_be_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), PackError> {
        self.put(Tag::I32.to_byte(), &value.to_be_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), PackError> {
        self.put(Tag::I64.to_byte(), &value.to_be_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), PackError> {
        self.put(Tag::Float32.to_byte(), &value.to_be_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), PackError> {
        self.put(Tag::Float64.to_byte(), &value.to_be_bytes())
    }

    /// Write a UTF-8 string. See [`write_string`](Self::write_string).
    pub fn write_str(&mut self, value: &str) -> Result<(), PackError> {
        self.write_string(value.as_bytes())
    }

    /// Write a string body, choosing fixstr for up to 31 bytes and str8 for
    /// up to 255 bytes. Longer strings are rejected.
    pub fn write_string(&mut self, data: &[u8]) -> Result<(), PackError> {
        match data.len() {
            0..=FIXSTR_MAX => self.write_fixstr(data),
            len if len <= STR8_MAX => self.write_str8(data),
            len => Err(PackError::StringTooLong { len, max: STR8_MAX }),
        }
    }

    /// Write a string with a fixstr header.
    pub fn write_fixstr(&mut self, data: &[u8]) -> Result<(), PackError> {
        let len = data.len();
        if len > FIXSTR_MAX {
            return Err(PackError::StringTooLong {
                len,
                max: FIXSTR_MAX,
            });
        }
        self.put(Tag::FixStr(len as u8).to_byte(), data)
    }

    /// Write a string with a str8 header, even when fixstr would fit.
    pub fn write_str8(&mut self, data: &[u8]) -> Result<(), PackError> {
        let len = u8::try_from(data.len()).map_err(|_| PackError::StringTooLong {
            len: data.len(),
            max: STR8_MAX,
        })?;
        let header = [Tag::Str8.to_byte(), len];
        self.put_parts(&[&header[..], data])
    }

    /// Splice pre-encoded bytes into the buffer without a tag.
    ///
    /// The bytes are not inspected; the caller is responsible for them
    /// forming exactly one well-formed value.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), PackError> {
        self.put_parts(&[data])
    }

    /// Write a string key followed by `value`.
    ///
    /// The pair is written as a unit: if the value does not fit, the key is
    /// rolled back as well.
    pub fn map<'a>(&mut self, key: &str, value: impl Into<MapValue<'a>>) -> Result<(), PackError> {
        let mark = self.len;
        let result = self
            .write_str(key)
            .and_then(|()| self.write_map_value(value.into()));
        if result.is_err() {
            self.len = mark;
        }
        result
    }

    fn write_map_value(&mut self, value: MapValue<'_>) -> Result<(), PackError> {
        match value {
            MapValue::Bool(v) => self.write_bool(v),
            MapValue::U8(v) => self.write_u8(v),
            MapValue::U16(v) => self.write_u16(v),
            MapValue::U32(v) => self.write_unsigned(v),
            MapValue::I8(v) => self.write_i8(v),
            MapValue::I16(v) => self.write_i16(v),
            MapValue::I32(v) => self.write_signed(v),
            MapValue::Float(v) => self.write_f32(v),
            MapValue::Double(v) => self.write_f64(v),
            MapValue::Str(v) => self.write_str(v),
        }
    }

    fn put(&mut self, tag: u8, payload: &[u8]) -> Result<(), PackError> {
        self.put_parts(&[&[tag][..], payload])
    }

    /// Copy every part or nothing at all.
    fn put_parts(&mut self, parts: &[&[u8]]) -> Result<(), PackError> {
        let needed: usize = parts.iter().map(|part| part.len()).sum();
        let remaining = self.remaining();
        if needed > remaining {
            return Err(PackError::Capacity { needed, remaining });
        }
        for part in parts {
            let end = self.len + part.len();
            self.buf[self.len..end].copy_from_slice(part);
            self.len = end;
        }
        Ok(())
    }
}

impl Default for PackedBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl AsRef<[u8]> for PackedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for PackedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

fn fix_container_len(len: usize) -> Result<u8, PackError> {
    if len > FIX_CONTAINER_MAX {
        return Err(PackError::ContainerTooLarge(len));
    }
    Ok(len as u8)
}
