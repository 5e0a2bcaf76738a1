//! Tag bytes understood by [`PackedBuffer`](super::PackedBuffer).
//!
//! Only the MessagePack families needed by the forward protocol are
//! represented. Anything else (bin, ext, 16/32-bit containers and strings)
//! is rejected by [`Tag::from_byte`].

/// Largest element count representable by a fixarray or fixmap header.
pub const FIX_CONTAINER_MAX: usize = 0x0f;
/// Largest byte length representable by a fixstr header.
pub const FIXSTR_MAX: usize = 0x1f;
/// Largest byte length representable by a str8 header.
pub const STR8_MAX: usize = 0xff;
/// Largest value encoded as a positive fixnum literal.
pub const POSITIVE_FIXNUM_MAX: u32 = 0x7f;
/// Smallest value encoded as a negative fixnum literal.
pub const NEGATIVE_FIXNUM_MIN: i32 = -32;

const FIXMAP: u8 = 0x80;
const FIXARRAY: u8 = 0x90;
const FIXSTR: u8 = 0xa0;
const NEGATIVE_FIXNUM: u8 = 0xe0;

/// Closed set of tags emitted by the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    /// `0x00..=0x7f`: the byte is the value.
    PositiveFixnum(u8),
    /// `0x80 | n`, n in `0..=15`.
    FixMap(u8),
    /// `0x90 | n`, n in `0..=15`.
    FixArray(u8),
    /// `0xa0 | n`, n in `0..=31`.
    FixStr(u8),
    Nil,
    False,
    True,
    Float32,
    Float64,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Str8,
    /// `0xe0..=0xff`: the byte reinterpreted as `i8` is the value.
    NegativeFixnum(i8),
}

impl Tag {
    /// Encode the tag as its wire byte.
    ///
    /// Embedded counts are masked to their family's width; callers validate
    /// bounds before constructing the tag.
    pub const fn to_byte(self) -> u8 {
        match self {
            Tag::PositiveFixnum(v) => v & 0x7f,
            Tag::FixMap(n) => FIXMAP | (n & 0x0f),
            Tag::FixArray(n) => FIXARRAY | (n & 0x0f),
            Tag::FixStr(n) => FIXSTR | (n & 0x1f),
            Tag::Nil => 0xc0,
            Tag::False => 0xc2,
            Tag::True => 0xc3,
            Tag::Float32 => 0xca,
            Tag::Float64 => 0xcb,
            Tag::U8 => 0xcc,
            Tag::U16 => 0xcd,
            Tag::U32 => 0xce,
            Tag::U64 => 0xcf,
            Tag::I8 => 0xd0,
            Tag::I16 => 0xd1,
            Tag::I32 => 0xd2,
            Tag::I64 => 0xd3,
            Tag::Str8 => 0xd9,
            Tag::NegativeFixnum(v) => v as u8,
        }
    }

    /// Classify a wire byte. Returns `None` for families outside the subset.
    pub const fn from_byte(byte: u8) -> Option<Tag> {
        let tag = match byte {
            0x00..=0x7f => Tag::PositiveFixnum(byte),
            0x80..=0x8f => Tag::FixMap(byte & 0x0f),
            0x90..=0x9f => Tag::FixArray(byte & 0x0f),
            0xa0..=0xbf => Tag::FixStr(byte & 0x1f),
            0xc0 => Tag::Nil,
            0xc2 => Tag::False,
            0xc3 => Tag::True,
            0xca => Tag::Float32,
            0xcb => Tag::Float64,
            0xcc => Tag::U8,
            0xcd => Tag::U16,
            0xce => Tag::U32,
            0xcf => Tag::U64,
            0xd0 => Tag::I8,
            0xd1 => Tag::I16,
            0xd2 => Tag::I32,
            0xd3 => Tag::I64,
            0xd9 => Tag::Str8,
            NEGATIVE_FIXNUM..=0xff => Tag::NegativeFixnum(byte as i8),
            _ => return None,
        };
        Some(tag)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.to_byte()
    }
}
