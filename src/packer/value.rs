//! Values accepted by [`PackedBuffer::map`](super::PackedBuffer::map).

/// Scalar value paired with a string key.
///
/// Each variant keeps the width it was given: `U8`, `U16`, `I8` and `I16`
/// always use their explicit tagged form, while `U32` and `I32` pick the
/// smallest encoding that holds the value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MapValue<'a> {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    Float(f32),
    Double(f64),
    Str(&'a str),
}

macro_rules! map_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MapValue<'_> {
                fn from(value: $ty) -> Self {
                    MapValue::$variant(value)
                }
            }
        )*
    };
}

map_value_from!(
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    f32 => Float,
    f64 => Double,
);

impl<'a> From<&'a str> for MapValue<'a> {
    fn from(value: &'a str) -> Self {
        MapValue::Str(value)
    }
}

impl<'a> From<&'a String> for MapValue<'a> {
    fn from(value: &'a String) -> Self {
        MapValue::Str(value.as_str())
    }
}
