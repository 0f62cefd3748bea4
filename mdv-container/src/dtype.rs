use std::fmt::{Display, Formatter};

use mdv_error::{MdvResult, mdv_bail};

/// The physical element type of a stored dataset.
///
/// All numeric types are stored little-endian. [`DType::Utf8`] holds fixed-width UTF-8 strings,
/// NUL padded to the given width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 32-bit integer.
    I32,
    /// IEEE-754 single precision float.
    F32,
    /// Fixed-width UTF-8 string of the given byte width.
    Utf8(u32),
}

impl DType {
    /// The tag persisted in a dataset header.
    pub fn tag(&self) -> u8 {
        match self {
            DType::U8 => 1,
            DType::U16 => 2,
            DType::U32 => 3,
            DType::U64 => 4,
            DType::I32 => 5,
            DType::F32 => 6,
            DType::Utf8(_) => 7,
        }
    }

    /// Reconstruct a dtype from a persisted tag and element width.
    pub fn from_tag(tag: u8, width: u32) -> MdvResult<Self> {
        let dtype = match tag {
            1 => DType::U8,
            2 => DType::U16,
            3 => DType::U32,
            4 => DType::U64,
            5 => DType::I32,
            6 => DType::F32,
            7 => DType::Utf8(width),
            _ => mdv_bail!(Consistency: "unknown dataset dtype tag {tag}"),
        };
        if dtype.byte_width() != width as usize {
            mdv_bail!(
                Consistency: "dataset header declares width {width} for dtype {dtype}"
            );
        }
        Ok(dtype)
    }

    /// The number of bytes a single element occupies.
    pub fn byte_width(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::U16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 => 8,
            DType::Utf8(width) => *width as usize,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::U8 => write!(f, "u8"),
            DType::U16 => write!(f, "u16"),
            DType::U32 => write!(f, "u32"),
            DType::U64 => write!(f, "u64"),
            DType::I32 => write!(f, "i32"),
            DType::F32 => write!(f, "f32"),
            DType::Utf8(width) => write!(f, "utf8[{width}]"),
        }
    }
}
