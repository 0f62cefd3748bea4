use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::native::{from_le_bytes, to_le_bytes};
use crate::DType;

/// Fixed-width UTF-8 strings, each NUL padded to `width` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStrings {
    width: u32,
    len: usize,
    data: Vec<u8>,
}

impl FixedStrings {
    /// Pack strings into slots of `width` bytes.
    ///
    /// Fails if any string is longer than `width` bytes.
    pub fn try_from_strs<S: AsRef<str>>(values: &[S], width: u32) -> MdvResult<Self> {
        let slot = width as usize;
        let mut data = vec![0u8; values.len() * slot];
        for (i, value) in values.iter().enumerate() {
            let bytes = value.as_ref().as_bytes();
            if bytes.len() > slot {
                mdv_bail!(
                    Encoding: "string of {} bytes does not fit width {width}",
                    bytes.len()
                );
            }
            data[i * slot..i * slot + bytes.len()].copy_from_slice(bytes);
        }
        Ok(Self {
            width,
            len: values.len(),
            data,
        })
    }

    /// Wrap raw padded bytes. `data.len()` must equal `len * width`.
    pub fn try_from_raw(width: u32, len: usize, data: Vec<u8>) -> MdvResult<Self> {
        if data.len() != len * width as usize {
            mdv_bail!(
                "fixed string buffer of {} bytes cannot hold {len} strings of width {width}",
                data.len()
            );
        }
        Ok(Self { width, len, data })
    }

    /// Width of each slot in bytes.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no strings.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The padded backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The string at `index` with its NUL padding removed.
    pub fn get(&self, index: usize) -> MdvResult<&str> {
        if index >= self.len {
            mdv_bail!(NotFound: "string index {index} out of bounds for length {}", self.len);
        }
        let slot = self.width as usize;
        let raw = &self.data[index * slot..(index + 1) * slot];
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        std::str::from_utf8(&raw[..end])
            .map_err(|e| mdv_err!(Encoding: "invalid utf-8 in string {index}: {e}"))
    }

    /// Iterate over all strings with padding removed.
    pub fn iter(&self) -> impl Iterator<Item = MdvResult<&str>> + '_ {
        (0..self.len).map(|i| self.get(i))
    }
}

/// An in-memory typed array as read from or written to a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    Utf8(FixedStrings),
}

impl TypedArray {
    pub fn dtype(&self) -> DType {
        match self {
            TypedArray::U8(_) => DType::U8,
            TypedArray::U16(_) => DType::U16,
            TypedArray::U32(_) => DType::U32,
            TypedArray::U64(_) => DType::U64,
            TypedArray::I32(_) => DType::I32,
            TypedArray::F32(_) => DType::F32,
            TypedArray::Utf8(s) => DType::Utf8(s.width()),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            TypedArray::U8(v) => v.len(),
            TypedArray::U16(v) => v.len(),
            TypedArray::U32(v) => v.len(),
            TypedArray::U64(v) => v.len(),
            TypedArray::I32(v) => v.len(),
            TypedArray::F32(v) => v.len(),
            TypedArray::Utf8(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The little-endian payload exactly as it is laid out on disk.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TypedArray::U8(v) => v.clone(),
            TypedArray::U16(v) => to_le_bytes(v),
            TypedArray::U32(v) => to_le_bytes(v),
            TypedArray::U64(v) => to_le_bytes(v),
            TypedArray::I32(v) => to_le_bytes(v),
            TypedArray::F32(v) => to_le_bytes(v),
            TypedArray::Utf8(s) => s.as_bytes().to_vec(),
        }
    }

    /// Rebuild an array from its on-disk payload.
    pub fn from_le_bytes(dtype: DType, len: usize, bytes: &[u8]) -> MdvResult<Self> {
        if bytes.len() != len * dtype.byte_width() {
            mdv_bail!(
                Consistency: "payload of {} bytes does not hold {len} elements of {dtype}",
                bytes.len()
            );
        }
        Ok(match dtype {
            DType::U8 => TypedArray::U8(bytes.to_vec()),
            DType::U16 => TypedArray::U16(from_le_bytes(bytes)),
            DType::U32 => TypedArray::U32(from_le_bytes(bytes)),
            DType::U64 => TypedArray::U64(from_le_bytes(bytes)),
            DType::I32 => TypedArray::I32(from_le_bytes(bytes)),
            DType::F32 => TypedArray::F32(from_le_bytes(bytes)),
            DType::Utf8(width) => {
                TypedArray::Utf8(FixedStrings::try_from_raw(width, len, bytes.to_vec())?)
            }
        })
    }
}
