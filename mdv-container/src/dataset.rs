use std::fs::File;
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use memmap2::Mmap;
use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::header::{DatasetHeader, HEADER_SIZE};
use crate::native::{NativeType, from_le_bytes};
use crate::{DType, TypedArray};

/// A read-only view over one stored dataset.
///
/// The file is memory mapped when the view is opened and the handle is released when the last
/// [`Bytes`] referencing the mapping is dropped. Writers replace dataset files by rename, so a
/// mapping always observes a complete file.
#[derive(Debug, Clone)]
pub struct Dataset {
    key: String,
    dtype: DType,
    len: usize,
    payload: Bytes,
}

impl Dataset {
    pub(crate) fn open(path: &Path, key: &str) -> MdvResult<Self> {
        let file = File::open(path)?;
        // SAFETY: dataset files are never modified in place, only replaced by rename.
        let mmap = unsafe { Mmap::map(&file)? };
        let bytes = Bytes::from_owner(mmap);

        let header = DatasetHeader::decode(&bytes)?;
        let expected = HEADER_SIZE as u64 + header.payload_len();
        if bytes.len() as u64 != expected {
            mdv_bail!(
                Consistency: "dataset {key} is {} bytes but its header requires {expected}",
                bytes.len()
            );
        }
        let len = usize::try_from(header.len)
            .map_err(|_| mdv_err!(Consistency: "dataset {key} is too large"))?;

        Ok(Self {
            key: key.to_string(),
            dtype: header.dtype,
            len,
            payload: bytes.slice(HEADER_SIZE..),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The complete little-endian payload, without copying.
    pub fn bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// The raw bytes of elements `range.start..range.end`, without copying.
    pub fn byte_range(&self, range: Range<usize>) -> MdvResult<Bytes> {
        if range.start > range.end || range.end > self.len {
            mdv_bail!(
                NotFound: "element range {}..{} out of bounds for dataset {} of length {}",
                range.start,
                range.end,
                self.key,
                self.len
            );
        }
        let width = self.dtype.byte_width();
        Ok(self.payload.slice(range.start * width..range.end * width))
    }

    /// Decode the elements in `range` as native values.
    pub fn read_range<T: NativeType>(&self, range: Range<usize>) -> MdvResult<Vec<T>> {
        if T::DTYPE != self.dtype {
            mdv_bail!(
                "dataset {} has dtype {}, requested {}",
                self.key,
                self.dtype,
                T::DTYPE
            );
        }
        Ok(from_le_bytes(&self.byte_range(range)?))
    }

    /// Materialize the whole dataset.
    pub fn to_array(&self) -> MdvResult<TypedArray> {
        TypedArray::from_le_bytes(self.dtype, self.len, &self.payload)
    }
}
