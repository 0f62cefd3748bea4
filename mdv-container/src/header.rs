use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::DType;

/// Magic bytes at the start of every dataset file.
pub const MAGIC: [u8; 4] = *b"MDVA";
/// Current dataset file format version.
pub const VERSION: u8 = 1;
/// Size of the fixed dataset header in bytes.
pub const HEADER_SIZE: usize = 24;

/// The fixed-size header that precedes a dataset's payload.
///
/// ```text
/// 0..4   magic "MDVA"
/// 4      version
/// 5      dtype tag
/// 6..8   reserved
/// 8..12  element width (u32 LE)
/// 12..20 element count (u64 LE)
/// 20..24 reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DatasetHeader {
    pub(crate) dtype: DType,
    pub(crate) len: u64,
}

impl DatasetHeader {
    pub(crate) fn encode(&self) -> MdvResult<[u8; HEADER_SIZE]> {
        let width = u32::try_from(self.dtype.byte_width())
            .map_err(|_| mdv_err!(Encoding: "element width exceeds u32"))?;
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = VERSION;
        buf[5] = self.dtype.tag();
        buf[8..12].copy_from_slice(&width.to_le_bytes());
        buf[12..20].copy_from_slice(&self.len.to_le_bytes());
        Ok(buf)
    }

    pub(crate) fn decode(bytes: &[u8]) -> MdvResult<Self> {
        if bytes.len() < HEADER_SIZE {
            mdv_bail!(
                Consistency: "dataset truncated: {} bytes is shorter than the header",
                bytes.len()
            );
        }
        if bytes[0..4] != MAGIC {
            mdv_bail!(Consistency: "dataset has bad magic {:?}", &bytes[0..4]);
        }
        if bytes[4] != VERSION {
            mdv_bail!(Consistency: "unsupported dataset version {}", bytes[4]);
        }
        let mut width = [0u8; 4];
        width.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[12..20]);
        Ok(Self {
            dtype: DType::from_tag(bytes[5], u32::from_le_bytes(width))?,
            len: u64::from_le_bytes(len),
        })
    }

    /// Number of payload bytes that must follow the header.
    pub(crate) fn payload_len(&self) -> u64 {
        self.len * self.dtype.byte_width() as u64
    }
}
