use crate::DType;

/// A primitive element type that can be stored in a dataset.
pub trait NativeType: Copy + Send + Sync + 'static {
    /// The dtype recorded for arrays of this type.
    const DTYPE: DType;
    /// Size of one element in bytes.
    const WIDTH: usize;

    /// Append the little-endian representation of `self`.
    fn extend_le(&self, out: &mut Vec<u8>);

    /// Read one element from exactly [`Self::WIDTH`] little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! native_type {
    ($T:ty, $dtype:expr) => {
        impl NativeType for $T {
            const DTYPE: DType = $dtype;
            const WIDTH: usize = size_of::<$T>();

            #[inline]
            fn extend_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$T>()];
                buf.copy_from_slice(bytes);
                <$T>::from_le_bytes(buf)
            }
        }
    };
}

native_type!(u8, DType::U8);
native_type!(u16, DType::U16);
native_type!(u32, DType::U32);
native_type!(u64, DType::U64);
native_type!(i32, DType::I32);
native_type!(f32, DType::F32);

/// Encode a slice of native values as contiguous little-endian bytes.
pub fn to_le_bytes<T: NativeType>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::WIDTH);
    for v in values {
        v.extend_le(&mut out);
    }
    out
}

/// Decode contiguous little-endian bytes into native values.
///
/// Trailing bytes that do not form a whole element are ignored; callers validate lengths first.
pub fn from_le_bytes<T: NativeType>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::WIDTH).map(T::from_le_slice).collect()
}
