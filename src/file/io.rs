//! Little-endian primitive access over byte slices.
//!
//! Every multi-byte value in ECMA-335 metadata is little-endian. The [`CilIO`] trait gives the
//! primitive integer and float types a uniform byte conversion, and the free functions below
//! read or write them at a cursor with bounds checking. The `_dyn` variants handle the 2-or-4
//! byte index columns whose width is decided by [`crate::metadata::tables::TableInfo`].

use crate::{Error::OutOfBounds, Result};

/// Primitive types that can be converted from and to little-endian bytes.
pub trait CilIO: Sized + Copy {
    /// The fixed-size byte array representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode into little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cilio {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cilio!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Reads a `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a `T` at `offset` and advances the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads a 4 byte value if `is_large`, otherwise a 2 byte value, widened to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Writes `value` at `offset` and advances the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;

    Ok(())
}

/// Writes `value` as 4 bytes if `is_large`, otherwise as 2 bytes.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`, or
/// [`crate::Error::InvalidOperation`] if a small column cannot hold `value`.
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)
    } else {
        let Ok(small) = u16::try_from(value) else {
            return Err(invalid_operation!(
                "value 0x{:X} does not fit into a 2 byte column",
                value
            ));
        };
        write_le_at::<u16>(data, offset, small)
    }
}
