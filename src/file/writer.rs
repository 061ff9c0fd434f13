//! Append-only byte sink with patching.
//!
//! [`Writer`] is the write-side mirror of [`crate::file::parser::Parser`]. Values are appended
//! at the end; fields whose value is only known later (stream offsets, sizes) are written as
//! placeholders and fixed up with [`Writer::patch_le_at`].

use crate::{
    file::io::{write_le_at, CilIO},
    metadata::{tables::CodedIndexType, token::Token},
    Result,
};

/// Largest value representable as a compressed unsigned integer
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// A growable little-endian byte sink.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Writer { data: Vec::new() }
    }

    /// Create an empty writer with room for `capacity` bytes
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far, which is also the offset of the next write
    #[must_use]
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes written so far
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return its buffer
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Append a little-endian primitive
    pub fn write_le<T: CilIO>(&mut self, value: T) {
        self.data.extend_from_slice(value.to_le_bytes().as_ref());
    }

    /// Append a 4 byte value if `is_large`, otherwise a 2 byte value
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if `value` does not fit into 2 bytes
    pub fn write_le_dyn(&mut self, value: u32, is_large: bool) -> Result<()> {
        if is_large {
            self.write_le::<u32>(value);
            return Ok(());
        }

        let Ok(small) = u16::try_from(value) else {
            return Err(invalid_operation!(
                "value 0x{:X} does not fit into a 2 byte column",
                value
            ));
        };
        self.write_le::<u16>(small);
        Ok(())
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a null-terminated UTF-8 string
    pub fn write_string_utf8(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }

    /// Overwrite a previously written value at `offset`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` was not written yet
    pub fn patch_le_at<T: CilIO>(&mut self, offset: usize, value: T) -> Result<()> {
        let mut offset = offset;
        write_le_at(&mut self.data, &mut offset, value)
    }

    /// Pad with zero bytes up to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        while self.data.len() % alignment != 0 {
            self.data.push(0);
        }
    }

    /// Append a compressed unsigned integer in its shortest form (ECMA-335 II.23.2)
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] for values above [`MAX_COMPRESSED_UINT`]
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<()> {
        match value {
            0..=0x7F => self.data.push(value as u8),
            0x80..=0x3FFF => {
                self.data.push(0x80 | (value >> 8) as u8);
                self.data.push(value as u8);
            }
            0x4000..=MAX_COMPRESSED_UINT => {
                self.data.push(0xC0 | (value >> 24) as u8);
                self.data.push((value >> 16) as u8);
                self.data.push((value >> 8) as u8);
                self.data.push(value as u8);
            }
            _ => {
                return Err(invalid_operation!(
                    "value 0x{:X} is too large for a compressed integer",
                    value
                ))
            }
        }

        Ok(())
    }

    /// Append a compressed signed integer in its shortest form (ECMA-335 II.23.2)
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the value is outside of
    /// `-2^28..2^28`
    #[allow(clippy::cast_sign_loss)]
    pub fn write_compressed_int(&mut self, value: i32) -> Result<()> {
        let rotated = |mask: i32| -> u32 {
            let sign = u32::from(value < 0);
            (((value & mask) as u32) << 1) | sign
        };

        match value {
            -0x40..=0x3F => self.write_compressed_uint(rotated(0x3F)),
            -0x2000..=0x1FFF => {
                let encoded = rotated(0x1FFF);
                self.data.push(0x80 | (encoded >> 8) as u8);
                self.data.push(encoded as u8);
                Ok(())
            }
            -0x1000_0000..=0x0FFF_FFFF => {
                let encoded = rotated(0x0FFF_FFFF);
                self.data.push(0xC0 | (encoded >> 24) as u8);
                self.data.push((encoded >> 16) as u8);
                self.data.push((encoded >> 8) as u8);
                self.data.push(encoded as u8);
                Ok(())
            }
            _ => Err(invalid_operation!(
                "value {} is out of range for a compressed signed integer",
                value
            )),
        }
    }

    /// Append a `TypeDefOrRefOrSpecEncoded` token
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the token is not a TypeDef, TypeRef or
    /// TypeSpec
    pub fn write_compressed_token(&mut self, token: Token) -> Result<()> {
        let compressed = CodedIndexType::TypeDefOrRef.compress(token)?;
        self.write_compressed_uint(compressed)
    }

    /// Append a `SerString`; `None` is written as the single byte `0xFF`
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the string is too long to be length prefixed
    pub fn write_ser_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            None => {
                self.data.push(0xFF);
                Ok(())
            }
            Some(value) => {
                let Ok(length) = u32::try_from(value.len()) else {
                    return Err(invalid_operation!("string of {} bytes is too long", value.len()));
                };
                self.write_compressed_uint(length)?;
                self.data.extend_from_slice(value.as_bytes());
                Ok(())
            }
        }
    }
}

/// Size in bytes of the shortest compressed encoding of `value`
#[must_use]
pub fn compressed_uint_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::parser::Parser;

    #[test]
    fn compressed_uint_minimal_width() {
        let test_cases = vec![
            (0, vec![0x00]),
            (127, vec![0x7F]),
            (128, vec![0x80, 0x80]),
            (16383, vec![0xBF, 0xFF]),
            (16384, vec![0xC0, 0x00, 0x40, 0x00]),
            ((1 << 29) - 1, vec![0xDF, 0xFF, 0xFF, 0xFF]),
        ];

        for (value, expected) in test_cases {
            let mut writer = Writer::new();
            writer.write_compressed_uint(value).unwrap();
            assert_eq!(writer.as_slice(), expected.as_slice(), "value {value}");
            assert_eq!(compressed_uint_size(value), expected.len());

            let mut parser = Parser::new(writer.as_slice());
            assert_eq!(parser.read_compressed_uint().unwrap(), value);
        }

        assert!(Writer::new().write_compressed_uint(1 << 29).is_err());
    }

    #[test]
    fn compressed_int() {
        let test_cases = vec![
            (3, vec![0x06]),
            (-3, vec![0x7B]),
            (64, vec![0x80, 0x80]),
            (-64, vec![0x01]),
            (8192, vec![0xC0, 0x00, 0x40, 0x00]),
            (-8192, vec![0x80, 0x01]),
            (268_435_455, vec![0xDF, 0xFF, 0xFF, 0xFE]),
            (-268_435_456, vec![0xC0, 0x00, 0x00, 0x01]),
        ];

        for (value, expected) in test_cases {
            let mut writer = Writer::new();
            writer.write_compressed_int(value).unwrap();
            assert_eq!(writer.as_slice(), expected.as_slice(), "value {value}");

            let mut parser = Parser::new(writer.as_slice());
            assert_eq!(parser.read_compressed_int().unwrap(), value);
        }

        assert!(Writer::new().write_compressed_int(0x1000_0000).is_err());
    }

    #[test]
    fn patch_and_align() {
        let mut writer = Writer::new();
        writer.write_le::<u32>(0);
        writer.write_bytes(b"#~");
        writer.align(4);
        assert_eq!(writer.pos(), 8);

        writer.patch_le_at::<u32>(0, 0xDEAD_BEEF).unwrap();
        assert_eq!(&writer.as_slice()[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(writer.patch_le_at::<u32>(6, 1).is_err());
    }

    #[test]
    fn dyn_columns() {
        let mut writer = Writer::new();
        writer.write_le_dyn(0x1234, false).unwrap();
        writer.write_le_dyn(0x1234, true).unwrap();
        assert_eq!(writer.as_slice(), &[0x34, 0x12, 0x34, 0x12, 0x00, 0x00]);
        assert!(writer.write_le_dyn(0x1_0000, false).is_err());
    }
}
