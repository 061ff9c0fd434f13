//! Cursor-based reader over metadata bytes.
//!
//! [`Parser`] walks a byte slice with bounds checking and understands the ECMA-335 compressed
//! encodings used inside blobs (II.23.2): compressed unsigned and signed integers, compressed
//! `TypeDefOrRefOrSpecEncoded` tokens and the length-prefixed `SerString` of custom attributes.
//!
//! # Example
//!
//! ```rust
//! use dotmeta::Parser;
//!
//! let data = [0x83, 0x01, 0x7B];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_compressed_uint()?, 0x301);
//! assert_eq!(parser.read_compressed_int()?, -3);
//! # Ok::<(), dotmeta::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::{tables::CodedIndexType, token::Token},
    Error::OutOfBounds,
    Result,
};

/// A bounds-checked reading cursor over a byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while the cursor has not reached the end
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Skip `step` bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if this would move past the end of the data
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(OutOfBounds),
        }
    }

    /// Current cursor position
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Number of bytes left after the cursor
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Look at the next byte without consuming it
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Run `f` and rewind the cursor if it fails
    ///
    /// # Errors
    /// Returns whatever `f` returns
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Read a little-endian primitive
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `length` bytes and advance past them
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(length)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a compressed unsigned integer (ECMA-335 II.23.2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input, or
    /// [`crate::Error::Malformed`] for the reserved `111xxxxx` lead byte
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed signed integer (ECMA-335 II.23.2)
    ///
    /// The value is stored rotated, with the sign in bit 0. The width of the encoding decides
    /// how many bits the sign is extended from.
    ///
    /// # Errors
    /// Same as [`Parser::read_compressed_uint`]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let start = self.position;
        let unsigned = self.read_compressed_uint()?;

        let magnitude = (unsigned >> 1) as i32;
        if unsigned & 1 == 0 {
            return Ok(magnitude);
        }

        let extension = match self.position - start {
            1 => 0x40,
            2 => 0x2000,
            _ => 0x1000_0000,
        };

        Ok(magnitude - extension)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` token
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown table tag
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;
        CodedIndexType::TypeDefOrRef.decompress(compressed_token)
    }

    /// Read a null-terminated UTF-8 string
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for invalid UTF-8
    pub fn read_string_utf8(&mut self) -> Result<String> {
        let start = self.position;
        let end = self.data[start..]
            .iter()
            .position(|byte| *byte == 0)
            .map_or(self.data.len(), |terminator| start + terminator);

        self.position = (end + 1).min(self.data.len());

        std::str::from_utf8(&self.data[start..end])
            .map(str::to_string)
            .map_err(|e| malformed_error!("Invalid UTF-8 string at offset {} - {}", start, e))
    }

    /// Read a `SerString`: a compressed length followed by UTF-8, with `0xFF` encoding null
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input or
    /// [`crate::Error::Malformed`] for invalid UTF-8
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.peek_byte()? == 0xFF {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let start = self.position;
        let bytes = self.read_bytes(length)?;

        std::str::from_utf8(bytes)
            .map(|value| Some(value.to_string()))
            .map_err(|e| malformed_error!("Invalid UTF-8 string at offset {} - {}", start, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),                             // 1-byte format
            (vec![0x7F], 0x7F),                          // 1-byte format, max value
            (vec![0x80, 0x80], 0x80),                    // 2-byte format, min value
            (vec![0xBF, 0xFF], 0x3FFF),                  // 2-byte format, max value
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),      // 4-byte format, min value
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF), // 4-byte format, max value
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
            assert!(!parser.has_more_data());
        }

        let mut parser = Parser::new(&[]);
        assert!(matches!(parser.read_compressed_uint(), Err(Error::OutOfBounds)));

        let mut parser = Parser::new(&[0xE0, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn read_compressed_int() {
        // Values taken from ECMA-335 II.23.2
        let test_cases = vec![
            (vec![0x06], 3),
            (vec![0x7B], -3),
            (vec![0x80, 0x80], 64),
            (vec![0x01], -64),
            (vec![0xC0, 0x00, 0x40, 0x00], 8192),
            (vec![0x80, 0x01], -8192),
            (vec![0xDF, 0xFF, 0xFF, 0xFE], 268_435_455),
            (vec![0xC0, 0x00, 0x00, 0x01], -268_435_456),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_int().unwrap(), expected);
        }
    }

    #[test]
    fn read_compressed_token() {
        let test_cases = vec![
            (vec![0x48], 0x0200_0012), // TypeDef, row 0x12
            (vec![0x0D], 0x0100_0003), // TypeRef, row 0x03
            (vec![0x06], 0x1B00_0001), // TypeSpec, row 0x01
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_token().unwrap().value(), expected);
        }

        let mut parser = Parser::new(&[0x03]);
        assert!(parser.read_compressed_token().is_err());
    }

    #[test]
    fn parse_string() {
        let test_cases = vec![
            (vec![0x61, 0x62, 0x63, 0x00], "abc"),
            (vec![0x00], ""),
            (vec![0xE4, 0xB8, 0xAD, 0xE6, 0x96, 0x87, 0x00], "中文"),
            (vec![0x61, 0x62], "ab"),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_string_utf8().unwrap(), expected);
            assert!(!parser.has_more_data());
        }
    }

    #[test]
    fn ser_string() {
        let mut parser = Parser::new(&[0xFF, 0x00, 0x02, 0x68, 0x69]);
        assert_eq!(parser.read_ser_string().unwrap(), None);
        assert_eq!(parser.read_ser_string().unwrap(), Some(String::new()));
        assert_eq!(parser.read_ser_string().unwrap(), Some("hi".to_string()));

        let mut parser = Parser::new(&[0x05, 0x68]);
        assert!(parser.read_ser_string().is_err());
    }

    #[test]
    fn transactional() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);
        parser.advance_by(1).unwrap();

        let result: Result<u32> = parser.transactional(|p| p.read_le::<u32>());
        assert!(result.is_err());
        assert_eq!(parser.pos(), 1);

        let value = parser.transactional(|p| p.read_le::<u16>()).unwrap();
        assert_eq!(value, 0x0302);
        assert_eq!(parser.pos(), 3);
        assert!(parser.peek_byte().is_err());
    }
}
