//! Stream headers of the metadata root (ECMA-335 II.24.2.2).

use crate::{
    file::{io::read_le, writer::Writer},
    Error::OutOfBounds,
    Result,
};

/// Stream names this crate understands
pub const STREAM_NAMES: [&str; 7] = ["#~", "#-", "#Strings", "#US", "#Blob", "#GUID", "#JTD"];

/// Location and name of one metadata stream, relative to the metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, e.g. `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header is truncated or
    /// [`crate::Error::Malformed`] for an unknown stream name
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let name_bytes = &data[8..data.len().min(8 + 32)];
        let Some(name_len) = name_bytes.iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!("Unterminated stream header name"));
        };
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        if !STREAM_NAMES.iter().any(|valid_name| name == *valid_name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Size of the encoded header: two `u32` plus the name padded to 4 bytes
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }

    /// Append the encoded header
    pub fn write(&self, writer: &mut Writer) {
        writer.write_le::<u32>(self.offset);
        writer.write_le::<u32>(self.size);
        writer.write_string_utf8(&self.name);
        writer.align(4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,
        ];

        let parsed_header = StreamHeader::from(&header_bytes).unwrap();

        assert_eq!(parsed_header.offset, 0x6C);
        assert_eq!(parsed_header.size, 0x45A4);
        assert_eq!(parsed_header.name, "#~");
        assert_eq!(parsed_header.encoded_size(), 12);

        let mut writer = Writer::new();
        parsed_header.write(&mut writer);
        assert_eq!(writer.as_slice(), &header_bytes);
    }

    #[test]
    fn crafted_invalid() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x52, 0x00,
        ];
        assert!(StreamHeader::from(&header_bytes).is_err());
        assert!(StreamHeader::from(&header_bytes[..8]).is_err());
    }
}
