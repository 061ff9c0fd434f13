//! The metadata root (ECMA-335 II.24.2.1).
//!
//! The root starts with the `BSJB` signature, carries the runtime version string and a
//! directory of [`StreamHeader`]s. All stream offsets are relative to the start of the root.

use crate::{
    file::{
        io::{read_le, read_le_at},
        writer::Writer,
    },
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Signature of the metadata root, `BSJB` in little-endian
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Parsed metadata root
#[derive(Debug, Clone)]
pub struct Root {
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root at the start of `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad signature or stream directory and
    /// [`crate::Error::OutOfBounds`] if a stream points outside of `data`
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let version_length = read_le::<u32>(&data[12..])? as usize;
        let Some(version_end) = version_length.checked_add(16) else {
            return Err(malformed_error!("Invalid version string length - {}", version_length));
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 {
            return Err(malformed_error!("Metadata root declares no streams"));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            if offset >= data.len() {
                return Err(OutOfBounds);
            }

            let stream = StreamHeader::from(&data[offset..])?;
            let Some(stream_end) = stream.offset.checked_add(stream.size) else {
                return Err(malformed_error!(
                    "Stream offset and size overflow - {} + {}",
                    stream.offset,
                    stream.size
                ));
            };
            if stream_end as usize > data.len() {
                return Err(OutOfBounds);
            }
            if stream_headers
                .iter()
                .any(|other: &StreamHeader| other.name == stream.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", stream.name));
            }

            offset += stream.encoded_size();
            stream_headers.push(stream);
        }

        Ok(Root {
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// Look up a stream header by name
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }

    /// Bytes of the stream `name` inside `data`, the buffer the root was read from
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream lies outside of `data`
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Result<Option<&'a [u8]>> {
        let Some(stream) = self.stream(name) else {
            return Ok(None);
        };

        let start = stream.offset as usize;
        let end = start + stream.size as usize;
        data.get(start..end).map(Some).ok_or(OutOfBounds)
    }

    /// Serialize a metadata root with the given streams, in order
    ///
    /// Stream contents are padded to 4 bytes; offsets in the directory are patched once the
    /// directory size is known.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if a stream is too large to be addressed
    pub fn write(version: &str, streams: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut writer = Writer::new();

        let padded_version = (version.len() + 1 + 3) & !3;
        writer.write_le::<u32>(CIL_HEADER_MAGIC);
        writer.write_le::<u16>(1);
        writer.write_le::<u16>(1);
        writer.write_le::<u32>(0);
        writer.write_le::<u32>(padded_version as u32);
        writer.write_bytes(version.as_bytes());
        writer.write_bytes(&vec![0u8; padded_version - version.len()]);
        writer.write_le::<u16>(0);
        writer.write_le::<u16>(streams.len() as u16);

        let mut header_positions = Vec::with_capacity(streams.len());
        for (name, data) in streams {
            header_positions.push(writer.pos());
            let header = StreamHeader {
                offset: 0,
                size: padded_len(data.len()),
                name: (*name).to_string(),
            };
            header.write(&mut writer);
        }

        for ((_, data), header_position) in streams.iter().zip(header_positions) {
            let Ok(offset) = u32::try_from(writer.pos()) else {
                return Err(invalid_operation!("metadata is too large"));
            };
            writer.patch_le_at::<u32>(header_position, offset)?;
            writer.write_bytes(data);
            writer.align(4);
        }

        Ok(writer.into_inner())
    }
}

fn padded_len(len: usize) -> u32 {
    ((len + 3) & !3) as u32
}
