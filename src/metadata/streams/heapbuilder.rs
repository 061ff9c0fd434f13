//! Write-side heaps.
//!
//! The builders are content addressed: interning the same content twice returns the offset of
//! the first copy, and offset 0 is reserved for the empty string, the empty blob and the
//! absent GUID.

use std::collections::HashMap;

use crate::{
    file::writer::{Writer, MAX_COMPRESSED_UINT},
    Result,
};

/// Builds a `#Strings` heap
#[derive(Debug)]
pub struct StringHeapBuilder {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl Default for StringHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHeapBuilder {
    /// Create a heap holding only the empty string
    #[must_use]
    pub fn new() -> Self {
        StringHeapBuilder {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    /// Intern `value` and return its offset
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if `value` contains a null character
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.offsets.get(value) {
            return Ok(*offset);
        }
        if value.contains('\0') {
            return Err(invalid_operation!("string {:?} contains a null character", value));
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.offsets.insert(value.to_string(), offset);

        Ok(offset)
    }

    /// Current size in bytes, before padding
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if only the empty string is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// Whether indexes into this heap need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.data.len() > usize::from(u16::MAX)
    }

    /// The heap bytes padded to a multiple of 4
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        pad(self.data)
    }
}

/// Builds a `#Blob` heap
#[derive(Debug)]
pub struct BlobHeapBuilder {
    data: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
}

impl Default for BlobHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeapBuilder {
    /// Create a heap holding only the empty blob
    #[must_use]
    pub fn new() -> Self {
        BlobHeapBuilder {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    /// Intern `value` and return its offset
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the blob is too large for a length prefix
    pub fn intern(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.offsets.get(value) {
            return Ok(*offset);
        }

        let length = match u32::try_from(value.len()) {
            Ok(length) if length <= MAX_COMPRESSED_UINT => length,
            _ => return Err(invalid_operation!("blob of {} bytes is too large", value.len())),
        };

        let offset = self.data.len() as u32;
        let mut writer = Writer::with_capacity(value.len() + 4);
        writer.write_compressed_uint(length)?;
        writer.write_bytes(value);
        self.data.extend_from_slice(writer.as_slice());
        self.offsets.insert(value.to_vec(), offset);

        Ok(offset)
    }

    /// Current size in bytes, before padding
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if only the empty blob is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// Whether indexes into this heap need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.data.len() > usize::from(u16::MAX)
    }

    /// The heap bytes padded to a multiple of 4
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        pad(self.data)
    }
}

/// Builds a `#GUID` heap
#[derive(Debug, Default)]
pub struct GuidHeapBuilder {
    data: Vec<u8>,
    indexes: HashMap<[u8; 16], u32>,
}

impl GuidHeapBuilder {
    /// Create an empty heap
    #[must_use]
    pub fn new() -> Self {
        GuidHeapBuilder::default()
    }

    /// Intern `value` and return its 1-based index; the nil GUID maps to 0
    pub fn intern(&mut self, value: uguid::Guid) -> u32 {
        if value == uguid::Guid::ZERO {
            return 0;
        }

        let bytes = value.to_bytes();
        if let Some(index) = self.indexes.get(&bytes) {
            return *index;
        }

        self.data.extend_from_slice(&bytes);
        let index = (self.data.len() / 16) as u32;
        self.indexes.insert(bytes, index);

        index
    }

    /// Current size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no GUID has been interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether indexes into this heap need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.data.len() / 16 > usize::from(u16::MAX)
    }

    /// The heap bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn pad(mut data: Vec<u8>) -> Vec<u8> {
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::streams::{Blob, Guid, Strings};

    #[test]
    fn strings_deduplicate() {
        let mut heap = StringHeapBuilder::new();
        assert_eq!(heap.intern("").unwrap(), 0);

        let system = heap.intern("System").unwrap();
        let object = heap.intern("Object").unwrap();
        assert_eq!(system, 1);
        assert_eq!(object, 8);
        assert_eq!(heap.intern("System").unwrap(), system);
        assert!(heap.intern("bad\0name").is_err());

        let bytes = heap.into_bytes();
        assert_eq!(bytes.len() % 4, 0);

        let strings = Strings::from(&bytes).unwrap();
        assert_eq!(strings.get(system as usize).unwrap(), "System");
        assert_eq!(strings.get(object as usize).unwrap(), "Object");
    }

    #[test]
    fn blobs_deduplicate() {
        let mut heap = BlobHeapBuilder::new();
        assert_eq!(heap.intern(&[]).unwrap(), 0);

        let small = heap.intern(&[0x06, 0x08]).unwrap();
        let large = heap.intern(&[0xAB; 200]).unwrap();
        assert_eq!(small, 1);
        assert_eq!(large, 4);
        assert_eq!(heap.intern(&[0x06, 0x08]).unwrap(), small);

        let bytes = heap.into_bytes();
        let blob = Blob::from(&bytes).unwrap();
        assert_eq!(blob.get(small as usize).unwrap(), &[0x06, 0x08]);
        assert_eq!(blob.get(large as usize).unwrap().len(), 200);
    }

    #[test]
    fn guids_are_one_based() {
        let mut heap = GuidHeapBuilder::new();
        let first = uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5");
        let second = uguid::guid!("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA");

        assert_eq!(heap.intern(uguid::Guid::ZERO), 0);
        assert_eq!(heap.intern(first), 1);
        assert_eq!(heap.intern(second), 2);
        assert_eq!(heap.intern(first), 1);

        let bytes = heap.into_bytes();
        let guids = Guid::from(&bytes).unwrap();
        assert_eq!(guids.get(2).unwrap(), second);
    }
}
