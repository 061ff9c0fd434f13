use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#Blob` heap: length-prefixed byte sequences addressed by byte offset.
///
/// Each entry starts with a compressed unsigned length. Offset 0 holds the empty blob.
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - Partition II, 24.2.4
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view over the heap bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with the empty blob
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get the blob at `index`, without its length prefix
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index or the declared length leaves the heap
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        parser.read_bytes(len)
    }

    /// Iterate over all `(offset, blob)` entries in heap order
    #[must_use]
    pub fn iter(&self) -> BlobIterator<'a> {
        BlobIterator {
            data: self.data,
            position: 1,
        }
    }
}

/// Iterator over the entries of a [`Blob`] heap
pub struct BlobIterator<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Iterator for BlobIterator<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        // Heaps are padded to 4 bytes with zeros, which read as empty blobs
        while self.position < self.data.len() && self.data[self.position] == 0 {
            self.position += 1;
        }
        if self.position >= self.data.len() {
            return None;
        }

        let start = self.position;
        let mut parser = Parser::new(&self.data[start..]);
        let entry = parser
            .read_compressed_uint()
            .and_then(|len| parser.read_bytes(len as usize));

        match entry {
            Ok(bytes) => {
                self.position = start + parser.pos();
                Some(Ok((start, bytes)))
            }
            Err(error) => {
                self.position = self.data.len();
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x03, 0x20, 0x00, 0x00,
            0x02, 0x06, 0x08,
            0x00, 0x00,
        ];

        let blob = Blob::from(&data).unwrap();
        assert_eq!(blob.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(blob.get(1).unwrap(), &[0x20, 0x00, 0x00]);
        assert_eq!(blob.get(5).unwrap(), &[0x06, 0x08]);

        let entries: Vec<_> = blob.iter().map(|entry| entry.unwrap()).collect();
        assert_eq!(entries, vec![(1, &[0x20u8, 0x00, 0x00][..]), (5, &[0x06u8, 0x08][..])]);
    }

    #[test]
    fn invalid() {
        assert!(Blob::from(&[0x01]).is_err());

        let blob = Blob::from(&[0x00, 0x05, 0x01]).unwrap();
        assert!(blob.get(1).is_err());
        assert!(blob.get(3).is_err());
        assert!(blob.iter().next().unwrap().is_err());
    }
}
