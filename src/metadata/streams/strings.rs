use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// The `#Strings` heap: null-terminated UTF-8 strings addressed by byte offset.
///
/// Offset 0 always holds the empty string.
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - Partition II, 24.2.3
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` view over the heap bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with the empty string
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get the string at `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index is outside the heap or
    /// [`crate::Error::Malformed`] if the string is not terminated or not UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Unterminated string at index - {}", index)),
        }
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap only holds the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
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
            0x3c, 0x4d, 0x6f, 0x64, 0x75, 0x6c, 0x65, 0x3e, 0x00,
            0x53, 0x79, 0x73, 0x74, 0x65, 0x6d, 0x00,
            0x4f, 0x62, 0x6a, 0x65, 0x63, 0x74, 0x00,
        ];

        let strings = Strings::from(&data).unwrap();

        assert_eq!(strings.get(0).unwrap(), "");
        assert_eq!(strings.get(1).unwrap(), "<Module>");
        assert_eq!(strings.get(10).unwrap(), "System");
        assert_eq!(strings.get(17).unwrap(), "Object");
        // Offsets may point into the middle of a string
        assert_eq!(strings.get(20).unwrap(), "ect");
        assert!(strings.get(data.len()).is_err());
    }

    #[test]
    fn invalid() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[0x41, 0x00]).is_err());

        let strings = Strings::from(&[0x00, 0x41, 0x42]).unwrap();
        assert!(strings.get(1).is_err());
    }
}
