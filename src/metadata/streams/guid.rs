use crate::{Error::OutOfBounds, Result};

/// The `#GUID` heap: a flat array of 16 byte GUIDs addressed by 1-based index.
///
/// Index 0 is the absent GUID and reads as [`uguid::Guid::ZERO`].
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - Partition II, 24.2.5
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Create a `Guid` view over the heap bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap size is not a multiple of 16
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "Size of #GUID heap is not a multiple of 16 - {}",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// Get the GUID at the 1-based `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index is past the end of the heap
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index == 0 {
            return Ok(uguid::Guid::ZERO);
        }

        let offset_start = (index - 1) * 16;
        let Some(bytes) = self.data.get(offset_start..offset_start + 16) else {
            return Err(OutOfBounds);
        };

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(bytes);

        Ok(uguid::Guid::from_bytes(buffer))
    }

    /// Number of GUIDs in the heap
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data : [u8; 32] = [
            0x8e, 0x90, 0x37, 0xd4, 0xe6, 0x65, 0x7c, 0x48, 0x97, 0x35, 0x7b, 0xdf, 0xf6, 0x99, 0xbe, 0xa5,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];

        let guids = Guid::from(&data).unwrap();

        assert_eq!(guids.count(), 2);
        assert_eq!(guids.get(0).unwrap(), uguid::Guid::ZERO);
        assert_eq!(
            guids.get(1).unwrap(),
            uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5")
        );
        assert_eq!(
            guids.get(2).unwrap(),
            uguid::guid!("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA")
        );
        assert!(guids.get(3).is_err());
        assert!(Guid::from(&data[..20]).is_err());
    }
}
