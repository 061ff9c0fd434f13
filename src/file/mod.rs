//! Byte sources and sinks for metadata images.
//!
//! A metadata image is read through a [`Backend`], either an owned buffer ([`Memory`]) or a
//! memory-mapped file ([`Physical`]). Everything above this layer only ever sees `&[u8]`.
//! Writing goes through [`writer::Writer`], an append-only buffer that can patch values at
//! already written offsets.

pub mod io;
pub mod parser;
pub mod writer;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// Random-access byte source backing a metadata image.
pub trait Backend: Send + Sync {
    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the requested range leaves the source.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// The complete data of the source.
    fn data(&self) -> &[u8];

    /// Total length of the source in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the source holds no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn checked_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let Some(offset_end) = offset.checked_add(len) else {
        return Err(crate::Error::OutOfBounds);
    };

    if offset_end > data.len() {
        return Err(crate::Error::OutOfBounds);
    }

    Ok(&data[offset..offset_end])
}
