//! Metadata streams.
//!
//! Read side:
//! - [`Strings`], [`Blob`], [`Guid`] borrow heap bytes and resolve offsets or indexes
//! - [`TablesHeader`] parses the `#~` stream header and hands out typed table views
//! - [`StreamHeader`] describes where each stream lives inside the metadata root
//!
//! Write side:
//! - [`StringHeapBuilder`], [`BlobHeapBuilder`], [`GuidHeapBuilder`] intern content and
//!   return offsets, never storing the same content twice

mod blob;
mod guid;
mod heapbuilder;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::{Blob, BlobIterator};
pub use guid::Guid;
pub use heapbuilder::{BlobHeapBuilder, GuidHeapBuilder, StringHeapBuilder};
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
