//! Metadata tables of the `#~` stream.
//!
//! - [`TableId`] names the 45 tables of ECMA-335 II.22
//! - [`CodedIndexType`] packs tokens into shared index columns
//! - [`TableInfo`] holds row counts and resolves every column width once
//! - [`rows`] defines the raw row layout of each table
//! - [`MetadataTable`] is a typed, lazily decoding view over one table

mod codedindex;
pub mod rows;
mod table;
mod tableid;
pub(crate) mod tableinfo;

pub use codedindex::CodedIndexType;
pub use rows::*;
pub use table::MetadataTable;
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableInfoRef, HEAP_LARGE_BLOB, HEAP_LARGE_GUID, HEAP_LARGE_STRINGS};
