//! Module-wide table layout.
//!
//! The width of every index column depends on row counts: a plain table index is 4 bytes once
//! its target table has more than `0xFFFF` rows, a heap index is 4 bytes once the heap grows past
//! 64 KiB, and a coded index widens as soon as any of its candidate tables crosses the limit of
//! [`CodedIndexType::width_for`]. [`TableInfo`] takes every row count up front, resolves all of
//! these widths once and is then passed by reference into every row read and write.

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{CodedIndexType, TableId},
    Result,
};

/// Bit of the `HeapSizes` byte marking a 4 byte `#Strings` index
pub const HEAP_LARGE_STRINGS: u8 = 0x01;
/// Bit of the `HeapSizes` byte marking a 4 byte `#GUID` index
pub const HEAP_LARGE_GUID: u8 = 0x02;
/// Bit of the `HeapSizes` byte marking a 4 byte `#Blob` index
pub const HEAP_LARGE_BLOB: u8 = 0x04;

/// Row counts of all tables plus the column widths derived from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    rows: [u32; TableId::COUNT],
    coded_widths: [u8; CodedIndexType::COUNT],
    heap_sizes: u8,
}

/// Shared reference to a [`TableInfo`]
pub type TableInfoRef = std::sync::Arc<TableInfo>;

impl TableInfo {
    /// Build the layout from explicit row counts and heap width flags.
    ///
    /// Tables not listed have zero rows.
    #[must_use]
    pub fn new(row_counts: &[(TableId, u32)], heap_sizes: u8) -> Self {
        let mut rows = [0u32; TableId::COUNT];
        for (table, count) in row_counts {
            rows[*table as usize] = *count;
        }

        Self::from_rows(rows, heap_sizes)
    }

    fn from_rows(rows: [u32; TableId::COUNT], heap_sizes: u8) -> Self {
        let mut coded_widths = [2u8; CodedIndexType::COUNT];
        for kind in CodedIndexType::iter() {
            coded_widths[kind as usize] = kind.width_for(|table| rows[table as usize]);
        }

        TableInfo {
            rows,
            coded_widths,
            heap_sizes,
        }
    }

    /// Read the row count array that follows the fixed 24 byte table stream header.
    ///
    /// `data` starts at the row counts, `valid` is the bit vector of present tables.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the counts are truncated, or
    /// [`crate::Error::NotSupported`] if `valid` names tables this crate does not know
    pub fn read(data: &[u8], valid: u64, heap_sizes: u8) -> Result<(Self, usize)> {
        if valid >> TableId::COUNT != 0 {
            return Err(crate::Error::NotSupported);
        }

        let mut rows = [0u32; TableId::COUNT];
        let mut offset = 0;
        for table in TableId::iter() {
            if valid & table.bit() == 0 {
                continue;
            }

            rows[table as usize] = read_le_at::<u32>(data, &mut offset)?;
        }

        Ok((Self::from_rows(rows, heap_sizes), offset))
    }

    /// Number of rows of `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// Bit vector of the tables holding at least one row
    #[must_use]
    pub fn valid(&self) -> u64 {
        TableId::iter()
            .filter(|table| self.rows[*table as usize] > 0)
            .fold(0, |valid, table| valid | table.bit())
    }

    /// The `HeapSizes` byte
    #[must_use]
    pub fn heap_sizes(&self) -> u8 {
        self.heap_sizes
    }

    /// Width in bytes of a plain index into `table`
    #[must_use]
    pub fn index_width(&self, table: TableId) -> u8 {
        if self.rows[table as usize] > u32::from(u16::MAX) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a coded index column
    #[must_use]
    pub fn coded_width(&self, kind: CodedIndexType) -> u8 {
        self.coded_widths[kind as usize]
    }

    /// Width in bytes of a `#Strings` index
    #[must_use]
    pub fn str_width(&self) -> u8 {
        if self.heap_sizes & HEAP_LARGE_STRINGS != 0 {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `#GUID` index
    #[must_use]
    pub fn guid_width(&self) -> u8 {
        if self.heap_sizes & HEAP_LARGE_GUID != 0 {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `#Blob` index
    #[must_use]
    pub fn blob_width(&self) -> u8 {
        if self.heap_sizes & HEAP_LARGE_BLOB != 0 {
            4
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_layout() {
        let info = TableInfo::new(&[(TableId::TypeDef, 10), (TableId::Field, 20)], 0);

        assert_eq!(info.row_count(TableId::TypeDef), 10);
        assert_eq!(info.row_count(TableId::MethodDef), 0);
        assert_eq!(info.index_width(TableId::Field), 2);
        assert_eq!(info.coded_width(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(info.str_width(), 2);
        assert_eq!(info.valid(), TableId::TypeDef.bit() | TableId::Field.bit());
    }

    #[test]
    fn large_columns() {
        let info = TableInfo::new(
            &[(TableId::Field, 0x1_0000), (TableId::TypeSpec, 0x4000)],
            HEAP_LARGE_STRINGS | HEAP_LARGE_BLOB,
        );

        assert_eq!(info.index_width(TableId::Field), 4);
        assert_eq!(info.index_width(TableId::TypeSpec), 2);
        assert_eq!(info.coded_width(CodedIndexType::TypeDefOrRef), 4);
        assert_eq!(info.coded_width(CodedIndexType::HasConstant), 4);
        assert_eq!(info.coded_width(CodedIndexType::ResolutionScope), 2);
        assert_eq!(info.str_width(), 4);
        assert_eq!(info.guid_width(), 2);
        assert_eq!(info.blob_width(), 4);
    }

    #[test]
    fn read_counts() {
        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x00, 0x00, // Module
            0x05, 0x00, 0x00, 0x00, // TypeRef
            0x03, 0x00, 0x00, 0x00, // TypeDef
        ];
        let valid = TableId::Module.bit() | TableId::TypeRef.bit() | TableId::TypeDef.bit();

        let (info, consumed) = TableInfo::read(&data, valid, HEAP_LARGE_GUID).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(info.row_count(TableId::TypeRef), 5);
        assert_eq!(info.row_count(TableId::TypeDef), 3);
        assert_eq!(info.guid_width(), 4);

        assert!(TableInfo::read(&data[..8], valid, 0).is_err());
        assert!(TableInfo::read(&data, 1 << 0x30, 0).is_err());
    }
}
