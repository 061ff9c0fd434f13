//! The header of the `#~` stream (ECMA-335 II.24.2.6).
//!
//! The header lists which tables are present and how many rows each holds. All row counts
//! are read in one pass into a [`TableInfo`] before the first row is touched, because the
//! width of nearly every index column depends on the row counts of other tables.

use strum::IntoEnumIterator;

use crate::{
    file::{io::read_le, writer::Writer},
    metadata::tables::{row_size, MetadataTable, RowDefinition, TableId, TableInfo},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit announcing 4 extra bytes after the row counts
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Parsed `#~` header: versions, table bit vectors, row counts and table offsets.
#[derive(Debug, Clone)]
pub struct TablesHeader {
    /// Major version of the table schema, 2 for ECMA-335
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and column widths
    pub info: TableInfo,
    table_offsets: Vec<usize>,
    stream_len: usize,
}

impl TablesHeader {
    /// Parse the header of a `#~` stream
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is shorter than its tables, or
    /// [`crate::Error::Malformed`] if no table is present
    pub fn from(data: &[u8]) -> Result<TablesHeader> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let (info, counts_len) = TableInfo::read(&data[24..], valid, heap_sizes)?;

        let mut current_offset = 24 + counts_len;
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            current_offset += 4;
        }

        let mut table_offsets = vec![0usize; TableId::iter().count()];
        for table in TableId::iter() {
            table_offsets[table as usize] = current_offset;
            current_offset += row_size(table, &info) as usize * info.row_count(table) as usize;
        }

        if current_offset > data.len() {
            return Err(OutOfBounds);
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            table_offsets,
            stream_len: data.len(),
        })
    }

    /// Number of tables present
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Typed view over one table; `data` is the complete `#~` stream this header was read from
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is not the stream the header was read from
    pub fn table<'a, T: RowDefinition>(&'a self, data: &'a [u8]) -> Result<MetadataTable<'a, T>> {
        if data.len() != self.stream_len {
            return Err(OutOfBounds);
        }

        let offset = self.table_offsets[T::TABLE as usize];
        MetadataTable::new(&data[offset..], self.info.row_count(T::TABLE), &self.info)
    }

    /// Append a `#~` header describing `info`
    pub fn write(writer: &mut Writer, info: &TableInfo, sorted: u64, version: (u8, u8)) {
        writer.write_le::<u32>(0);
        writer.write_le::<u8>(version.0);
        writer.write_le::<u8>(version.1);
        writer.write_le::<u8>(info.heap_sizes());
        writer.write_le::<u8>(1);

        let valid = info.valid();
        writer.write_le::<u64>(valid);
        writer.write_le::<u64>(sorted & valid);

        for table in TableId::iter() {
            if valid & table.bit() != 0 {
                writer.write_le::<u32>(info.row_count(table));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{ModuleRaw, TypeRefRaw};

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x00,                         // reserved
            0x02, 0x00,                                     // version
            0x00,                                           // heap sizes
            0x01,                                           // reserved
            0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // valid: Module, TypeRef
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // sorted
            0x01, 0x00, 0x00, 0x00,                         // Module rows
            0x02, 0x00, 0x00, 0x00,                         // TypeRef rows
            // Module
            0x00, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            // TypeRef
            0x06, 0x00, 0x10, 0x00, 0x20, 0x00,
            0x06, 0x00, 0x30, 0x00, 0x20, 0x00,
        ];

        let header = TablesHeader::from(&data).unwrap();
        assert_eq!(header.major_version, 2);
        assert_eq!(header.table_count(), 2);
        assert_eq!(header.info.row_count(TableId::TypeRef), 2);

        let module = header.table::<ModuleRaw>(&data).unwrap().get(1).unwrap();
        assert_eq!(module.name, 0x0A);
        assert_eq!(module.mvid, 1);

        let type_refs = header.table::<TypeRefRaw>(&data).unwrap();
        let second = type_refs.get(2).unwrap();
        assert_eq!(second.type_name, 0x30);
        assert_eq!(second.resolution_scope.table_id(), Some(TableId::AssemblyRef));
        assert_eq!(second.resolution_scope.row(), 1);

        let mut writer = Writer::new();
        TablesHeader::write(&mut writer, &header.info, 0, (2, 0));
        assert_eq!(writer.as_slice(), &data[..32]);
    }

    #[test]
    fn truncated() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x01,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        assert!(TablesHeader::from(&data).is_err());
        assert!(TablesHeader::from(&data[..20]).is_err());
    }
}
