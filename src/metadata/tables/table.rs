use std::marker::PhantomData;

use crate::{
    metadata::tables::{RowDefinition, TableInfo},
    Result,
};

/// Typed view over the rows of one table inside the `#~` stream.
///
/// Rows are decoded on access; the view itself only borrows the table bytes.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: &'a TableInfo,
    _row: PhantomData<T>,
}

impl<'a, T: RowDefinition> MetadataTable<'a, T> {
    /// Create a view over `row_count` rows starting at the beginning of `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the table
    pub fn new(data: &'a [u8], row_count: u32, sizes: &'a TableInfo) -> Result<Self> {
        let row_size = T::row_size(sizes);
        let table_len = row_size as usize * row_count as usize;
        if table_len > data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(MetadataTable {
            data: &data[..table_len],
            row_count,
            row_size,
            sizes,
            _row: PhantomData,
        })
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Size of the table in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Decode the row with the 1-based id `rid`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `rid` is 0 or past the end of the table
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(malformed_error!(
                "Row {} is outside of table {:?} with {} rows",
                rid,
                T::TABLE,
                self.row_count
            ));
        }

        let mut offset = (rid - 1) as usize * self.row_size as usize;
        T::row_read(self.data, &mut offset, rid, self.sizes)
    }

    /// Iterate over all rows in order
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count).map(move |rid| self.get(rid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{NestedClassRaw, TableId};

    #[test]
    fn rows_by_id() {
        #[rustfmt::skip]
        let data = [
            0x02, 0x00, 0x01, 0x00,
            0x03, 0x00, 0x02, 0x00,
        ];
        let sizes = TableInfo::new(&[(TableId::TypeDef, 3), (TableId::NestedClass, 2)], 0);

        let table = MetadataTable::<NestedClassRaw>::new(&data, 2, &sizes).unwrap();
        assert_eq!(table.row_count(), 2);

        let row = table.get(2).unwrap();
        assert_eq!(row.rid, 2);
        assert_eq!(row.nested_class, 3);
        assert_eq!(row.enclosing_class, 2);

        let nested: Vec<u32> = table.iter().map(|row| row.unwrap().nested_class).collect();
        assert_eq!(nested, vec![2, 3]);

        assert!(table.get(0).is_err());
        assert!(table.get(3).is_err());
        assert!(MetadataTable::<NestedClassRaw>::new(&data, 3, &sizes).is_err());
    }
}
