//! Per-module bookkeeping of what has been materialized.
//!
//! Three kinds of state live here:
//! - memo tables mapping a row id to the arena id created for it, so every row is turned into
//!   an entity exactly once
//! - escrows: tables whose rows are keyed by an owner column (custom attributes, generic
//!   parameters, constants, ...) are scanned once and parked per owner until the owner asks
//!   for them; taking an entry removes it
//! - range indexes over the `*_list` columns, answering both "which rows does this owner
//!   hold" and "which owner holds this row"

use std::collections::HashMap;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::{
        model::{
            AssemblyRefId, EventId, FieldId, GenericParamId, MemberRefId, MethodId, MethodSpecId,
            ModuleRefId, ParamId, PropertyId, TypeDefId, TypeRefId,
        },
        tables::{
            ClassLayoutRaw, ConstantRaw, CustomAttributeRaw, DeclSecurityRaw, EventMapRaw,
            FieldLayoutRaw, FieldMarshalRaw, FieldRvaRaw, GenericParamConstraintRaw,
            GenericParamRaw, ImplMapRaw, InterfaceImplRaw, MethodDefRaw, MethodImplRaw,
            MethodSemanticsRaw, NestedClassRaw, PropertyMapRaw, RowDefinition, TableId, TableInfo,
            TypeDefRaw,
        },
        streams::TablesHeader,
        token::Token,
    },
    Result,
};

/// Tables whose rows are parked per owner until the owner is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::EnumCount)]
#[repr(usize)]
pub(crate) enum EscrowKind {
    CustomAttribute,
    DeclSecurity,
    GenericParam,
    GenericParamConstraint,
    InterfaceImpl,
    NestedClass,
    MethodSemantics,
    Constant,
    FieldMarshal,
    ImplMap,
    FieldRva,
    FieldLayout,
    ClassLayout,
    MethodImpl,
}

impl EscrowKind {
    /// The table the escrowed rows come from
    pub(crate) fn table(self) -> TableId {
        match self {
            EscrowKind::CustomAttribute => TableId::CustomAttribute,
            EscrowKind::DeclSecurity => TableId::DeclSecurity,
            EscrowKind::GenericParam => TableId::GenericParam,
            EscrowKind::GenericParamConstraint => TableId::GenericParamConstraint,
            EscrowKind::InterfaceImpl => TableId::InterfaceImpl,
            EscrowKind::NestedClass => TableId::NestedClass,
            EscrowKind::MethodSemantics => TableId::MethodSemantics,
            EscrowKind::Constant => TableId::Constant,
            EscrowKind::FieldMarshal => TableId::FieldMarshal,
            EscrowKind::ImplMap => TableId::ImplMap,
            EscrowKind::FieldRva => TableId::FieldRVA,
            EscrowKind::FieldLayout => TableId::FieldLayout,
            EscrowKind::ClassLayout => TableId::ClassLayout,
            EscrowKind::MethodImpl => TableId::MethodImpl,
        }
    }
}

/// Rows of one table grouped by owner token, populated once and drained per owner
#[derive(Debug, Default)]
pub(crate) struct Escrow {
    populated: bool,
    rows: HashMap<Token, Vec<u32>>,
}

impl Escrow {
    pub(crate) fn is_populated(&self) -> bool {
        self.populated
    }

    /// Returns `true` if rows for `owner` are still waiting to be taken
    pub(crate) fn contains(&self, owner: Token) -> bool {
        self.rows.contains_key(&owner)
    }

    /// Remove and return the row ids parked for `owner`, in table order
    pub(crate) fn take(&mut self, owner: Token) -> Vec<u32> {
        self.rows.remove(&owner).unwrap_or_default()
    }

    fn park(&mut self, owner: Token, rid: u32) {
        self.rows.entry(owner).or_default().push(rid);
    }
}

/// Owner ranges derived from a `*_list` column
///
/// Owner `i` holds the rows `starts[i]..starts[i + 1]`, the last owner holds everything up to
/// the end of the child table.
#[derive(Debug, Default)]
pub(crate) struct RangeIndex {
    starts: Vec<u32>,
    child_count: u32,
}

impl RangeIndex {
    /// Build the index from the start column of every owner row
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a start points past the child table or the
    /// starts decrease
    pub(crate) fn new(starts: Vec<u32>, child_count: u32) -> Result<Self> {
        let mut previous = 1;
        for (index, start) in starts.iter().enumerate() {
            // rid 0 in a list column of an empty child table means "no rows"
            let start = (*start).max(1);
            if start > child_count + 1 {
                return Err(malformed_error!(
                    "List start {} of owner {} is beyond the child table with {} rows",
                    start,
                    index + 1,
                    child_count
                ));
            }
            if start < previous {
                return Err(malformed_error!(
                    "List start {} of owner {} is smaller than the previous start {}",
                    start,
                    index + 1,
                    previous
                ));
            }
            previous = start;
        }

        Ok(RangeIndex {
            starts: starts.into_iter().map(|start| start.max(1)).collect(),
            child_count,
        })
    }

    /// Child row ids held by the 1-based `owner`
    pub(crate) fn range(&self, owner: u32) -> std::ops::Range<u32> {
        let Some(index) = (owner as usize).checked_sub(1) else {
            return 0..0;
        };
        let Some(start) = self.starts.get(index) else {
            return 0..0;
        };
        let end = self
            .starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.child_count + 1);
        *start..end
    }

    /// The 1-based owner holding `child`, `None` for rows before the first range
    pub(crate) fn owner_of(&self, child: u32) -> Option<u32> {
        if child == 0 || child > self.child_count {
            return None;
        }

        // Owners with empty ranges share the start of their successor, the last of them wins
        let position = self.starts.partition_point(|start| *start <= child);
        if position == 0 {
            None
        } else {
            Some(position as u32)
        }
    }
}

/// Memoization and escrow state of one module
#[derive(Debug)]
pub(crate) struct MetadataCache {
    pub(crate) types: Vec<Option<TypeDefId>>,
    pub(crate) type_refs: Vec<Option<TypeRefId>>,
    pub(crate) fields: Vec<Option<FieldId>>,
    pub(crate) methods: Vec<Option<MethodId>>,
    pub(crate) params: Vec<Option<ParamId>>,
    pub(crate) properties: Vec<Option<PropertyId>>,
    pub(crate) events: Vec<Option<EventId>>,
    pub(crate) member_refs: Vec<Option<MemberRefId>>,
    pub(crate) method_specs: Vec<Option<MethodSpecId>>,
    pub(crate) generic_params: Vec<Option<GenericParamId>>,
    pub(crate) assembly_refs: Vec<Option<AssemblyRefId>>,
    pub(crate) module_refs: Vec<Option<ModuleRefId>>,
    escrows: Vec<Escrow>,
    /// `nested -> enclosing` from the NestedClass table
    enclosing: Option<HashMap<u32, u32>>,
    /// `TypeDef rid -> PropertyMap rid`
    property_maps: Option<HashMap<u32, u32>>,
    /// `TypeDef rid -> EventMap rid`
    event_maps: Option<HashMap<u32, u32>>,
    pub(crate) field_ranges: RangeIndex,
    pub(crate) method_ranges: RangeIndex,
    pub(crate) param_ranges: RangeIndex,
    pub(crate) property_ranges: RangeIndex,
    pub(crate) event_ranges: RangeIndex,
}

fn slots<T: Clone>(info: &TableInfo, table: TableId) -> Vec<Option<T>> {
    vec![None; info.row_count(table) as usize]
}

/// Memo lookup, `None` for rids outside the table
pub(crate) fn memo<T: Copy>(memo: &[Option<T>], rid: u32) -> Option<T> {
    memo.get((rid as usize).wrapping_sub(1)).copied().flatten()
}

/// Record the entity created for `rid`
pub(crate) fn remember<T>(memo: &mut [Option<T>], rid: u32, value: T) {
    if let Some(slot) = memo.get_mut((rid as usize).wrapping_sub(1)) {
        *slot = Some(value);
    }
}

impl MetadataCache {
    /// Size every memo table and build the range indexes
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for images using the `*Ptr` indirection tables,
    /// or a format error if a list column is inconsistent
    pub(crate) fn new(header: &TablesHeader, tables: &[u8]) -> Result<Self> {
        let info = &header.info;
        for table in [
            TableId::FieldPtr,
            TableId::MethodPtr,
            TableId::ParamPtr,
            TableId::EventPtr,
            TableId::PropertyPtr,
        ] {
            if info.row_count(table) > 0 {
                return Err(crate::Error::NotSupported);
            }
        }

        let type_defs = header.table::<TypeDefRaw>(tables)?;
        let mut field_starts = Vec::with_capacity(type_defs.row_count() as usize);
        let mut method_starts = Vec::with_capacity(type_defs.row_count() as usize);
        for row in type_defs.iter() {
            let row = row?;
            field_starts.push(row.field_list);
            method_starts.push(row.method_list);
        }

        let param_starts = header
            .table::<MethodDefRaw>(tables)?
            .iter()
            .map(|row| row.map(|row| row.param_list))
            .collect::<Result<Vec<_>>>()?;
        let property_starts = header
            .table::<PropertyMapRaw>(tables)?
            .iter()
            .map(|row| row.map(|row| row.property_list))
            .collect::<Result<Vec<_>>>()?;
        let event_starts = header
            .table::<EventMapRaw>(tables)?
            .iter()
            .map(|row| row.map(|row| row.event_list))
            .collect::<Result<Vec<_>>>()?;

        Ok(MetadataCache {
            types: slots(info, TableId::TypeDef),
            type_refs: slots(info, TableId::TypeRef),
            fields: slots(info, TableId::Field),
            methods: slots(info, TableId::MethodDef),
            params: slots(info, TableId::Param),
            properties: slots(info, TableId::Property),
            events: slots(info, TableId::Event),
            member_refs: slots(info, TableId::MemberRef),
            method_specs: slots(info, TableId::MethodSpec),
            generic_params: slots(info, TableId::GenericParam),
            assembly_refs: slots(info, TableId::AssemblyRef),
            module_refs: slots(info, TableId::ModuleRef),
            escrows: (0..EscrowKind::COUNT).map(|_| Escrow::default()).collect(),
            enclosing: None,
            property_maps: None,
            event_maps: None,
            field_ranges: RangeIndex::new(field_starts, info.row_count(TableId::Field))?,
            method_ranges: RangeIndex::new(method_starts, info.row_count(TableId::MethodDef))?,
            param_ranges: RangeIndex::new(param_starts, info.row_count(TableId::Param))?,
            property_ranges: RangeIndex::new(property_starts, info.row_count(TableId::Property))?,
            event_ranges: RangeIndex::new(event_starts, info.row_count(TableId::Event))?,
        })
    }

    /// The escrow of `kind`, scanning its table on first use
    ///
    /// # Errors
    /// Returns an error if a row of the table cannot be read
    pub(crate) fn escrow(
        &mut self,
        kind: EscrowKind,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<&mut Escrow> {
        let escrow = &mut self.escrows[kind as usize];
        if !escrow.is_populated() {
            populate(escrow, kind, header, tables)?;
            escrow.populated = true;
            tracing::debug!(
                table = ?kind.table(),
                owners = escrow.rows.len(),
                "populated escrow"
            );
        }
        Ok(escrow)
    }

    /// Populate every escrow up front
    ///
    /// # Errors
    /// Returns an error if a row of any escrowed table cannot be read
    pub(crate) fn populate_all(&mut self, header: &TablesHeader, tables: &[u8]) -> Result<()> {
        for kind in EscrowKind::iter() {
            self.escrow(kind, header, tables)?;
        }
        Ok(())
    }

    /// The enclosing type of the nested type `rid`
    ///
    /// # Errors
    /// Returns an error if the NestedClass table cannot be read
    pub(crate) fn enclosing_type(
        &mut self,
        rid: u32,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<Option<u32>> {
        if self.enclosing.is_none() {
            let mut enclosing = HashMap::new();
            for row in header.table::<NestedClassRaw>(tables)?.iter() {
                let row = row?;
                enclosing.insert(row.nested_class, row.enclosing_class);
            }
            self.enclosing = Some(enclosing);
        }

        Ok(self
            .enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.get(&rid).copied()))
    }

    /// The PropertyMap row of the type `rid`
    ///
    /// # Errors
    /// Returns an error if the PropertyMap table cannot be read
    pub(crate) fn property_map(
        &mut self,
        rid: u32,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<Option<u32>> {
        if self.property_maps.is_none() {
            let mut maps = HashMap::new();
            for row in header.table::<PropertyMapRaw>(tables)?.iter() {
                let row = row?;
                maps.insert(row.parent, row.rid);
            }
            self.property_maps = Some(maps);
        }

        Ok(self.property_maps.as_ref().and_then(|maps| maps.get(&rid).copied()))
    }

    /// The EventMap row of the type `rid`
    ///
    /// # Errors
    /// Returns an error if the EventMap table cannot be read
    pub(crate) fn event_map(
        &mut self,
        rid: u32,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<Option<u32>> {
        if self.event_maps.is_none() {
            let mut maps = HashMap::new();
            for row in header.table::<EventMapRaw>(tables)?.iter() {
                let row = row?;
                maps.insert(row.parent, row.rid);
            }
            self.event_maps = Some(maps);
        }

        Ok(self.event_maps.as_ref().and_then(|maps| maps.get(&rid).copied()))
    }

    /// The PropertyMap owner, as TypeDef rid, of the property `rid`
    pub(crate) fn property_owner(
        &self,
        rid: u32,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<Option<u32>> {
        let Some(map) = self.property_ranges.owner_of(rid) else {
            return Ok(None);
        };
        let row = header.table::<PropertyMapRaw>(tables)?.get(map)?;
        Ok(Some(row.parent))
    }

    /// The EventMap owner, as TypeDef rid, of the event `rid`
    pub(crate) fn event_owner(
        &self,
        rid: u32,
        header: &TablesHeader,
        tables: &[u8],
    ) -> Result<Option<u32>> {
        let Some(map) = self.event_ranges.owner_of(rid) else {
            return Ok(None);
        };
        let row = header.table::<EventMapRaw>(tables)?.get(map)?;
        Ok(Some(row.parent))
    }
}

fn scan<T, F>(escrow: &mut Escrow, header: &TablesHeader, tables: &[u8], owner: F) -> Result<()>
where
    T: RowDefinition,
    F: Fn(&T) -> Token,
{
    for row in header.table::<T>(tables)?.iter() {
        let row = row?;
        escrow.park(owner(&row), row.rid());
    }
    Ok(())
}

fn populate(
    escrow: &mut Escrow,
    kind: EscrowKind,
    header: &TablesHeader,
    tables: &[u8],
) -> Result<()> {
    match kind {
        EscrowKind::CustomAttribute => {
            scan::<CustomAttributeRaw, _>(escrow, header, tables, |row| row.parent)
        }
        EscrowKind::DeclSecurity => {
            scan::<DeclSecurityRaw, _>(escrow, header, tables, |row| row.parent)
        }
        EscrowKind::GenericParam => {
            scan::<GenericParamRaw, _>(escrow, header, tables, |row| row.owner)
        }
        EscrowKind::GenericParamConstraint => {
            scan::<GenericParamConstraintRaw, _>(escrow, header, tables, |row| {
                Token::from_parts(TableId::GenericParam, row.owner)
            })
        }
        EscrowKind::InterfaceImpl => scan::<InterfaceImplRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::TypeDef, row.class)
        }),
        EscrowKind::NestedClass => scan::<NestedClassRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::TypeDef, row.enclosing_class)
        }),
        EscrowKind::MethodSemantics => {
            scan::<MethodSemanticsRaw, _>(escrow, header, tables, |row| row.association)
        }
        EscrowKind::Constant => scan::<ConstantRaw, _>(escrow, header, tables, |row| row.parent),
        EscrowKind::FieldMarshal => {
            scan::<FieldMarshalRaw, _>(escrow, header, tables, |row| row.parent)
        }
        EscrowKind::ImplMap => {
            scan::<ImplMapRaw, _>(escrow, header, tables, |row| row.member_forwarded)
        }
        EscrowKind::FieldRva => scan::<FieldRvaRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::Field, row.field)
        }),
        EscrowKind::FieldLayout => scan::<FieldLayoutRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::Field, row.field)
        }),
        EscrowKind::ClassLayout => scan::<ClassLayoutRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::TypeDef, row.parent)
        }),
        EscrowKind::MethodImpl => scan::<MethodImplRaw, _>(escrow, header, tables, |row| {
            Token::from_parts(TableId::TypeDef, row.class)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_with_empty_owners() {
        // owner 1 empty, owner 2 holds 1..3, owner 3 holds 3..=4
        let index = RangeIndex::new(vec![1, 1, 3], 4).unwrap();

        assert_eq!(index.range(1), 1..1);
        assert_eq!(index.range(2), 1..3);
        assert_eq!(index.range(3), 3..5);
        assert_eq!(index.owner_of(1), Some(2));
        assert_eq!(index.owner_of(2), Some(2));
        assert_eq!(index.owner_of(4), Some(3));
        assert_eq!(index.owner_of(5), None);
        assert_eq!(index.owner_of(0), None);
    }

    #[test]
    fn empty_child_table() {
        let index = RangeIndex::new(vec![1, 1], 0).unwrap();
        assert!(index.range(1).is_empty());
        assert!(index.range(2).is_empty());

        let zero_starts = RangeIndex::new(vec![0, 0], 0).unwrap();
        assert!(zero_starts.range(2).is_empty());
    }

    #[test]
    fn invalid_ranges() {
        assert!(RangeIndex::new(vec![1, 5], 3).is_err());
        assert!(RangeIndex::new(vec![2, 1], 3).is_err());
    }

    #[test]
    fn escrow_take_once() {
        let mut escrow = Escrow::default();
        let owner = Token::from_parts(TableId::TypeDef, 2);
        escrow.park(owner, 4);
        escrow.park(owner, 7);

        assert!(escrow.contains(owner));
        assert_eq!(escrow.take(owner), vec![4, 7]);
        assert!(!escrow.contains(owner));
        assert!(escrow.take(owner).is_empty());
    }

    #[test]
    fn memo_slots() {
        let mut slots: Vec<Option<u32>> = vec![None; 3];
        remember(&mut slots, 2, 9);
        assert_eq!(memo(&slots, 2), Some(9));
        assert_eq!(memo(&slots, 1), None);
        assert_eq!(memo(&slots, 0), None);
        assert_eq!(memo(&slots, 4), None);
    }
}
