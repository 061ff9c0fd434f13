//! Row buffers of the table stream being built.
//!
//! Rows are collected per table in emission order. Tables with a primary key are sorted once
//! all rows are known. The keys are compressed coded index values or plain row ids, so the
//! resulting order is the one ECMA-335 II.22 prescribes for sorted tables.

use crate::{
    file::writer::Writer,
    metadata::{
        streams::TablesHeader,
        tables::{
            AssemblyRaw, AssemblyRefRaw, ClassLayoutRaw, CodedIndexType, ConstantRaw,
            CustomAttributeRaw, DeclSecurityRaw, EventMapRaw, EventRaw, ExportedTypeRaw,
            FieldLayoutRaw, FieldMarshalRaw, FieldRaw, FieldRvaRaw, FileRaw,
            GenericParamConstraintRaw, GenericParamRaw, ImplMapRaw, InterfaceImplRaw,
            ManifestResourceRaw, MemberRefRaw, MethodDefRaw, MethodImplRaw, MethodSemanticsRaw,
            MethodSpecRaw, ModuleRaw, ModuleRefRaw, NestedClassRaw, ParamRaw, PropertyMapRaw,
            PropertyRaw, RowDefinition, StandAloneSigRaw, TableId, TableInfo, TypeDefRaw,
            TypeRefRaw, TypeSpecRaw,
        },
    },
    Result,
};

use strum::IntoEnumIterator;

/// Stable sort of `rows` by a fallible key
fn sort_rows<T>(rows: &mut Vec<T>, key: impl Fn(&T) -> Result<(u32, u32)>) -> Result<()> {
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        keyed.push((key(&row)?, row));
    }
    keyed.sort_by_key(|(key, _)| *key);
    rows.extend(keyed.into_iter().map(|(_, row)| row));
    Ok(())
}

macro_rules! table_buffers {
    ($($field:ident: $raw:ty),* $(,)?) => {
        /// Rows of every table the builder emits, declared in table id order
        #[derive(Debug, Default)]
        pub(crate) struct TableRows {
            $( pub(crate) $field: Vec<$raw>, )*
        }

        impl TableRows {
            /// Row count of every non-empty table
            pub(crate) fn row_counts(&self) -> Result<Vec<(TableId, u32)>> {
                let mut counts = Vec::new();
                $(
                    if !self.$field.is_empty() {
                        let Ok(count) = u32::try_from(self.$field.len()) else {
                            return Err(invalid_operation!(
                                "too many rows in {:?}",
                                <$raw as RowDefinition>::TABLE
                            ));
                        };
                        counts.push((<$raw as RowDefinition>::TABLE, count));
                    }
                )*
                Ok(counts)
            }

            fn write_rows(&self, writer: &mut Writer, info: &TableInfo) -> Result<()> {
                $(
                    for row in &self.$field {
                        row.row_write(writer, info)?;
                    }
                )*
                Ok(())
            }
        }
    };
}

table_buffers! {
    module: ModuleRaw,
    type_ref: TypeRefRaw,
    type_def: TypeDefRaw,
    field: FieldRaw,
    method_def: MethodDefRaw,
    param: ParamRaw,
    interface_impl: InterfaceImplRaw,
    member_ref: MemberRefRaw,
    constant: ConstantRaw,
    custom_attribute: CustomAttributeRaw,
    field_marshal: FieldMarshalRaw,
    decl_security: DeclSecurityRaw,
    class_layout: ClassLayoutRaw,
    field_layout: FieldLayoutRaw,
    standalone_sig: StandAloneSigRaw,
    event_map: EventMapRaw,
    event: EventRaw,
    property_map: PropertyMapRaw,
    property: PropertyRaw,
    method_semantics: MethodSemanticsRaw,
    method_impl: MethodImplRaw,
    module_ref: ModuleRefRaw,
    type_spec: TypeSpecRaw,
    impl_map: ImplMapRaw,
    field_rva: FieldRvaRaw,
    assembly: AssemblyRaw,
    assembly_ref: AssemblyRefRaw,
    file: FileRaw,
    exported_type: ExportedTypeRaw,
    manifest_resource: ManifestResourceRaw,
    nested_class: NestedClassRaw,
    generic_param: GenericParamRaw,
    method_spec: MethodSpecRaw,
    generic_param_constraint: GenericParamConstraintRaw,
}

impl TableRows {
    /// Bring every keyed table into primary key order.
    ///
    /// `GenericParam` is left alone: its row ids are referenced by constraints and attributes,
    /// so the builder orders it before those rows exist.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if a coded column holds a token its kind
    /// cannot encode
    pub(crate) fn sort(&mut self) -> Result<()> {
        sort_rows(&mut self.interface_impl, |row| {
            Ok((row.class, CodedIndexType::TypeDefOrRef.compress(row.interface)?))
        })?;
        sort_rows(&mut self.constant, |row| {
            Ok((CodedIndexType::HasConstant.compress(row.parent)?, 0))
        })?;
        sort_rows(&mut self.custom_attribute, |row| {
            Ok((CodedIndexType::HasCustomAttribute.compress(row.parent)?, 0))
        })?;
        sort_rows(&mut self.field_marshal, |row| {
            Ok((CodedIndexType::HasFieldMarshal.compress(row.parent)?, 0))
        })?;
        sort_rows(&mut self.decl_security, |row| {
            Ok((CodedIndexType::HasDeclSecurity.compress(row.parent)?, 0))
        })?;
        sort_rows(&mut self.class_layout, |row| Ok((row.parent, 0)))?;
        sort_rows(&mut self.field_layout, |row| Ok((row.field, 0)))?;
        sort_rows(&mut self.method_semantics, |row| {
            Ok((CodedIndexType::HasSemantics.compress(row.association)?, 0))
        })?;
        sort_rows(&mut self.method_impl, |row| Ok((row.class, 0)))?;
        sort_rows(&mut self.impl_map, |row| {
            Ok((CodedIndexType::MemberForwarded.compress(row.member_forwarded)?, 0))
        })?;
        sort_rows(&mut self.field_rva, |row| Ok((row.field, 0)))?;
        sort_rows(&mut self.nested_class, |row| Ok((row.nested_class, 0)))?;
        sort_rows(&mut self.generic_param_constraint, |row| Ok((row.owner, 0)))?;
        Ok(())
    }

    /// Layout of the table stream for these rows and the given heap size flags
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if a table overflows the row id space
    pub(crate) fn table_info(&self, heap_sizes: u8) -> Result<TableInfo> {
        Ok(TableInfo::new(&self.row_counts()?, heap_sizes))
    }

    /// Serialize the complete `#~` stream
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if a value does not fit its column
    pub(crate) fn write(&self, info: &TableInfo, version: (u8, u8)) -> Result<Vec<u8>> {
        let sorted = TableId::iter()
            .filter(|table| table.requires_sorting())
            .fold(0u64, |mask, table| mask | table.bit());

        let mut writer = Writer::new();
        TablesHeader::write(&mut writer, info, sorted, version);
        self.write_rows(&mut writer, info)?;
        writer.align(4);
        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    #[test]
    fn sorts_by_coded_parent() {
        let mut rows = TableRows::default();
        rows.custom_attribute.push(CustomAttributeRaw {
            parent: Token::new(0x0200_0001),
            constructor: Token::new(0x0A00_0001),
            value: 1,
            ..Default::default()
        });
        rows.custom_attribute.push(CustomAttributeRaw {
            parent: Token::new(0x0600_0001),
            constructor: Token::new(0x0A00_0001),
            value: 2,
            ..Default::default()
        });
        rows.custom_attribute.push(CustomAttributeRaw {
            parent: Token::new(0x0200_0001),
            constructor: Token::new(0x0A00_0001),
            value: 3,
            ..Default::default()
        });

        rows.sort().unwrap();

        // MethodDef has HasCustomAttribute tag 0, TypeDef tag 3
        let values: Vec<u32> = rows.custom_attribute.iter().map(|row| row.value).collect();
        assert_eq!(values, [2, 1, 3]);
    }

    #[test]
    fn rejects_foreign_parent() {
        let mut rows = TableRows::default();
        rows.constant.push(ConstantRaw {
            parent: Token::new(0x0600_0001),
            ..Default::default()
        });

        assert!(rows.sort().is_err());
    }

    #[test]
    fn crafted() {
        let mut rows = TableRows::default();
        rows.module.push(ModuleRaw {
            name: 1,
            mvid: 1,
            ..Default::default()
        });
        rows.type_ref.push(TypeRefRaw {
            resolution_scope: Token::new(0x2300_0001),
            type_name: 8,
            type_namespace: 15,
            ..Default::default()
        });

        let info = rows.table_info(0).unwrap();
        let data = rows.write(&info, (2, 0)).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x00, 0x00, 0x00, 0x00,                         // reserved
            0x02, 0x00,                                     // version
            0x00,                                           // heap sizes
            0x01,                                           // reserved
            0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // valid: Module, TypeRef
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // sorted, masked by valid
            0x01, 0x00, 0x00, 0x00,                         // Module rows
            0x01, 0x00, 0x00, 0x00,                         // TypeRef rows
            // Module
            0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            // TypeRef: AssemblyRef 1 is ResolutionScope tag 2
            0x06, 0x00, 0x08, 0x00, 0x0F, 0x00,
        ];
        assert_eq!(data, expected);
    }
}
