//! Raw row layouts of every metadata table (ECMA-335 II.22).
//!
//! Each table is described once in [`table_rows!`] as a list of typed columns. The macro
//! generates the `*Raw` struct together with its [`RowDefinition`] implementation, so the read
//! side and the write side of a row can never disagree on column order or width.
//!
//! Column kinds:
//! - `u16` / `u32`: fixed width constants and flags
//! - `string` / `blob` / `guid`: heap indexes, 2 or 4 bytes depending on the heap size flags
//! - `index(Table)`: a plain row index, 4 bytes once `Table` has more than `0xFFFF` rows
//! - `coded(Kind)`: a coded index, decoded into a [`Token`]

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        writer::Writer,
    },
    metadata::{
        tables::{CodedIndexType, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// Read and write access to one row of a metadata table.
pub trait RowDefinition: Sized {
    /// The table this row belongs to
    const TABLE: TableId;

    /// Size of one row in bytes under the given layout
    fn row_size(sizes: &TableInfo) -> u32;

    /// Decode one row starting at `offset`, advancing it by [`RowDefinition::row_size`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated data or [`crate::Error::Malformed`]
    /// for an invalid coded index tag
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;

    /// Encode this row with the given layout
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if a value does not fit its column
    fn row_write(&self, writer: &mut Writer, sizes: &TableInfo) -> Result<()>;

    /// The row id this row was read from, 0 for rows built in memory
    fn rid(&self) -> u32;

    /// The token of this row
    fn token(&self) -> Token {
        Token::from_parts(Self::TABLE, self.rid())
    }
}

macro_rules! column_type {
    (u16) => { u16 };
    (u32) => { u32 };
    (string) => { u32 };
    (blob) => { u32 };
    (guid) => { u32 };
    (index($table:ident)) => { u32 };
    (coded($kind:ident)) => { Token };
}

macro_rules! column_size {
    ($sizes:ident, u16) => { 2u32 };
    ($sizes:ident, u32) => { 4u32 };
    ($sizes:ident, string) => { u32::from($sizes.str_width()) };
    ($sizes:ident, blob) => { u32::from($sizes.blob_width()) };
    ($sizes:ident, guid) => { u32::from($sizes.guid_width()) };
    ($sizes:ident, index($table:ident)) => { u32::from($sizes.index_width(TableId::$table)) };
    ($sizes:ident, coded($kind:ident)) => { u32::from($sizes.coded_width(CodedIndexType::$kind)) };
}

macro_rules! column_read {
    ($data:ident, $offset:ident, $sizes:ident, u16) => {
        read_le_at::<u16>($data, $offset)?
    };
    ($data:ident, $offset:ident, $sizes:ident, u32) => {
        read_le_at::<u32>($data, $offset)?
    };
    ($data:ident, $offset:ident, $sizes:ident, string) => {
        read_le_at_dyn($data, $offset, $sizes.str_width() == 4)?
    };
    ($data:ident, $offset:ident, $sizes:ident, blob) => {
        read_le_at_dyn($data, $offset, $sizes.blob_width() == 4)?
    };
    ($data:ident, $offset:ident, $sizes:ident, guid) => {
        read_le_at_dyn($data, $offset, $sizes.guid_width() == 4)?
    };
    ($data:ident, $offset:ident, $sizes:ident, index($table:ident)) => {
        read_le_at_dyn($data, $offset, $sizes.index_width(TableId::$table) == 4)?
    };
    ($data:ident, $offset:ident, $sizes:ident, coded($kind:ident)) => {
        CodedIndexType::$kind.decompress(read_le_at_dyn(
            $data,
            $offset,
            $sizes.coded_width(CodedIndexType::$kind) == 4,
        )?)?
    };
}

macro_rules! column_write {
    ($writer:ident, $sizes:ident, $value:expr, u16) => {
        $writer.write_le::<u16>($value)
    };
    ($writer:ident, $sizes:ident, $value:expr, u32) => {
        $writer.write_le::<u32>($value)
    };
    ($writer:ident, $sizes:ident, $value:expr, string) => {
        $writer.write_le_dyn($value, $sizes.str_width() == 4)?
    };
    ($writer:ident, $sizes:ident, $value:expr, blob) => {
        $writer.write_le_dyn($value, $sizes.blob_width() == 4)?
    };
    ($writer:ident, $sizes:ident, $value:expr, guid) => {
        $writer.write_le_dyn($value, $sizes.guid_width() == 4)?
    };
    ($writer:ident, $sizes:ident, $value:expr, index($table:ident)) => {
        $writer.write_le_dyn($value, $sizes.index_width(TableId::$table) == 4)?
    };
    ($writer:ident, $sizes:ident, $value:expr, coded($kind:ident)) => {
        $writer.write_le_dyn(
            CodedIndexType::$kind.compress($value)?,
            $sizes.coded_width(CodedIndexType::$kind) == 4,
        )?
    };
}

macro_rules! table_rows {
    ($(
        $(#[$meta:meta])*
        $name:ident = $table:ident {
            $( $(#[$fmeta:meta])* $field:ident : $kind:ident $(($arg:ident))? ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Debug, PartialEq, Eq, Default)]
            pub struct $name {
                /// Row id, 0 for rows built in memory
                pub rid: u32,
                $(
                    $(#[$fmeta])*
                    pub $field: column_type!($kind $(($arg))?),
                )*
            }

            impl RowDefinition for $name {
                const TABLE: TableId = TableId::$table;

                #[allow(unused_variables)]
                fn row_size(sizes: &TableInfo) -> u32 {
                    0 $( + column_size!(sizes, $kind $(($arg))?) )*
                }

                #[allow(unused_variables)]
                fn row_read(
                    data: &[u8],
                    offset: &mut usize,
                    rid: u32,
                    sizes: &TableInfo,
                ) -> Result<Self> {
                    Ok($name {
                        rid,
                        $( $field: column_read!(data, offset, sizes, $kind $(($arg))?), )*
                    })
                }

                #[allow(unused_variables)]
                fn row_write(&self, writer: &mut Writer, sizes: &TableInfo) -> Result<()> {
                    $( column_write!(writer, sizes, self.$field, $kind $(($arg))?); )*
                    Ok(())
                }

                fn rid(&self) -> u32 {
                    self.rid
                }
            }
        )*

        /// Size in bytes of one row of `table` under the given layout
        #[must_use]
        pub fn row_size(table: TableId, sizes: &TableInfo) -> u32 {
            match table {
                $( TableId::$table => <$name as RowDefinition>::row_size(sizes), )*
            }
        }
    };
}

table_rows! {
    /// `Module` (0x00)
    ModuleRaw = Module {
        /// Reserved, always 0
        generation: u16,
        /// Module name
        name: string,
        /// Module version id
        mvid: guid,
        /// Edit-and-continue id
        enc_id: guid,
        /// Edit-and-continue base id
        enc_base_id: guid,
    }

    /// `TypeRef` (0x01)
    TypeRefRaw = TypeRef {
        /// Where the type is defined
        resolution_scope: coded(ResolutionScope),
        /// Type name
        type_name: string,
        /// Type namespace
        type_namespace: string,
    }

    /// `TypeDef` (0x02)
    TypeDefRaw = TypeDef {
        /// `TypeAttributes`
        flags: u32,
        /// Type name
        type_name: string,
        /// Type namespace
        type_namespace: string,
        /// Base type
        extends: coded(TypeDefOrRef),
        /// First field owned by this type
        field_list: index(Field),
        /// First method owned by this type
        method_list: index(MethodDef),
    }

    /// `FieldPtr` (0x03)
    FieldPtrRaw = FieldPtr {
        /// Indirected field
        field: index(Field),
    }

    /// `Field` (0x04)
    FieldRaw = Field {
        /// `FieldAttributes`
        flags: u16,
        /// Field name
        name: string,
        /// Field signature
        signature: blob,
    }

    /// `MethodPtr` (0x05)
    MethodPtrRaw = MethodPtr {
        /// Indirected method
        method: index(MethodDef),
    }

    /// `MethodDef` (0x06)
    MethodDefRaw = MethodDef {
        /// RVA of the method body
        rva: u32,
        /// `MethodImplAttributes`
        impl_flags: u16,
        /// `MethodAttributes`
        flags: u16,
        /// Method name
        name: string,
        /// Method signature
        signature: blob,
        /// First parameter owned by this method
        param_list: index(Param),
    }

    /// `ParamPtr` (0x07)
    ParamPtrRaw = ParamPtr {
        /// Indirected parameter
        param: index(Param),
    }

    /// `Param` (0x08)
    ParamRaw = Param {
        /// `ParamAttributes`
        flags: u16,
        /// 0 for the return value, 1-based for parameters
        sequence: u16,
        /// Parameter name
        name: string,
    }

    /// `InterfaceImpl` (0x09)
    InterfaceImplRaw = InterfaceImpl {
        /// Implementing type
        class: index(TypeDef),
        /// Implemented interface
        interface: coded(TypeDefOrRef),
    }

    /// `MemberRef` (0x0A)
    MemberRefRaw = MemberRef {
        /// Declaring type, module or vararg method definition
        class: coded(MemberRefParent),
        /// Member name
        name: string,
        /// Field or method signature
        signature: blob,
    }

    /// `Constant` (0x0B)
    ConstantRaw = Constant {
        /// Element type in the low byte, padding in the high byte
        kind: u16,
        /// Owner of the constant
        parent: coded(HasConstant),
        /// Encoded value
        value: blob,
    }

    /// `CustomAttribute` (0x0C)
    CustomAttributeRaw = CustomAttribute {
        /// Owner of the attribute
        parent: coded(HasCustomAttribute),
        /// Attribute constructor
        constructor: coded(CustomAttributeType),
        /// Encoded arguments
        value: blob,
    }

    /// `FieldMarshal` (0x0D)
    FieldMarshalRaw = FieldMarshal {
        /// Marshalled field or parameter
        parent: coded(HasFieldMarshal),
        /// Native type descriptor
        native_type: blob,
    }

    /// `DeclSecurity` (0x0E)
    DeclSecurityRaw = DeclSecurity {
        /// `SecurityAction`
        action: u16,
        /// Owner of the permission set
        parent: coded(HasDeclSecurity),
        /// Encoded permission set
        permission_set: blob,
    }

    /// `ClassLayout` (0x0F)
    ClassLayoutRaw = ClassLayout {
        /// Field alignment
        packing_size: u16,
        /// Total size
        class_size: u32,
        /// Laid out type
        parent: index(TypeDef),
    }

    /// `FieldLayout` (0x10)
    FieldLayoutRaw = FieldLayout {
        /// Byte offset of the field
        field_offset: u32,
        /// Laid out field
        field: index(Field),
    }

    /// `StandAloneSig` (0x11)
    StandAloneSigRaw = StandAloneSig {
        /// Signature blob
        signature: blob,
    }

    /// `EventMap` (0x12)
    EventMapRaw = EventMap {
        /// Owning type
        parent: index(TypeDef),
        /// First event owned by the type
        event_list: index(Event),
    }

    /// `EventPtr` (0x13)
    EventPtrRaw = EventPtr {
        /// Indirected event
        event: index(Event),
    }

    /// `Event` (0x14)
    EventRaw = Event {
        /// `EventAttributes`
        flags: u16,
        /// Event name
        name: string,
        /// Delegate type
        event_type: coded(TypeDefOrRef),
    }

    /// `PropertyMap` (0x15)
    PropertyMapRaw = PropertyMap {
        /// Owning type
        parent: index(TypeDef),
        /// First property owned by the type
        property_list: index(Property),
    }

    /// `PropertyPtr` (0x16)
    PropertyPtrRaw = PropertyPtr {
        /// Indirected property
        property: index(Property),
    }

    /// `Property` (0x17)
    PropertyRaw = Property {
        /// `PropertyAttributes`
        flags: u16,
        /// Property name
        name: string,
        /// Property signature
        signature: blob,
    }

    /// `MethodSemantics` (0x18)
    MethodSemanticsRaw = MethodSemantics {
        /// `MethodSemanticsAttributes`
        semantics: u16,
        /// Accessor method
        method: index(MethodDef),
        /// Owning event or property
        association: coded(HasSemantics),
    }

    /// `MethodImpl` (0x19)
    MethodImplRaw = MethodImpl {
        /// Type declaring the override
        class: index(TypeDef),
        /// Implementing method
        method_body: coded(MethodDefOrRef),
        /// Overridden declaration
        method_declaration: coded(MethodDefOrRef),
    }

    /// `ModuleRef` (0x1A)
    ModuleRefRaw = ModuleRef {
        /// Module name
        name: string,
    }

    /// `TypeSpec` (0x1B)
    TypeSpecRaw = TypeSpec {
        /// Type signature
        signature: blob,
    }

    /// `ImplMap` (0x1C)
    ImplMapRaw = ImplMap {
        /// `PInvokeAttributes`
        mapping_flags: u16,
        /// Forwarded field or method
        member_forwarded: coded(MemberForwarded),
        /// Entry point name
        import_name: string,
        /// Native module
        import_scope: index(ModuleRef),
    }

    /// `FieldRVA` (0x1D)
    FieldRvaRaw = FieldRVA {
        /// RVA of the initial data
        rva: u32,
        /// Owning field
        field: index(Field),
    }

    /// `EncLog` (0x1E)
    EncLogRaw = EncLog {
        /// Edited token
        token: u32,
        /// Edit operation
        func_code: u32,
    }

    /// `EncMap` (0x1F)
    EncMapRaw = EncMap {
        /// Mapped token
        token: u32,
    }

    /// `Assembly` (0x20)
    AssemblyRaw = Assembly {
        /// `AssemblyHashAlgorithm`
        hash_alg_id: u32,
        /// Major version
        major_version: u16,
        /// Minor version
        minor_version: u16,
        /// Build number
        build_number: u16,
        /// Revision number
        revision_number: u16,
        /// `AssemblyFlags`
        flags: u32,
        /// Full public key
        public_key: blob,
        /// Assembly name
        name: string,
        /// Culture
        culture: string,
    }

    /// `AssemblyProcessor` (0x21)
    AssemblyProcessorRaw = AssemblyProcessor {
        /// Processor id
        processor: u32,
    }

    /// `AssemblyOS` (0x22)
    AssemblyOsRaw = AssemblyOS {
        /// Platform id
        os_platform_id: u32,
        /// Major OS version
        os_major_version: u32,
        /// Minor OS version
        os_minor_version: u32,
    }

    /// `AssemblyRef` (0x23)
    AssemblyRefRaw = AssemblyRef {
        /// Major version
        major_version: u16,
        /// Minor version
        minor_version: u16,
        /// Build number
        build_number: u16,
        /// Revision number
        revision_number: u16,
        /// `AssemblyFlags`
        flags: u32,
        /// Public key or token
        public_key_or_token: blob,
        /// Assembly name
        name: string,
        /// Culture
        culture: string,
        /// Hash of the referenced assembly
        hash_value: blob,
    }

    /// `AssemblyRefProcessor` (0x24)
    AssemblyRefProcessorRaw = AssemblyRefProcessor {
        /// Processor id
        processor: u32,
        /// Owning reference
        assembly_ref: index(AssemblyRef),
    }

    /// `AssemblyRefOS` (0x25)
    AssemblyRefOsRaw = AssemblyRefOS {
        /// Platform id
        os_platform_id: u32,
        /// Major OS version
        os_major_version: u32,
        /// Minor OS version
        os_minor_version: u32,
        /// Owning reference
        assembly_ref: index(AssemblyRef),
    }

    /// `File` (0x26)
    FileRaw = File {
        /// `FileAttributes`
        flags: u32,
        /// File name
        name: string,
        /// Hash of the file
        hash_value: blob,
    }

    /// `ExportedType` (0x27)
    ExportedTypeRaw = ExportedType {
        /// `TypeAttributes`
        flags: u32,
        /// Hint into the TypeDef table of the defining module
        type_def_id: u32,
        /// Type name
        type_name: string,
        /// Type namespace
        type_namespace: string,
        /// Where the type lives
        implementation: coded(Implementation),
    }

    /// `ManifestResource` (0x28)
    ManifestResourceRaw = ManifestResource {
        /// Offset inside the resource section
        offset: u32,
        /// `ManifestResourceAttributes`
        flags: u32,
        /// Resource name
        name: string,
        /// Where the resource lives, null for embedded resources
        implementation: coded(Implementation),
    }

    /// `NestedClass` (0x29)
    NestedClassRaw = NestedClass {
        /// Nested type
        nested_class: index(TypeDef),
        /// Enclosing type
        enclosing_class: index(TypeDef),
    }

    /// `GenericParam` (0x2A)
    GenericParamRaw = GenericParam {
        /// Position among the owner's generic parameters
        number: u16,
        /// `GenericParamAttributes`
        flags: u16,
        /// Owning type or method
        owner: coded(TypeOrMethodDef),
        /// Parameter name
        name: string,
    }

    /// `MethodSpec` (0x2B)
    MethodSpecRaw = MethodSpec {
        /// Instantiated generic method
        method: coded(MethodDefOrRef),
        /// Instantiation signature
        instantiation: blob,
    }

    /// `GenericParamConstraint` (0x2C)
    GenericParamConstraintRaw = GenericParamConstraint {
        /// Constrained parameter
        owner: index(GenericParam),
        /// Constraint type
        constraint: coded(TypeDefOrRef),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::tableinfo::{HEAP_LARGE_BLOB, HEAP_LARGE_STRINGS};

    #[test]
    fn crafted_short() {
        #[rustfmt::skip]
        let data = vec![
            0x00, 0x00, 0x00, 0x01, // flags
            0x42, 0x00,             // type_name
            0x43, 0x00,             // type_namespace
            0x05, 0x00,             // extends
            0x00, 0x03,             // field_list
            0x00, 0x04,             // method_list
        ];

        let sizes = TableInfo::new(&[(TableId::Field, 1), (TableId::MethodDef, 1)], 0);
        assert_eq!(TypeDefRaw::row_size(&sizes), 14);

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(offset, 14);
        assert_eq!(row.token().value(), 0x0200_0001);
        assert_eq!(row.flags, 0x0100_0000);
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends, Token::from_parts(TableId::TypeRef, 1));
        assert_eq!(row.field_list, 0x0300);
        assert_eq!(row.method_list, 0x0400);

        let mut writer = Writer::new();
        row.row_write(&mut writer, &sizes).unwrap();
        assert_eq!(writer.as_slice(), data.as_slice());
    }

    #[test]
    fn crafted_long() {
        #[rustfmt::skip]
        let data = vec![
            0x21, 0x00, 0x00, 0x00, // parent
            0x0B, 0x00, 0x00, 0x00, // constructor
            0x10, 0x00, 0x00, 0x00, // value
        ];

        let sizes = TableInfo::new(
            &[(TableId::MethodDef, 0x1_0000), (TableId::TypeDef, 0x1000)],
            HEAP_LARGE_BLOB | HEAP_LARGE_STRINGS,
        );
        assert_eq!(CustomAttributeRaw::row_size(&sizes), 12);

        let mut offset = 0;
        let row = CustomAttributeRaw::row_read(&data, &mut offset, 7, &sizes).unwrap();
        assert_eq!(row.parent, Token::from_parts(TableId::Field, 1));
        assert_eq!(row.constructor, Token::from_parts(TableId::MemberRef, 1));
        assert_eq!(row.value, 0x10);
        assert_eq!(row.token().value(), 0x0C00_0007);

        let mut writer = Writer::new();
        row.row_write(&mut writer, &sizes).unwrap();
        assert_eq!(writer.as_slice(), data.as_slice());
    }

    #[test]
    fn sizes_follow_layout() {
        let small = TableInfo::new(&[], 0);
        assert_eq!(row_size(TableId::Module, &small), 10);
        assert_eq!(row_size(TableId::Assembly, &small), 22);
        assert_eq!(row_size(TableId::AssemblyRef, &small), 20);
        assert_eq!(row_size(TableId::GenericParam, &small), 8);

        let large = TableInfo::new(&[(TableId::TypeDef, 0x1_0000)], 0);
        assert_eq!(row_size(TableId::NestedClass, &large), 8);
        assert_eq!(row_size(TableId::GenericParam, &large), 10);
    }

    #[test]
    fn truncated_row() {
        let sizes = TableInfo::new(&[], 0);
        let mut offset = 0;
        assert!(FieldRaw::row_read(&[0x01, 0x00, 0x02], &mut offset, 1, &sizes).is_err());
    }
}
