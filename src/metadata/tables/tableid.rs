use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Identifier of a metadata table, as stored in the top byte of a
/// [`crate::metadata::token::Token`].
///
/// The discriminants follow ECMA-335 II.22. The Ptr and ENC tables are listed so that their
/// row sizes can be skipped when reading, even though nothing is materialized from them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// `Module` - the single row describing the current module
    Module = 0x00,
    /// `TypeRef` - references to types defined elsewhere
    TypeRef = 0x01,
    /// `TypeDef` - types defined in this module
    TypeDef = 0x02,
    /// `FieldPtr` - indirection table of uncompressed streams
    FieldPtr = 0x03,
    /// `Field` - field definitions
    Field = 0x04,
    /// `MethodPtr` - indirection table of uncompressed streams
    MethodPtr = 0x05,
    /// `MethodDef` - method definitions
    MethodDef = 0x06,
    /// `ParamPtr` - indirection table of uncompressed streams
    ParamPtr = 0x07,
    /// `Param` - parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` - interfaces implemented by a type
    InterfaceImpl = 0x09,
    /// `MemberRef` - references to fields and methods
    MemberRef = 0x0A,
    /// `Constant` - default values of fields, parameters and properties
    Constant = 0x0B,
    /// `CustomAttribute` - attribute instances
    CustomAttribute = 0x0C,
    /// `FieldMarshal` - marshalling descriptors
    FieldMarshal = 0x0D,
    /// `DeclSecurity` - declarative security permission sets
    DeclSecurity = 0x0E,
    /// `ClassLayout` - explicit type layouts
    ClassLayout = 0x0F,
    /// `FieldLayout` - explicit field offsets
    FieldLayout = 0x10,
    /// `StandAloneSig` - signatures not attached to a member
    StandAloneSig = 0x11,
    /// `EventMap` - maps types to their event range
    EventMap = 0x12,
    /// `EventPtr` - indirection table of uncompressed streams
    EventPtr = 0x13,
    /// `Event` - event definitions
    Event = 0x14,
    /// `PropertyMap` - maps types to their property range
    PropertyMap = 0x15,
    /// `PropertyPtr` - indirection table of uncompressed streams
    PropertyPtr = 0x16,
    /// `Property` - property definitions
    Property = 0x17,
    /// `MethodSemantics` - getter/setter/adder/remover associations
    MethodSemantics = 0x18,
    /// `MethodImpl` - explicit method overrides
    MethodImpl = 0x19,
    /// `ModuleRef` - references to other modules
    ModuleRef = 0x1A,
    /// `TypeSpec` - constructed types used as tokens
    TypeSpec = 0x1B,
    /// `ImplMap` - P/Invoke mappings
    ImplMap = 0x1C,
    /// `FieldRVA` - initial data of fields
    FieldRVA = 0x1D,
    /// `EncLog` - edit-and-continue log
    EncLog = 0x1E,
    /// `EncMap` - edit-and-continue map
    EncMap = 0x1F,
    /// `Assembly` - the assembly manifest
    Assembly = 0x20,
    /// `AssemblyProcessor` - unused by modern tooling
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` - unused by modern tooling
    AssemblyOS = 0x22,
    /// `AssemblyRef` - referenced assemblies
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` - unused by modern tooling
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` - unused by modern tooling
    AssemblyRefOS = 0x25,
    /// `File` - files of a multi-module assembly
    File = 0x26,
    /// `ExportedType` - types exported or forwarded by the assembly
    ExportedType = 0x27,
    /// `ManifestResource` - embedded or linked resources
    ManifestResource = 0x28,
    /// `NestedClass` - nesting relation between types
    NestedClass = 0x29,
    /// `GenericParam` - generic parameters of types and methods
    GenericParam = 0x2A,
    /// `MethodSpec` - generic method instantiations
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` - constraints of generic parameters
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Map a table byte back to its id
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        TableId::iter().find(|table| *table as u8 == value)
    }

    /// Bit of this table in the `valid` and `sorted` vectors of the table stream header
    #[must_use]
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Tables which ECMA-335 II.22 requires to be sorted by their primary key
    #[must_use]
    pub fn requires_sorting(self) -> bool {
        matches!(
            self,
            TableId::InterfaceImpl
                | TableId::Constant
                | TableId::CustomAttribute
                | TableId::FieldMarshal
                | TableId::DeclSecurity
                | TableId::ClassLayout
                | TableId::FieldLayout
                | TableId::MethodSemantics
                | TableId::MethodImpl
                | TableId::ImplMap
                | TableId::FieldRVA
                | TableId::NestedClass
                | TableId::GenericParam
                | TableId::GenericParamConstraint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ids() {
        assert_eq!(TableId::COUNT, 0x2D);
        for (index, table) in TableId::iter().enumerate() {
            assert_eq!(table as usize, index);
            assert_eq!(TableId::from_u8(index as u8), Some(table));
        }
        assert_eq!(TableId::from_u8(0x2D), None);
    }

    #[test]
    fn sorted_tables() {
        assert!(TableId::GenericParam.requires_sorting());
        assert!(TableId::CustomAttribute.requires_sorting());
        assert!(!TableId::TypeRef.requires_sorting());
        assert_eq!(TableId::NestedClass.bit(), 1 << 0x29);
    }
}
