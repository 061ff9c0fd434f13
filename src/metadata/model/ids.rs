//! Arena identities and reference handles.
//!
//! Every entity of a [`crate::metadata::model::MetadataGraph`] lives in an arena and is
//! addressed through a small typed id. Ids are only meaningful for the module that handed
//! them out; moving an entity into another module always goes through the importer.

use std::fmt;

use crate::metadata::signatures::TypeSig;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                $name(index as u32)
            }

            /// Position of the entity inside its arena
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of a type definition
    TypeDefId
);
entity_id!(
    /// Identity of a type reference
    TypeRefId
);
entity_id!(
    /// Identity of a field definition
    FieldId
);
entity_id!(
    /// Identity of a method definition
    MethodId
);
entity_id!(
    /// Identity of a parameter definition
    ParamId
);
entity_id!(
    /// Identity of a property definition
    PropertyId
);
entity_id!(
    /// Identity of an event definition
    EventId
);
entity_id!(
    /// Identity of a member reference (field or method)
    MemberRefId
);
entity_id!(
    /// Identity of a generic method instantiation
    MethodSpecId
);
entity_id!(
    /// Identity of a generic parameter
    GenericParamId
);
entity_id!(
    /// Identity of an assembly reference
    AssemblyRefId
);
entity_id!(
    /// Identity of a module reference
    ModuleRefId
);

/// A type, either defined in the module or referenced from another scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    /// Defined in this module
    Definition(TypeDefId),
    /// Defined somewhere else
    Reference(TypeRefId),
}

/// A method, defined, referenced or instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodHandle {
    /// Defined in this module
    Definition(MethodId),
    /// A `MemberRef` with a method signature
    Reference(MemberRefId),
    /// A generic method instantiation
    Specification(MethodSpecId),
}

/// A field, defined or referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldHandle {
    /// Defined in this module
    Definition(FieldId),
    /// A `MemberRef` with a field signature
    Reference(MemberRefId),
}

/// Everything that can carry custom attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeOwner {
    /// The module itself
    Module,
    /// The assembly manifest
    Assembly,
    /// A type definition
    Type(TypeDefId),
    /// A field definition
    Field(FieldId),
    /// A method definition
    Method(MethodId),
    /// A parameter definition
    Parameter(ParamId),
    /// A property definition
    Property(PropertyId),
    /// An event definition
    Event(EventId),
    /// A generic parameter
    GenericParameter(GenericParamId),
    /// An implemented interface, by type and position in its interface list
    InterfaceImplementation(TypeDefId, usize),
    /// A generic constraint, by parameter and position in its constraint list
    GenericParameterConstraint(GenericParamId, usize),
    /// A security declaration, by owner and position in its declaration list
    SecurityDeclaration(SecurityOwner, usize),
    /// A type reference
    TypeReference(TypeRefId),
    /// A member reference
    MemberReference(MemberRefId),
    /// A generic method instantiation
    MethodSpecification(MethodSpecId),
    /// An assembly reference
    AssemblyReference(AssemblyRefId),
    /// A module reference
    ModuleReference(ModuleRefId),
    /// Position in [`crate::ModuleDefinition::type_specifications`]
    TypeSpecification(usize),
    /// Position in [`crate::ModuleDefinition::standalone_signatures`]
    StandAloneSignature(usize),
    /// Position in [`crate::ModuleDefinition::files`]
    File(usize),
    /// Position in [`crate::ModuleDefinition::exported_types`]
    ExportedType(usize),
    /// Position in [`crate::ModuleDefinition::resources`]
    ManifestResource(usize),
}

/// Everything that can carry security declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityOwner {
    /// The assembly manifest
    Assembly,
    /// A type definition
    Type(TypeDefId),
    /// A method definition
    Method(MethodId),
}

/// Owner of a generic parameter
///
/// `TypeReference` and `MethodReference` owners only exist on imported references, they are
/// never written to the `GenericParam` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericOwner {
    /// A generic type definition
    Type(TypeDefId),
    /// A generic method definition
    Method(MethodId),
    /// An imported generic type reference
    TypeReference(TypeRefId),
    /// An imported generic method reference
    MethodReference(MemberRefId),
}

/// Any entity a metadata token can name
#[derive(Debug, Clone, PartialEq)]
pub enum EntityHandle {
    /// The module row
    Module,
    /// The assembly manifest row
    Assembly,
    /// A type definition
    Type(TypeDefId),
    /// A type reference
    TypeReference(TypeRefId),
    /// A `TypeSpec` row, decoded
    TypeSpecification(TypeSig),
    /// A field definition
    Field(FieldId),
    /// A method definition
    Method(MethodId),
    /// A parameter definition
    Parameter(ParamId),
    /// A property definition
    Property(PropertyId),
    /// An event definition
    Event(EventId),
    /// A member reference
    MemberReference(MemberRefId),
    /// A generic method instantiation
    MethodSpecification(MethodSpecId),
    /// A generic parameter
    GenericParameter(GenericParamId),
    /// An assembly reference
    AssemblyReference(AssemblyRefId),
    /// A module reference
    ModuleReference(ModuleRefId),
    /// Index into the stand-alone signatures of the module
    StandAloneSignature(usize),
}

impl From<TypeDefId> for TypeHandle {
    fn from(id: TypeDefId) -> Self {
        TypeHandle::Definition(id)
    }
}

impl From<TypeRefId> for TypeHandle {
    fn from(id: TypeRefId) -> Self {
        TypeHandle::Reference(id)
    }
}

impl From<MethodId> for MethodHandle {
    fn from(id: MethodId) -> Self {
        MethodHandle::Definition(id)
    }
}

impl From<FieldId> for FieldHandle {
    fn from(id: FieldId) -> Self {
        FieldHandle::Definition(id)
    }
}
