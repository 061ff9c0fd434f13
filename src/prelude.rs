//! # dotmeta Prelude
//!
//! The types needed to open, inspect, build and write a module, for glob imports.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotmeta operations
pub use crate::Error;

/// The result type used throughout dotmeta
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The module facade
pub use crate::metadata::module::ModuleDefinition;

/// Reader and writer configuration
pub use crate::metadata::options::{ReaderOptions, ReadingMode, WriterOptions};

/// Cross-module resolution
pub use crate::metadata::resolver::{
    resolve_field, resolve_method, resolve_type, AssemblyResolver, DefaultAssemblyResolver,
    ModuleRc, ResolvedField, ResolvedMethod, ResolvedType,
};

/// Copying references between modules
pub use crate::metadata::importer::Importer;

// ================================================================================================
// Object Graph
// ================================================================================================

/// Entity ids and handles
pub use crate::metadata::model::{
    AssemblyRefId, AttributeOwner, EventId, FieldHandle, FieldId, GenericOwner, GenericParamId,
    MemberRefId, MethodHandle, MethodId, MethodSpecId, ModuleRefId, ParamId, PropertyId,
    SecurityOwner, TypeDefId, TypeHandle, TypeRefId,
};

/// Definitions and references
pub use crate::metadata::model::{
    AssemblyDefinition, AssemblyNameReference, AssemblyVersion, EventDefinition, ExportedType,
    FieldDefinition, GenericParameter, Implementation, ManifestResource, MemberRefParent,
    MemberReference, MethodDefinition, MethodOverride, MethodSpecification, ParameterDefinition,
    PropertyDefinition, ResolutionScope, TypeDefinition, TypeReference, TypeSpecification,
};

/// Attribute flag sets
pub use crate::metadata::model::{
    EventAttributes, FieldAttributes, GenericParamAttributes, MethodAttributes,
    MethodImplAttributes, ParamAttributes, PropertyAttributes, TypeAttributes,
};

/// Constants
pub use crate::metadata::model::{Constant, ConstantValue};

// ================================================================================================
// Signatures and Blobs
// ================================================================================================

/// Signature types
pub use crate::metadata::signatures::{
    ArrayShape, GenericParamSig, LocalVarSig, MemberSig, MethodSig, PropertySig, TypeSig,
};

/// Custom attributes
pub use crate::metadata::customattributes::CustomAttribute;

/// Declarative security
pub use crate::metadata::security::{SecurityAction, SecurityDeclaration};

// ================================================================================================
// Physical Layer
// ================================================================================================

/// Metadata tokens and table ids
pub use crate::metadata::{tables::TableId, token::Token};
