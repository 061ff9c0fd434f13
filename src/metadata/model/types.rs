use crate::metadata::{
    model::{
        AssemblyRefId, EventId, FieldId, GenericOwner, GenericParamAttributes, GenericParamId,
        MethodHandle, MethodId, ModuleRefId, PropertyId, TypeAttributes, TypeDefId, TypeRefId,
    },
    signatures::TypeSig,
    token::Token,
};

/// Where a type reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// The current module
    Module,
    /// Another module of the same assembly
    ModuleRef(ModuleRefId),
    /// Another assembly
    AssemblyRef(AssemblyRefId),
    /// The enclosing type of a nested type reference
    TypeRef(TypeRefId),
    /// No scope, the type is found through the `ExportedType` table
    None,
}

/// A type defined in another scope
#[derive(Debug, Clone)]
pub struct TypeReference {
    /// Read-time token, null for references created in memory
    pub token: Token,
    /// Where the type lives
    pub scope: ResolutionScope,
    /// The type name
    pub name: String,
    /// The namespace, empty for nested types
    pub namespace: String,
    /// Generic parameters synthesized while importing; never written to the tables
    pub generic_parameters: Vec<GenericParamId>,
}

impl TypeReference {
    /// Create a reference to `namespace.name` inside `scope`
    #[must_use]
    pub fn new(scope: ResolutionScope, namespace: &str, name: &str) -> Self {
        TypeReference {
            token: Token::default(),
            scope,
            name: name.to_string(),
            namespace: namespace.to_string(),
            generic_parameters: Vec::new(),
        }
    }
}

/// Explicit layout of a type, the `ClassLayout` row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    /// Field alignment, a power of two up to 128
    pub packing_size: u16,
    /// Size of the type in bytes, 0 if not given
    pub class_size: u32,
}

/// An interface implemented by a type
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceImplementation {
    /// Read-time token of the `InterfaceImpl` row
    pub token: Token,
    /// The implemented interface
    pub interface: TypeSig,
}

/// An explicit method override, the `MethodImpl` row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodOverride {
    /// The method providing the implementation
    pub body: MethodHandle,
    /// The method being implemented
    pub declaration: MethodHandle,
}

/// A type defined in this module
///
/// The member lists are populated lazily; `None` means the list was not loaded from the image
/// yet. Use the accessors of [`crate::ModuleDefinition`] to read them.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Read-time token, null for types created in memory
    pub token: Token,
    /// Type attributes
    pub flags: TypeAttributes,
    /// The type name
    pub name: String,
    /// The namespace, empty for nested types
    pub namespace: String,
    /// The base type, `None` for interfaces, `System.Object` and `<Module>`
    pub base_type: Option<TypeSig>,
    /// The enclosing type of a nested type
    pub declaring_type: Option<TypeDefId>,
    /// Explicit layout
    pub layout: Option<ClassLayout>,
    pub(crate) fields: Option<Vec<FieldId>>,
    pub(crate) methods: Option<Vec<MethodId>>,
    pub(crate) nested_types: Option<Vec<TypeDefId>>,
    pub(crate) interfaces: Option<Vec<InterfaceImplementation>>,
    pub(crate) generic_parameters: Option<Vec<GenericParamId>>,
    pub(crate) properties: Option<Vec<PropertyId>>,
    pub(crate) events: Option<Vec<EventId>>,
    pub(crate) overrides: Option<Vec<MethodOverride>>,
}

impl TypeDefinition {
    /// Create an empty type definition
    #[must_use]
    pub fn new(
        namespace: &str,
        name: &str,
        flags: TypeAttributes,
        base_type: Option<TypeSig>,
    ) -> Self {
        TypeDefinition {
            token: Token::default(),
            flags,
            name: name.to_string(),
            namespace: namespace.to_string(),
            base_type,
            declaring_type: None,
            layout: None,
            fields: Some(Vec::new()),
            methods: Some(Vec::new()),
            nested_types: Some(Vec::new()),
            interfaces: Some(Vec::new()),
            generic_parameters: Some(Vec::new()),
            properties: Some(Vec::new()),
            events: Some(Vec::new()),
            overrides: Some(Vec::new()),
        }
    }

    pub(crate) fn unloaded(
        token: Token,
        flags: TypeAttributes,
        namespace: String,
        name: String,
    ) -> Self {
        TypeDefinition {
            token,
            flags,
            name,
            namespace,
            base_type: None,
            declaring_type: None,
            layout: None,
            fields: None,
            methods: None,
            nested_types: None,
            interfaces: None,
            generic_parameters: None,
            properties: None,
            events: None,
            overrides: None,
        }
    }

    /// Returns `true` if this is the special `<Module>` type holding global members
    #[must_use]
    pub fn is_module_type(&self) -> bool {
        self.name == "<Module>" && self.namespace.is_empty() && self.declaring_type.is_none()
    }
}

/// A generic constraint, the `GenericParamConstraint` row
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParamConstraint {
    /// Read-time token
    pub token: Token,
    /// The type the parameter is constrained to
    pub constraint_type: TypeSig,
}

/// A constructed type, the `TypeSpec` row
///
/// Signatures normally embed constructed types inline; rows are listed here so attributes
/// on them have an owner and unused rows survive a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpecification {
    /// Read-time token
    pub token: Token,
    /// The decoded signature, placeholders left unbound
    pub signature: TypeSig,
}

impl TypeSpecification {
    /// Create a type specification
    #[must_use]
    pub fn new(signature: TypeSig) -> Self {
        TypeSpecification {
            token: Token::default(),
            signature,
        }
    }
}

/// A generic parameter of a type or method
#[derive(Debug, Clone)]
pub struct GenericParameter {
    /// Read-time token
    pub token: Token,
    /// Position among the parameters of the owner
    pub number: u16,
    /// Variance and special constraints
    pub flags: GenericParamAttributes,
    /// The declared name
    pub name: String,
    /// The declaring type or method
    pub owner: GenericOwner,
    pub(crate) constraints: Option<Vec<GenericParamConstraint>>,
}

impl GenericParameter {
    pub(crate) fn new(
        token: Token,
        number: u16,
        flags: GenericParamAttributes,
        name: String,
        owner: GenericOwner,
    ) -> Self {
        GenericParameter {
            token,
            number,
            flags,
            name,
            owner,
            constraints: None,
        }
    }
}
