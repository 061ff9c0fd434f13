use crate::metadata::{
    model::{
        Constant, EventAttributes, FieldAttributes, GenericParamId, MethodAttributes,
        MethodHandle, MethodId, MethodImplAttributes, ModuleRefId, ParamAttributes, ParamId,
        PInvokeAttributes, PropertyAttributes, TypeDefId,
    },
    signatures::{LocalVarSig, MemberSig, MethodSig, PropertySig, TypeSig},
    token::Token,
};

/// A field defined in this module
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Read-time token, null for fields created in memory
    pub token: Token,
    /// Field attributes
    pub flags: FieldAttributes,
    /// The field name
    pub name: String,
    /// The field type
    pub signature: TypeSig,
    /// The type owning the field
    pub declaring_type: Option<TypeDefId>,
    /// Default value of a literal field
    pub constant: Option<Constant>,
    /// Native marshalling descriptor, kept as the raw blob
    pub marshal: Option<Vec<u8>>,
    /// RVA of the initial value
    pub rva: Option<u32>,
    /// Byte offset inside a type with explicit layout
    pub offset: Option<u32>,
}

impl FieldDefinition {
    /// Create a field
    #[must_use]
    pub fn new(name: &str, flags: FieldAttributes, signature: TypeSig) -> Self {
        FieldDefinition {
            token: Token::default(),
            flags,
            name: name.to_string(),
            signature,
            declaring_type: None,
            constant: None,
            marshal: None,
            rva: None,
            offset: None,
        }
    }
}

/// Platform invoke information, the `ImplMap` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeInfo {
    /// Mapping flags
    pub flags: PInvokeAttributes,
    /// Name of the native entry point
    pub entry_point: String,
    /// The native module
    pub module: ModuleRefId,
}

/// A method defined in this module
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Read-time token, null for methods created in memory
    pub token: Token,
    /// Method attributes
    pub flags: MethodAttributes,
    /// Implementation attributes
    pub impl_flags: MethodImplAttributes,
    /// The method name
    pub name: String,
    /// RVA of the body, 0 for abstract and runtime provided methods
    pub rva: u32,
    /// The method signature
    pub signature: MethodSig,
    /// The type owning the method
    pub declaring_type: Option<TypeDefId>,
    /// Platform invoke mapping
    pub pinvoke: Option<PInvokeInfo>,
    pub(crate) parameters: Option<Vec<ParamId>>,
    pub(crate) generic_parameters: Option<Vec<GenericParamId>>,
}

impl MethodDefinition {
    /// Create a method
    #[must_use]
    pub fn new(name: &str, flags: MethodAttributes, signature: MethodSig) -> Self {
        MethodDefinition {
            token: Token::default(),
            flags,
            impl_flags: MethodImplAttributes::empty(),
            name: name.to_string(),
            rva: 0,
            signature,
            declaring_type: None,
            pinvoke: None,
            parameters: Some(Vec::new()),
            generic_parameters: Some(Vec::new()),
        }
    }
}

/// A parameter of a method definition
///
/// Sequence 0 describes the return value, sequences from 1 the declared parameters.
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    /// Read-time token
    pub token: Token,
    /// Parameter attributes
    pub flags: ParamAttributes,
    /// Position, 0 for the return value
    pub sequence: u16,
    /// The parameter name
    pub name: String,
    /// Default value
    pub constant: Option<Constant>,
    /// Native marshalling descriptor
    pub marshal: Option<Vec<u8>>,
    /// The declaring method
    pub method: Option<MethodId>,
}

impl ParameterDefinition {
    /// Create a parameter
    #[must_use]
    pub fn new(name: &str, sequence: u16, flags: ParamAttributes) -> Self {
        ParameterDefinition {
            token: Token::default(),
            flags,
            sequence,
            name: name.to_string(),
            constant: None,
            marshal: None,
            method: None,
        }
    }
}

/// A property of a type
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    /// Read-time token
    pub token: Token,
    /// Property attributes
    pub flags: PropertyAttributes,
    /// The property name
    pub name: String,
    /// The property signature
    pub signature: PropertySig,
    /// The declaring type
    pub declaring_type: Option<TypeDefId>,
    /// Default value
    pub constant: Option<Constant>,
    /// The getter
    pub getter: Option<MethodId>,
    /// The setter
    pub setter: Option<MethodId>,
    /// Other associated methods
    pub other_methods: Vec<MethodId>,
}

impl PropertyDefinition {
    /// Create a property without accessors
    #[must_use]
    pub fn new(name: &str, flags: PropertyAttributes, signature: PropertySig) -> Self {
        PropertyDefinition {
            token: Token::default(),
            flags,
            name: name.to_string(),
            signature,
            declaring_type: None,
            constant: None,
            getter: None,
            setter: None,
            other_methods: Vec::new(),
        }
    }
}

/// An event of a type
#[derive(Debug, Clone)]
pub struct EventDefinition {
    /// Read-time token
    pub token: Token,
    /// Event attributes
    pub flags: EventAttributes,
    /// The event name
    pub name: String,
    /// The delegate type of the event
    pub event_type: TypeSig,
    /// The declaring type
    pub declaring_type: Option<TypeDefId>,
    /// The `add_` accessor
    pub add_method: Option<MethodId>,
    /// The `remove_` accessor
    pub remove_method: Option<MethodId>,
    /// The `raise_` accessor
    pub invoke_method: Option<MethodId>,
    /// Other associated methods
    pub other_methods: Vec<MethodId>,
}

impl EventDefinition {
    /// Create an event without accessors
    #[must_use]
    pub fn new(name: &str, flags: EventAttributes, event_type: TypeSig) -> Self {
        EventDefinition {
            token: Token::default(),
            flags,
            name: name.to_string(),
            event_type,
            declaring_type: None,
            add_method: None,
            remove_method: None,
            invoke_method: None,
            other_methods: Vec::new(),
        }
    }
}

/// Declaring side of a member reference
#[derive(Debug, Clone, PartialEq)]
pub enum MemberRefParent {
    /// A type, possibly a generic instance
    Type(TypeSig),
    /// A method definition, for vararg call sites
    Method(MethodId),
    /// A global member of another module
    ModuleRef(ModuleRefId),
}

/// A field or method defined somewhere else, the `MemberRef` row
#[derive(Debug, Clone)]
pub struct MemberReference {
    /// Read-time token
    pub token: Token,
    /// The declaring side
    pub parent: MemberRefParent,
    /// The member name
    pub name: String,
    /// The member signature
    pub signature: MemberSig,
    /// Generic parameters synthesized while importing; never written to the tables
    pub generic_parameters: Vec<GenericParamId>,
}

impl MemberReference {
    /// Create a member reference
    #[must_use]
    pub fn new(parent: MemberRefParent, name: &str, signature: MemberSig) -> Self {
        MemberReference {
            token: Token::default(),
            parent,
            name: name.to_string(),
            signature,
            generic_parameters: Vec::new(),
        }
    }

    /// Returns `true` if the reference points at a method
    #[must_use]
    pub fn is_method(&self) -> bool {
        matches!(self.signature, MemberSig::Method(_))
    }
}

/// A generic method instantiation, the `MethodSpec` row
#[derive(Debug, Clone)]
pub struct MethodSpecification {
    /// Read-time token
    pub token: Token,
    /// The generic method, a definition or a reference
    pub method: MethodHandle,
    /// The type arguments
    pub instantiation: Vec<TypeSig>,
}

/// Contents of a `StandAloneSig` row
#[derive(Debug, Clone, PartialEq)]
pub enum StandAloneSig {
    /// Locals of a method body
    Locals(LocalVarSig),
    /// Call site signature of an indirect call
    Method(MethodSig),
}

/// A signature referenced from method bodies, the `StandAloneSig` row
#[derive(Debug, Clone, PartialEq)]
pub struct StandAloneSignature {
    /// Read-time token
    pub token: Token,
    /// The decoded signature
    pub signature: StandAloneSig,
}

impl StandAloneSignature {
    /// Create a stand-alone signature
    #[must_use]
    pub fn new(signature: StandAloneSig) -> Self {
        StandAloneSignature {
            token: Token::default(),
            signature,
        }
    }
}
