use crate::metadata::model::{GenericParamId, TypeHandle};

#[allow(non_snake_case, dead_code, missing_docs)]
/// Bytes that introduce an element of a type signature (ECMA-335 II.23.1.16)
pub mod ELEMENT_TYPE {
    //Marks end of a list
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter in a generic type definition, represented as number
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 … loCount lo1 …
    pub const ARRAY: u8 = 0x14;
    // Generic type instantiation. Followed by type type-arg-count type-1 ... type-n
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    // System.IntPtr
    pub const I: u8 = 0x18;
    // System.UIntPtr
    pub const U: u8 = 0x19;
    // Followed by full method signature
    pub const FNPTR: u8 = 0x1b;
    // System.Object
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter in a generic method definition, represented as number
    pub const MVAR: u8 = 0x1e;
    // Required modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_REQD: u8 = 0x1f;
    // Optional modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_OPT: u8 = 0x20;
    // Implemented within the CLI
    pub const INTERNAL: u8 = 0x21;
    // Or'd with following element types
    pub const MODIFIER: u8 = 0x40;
    // Sentinel for vararg method signature
    pub const SENTINEL: u8 = 0x41;
    // Denotes a local variable that points at a pinned object
    pub const PINNED: u8 = 0x45;
    // Custom attributes: an argument of type System.Type
    pub const TYPE: u8 = 0x50;
    // Custom attributes: a boxed object argument
    pub const BOXED: u8 = 0x51;
    // Custom attributes: a field named argument
    pub const FIELD: u8 = 0x53;
    // Custom attributes: a property named argument
    pub const PROPERTY: u8 = 0x54;
    // Custom attributes: an enum argument
    pub const ENUM: u8 = 0x55;
}

#[allow(non_snake_case, dead_code, missing_docs)]
/// First byte of a signature blob (ECMA-335 II.23.2.3)
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const UNMANAGED: u8 = 0x09;
    pub const GENERIC_INST: u8 = 0x0a;
    pub const NATIVE_VARARG: u8 = 0x0b;
    // Low nibble
    pub const MASK: u8 = 0x0f;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;
}

/// A generic placeholder, `!n` or `!!n`
///
/// The owner is filled in when a generic context was active while decoding. Two placeholders
/// compare equal when their positions match, regardless of the owner they are bound to.
#[derive(Debug, Clone, Copy, Eq)]
pub struct GenericParamSig {
    /// Index of the parameter among the generic parameters of its owner
    pub position: u32,
    /// The bound parameter, if any
    pub owner: Option<GenericParamId>,
}

impl GenericParamSig {
    /// Create an unbound placeholder
    #[must_use]
    pub fn unbound(position: u32) -> Self {
        GenericParamSig {
            position,
            owner: None,
        }
    }
}

impl PartialEq for GenericParamSig {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

/// Shape of a general array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayShape {
    /// Type of the elements
    pub element: Box<TypeSig>,
    /// Number of dimensions
    pub rank: u32,
    /// Sizes of the leading dimensions, the remaining dimensions are unbounded
    pub sizes: Vec<u32>,
    /// Lower bounds of the leading dimensions
    pub lower_bounds: Vec<i32>,
}

/// A decoded type signature
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSig {
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// Typed reference
    TypedByRef,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// System.Object
    Object,
    /// A reference type
    Class(TypeHandle),
    /// A value type
    ValueType(TypeHandle),
    /// Unmanaged pointer
    Ptr(Box<TypeSig>),
    /// Managed pointer
    ByRef(Box<TypeSig>),
    /// A pinned local
    Pinned(Box<TypeSig>),
    /// Single dimension, zero based array
    SzArray(Box<TypeSig>),
    /// General array
    Array(ArrayShape),
    /// A generic type and its arguments
    GenericInst {
        /// The generic type definition, `Class` or `ValueType`
        generic: Box<TypeSig>,
        /// The type arguments
        arguments: Vec<TypeSig>,
    },
    /// Placeholder for a type parameter
    Var(GenericParamSig),
    /// Placeholder for a method parameter
    MVar(GenericParamSig),
    /// Function pointer
    FnPtr(Box<MethodSig>),
    /// `modreq(modifier) element`
    RequiredModifier {
        /// The modifier type
        modifier: TypeHandle,
        /// The modified type
        element: Box<TypeSig>,
    },
    /// `modopt(modifier) element`
    OptionalModifier {
        /// The modifier type
        modifier: TypeHandle,
        /// The modified type
        element: Box<TypeSig>,
    },
    /// The first parameter after the vararg sentinel
    Sentinel(Box<TypeSig>),
}

impl TypeSig {
    /// Element type byte of this signature
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            TypeSig::Void => ELEMENT_TYPE::VOID,
            TypeSig::Boolean => ELEMENT_TYPE::BOOLEAN,
            TypeSig::Char => ELEMENT_TYPE::CHAR,
            TypeSig::I1 => ELEMENT_TYPE::I1,
            TypeSig::U1 => ELEMENT_TYPE::U1,
            TypeSig::I2 => ELEMENT_TYPE::I2,
            TypeSig::U2 => ELEMENT_TYPE::U2,
            TypeSig::I4 => ELEMENT_TYPE::I4,
            TypeSig::U4 => ELEMENT_TYPE::U4,
            TypeSig::I8 => ELEMENT_TYPE::I8,
            TypeSig::U8 => ELEMENT_TYPE::U8,
            TypeSig::R4 => ELEMENT_TYPE::R4,
            TypeSig::R8 => ELEMENT_TYPE::R8,
            TypeSig::String => ELEMENT_TYPE::STRING,
            TypeSig::TypedByRef => ELEMENT_TYPE::TYPEDBYREF,
            TypeSig::I => ELEMENT_TYPE::I,
            TypeSig::U => ELEMENT_TYPE::U,
            TypeSig::Object => ELEMENT_TYPE::OBJECT,
            TypeSig::Class(_) => ELEMENT_TYPE::CLASS,
            TypeSig::ValueType(_) => ELEMENT_TYPE::VALUETYPE,
            TypeSig::Ptr(_) => ELEMENT_TYPE::PTR,
            TypeSig::ByRef(_) => ELEMENT_TYPE::BYREF,
            TypeSig::Pinned(_) => ELEMENT_TYPE::PINNED,
            TypeSig::SzArray(_) => ELEMENT_TYPE::SZARRAY,
            TypeSig::Array(_) => ELEMENT_TYPE::ARRAY,
            TypeSig::GenericInst { .. } => ELEMENT_TYPE::GENERICINST,
            TypeSig::Var(_) => ELEMENT_TYPE::VAR,
            TypeSig::MVar(_) => ELEMENT_TYPE::MVAR,
            TypeSig::FnPtr(_) => ELEMENT_TYPE::FNPTR,
            TypeSig::RequiredModifier { .. } => ELEMENT_TYPE::CMOD_REQD,
            TypeSig::OptionalModifier { .. } => ELEMENT_TYPE::CMOD_OPT,
            TypeSig::Sentinel(_) => ELEMENT_TYPE::SENTINEL,
        }
    }

    /// Named type at the bottom of this signature, if there is one
    ///
    /// Strips pointers, arrays, modifiers and generic instantiations.
    #[must_use]
    pub fn element_handle(&self) -> Option<TypeHandle> {
        match self {
            TypeSig::Class(handle) | TypeSig::ValueType(handle) => Some(*handle),
            TypeSig::Ptr(inner)
            | TypeSig::ByRef(inner)
            | TypeSig::Pinned(inner)
            | TypeSig::SzArray(inner)
            | TypeSig::Sentinel(inner) => inner.element_handle(),
            TypeSig::Array(shape) => shape.element.element_handle(),
            TypeSig::GenericInst { generic, .. } => generic.element_handle(),
            TypeSig::RequiredModifier { element, .. }
            | TypeSig::OptionalModifier { element, .. } => element.element_handle(),
            _ => None,
        }
    }

    /// Returns `true` for the primitive element types
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSig::Boolean
                | TypeSig::Char
                | TypeSig::I1
                | TypeSig::U1
                | TypeSig::I2
                | TypeSig::U2
                | TypeSig::I4
                | TypeSig::U4
                | TypeSig::I8
                | TypeSig::U8
                | TypeSig::R4
                | TypeSig::R8
                | TypeSig::I
                | TypeSig::U
        )
    }
}

/// Method signature (II.23.2.1 - II.23.2.3)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// Low nibble of the first byte, see [`CALLING_CONVENTION`]
    pub calling_convention: u8,
    /// Instance method, `this` is passed implicitly
    pub has_this: bool,
    /// `this` is the first explicit parameter
    pub explicit_this: bool,
    /// Number of generic parameters, 0 for non-generic methods
    pub generic_arity: u32,
    /// The return type
    pub return_type: TypeSig,
    /// The parameters; the first vararg parameter is wrapped in [`TypeSig::Sentinel`]
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// A static method with the default calling convention
    #[must_use]
    pub fn new_static(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            calling_convention: CALLING_CONVENTION::DEFAULT,
            has_this: false,
            explicit_this: false,
            generic_arity: 0,
            return_type,
            params,
        }
    }

    /// An instance method with the default calling convention
    #[must_use]
    pub fn new_instance(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: true,
            ..MethodSig::new_static(return_type, params)
        }
    }

    /// Index of the first vararg parameter
    #[must_use]
    pub fn sentinel_position(&self) -> Option<usize> {
        self.params
            .iter()
            .position(|param| matches!(param, TypeSig::Sentinel(_)))
    }

    /// Returns `true` for the vararg calling convention
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.calling_convention == CALLING_CONVENTION::VARARG
    }
}

/// Property signature (II.23.2.5)
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySig {
    /// Instance property
    pub has_this: bool,
    /// The type of the property
    pub property_type: TypeSig,
    /// Index parameters
    pub params: Vec<TypeSig>,
}

/// Local variable signature (II.23.2.6)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalVarSig {
    /// Types of the locals, pinned and by-ref locals included
    pub locals: Vec<TypeSig>,
}

/// Signature of a member reference
#[derive(Debug, Clone, PartialEq)]
pub enum MemberSig {
    /// Reference to a method
    Method(MethodSig),
    /// Reference to a field
    Field(TypeSig),
}
