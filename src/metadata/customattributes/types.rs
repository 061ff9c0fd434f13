//! Custom attribute values (ECMA-335 II.23.3).

use crate::metadata::{model::MethodHandle, token::Token};

/// A custom attribute attached to a metadata entity
///
/// The value blob is kept as read; decoding it needs the constructor signature and,
/// for enum arguments, type resolution, see
/// [`crate::metadata::resolver::custom_attribute_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttribute {
    /// Read-time token
    pub token: Token,
    /// The attribute constructor
    pub constructor: MethodHandle,
    /// The encoded arguments
    pub blob: Vec<u8>,
}

impl CustomAttribute {
    /// Create an attribute from an already encoded value
    #[must_use]
    pub fn new(constructor: MethodHandle, blob: Vec<u8>) -> Self {
        CustomAttribute {
            token: Token::default(),
            constructor,
            blob,
        }
    }
}

/// `CorSerializationType` constants
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

/// Type of an attribute argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentType {
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
    /// System.Type, stored as a type name
    Type,
    /// System.Object, the value is preceded by its own type
    Object,
    /// An enum with its underlying primitive type
    Enum {
        /// Serialized name of the enum type
        type_name: String,
        /// The underlying integral type
        underlying: Box<ArgumentType>,
    },
    /// Single dimension array
    SzArray(Box<ArgumentType>),
}

/// Value of a single attribute argument
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {
    /// Boolean value
    Bool(bool),
    /// UTF-16 code unit
    Char(u16),
    /// Signed 8-bit integer
    I1(i8),
    /// Unsigned 8-bit integer
    U1(u8),
    /// Signed 16-bit integer
    I2(i16),
    /// Unsigned 16-bit integer
    U2(u16),
    /// Signed 32-bit integer
    I4(i32),
    /// Unsigned 32-bit integer
    U4(u32),
    /// Signed 64-bit integer
    I8(i64),
    /// Unsigned 64-bit integer
    U8(u64),
    /// 32-bit floating point
    R4(f32),
    /// 64-bit floating point
    R8(f64),
    /// String, `None` for null
    String(Option<String>),
    /// Serialized type name, `None` for null
    Type(Option<String>),
    /// Enum value
    Enum {
        /// Serialized name of the enum type
        type_name: String,
        /// The value as its underlying type
        value: Box<CustomAttributeArgument>,
    },
    /// Array, `None` for null
    Array {
        /// Type of the elements
        element_type: ArgumentType,
        /// The elements
        values: Option<Vec<CustomAttributeArgument>>,
    },
    /// A value stored in an `object` slot
    Boxed(Box<CustomAttributeArgument>),
}

impl CustomAttributeArgument {
    /// The type this value serializes as
    #[must_use]
    pub fn arg_type(&self) -> ArgumentType {
        match self {
            CustomAttributeArgument::Bool(_) => ArgumentType::Boolean,
            CustomAttributeArgument::Char(_) => ArgumentType::Char,
            CustomAttributeArgument::I1(_) => ArgumentType::I1,
            CustomAttributeArgument::U1(_) => ArgumentType::U1,
            CustomAttributeArgument::I2(_) => ArgumentType::I2,
            CustomAttributeArgument::U2(_) => ArgumentType::U2,
            CustomAttributeArgument::I4(_) => ArgumentType::I4,
            CustomAttributeArgument::U4(_) => ArgumentType::U4,
            CustomAttributeArgument::I8(_) => ArgumentType::I8,
            CustomAttributeArgument::U8(_) => ArgumentType::U8,
            CustomAttributeArgument::R4(_) => ArgumentType::R4,
            CustomAttributeArgument::R8(_) => ArgumentType::R8,
            CustomAttributeArgument::String(_) => ArgumentType::String,
            CustomAttributeArgument::Type(_) => ArgumentType::Type,
            CustomAttributeArgument::Enum { type_name, value } => ArgumentType::Enum {
                type_name: type_name.clone(),
                underlying: Box::new(value.arg_type()),
            },
            CustomAttributeArgument::Array { element_type, .. } => {
                ArgumentType::SzArray(Box::new(element_type.clone()))
            }
            CustomAttributeArgument::Boxed(_) => ArgumentType::Object,
        }
    }
}

/// Whether a named argument sets a field or a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedArgumentKind {
    /// `0x53`
    Field,
    /// `0x54`
    Property,
}

/// A named argument (field or property) of a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Field or property
    pub kind: NamedArgumentKind,
    /// Declared type of the member
    pub arg_type: ArgumentType,
    /// Name of the field or property
    pub name: String,
    /// The assigned value
    pub value: CustomAttributeArgument,
}

/// A decoded custom attribute blob
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomAttributeValue {
    /// Constructor arguments, in declaration order
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Field and property assignments
    pub named_args: Vec<CustomAttributeNamedArgument>,
}
