//! Attribute flag sets of the metadata tables (ECMA-335 II.23.1).
//!
//! Masked groups (visibility, layout, access) are exposed through helper methods instead of
//! individual flags, since their values overlap.

use bitflags::bitflags;

bitflags! {
    /// Flags of a `TypeDef` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Use this mask to retrieve visibility information
        const VISIBILITY_MASK = 0x0000_0007;
        /// Class is public
        const PUBLIC = 0x0000_0001;
        /// Class is nested with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Class is nested with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Class is nested with family visibility
        const NESTED_FAMILY = 0x0000_0004;
        /// Class is nested with assembly visibility
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Class is nested with family and assembly visibility
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Class is nested with family or assembly visibility
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Use this mask to retrieve class layout information
        const LAYOUT_MASK = 0x0000_0018;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Layout is supplied explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class cannot be extended
        const SEALED = 0x0000_0100;
        /// Class name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Class is imported
        const IMPORT = 0x0000_1000;
        /// Class is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Use this mask to retrieve string information for native interop
        const STRING_FORMAT_MASK = 0x0003_0000;
        /// LPSTR is interpreted as UNICODE
        const UNICODE_CLASS = 0x0001_0000;
        /// LPSTR is interpreted automatically
        const AUTO_CLASS = 0x0002_0000;
        /// Initialize the class before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// The runtime should check name encoding
        const RT_SPECIAL_NAME = 0x0000_0800;
        /// Class has security associated with it
        const HAS_SECURITY = 0x0004_0000;
        /// This exported type is a forwarder
        const FORWARDER = 0x0020_0000;
    }
}

impl TypeAttributes {
    /// Returns `true` if the visibility bits describe a nested type
    #[must_use]
    pub fn is_nested(self) -> bool {
        (self & Self::VISIBILITY_MASK).bits() >= Self::NESTED_PUBLIC.bits()
    }

    /// Returns `true` for interfaces
    #[must_use]
    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }
}

bitflags! {
    /// Flags of a `Field` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldAttributes: u16 {
        /// Use this mask to retrieve accessibility information
        const FIELD_ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Reserved
        const NOT_SERIALIZED = 0x0080;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// CLI provides 'special' behavior, depending upon the name of the field
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has marshalling information
        const HAS_FIELD_MARSHAL = 0x1000;
        /// Field has default
        const HAS_DEFAULT = 0x8000;
        /// Field has RVA
        const HAS_FIELD_RVA = 0x0100;
    }
}

impl FieldAttributes {
    /// Returns `true` for static fields
    #[must_use]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }
}

bitflags! {
    /// Flags of a `MethodDef` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodAttributes: u16 {
        /// Use this mask to retrieve accessibility information
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Reserved: shall be zero for conforming implementations
        const UNMANAGED_EXPORT = 0x0008;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RT_SPECIAL_NAME = 0x1000;
        /// Method has security associate with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodAttributes {
    /// Returns `true` for static methods
    #[must_use]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }
}

bitflags! {
    /// Implementation flags of a `MethodDef` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodImplAttributes: u16 {
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is OPTIL
        const OPTIL = 0x0002;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method impl is unmanaged, otherwise managed
        const UNMANAGED = 0x0004;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method is defined; used primarily in merge scenarios
        const FORWARD_REF = 0x0010;
        /// Method is a synchronized method
        const SYNCHRONIZED = 0x0020;
        /// Method will not be optimized when generating native code
        const NO_OPTIMIZATION = 0x0040;
        /// Signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method is implemented by the runtime itself
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    /// Flags of a `Param` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamAttributes: u16 {
        /// Param is `[In]`
        const IN = 0x0001;
        /// Param is `[Out]`
        const OUT = 0x0002;
        /// Param is optional
        const OPTIONAL = 0x0010;
        /// Param has default value
        const HAS_DEFAULT = 0x1000;
        /// Param has marshalling information
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

bitflags! {
    /// Flags of a `Property` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttributes: u16 {
        /// Property is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime (metadata internal APIs) should check name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has default
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    /// Flags of an `Event` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventAttributes: u16 {
        /// Event is special
        const SPECIAL_NAME = 0x0200;
        /// CLI provides 'special' behavior, depending upon the name of the event
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    /// Flags of a `GenericParam` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GenericParamAttributes: u16 {
        /// Use this mask to retrieve the variance
        const VARIANCE_MASK = 0x0003;
        /// The generic parameter is covariant
        const COVARIANT = 0x0001;
        /// The generic parameter is contravariant
        const CONTRAVARIANT = 0x0002;
        /// Use this mask to retrieve the special constraints
        const SPECIAL_CONSTRAINT_MASK = 0x001C;
        /// The generic parameter has the class special constraint
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// The generic parameter has the valuetype special constraint
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// The generic parameter has the .ctor special constraint
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

bitflags! {
    /// Flags of the `Assembly` and `AssemblyRef` rows
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AssemblyFlags: u32 {
        /// The assembly reference holds the full (unhashed) public key
        const PUBLIC_KEY = 0x0001;
        /// The implementation of this assembly used at runtime is not expected to match the
        /// version seen at compile time
        const RETARGETABLE = 0x0100;
        /// Reserved
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
        /// Reserved
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
    }
}

bitflags! {
    /// Role of a method inside a property or event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodSemanticsAttributes: u16 {
        /// Setter for property
        const SETTER = 0x0001;
        /// Getter for property
        const GETTER = 0x0002;
        /// Other method for property or event
        const OTHER = 0x0004;
        /// AddOn method for event
        const ADD_ON = 0x0008;
        /// RemoveOn method for event
        const REMOVE_ON = 0x0010;
        /// Fire method for event
        const FIRE = 0x0020;
    }
}

bitflags! {
    /// Flags of an `ImplMap` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PInvokeAttributes: u16 {
        /// PInvoke is to use the member name as specified
        const NO_MANGLE = 0x0001;
        /// Use this mask to retrieve the character set
        const CHAR_SET_MASK = 0x0006;
        /// Marshal strings as ANSI
        const CHAR_SET_ANSI = 0x0002;
        /// Marshal strings as UTF-16
        const CHAR_SET_UNICODE = 0x0004;
        /// Pick the character set automatically
        const CHAR_SET_AUTO = 0x0006;
        /// Use this mask to retrieve the best-fit mapping
        const BEST_FIT_MASK = 0x0030;
        /// Callee calls `SetLastError`
        const SUPPORTS_LAST_ERROR = 0x0040;
        /// Use this mask to retrieve the calling convention
        const CALL_CONV_MASK = 0x0700;
        /// Use the platform default calling convention
        const CALL_CONV_WINAPI = 0x0100;
        /// cdecl
        const CALL_CONV_CDECL = 0x0200;
        /// stdcall
        const CALL_CONV_STDCALL = 0x0300;
        /// thiscall
        const CALL_CONV_THISCALL = 0x0400;
        /// fastcall
        const CALL_CONV_FASTCALL = 0x0500;
    }
}

bitflags! {
    /// Flags of a `ManifestResource` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ManifestResourceAttributes: u32 {
        /// The resource is exported from the assembly
        const PUBLIC = 0x0001;
        /// The resource is private to the assembly
        const PRIVATE = 0x0002;
    }
}

bitflags! {
    /// Flags of a `File` row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileAttributes: u32 {
        /// This is not a resource file
        const CONTAINS_NO_METADATA = 0x0001;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_groups() {
        let nested = TypeAttributes::from_bits_retain(0x0010_0003);
        assert!(nested.is_nested());
        assert!(nested.contains(TypeAttributes::BEFORE_FIELD_INIT));

        let public = TypeAttributes::PUBLIC | TypeAttributes::SEALED;
        assert!(!public.is_nested());
        assert!(!public.is_interface());

        assert!(MethodAttributes::from_bits_retain(0x0096).is_static());
        assert!(!FieldAttributes::PUBLIC.is_static());
    }
}
