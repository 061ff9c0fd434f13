use crate::metadata::{customattributes::CustomAttributeNamedArgument, token::Token};

/// Security actions (ECMA-335 II.22.11)
///
/// Controls how the runtime applies the permission set of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityAction {
    /// Refuse Demand for the specified permission
    Deny,
    /// All callers in the call chain need the permission
    Demand,
    /// Satisfy Demand for the specified permission
    Assert,
    /// Demand for non-CAS permissions
    NonCasDemand,
    /// The immediate caller needs the permission
    LinkDemand,
    /// Inheritors and overriders need the permission
    InheritanceDemand,
    /// Minimum permissions required to run
    RequestMinimum,
    /// Optional permissions to grant
    RequestOptional,
    /// Permissions not to be granted
    RequestRefuse,
    /// Reserved
    PrejitGrant,
    /// Reserved
    PrejitDeny,
    /// Non-CAS version of `LinkDemand`
    NonCasLinkDemand,
    /// Non-CAS version of `InheritanceDemand`
    NonCasInheritance,
    /// Link demand for one of several permissions
    LinkDemandChoice,
    /// Inheritance demand for one of several permissions
    InheritanceDemandChoice,
    /// Demand for one of several permissions
    DemandChoice,
    /// Refuse Demand for everything except the specified permission
    PermitOnly,
    /// Unknown security action
    Unknown(u16),
}

impl From<u16> for SecurityAction {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => SecurityAction::Deny,
            0x0002 => SecurityAction::Demand,
            0x0003 => SecurityAction::Assert,
            0x0004 => SecurityAction::NonCasDemand,
            0x0005 => SecurityAction::LinkDemand,
            0x0006 => SecurityAction::InheritanceDemand,
            0x0007 => SecurityAction::RequestMinimum,
            0x0008 => SecurityAction::RequestOptional,
            0x0009 => SecurityAction::RequestRefuse,
            0x000A => SecurityAction::PrejitGrant,
            0x000B => SecurityAction::PrejitDeny,
            0x000C => SecurityAction::NonCasLinkDemand,
            0x000D => SecurityAction::NonCasInheritance,
            0x000E => SecurityAction::LinkDemandChoice,
            0x000F => SecurityAction::InheritanceDemandChoice,
            0x0010 => SecurityAction::DemandChoice,
            0x0011 => SecurityAction::PermitOnly,
            other => SecurityAction::Unknown(other),
        }
    }
}

impl From<SecurityAction> for u16 {
    fn from(action: SecurityAction) -> Self {
        match action {
            SecurityAction::Deny => 0x0001,
            SecurityAction::Demand => 0x0002,
            SecurityAction::Assert => 0x0003,
            SecurityAction::NonCasDemand => 0x0004,
            SecurityAction::LinkDemand => 0x0005,
            SecurityAction::InheritanceDemand => 0x0006,
            SecurityAction::RequestMinimum => 0x0007,
            SecurityAction::RequestOptional => 0x0008,
            SecurityAction::RequestRefuse => 0x0009,
            SecurityAction::PrejitGrant => 0x000A,
            SecurityAction::PrejitDeny => 0x000B,
            SecurityAction::NonCasLinkDemand => 0x000C,
            SecurityAction::NonCasInheritance => 0x000D,
            SecurityAction::LinkDemandChoice => 0x000E,
            SecurityAction::InheritanceDemandChoice => 0x000F,
            SecurityAction::DemandChoice => 0x0010,
            SecurityAction::PermitOnly => 0x0011,
            SecurityAction::Unknown(other) => other,
        }
    }
}

/// A `DeclSecurity` row: an action plus its raw permission set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDeclaration {
    /// Read-time token
    pub token: Token,
    /// How the permission set is applied
    pub action: SecurityAction,
    /// The permission set blob, binary or XML
    pub permission_set: Vec<u8>,
}

/// One permission of a binary permission set
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityAttribute {
    /// Assembly qualified name of the permission attribute type
    pub type_name: String,
    /// Properties assigned on the permission attribute
    pub named_args: Vec<CustomAttributeNamedArgument>,
}
