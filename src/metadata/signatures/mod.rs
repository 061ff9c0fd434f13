//! Signature blobs (ECMA-335 II.23.2).
//!
//! Signatures encode types, member shapes and generic instantiations in a compact
//! element-type grammar:
//!
//! - **Method signatures** - calling convention, generic arity, return and parameter types
//! - **Field signatures** - `0x06` followed by one type
//! - **Property signatures** - `0x08`, parameter count, property type and index parameters
//! - **Local variable signatures** - `0x07`, count and the local types
//! - **Method instantiations** - `0x0A`, count and the type arguments
//! - **Type specifications** - one bare type
//!
//! Decoding goes through [`SignatureParser`], which hands every embedded token and generic
//! placeholder to a [`SignatureResolver`]. Encoding goes through [`SignatureEncoder`], which
//! asks a [`TokenEncoder`] for the build-time token of every handle, since read-time tokens
//! cannot be reused after the tables were renumbered.
//!
//! # Examples
//!
//! ```rust
//! use dotmeta::metadata::signatures::{encode_method_signature, parse_method_signature, RowTokens};
//!
//! let data = &[0x20, 0x02, 0x01, 0x08, 0x0E];
//! let sig = parse_method_signature(data, &mut RowTokens)?;
//! assert_eq!(sig.params.len(), 2);
//! assert_eq!(encode_method_signature(&sig, &mut RowTokens)?, data);
//! # Ok::<(), dotmeta::Error>(())
//! ```

mod encoder;
mod parser;
mod types;

pub use encoder::*;
pub use parser::*;
pub use types::*;

use crate::Result;

/// Parse a `MethodDefSig` or `MethodRefSig`
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_method_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<MethodSig> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_method_signature())
}

/// Parse a `FieldSig`
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_field_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<TypeSig> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_field_signature())
}

/// Parse a `PropertySig`
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_property_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<PropertySig> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_property_signature())
}

/// Parse a `LocalVarSig`
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_local_var_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<LocalVarSig> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_local_var_signature())
}

/// Parse the instantiation blob of a `MethodSpec`
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_method_spec_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<Vec<TypeSig>> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_method_spec_signature())
}

/// Parse a `TypeSpec` blob
///
/// # Errors
/// Returns an error if the signature data is malformed
pub fn parse_type_spec_signature<R: SignatureResolver + ?Sized>(
    data: &[u8],
    resolver: &mut R,
) -> Result<TypeSig> {
    SignatureParser::new(data, resolver).parse_whole(|parser| parser.parse_type_spec_signature())
}
