//! Declarative security (ECMA-335 II.22.11, II.23.1.3).
//!
//! Permission sets come in two encodings: the legacy XML form (UTF-16 text) and the binary
//! form introduced with .NET 2.0, which starts with `.` and lists permission attributes with
//! named arguments in custom attribute encoding. Only the binary form is decoded, the XML
//! form is kept as raw bytes.

mod types;

pub use types::*;

use crate::{
    file::writer::Writer,
    metadata::customattributes::{write_named_argument, ArgumentType, CustomAttributeParser},
    Result,
};

/// Returns `true` if the blob uses the binary `.` encoding
#[must_use]
pub fn is_binary_permission_set(data: &[u8]) -> bool {
    data.first() == Some(&b'.')
}

/// Decode a binary permission set
///
/// Returns `Ok(None)` for XML permission sets.
///
/// # Errors
/// Returns an error if the binary data is malformed or an enum type cannot be resolved
pub fn parse_permission_set<F>(
    data: &[u8],
    resolve_enum: F,
) -> Result<Option<Vec<SecurityAttribute>>>
where
    F: FnMut(&str) -> Result<ArgumentType>,
{
    if !is_binary_permission_set(data) {
        return Ok(None);
    }

    let attributes = CustomAttributeParser::new(data, resolve_enum).parse_permission_set()?;
    Ok(Some(
        attributes
            .into_iter()
            .map(|(type_name, named_args)| SecurityAttribute {
                type_name,
                named_args,
            })
            .collect(),
    ))
}

/// Encode permission attributes in the binary format
///
/// # Errors
/// Returns an error if a string or a count exceeds the compressed integer range
pub fn encode_permission_set(attributes: &[SecurityAttribute]) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    writer.write_le::<u8>(b'.');
    writer.write_compressed_uint(attributes.len() as u32)?;

    for attribute in attributes {
        writer.write_ser_string(Some(attribute.type_name.as_str()))?;

        let mut properties = Writer::new();
        properties.write_compressed_uint(attribute.named_args.len() as u32)?;
        for named in &attribute.named_args {
            write_named_argument(&mut properties, named)?;
        }

        let properties = properties.into_inner();
        writer.write_compressed_uint(properties.len() as u32)?;
        writer.write_bytes(&properties);
    }

    Ok(writer.into_inner())
}
