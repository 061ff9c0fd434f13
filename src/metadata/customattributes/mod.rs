//! Custom attribute blobs (ECMA-335 II.23.3).
//!
//! A custom attribute row links an owner to a constructor and a value blob. The blob starts
//! with the `0x0001` prolog, continues with the fixed constructor arguments (decoded
//! positionally against the constructor parameter types) and ends with a count of named
//! field and property assignments, each carrying its own serialization type.
//!
//! # Examples
//!
//! ```rust
//! use dotmeta::metadata::customattributes::{
//!     encode_custom_attribute, parse_custom_attribute, ArgumentType, CustomAttributeArgument,
//!     CustomAttributeValue,
//! };
//!
//! let value = CustomAttributeValue {
//!     fixed_args: vec![CustomAttributeArgument::String(Some("1.0".to_string()))],
//!     named_args: vec![],
//! };
//! let blob = encode_custom_attribute(&value)?;
//! let decoded = parse_custom_attribute(&blob, &[ArgumentType::String], |name: &str| {
//!     Err(dotmeta::Error::Resolution(name.to_string()))
//! })?;
//! assert_eq!(decoded, value);
//! # Ok::<(), dotmeta::Error>(())
//! ```

mod encoder;
mod parser;
mod types;

pub use encoder::encode_custom_attribute;
pub(crate) use encoder::write_named_argument;
pub use parser::{parse_custom_attribute, CustomAttributeParser};
pub use types::*;
