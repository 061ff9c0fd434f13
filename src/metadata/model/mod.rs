//! The in-memory object graph of a module.
//!
//! Definitions own their children through id lists, references carry a name, a signature and
//! a scope. Everything lives in the arenas of a [`MetadataGraph`] and is addressed through
//! the typed ids of [`ids`]; the tagged handles ([`TypeHandle`], [`MethodHandle`],
//! [`FieldHandle`]) distinguish definitions from references.

mod assembly;
mod attributes;
mod constant;
mod graph;
mod ids;
mod members;
mod types;

pub use assembly::*;
pub use attributes::*;
pub use constant::{Constant, ConstantValue};
pub use graph::MetadataGraph;
pub use ids::*;
pub use members::*;
pub use types::*;
