//! ECMA-335 metadata: the physical layer, the object graph and the machinery between them.
//!
//! The physical layer ([`root`], [`streams`], [`tables`], [`token`]) describes the bytes of a
//! metadata root. The [`model`] is the typed object graph a [`module::ModuleDefinition`]
//! exposes; it is filled on demand by the [`reader`] and turned back into rows by the
//! [`builder`]. [`signatures`], [`customattributes`] and [`security`] are the blob codecs
//! both directions share. Cross-module work goes through the [`importer`] (copying
//! references into another module) and the [`resolver`] (finding the definition behind a
//! reference).
//!
//! # Examples
//!
//! ```rust
//! use dotmeta::metadata::{module::ModuleDefinition, options::ReaderOptions};
//!
//! let mut module = ModuleDefinition::new("Empty.dll");
//! let image = module.write()?;
//!
//! let mut reread = ModuleDefinition::from_mem_with(image, ReaderOptions::immediate())?;
//! assert_eq!(reread.name, "Empty.dll");
//! assert_eq!(reread.types()?.len(), 1);
//! # Ok::<(), dotmeta::Error>(())
//! ```

/// Serialization of a module into a metadata root
pub mod builder;
/// Custom attribute blobs
pub mod customattributes;
/// The generic parameter context used while importing
pub mod generics;
/// Copying references between modules
pub mod importer;
/// The typed object graph
pub mod model;
/// The module facade
pub mod module;
/// Reader and writer options
pub mod options;
/// Lazy materialization of rows into the object graph
pub(crate) mod reader;
/// Resolution of references to their definitions
pub mod resolver;
/// The metadata root and its stream directory
pub mod root;
/// Declarative security blobs
pub mod security;
/// Type, method, field, property and local variable signatures
pub mod signatures;
/// Metadata heaps and the table stream header
pub mod streams;
/// Metadata tables and coded indexes
pub mod tables;
/// Metadata tokens
pub mod token;
