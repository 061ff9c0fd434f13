// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # dotmeta
//!
//! A reader and writer for ECMA-335 module metadata, the part of a .NET assembly that
//! describes its types, members, references and attributes. `dotmeta` works on the metadata
//! root (the `BSJB` blob) directly: PE headers, method bodies and IL are outside of its scope.
//!
//! ## Features
//!
//! - **Lazy reading** - rows are materialized into a typed object graph on first access,
//!   or all at once with [`ReadingMode::Immediate`]
//! - **Writing** - a possibly mutated graph is re-encoded into deduplicated, correctly
//!   ordered rows with fresh heaps
//! - **Signatures** - a complete codec for type, method, field, property, local variable
//!   and generic instantiation blobs, plus custom attribute and permission set blobs
//! - **Cross-module work** - references are imported between modules with their generic
//!   placeholders rebound, and resolved back to their definitions through an
//!   [`AssemblyResolver`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dotmeta::prelude::*;
//!
//! let mut module = ModuleDefinition::new_assembly(
//!     "Demo.dll",
//!     AssemblyDefinition::new("Demo", AssemblyVersion::new(1, 0, 0, 0)),
//! );
//! let corlib = module.add_assembly_reference(AssemblyNameReference::new(
//!     "mscorlib",
//!     AssemblyVersion::new(4, 0, 0, 0),
//! ))?;
//! let object = module.add_type_reference(TypeReference::new(
//!     ResolutionScope::AssemblyRef(corlib),
//!     "System",
//!     "Object",
//! ));
//! module.add_type(TypeDefinition::new(
//!     "Demo",
//!     "Widget",
//!     TypeAttributes::PUBLIC,
//!     Some(TypeSig::Class(TypeHandle::Reference(object))),
//! ))?;
//!
//! let image = module.write()?;
//! let mut reread = ModuleDefinition::from_mem(image)?;
//! assert!(reread.find_type("Demo", "Widget")?.is_some());
//! # Ok::<(), dotmeta::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata::module`] - the [`ModuleDefinition`] facade, owner of everything below
//! - [`metadata::model`] - the object graph: definitions, references and their ids
//! - [`metadata::builder`] - serialization of a module into a metadata root
//! - [`metadata::importer`] - copying references between modules
//! - [`metadata::resolver`] - from a reference to its definition
//! - [`metadata::signatures`], [`metadata::customattributes`], [`metadata::security`] -
//!   blob codecs
//! - [`metadata::tables`], [`metadata::streams`], [`metadata::root`] - the physical layout
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` when a module is opened or built, `trace` for
//! every materialized row and import, `warn` for skipped damaged attributes. No subscriber is
//! installed by the library.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use dotmeta::{Error, ModuleDefinition};
//!
//! match ModuleDefinition::from_mem(Vec::new()) {
//!     Ok(_) => unreachable!(),
//!     Err(Error::Empty) => println!("no input"),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Standards Compliance
//!
//! `dotmeta` implements Partition II of the **ECMA-335 specification** (6th edition):
//! the metadata root (II.24), the tables (II.22) and the blob formats (II.23).
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Byte sources and the write buffer
pub mod file;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotmeta::prelude::*;
///
/// let module = ModuleDefinition::new("Empty.dll");
/// assert_eq!(module.graph().type_def_count(), 1);
/// ```
pub mod prelude;

/// Reading, modelling, importing, resolving and writing ECMA-335 metadata
pub mod metadata;

/// `dotmeta` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotmeta` Error type
///
/// Every fallible operation of the crate reports one of its variants.
pub use error::Error;

/// The module facade, entry point for reading and writing
pub use metadata::module::ModuleDefinition;

/// Reader and writer configuration
pub use metadata::options::{ReaderOptions, ReadingMode, WriterOptions};

/// Cross-module resolution
pub use metadata::resolver::{AssemblyResolver, DefaultAssemblyResolver, ModuleRc};

/// Copying references between modules
pub use metadata::importer::Importer;

/// Cursor over metadata bytes
pub use file::parser::Parser;

/// Read access to the metadata heaps and stream headers
pub use metadata::streams::{Blob, Guid, StreamHeader, Strings, TablesHeader};
