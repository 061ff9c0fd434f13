//! Configuration of reading and writing.

use std::{fmt, sync::Arc};

use crate::metadata::{resolver::AssemblyResolver, signatures::MAX_RECURSION_DEPTH};

/// When the object graph is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingMode {
    /// Materialize entities on first access
    #[default]
    Deferred,
    /// Materialize the complete graph while opening the module
    Immediate,
}

/// Options for opening a module
#[derive(Clone)]
pub struct ReaderOptions {
    /// When the object graph is materialized
    pub mode: ReadingMode,
    /// Nesting limit for signature decoding
    pub max_signature_depth: usize,
    /// Drop custom attributes whose constructor or blob cannot be read instead of failing
    pub skip_invalid_attributes: bool,
    /// Finds the modules behind assembly references
    pub assembly_resolver: Option<Arc<dyn AssemblyResolver>>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            mode: ReadingMode::Deferred,
            max_signature_depth: MAX_RECURSION_DEPTH,
            skip_invalid_attributes: false,
            assembly_resolver: None,
        }
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("mode", &self.mode)
            .field("max_signature_depth", &self.max_signature_depth)
            .field("skip_invalid_attributes", &self.skip_invalid_attributes)
            .field("assembly_resolver", &self.assembly_resolver.is_some())
            .finish()
    }
}

impl ReaderOptions {
    /// Materialize everything while opening
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            mode: ReadingMode::Immediate,
            ..Self::default()
        }
    }

    /// Tolerate damaged custom attributes
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            skip_invalid_attributes: true,
            ..Self::default()
        }
    }

    /// Attach an assembly resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn AssemblyResolver>) -> Self {
        self.assembly_resolver = Some(resolver);
        self
    }
}

/// Options for writing a module
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Version of the `#~` stream, `(2, 0)` by default
    pub table_version: (u8, u8),
    /// Version string of the metadata root; `None` keeps the one read from the image
    pub runtime_version: Option<String>,
    /// Collapse structurally equal references into one row
    pub deduplicate_references: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            table_version: (2, 0),
            runtime_version: None,
            deduplicate_references: true,
        }
    }
}

impl WriterOptions {
    /// Emit one row per reference entity, without structural deduplication
    #[must_use]
    pub fn verbatim() -> Self {
        Self {
            deduplicate_references: false,
            ..Self::default()
        }
    }

    /// Override the version string of the metadata root
    #[must_use]
    pub fn with_runtime_version(mut self, version: &str) -> Self {
        self.runtime_version = Some(version.to_string());
        self
    }
}
