//! Lazy materialization of the object graph.
//!
//! Opening a module only parses the metadata root and the `#~` header. Rows turn into
//! entities on first access: an entity's own columns are decoded right away, the lists it
//! owns (fields, methods, nested types, attributes, ...) stay in the image until someone asks
//! for them. Every materialized row is memoized in the [`MetadataCache`], so an entity is
//! created exactly once no matter how many paths lead to it.
//!
//! Decoding a signature may pull in further rows. Generic placeholders bind against the
//! generic parameters of the entity being read, tracked as a stack of [`ReadFrame`]s that is
//! swapped out around every nested read and restored afterwards.

mod attributes;
mod cache;
mod context;
mod manifest;
mod members;
mod types;

pub(crate) use cache::{EscrowKind, MetadataCache};
pub(crate) use context::{ReadContext, ReadFrame};

use std::sync::Arc;

use crate::{
    file::Backend,
    metadata::{
        model::MetadataGraph,
        options::ReaderOptions,
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader},
    },
    Error::{Empty, NotSupported},
    Result,
};

/// A placeholder heap for images without a `#Strings` or `#Blob` stream
const EMPTY_HEAP: &[u8] = &[0];

/// The backing image of a module and everything needed to decode it
pub(crate) struct MetadataReader {
    image: Arc<dyn Backend>,
    root: Root,
    header: TablesHeader,
    cache: MetadataCache,
}

impl MetadataReader {
    /// Parse the metadata root and the table header of `image`
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty image, [`crate::Error::NotSupported`] for
    /// the uncompressed `#-` table stream, or a format error for a damaged root or header
    pub(crate) fn new(image: Arc<dyn Backend>) -> Result<Self> {
        if image.is_empty() {
            return Err(Empty);
        }

        let data = image.data();
        let root = Root::read(data)?;
        if root.stream("#-").is_some() {
            return Err(NotSupported);
        }

        let Some(tables) = root.stream_data(data, "#~")? else {
            return Err(malformed_error!("Metadata root has no #~ stream"));
        };
        let header = TablesHeader::from(tables)?;
        let cache = MetadataCache::new(&header, tables)?;

        // Heaps are validated once here, contexts are created on every access
        if let Some(heap) = root.stream_data(data, "#Strings")? {
            Strings::from(heap)?;
        }
        if let Some(heap) = root.stream_data(data, "#Blob")? {
            Blob::from(heap)?;
        }
        if let Some(heap) = root.stream_data(data, "#GUID")? {
            Guid::from(heap)?;
        }

        tracing::debug!(
            version = %root.version,
            tables = header.table_count(),
            table_version = %format_args!("{}.{}", header.major_version, header.minor_version),
            "opened metadata image"
        );

        Ok(MetadataReader {
            image,
            root,
            header,
            cache,
        })
    }

    /// The metadata root of the image
    pub(crate) fn root(&self) -> &Root {
        &self.root
    }

    /// Open a read context writing into `graph`
    ///
    /// # Errors
    /// Returns an error if a heap stream lies outside of the image
    pub(crate) fn context<'a>(
        &'a mut self,
        graph: &'a mut MetadataGraph,
        options: &'a ReaderOptions,
    ) -> Result<ReadContext<'a>> {
        let data = self.image.data();
        let tables = self.root.stream_data(data, "#~")?.unwrap_or_default();
        let strings = self.root.stream_data(data, "#Strings")?.unwrap_or(EMPTY_HEAP);
        let blobs = self.root.stream_data(data, "#Blob")?.unwrap_or(EMPTY_HEAP);
        let guids = self.root.stream_data(data, "#GUID")?.unwrap_or_default();

        Ok(ReadContext::new(
            Strings::from(strings)?,
            Blob::from(blobs)?,
            Guid::from(guids)?,
            tables,
            &self.header,
            &mut self.cache,
            graph,
            options,
        ))
    }
}
