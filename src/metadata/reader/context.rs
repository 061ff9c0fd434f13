//! The read context shared by every table reader.

use crate::{
    metadata::{
        model::{GenericParamId, MetadataGraph, MethodId, TypeDefId, TypeHandle},
        options::ReaderOptions,
        reader::cache::{EscrowKind, MetadataCache},
        signatures::{
            LocalVarSig, MemberSig, MethodSig, PropertySig, SignatureParser, SignatureResolver,
            TypeSig, CALLING_CONVENTION,
        },
        streams::{Blob, Guid, Strings, TablesHeader},
        tables::{RowDefinition, TableId},
        token::Token,
    },
    Result,
};

/// A generic owner whose parameters placeholders bind against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadFrame {
    /// `!n` binds against the parameters of this type
    Type(TypeDefId),
    /// `!!n` binds against the parameters of this method
    Method(MethodId),
}

/// Heaps, tables and caches of one module, borrowed for the duration of one access
pub(crate) struct ReadContext<'a> {
    pub(crate) strings: Strings<'a>,
    pub(crate) blobs: Blob<'a>,
    pub(crate) guids: Guid<'a>,
    pub(crate) tables: &'a [u8],
    pub(crate) header: &'a TablesHeader,
    pub(crate) cache: &'a mut MetadataCache,
    pub(crate) graph: &'a mut MetadataGraph,
    pub(crate) options: &'a ReaderOptions,
    frames: Vec<ReadFrame>,
}

impl<'a> ReadContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        strings: Strings<'a>,
        blobs: Blob<'a>,
        guids: Guid<'a>,
        tables: &'a [u8],
        header: &'a TablesHeader,
        cache: &'a mut MetadataCache,
        graph: &'a mut MetadataGraph,
        options: &'a ReaderOptions,
    ) -> Self {
        ReadContext {
            strings,
            blobs,
            guids,
            tables,
            header,
            cache,
            graph,
            options,
            frames: Vec::new(),
        }
    }

    /// Decode the row `rid` of the table `T`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `rid` is 0 or beyond the table
    pub(crate) fn row<T: RowDefinition>(&self, rid: u32) -> Result<T> {
        self.header.table::<T>(self.tables)?.get(rid)
    }

    pub(crate) fn row_count(&self, table: TableId) -> u32 {
        self.header.info.row_count(table)
    }

    pub(crate) fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }

    pub(crate) fn blob(&self, index: u32) -> Result<&'a [u8]> {
        self.blobs.get(index as usize)
    }

    pub(crate) fn guid(&self, index: u32) -> Result<uguid::Guid> {
        self.guids.get(index as usize)
    }

    /// Take the rows parked for `owner`
    ///
    /// # Errors
    /// Returns an error if the escrowed table has to be scanned and a row is damaged
    pub(crate) fn take_escrow(&mut self, kind: EscrowKind, owner: Token) -> Result<Vec<u32>> {
        if owner.is_null() {
            return Ok(Vec::new());
        }
        Ok(self.cache.escrow(kind, self.header, self.tables)?.take(owner))
    }

    /// Returns `true` if rows for `owner` are still parked
    ///
    /// # Errors
    /// Returns an error if the escrowed table has to be scanned and a row is damaged
    pub(crate) fn in_escrow(&mut self, kind: EscrowKind, owner: Token) -> Result<bool> {
        if owner.is_null() {
            return Ok(false);
        }
        Ok(self.cache.escrow(kind, self.header, self.tables)?.contains(owner))
    }

    /// Run `read` with `frames` as the active generic context, restoring the previous one
    /// afterwards, also on error
    pub(crate) fn with_frames<T>(
        &mut self,
        frames: Vec<ReadFrame>,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.frames, frames);
        let result = read(self);
        self.frames = saved;
        result
    }

    /// The frames of a member declared by `declaring`
    pub(crate) fn type_frames(declaring: Option<TypeDefId>) -> Vec<ReadFrame> {
        declaring.map(ReadFrame::Type).into_iter().collect()
    }

    pub(crate) fn parse_type_spec(&mut self, blob: u32) -> Result<TypeSig> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_type_spec_signature())
    }

    pub(crate) fn parse_field_signature(&mut self, blob: u32) -> Result<TypeSig> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_field_signature())
    }

    pub(crate) fn parse_method_signature(&mut self, blob: u32) -> Result<MethodSig> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_method_signature())
    }

    pub(crate) fn parse_property_signature(&mut self, blob: u32) -> Result<PropertySig> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_property_signature())
    }

    pub(crate) fn parse_local_var_signature(&mut self, blob: u32) -> Result<LocalVarSig> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_local_var_signature())
    }

    pub(crate) fn parse_method_spec(&mut self, blob: u32) -> Result<Vec<TypeSig>> {
        let data = self.blob(blob)?;
        let max_depth = self.options.max_signature_depth;
        SignatureParser::new(data, self)
            .with_max_depth(max_depth)
            .parse_whole(|parser| parser.parse_method_spec_signature())
    }

    /// A `MemberRef` signature, field or method depending on the first byte
    pub(crate) fn parse_member_signature(&mut self, blob: u32) -> Result<MemberSig> {
        let data = self.blob(blob)?;
        if data.first() == Some(&CALLING_CONVENTION::FIELD) {
            Ok(MemberSig::Field(self.parse_field_signature(blob)?))
        } else {
            Ok(MemberSig::Method(self.parse_method_signature(blob)?))
        }
    }
}

impl SignatureResolver for ReadContext<'_> {
    fn resolve_type(&mut self, token: Token) -> Result<TypeHandle> {
        self.type_handle(token)
    }

    fn bind_type_parameter(&mut self, position: u32) -> Result<Option<GenericParamId>> {
        let owner = self.frames.iter().rev().find_map(|frame| match frame {
            ReadFrame::Type(id) => Some(*id),
            ReadFrame::Method(_) => None,
        });
        let Some(owner) = owner else {
            return Ok(None);
        };

        let parameters = self.type_generic_parameters(owner)?;
        match parameters.get(position as usize) {
            Some(id) => Ok(Some(*id)),
            None => Err(malformed_error!(
                "Type placeholder !{} is out of range for {:?} with {} parameters",
                position,
                owner,
                parameters.len()
            )),
        }
    }

    fn bind_method_parameter(&mut self, position: u32) -> Result<Option<GenericParamId>> {
        let owner = self.frames.iter().rev().find_map(|frame| match frame {
            ReadFrame::Method(id) => Some(*id),
            ReadFrame::Type(_) => None,
        });
        let Some(owner) = owner else {
            return Ok(None);
        };

        let parameters = self.method_generic_parameters(owner)?;
        match parameters.get(position as usize) {
            Some(id) => Ok(Some(*id)),
            None => Err(malformed_error!(
                "Method placeholder !!{} is out of range for {:?} with {} parameters",
                position,
                owner,
                parameters.len()
            )),
        }
    }
}
