//! `TypeDef`, `TypeRef`, `TypeSpec` and generic parameter readers.

use crate::{
    metadata::{
        model::{
            ClassLayout, FieldId, GenericOwner, GenericParamAttributes, GenericParamConstraint,
            GenericParamId, GenericParameter, InterfaceImplementation, MethodId, MethodOverride,
            ResolutionScope, TypeAttributes, TypeDefId, TypeDefinition, TypeHandle, TypeRefId,
            TypeReference,
        },
        reader::{
            cache::{memo, remember, EscrowKind},
            ReadContext, ReadFrame,
        },
        signatures::TypeSig,
        tables::{
            ClassLayoutRaw, GenericParamConstraintRaw, GenericParamRaw, InterfaceImplRaw,
            MethodImplRaw, NestedClassRaw, RowDefinition, TableId, TypeDefRaw, TypeRefRaw,
            TypeSpecRaw,
        },
        token::Token,
    },
    Result,
};

impl ReadContext<'_> {
    /// Materialize the type definition `rid`
    pub(crate) fn type_def(&mut self, rid: u32) -> Result<TypeDefId> {
        if let Some(id) = memo(&self.cache.types, rid) {
            return Ok(id);
        }

        let row = self.row::<TypeDefRaw>(rid)?;
        let definition = TypeDefinition::unloaded(
            row.token(),
            TypeAttributes::from_bits_retain(row.flags),
            self.string(row.type_namespace)?,
            self.string(row.type_name)?,
        );
        let id = self.graph.push_type_def(definition);
        remember(&mut self.cache.types, rid, id);
        tracing::trace!(token = %row.token(), "materialized type definition");

        if let Some(enclosing) = self.cache.enclosing_type(rid, self.header, self.tables)? {
            let declaring = self.type_def(enclosing)?;
            self.graph.type_def_mut(id).declaring_type = Some(declaring);
        }

        if !row.extends.is_null() {
            let base =
                self.with_frames(vec![ReadFrame::Type(id)], |ctx| ctx.type_sig_of(row.extends))?;
            self.graph.type_def_mut(id).base_type = Some(base);
        }

        if let Some(layout) = self.take_escrow(EscrowKind::ClassLayout, row.token())?.first() {
            let layout = self.row::<ClassLayoutRaw>(*layout)?;
            self.graph.type_def_mut(id).layout = Some(ClassLayout {
                packing_size: layout.packing_size,
                class_size: layout.class_size,
            });
        }

        Ok(id)
    }

    /// Materialize the type reference `rid`
    pub(crate) fn type_ref(&mut self, rid: u32) -> Result<TypeRefId> {
        if let Some(id) = memo(&self.cache.type_refs, rid) {
            return Ok(id);
        }

        let row = self.row::<TypeRefRaw>(rid)?;
        let mut reference = TypeReference::new(
            ResolutionScope::None,
            &self.string(row.type_namespace)?,
            &self.string(row.type_name)?,
        );
        reference.token = row.token();
        let id = self.graph.push_type_ref(reference);
        remember(&mut self.cache.type_refs, rid, id);
        tracing::trace!(token = %row.token(), "materialized type reference");

        let scope = self.resolution_scope(row.resolution_scope)?;
        self.graph.type_ref_mut(id).scope = scope;
        Ok(id)
    }

    fn resolution_scope(&mut self, token: Token) -> Result<ResolutionScope> {
        if token.is_null() {
            return Ok(ResolutionScope::None);
        }

        match token.table_id() {
            Some(TableId::Module) => Ok(ResolutionScope::Module),
            Some(TableId::ModuleRef) => {
                Ok(ResolutionScope::ModuleRef(self.module_ref(token.row())?))
            }
            Some(TableId::AssemblyRef) => {
                Ok(ResolutionScope::AssemblyRef(self.assembly_ref(token.row())?))
            }
            Some(TableId::TypeRef) => Ok(ResolutionScope::TypeRef(self.type_ref(token.row())?)),
            _ => Err(malformed_error!("Invalid resolution scope - {}", token)),
        }
    }

    /// Decode the `TypeSpec` row `rid` against the active frames
    pub(crate) fn type_spec(&mut self, rid: u32) -> Result<TypeSig> {
        let row = self.row::<TypeSpecRaw>(rid)?;
        self.parse_type_spec(row.signature)
    }

    /// A `TypeDef` or `TypeRef` token as handle; `TypeSpec` tokens are not allowed here
    pub(crate) fn type_handle(&mut self, token: Token) -> Result<TypeHandle> {
        match token.table_id() {
            Some(TableId::TypeDef) if !token.is_null() => {
                Ok(TypeHandle::Definition(self.type_def(token.row())?))
            }
            Some(TableId::TypeRef) if !token.is_null() => {
                Ok(TypeHandle::Reference(self.type_ref(token.row())?))
            }
            _ => Err(malformed_error!("Invalid type token in signature - {}", token)),
        }
    }

    /// A `TypeDefOrRef` column as signature
    pub(crate) fn type_sig_of(&mut self, token: Token) -> Result<TypeSig> {
        match token.table_id() {
            Some(TableId::TypeSpec) if !token.is_null() => self.type_spec(token.row()),
            _ => Ok(TypeSig::Class(self.type_handle(token)?)),
        }
    }

    /// Load the fields owned by `id`
    pub(crate) fn type_fields(&mut self, id: TypeDefId) -> Result<Vec<FieldId>> {
        if let Some(fields) = &self.graph.type_def(id).fields {
            return Ok(fields.clone());
        }

        let range = self.cache.field_ranges.range(self.graph.type_def(id).token.row());
        let mut fields = Vec::with_capacity(range.len());
        for rid in range {
            fields.push(self.field(rid)?);
        }

        self.graph.type_def_mut(id).fields = Some(fields.clone());
        Ok(fields)
    }

    /// Load the methods owned by `id`
    pub(crate) fn type_methods(&mut self, id: TypeDefId) -> Result<Vec<MethodId>> {
        if let Some(methods) = &self.graph.type_def(id).methods {
            return Ok(methods.clone());
        }

        let range = self.cache.method_ranges.range(self.graph.type_def(id).token.row());
        let mut methods = Vec::with_capacity(range.len());
        for rid in range {
            methods.push(self.method(rid)?);
        }

        self.graph.type_def_mut(id).methods = Some(methods.clone());
        Ok(methods)
    }

    /// Load the types nested in `id`
    pub(crate) fn type_nested_types(&mut self, id: TypeDefId) -> Result<Vec<TypeDefId>> {
        if let Some(nested) = &self.graph.type_def(id).nested_types {
            return Ok(nested.clone());
        }

        let token = self.graph.type_def(id).token;
        let mut nested = Vec::new();
        for rid in self.take_escrow(EscrowKind::NestedClass, token)? {
            let row = self.row::<NestedClassRaw>(rid)?;
            nested.push(self.type_def(row.nested_class)?);
        }

        self.graph.type_def_mut(id).nested_types = Some(nested.clone());
        Ok(nested)
    }

    /// Load the interfaces implemented by `id`
    pub(crate) fn type_interfaces(&mut self, id: TypeDefId) -> Result<()> {
        if self.graph.type_def(id).interfaces.is_some() {
            return Ok(());
        }

        let token = self.graph.type_def(id).token;
        let mut interfaces = Vec::new();
        for rid in self.take_escrow(EscrowKind::InterfaceImpl, token)? {
            let row = self.row::<InterfaceImplRaw>(rid)?;
            let interface =
                self.with_frames(vec![ReadFrame::Type(id)], |ctx| ctx.type_sig_of(row.interface))?;
            interfaces.push(InterfaceImplementation {
                token: row.token(),
                interface,
            });
        }

        self.graph.type_def_mut(id).interfaces = Some(interfaces);
        Ok(())
    }

    /// Load the explicit overrides declared by `id`
    pub(crate) fn type_overrides(&mut self, id: TypeDefId) -> Result<()> {
        if self.graph.type_def(id).overrides.is_some() {
            return Ok(());
        }

        let token = self.graph.type_def(id).token;
        let mut overrides = Vec::new();
        for rid in self.take_escrow(EscrowKind::MethodImpl, token)? {
            let row = self.row::<MethodImplRaw>(rid)?;
            overrides.push(MethodOverride {
                body: self.method_handle(row.method_body)?,
                declaration: self.method_handle(row.method_declaration)?,
            });
        }

        self.graph.type_def_mut(id).overrides = Some(overrides);
        Ok(())
    }

    /// Load the generic parameters of `id`, ordered by position
    pub(crate) fn type_generic_parameters(&mut self, id: TypeDefId) -> Result<Vec<GenericParamId>> {
        if let Some(parameters) = &self.graph.type_def(id).generic_parameters {
            return Ok(parameters.clone());
        }

        let token = self.graph.type_def(id).token;
        let parameters = self.owned_generic_parameters(token)?;
        self.graph.type_def_mut(id).generic_parameters = Some(parameters.clone());
        Ok(parameters)
    }

    /// Materialize the generic parameters parked for the `TypeDef` or `MethodDef` `owner`
    pub(crate) fn owned_generic_parameters(&mut self, owner: Token) -> Result<Vec<GenericParamId>> {
        let mut rows = Vec::new();
        for rid in self.take_escrow(EscrowKind::GenericParam, owner)? {
            rows.push(self.row::<GenericParamRaw>(rid)?);
        }
        rows.sort_by_key(|row| row.number);

        let mut parameters = Vec::with_capacity(rows.len());
        for row in rows {
            parameters.push(self.generic_param(row.rid)?);
        }
        Ok(parameters)
    }

    /// Materialize the generic parameter `rid`
    pub(crate) fn generic_param(&mut self, rid: u32) -> Result<GenericParamId> {
        if let Some(id) = memo(&self.cache.generic_params, rid) {
            return Ok(id);
        }

        let row = self.row::<GenericParamRaw>(rid)?;
        let owner = match row.owner.table_id() {
            Some(TableId::TypeDef) if !row.owner.is_null() => {
                GenericOwner::Type(self.type_def(row.owner.row())?)
            }
            Some(TableId::MethodDef) if !row.owner.is_null() => {
                GenericOwner::Method(self.method(row.owner.row())?)
            }
            _ => return Err(malformed_error!("Invalid generic parameter owner - {}", row.owner)),
        };

        // Materializing a method binds its signature, which may already have created this row
        if let Some(id) = memo(&self.cache.generic_params, rid) {
            return Ok(id);
        }

        let parameter = GenericParameter::new(
            row.token(),
            row.number,
            GenericParamAttributes::from_bits_retain(row.flags),
            self.string(row.name)?,
            owner,
        );
        let id = self.graph.push_generic_parameter(parameter);
        remember(&mut self.cache.generic_params, rid, id);
        Ok(id)
    }

    /// Load the constraints of the generic parameter `id`
    pub(crate) fn generic_param_constraints(&mut self, id: GenericParamId) -> Result<()> {
        let parameter = self.graph.generic_parameter(id);
        if parameter.constraints.is_some() {
            return Ok(());
        }

        let token = parameter.token;
        let frames = match parameter.owner {
            GenericOwner::Type(owner) => vec![ReadFrame::Type(owner)],
            GenericOwner::Method(owner) => {
                let mut frames = Self::type_frames(self.graph.method(owner).declaring_type);
                frames.push(ReadFrame::Method(owner));
                frames
            }
            GenericOwner::TypeReference(_) | GenericOwner::MethodReference(_) => Vec::new(),
        };

        let mut constraints = Vec::new();
        for rid in self.take_escrow(EscrowKind::GenericParamConstraint, token)? {
            let row = self.row::<GenericParamConstraintRaw>(rid)?;
            let constraint_type =
                self.with_frames(frames.clone(), |ctx| ctx.type_sig_of(row.constraint))?;
            constraints.push(GenericParamConstraint {
                token: row.token(),
                constraint_type,
            });
        }

        self.graph.generic_parameter_mut(id).constraints = Some(constraints);
        Ok(())
    }

    /// Type definitions that are not nested in another type, in table order
    pub(crate) fn top_level_types(&mut self) -> Result<Vec<TypeDefId>> {
        let mut types = Vec::new();
        for rid in 1..=self.row_count(TableId::TypeDef) {
            if self.cache.enclosing_type(rid, self.header, self.tables)?.is_none() {
                types.push(self.type_def(rid)?);
            }
        }
        Ok(types)
    }
}
