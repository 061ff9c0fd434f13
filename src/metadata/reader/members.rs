//! `Field`, `MethodDef`, `Param`, `Property`, `Event`, `MemberRef` and `MethodSpec` readers.

use crate::{
    metadata::{
        model::{
            Constant, EventAttributes, EventDefinition, EventId, FieldAttributes, FieldDefinition,
            FieldId, GenericParamId, MemberRefId, MemberRefParent, MemberReference,
            MethodAttributes, MethodDefinition, MethodHandle, MethodId, MethodImplAttributes,
            MethodSemanticsAttributes, MethodSpecId, MethodSpecification, PInvokeAttributes,
            PInvokeInfo, ParamAttributes, ParamId, ParameterDefinition, PropertyAttributes,
            PropertyDefinition, PropertyId, StandAloneSig, StandAloneSignature, TypeDefId,
        },
        reader::{
            cache::{memo, remember, EscrowKind},
            ReadContext, ReadFrame,
        },
        signatures::{MethodSig, PropertySig, TypeSig, CALLING_CONVENTION},
        tables::{
            ConstantRaw, EventRaw, FieldLayoutRaw, FieldMarshalRaw, FieldRaw, FieldRvaRaw,
            ImplMapRaw, MemberRefRaw, MethodDefRaw, MethodSemanticsRaw, MethodSpecRaw, ParamRaw,
            PropertyRaw, RowDefinition, StandAloneSigRaw, TableId,
        },
        token::Token,
    },
    Result,
};

impl ReadContext<'_> {
    /// Materialize the field `rid`
    pub(crate) fn field(&mut self, rid: u32) -> Result<FieldId> {
        if let Some(id) = memo(&self.cache.fields, rid) {
            return Ok(id);
        }

        let row = self.row::<FieldRaw>(rid)?;
        let mut field = FieldDefinition::new(
            &self.string(row.name)?,
            FieldAttributes::from_bits_retain(row.flags),
            TypeSig::Void,
        );
        field.token = row.token();
        let id = self.graph.push_field(field);
        remember(&mut self.cache.fields, rid, id);
        tracing::trace!(token = %row.token(), "materialized field");

        let declaring = match self.cache.field_ranges.owner_of(rid) {
            Some(owner) => Some(self.type_def(owner)?),
            None => None,
        };
        let signature = self.with_frames(Self::type_frames(declaring), |ctx| {
            ctx.parse_field_signature(row.signature)
        })?;

        let constant = self.constant(row.token())?;
        let marshal = self.marshal(row.token())?;
        let rva = match self.take_escrow(EscrowKind::FieldRva, row.token())?.first() {
            Some(rva) => Some(self.row::<FieldRvaRaw>(*rva)?.rva),
            None => None,
        };
        let offset = match self.take_escrow(EscrowKind::FieldLayout, row.token())?.first() {
            Some(layout) => Some(self.row::<FieldLayoutRaw>(*layout)?.field_offset),
            None => None,
        };

        let field = self.graph.field_mut(id);
        field.declaring_type = declaring;
        field.signature = signature;
        field.constant = constant;
        field.marshal = marshal;
        field.rva = rva;
        field.offset = offset;
        Ok(id)
    }

    /// Materialize the method `rid`
    pub(crate) fn method(&mut self, rid: u32) -> Result<MethodId> {
        if let Some(id) = memo(&self.cache.methods, rid) {
            return Ok(id);
        }

        let row = self.row::<MethodDefRaw>(rid)?;
        let mut method = MethodDefinition::new(
            &self.string(row.name)?,
            MethodAttributes::from_bits_retain(row.flags),
            MethodSig::new_static(TypeSig::Void, Vec::new()),
        );
        method.token = row.token();
        method.impl_flags = MethodImplAttributes::from_bits_retain(row.impl_flags);
        method.rva = row.rva;
        method.parameters = None;
        method.generic_parameters = None;
        let id = self.graph.push_method(method);
        remember(&mut self.cache.methods, rid, id);
        tracing::trace!(token = %row.token(), "materialized method");

        let declaring = match self.cache.method_ranges.owner_of(rid) {
            Some(owner) => Some(self.type_def(owner)?),
            None => None,
        };
        self.graph.method_mut(id).declaring_type = declaring;

        let mut frames = Self::type_frames(declaring);
        frames.push(ReadFrame::Method(id));
        let signature = self.with_frames(frames, |ctx| ctx.parse_method_signature(row.signature))?;
        self.graph.method_mut(id).signature = signature;

        if let Some(map) = self.take_escrow(EscrowKind::ImplMap, row.token())?.first() {
            let map = self.row::<ImplMapRaw>(*map)?;
            let pinvoke = PInvokeInfo {
                flags: PInvokeAttributes::from_bits_retain(map.mapping_flags),
                entry_point: self.string(map.import_name)?,
                module: self.module_ref(map.import_scope)?,
            };
            self.graph.method_mut(id).pinvoke = Some(pinvoke);
        }

        Ok(id)
    }

    /// Load the parameter rows of `id`
    pub(crate) fn method_parameters(&mut self, id: MethodId) -> Result<Vec<ParamId>> {
        if let Some(parameters) = &self.graph.method(id).parameters {
            return Ok(parameters.clone());
        }

        let range = self.cache.param_ranges.range(self.graph.method(id).token.row());
        let mut parameters = Vec::with_capacity(range.len());
        for rid in range {
            parameters.push(self.param(rid)?);
        }

        self.graph.method_mut(id).parameters = Some(parameters.clone());
        Ok(parameters)
    }

    /// Load the generic parameters of `id`, ordered by position
    pub(crate) fn method_generic_parameters(
        &mut self,
        id: MethodId,
    ) -> Result<Vec<GenericParamId>> {
        if let Some(parameters) = &self.graph.method(id).generic_parameters {
            return Ok(parameters.clone());
        }

        let token = self.graph.method(id).token;
        let parameters = self.owned_generic_parameters(token)?;
        self.graph.method_mut(id).generic_parameters = Some(parameters.clone());
        Ok(parameters)
    }

    /// Materialize the parameter `rid`
    pub(crate) fn param(&mut self, rid: u32) -> Result<ParamId> {
        if let Some(id) = memo(&self.cache.params, rid) {
            return Ok(id);
        }

        let row = self.row::<ParamRaw>(rid)?;
        let mut parameter = ParameterDefinition::new(
            &self.string(row.name)?,
            row.sequence,
            ParamAttributes::from_bits_retain(row.flags),
        );
        parameter.token = row.token();
        parameter.constant = self.constant(row.token())?;
        parameter.marshal = self.marshal(row.token())?;
        let id = self.graph.push_parameter(parameter);
        remember(&mut self.cache.params, rid, id);

        if let Some(owner) = self.cache.param_ranges.owner_of(rid) {
            let method = self.method(owner)?;
            self.graph.parameter_mut(id).method = Some(method);
        }
        Ok(id)
    }

    /// Materialize the property `rid`
    pub(crate) fn property(&mut self, rid: u32) -> Result<PropertyId> {
        if let Some(id) = memo(&self.cache.properties, rid) {
            return Ok(id);
        }

        let row = self.row::<PropertyRaw>(rid)?;
        let mut property = PropertyDefinition::new(
            &self.string(row.name)?,
            PropertyAttributes::from_bits_retain(row.flags),
            PropertySig {
                has_this: false,
                property_type: TypeSig::Void,
                params: Vec::new(),
            },
        );
        property.token = row.token();
        let id = self.graph.push_property(property);
        remember(&mut self.cache.properties, rid, id);
        tracing::trace!(token = %row.token(), "materialized property");

        let declaring = match self.cache.property_owner(rid, self.header, self.tables)? {
            Some(owner) => Some(self.type_def(owner)?),
            None => None,
        };
        let signature = self.with_frames(Self::type_frames(declaring), |ctx| {
            ctx.parse_property_signature(row.signature)
        })?;
        let constant = self.constant(row.token())?;
        let semantics = self.semantics(row.token())?;

        let property = self.graph.property_mut(id);
        property.declaring_type = declaring;
        property.signature = signature;
        property.constant = constant;
        for (flags, method) in semantics {
            if flags.contains(MethodSemanticsAttributes::GETTER) {
                property.getter = Some(method);
            } else if flags.contains(MethodSemanticsAttributes::SETTER) {
                property.setter = Some(method);
            } else {
                property.other_methods.push(method);
            }
        }
        Ok(id)
    }

    /// Materialize the event `rid`
    pub(crate) fn event(&mut self, rid: u32) -> Result<EventId> {
        if let Some(id) = memo(&self.cache.events, rid) {
            return Ok(id);
        }

        let row = self.row::<EventRaw>(rid)?;
        let mut event = EventDefinition::new(
            &self.string(row.name)?,
            EventAttributes::from_bits_retain(row.flags),
            TypeSig::Object,
        );
        event.token = row.token();
        let id = self.graph.push_event(event);
        remember(&mut self.cache.events, rid, id);
        tracing::trace!(token = %row.token(), "materialized event");

        let declaring = match self.cache.event_owner(rid, self.header, self.tables)? {
            Some(owner) => Some(self.type_def(owner)?),
            None => None,
        };
        let event_type = if row.event_type.is_null() {
            TypeSig::Object
        } else {
            self.with_frames(Self::type_frames(declaring), |ctx| ctx.type_sig_of(row.event_type))?
        };
        let semantics = self.semantics(row.token())?;

        let event = self.graph.event_mut(id);
        event.declaring_type = declaring;
        event.event_type = event_type;
        for (flags, method) in semantics {
            if flags.contains(MethodSemanticsAttributes::ADD_ON) {
                event.add_method = Some(method);
            } else if flags.contains(MethodSemanticsAttributes::REMOVE_ON) {
                event.remove_method = Some(method);
            } else if flags.contains(MethodSemanticsAttributes::FIRE) {
                event.invoke_method = Some(method);
            } else {
                event.other_methods.push(method);
            }
        }
        Ok(id)
    }

    /// Load the properties of `id` through the `PropertyMap`
    pub(crate) fn type_properties(&mut self, id: TypeDefId) -> Result<Vec<PropertyId>> {
        if let Some(properties) = &self.graph.type_def(id).properties {
            return Ok(properties.clone());
        }

        let rid = self.graph.type_def(id).token.row();
        let mut properties = Vec::new();
        if let Some(map) = self.cache.property_map(rid, self.header, self.tables)? {
            for property in self.cache.property_ranges.range(map) {
                properties.push(self.property(property)?);
            }
        }

        self.graph.type_def_mut(id).properties = Some(properties.clone());
        Ok(properties)
    }

    /// Load the events of `id` through the `EventMap`
    pub(crate) fn type_events(&mut self, id: TypeDefId) -> Result<Vec<EventId>> {
        if let Some(events) = &self.graph.type_def(id).events {
            return Ok(events.clone());
        }

        let rid = self.graph.type_def(id).token.row();
        let mut events = Vec::new();
        if let Some(map) = self.cache.event_map(rid, self.header, self.tables)? {
            for event in self.cache.event_ranges.range(map) {
                events.push(self.event(event)?);
            }
        }

        self.graph.type_def_mut(id).events = Some(events.clone());
        Ok(events)
    }

    /// Materialize the member reference `rid`; its signatures bind without a generic context
    pub(crate) fn member_ref(&mut self, rid: u32) -> Result<MemberRefId> {
        if let Some(id) = memo(&self.cache.member_refs, rid) {
            return Ok(id);
        }

        let row = self.row::<MemberRefRaw>(rid)?;
        let (parent, signature) = self.with_frames(Vec::new(), |ctx| {
            let parent = match row.class.table_id() {
                _ if row.class.is_null() => {
                    return Err(malformed_error!("Member reference {} has no parent", row.token()))
                }
                Some(TableId::ModuleRef) => {
                    MemberRefParent::ModuleRef(ctx.module_ref(row.class.row())?)
                }
                Some(TableId::MethodDef) => MemberRefParent::Method(ctx.method(row.class.row())?),
                _ => MemberRefParent::Type(ctx.type_sig_of(row.class)?),
            };
            Ok((parent, ctx.parse_member_signature(row.signature)?))
        })?;

        let mut reference = MemberReference::new(parent, &self.string(row.name)?, signature);
        reference.token = row.token();
        let id = self.graph.push_member_ref(reference);
        remember(&mut self.cache.member_refs, rid, id);
        tracing::trace!(token = %row.token(), "materialized member reference");
        Ok(id)
    }

    /// Materialize the generic method instantiation `rid`
    pub(crate) fn method_spec(&mut self, rid: u32) -> Result<MethodSpecId> {
        if let Some(id) = memo(&self.cache.method_specs, rid) {
            return Ok(id);
        }

        let row = self.row::<MethodSpecRaw>(rid)?;
        let (method, instantiation) = self.with_frames(Vec::new(), |ctx| {
            Ok((ctx.method_handle(row.method)?, ctx.parse_method_spec(row.instantiation)?))
        })?;

        let id = self.graph.push_method_spec(MethodSpecification {
            token: row.token(),
            method,
            instantiation,
        });
        remember(&mut self.cache.method_specs, rid, id);
        Ok(id)
    }

    /// A `MethodDefOrRef` or `CustomAttributeType` column as handle
    pub(crate) fn method_handle(&mut self, token: Token) -> Result<MethodHandle> {
        match token.table_id() {
            _ if token.is_null() => Err(malformed_error!("Null method token")),
            Some(TableId::MethodDef) => Ok(MethodHandle::Definition(self.method(token.row())?)),
            Some(TableId::MemberRef) => Ok(MethodHandle::Reference(self.member_ref(token.row())?)),
            Some(TableId::MethodSpec) => {
                Ok(MethodHandle::Specification(self.method_spec(token.row())?))
            }
            _ => Err(malformed_error!("Invalid method token - {}", token)),
        }
    }

    /// Decode the stand-alone signature `rid`
    pub(crate) fn standalone_signature(&mut self, rid: u32) -> Result<StandAloneSignature> {
        let row = self.row::<StandAloneSigRaw>(rid)?;
        let data = self.blob(row.signature)?;
        let signature = self.with_frames(Vec::new(), |ctx| {
            if data.first() == Some(&CALLING_CONVENTION::LOCAL_SIG) {
                Ok(StandAloneSig::Locals(ctx.parse_local_var_signature(row.signature)?))
            } else {
                Ok(StandAloneSig::Method(ctx.parse_method_signature(row.signature)?))
            }
        })?;

        Ok(StandAloneSignature {
            token: row.token(),
            signature,
        })
    }

    fn constant(&mut self, owner: Token) -> Result<Option<Constant>> {
        let Some(rid) = self.take_escrow(EscrowKind::Constant, owner)?.first().copied() else {
            return Ok(None);
        };

        let row = self.row::<ConstantRaw>(rid)?;
        Ok(Some(Constant {
            element_type: (row.kind & 0xFF) as u8,
            value: self.blob(row.value)?.to_vec(),
        }))
    }

    fn marshal(&mut self, owner: Token) -> Result<Option<Vec<u8>>> {
        let Some(rid) = self.take_escrow(EscrowKind::FieldMarshal, owner)?.first().copied() else {
            return Ok(None);
        };

        let row = self.row::<FieldMarshalRaw>(rid)?;
        Ok(Some(self.blob(row.native_type)?.to_vec()))
    }

    fn semantics(
        &mut self,
        association: Token,
    ) -> Result<Vec<(MethodSemanticsAttributes, MethodId)>> {
        let mut semantics = Vec::new();
        for rid in self.take_escrow(EscrowKind::MethodSemantics, association)? {
            let row = self.row::<MethodSemanticsRaw>(rid)?;
            let flags = MethodSemanticsAttributes::from_bits_retain(row.semantics);
            semantics.push((flags, self.method(row.method)?));
        }
        Ok(semantics)
    }
}
