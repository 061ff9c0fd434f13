//! Serialization of a [`ModuleDefinition`] into a metadata root.
//!
//! The builder walks the object graph once and emits rows table by table. It works in three
//! stages:
//!
//! 1. **Numbering**: every definition gets its row id up front. Types are ordered `<Module>`
//!    first, then depth first with nested types right after their declaring type. Fields,
//!    methods, parameters, properties and events are numbered by running counters in the same
//!    walk, so each owner's children form the contiguous range the reader reconstructs from
//!    the `*_list` columns.
//! 2. **Emission**: definition rows are pushed in that order. References are allocated on
//!    first use while signatures and coded columns are encoded; structurally equal references
//!    collapse into one row unless [`WriterOptions::deduplicate_references`] is off.
//!    `GenericParam` rows are buffered and sorted by `(owner, number)` before their ids are
//!    handed out, then constraints and attributes pointing at them are emitted.
//! 3. **Layout**: keyed tables are sorted, the heap and table sizes fix the column widths
//!    and the `#~`, `#Strings`, `#GUID` and `#Blob` streams are written into a metadata root.
//!
//! Entities that are not part of the module being written, such as a type definition of
//! another module or an id beyond its arena, are reported as
//! [`crate::Error::InvalidOperation`] rather than silently dropped.

mod tables;

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

use crate::{
    metadata::{
        customattributes::CustomAttribute,
        model::{
            AssemblyRefId, AttributeOwner, Constant, EventId, FieldId, GenericParamId,
            Implementation, MemberRefId, MemberRefParent, MetadataGraph, MethodHandle, MethodId,
            MethodSemanticsAttributes, MethodSpecId, ModuleRefId, ParamId, PropertyId,
            ResolutionScope, SecurityOwner, StandAloneSig, TypeDefId, TypeHandle, TypeRefId,
        },
        module::ModuleDefinition,
        options::WriterOptions,
        root::Root,
        security::SecurityDeclaration,
        signatures::{
            encode_field_signature, encode_local_var_signature, encode_method_signature,
            encode_method_spec_signature, encode_property_signature, encode_type_signature,
            MemberSig, TokenEncoder, TypeSig,
        },
        streams::{BlobHeapBuilder, GuidHeapBuilder, StringHeapBuilder},
        tables::{
            AssemblyRaw, AssemblyRefRaw, ClassLayoutRaw, CodedIndexType, ConstantRaw,
            CustomAttributeRaw, DeclSecurityRaw, EventMapRaw, EventRaw, ExportedTypeRaw,
            FieldLayoutRaw, FieldMarshalRaw, FieldRaw, FieldRvaRaw, FileRaw,
            GenericParamConstraintRaw, GenericParamRaw, ImplMapRaw, InterfaceImplRaw,
            ManifestResourceRaw, MemberRefRaw, MethodDefRaw, MethodImplRaw, MethodSemanticsRaw,
            MethodSpecRaw, ModuleRaw, ModuleRefRaw, NestedClassRaw, ParamRaw, PropertyMapRaw,
            PropertyRaw, StandAloneSigRaw, TableId, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
            HEAP_LARGE_BLOB, HEAP_LARGE_GUID, HEAP_LARGE_STRINGS,
        },
        token::Token,
    },
    Result,
};

pub(crate) use tables::TableRows;

/// Fails unless `index` addresses an entity of an arena holding `count` entities
fn in_graph(index: usize, count: usize, kind: &str) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(invalid_operation!("{} {} does not belong to this module", kind, index))
    }
}

/// Build-time token of a numbered definition
fn defined<K: Hash + Eq + Debug>(rids: &HashMap<K, u32>, key: K, table: TableId) -> Result<Token> {
    match rids.get(&key) {
        Some(rid) => Ok(Token::from_parts(table, *rid)),
        None => Err(invalid_operation!(
            "{:?} is not part of the module being written",
            key
        )),
    }
}

/// Next row id of a table that already holds `len` rows
fn next_rid(len: usize) -> Result<u32> {
    u32::try_from(len + 1).map_err(|_| invalid_operation!("row id space exhausted"))
}

/// Writes one module into a metadata root
pub struct MetadataBuilder<'m> {
    module: &'m ModuleDefinition,
    graph: &'m MetadataGraph,
    options: &'m WriterOptions,
    strings: StringHeapBuilder,
    blobs: BlobHeapBuilder,
    guids: GuidHeapBuilder,
    rows: TableRows,

    type_defs: HashMap<TypeDefId, u32>,
    fields: HashMap<FieldId, u32>,
    methods: HashMap<MethodId, u32>,
    params: HashMap<ParamId, u32>,
    properties: HashMap<PropertyId, u32>,
    events: HashMap<EventId, u32>,
    generic_params: HashMap<GenericParamId, u32>,
    interface_impls: HashMap<(TypeDefId, usize), u32>,
    constraints: HashMap<(GenericParamId, usize), u32>,
    security_rows: HashMap<(SecurityOwner, usize), u32>,
    standalone_sigs: Vec<u32>,

    type_refs: HashMap<TypeRefId, u32>,
    member_refs: HashMap<MemberRefId, u32>,
    method_specs: HashMap<MethodSpecId, u32>,
    assembly_refs: HashMap<AssemblyRefId, u32>,
    module_refs: HashMap<ModuleRefId, u32>,

    // Structural keys, heap offsets stand in for content since the heaps are deduplicated
    type_ref_keys: HashMap<(Token, u32, u32), u32>,
    member_ref_keys: HashMap<(Token, u32, u32), u32>,
    type_spec_keys: HashMap<u32, u32>,
    method_spec_keys: HashMap<(Token, u32), u32>,
    module_ref_keys: HashMap<u32, u32>,
    standalone_sig_keys: HashMap<u32, u32>,
    emitted_assembly_refs: Vec<AssemblyRefId>,
}

impl<'m> MetadataBuilder<'m> {
    /// Prepare a builder for `module`
    ///
    /// Lists that were never materialized are treated as empty;
    /// [`ModuleDefinition::write_with`] loads everything before building.
    #[must_use]
    pub fn new(module: &'m ModuleDefinition, options: &'m WriterOptions) -> Self {
        MetadataBuilder {
            module,
            graph: module.graph(),
            options,
            strings: StringHeapBuilder::new(),
            blobs: BlobHeapBuilder::new(),
            guids: GuidHeapBuilder::new(),
            rows: TableRows::default(),
            type_defs: HashMap::new(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            params: HashMap::new(),
            properties: HashMap::new(),
            events: HashMap::new(),
            generic_params: HashMap::new(),
            interface_impls: HashMap::new(),
            constraints: HashMap::new(),
            security_rows: HashMap::new(),
            standalone_sigs: Vec::new(),
            type_refs: HashMap::new(),
            member_refs: HashMap::new(),
            method_specs: HashMap::new(),
            assembly_refs: HashMap::new(),
            module_refs: HashMap::new(),
            type_ref_keys: HashMap::new(),
            member_ref_keys: HashMap::new(),
            type_spec_keys: HashMap::new(),
            method_spec_keys: HashMap::new(),
            module_ref_keys: HashMap::new(),
            standalone_sig_keys: HashMap::new(),
            emitted_assembly_refs: Vec::new(),
        }
    }

    /// Emit every row and serialize the metadata root
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the graph references an entity that is
    /// not part of the module, if sibling generic parameters share a position or if a value
    /// does not fit its column
    #[tracing::instrument(level = "debug", skip_all, fields(module = %self.module.name))]
    pub fn build(mut self) -> Result<Vec<u8>> {
        self.emit_rows()?;
        self.serialize()
    }

    /// Fill and sort every row buffer
    fn emit_rows(&mut self) -> Result<()> {
        let order = self.type_order()?;
        self.number_definitions(&order)?;

        self.emit_module()?;
        for id in &order {
            self.emit_type(*id)?;
        }
        self.emit_generic_parameters(&order)?;
        self.emit_security_declarations()?;
        self.emit_manifest()?;
        self.emit_standalone_signatures()?;
        self.emit_custom_attributes()?;
        self.emit_unused_references()?;

        self.rows.sort()
    }

    /// Lay out the row buffers and heaps as a metadata root
    fn serialize(self) -> Result<Vec<u8>> {
        let mut heap_sizes = 0;
        if self.strings.is_large() {
            heap_sizes |= HEAP_LARGE_STRINGS;
        }
        if self.guids.is_large() {
            heap_sizes |= HEAP_LARGE_GUID;
        }
        if self.blobs.is_large() {
            heap_sizes |= HEAP_LARGE_BLOB;
        }

        let info = self.rows.table_info(heap_sizes)?;
        let tables = self.rows.write(&info, self.options.table_version)?;

        tracing::debug!(
            types = self.rows.type_def.len(),
            type_refs = self.rows.type_ref.len(),
            member_refs = self.rows.member_ref.len(),
            type_specs = self.rows.type_spec.len(),
            "built metadata tables"
        );

        let version = self
            .options
            .runtime_version
            .as_deref()
            .unwrap_or(&self.module.runtime_version);
        let strings = self.strings.into_bytes();
        let guids = self.guids.into_bytes();
        let blobs = self.blobs.into_bytes();

        Root::write(
            version,
            &[
                ("#~", tables.as_slice()),
                ("#Strings", strings.as_slice()),
                ("#GUID", guids.as_slice()),
                ("#Blob", blobs.as_slice()),
            ],
        )
    }

    /// `<Module>` first, then every type depth first with nested types after their parent
    fn type_order(&self) -> Result<Vec<TypeDefId>> {
        let graph = self.graph;
        let mut roots: Vec<TypeDefId> = self.module.types.as_deref().unwrap_or_default().to_vec();
        for id in &roots {
            in_graph(id.index(), graph.type_def_count(), "type")?;
        }
        roots.sort_by_key(|id| !graph.type_def(*id).is_module_type());

        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<TypeDefId> = roots.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(invalid_operation!("type {:?} is listed twice", id));
            }
            order.push(id);

            let nested = graph.type_def(id).nested_types.as_deref().unwrap_or_default();
            for child in nested.iter().rev() {
                in_graph(child.index(), graph.type_def_count(), "type")?;
                stack.push(*child);
            }
        }
        Ok(order)
    }

    /// Parameters of `method` in sequence order
    fn sorted_parameters(&self, method: MethodId) -> Result<Vec<ParamId>> {
        let graph = self.graph;
        let mut params = graph.method(method).parameters.as_deref().unwrap_or_default().to_vec();
        for param in &params {
            in_graph(param.index(), graph.parameter_count(), "parameter")?;
        }
        params.sort_by_key(|param| graph.parameter(*param).sequence);
        Ok(params)
    }

    fn number_definitions(&mut self, order: &[TypeDefId]) -> Result<()> {
        let graph = self.graph;

        for (index, id) in order.iter().enumerate() {
            self.type_defs.insert(*id, next_rid(index)?);
        }

        for id in order {
            let definition = graph.type_def(*id);

            for field in definition.fields.as_deref().unwrap_or_default() {
                in_graph(field.index(), graph.field_count(), "field")?;
                let rid = next_rid(self.fields.len())?;
                if self.fields.insert(*field, rid).is_some() {
                    return Err(invalid_operation!("field {:?} has two owners", field));
                }
            }

            for method in definition.methods.as_deref().unwrap_or_default() {
                in_graph(method.index(), graph.method_count(), "method")?;
                let rid = next_rid(self.methods.len())?;
                if self.methods.insert(*method, rid).is_some() {
                    return Err(invalid_operation!("method {:?} has two owners", method));
                }

                for param in self.sorted_parameters(*method)? {
                    let rid = next_rid(self.params.len())?;
                    if self.params.insert(param, rid).is_some() {
                        return Err(invalid_operation!("parameter {:?} has two owners", param));
                    }
                }
            }

            for property in definition.properties.as_deref().unwrap_or_default() {
                in_graph(property.index(), graph.property_count(), "property")?;
                let rid = next_rid(self.properties.len())?;
                if self.properties.insert(*property, rid).is_some() {
                    return Err(invalid_operation!("property {:?} has two owners", property));
                }
            }

            for event in definition.events.as_deref().unwrap_or_default() {
                in_graph(event.index(), graph.event_count(), "event")?;
                let rid = next_rid(self.events.len())?;
                if self.events.insert(*event, rid).is_some() {
                    return Err(invalid_operation!("event {:?} has two owners", event));
                }
            }
        }
        Ok(())
    }

    fn emit_module(&mut self) -> Result<()> {
        let row = ModuleRaw {
            generation: 0,
            name: self.strings.intern(&self.module.name)?,
            mvid: self.guids.intern(self.module.mvid),
            ..Default::default()
        };
        self.rows.module.push(row);
        Ok(())
    }

    fn emit_constant(&mut self, parent: Token, constant: Option<&Constant>) -> Result<()> {
        if let Some(constant) = constant {
            let row = ConstantRaw {
                kind: u16::from(constant.element_type),
                parent,
                value: self.blobs.intern(&constant.value)?,
                ..Default::default()
            };
            self.rows.constant.push(row);
        }
        Ok(())
    }

    fn emit_marshal(&mut self, parent: Token, marshal: Option<&Vec<u8>>) -> Result<()> {
        if let Some(native_type) = marshal {
            let row = FieldMarshalRaw {
                parent,
                native_type: self.blobs.intern(native_type)?,
                ..Default::default()
            };
            self.rows.field_marshal.push(row);
        }
        Ok(())
    }

    fn emit_type(&mut self, id: TypeDefId) -> Result<()> {
        let graph = self.graph;
        let definition = graph.type_def(id);
        let token = defined(&self.type_defs, id, TableId::TypeDef)?;

        let extends = match &definition.base_type {
            Some(base) => self.type_def_or_ref(base)?,
            None => Token::default(),
        };
        let row = TypeDefRaw {
            flags: definition.flags.bits(),
            type_name: self.strings.intern(&definition.name)?,
            type_namespace: self.strings.intern(&definition.namespace)?,
            extends,
            field_list: next_rid(self.rows.field.len())?,
            method_list: next_rid(self.rows.method_def.len())?,
            ..Default::default()
        };
        self.rows.type_def.push(row);

        if let Some(declaring) = definition.declaring_type {
            let enclosing = defined(&self.type_defs, declaring, TableId::TypeDef)?;
            self.rows.nested_class.push(NestedClassRaw {
                nested_class: token.row(),
                enclosing_class: enclosing.row(),
                ..Default::default()
            });
        }

        if let Some(layout) = definition.layout {
            self.rows.class_layout.push(ClassLayoutRaw {
                packing_size: layout.packing_size,
                class_size: layout.class_size,
                parent: token.row(),
                ..Default::default()
            });
        }

        for field in definition.fields.as_deref().unwrap_or_default() {
            self.emit_field(*field)?;
        }
        for method in definition.methods.as_deref().unwrap_or_default() {
            self.emit_method(*method)?;
        }

        // Pushed in table order so the row ids handed out survive the final sort
        let mut interfaces = Vec::new();
        let implementations = definition.interfaces.as_deref().unwrap_or_default();
        for (position, implementation) in implementations.iter().enumerate() {
            let interface = self.type_def_or_ref(&implementation.interface)?;
            let key = CodedIndexType::TypeDefOrRef.compress(interface)?;
            interfaces.push((key, position, interface));
        }
        interfaces.sort_by_key(|(key, ..)| *key);
        for (_, position, interface) in interfaces {
            self.interface_impls.insert((id, position), next_rid(self.rows.interface_impl.len())?);
            self.rows.interface_impl.push(InterfaceImplRaw {
                class: token.row(),
                interface,
                ..Default::default()
            });
        }

        for method_override in definition.overrides.as_deref().unwrap_or_default() {
            let method_body = self.method_def_or_ref(method_override.body)?;
            let method_declaration = self.method_def_or_ref(method_override.declaration)?;
            self.rows.method_impl.push(MethodImplRaw {
                class: token.row(),
                method_body,
                method_declaration,
                ..Default::default()
            });
        }

        let properties = definition.properties.as_deref().unwrap_or_default();
        if !properties.is_empty() {
            self.rows.property_map.push(PropertyMapRaw {
                parent: token.row(),
                property_list: next_rid(self.rows.property.len())?,
                ..Default::default()
            });
            for property in properties {
                self.emit_property(*property)?;
            }
        }

        let events = definition.events.as_deref().unwrap_or_default();
        if !events.is_empty() {
            self.rows.event_map.push(EventMapRaw {
                parent: token.row(),
                event_list: next_rid(self.rows.event.len())?,
                ..Default::default()
            });
            for event in events {
                self.emit_event(*event)?;
            }
        }
        Ok(())
    }

    fn emit_field(&mut self, id: FieldId) -> Result<()> {
        let graph = self.graph;
        let field = graph.field(id);
        let token = defined(&self.fields, id, TableId::Field)?;

        let signature = encode_field_signature(&field.signature, self)?;
        let row = FieldRaw {
            flags: field.flags.bits(),
            name: self.strings.intern(&field.name)?,
            signature: self.blobs.intern(&signature)?,
            ..Default::default()
        };
        self.rows.field.push(row);

        self.emit_constant(token, field.constant.as_ref())?;
        self.emit_marshal(token, field.marshal.as_ref())?;
        if let Some(rva) = field.rva {
            self.rows.field_rva.push(FieldRvaRaw {
                rva,
                field: token.row(),
                ..Default::default()
            });
        }
        if let Some(offset) = field.offset {
            self.rows.field_layout.push(FieldLayoutRaw {
                field_offset: offset,
                field: token.row(),
                ..Default::default()
            });
        }
        Ok(())
    }

    fn emit_method(&mut self, id: MethodId) -> Result<()> {
        let graph = self.graph;
        let method = graph.method(id);
        let token = defined(&self.methods, id, TableId::MethodDef)?;

        let signature = encode_method_signature(&method.signature, self)?;
        let row = MethodDefRaw {
            rva: method.rva,
            impl_flags: method.impl_flags.bits(),
            flags: method.flags.bits(),
            name: self.strings.intern(&method.name)?,
            signature: self.blobs.intern(&signature)?,
            param_list: next_rid(self.rows.param.len())?,
            ..Default::default()
        };
        self.rows.method_def.push(row);

        for param in self.sorted_parameters(id)? {
            let parameter = graph.parameter(param);
            let param_token = defined(&self.params, param, TableId::Param)?;
            let row = ParamRaw {
                flags: parameter.flags.bits(),
                sequence: parameter.sequence,
                name: self.strings.intern(&parameter.name)?,
                ..Default::default()
            };
            self.rows.param.push(row);
            self.emit_constant(param_token, parameter.constant.as_ref())?;
            self.emit_marshal(param_token, parameter.marshal.as_ref())?;
        }

        if let Some(pinvoke) = &method.pinvoke {
            let scope = self.module_ref_token(pinvoke.module)?;
            let row = ImplMapRaw {
                mapping_flags: pinvoke.flags.bits(),
                member_forwarded: token,
                import_name: self.strings.intern(&pinvoke.entry_point)?,
                import_scope: scope.row(),
                ..Default::default()
            };
            self.rows.impl_map.push(row);
        }
        Ok(())
    }

    fn emit_semantics(
        &mut self,
        association: Token,
        semantics: MethodSemanticsAttributes,
        method: MethodId,
    ) -> Result<()> {
        let method = defined(&self.methods, method, TableId::MethodDef)?;
        self.rows.method_semantics.push(MethodSemanticsRaw {
            semantics: semantics.bits(),
            method: method.row(),
            association,
            ..Default::default()
        });
        Ok(())
    }

    fn emit_property(&mut self, id: PropertyId) -> Result<()> {
        let graph = self.graph;
        let property = graph.property(id);
        let token = defined(&self.properties, id, TableId::Property)?;

        let signature = encode_property_signature(&property.signature, self)?;
        let row = PropertyRaw {
            flags: property.flags.bits(),
            name: self.strings.intern(&property.name)?,
            signature: self.blobs.intern(&signature)?,
            ..Default::default()
        };
        self.rows.property.push(row);
        self.emit_constant(token, property.constant.as_ref())?;

        if let Some(setter) = property.setter {
            self.emit_semantics(token, MethodSemanticsAttributes::SETTER, setter)?;
        }
        if let Some(getter) = property.getter {
            self.emit_semantics(token, MethodSemanticsAttributes::GETTER, getter)?;
        }
        for other in &property.other_methods {
            self.emit_semantics(token, MethodSemanticsAttributes::OTHER, *other)?;
        }
        Ok(())
    }

    fn emit_event(&mut self, id: EventId) -> Result<()> {
        let graph = self.graph;
        let event = graph.event(id);
        let token = defined(&self.events, id, TableId::Event)?;

        let event_type = self.type_def_or_ref(&event.event_type)?;
        let row = EventRaw {
            flags: event.flags.bits(),
            name: self.strings.intern(&event.name)?,
            event_type,
            ..Default::default()
        };
        self.rows.event.push(row);

        if let Some(add) = event.add_method {
            self.emit_semantics(token, MethodSemanticsAttributes::ADD_ON, add)?;
        }
        if let Some(remove) = event.remove_method {
            self.emit_semantics(token, MethodSemanticsAttributes::REMOVE_ON, remove)?;
        }
        if let Some(invoke) = event.invoke_method {
            self.emit_semantics(token, MethodSemanticsAttributes::FIRE, invoke)?;
        }
        for other in &event.other_methods {
            self.emit_semantics(token, MethodSemanticsAttributes::OTHER, *other)?;
        }
        Ok(())
    }

    /// Buffer the generic parameters of all definitions, sort them and hand out their ids
    fn emit_generic_parameters(&mut self, order: &[TypeDefId]) -> Result<()> {
        let graph = self.graph;

        let mut owners: Vec<(Token, &'m [GenericParamId])> = Vec::new();
        for id in order {
            let definition = graph.type_def(*id);
            owners.push((
                defined(&self.type_defs, *id, TableId::TypeDef)?,
                definition.generic_parameters.as_deref().unwrap_or_default(),
            ));
            for method in definition.methods.as_deref().unwrap_or_default() {
                owners.push((
                    defined(&self.methods, *method, TableId::MethodDef)?,
                    graph.method(*method).generic_parameters.as_deref().unwrap_or_default(),
                ));
            }
        }

        let mut pending = Vec::new();
        for (owner, parameters) in owners {
            let coded = CodedIndexType::TypeOrMethodDef.compress(owner)?;
            let mut positions = HashSet::new();
            for parameter in parameters {
                in_graph(parameter.index(), graph.generic_parameter_count(), "generic parameter")?;
                let number = graph.generic_parameter(*parameter).number;
                if !positions.insert(number) {
                    return Err(invalid_operation!(
                        "generic parameter position {} is used twice by {}",
                        number,
                        owner
                    ));
                }
                pending.push(((coded, number), owner, *parameter));
            }
        }
        pending.sort_by_key(|(key, ..)| *key);

        for (_, owner, id) in &pending {
            let rid = next_rid(self.rows.generic_param.len())?;
            if self.generic_params.insert(*id, rid).is_some() {
                return Err(invalid_operation!("generic parameter {:?} has two owners", id));
            }

            let parameter = graph.generic_parameter(*id);
            let row = GenericParamRaw {
                number: parameter.number,
                flags: parameter.flags.bits(),
                owner: *owner,
                name: self.strings.intern(&parameter.name)?,
                ..Default::default()
            };
            self.rows.generic_param.push(row);
        }

        for (_, _, id) in &pending {
            let owner = self.generic_params.get(id).copied().unwrap_or_default();
            let constraints = graph.generic_parameter(*id).constraints.as_deref();
            for (position, constraint) in constraints.unwrap_or_default().iter().enumerate() {
                let constraint = self.type_def_or_ref(&constraint.constraint_type)?;
                let rid = next_rid(self.rows.generic_param_constraint.len())?;
                self.constraints.insert((*id, position), rid);
                self.rows.generic_param_constraint.push(GenericParamConstraintRaw {
                    owner,
                    constraint,
                    ..Default::default()
                });
            }
        }
        Ok(())
    }

    fn attribute_owner_token(&mut self, owner: AttributeOwner) -> Result<Token> {
        let module = self.module;
        match owner {
            AttributeOwner::Module => Ok(Token::from_parts(TableId::Module, 1)),
            AttributeOwner::Assembly => self.assembly_token(),
            AttributeOwner::Type(id) => defined(&self.type_defs, id, TableId::TypeDef),
            AttributeOwner::Field(id) => defined(&self.fields, id, TableId::Field),
            AttributeOwner::Method(id) => defined(&self.methods, id, TableId::MethodDef),
            AttributeOwner::Parameter(id) => defined(&self.params, id, TableId::Param),
            AttributeOwner::Property(id) => defined(&self.properties, id, TableId::Property),
            AttributeOwner::Event(id) => defined(&self.events, id, TableId::Event),
            AttributeOwner::GenericParameter(id) => {
                defined(&self.generic_params, id, TableId::GenericParam)
            }
            AttributeOwner::InterfaceImplementation(id, position) => {
                defined(&self.interface_impls, (id, position), TableId::InterfaceImpl)
            }
            AttributeOwner::GenericParameterConstraint(id, position) => {
                defined(&self.constraints, (id, position), TableId::GenericParamConstraint)
            }
            AttributeOwner::SecurityDeclaration(owner, position) => {
                defined(&self.security_rows, (owner, position), TableId::DeclSecurity)
            }
            AttributeOwner::TypeReference(id) => self.type_ref_token(id),
            AttributeOwner::MemberReference(id) => self.member_ref_token(id),
            AttributeOwner::MethodSpecification(id) => self.method_spec_token(id),
            AttributeOwner::AssemblyReference(id) => self.assembly_ref_token(id),
            AttributeOwner::ModuleReference(id) => self.module_ref_token(id),
            AttributeOwner::TypeSpecification(index) => {
                let specifications = module.type_specifications.as_deref().unwrap_or_default();
                in_graph(index, specifications.len(), "type specification")?;
                self.type_spec_token(&specifications[index].signature)
            }
            AttributeOwner::StandAloneSignature(index) => match self.standalone_sigs.get(index) {
                Some(rid) => Ok(Token::from_parts(TableId::StandAloneSig, *rid)),
                None => Err(invalid_operation!(
                    "standalone signature {} does not belong to this module",
                    index
                )),
            },
            AttributeOwner::File(index) => {
                in_graph(index, module.files.as_deref().unwrap_or_default().len(), "file")?;
                Ok(Token::from_parts(TableId::File, next_rid(index)?))
            }
            AttributeOwner::ExportedType(index) => {
                let count = module.exported_types.as_deref().unwrap_or_default().len();
                in_graph(index, count, "exported type")?;
                Ok(Token::from_parts(TableId::ExportedType, next_rid(index)?))
            }
            AttributeOwner::ManifestResource(index) => {
                in_graph(index, module.resources.as_deref().unwrap_or_default().len(), "resource")?;
                Ok(Token::from_parts(TableId::ManifestResource, next_rid(index)?))
            }
        }
    }

    fn assembly_token(&self) -> Result<Token> {
        if self.module.assembly.is_none() {
            return Err(invalid_operation!("module {} has no assembly manifest", self.module.name));
        }
        Ok(Token::from_parts(TableId::Assembly, 1))
    }

    fn emit_custom_attributes(&mut self) -> Result<()> {
        let graph = self.graph;

        let mut owners: Vec<(Token, &'m [CustomAttribute])> = Vec::new();
        for (owner, attributes) in &graph.custom_attributes {
            if !attributes.is_empty() {
                owners.push((self.attribute_owner_token(*owner)?, attributes.as_slice()));
            }
        }
        owners.sort_by_key(|(parent, _)| *parent);

        for (parent, attributes) in owners {
            for attribute in attributes {
                let constructor = match attribute.constructor {
                    MethodHandle::Specification(_) => {
                        return Err(invalid_operation!(
                            "custom attribute on {} uses a generic method instance as constructor",
                            parent
                        ))
                    }
                    handle => self.method_token(handle)?,
                };
                let row = CustomAttributeRaw {
                    parent,
                    constructor,
                    value: self.blobs.intern(&attribute.blob)?,
                    ..Default::default()
                };
                self.rows.custom_attribute.push(row);
            }
        }
        Ok(())
    }

    fn emit_security_declarations(&mut self) -> Result<()> {
        let graph = self.graph;

        let mut owners: Vec<(Token, SecurityOwner, &'m [SecurityDeclaration])> = Vec::new();
        for (owner, declarations) in &graph.security_declarations {
            if declarations.is_empty() {
                continue;
            }
            let parent = match owner {
                SecurityOwner::Assembly => self.assembly_token()?,
                SecurityOwner::Type(id) => defined(&self.type_defs, *id, TableId::TypeDef)?,
                SecurityOwner::Method(id) => defined(&self.methods, *id, TableId::MethodDef)?,
            };
            owners.push((parent, *owner, declarations.as_slice()));
        }
        owners.sort_by_key(|(parent, ..)| *parent);

        for (parent, owner, declarations) in owners {
            for (position, declaration) in declarations.iter().enumerate() {
                let rid = next_rid(self.rows.decl_security.len())?;
                self.security_rows.insert((owner, position), rid);
                let row = DeclSecurityRaw {
                    action: u16::from(declaration.action),
                    parent,
                    permission_set: self.blobs.intern(&declaration.permission_set)?,
                    ..Default::default()
                };
                self.rows.decl_security.push(row);
            }
        }
        Ok(())
    }

    fn implementation_token(&mut self, implementation: Implementation) -> Result<Token> {
        let module = self.module;
        match implementation {
            Implementation::File(index) => {
                in_graph(index, module.files.as_deref().unwrap_or_default().len(), "file")?;
                Ok(Token::from_parts(TableId::File, next_rid(index)?))
            }
            Implementation::ExportedType(index) => {
                let count = module.exported_types.as_deref().unwrap_or_default().len();
                in_graph(index, count, "exported type")?;
                Ok(Token::from_parts(TableId::ExportedType, next_rid(index)?))
            }
            Implementation::AssemblyRef(id) => self.assembly_ref_token(id),
        }
    }

    fn emit_manifest(&mut self) -> Result<()> {
        let module = self.module;

        if let Some(assembly) = &module.assembly {
            let row = AssemblyRaw {
                hash_alg_id: assembly.hash_algorithm,
                major_version: assembly.version.major,
                minor_version: assembly.version.minor,
                build_number: assembly.version.build,
                revision_number: assembly.version.revision,
                flags: assembly.flags.bits(),
                public_key: self.blobs.intern(&assembly.public_key)?,
                name: self.strings.intern(&assembly.name)?,
                culture: self.strings.intern(&assembly.culture)?,
                ..Default::default()
            };
            self.rows.assembly.push(row);
        }

        for file in module.files.as_deref().unwrap_or_default() {
            let row = FileRaw {
                flags: file.flags.bits(),
                name: self.strings.intern(&file.name)?,
                hash_value: self.blobs.intern(&file.hash_value)?,
                ..Default::default()
            };
            self.rows.file.push(row);
        }

        for exported in module.exported_types.as_deref().unwrap_or_default() {
            let implementation = self.implementation_token(exported.implementation)?;
            let row = ExportedTypeRaw {
                flags: exported.flags.bits(),
                type_def_id: exported.type_def_id,
                type_name: self.strings.intern(&exported.name)?,
                type_namespace: self.strings.intern(&exported.namespace)?,
                implementation,
                ..Default::default()
            };
            self.rows.exported_type.push(row);
        }

        for resource in module.resources.as_deref().unwrap_or_default() {
            let implementation = match resource.implementation {
                Some(implementation) => self.implementation_token(implementation)?,
                None => Token::default(),
            };
            let row = ManifestResourceRaw {
                offset: resource.offset,
                flags: resource.flags.bits(),
                name: self.strings.intern(&resource.name)?,
                implementation,
                ..Default::default()
            };
            self.rows.manifest_resource.push(row);
        }
        Ok(())
    }

    fn emit_standalone_signatures(&mut self) -> Result<()> {
        let module = self.module;
        for standalone in module.standalone_signatures.as_deref().unwrap_or_default() {
            let blob = match &standalone.signature {
                StandAloneSig::Locals(sig) => encode_local_var_signature(sig, self)?,
                StandAloneSig::Method(sig) => encode_method_signature(sig, self)?,
            };
            let signature = self.blobs.intern(&blob)?;
            if self.options.deduplicate_references {
                if let Some(rid) = self.standalone_sig_keys.get(&signature) {
                    self.standalone_sigs.push(*rid);
                    continue;
                }
            }

            let rid = next_rid(self.rows.standalone_sig.len())?;
            self.standalone_sig_keys.insert(signature, rid);
            self.standalone_sigs.push(rid);
            self.rows.standalone_sig.push(StandAloneSigRaw {
                signature,
                ..Default::default()
            });
        }
        Ok(())
    }

    /// References nothing in the graph pointed at still belong to the module
    fn emit_unused_references(&mut self) -> Result<()> {
        let graph = self.graph;
        for index in 0..graph.assembly_ref_count() {
            self.assembly_ref_token(AssemblyRefId::from_index(index))?;
        }
        for index in 0..graph.module_ref_count() {
            self.module_ref_token(ModuleRefId::from_index(index))?;
        }
        for index in 0..graph.type_ref_count() {
            self.type_ref_token(TypeRefId::from_index(index))?;
        }
        for index in 0..graph.member_ref_count() {
            self.member_ref_token(MemberRefId::from_index(index))?;
        }
        for index in 0..graph.method_spec_count() {
            self.method_spec_token(MethodSpecId::from_index(index))?;
        }
        for specification in self.module.type_specifications.as_deref().unwrap_or_default() {
            self.type_spec_token(&specification.signature)?;
        }
        Ok(())
    }

    /// Token of a `TypeDefOrRef` column: the handle itself, or a `TypeSpec` for
    /// constructed types
    fn type_def_or_ref(&mut self, sig: &TypeSig) -> Result<Token> {
        match sig {
            TypeSig::Class(handle) | TypeSig::ValueType(handle) => self.encode_type(*handle),
            other => self.type_spec_token(other),
        }
    }

    fn type_spec_token(&mut self, sig: &TypeSig) -> Result<Token> {
        let blob = encode_type_signature(sig, self)?;
        let signature = self.blobs.intern(&blob)?;
        if let Some(rid) = self.type_spec_keys.get(&signature) {
            return Ok(Token::from_parts(TableId::TypeSpec, *rid));
        }

        let rid = next_rid(self.rows.type_spec.len())?;
        self.type_spec_keys.insert(signature, rid);
        self.rows.type_spec.push(TypeSpecRaw {
            signature,
            ..Default::default()
        });
        Ok(Token::from_parts(TableId::TypeSpec, rid))
    }

    fn type_ref_token(&mut self, id: TypeRefId) -> Result<Token> {
        if let Some(rid) = self.type_refs.get(&id) {
            return Ok(Token::from_parts(TableId::TypeRef, *rid));
        }

        let graph = self.graph;
        in_graph(id.index(), graph.type_ref_count(), "type reference")?;
        let reference = graph.type_ref(id);
        // A cyclic scope chain is malformed
        graph.type_ref_chain(id)?;

        let scope = match reference.scope {
            ResolutionScope::Module => Token::from_parts(TableId::Module, 1),
            ResolutionScope::ModuleRef(module) => self.module_ref_token(module)?,
            ResolutionScope::AssemblyRef(assembly) => self.assembly_ref_token(assembly)?,
            ResolutionScope::TypeRef(declaring) => self.type_ref_token(declaring)?,
            ResolutionScope::None => Token::default(),
        };
        let key = (
            scope,
            self.strings.intern(&reference.name)?,
            self.strings.intern(&reference.namespace)?,
        );

        let rid = match self.type_ref_keys.get(&key) {
            Some(rid) if self.options.deduplicate_references => *rid,
            _ => {
                let rid = next_rid(self.rows.type_ref.len())?;
                self.rows.type_ref.push(TypeRefRaw {
                    resolution_scope: key.0,
                    type_name: key.1,
                    type_namespace: key.2,
                    ..Default::default()
                });
                self.type_ref_keys.entry(key).or_insert(rid);
                rid
            }
        };
        self.type_refs.insert(id, rid);
        Ok(Token::from_parts(TableId::TypeRef, rid))
    }

    fn assembly_ref_token(&mut self, id: AssemblyRefId) -> Result<Token> {
        if let Some(rid) = self.assembly_refs.get(&id) {
            return Ok(Token::from_parts(TableId::AssemblyRef, *rid));
        }

        let graph = self.graph;
        in_graph(id.index(), graph.assembly_ref_count(), "assembly reference")?;
        let reference = graph.assembly_ref(id);

        let existing = if self.options.deduplicate_references {
            self.emitted_assembly_refs
                .iter()
                .position(|other| graph.assembly_ref(*other).same_identity(reference))
        } else {
            None
        };

        let rid = match existing {
            Some(index) => next_rid(index)?,
            None => {
                let rid = next_rid(self.rows.assembly_ref.len())?;
                let row = AssemblyRefRaw {
                    major_version: reference.version.major,
                    minor_version: reference.version.minor,
                    build_number: reference.version.build,
                    revision_number: reference.version.revision,
                    flags: reference.flags.bits(),
                    public_key_or_token: self.blobs.intern(&reference.public_key_or_token)?,
                    name: self.strings.intern(&reference.name)?,
                    culture: self.strings.intern(&reference.culture)?,
                    hash_value: self.blobs.intern(&reference.hash_value)?,
                    ..Default::default()
                };
                self.rows.assembly_ref.push(row);
                self.emitted_assembly_refs.push(id);
                rid
            }
        };
        self.assembly_refs.insert(id, rid);
        Ok(Token::from_parts(TableId::AssemblyRef, rid))
    }

    fn module_ref_token(&mut self, id: ModuleRefId) -> Result<Token> {
        if let Some(rid) = self.module_refs.get(&id) {
            return Ok(Token::from_parts(TableId::ModuleRef, *rid));
        }

        let graph = self.graph;
        in_graph(id.index(), graph.module_ref_count(), "module reference")?;
        let name = self.strings.intern(&graph.module_ref(id).name)?;

        let rid = match self.module_ref_keys.get(&name) {
            Some(rid) if self.options.deduplicate_references => *rid,
            _ => {
                let rid = next_rid(self.rows.module_ref.len())?;
                self.rows.module_ref.push(ModuleRefRaw {
                    name,
                    ..Default::default()
                });
                self.module_ref_keys.entry(name).or_insert(rid);
                rid
            }
        };
        self.module_refs.insert(id, rid);
        Ok(Token::from_parts(TableId::ModuleRef, rid))
    }

    fn member_ref_parent(&mut self, parent: &MemberRefParent) -> Result<Token> {
        match parent {
            MemberRefParent::Type(sig) => self.type_def_or_ref(sig),
            MemberRefParent::Method(id) => defined(&self.methods, *id, TableId::MethodDef),
            MemberRefParent::ModuleRef(id) => self.module_ref_token(*id),
        }
    }

    fn member_ref_token(&mut self, id: MemberRefId) -> Result<Token> {
        if let Some(rid) = self.member_refs.get(&id) {
            return Ok(Token::from_parts(TableId::MemberRef, *rid));
        }

        let graph = self.graph;
        in_graph(id.index(), graph.member_ref_count(), "member reference")?;
        let reference = graph.member_ref(id);

        let parent = self.member_ref_parent(&reference.parent)?;
        let blob = match &reference.signature {
            MemberSig::Method(sig) => encode_method_signature(sig, self)?,
            MemberSig::Field(sig) => encode_field_signature(sig, self)?,
        };
        let key = (
            parent,
            self.strings.intern(&reference.name)?,
            self.blobs.intern(&blob)?,
        );

        let rid = match self.member_ref_keys.get(&key) {
            Some(rid) if self.options.deduplicate_references => *rid,
            _ => {
                let rid = next_rid(self.rows.member_ref.len())?;
                self.rows.member_ref.push(MemberRefRaw {
                    class: key.0,
                    name: key.1,
                    signature: key.2,
                    ..Default::default()
                });
                self.member_ref_keys.entry(key).or_insert(rid);
                rid
            }
        };
        self.member_refs.insert(id, rid);
        Ok(Token::from_parts(TableId::MemberRef, rid))
    }

    fn method_spec_token(&mut self, id: MethodSpecId) -> Result<Token> {
        if let Some(rid) = self.method_specs.get(&id) {
            return Ok(Token::from_parts(TableId::MethodSpec, *rid));
        }

        let graph = self.graph;
        in_graph(id.index(), graph.method_spec_count(), "method specification")?;
        let specification = graph.method_spec(id);

        let method = self.method_def_or_ref(specification.method)?;
        let blob = encode_method_spec_signature(&specification.instantiation, self)?;
        let key = (method, self.blobs.intern(&blob)?);

        let rid = match self.method_spec_keys.get(&key) {
            Some(rid) if self.options.deduplicate_references => *rid,
            _ => {
                let rid = next_rid(self.rows.method_spec.len())?;
                self.rows.method_spec.push(MethodSpecRaw {
                    method: key.0,
                    instantiation: key.1,
                    ..Default::default()
                });
                self.method_spec_keys.entry(key).or_insert(rid);
                rid
            }
        };
        self.method_specs.insert(id, rid);
        Ok(Token::from_parts(TableId::MethodSpec, rid))
    }

    fn method_token(&mut self, handle: MethodHandle) -> Result<Token> {
        match handle {
            MethodHandle::Definition(id) => defined(&self.methods, id, TableId::MethodDef),
            MethodHandle::Reference(id) => {
                let graph = self.graph;
                in_graph(id.index(), graph.member_ref_count(), "member reference")?;
                if !graph.member_ref(id).is_method() {
                    return Err(invalid_operation!("member reference {:?} is a field", id));
                }
                self.member_ref_token(id)
            }
            MethodHandle::Specification(id) => self.method_spec_token(id),
        }
    }

    /// Token of a `MethodDefOrRef` column; generic instances have no place there
    fn method_def_or_ref(&mut self, handle: MethodHandle) -> Result<Token> {
        if let MethodHandle::Specification(id) = handle {
            return Err(invalid_operation!(
                "method specification {:?} cannot stand in for a method definition or reference",
                id
            ));
        }
        self.method_token(handle)
    }
}

impl TokenEncoder for MetadataBuilder<'_> {
    fn encode_type(&mut self, handle: TypeHandle) -> Result<Token> {
        match handle {
            TypeHandle::Definition(id) => defined(&self.type_defs, id, TableId::TypeDef),
            TypeHandle::Reference(id) => self.type_ref_token(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            model::{
                AssemblyNameReference, AssemblyVersion, FieldAttributes, FieldDefinition,
                GenericOwner, GenericParamAttributes, MethodAttributes, MethodDefinition,
                TypeAttributes, TypeDefinition, TypeReference,
            },
            signatures::{GenericParamSig, MethodSig},
        },
        Error,
    };

    fn rows_of(module: &ModuleDefinition, options: &WriterOptions) -> Result<TableRows> {
        let mut builder = MetadataBuilder::new(module, options);
        builder.emit_rows()?;
        Ok(builder.rows)
    }

    fn holder(module: &mut ModuleDefinition) -> TypeDefId {
        module
            .add_type(TypeDefinition::new("", "Holder", TypeAttributes::PUBLIC, None))
            .unwrap()
    }

    #[test]
    fn merges_equal_references() {
        let mut module = ModuleDefinition::new("Refs.dll");
        let corlib = module
            .add_assembly_reference(AssemblyNameReference::new(
                "mscorlib",
                AssemblyVersion::new(4, 0, 0, 0),
            ))
            .unwrap();
        let runtime = module
            .add_assembly_reference(AssemblyNameReference::new(
                "System.Runtime",
                AssemblyVersion::new(4, 2, 0, 0),
            ))
            .unwrap();
        let mut object = |scope| {
            module.add_type_reference(TypeReference::new(
                ResolutionScope::AssemblyRef(scope),
                "System",
                "Object",
            ))
        };
        let first = object(corlib);
        let second = object(corlib);
        let third = object(runtime);

        let ty = holder(&mut module);
        for (name, reference) in [("a", first), ("b", second), ("c", third)] {
            let signature = TypeSig::Class(TypeHandle::Reference(reference));
            module
                .add_field(ty, FieldDefinition::new(name, FieldAttributes::PUBLIC, signature))
                .unwrap();
        }

        let rows = rows_of(&module, &WriterOptions::default()).unwrap();
        assert_eq!(rows.type_ref.len(), 2);
        assert_eq!(rows.assembly_ref.len(), 2);
        assert_eq!(rows.field[0].signature, rows.field[1].signature);
        assert_ne!(rows.field[0].signature, rows.field[2].signature);

        let rows = rows_of(&module, &WriterOptions::verbatim()).unwrap();
        assert_eq!(rows.type_ref.len(), 3);
    }

    #[test]
    fn member_lists_are_contiguous() {
        let mut module = ModuleDefinition::new("Lists.dll");
        let outer = holder(&mut module);
        let inner = module
            .add_nested_type(
                outer,
                TypeDefinition::new("", "Inner", TypeAttributes::NESTED_PUBLIC, None),
            )
            .unwrap();
        module
            .add_type(TypeDefinition::new("", "Empty", TypeAttributes::PUBLIC, None))
            .unwrap();

        module
            .add_field(outer, FieldDefinition::new("x", FieldAttributes::PUBLIC, TypeSig::I4))
            .unwrap();
        module
            .add_field(inner, FieldDefinition::new("z", FieldAttributes::PUBLIC, TypeSig::I8))
            .unwrap();
        module
            .add_field(outer, FieldDefinition::new("y", FieldAttributes::PUBLIC, TypeSig::I4))
            .unwrap();
        module
            .add_method(
                outer,
                MethodDefinition::new(
                    "Run",
                    MethodAttributes::PUBLIC,
                    MethodSig::new_instance(TypeSig::Void, vec![]),
                ),
            )
            .unwrap();

        let rows = rows_of(&module, &WriterOptions::default()).unwrap();
        let lists: Vec<(u32, u32)> = rows
            .type_def
            .iter()
            .map(|row| (row.field_list, row.method_list))
            .collect();
        // <Module>, Holder, Inner, Empty
        assert_eq!(lists, [(1, 1), (1, 1), (3, 2), (4, 2)]);
        assert_eq!(rows.nested_class.len(), 1);
        assert_eq!(rows.nested_class[0].nested_class, 3);
        assert_eq!(rows.nested_class[0].enclosing_class, 2);
    }

    #[test]
    fn generic_parameters_sorted_by_owner_and_number() {
        let mut module = ModuleDefinition::new("Generic.dll");
        let ty = module
            .add_type(TypeDefinition::new("", "Pair`2", TypeAttributes::PUBLIC, None))
            .unwrap();
        let method = module
            .add_method(
                ty,
                MethodDefinition::new(
                    "Make",
                    MethodAttributes::PUBLIC | MethodAttributes::STATIC,
                    MethodSig {
                        generic_arity: 1,
                        ..MethodSig::new_static(TypeSig::Void, vec![])
                    },
                ),
            )
            .unwrap();

        let none = GenericParamAttributes::empty();
        let first = module
            .add_generic_parameter(GenericOwner::Type(ty), "TFirst", none)
            .unwrap();
        module
            .add_generic_parameter(GenericOwner::Method(method), "TMethod", none)
            .unwrap();
        let second = module
            .add_generic_parameter(GenericOwner::Type(ty), "TSecond", none)
            .unwrap();
        module.add_generic_constraint(second, TypeSig::I4).unwrap();

        module.graph_mut().generic_parameter_mut(first).number = 1;
        module.graph_mut().generic_parameter_mut(second).number = 0;

        let rows = rows_of(&module, &WriterOptions::default()).unwrap();
        let order: Vec<(Token, u16)> = rows
            .generic_param
            .iter()
            .map(|row| (row.owner, row.number))
            .collect();
        // MethodDef 1 encodes as 3, TypeDef 2 as 4
        assert_eq!(
            order,
            [
                (Token::new(0x0600_0001), 0),
                (Token::new(0x0200_0002), 0),
                (Token::new(0x0200_0002), 1),
            ]
        );
        assert_eq!(rows.generic_param_constraint.len(), 1);
        assert_eq!(rows.generic_param_constraint[0].owner, 2);
    }

    #[test]
    fn duplicate_generic_position() {
        let mut module = ModuleDefinition::new("Generic.dll");
        let ty = module
            .add_type(TypeDefinition::new("", "Pair`2", TypeAttributes::PUBLIC, None))
            .unwrap();
        module
            .add_generic_parameter(GenericOwner::Type(ty), "A", GenericParamAttributes::empty())
            .unwrap();
        let second = module
            .add_generic_parameter(GenericOwner::Type(ty), "B", GenericParamAttributes::empty())
            .unwrap();
        module.graph_mut().generic_parameter_mut(second).number = 0;

        let result = rows_of(&module, &WriterOptions::default());
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn foreign_reference() {
        let mut module = ModuleDefinition::new("Foreign.dll");
        let ty = holder(&mut module);
        module
            .add_field(
                ty,
                FieldDefinition::new(
                    "stray",
                    FieldAttributes::PUBLIC,
                    TypeSig::Class(TypeHandle::Reference(TypeRefId(99))),
                ),
            )
            .unwrap();

        assert!(matches!(module.write(), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn cyclic_type_reference_scope() {
        let mut module = ModuleDefinition::new("Cycle.dll");
        let first =
            module.add_type_reference(TypeReference::new(ResolutionScope::None, "N", "First"));
        let second = module.add_type_reference(TypeReference::new(
            ResolutionScope::TypeRef(first),
            "",
            "Second",
        ));
        module.graph_mut().type_ref_mut(first).scope = ResolutionScope::TypeRef(second);
        let ty = holder(&mut module);
        module
            .add_field(
                ty,
                FieldDefinition::new(
                    "looped",
                    FieldAttributes::PUBLIC,
                    TypeSig::Class(TypeHandle::Reference(second)),
                ),
            )
            .unwrap();

        assert!(matches!(module.write(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn written_module_reads_back() {
        let mut module = ModuleDefinition::new("Round.dll");
        let ty = holder(&mut module);
        module
            .add_field(ty, FieldDefinition::new("count", FieldAttributes::PRIVATE, TypeSig::I4))
            .unwrap();

        let image = module.write().unwrap();
        assert_eq!(&image[..4], b"BSJB");

        let mut reread = ModuleDefinition::from_mem(image).unwrap();
        assert_eq!(reread.name, "Round.dll");
        assert_eq!(reread.mvid, module.mvid);
        let found = reread.find_type("", "Holder").unwrap().unwrap();
        let fields = reread.fields(found).unwrap().to_vec();
        assert_eq!(fields.len(), 1);
        assert_eq!(reread.graph().field(fields[0]).name, "count");
        assert_eq!(reread.graph().field(fields[0]).signature, TypeSig::I4);
    }

    #[test]
    fn placeholder_beyond_owner_parameters() {
        let mut module = ModuleDefinition::new("Generic.dll");
        let ty = holder(&mut module);
        module
            .add_generic_parameter(GenericOwner::Type(ty), "T", GenericParamAttributes::empty())
            .unwrap();
        module
            .add_field(
                ty,
                FieldDefinition::new(
                    "second",
                    FieldAttributes::PUBLIC,
                    TypeSig::Var(GenericParamSig::unbound(1)),
                ),
            )
            .unwrap();

        let mut reread = ModuleDefinition::from_mem(module.write().unwrap()).unwrap();
        let found = reread.find_type("", "Holder").unwrap().unwrap();
        assert!(matches!(reread.fields(found), Err(Error::Malformed { .. })));
    }
}
