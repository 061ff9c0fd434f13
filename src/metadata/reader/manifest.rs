//! Module, assembly and manifest table readers, token lookup and eager loading.

use crate::{
    metadata::{
        model::{
            AssemblyDefinition, AssemblyFlags, AssemblyNameReference, AssemblyRefId,
            AssemblyVersion, AttributeOwner, EntityHandle, EventId, ExportedType, FieldId,
            FileAttributes, FileReference, GenericParamId, Implementation, ManifestResource,
            ManifestResourceAttributes, MemberRefId, MethodId, MethodSpecId, ModuleRefId,
            ModuleReference, ParamId, PropertyId, SecurityOwner, StandAloneSignature,
            TypeAttributes, TypeDefId, TypeRefId, TypeSpecification,
        },
        reader::{
            cache::{memo, remember},
            ReadContext,
        },
        tables::{
            AssemblyRaw, AssemblyRefRaw, ExportedTypeRaw, FileRaw, ManifestResourceRaw,
            ModuleRaw, ModuleRefRaw, RowDefinition, TableId,
        },
        token::Token,
    },
    Result,
};

/// Name and version id of the `Module` row
#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleRow {
    pub(crate) name: String,
    pub(crate) mvid: uguid::Guid,
}

impl ReadContext<'_> {
    /// Materialize the assembly reference `rid`
    pub(crate) fn assembly_ref(&mut self, rid: u32) -> Result<AssemblyRefId> {
        if let Some(id) = memo(&self.cache.assembly_refs, rid) {
            return Ok(id);
        }

        let row = self.row::<AssemblyRefRaw>(rid)?;
        let reference = AssemblyNameReference {
            token: row.token(),
            name: self.string(row.name)?,
            version: AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            flags: AssemblyFlags::from_bits_retain(row.flags),
            public_key_or_token: self.blob(row.public_key_or_token)?.to_vec(),
            culture: self.string(row.culture)?,
            hash_value: self.blob(row.hash_value)?.to_vec(),
        };

        let id = self.graph.push_assembly_ref(reference);
        remember(&mut self.cache.assembly_refs, rid, id);
        Ok(id)
    }

    /// Materialize the module reference `rid`
    pub(crate) fn module_ref(&mut self, rid: u32) -> Result<ModuleRefId> {
        if let Some(id) = memo(&self.cache.module_refs, rid) {
            return Ok(id);
        }

        let row = self.row::<ModuleRefRaw>(rid)?;
        let id = self.graph.push_module_ref(ModuleReference {
            token: row.token(),
            name: self.string(row.name)?,
        });
        remember(&mut self.cache.module_refs, rid, id);
        Ok(id)
    }

    /// The `Module` row
    pub(crate) fn module_row(&self) -> Result<ModuleRow> {
        if self.row_count(TableId::Module) == 0 {
            return Err(malformed_error!("Image has no Module row"));
        }

        let row = self.row::<ModuleRaw>(1)?;
        Ok(ModuleRow {
            name: self.string(row.name)?,
            mvid: self.guid(row.mvid)?,
        })
    }

    /// The assembly manifest, `None` for a netmodule
    pub(crate) fn assembly(&self) -> Result<Option<AssemblyDefinition>> {
        if self.row_count(TableId::Assembly) == 0 {
            return Ok(None);
        }

        let row = self.row::<AssemblyRaw>(1)?;
        Ok(Some(AssemblyDefinition {
            name: self.string(row.name)?,
            version: AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            flags: AssemblyFlags::from_bits_retain(row.flags),
            public_key: self.blob(row.public_key)?.to_vec(),
            culture: self.string(row.culture)?,
            hash_algorithm: row.hash_alg_id,
        }))
    }

    /// Every assembly reference of the image, in table order
    pub(crate) fn assembly_refs(&mut self) -> Result<Vec<AssemblyRefId>> {
        (1..=self.row_count(TableId::AssemblyRef))
            .map(|rid| self.assembly_ref(rid))
            .collect()
    }

    /// Every module reference of the image, in table order
    pub(crate) fn module_refs(&mut self) -> Result<Vec<ModuleRefId>> {
        (1..=self.row_count(TableId::ModuleRef))
            .map(|rid| self.module_ref(rid))
            .collect()
    }

    /// The `File` table
    pub(crate) fn files(&self) -> Result<Vec<FileReference>> {
        let mut files = Vec::new();
        for rid in 1..=self.row_count(TableId::File) {
            let row = self.row::<FileRaw>(rid)?;
            files.push(FileReference {
                token: row.token(),
                flags: FileAttributes::from_bits_retain(row.flags),
                name: self.string(row.name)?,
                hash_value: self.blob(row.hash_value)?.to_vec(),
            });
        }
        Ok(files)
    }

    /// The `ExportedType` table
    pub(crate) fn exported_types(&mut self) -> Result<Vec<ExportedType>> {
        let mut exported = Vec::new();
        for rid in 1..=self.row_count(TableId::ExportedType) {
            let row = self.row::<ExportedTypeRaw>(rid)?;
            let Some(implementation) = self.implementation(row.implementation)? else {
                return Err(malformed_error!("Exported type {} has no implementation", row.token()));
            };

            exported.push(ExportedType {
                token: row.token(),
                flags: TypeAttributes::from_bits_retain(row.flags),
                type_def_id: row.type_def_id,
                name: self.string(row.type_name)?,
                namespace: self.string(row.type_namespace)?,
                implementation,
            });
        }
        Ok(exported)
    }

    /// The `ManifestResource` table
    pub(crate) fn resources(&mut self) -> Result<Vec<ManifestResource>> {
        let mut resources = Vec::new();
        for rid in 1..=self.row_count(TableId::ManifestResource) {
            let row = self.row::<ManifestResourceRaw>(rid)?;
            resources.push(ManifestResource {
                token: row.token(),
                offset: row.offset,
                flags: ManifestResourceAttributes::from_bits_retain(row.flags),
                name: self.string(row.name)?,
                implementation: self.implementation(row.implementation)?,
            });
        }
        Ok(resources)
    }

    /// The `StandAloneSig` table
    pub(crate) fn standalone_signatures(&mut self) -> Result<Vec<StandAloneSignature>> {
        (1..=self.row_count(TableId::StandAloneSig))
            .map(|rid| self.standalone_signature(rid))
            .collect()
    }

    /// The `TypeSpec` table, decoded without a generic context
    pub(crate) fn type_specifications(&mut self) -> Result<Vec<TypeSpecification>> {
        let mut specifications = Vec::new();
        for rid in 1..=self.row_count(TableId::TypeSpec) {
            let signature = self.with_frames(Vec::new(), |ctx| ctx.type_spec(rid))?;
            specifications.push(TypeSpecification {
                token: Token::from_parts(TableId::TypeSpec, rid),
                signature,
            });
        }
        Ok(specifications)
    }

    /// An `Implementation` column; list positions follow table order
    fn implementation(&mut self, token: Token) -> Result<Option<Implementation>> {
        if token.is_null() {
            return Ok(None);
        }

        let index = token.row() as usize - 1;
        match token.table_id() {
            Some(TableId::File) if token.row() <= self.row_count(TableId::File) => {
                Ok(Some(Implementation::File(index)))
            }
            Some(TableId::AssemblyRef) => {
                Ok(Some(Implementation::AssemblyRef(self.assembly_ref(token.row())?)))
            }
            Some(TableId::ExportedType) if token.row() <= self.row_count(TableId::ExportedType) => {
                Ok(Some(Implementation::ExportedType(index)))
            }
            _ => Err(malformed_error!("Invalid implementation - {}", token)),
        }
    }

    /// Materialize the entity named by `token`
    ///
    /// Returns `Ok(None)` for rid 0, rows beyond their table, and tables that hold no entity
    /// of their own. The active generic context is restored before returning.
    pub(crate) fn lookup_token(&mut self, token: Token) -> Result<Option<EntityHandle>> {
        let Some(table) = token.table_id() else {
            return Ok(None);
        };
        let rid = token.row();
        if rid == 0 || rid > self.row_count(table) {
            return Ok(None);
        }

        self.with_frames(Vec::new(), |ctx| {
            let handle = match table {
                TableId::Module => EntityHandle::Module,
                TableId::Assembly => EntityHandle::Assembly,
                TableId::TypeDef => EntityHandle::Type(ctx.type_def(rid)?),
                TableId::TypeRef => EntityHandle::TypeReference(ctx.type_ref(rid)?),
                TableId::TypeSpec => EntityHandle::TypeSpecification(ctx.type_spec(rid)?),
                TableId::Field => EntityHandle::Field(ctx.field(rid)?),
                TableId::MethodDef => EntityHandle::Method(ctx.method(rid)?),
                TableId::Param => EntityHandle::Parameter(ctx.param(rid)?),
                TableId::Property => EntityHandle::Property(ctx.property(rid)?),
                TableId::Event => EntityHandle::Event(ctx.event(rid)?),
                TableId::MemberRef => EntityHandle::MemberReference(ctx.member_ref(rid)?),
                TableId::MethodSpec => EntityHandle::MethodSpecification(ctx.method_spec(rid)?),
                TableId::GenericParam => EntityHandle::GenericParameter(ctx.generic_param(rid)?),
                TableId::AssemblyRef => EntityHandle::AssemblyReference(ctx.assembly_ref(rid)?),
                TableId::ModuleRef => EntityHandle::ModuleReference(ctx.module_ref(rid)?),
                TableId::StandAloneSig => EntityHandle::StandAloneSignature(rid as usize - 1),
                _ => return Ok(None),
            };
            Ok(Some(handle))
        })
    }

    /// Materialize every row of the graph tables and drain every escrow
    pub(crate) fn load_all(&mut self) -> Result<()> {
        self.cache.populate_all(self.header, self.tables)?;

        for rid in 1..=self.row_count(TableId::TypeDef) {
            let id = self.type_def(rid)?;
            self.type_fields(id)?;
            self.type_nested_types(id)?;
            self.type_interfaces(id)?;
            self.type_overrides(id)?;
            self.type_properties(id)?;
            self.type_events(id)?;
            for method in self.type_methods(id)? {
                self.method_parameters(method)?;
                for parameter in self.method_generic_parameters(method)? {
                    self.generic_param_constraints(parameter)?;
                }
            }
            for parameter in self.type_generic_parameters(id)? {
                self.generic_param_constraints(parameter)?;
            }
        }

        // Rows outside of any owner range are still part of the image
        for rid in 1..=self.row_count(TableId::Field) {
            self.field(rid)?;
        }
        for rid in 1..=self.row_count(TableId::MethodDef) {
            self.method(rid)?;
        }
        for rid in 1..=self.row_count(TableId::Param) {
            self.param(rid)?;
        }
        for rid in 1..=self.row_count(TableId::GenericParam) {
            self.generic_param(rid)?;
        }
        for rid in 1..=self.row_count(TableId::TypeRef) {
            self.type_ref(rid)?;
        }
        for rid in 1..=self.row_count(TableId::MemberRef) {
            self.member_ref(rid)?;
        }
        for rid in 1..=self.row_count(TableId::MethodSpec) {
            self.method_spec(rid)?;
        }
        self.assembly_refs()?;
        self.module_refs()?;

        self.load_custom_attributes(AttributeOwner::Module)?;
        self.load_custom_attributes(AttributeOwner::Assembly)?;
        self.load_security_declarations(SecurityOwner::Assembly)?;
        for index in 0..self.graph.type_def_count() {
            let id = TypeDefId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Type(id))?;
            self.load_security_declarations(SecurityOwner::Type(id))?;
        }
        for index in 0..self.graph.method_count() {
            let id = MethodId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Method(id))?;
            self.load_security_declarations(SecurityOwner::Method(id))?;
        }
        for index in 0..self.graph.field_count() {
            let id = FieldId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Field(id))?;
        }
        for index in 0..self.graph.parameter_count() {
            let id = ParamId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Parameter(id))?;
        }
        for index in 0..self.graph.property_count() {
            let id = PropertyId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Property(id))?;
        }
        for index in 0..self.graph.event_count() {
            let id = EventId::from_index(index);
            self.load_custom_attributes(AttributeOwner::Event(id))?;
        }
        for index in 0..self.graph.generic_parameter_count() {
            let id = GenericParamId::from_index(index);
            self.load_custom_attributes(AttributeOwner::GenericParameter(id))?;
            let constraints =
                self.graph.generic_parameter(id).constraints.as_deref().map_or(0, <[_]>::len);
            for position in 0..constraints {
                let owner = AttributeOwner::GenericParameterConstraint(id, position);
                self.load_custom_attributes(owner)?;
            }
        }
        for index in 0..self.graph.type_def_count() {
            let id = TypeDefId::from_index(index);
            let interfaces = self.graph.type_def(id).interfaces.as_deref().map_or(0, <[_]>::len);
            for position in 0..interfaces {
                self.load_custom_attributes(AttributeOwner::InterfaceImplementation(id, position))?;
            }
        }
        let declarations: Vec<(SecurityOwner, usize)> = self
            .graph
            .security_declarations
            .iter()
            .map(|(owner, declarations)| (*owner, declarations.len()))
            .collect();
        for (owner, count) in declarations {
            for position in 0..count {
                self.load_custom_attributes(AttributeOwner::SecurityDeclaration(owner, position))?;
            }
        }
        for index in 0..self.graph.type_ref_count() {
            let id = TypeRefId::from_index(index);
            self.load_custom_attributes(AttributeOwner::TypeReference(id))?;
        }
        for index in 0..self.graph.member_ref_count() {
            let id = MemberRefId::from_index(index);
            self.load_custom_attributes(AttributeOwner::MemberReference(id))?;
        }
        for index in 0..self.graph.method_spec_count() {
            let id = MethodSpecId::from_index(index);
            self.load_custom_attributes(AttributeOwner::MethodSpecification(id))?;
        }
        for index in 0..self.graph.assembly_ref_count() {
            let id = AssemblyRefId::from_index(index);
            self.load_custom_attributes(AttributeOwner::AssemblyReference(id))?;
        }
        for index in 0..self.graph.module_ref_count() {
            let id = ModuleRefId::from_index(index);
            self.load_custom_attributes(AttributeOwner::ModuleReference(id))?;
        }

        tracing::debug!(
            types = self.graph.type_def_count(),
            methods = self.graph.method_count(),
            member_refs = self.graph.member_ref_count(),
            "loaded all metadata rows"
        );
        Ok(())
    }
}
