//! The module facade.
//!
//! A [`ModuleDefinition`] owns everything that belongs to one module: the backing image and
//! its [`crate::metadata::reader`] state, the object graph, the manifest lists and the reader
//! options. Lists are materialized on first access, which is why most accessors take
//! `&mut self` and return a [`Result`].
//!
//! # Examples
//!
//! ```rust
//! use dotmeta::prelude::*;
//!
//! let mut module = ModuleDefinition::new("Demo.dll");
//! let object =
//!     module.add_type_reference(TypeReference::new(ResolutionScope::Module, "System", "Object"));
//! let point = module.add_type(TypeDefinition::new(
//!     "Demo",
//!     "Point",
//!     TypeAttributes::PUBLIC,
//!     Some(TypeSig::Class(TypeHandle::Reference(object))),
//! ))?;
//! module.add_field(point, FieldDefinition::new("X", FieldAttributes::PUBLIC, TypeSig::I4))?;
//!
//! let image = module.write()?;
//! let mut reread = ModuleDefinition::from_mem(image)?;
//! let point = reread.find_type("Demo", "Point")?.expect("written type");
//! assert_eq!(reread.fields(point)?.len(), 1);
//! # Ok::<(), dotmeta::Error>(())
//! ```

use std::{collections::HashSet, path::Path, sync::Arc};

use sha1::{Digest, Sha1};

use crate::{
    file::{Backend, Memory, Physical},
    metadata::{
        builder::MetadataBuilder,
        customattributes::CustomAttribute,
        model::{
            AssemblyDefinition, AssemblyNameReference, AssemblyRefId, AttributeOwner,
            EntityHandle, EventDefinition, EventId, ExportedType, FieldDefinition, FieldId,
            FileReference, GenericOwner, GenericParamAttributes, GenericParamConstraint,
            GenericParamId, GenericParameter, InterfaceImplementation, ManifestResource,
            MemberRefId, MemberReference, MetadataGraph, MethodDefinition, MethodId,
            MethodOverride, MethodSpecId, MethodSpecification, ModuleRefId, ModuleReference,
            ParamId, ParameterDefinition, PropertyDefinition, PropertyId, SecurityOwner,
            StandAloneSignature, TypeAttributes, TypeDefId, TypeDefinition, TypeRefId,
            TypeReference, TypeSpecification,
        },
        options::{ReaderOptions, ReadingMode, WriterOptions},
        reader::{EscrowKind, MetadataReader, ReadContext},
        resolver::AssemblyResolver,
        security::SecurityDeclaration,
        signatures::TypeSig,
        token::Token,
    },
    Result,
};

/// Version string written into the metadata root of modules created in memory
pub const DEFAULT_RUNTIME_VERSION: &str = "v4.0.30319";

macro_rules! lazy_list {
    (
        $(#[$meta:meta])*
        $name:ident($owner:ty) -> $item:ty, $get:ident.$field:ident, $load:ident
    ) => {
        $(#[$meta])*
        ///
        /// # Errors
        /// Returns an error if the backing rows are damaged
        pub fn $name(&mut self, id: $owner) -> Result<&[$item]> {
            if self.graph.$get(id).$field.is_none() {
                self.read(|ctx| ctx.$load(id))?;
            }
            Ok(self.graph.$get(id).$field.as_deref().unwrap_or_default())
        }
    };
}

/// One module: its identity, its object graph and, for modules read from an image, the
/// state needed to materialize the rest of it
pub struct ModuleDefinition {
    /// File name of the module
    pub name: String,
    /// Module version id
    pub mvid: uguid::Guid,
    /// Version string of the metadata root
    pub runtime_version: String,
    /// The assembly manifest, `None` for a netmodule
    pub assembly: Option<AssemblyDefinition>,
    graph: MetadataGraph,
    reader: Option<MetadataReader>,
    options: ReaderOptions,
    pub(crate) types: Option<Vec<TypeDefId>>,
    pub(crate) exported_types: Option<Vec<ExportedType>>,
    pub(crate) resources: Option<Vec<ManifestResource>>,
    pub(crate) files: Option<Vec<FileReference>>,
    pub(crate) standalone_signatures: Option<Vec<StandAloneSignature>>,
    pub(crate) type_specifications: Option<Vec<TypeSpecification>>,
    references_loaded: bool,
}

impl std::fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .field("mvid", &self.mvid)
            .field("runtime_version", &self.runtime_version)
            .field("assembly", &self.assembly.as_ref().map(|assembly| &assembly.name))
            .field("backed", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl ModuleDefinition {
    /// Create an empty module holding only the `<Module>` type
    ///
    /// The version id is derived from the name, so building the same module twice yields
    /// the same image.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut module = ModuleDefinition {
            name: name.to_string(),
            mvid: mvid_from_name(name),
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            assembly: None,
            graph: MetadataGraph::default(),
            reader: None,
            options: ReaderOptions::default(),
            types: Some(Vec::new()),
            exported_types: Some(Vec::new()),
            resources: Some(Vec::new()),
            files: Some(Vec::new()),
            standalone_signatures: Some(Vec::new()),
            type_specifications: Some(Vec::new()),
            references_loaded: true,
        };

        let global = module
            .graph
            .push_type_def(TypeDefinition::new("", "<Module>", TypeAttributes::empty(), None));
        module.types = Some(vec![global]);
        module
    }

    /// Create an assembly module with the manifest `assembly`
    #[must_use]
    pub fn new_assembly(name: &str, assembly: AssemblyDefinition) -> Self {
        let mut module = ModuleDefinition::new(name);
        module.assembly = Some(assembly);
        module
    }

    /// Open a metadata image held in memory
    ///
    /// `data` starts with the `BSJB` signature of the metadata root.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::NotSupported`] for an
    /// uncompressed table stream or a format error for damaged metadata
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_mem_with(data, ReaderOptions::default())
    }

    /// Open a metadata image held in memory with explicit options
    ///
    /// # Errors
    /// See [`ModuleDefinition::from_mem`]
    pub fn from_mem_with(data: Vec<u8>, options: ReaderOptions) -> Result<Self> {
        Self::load(Arc::new(Memory::new(data)), options)
    }

    /// Open a metadata image from disk; the file is memory mapped
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, otherwise see
    /// [`ModuleDefinition::from_mem`]
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with(path, ReaderOptions::default())
    }

    /// Open a metadata image from disk with explicit options
    ///
    /// # Errors
    /// See [`ModuleDefinition::from_file`]
    pub fn from_file_with(path: &Path, options: ReaderOptions) -> Result<Self> {
        Self::load(Arc::new(Physical::new(path)?), options)
    }

    fn load(image: Arc<dyn Backend>, options: ReaderOptions) -> Result<Self> {
        let mut reader = MetadataReader::new(image)?;
        let mut graph = MetadataGraph::default();
        let runtime_version = reader.root().version.clone();

        let (row, assembly) = {
            let ctx = reader.context(&mut graph, &options)?;
            (ctx.module_row()?, ctx.assembly()?)
        };

        let mut module = ModuleDefinition {
            name: row.name,
            mvid: row.mvid,
            runtime_version,
            assembly,
            graph,
            reader: Some(reader),
            options,
            types: None,
            exported_types: None,
            resources: None,
            files: None,
            standalone_signatures: None,
            type_specifications: None,
            references_loaded: false,
        };

        if module.options.mode == ReadingMode::Immediate {
            module.load_all()?;
        }

        tracing::debug!(name = %module.name, mode = ?module.options.mode, "opened module");
        Ok(module)
    }

    /// Run `read` against the backing image; `None` for modules created in memory
    fn read<T>(
        &mut self,
        read: impl FnOnce(&mut ReadContext<'_>) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut ctx = reader.context(&mut self.graph, &self.options)?;
        read(&mut ctx).map(Some)
    }

    /// Materialize everything that is still parked in the image
    ///
    /// # Errors
    /// Returns an error if any row of the image is damaged
    pub fn load_all(&mut self) -> Result<()> {
        self.read(|ctx| ctx.load_all())?;
        self.types()?;
        self.exported_types()?;
        self.resources()?;
        self.files()?;
        self.standalone_signatures()?;
        self.type_specifications()?;
        self.load_references()?;
        self.load_listed_attributes()?;
        Ok(())
    }

    /// Returns `true` if the module was read from an image
    #[must_use]
    pub fn is_backed(&self) -> bool {
        self.reader.is_some()
    }

    /// The options this module was opened with
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Use `resolver` to find the modules behind references of this module
    pub fn set_assembly_resolver(&mut self, resolver: Arc<dyn AssemblyResolver>) {
        self.options.assembly_resolver = Some(resolver);
    }

    /// The object graph; ids handed out by this module index into it
    #[must_use]
    pub fn graph(&self) -> &MetadataGraph {
        &self.graph
    }

    /// The object graph, mutable
    pub fn graph_mut(&mut self) -> &mut MetadataGraph {
        &mut self.graph
    }

    /// Serialize the module into a metadata root with default options
    ///
    /// # Errors
    /// Returns an error if the graph holds a foreign reference or a value that does not fit
    /// its column
    pub fn write(&mut self) -> Result<Vec<u8>> {
        self.write_with(&WriterOptions::default())
    }

    /// Serialize the module into a metadata root
    ///
    /// Everything still parked in the image is materialized first.
    ///
    /// # Errors
    /// See [`ModuleDefinition::write`]
    pub fn write_with(&mut self, options: &WriterOptions) -> Result<Vec<u8>> {
        self.load_all()?;
        MetadataBuilder::new(self, options).build()
    }

    /// Serialize the module into a file
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be written, otherwise see
    /// [`ModuleDefinition::write`]
    pub fn write_to_file(&mut self, path: &Path, options: &WriterOptions) -> Result<()> {
        let image = self.write_with(options)?;
        std::fs::write(path, image)?;
        Ok(())
    }

    /// Look up the entity behind a read-time token
    ///
    /// Returns `Ok(None)` for rid 0, tokens beyond their table, tables without entities and
    /// modules created in memory.
    ///
    /// # Errors
    /// Returns an error if the row or anything it references is damaged
    pub fn lookup_token(&mut self, token: Token) -> Result<Option<EntityHandle>> {
        Ok(self.read(|ctx| ctx.lookup_token(token))?.flatten())
    }

    /// Types that are not nested in another type, `<Module>` included
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` or `NestedClass` table is damaged
    pub fn types(&mut self) -> Result<&[TypeDefId]> {
        if self.types.is_none() {
            let types = self.read(|ctx| ctx.top_level_types())?.unwrap_or_default();
            self.types = Some(types);
        }
        Ok(self.types.as_deref().unwrap_or_default())
    }

    /// Every type of the module, nested types right after their declaring type
    ///
    /// # Errors
    /// Returns an error if a type row is damaged or the nesting is cyclic
    pub fn all_types(&mut self) -> Result<Vec<TypeDefId>> {
        let mut pending: Vec<TypeDefId> = self.types()?.iter().rev().copied().collect();
        let mut types = Vec::new();
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                return Err(malformed_error!("Type {:?} is nested in itself", id));
            }
            types.push(id);
            pending.extend(self.nested_types(id)?.iter().rev().copied());
        }
        Ok(types)
    }

    /// Find a top level type by namespace and name
    ///
    /// # Errors
    /// Returns an error if a type row is damaged
    pub fn find_type(&mut self, namespace: &str, name: &str) -> Result<Option<TypeDefId>> {
        let types = self.types()?.to_vec();
        Ok(types.into_iter().find(|id| {
            let definition = self.graph.type_def(*id);
            definition.namespace == namespace && definition.name == name
        }))
    }

    /// Find a possibly nested type by the namespace of its outermost type and the names of
    /// the nesting chain, as returned by [`MetadataGraph::type_path`]
    ///
    /// # Errors
    /// Returns an error if a type row is damaged
    pub fn find_type_path(
        &mut self,
        namespace: &str,
        names: &[String],
    ) -> Result<Option<TypeDefId>> {
        let Some((outermost, nested)) = names.split_first() else {
            return Ok(None);
        };
        let Some(mut current) = self.find_type(namespace, outermost)? else {
            return Ok(None);
        };

        for name in nested {
            let children = self.nested_types(current)?.to_vec();
            match children.into_iter().find(|id| self.graph.type_def(*id).name == *name) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Find a type by its full name, nested types separated by `/`
    ///
    /// # Errors
    /// Returns an error if a type row is damaged
    pub fn find_type_by_full_name(&mut self, full_name: &str) -> Result<Option<TypeDefId>> {
        let mut names: Vec<String> = full_name.split('/').map(str::to_string).collect();
        let (namespace, outermost) = match names[0].rsplit_once('.') {
            Some((namespace, name)) => (namespace.to_string(), name.to_string()),
            None => (String::new(), names[0].clone()),
        };
        names[0] = outermost;
        self.find_type_path(&namespace, &names)
    }

    lazy_list!(
        /// Fields declared by `id`
        fields(TypeDefId) -> FieldId, type_def.fields, type_fields
    );
    lazy_list!(
        /// Methods declared by `id`
        methods(TypeDefId) -> MethodId, type_def.methods, type_methods
    );
    lazy_list!(
        /// Types nested in `id`
        nested_types(TypeDefId) -> TypeDefId, type_def.nested_types, type_nested_types
    );
    lazy_list!(
        /// Interfaces implemented by `id`
        interfaces(TypeDefId) -> InterfaceImplementation, type_def.interfaces, type_interfaces
    );
    lazy_list!(
        /// Explicit overrides (`MethodImpl` rows) declared by `id`
        overrides(TypeDefId) -> MethodOverride, type_def.overrides, type_overrides
    );
    lazy_list!(
        /// Generic parameters of the type `id`, by position
        type_generic_parameters(TypeDefId) -> GenericParamId,
        type_def.generic_parameters,
        type_generic_parameters
    );
    lazy_list!(
        /// Properties declared by `id`
        properties(TypeDefId) -> PropertyId, type_def.properties, type_properties
    );
    lazy_list!(
        /// Events declared by `id`
        events(TypeDefId) -> EventId, type_def.events, type_events
    );
    lazy_list!(
        /// Parameter rows of `id`, the return value included when it carries metadata
        parameters(MethodId) -> ParamId, method.parameters, method_parameters
    );
    lazy_list!(
        /// Generic parameters of the method `id`, by position
        method_generic_parameters(MethodId) -> GenericParamId,
        method.generic_parameters,
        method_generic_parameters
    );
    lazy_list!(
        /// Constraints of the generic parameter `id`
        constraints(GenericParamId) -> GenericParamConstraint,
        generic_parameter.constraints,
        generic_param_constraints
    );

    /// Generic parameters of a type or method definition
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] for reference owners, otherwise an error if
    /// the backing rows are damaged
    pub fn generic_parameters(&mut self, owner: GenericOwner) -> Result<&[GenericParamId]> {
        match owner {
            GenericOwner::Type(id) => self.type_generic_parameters(id),
            GenericOwner::Method(id) => self.method_generic_parameters(id),
            GenericOwner::TypeReference(id) => Ok(&self.graph.type_ref(id).generic_parameters),
            GenericOwner::MethodReference(id) => Ok(&self.graph.member_ref(id).generic_parameters),
        }
    }

    /// Returns `true` if the type `id` has nested types, without materializing them
    ///
    /// # Errors
    /// Returns an error if the `NestedClass` table is damaged
    pub fn has_nested_types(&mut self, id: TypeDefId) -> Result<bool> {
        if let Some(nested) = &self.graph.type_def(id).nested_types {
            return Ok(!nested.is_empty());
        }
        let token = self.graph.type_def(id).token;
        Ok(self
            .read(|ctx| ctx.in_escrow(EscrowKind::NestedClass, token))?
            .unwrap_or(false))
    }

    /// Returns `true` if the type `id` implements interfaces, without materializing them
    ///
    /// # Errors
    /// Returns an error if the `InterfaceImpl` table is damaged
    pub fn has_interfaces(&mut self, id: TypeDefId) -> Result<bool> {
        if let Some(interfaces) = &self.graph.type_def(id).interfaces {
            return Ok(!interfaces.is_empty());
        }
        let token = self.graph.type_def(id).token;
        Ok(self
            .read(|ctx| ctx.in_escrow(EscrowKind::InterfaceImpl, token))?
            .unwrap_or(false))
    }

    /// Returns `true` if the type `id` is generic, without materializing its parameters
    ///
    /// # Errors
    /// Returns an error if the `GenericParam` table is damaged
    pub fn has_generic_parameters(&mut self, id: TypeDefId) -> Result<bool> {
        if let Some(parameters) = &self.graph.type_def(id).generic_parameters {
            return Ok(!parameters.is_empty());
        }
        let token = self.graph.type_def(id).token;
        Ok(self
            .read(|ctx| ctx.in_escrow(EscrowKind::GenericParam, token))?
            .unwrap_or(false))
    }

    /// Custom attributes attached to `owner`
    ///
    /// # Errors
    /// Returns an error if an attribute row is damaged, unless the module was opened with
    /// [`ReaderOptions::skip_invalid_attributes`]
    pub fn custom_attributes(&mut self, owner: AttributeOwner) -> Result<&[CustomAttribute]> {
        self.ensure_custom_attributes(owner)?;
        Ok(self
            .graph
            .custom_attributes
            .get(&owner)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Custom attributes attached to `owner`, mutable
    ///
    /// # Errors
    /// See [`ModuleDefinition::custom_attributes`]
    pub fn custom_attributes_mut(
        &mut self,
        owner: AttributeOwner,
    ) -> Result<&mut Vec<CustomAttribute>> {
        self.ensure_custom_attributes(owner)?;
        Ok(self.graph.custom_attributes.entry(owner).or_default())
    }

    /// Attach a custom attribute to `owner`
    ///
    /// # Errors
    /// See [`ModuleDefinition::custom_attributes`]
    pub fn add_custom_attribute(
        &mut self,
        owner: AttributeOwner,
        attribute: CustomAttribute,
    ) -> Result<()> {
        self.custom_attributes_mut(owner)?.push(attribute);
        Ok(())
    }

    /// Returns `true` if `owner` carries custom attributes, without decoding them
    ///
    /// # Errors
    /// Returns an error if the `CustomAttribute` table is damaged
    pub fn has_custom_attributes(&mut self, owner: AttributeOwner) -> Result<bool> {
        if let Some(attributes) = self.graph.custom_attributes.get(&owner) {
            return Ok(!attributes.is_empty());
        }
        let listed = self.listed_owner_token(owner)?;
        Ok(self
            .read(|ctx| {
                let token = listed.unwrap_or_else(|| ctx.attribute_owner_token(owner));
                ctx.has_custom_attributes(owner, token)
            })?
            .unwrap_or(false))
    }

    fn ensure_custom_attributes(&mut self, owner: AttributeOwner) -> Result<()> {
        if !self.graph.custom_attributes.contains_key(&owner) {
            let listed = self.listed_owner_token(owner)?;
            self.read(|ctx| match listed {
                Some(token) => ctx.load_custom_attributes_at(owner, token),
                None => ctx.load_custom_attributes(owner),
            })?;
        }
        Ok(())
    }

    /// Read-time token of an owner kept in one of the module's lists, `None` for the rest
    ///
    /// Owners addressed by position in a lazy list get that list loaded first.
    fn listed_owner_token(&mut self, owner: AttributeOwner) -> Result<Option<Token>> {
        fn token_at<T>(list: &[T], index: usize, token: impl Fn(&T) -> Token) -> Option<Token> {
            Some(list.get(index).map(token).unwrap_or_default())
        }

        Ok(match owner {
            AttributeOwner::TypeSpecification(index) => {
                token_at(self.type_specifications()?.as_slice(), index, |spec| spec.token)
            }
            AttributeOwner::StandAloneSignature(index) => {
                let signatures = self.standalone_signatures()?.as_slice();
                token_at(signatures, index, |signature| signature.token)
            }
            AttributeOwner::File(index) => {
                token_at(self.files()?.as_slice(), index, |file| file.token)
            }
            AttributeOwner::ExportedType(index) => {
                token_at(self.exported_types()?.as_slice(), index, |exported| exported.token)
            }
            AttributeOwner::ManifestResource(index) => {
                token_at(self.resources()?.as_slice(), index, |resource| resource.token)
            }
            AttributeOwner::InterfaceImplementation(id, _) => {
                self.interfaces(id)?;
                None
            }
            AttributeOwner::GenericParameterConstraint(id, _) => {
                self.constraints(id)?;
                None
            }
            AttributeOwner::SecurityDeclaration(owner, _) => {
                self.ensure_security_declarations(owner)?;
                None
            }
            _ => None,
        })
    }

    fn load_listed_attributes(&mut self) -> Result<()> {
        let counts: [(usize, fn(usize) -> AttributeOwner); 5] = [
            (self.type_specifications()?.len(), AttributeOwner::TypeSpecification),
            (self.standalone_signatures()?.len(), AttributeOwner::StandAloneSignature),
            (self.files()?.len(), AttributeOwner::File),
            (self.exported_types()?.len(), AttributeOwner::ExportedType),
            (self.resources()?.len(), AttributeOwner::ManifestResource),
        ];
        for (count, owner) in counts {
            for index in 0..count {
                self.ensure_custom_attributes(owner(index))?;
            }
        }
        Ok(())
    }

    /// Security declarations attached to `owner`
    ///
    /// # Errors
    /// Returns an error if a `DeclSecurity` row is damaged
    pub fn security_declarations(
        &mut self,
        owner: SecurityOwner,
    ) -> Result<&[SecurityDeclaration]> {
        self.ensure_security_declarations(owner)?;
        Ok(self
            .graph
            .security_declarations
            .get(&owner)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Attach a security declaration to `owner`
    ///
    /// # Errors
    /// See [`ModuleDefinition::security_declarations`]
    pub fn add_security_declaration(
        &mut self,
        owner: SecurityOwner,
        declaration: SecurityDeclaration,
    ) -> Result<()> {
        self.ensure_security_declarations(owner)?;
        self.graph
            .security_declarations
            .entry(owner)
            .or_default()
            .push(declaration);
        Ok(())
    }

    /// Returns `true` if `owner` carries security declarations
    ///
    /// # Errors
    /// Returns an error if the `DeclSecurity` table is damaged
    pub fn has_security_declarations(&mut self, owner: SecurityOwner) -> Result<bool> {
        if let Some(declarations) = self.graph.security_declarations.get(&owner) {
            return Ok(!declarations.is_empty());
        }
        Ok(self.read(|ctx| ctx.has_security_declarations(owner))?.unwrap_or(false))
    }

    fn ensure_security_declarations(&mut self, owner: SecurityOwner) -> Result<()> {
        if !self.graph.security_declarations.contains_key(&owner) {
            self.read(|ctx| ctx.load_security_declarations(owner))?;
        }
        Ok(())
    }

    fn load_references(&mut self) -> Result<()> {
        if !self.references_loaded {
            self.read(|ctx| {
                ctx.assembly_refs()?;
                ctx.module_refs()
            })?;
            self.references_loaded = true;
        }
        Ok(())
    }

    /// Every assembly reference: the rows of the image plus the ones added since
    ///
    /// # Errors
    /// Returns an error if an `AssemblyRef` row is damaged
    pub fn assembly_references(&mut self) -> Result<Vec<AssemblyRefId>> {
        self.load_references()?;
        Ok((0..self.graph.assembly_ref_count())
            .map(AssemblyRefId::from_index)
            .collect())
    }

    /// Every module reference: the rows of the image plus the ones added since
    ///
    /// # Errors
    /// Returns an error if a `ModuleRef` row is damaged
    pub fn module_references(&mut self) -> Result<Vec<ModuleRefId>> {
        self.load_references()?;
        Ok((0..self.graph.module_ref_count())
            .map(ModuleRefId::from_index)
            .collect())
    }

    /// Types exported or forwarded by the assembly
    ///
    /// # Errors
    /// Returns an error if an `ExportedType` row is damaged
    pub fn exported_types(&mut self) -> Result<&mut Vec<ExportedType>> {
        if self.exported_types.is_none() {
            let exported = self.read(|ctx| ctx.exported_types())?.unwrap_or_default();
            self.exported_types = Some(exported);
        }
        Ok(self.exported_types.get_or_insert_with(Vec::new))
    }

    /// Manifest resources
    ///
    /// # Errors
    /// Returns an error if a `ManifestResource` row is damaged
    pub fn resources(&mut self) -> Result<&mut Vec<ManifestResource>> {
        if self.resources.is_none() {
            let resources = self.read(|ctx| ctx.resources())?.unwrap_or_default();
            self.resources = Some(resources);
        }
        Ok(self.resources.get_or_insert_with(Vec::new))
    }

    /// Files of a multi-file assembly
    ///
    /// # Errors
    /// Returns an error if a `File` row is damaged
    pub fn files(&mut self) -> Result<&mut Vec<FileReference>> {
        if self.files.is_none() {
            let files = self.read(|ctx| ctx.files())?.unwrap_or_default();
            self.files = Some(files);
        }
        Ok(self.files.get_or_insert_with(Vec::new))
    }

    /// Signatures referenced from method bodies (locals and indirect call sites)
    ///
    /// # Errors
    /// Returns an error if a `StandAloneSig` row is damaged
    pub fn standalone_signatures(&mut self) -> Result<&mut Vec<StandAloneSignature>> {
        if self.standalone_signatures.is_none() {
            let signatures = self.read(|ctx| ctx.standalone_signatures())?.unwrap_or_default();
            self.standalone_signatures = Some(signatures);
        }
        Ok(self.standalone_signatures.get_or_insert_with(Vec::new))
    }

    /// Rows of the `TypeSpec` table
    ///
    /// Constructed types are stored inline in the signatures that use them; this list only
    /// exists to address the rows themselves, as attribute owners or to keep unused rows.
    ///
    /// # Errors
    /// Returns an error if a `TypeSpec` row is damaged
    pub fn type_specifications(&mut self) -> Result<&mut Vec<TypeSpecification>> {
        if self.type_specifications.is_none() {
            let specifications = self.read(|ctx| ctx.type_specifications())?.unwrap_or_default();
            self.type_specifications = Some(specifications);
        }
        Ok(self.type_specifications.get_or_insert_with(Vec::new))
    }

    /// Add a top level type
    ///
    /// # Errors
    /// Returns an error if the existing type list cannot be read
    pub fn add_type(&mut self, definition: TypeDefinition) -> Result<TypeDefId> {
        self.types()?;
        let id = self.graph.push_type_def(definition);
        self.graph.type_def_mut(id).declaring_type = None;
        self.types.get_or_insert_with(Vec::new).push(id);
        Ok(id)
    }

    /// Add a type nested in `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing nested types cannot be read
    pub fn add_nested_type(
        &mut self,
        declaring: TypeDefId,
        definition: TypeDefinition,
    ) -> Result<TypeDefId> {
        self.nested_types(declaring)?;
        let id = self.graph.push_type_def(definition);
        self.graph.type_def_mut(id).declaring_type = Some(declaring);
        self.graph
            .type_def_mut(declaring)
            .nested_types
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Add a field to `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing fields cannot be read
    pub fn add_field(&mut self, declaring: TypeDefId, field: FieldDefinition) -> Result<FieldId> {
        self.fields(declaring)?;
        let id = self.graph.push_field(field);
        self.graph.field_mut(id).declaring_type = Some(declaring);
        self.graph
            .type_def_mut(declaring)
            .fields
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Add a method to `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing methods cannot be read
    pub fn add_method(
        &mut self,
        declaring: TypeDefId,
        method: MethodDefinition,
    ) -> Result<MethodId> {
        self.methods(declaring)?;
        let id = self.graph.push_method(method);
        self.graph.method_mut(id).declaring_type = Some(declaring);
        self.graph
            .type_def_mut(declaring)
            .methods
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Add a parameter row to `method`
    ///
    /// # Errors
    /// Returns an error if the existing parameters cannot be read
    pub fn add_parameter(
        &mut self,
        method: MethodId,
        parameter: ParameterDefinition,
    ) -> Result<ParamId> {
        self.parameters(method)?;
        let id = self.graph.push_parameter(parameter);
        self.graph.parameter_mut(id).method = Some(method);
        self.graph
            .method_mut(method)
            .parameters
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Add a property to `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing properties cannot be read
    pub fn add_property(
        &mut self,
        declaring: TypeDefId,
        property: PropertyDefinition,
    ) -> Result<PropertyId> {
        self.properties(declaring)?;
        let id = self.graph.push_property(property);
        self.graph.property_mut(id).declaring_type = Some(declaring);
        self.graph
            .type_def_mut(declaring)
            .properties
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Add an event to `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing events cannot be read
    pub fn add_event(&mut self, declaring: TypeDefId, event: EventDefinition) -> Result<EventId> {
        self.events(declaring)?;
        let id = self.graph.push_event(event);
        self.graph.event_mut(id).declaring_type = Some(declaring);
        self.graph
            .type_def_mut(declaring)
            .events
            .get_or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    /// Declare that `declaring` implements `interface`
    ///
    /// # Errors
    /// Returns an error if the existing interfaces cannot be read
    pub fn add_interface(&mut self, declaring: TypeDefId, interface: TypeSig) -> Result<()> {
        self.interfaces(declaring)?;
        self.graph
            .type_def_mut(declaring)
            .interfaces
            .get_or_insert_with(Vec::new)
            .push(InterfaceImplementation {
                token: Token::default(),
                interface,
            });
        Ok(())
    }

    /// Declare an explicit override on `declaring`
    ///
    /// # Errors
    /// Returns an error if the existing overrides cannot be read
    pub fn add_override(
        &mut self,
        declaring: TypeDefId,
        method_override: MethodOverride,
    ) -> Result<()> {
        self.overrides(declaring)?;
        self.graph
            .type_def_mut(declaring)
            .overrides
            .get_or_insert_with(Vec::new)
            .push(method_override);
        Ok(())
    }

    /// Append a generic parameter to a type or method definition
    ///
    /// The parameter takes the next free position of its owner.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] for reference owners or an owner with
    /// `u16::MAX` parameters
    pub fn add_generic_parameter(
        &mut self,
        owner: GenericOwner,
        name: &str,
        flags: GenericParamAttributes,
    ) -> Result<GenericParamId> {
        let position = match owner {
            GenericOwner::Type(_) | GenericOwner::Method(_) => {
                self.generic_parameters(owner)?.len()
            }
            GenericOwner::TypeReference(_) | GenericOwner::MethodReference(_) => {
                return Err(invalid_operation!(
                    "Generic parameters of references are synthesized by the importer"
                ))
            }
        };
        let Ok(number) = u16::try_from(position) else {
            return Err(invalid_operation!("Too many generic parameters on {:?}", owner));
        };

        let mut parameter =
            GenericParameter::new(Token::default(), number, flags, name.to_string(), owner);
        parameter.constraints = Some(Vec::new());
        let id = self.graph.push_generic_parameter(parameter);

        let list = match owner {
            GenericOwner::Type(ty) => &mut self.graph.type_def_mut(ty).generic_parameters,
            GenericOwner::Method(method) => &mut self.graph.method_mut(method).generic_parameters,
            GenericOwner::TypeReference(_) | GenericOwner::MethodReference(_) => {
                return Err(invalid_operation!("Unreachable generic owner"))
            }
        };
        list.get_or_insert_with(Vec::new).push(id);
        Ok(id)
    }

    /// Constrain the generic parameter `id` to `constraint`
    ///
    /// # Errors
    /// Returns an error if the existing constraints cannot be read
    pub fn add_generic_constraint(
        &mut self,
        id: GenericParamId,
        constraint: TypeSig,
    ) -> Result<()> {
        self.constraints(id)?;
        self.graph
            .generic_parameter_mut(id)
            .constraints
            .get_or_insert_with(Vec::new)
            .push(GenericParamConstraint {
                token: Token::default(),
                constraint_type: constraint,
            });
        Ok(())
    }

    /// Add a type reference; the builder merges it with structurally equal ones
    pub fn add_type_reference(&mut self, reference: TypeReference) -> TypeRefId {
        self.graph.push_type_ref(reference)
    }

    /// Add a member reference
    pub fn add_member_reference(&mut self, reference: MemberReference) -> MemberRefId {
        self.graph.push_member_ref(reference)
    }

    /// Add a generic method instantiation
    pub fn add_method_specification(&mut self, specification: MethodSpecification) -> MethodSpecId {
        self.graph.push_method_spec(specification)
    }

    /// Add an assembly reference, returning an existing one with the same identity
    ///
    /// # Errors
    /// Returns an error if the `AssemblyRef` table is damaged
    pub fn add_assembly_reference(
        &mut self,
        reference: AssemblyNameReference,
    ) -> Result<AssemblyRefId> {
        for id in self.assembly_references()? {
            if self.graph.assembly_ref(id).same_identity(&reference) {
                return Ok(id);
            }
        }
        Ok(self.graph.push_assembly_ref(reference))
    }

    /// Add a module reference, returning an existing one with the same name
    ///
    /// # Errors
    /// Returns an error if the `ModuleRef` table is damaged
    pub fn add_module_reference(&mut self, name: &str) -> Result<ModuleRefId> {
        for id in self.module_references()? {
            if self.graph.module_ref(id).name == name {
                return Ok(id);
            }
        }
        Ok(self.graph.push_module_ref(ModuleReference {
            token: Token::default(),
            name: name.to_string(),
        }))
    }
}

/// A stable version id for modules created in memory
fn mvid_from_name(name: &str) -> uguid::Guid {
    let digest = Sha1::digest(name.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    // Name based (version 5) guid
    bytes[7] = (bytes[7] & 0x0F) | 0x50;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    uguid::Guid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        model::{FieldAttributes, MethodAttributes, ParamAttributes, ResolutionScope, TypeHandle},
        signatures::MethodSig,
    };

    #[test]
    fn new_module() {
        let mut module = ModuleDefinition::new("Empty.dll");
        assert!(!module.is_backed());
        assert_eq!(module.runtime_version, DEFAULT_RUNTIME_VERSION);
        assert_eq!(module.mvid, ModuleDefinition::new("Empty.dll").mvid);
        assert_ne!(module.mvid, ModuleDefinition::new("Other.dll").mvid);

        let types = module.types().unwrap().to_vec();
        assert_eq!(types.len(), 1);
        assert!(module.graph().type_def(types[0]).is_module_type());
        assert_eq!(module.lookup_token(Token::new(0x0200_0001)).unwrap(), None);
    }

    #[test]
    fn add_members() {
        let mut module = ModuleDefinition::new("Members.dll");
        let object = module.add_type_reference(TypeReference::new(
            ResolutionScope::Module,
            "System",
            "Object",
        ));
        let outer = module
            .add_type(TypeDefinition::new(
                "N",
                "Outer",
                TypeAttributes::PUBLIC,
                Some(TypeSig::Class(TypeHandle::Reference(object))),
            ))
            .unwrap();
        let inner = module
            .add_nested_type(
                outer,
                TypeDefinition::new("", "Inner", TypeAttributes::NESTED_PUBLIC, None),
            )
            .unwrap();

        let field = module
            .add_field(outer, FieldDefinition::new("count", FieldAttributes::PRIVATE, TypeSig::I4))
            .unwrap();
        let method = module
            .add_method(
                inner,
                MethodDefinition::new(
                    "Run",
                    MethodAttributes::PUBLIC,
                    MethodSig::new_instance(TypeSig::Void, vec![TypeSig::String]),
                ),
            )
            .unwrap();
        module
            .add_parameter(method, ParameterDefinition::new("value", 1, ParamAttributes::empty()))
            .unwrap();

        assert_eq!(module.fields(outer).unwrap(), &[field]);
        assert_eq!(module.graph().field(field).declaring_type, Some(outer));
        assert_eq!(module.graph().method(method).declaring_type, Some(inner));
        assert_eq!(module.parameters(method).unwrap().len(), 1);
        assert!(module.has_nested_types(outer).unwrap());
        assert!(!module.has_nested_types(inner).unwrap());

        assert_eq!(module.find_type_by_full_name("N.Outer/Inner").unwrap(), Some(inner));
        assert_eq!(module.find_type("N", "Inner").unwrap(), None);
        assert_eq!(module.all_types().unwrap().len(), 3);
    }

    #[test]
    fn generic_positions() {
        let mut module = ModuleDefinition::new("Generic.dll");
        let ty = module
            .add_type(TypeDefinition::new("", "Pair`2", TypeAttributes::PUBLIC, None))
            .unwrap();
        let none = GenericParamAttributes::empty();
        let first = module
            .add_generic_parameter(GenericOwner::Type(ty), "TFirst", none)
            .unwrap();
        let second = module
            .add_generic_parameter(GenericOwner::Type(ty), "TSecond", none)
            .unwrap();

        assert_eq!(module.graph().generic_parameter(first).number, 0);
        assert_eq!(module.graph().generic_parameter(second).number, 1);
        assert!(module.has_generic_parameters(ty).unwrap());

        let reference =
            module.add_type_reference(TypeReference::new(ResolutionScope::Module, "", "Other"));
        assert!(module
            .add_generic_parameter(GenericOwner::TypeReference(reference), "T", none)
            .is_err());
    }

    #[test]
    fn reference_identity() {
        let mut module = ModuleDefinition::new("Refs.dll");
        let version = crate::metadata::model::AssemblyVersion::new(4, 0, 0, 0);
        let first = module
            .add_assembly_reference(AssemblyNameReference::new("mscorlib", version))
            .unwrap();
        let second = module
            .add_assembly_reference(AssemblyNameReference::new("MSCORLIB", version))
            .unwrap();
        assert_eq!(first, second);

        let native = module.add_module_reference("kernel32.dll").unwrap();
        assert_eq!(module.add_module_reference("kernel32.dll").unwrap(), native);
        assert_eq!(module.module_references().unwrap().len(), 1);
    }
}
