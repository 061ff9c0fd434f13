use std::collections::HashMap;

use crate::metadata::{
    customattributes::CustomAttribute,
    model::{
        AssemblyNameReference, AssemblyRefId, AttributeOwner, EventDefinition, EventId,
        FieldDefinition, FieldId, GenericParamId, GenericParameter, MemberRefId,
        MemberReference, MethodDefinition, MethodId, MethodSpecId, MethodSpecification,
        ModuleRefId, ModuleReference, ParamId, ParameterDefinition, PropertyDefinition,
        PropertyId, ResolutionScope, SecurityOwner, TypeDefId, TypeDefinition, TypeHandle,
        TypeRefId, TypeReference,
    },
    security::SecurityDeclaration,
};
use crate::Result;

macro_rules! arena {
    (
        $field:ident, $id:ident, $entity:ty,
        $get:ident, $get_mut:ident, $push:ident, $count:ident
    ) => {
        /// Entity behind `id`
        ///
        /// # Panics
        /// Panics if `id` was handed out by another module
        #[must_use]
        pub fn $get(&self, id: $id) -> &$entity {
            &self.$field[id.index()]
        }

        /// Mutable entity behind `id`
        ///
        /// # Panics
        /// Panics if `id` was handed out by another module
        pub fn $get_mut(&mut self, id: $id) -> &mut $entity {
            &mut self.$field[id.index()]
        }

        pub(crate) fn $push(&mut self, entity: $entity) -> $id {
            self.$field.push(entity);
            $id::from_index(self.$field.len() - 1)
        }

        /// Number of entities of this kind materialized or created so far
        #[must_use]
        pub fn $count(&self) -> usize {
            self.$field.len()
        }
    };
}

/// Arena storage of every entity of a module
///
/// Entities are only ever appended; an id stays valid for the lifetime of the module.
#[derive(Debug, Default)]
pub struct MetadataGraph {
    types: Vec<TypeDefinition>,
    type_refs: Vec<TypeReference>,
    fields: Vec<FieldDefinition>,
    methods: Vec<MethodDefinition>,
    params: Vec<ParameterDefinition>,
    properties: Vec<PropertyDefinition>,
    events: Vec<EventDefinition>,
    member_refs: Vec<MemberReference>,
    method_specs: Vec<MethodSpecification>,
    generic_params: Vec<GenericParameter>,
    assembly_refs: Vec<AssemblyNameReference>,
    module_refs: Vec<ModuleReference>,
    pub(crate) custom_attributes: HashMap<AttributeOwner, Vec<CustomAttribute>>,
    pub(crate) security_declarations: HashMap<SecurityOwner, Vec<SecurityDeclaration>>,
}

impl MetadataGraph {
    arena!(
        types, TypeDefId, TypeDefinition,
        type_def, type_def_mut, push_type_def, type_def_count
    );
    arena!(
        type_refs, TypeRefId, TypeReference,
        type_ref, type_ref_mut, push_type_ref, type_ref_count
    );
    arena!(
        fields, FieldId, FieldDefinition,
        field, field_mut, push_field, field_count
    );
    arena!(
        methods, MethodId, MethodDefinition,
        method, method_mut, push_method, method_count
    );
    arena!(
        params, ParamId, ParameterDefinition,
        parameter, parameter_mut, push_parameter, parameter_count
    );
    arena!(
        properties, PropertyId, PropertyDefinition,
        property, property_mut, push_property, property_count
    );
    arena!(
        events, EventId, EventDefinition,
        event, event_mut, push_event, event_count
    );
    arena!(
        member_refs, MemberRefId, MemberReference,
        member_ref, member_ref_mut, push_member_ref, member_ref_count
    );
    arena!(
        method_specs, MethodSpecId, MethodSpecification,
        method_spec, method_spec_mut, push_method_spec, method_spec_count
    );
    arena!(
        generic_params, GenericParamId, GenericParameter,
        generic_parameter, generic_parameter_mut, push_generic_parameter, generic_parameter_count
    );
    arena!(
        assembly_refs, AssemblyRefId, AssemblyNameReference,
        assembly_ref, assembly_ref_mut, push_assembly_ref, assembly_ref_count
    );
    arena!(
        module_refs, ModuleRefId, ModuleReference,
        module_ref, module_ref_mut, push_module_ref, module_ref_count
    );

    /// `id` followed by the types declaring it, outermost last
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the declaring types form a cycle or leave the graph
    pub fn type_def_chain(&self, id: TypeDefId) -> Result<Vec<TypeDefId>> {
        let mut chain = vec![id];
        while let Some(declaring) = self.type_def(chain[chain.len() - 1]).declaring_type {
            if declaring.index() >= self.types.len() || chain.contains(&declaring) {
                return Err(malformed_error!("Type {:?} is nested in itself", declaring));
            }
            chain.push(declaring);
        }
        Ok(chain)
    }

    /// `id` followed by the type references it is scoped to, outermost last
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the resolution scopes form a cycle or leave the
    /// graph
    pub fn type_ref_chain(&self, id: TypeRefId) -> Result<Vec<TypeRefId>> {
        let mut chain = vec![id];
        while let ResolutionScope::TypeRef(declaring) = self.type_ref(chain[chain.len() - 1]).scope
        {
            if declaring.index() >= self.type_refs.len() || chain.contains(&declaring) {
                return Err(malformed_error!(
                    "Type reference {:?} is scoped to itself",
                    declaring
                ));
            }
            chain.push(declaring);
        }
        Ok(chain)
    }

    /// Full name of a type definition, nested types joined with `/`
    #[must_use]
    pub fn type_def_full_name(&self, id: TypeDefId) -> String {
        self.type_full_name(TypeHandle::Definition(id))
    }

    /// Full name of a type reference, nested types joined with `/`
    #[must_use]
    pub fn type_ref_full_name(&self, id: TypeRefId) -> String {
        self.type_full_name(TypeHandle::Reference(id))
    }

    /// Full name of either kind of type
    ///
    /// A type caught in a nesting cycle is named by itself alone.
    #[must_use]
    pub fn type_full_name(&self, handle: TypeHandle) -> String {
        match self.type_path(handle) {
            Ok((namespace, names)) => join_name(&namespace, &names.join("/")),
            Err(_) => match handle {
                TypeHandle::Definition(id) => self.type_def(id).name.clone(),
                TypeHandle::Reference(id) => self.type_ref(id).name.clone(),
            },
        }
    }

    /// `(namespace, name)` of the outermost type plus the names of the nesting chain
    ///
    /// For `N.Outer/Inner` this returns `("N", ["Outer", "Inner"])`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the nesting chain is cyclic
    pub fn type_path(&self, handle: TypeHandle) -> Result<(String, Vec<String>)> {
        let (namespace, mut names) = match handle {
            TypeHandle::Definition(id) => {
                let chain = self.type_def_chain(id)?;
                let outermost = self.type_def(chain[chain.len() - 1]);
                let names = chain
                    .iter()
                    .map(|id| self.type_def(*id).name.clone())
                    .collect::<Vec<_>>();
                (outermost.namespace.clone(), names)
            }
            TypeHandle::Reference(id) => {
                let chain = self.type_ref_chain(id)?;
                let outermost = self.type_ref(chain[chain.len() - 1]);
                let names = chain
                    .iter()
                    .map(|id| self.type_ref(*id).name.clone())
                    .collect::<Vec<_>>();
                (outermost.namespace.clone(), names)
            }
        };

        names.reverse();
        Ok((namespace, names))
    }

    /// Returns `true` if `handle` names `namespace.name`
    #[must_use]
    pub fn is_type(&self, handle: TypeHandle, namespace: &str, name: &str) -> bool {
        match handle {
            TypeHandle::Definition(id) => {
                let definition = self.type_def(id);
                definition.declaring_type.is_none()
                    && definition.namespace == namespace
                    && definition.name == name
            }
            TypeHandle::Reference(id) => {
                let reference = self.type_ref(id);
                !matches!(reference.scope, ResolutionScope::TypeRef(_))
                    && reference.namespace == namespace
                    && reference.name == name
            }
        }
    }
}

fn join_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}
