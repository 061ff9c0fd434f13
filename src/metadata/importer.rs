//! Cross-module imports.
//!
//! Ids only mean something inside the graph that handed them out. To use a type or member of
//! another module, the importer re-creates it in the target as a reference: a `TypeRef`
//! chain scoped to the source assembly, a `MemberRef` with a re-encoded signature, or a
//! `MethodSpec` over an imported method. Things the target defines itself come back as
//! definitions.
//!
//! Signatures of definitions carry placeholders bound to the source's generic parameters.
//! Before such a signature is imported, the owners are pushed onto a [`GenericContext`] with
//! the parameters synthesized on the target side, and every placeholder is rebound by the
//! full name of its owner.
//!
//! Imported references are not interned. Importing the same thing twice creates two equal
//! references, the builder folds them into one row.

use std::collections::HashMap;

use crate::{
    metadata::{
        generics::GenericContext,
        model::{
            AssemblyNameReference, AssemblyRefId, FieldHandle, GenericOwner, GenericParamId,
            GenericParameter, MemberRefId, MemberRefParent, MemberReference, MethodHandle,
            MethodId, MethodSpecification, ResolutionScope, TypeDefId, TypeHandle, TypeRefId,
            TypeReference,
        },
        module::ModuleDefinition,
        signatures::{ArrayShape, GenericParamSig, MemberSig, MethodSig, TypeSig},
        token::Token,
    },
    Result,
};

/// Imports types and members of `source` into `target`
///
/// One importer remembers the types it imported, so a signature mentioning the same type
/// many times yields one reference.
pub struct Importer<'a> {
    target: &'a mut ModuleDefinition,
    source: &'a mut ModuleDefinition,
    context: GenericContext,
    types: HashMap<TypeHandle, TypeHandle>,
}

impl<'a> Importer<'a> {
    /// Create an importer from `source` into `target`
    pub fn new(target: &'a mut ModuleDefinition, source: &'a mut ModuleDefinition) -> Self {
        Importer {
            target,
            source,
            context: GenericContext::new(),
            types: HashMap::new(),
        }
    }

    /// The generic context used to rebind placeholders
    ///
    /// Callers importing a signature that mentions placeholders of an owner the importer does
    /// not know about push that owner here first.
    pub fn context_mut(&mut self) -> &mut GenericContext {
        &mut self.context
    }

    /// Import an assembly reference, returning the target's existing reference if there is one
    ///
    /// # Errors
    /// Returns an error if the target's `AssemblyRef` table is damaged
    pub fn import_assembly(&mut self, reference: &AssemblyNameReference) -> Result<AssemblyRefId> {
        let mut reference = reference.clone();
        reference.token = Token::default();
        self.target.add_assembly_reference(reference)
    }

    /// Scope under which the source's own definitions are visible from the target
    fn source_scope(&mut self) -> Result<ResolutionScope> {
        match &self.source.assembly {
            Some(assembly) => {
                let same = self
                    .target
                    .assembly
                    .as_ref()
                    .is_some_and(|own| own.name.eq_ignore_ascii_case(&assembly.name));
                if same {
                    Ok(ResolutionScope::Module)
                } else {
                    let reference = assembly.to_reference();
                    Ok(ResolutionScope::AssemblyRef(self.target.add_assembly_reference(reference)?))
                }
            }
            None if self.source.name.eq_ignore_ascii_case(&self.target.name) => {
                Ok(ResolutionScope::Module)
            }
            None => {
                let name = self.source.name.clone();
                Ok(ResolutionScope::ModuleRef(self.target.add_module_reference(&name)?))
            }
        }
    }

    /// Map a scope of the source graph into the target graph
    fn import_scope(&mut self, scope: ResolutionScope) -> Result<ResolutionScope> {
        match scope {
            ResolutionScope::Module | ResolutionScope::None => self.source_scope(),
            ResolutionScope::ModuleRef(id) => {
                let name = self.source.graph().module_ref(id).name.clone();
                if name.eq_ignore_ascii_case(&self.target.name) {
                    Ok(ResolutionScope::Module)
                } else {
                    Ok(ResolutionScope::ModuleRef(self.target.add_module_reference(&name)?))
                }
            }
            ResolutionScope::AssemblyRef(id) => {
                let reference = self.source.graph().assembly_ref(id).clone();
                let own = self
                    .target
                    .assembly
                    .as_ref()
                    .is_some_and(|own| own.name.eq_ignore_ascii_case(&reference.name));
                if own {
                    Ok(ResolutionScope::Module)
                } else {
                    Ok(ResolutionScope::AssemblyRef(self.import_assembly(&reference)?))
                }
            }
            ResolutionScope::TypeRef(_) => {
                Err(invalid_operation!("Nested scopes are imported with their type"))
            }
        }
    }

    /// Create the `TypeRef` chain for `namespace` plus nesting chain `names` under `scope`
    ///
    /// A chain scoped to the target itself resolves to the target's definition when there is
    /// one.
    fn reference_path(
        &mut self,
        scope: ResolutionScope,
        namespace: &str,
        names: &[String],
    ) -> Result<TypeHandle> {
        if scope == ResolutionScope::Module {
            if let Some(id) = self.target.find_type_path(namespace, names)? {
                return Ok(TypeHandle::Definition(id));
            }
        }

        let mut current: Option<TypeRefId> = None;
        for name in names {
            let reference = match current {
                None => TypeReference::new(scope, namespace, name),
                Some(declaring) => {
                    TypeReference::new(ResolutionScope::TypeRef(declaring), "", name)
                }
            };
            current = Some(self.target.add_type_reference(reference));
        }

        match current {
            Some(id) => Ok(TypeHandle::Reference(id)),
            None => Err(invalid_operation!("Cannot import a type without a name")),
        }
    }

    /// Import a type of the source module
    ///
    /// Generic definitions get their parameters mirrored onto the new reference so members
    /// imported later can rebind their placeholders.
    ///
    /// # Errors
    /// Returns an error if either module has damaged metadata
    pub fn import_type(&mut self, handle: TypeHandle) -> Result<TypeHandle> {
        if let Some(imported) = self.types.get(&handle) {
            return Ok(*imported);
        }

        let (namespace, names) = self.source.graph().type_path(handle)?;
        let imported = match handle {
            TypeHandle::Definition(_) => {
                let scope = self.source_scope()?;
                self.reference_path(scope, &namespace, &names)?
            }
            TypeHandle::Reference(id) => {
                let chain = self.source.graph().type_ref_chain(id)?;
                let scope = self.source.graph().type_ref(chain[chain.len() - 1]).scope;
                let scope = self.import_scope(scope)?;
                self.reference_path(scope, &namespace, &names)?
            }
        };

        if let (TypeHandle::Definition(source), TypeHandle::Reference(target)) = (handle, imported)
        {
            let parameters = self.source.type_generic_parameters(source)?.to_vec();
            if !parameters.is_empty() {
                let owner = GenericOwner::TypeReference(target);
                let mirrored = self.mirror_parameters(&parameters, owner);
                self.target.graph_mut().type_ref_mut(target).generic_parameters = mirrored;
            }
        }

        tracing::trace!(
            source = %self.source.graph().type_full_name(handle),
            ?imported,
            "imported type"
        );
        self.types.insert(handle, imported);
        Ok(imported)
    }

    /// Copy the source parameters `parameters` onto the reference `owner`
    fn mirror_parameters(
        &mut self,
        parameters: &[GenericParamId],
        owner: GenericOwner,
    ) -> Vec<GenericParamId> {
        parameters
            .iter()
            .map(|id| {
                let source = self.source.graph().generic_parameter(*id);
                let mut mirrored = GenericParameter::new(
                    Token::default(),
                    source.number,
                    source.flags,
                    source.name.clone(),
                    owner,
                );
                mirrored.constraints = Some(Vec::new());
                self.target.graph_mut().push_generic_parameter(mirrored)
            })
            .collect()
    }

    /// Import a type signature, rebinding placeholders through the generic context
    ///
    /// # Errors
    /// Returns [`crate::Error::Resolution`] for a bound placeholder whose owner is not on the
    /// context, otherwise an error if either module has damaged metadata
    pub fn import_type_sig(&mut self, signature: &TypeSig) -> Result<TypeSig> {
        Ok(match signature {
            TypeSig::Class(handle) => TypeSig::Class(self.import_type(*handle)?),
            TypeSig::ValueType(handle) => TypeSig::ValueType(self.import_type(*handle)?),
            TypeSig::Ptr(inner) => TypeSig::Ptr(Box::new(self.import_type_sig(inner)?)),
            TypeSig::ByRef(inner) => TypeSig::ByRef(Box::new(self.import_type_sig(inner)?)),
            TypeSig::Pinned(inner) => TypeSig::Pinned(Box::new(self.import_type_sig(inner)?)),
            TypeSig::SzArray(inner) => TypeSig::SzArray(Box::new(self.import_type_sig(inner)?)),
            TypeSig::Sentinel(inner) => TypeSig::Sentinel(Box::new(self.import_type_sig(inner)?)),
            TypeSig::Array(shape) => TypeSig::Array(ArrayShape {
                element: Box::new(self.import_type_sig(&shape.element)?),
                rank: shape.rank,
                sizes: shape.sizes.clone(),
                lower_bounds: shape.lower_bounds.clone(),
            }),
            TypeSig::GenericInst { generic, arguments } => TypeSig::GenericInst {
                generic: Box::new(self.import_type_sig(generic)?),
                arguments: arguments
                    .iter()
                    .map(|argument| self.import_type_sig(argument))
                    .collect::<Result<_>>()?,
            },
            TypeSig::Var(placeholder) => TypeSig::Var(self.rebind(*placeholder, false)?),
            TypeSig::MVar(placeholder) => TypeSig::MVar(self.rebind(*placeholder, true)?),
            TypeSig::FnPtr(method) => TypeSig::FnPtr(Box::new(self.import_method_sig(method)?)),
            TypeSig::RequiredModifier { modifier, element } => TypeSig::RequiredModifier {
                modifier: self.import_type(*modifier)?,
                element: Box::new(self.import_type_sig(element)?),
            },
            TypeSig::OptionalModifier { modifier, element } => TypeSig::OptionalModifier {
                modifier: self.import_type(*modifier)?,
                element: Box::new(self.import_type_sig(element)?),
            },
            primitive => primitive.clone(),
        })
    }

    /// Import a method signature
    ///
    /// # Errors
    /// See [`Importer::import_type_sig`]
    pub fn import_method_sig(&mut self, signature: &MethodSig) -> Result<MethodSig> {
        Ok(MethodSig {
            return_type: self.import_type_sig(&signature.return_type)?,
            params: signature
                .params
                .iter()
                .map(|param| self.import_type_sig(param))
                .collect::<Result<_>>()?,
            ..signature.clone()
        })
    }

    /// Bind a placeholder of the source graph against the target side of its owner
    fn rebind(&mut self, placeholder: GenericParamSig, method: bool) -> Result<GenericParamSig> {
        let Some(parameter) = placeholder.owner else {
            return Ok(placeholder);
        };

        let owner = self.source.graph().generic_parameter(parameter).owner;
        let owner_name = self.generic_owner_name(owner);
        let bound = if method {
            self.context.method_parameter(&owner_name, placeholder.position)?
        } else {
            self.context.type_parameter(&owner_name, placeholder.position)?
        };
        Ok(GenericParamSig {
            position: placeholder.position,
            owner: Some(bound),
        })
    }

    fn generic_owner_name(&self, owner: GenericOwner) -> String {
        let graph = self.source.graph();
        match owner {
            GenericOwner::Type(id) => graph.type_def_full_name(id),
            GenericOwner::TypeReference(id) => graph.type_ref_full_name(id),
            GenericOwner::Method(id) => method_owner_name(&*self.source, id),
            GenericOwner::MethodReference(id) => {
                let reference = graph.member_ref(id);
                let declaring = match &reference.parent {
                    MemberRefParent::Type(signature) => signature
                        .element_handle()
                        .map(|handle| graph.type_full_name(handle))
                        .unwrap_or_default(),
                    MemberRefParent::Method(method) => {
                        return method_owner_name(&*self.source, *method);
                    }
                    MemberRefParent::ModuleRef(module) => graph.module_ref(*module).name.clone(),
                };
                format!("{}::{}", declaring, reference.name)
            }
        }
    }

    /// Target side generic parameters of an imported declaring type
    fn declaring_parameters(&mut self, imported: TypeHandle) -> Result<Vec<GenericParamId>> {
        Ok(match imported {
            TypeHandle::Definition(id) => self.target.type_generic_parameters(id)?.to_vec(),
            TypeHandle::Reference(id) => {
                self.target.graph().type_ref(id).generic_parameters.clone()
            }
        })
    }

    /// Import the declaring type of a source definition as a member reference parent
    fn import_declaring(
        &mut self,
        declaring: TypeDefId,
    ) -> Result<(TypeSig, String, Vec<GenericParamId>)> {
        let imported = self.import_type(TypeHandle::Definition(declaring))?;
        let value_type = self
            .source
            .graph()
            .type_def(declaring)
            .base_type
            .as_ref()
            .and_then(TypeSig::element_handle)
            .is_some_and(|base| {
                let graph = self.source.graph();
                graph.is_type(base, "System", "ValueType") || graph.is_type(base, "System", "Enum")
            });

        let parent = if value_type {
            TypeSig::ValueType(imported)
        } else {
            TypeSig::Class(imported)
        };
        let parameters = self.declaring_parameters(imported)?;
        Ok((parent, self.source.graph().type_def_full_name(declaring), parameters))
    }

    /// Import a method definition, reference or instantiation of the source module
    ///
    /// # Errors
    /// Returns an error if either module has damaged metadata or a placeholder cannot be
    /// rebound
    pub fn import_method(&mut self, handle: MethodHandle) -> Result<MethodHandle> {
        match handle {
            MethodHandle::Definition(id) => {
                self.import_method_definition(id).map(MethodHandle::Reference)
            }
            MethodHandle::Reference(id) => {
                self.import_member_reference(id).map(MethodHandle::Reference)
            }
            MethodHandle::Specification(id) => {
                let specification = self.source.graph().method_spec(id).clone();
                let method = self.import_method(specification.method)?;
                let instantiation = specification
                    .instantiation
                    .iter()
                    .map(|argument| self.import_type_sig(argument))
                    .collect::<Result<Vec<_>>>()?;
                let imported = self.target.add_method_specification(MethodSpecification {
                    token: Token::default(),
                    method,
                    instantiation,
                });
                Ok(MethodHandle::Specification(imported))
            }
        }
    }

    fn import_method_definition(&mut self, id: MethodId) -> Result<MemberRefId> {
        let method = self.source.graph().method(id).clone();
        let Some(declaring) = method.declaring_type else {
            return Err(invalid_operation!("Method {} has no declaring type", method.name));
        };

        let (parent, type_name, type_parameters) = self.import_declaring(declaring)?;
        let reference = self.target.add_member_reference(MemberReference::new(
            MemberRefParent::Type(parent),
            &method.name,
            MemberSig::Method(MethodSig::new_static(TypeSig::Void, Vec::new())),
        ));

        let parameters = self.source.method_generic_parameters(id)?.to_vec();
        let mirrored =
            self.mirror_parameters(&parameters, GenericOwner::MethodReference(reference));
        self.target.graph_mut().member_ref_mut(reference).generic_parameters = mirrored.clone();

        self.context.push_type(type_name, type_parameters);
        self.context.push_method(method_owner_name(&*self.source, id), mirrored);
        let signature = self.import_method_sig(&method.signature);
        self.context.pop();
        self.context.pop();

        self.target.graph_mut().member_ref_mut(reference).signature = MemberSig::Method(signature?);
        Ok(reference)
    }

    fn import_member_reference(&mut self, id: MemberRefId) -> Result<MemberRefId> {
        let reference = self.source.graph().member_ref(id).clone();
        let parent = match &reference.parent {
            MemberRefParent::Type(signature) => {
                MemberRefParent::Type(self.import_type_sig(signature)?)
            }
            MemberRefParent::ModuleRef(module) => {
                let name = self.source.graph().module_ref(*module).name.clone();
                if name.eq_ignore_ascii_case(&self.target.name) {
                    return Err(invalid_operation!(
                        "{} refers to a global of the target",
                        reference.name
                    ));
                }
                MemberRefParent::ModuleRef(self.target.add_module_reference(&name)?)
            }
            MemberRefParent::Method(method) => {
                // A vararg call site, the target calls the imported method itself
                let imported = self.import_method_definition(*method)?;
                self.target.graph().member_ref(imported).parent.clone()
            }
        };

        let signature = match &reference.signature {
            MemberSig::Method(signature) => MemberSig::Method(self.import_method_sig(signature)?),
            MemberSig::Field(signature) => MemberSig::Field(self.import_type_sig(signature)?),
        };
        Ok(self
            .target
            .add_member_reference(MemberReference::new(parent, &reference.name, signature)))
    }

    /// Import a field definition or reference of the source module
    ///
    /// # Errors
    /// Returns an error if either module has damaged metadata or a placeholder cannot be
    /// rebound
    pub fn import_field(&mut self, handle: FieldHandle) -> Result<FieldHandle> {
        let id = match handle {
            FieldHandle::Reference(id) => {
                return self.import_member_reference(id).map(FieldHandle::Reference)
            }
            FieldHandle::Definition(id) => id,
        };

        let field = self.source.graph().field(id).clone();
        let Some(declaring) = field.declaring_type else {
            return Err(invalid_operation!("Field {} has no declaring type", field.name));
        };

        let (parent, type_name, type_parameters) = self.import_declaring(declaring)?;
        self.context.push_type(type_name, type_parameters);
        let signature = self.import_type_sig(&field.signature);
        self.context.pop();

        let reference = MemberReference::new(
            MemberRefParent::Type(parent),
            &field.name,
            MemberSig::Field(signature?),
        );
        Ok(FieldHandle::Reference(self.target.add_member_reference(reference)))
    }
}

/// Name of a method as a generic owner, `Namespace.Type::Method`
fn method_owner_name(module: &ModuleDefinition, id: MethodId) -> String {
    let graph = module.graph();
    let method = graph.method(id);
    match method.declaring_type {
        Some(declaring) => format!("{}::{}", graph.type_def_full_name(declaring), method.name),
        None => method.name.clone(),
    }
}

impl ModuleDefinition {
    /// Import a type of `source`, see [`Importer::import_type`]
    ///
    /// # Errors
    /// Returns an error if either module has damaged metadata
    pub fn import_type(
        &mut self,
        source: &mut ModuleDefinition,
        handle: TypeHandle,
    ) -> Result<TypeHandle> {
        Importer::new(self, source).import_type(handle)
    }

    /// Import a type signature of `source`, see [`Importer::import_type_sig`]
    ///
    /// # Errors
    /// See [`Importer::import_type_sig`]
    pub fn import_type_sig(
        &mut self,
        source: &mut ModuleDefinition,
        signature: &TypeSig,
    ) -> Result<TypeSig> {
        Importer::new(self, source).import_type_sig(signature)
    }

    /// Import a method of `source`, see [`Importer::import_method`]
    ///
    /// # Errors
    /// See [`Importer::import_method`]
    pub fn import_method(
        &mut self,
        source: &mut ModuleDefinition,
        handle: MethodHandle,
    ) -> Result<MethodHandle> {
        Importer::new(self, source).import_method(handle)
    }

    /// Import a field of `source`, see [`Importer::import_field`]
    ///
    /// # Errors
    /// See [`Importer::import_field`]
    pub fn import_field(
        &mut self,
        source: &mut ModuleDefinition,
        handle: FieldHandle,
    ) -> Result<FieldHandle> {
        Importer::new(self, source).import_field(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{
        AssemblyDefinition, AssemblyVersion, FieldAttributes, FieldDefinition,
        GenericParamAttributes, MethodAttributes, MethodDefinition, TypeAttributes, TypeDefinition,
    };

    fn generic_library() -> (ModuleDefinition, TypeDefId, MethodId) {
        let mut module = ModuleDefinition::new_assembly(
            "Lib.dll",
            AssemblyDefinition::new("Lib", AssemblyVersion::new(1, 0, 0, 0)),
        );
        let boxed = module
            .add_type(TypeDefinition::new("Lib", "Box`1", TypeAttributes::PUBLIC, None))
            .unwrap();
        let t = module
            .add_generic_parameter(GenericOwner::Type(boxed), "T", GenericParamAttributes::empty())
            .unwrap();
        let t_sig = TypeSig::Var(GenericParamSig {
            position: 0,
            owner: Some(t),
        });
        module
            .add_field(boxed, FieldDefinition::new("value", FieldAttributes::PUBLIC, t_sig.clone()))
            .unwrap();

        let map = module
            .add_method(
                boxed,
                MethodDefinition::new(
                    "Map",
                    MethodAttributes::PUBLIC,
                    MethodSig::new_instance(TypeSig::Void, vec![t_sig]),
                ),
            )
            .unwrap();
        let u = module
            .add_generic_parameter(GenericOwner::Method(map), "U", GenericParamAttributes::empty())
            .unwrap();
        module.graph_mut().method_mut(map).signature.generic_arity = 1;
        module.graph_mut().method_mut(map).signature.return_type = TypeSig::MVar(GenericParamSig {
            position: 0,
            owner: Some(u),
        });
        (module, boxed, map)
    }

    #[test]
    fn import_generic_field() {
        let (mut library, boxed, _) = generic_library();
        let field = library.fields(boxed).unwrap()[0];
        let mut app = ModuleDefinition::new("App.dll");

        let imported = app.import_field(&mut library, FieldHandle::Definition(field)).unwrap();
        let FieldHandle::Reference(imported) = imported else {
            panic!("fields of other modules import as references");
        };

        let reference = app.graph().member_ref(imported).clone();
        let MemberRefParent::Type(TypeSig::Class(TypeHandle::Reference(parent))) = reference.parent
        else {
            panic!("unexpected parent {:?}", reference.parent);
        };
        assert_eq!(app.graph().type_ref_full_name(parent), "Lib.Box`1");
        let mirrored = app.graph().type_ref(parent).generic_parameters.clone();
        assert_eq!(mirrored.len(), 1);

        let MemberSig::Field(TypeSig::Var(placeholder)) = reference.signature else {
            panic!("unexpected signature {:?}", reference.signature);
        };
        assert_eq!(placeholder.owner, Some(mirrored[0]));
        assert_eq!(app.assembly_references().unwrap().len(), 1);
    }

    #[test]
    fn import_generic_method() {
        let (mut library, _, map) = generic_library();
        let mut app = ModuleDefinition::new("App.dll");

        let imported = app.import_method(&mut library, MethodHandle::Definition(map)).unwrap();
        let MethodHandle::Reference(imported) = imported else {
            panic!("methods of other modules import as references");
        };
        let reference = app.graph().member_ref(imported);
        assert_eq!(reference.generic_parameters.len(), 1);
        let MemberSig::Method(signature) = &reference.signature else {
            panic!("unexpected signature");
        };
        assert_eq!(signature.generic_arity, 1);
        let TypeSig::MVar(placeholder) = signature.return_type else {
            panic!("unexpected return type");
        };
        assert_eq!(placeholder.owner, Some(reference.generic_parameters[0]));
    }

    #[test]
    fn unknown_owner_fails() {
        let (mut library, boxed, _) = generic_library();
        let t = library.type_generic_parameters(boxed).unwrap()[0];
        let mut app = ModuleDefinition::new("App.dll");

        let bound = TypeSig::Var(GenericParamSig {
            position: 0,
            owner: Some(t),
        });
        assert!(app.import_type_sig(&mut library, &bound).is_err());
        assert_eq!(
            app.import_type_sig(&mut library, &TypeSig::Var(GenericParamSig::unbound(3))).unwrap(),
            TypeSig::Var(GenericParamSig::unbound(3))
        );
    }

    #[test]
    fn own_types_come_back_as_definitions() {
        let mut app = ModuleDefinition::new_assembly(
            "App.dll",
            AssemblyDefinition::new("App", AssemblyVersion::new(1, 0, 0, 0)),
        );
        let local = app
            .add_type(TypeDefinition::new("App", "Local", TypeAttributes::PUBLIC, None))
            .unwrap();

        let mut other = ModuleDefinition::new("Other.dll");
        let app_ref = other
            .add_assembly_reference(AssemblyNameReference::new(
                "App",
                AssemblyVersion::new(1, 0, 0, 0),
            ))
            .unwrap();
        let scope = ResolutionScope::AssemblyRef(app_ref);
        let remote = other.add_type_reference(TypeReference::new(scope, "App", "Local"));

        let imported = app.import_type(&mut other, TypeHandle::Reference(remote)).unwrap();
        assert_eq!(imported, TypeHandle::Definition(local));
        assert!(app.assembly_references().unwrap().is_empty());
    }

    #[test]
    fn cyclic_scope_is_rejected() {
        let mut library = ModuleDefinition::new("Lib.dll");
        let first =
            library.add_type_reference(TypeReference::new(ResolutionScope::None, "N", "First"));
        let second = library.add_type_reference(TypeReference::new(
            ResolutionScope::TypeRef(first),
            "",
            "Second",
        ));
        library.graph_mut().type_ref_mut(first).scope = ResolutionScope::TypeRef(second);

        let mut app = ModuleDefinition::new("App.dll");
        let result = app.import_type(&mut library, TypeHandle::Reference(second));
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn nested_reference_chain() {
        let mut library = ModuleDefinition::new("Lib.dll");
        let outer = library
            .add_type(TypeDefinition::new("Lib", "Outer", TypeAttributes::PUBLIC, None))
            .unwrap();
        let inner = library
            .add_nested_type(
                outer,
                TypeDefinition::new("", "Inner", TypeAttributes::NESTED_PUBLIC, None),
            )
            .unwrap();

        let mut app = ModuleDefinition::new("App.dll");
        let imported = app.import_type(&mut library, TypeHandle::Definition(inner)).unwrap();
        let TypeHandle::Reference(imported) = imported else {
            panic!("foreign types import as references");
        };
        assert_eq!(app.graph().type_ref_full_name(imported), "Lib.Outer/Inner");
        let ResolutionScope::TypeRef(declaring) = app.graph().type_ref(imported).scope else {
            panic!("nested references are scoped to their declaring reference");
        };
        assert!(matches!(app.graph().type_ref(declaring).scope, ResolutionScope::ModuleRef(_)));
    }
}
