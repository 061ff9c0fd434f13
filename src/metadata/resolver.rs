//! Reference to definition resolution.
//!
//! A reference names a type or member by shape: a scope, a name and a signature. Resolving
//! it means finding the module behind the scope (this one, a sibling module of the same
//! assembly, or another assembly handed out by an [`AssemblyResolver`]) and then the
//! definition inside it whose name and structural signature match.
//!
//! Soft failures (no resolver configured, assembly unknown, no matching member) are
//! `Ok(None)`. Errors are reserved for damaged metadata and poisoned locks.
//!
//! Signatures of two modules cannot be compared by id, so both sides are normalized into
//! [`TypeShape`]s first: named types become their namespace plus nesting chain, array bounds
//! are dropped, generic placeholders keep only their kind and position.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::{
    metadata::{
        customattributes::{
            parse_custom_attribute, ArgumentType, CustomAttribute, CustomAttributeValue,
        },
        model::{
            AssemblyNameReference, FieldHandle, FieldId, Implementation, MemberRefParent,
            MetadataGraph, MethodHandle, MethodId, ResolutionScope, TypeDefId, TypeHandle,
        },
        module::ModuleDefinition,
        signatures::{MemberSig, MethodSig, TypeSig},
    },
    Error::{InvalidOperation, Resolution},
    Result,
};

/// A module shared between resolvers, guarded by the coarse per-module lock
pub type ModuleRc = Arc<Mutex<ModuleDefinition>>;

/// Base type chains longer than this are treated as cyclic
const MAX_BASE_DEPTH: usize = 64;

/// Finds the modules behind assembly and module references
///
/// A resolver must never hand back the module that is currently resolving through it; that
/// module is already locked by the caller and locking it again deadlocks.
pub trait AssemblyResolver: Send + Sync {
    /// The manifest module of the assembly `reference` names
    fn resolve(&self, reference: &AssemblyNameReference) -> Option<ModuleRc>;

    /// A sibling module of a multi-module assembly
    fn resolve_module(&self, _name: &str) -> Option<ModuleRc> {
        None
    }
}

/// A registry of modules already held in memory, keyed by assembly and module name
///
/// Names compare case-insensitively; versions are not checked. Nothing is ever loaded from
/// disk, callers register what they opened.
#[derive(Default)]
pub struct DefaultAssemblyResolver {
    assemblies: DashMap<String, ModuleRc>,
    modules: DashMap<String, ModuleRc>,
}

impl DefaultAssemblyResolver {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under its module name and, if it has a manifest, its assembly name
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the module lock is poisoned
    pub fn register(&self, module: ModuleRc) -> Result<()> {
        let (name, assembly) = {
            let guard = lock!(module)?;
            (
                guard.name.to_ascii_lowercase(),
                guard.assembly.as_ref().map(|assembly| assembly.name.to_ascii_lowercase()),
            )
        };

        if let Some(assembly) = assembly {
            self.assemblies.insert(assembly, module.clone());
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Number of registered assemblies
    #[must_use]
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    /// Returns `true` if no assembly is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}

impl AssemblyResolver for DefaultAssemblyResolver {
    fn resolve(&self, reference: &AssemblyNameReference) -> Option<ModuleRc> {
        self.assemblies
            .get(&reference.name.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }

    fn resolve_module(&self, name: &str) -> Option<ModuleRc> {
        self.modules
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }
}

macro_rules! resolved {
    ($(#[$meta:meta])* $name:ident, $id:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub enum $name {
            /// Defined in the module that resolved it
            Local($id),
            /// Defined in another module
            External(ModuleRc, $id),
        }

        impl $name {
            /// Id of the definition inside its module
            #[must_use]
            pub fn id(&self) -> $id {
                match self {
                    $name::Local(id) | $name::External(_, id) => *id,
                }
            }

            /// Returns `true` if the definition lives in the resolving module
            #[must_use]
            pub fn is_local(&self) -> bool {
                matches!(self, $name::Local(_))
            }

            /// The defining module, `None` for local definitions
            #[must_use]
            pub fn module(&self) -> Option<&ModuleRc> {
                match self {
                    $name::Local(_) => None,
                    $name::External(module, _) => Some(module),
                }
            }

            fn rebase(self, target: Option<&ModuleRc>) -> Self {
                match (self, target) {
                    ($name::Local(id), Some(module)) => $name::External(module.clone(), id),
                    (resolved, _) => resolved,
                }
            }
        }
    };
}

resolved!(
    /// A resolved type definition
    ResolvedType,
    TypeDefId
);
resolved!(
    /// A resolved method definition
    ResolvedMethod,
    MethodId
);
resolved!(
    /// A resolved field definition
    ResolvedField,
    FieldId
);

/// Run `f` against the module `target` names, or `module` itself for `None`
fn with_target<T>(
    module: &mut ModuleDefinition,
    target: Option<&ModuleRc>,
    f: impl FnOnce(&mut ModuleDefinition) -> Result<T>,
) -> Result<T> {
    match target {
        Some(shared) => {
            let mut guard = lock!(shared)?;
            f(&mut guard)
        }
        None => f(module),
    }
}

/// Where a named type has to be looked up
enum LookupScope {
    Local,
    Assembly(AssemblyNameReference),
    Module(String),
}

/// The module behind a [`LookupScope`]
enum Target {
    Local,
    External(ModuleRc),
    Unknown,
}

fn target_of(module: &ModuleDefinition, scope: &LookupScope) -> Target {
    let resolver = module.options().assembly_resolver.clone();
    match scope {
        LookupScope::Local => Target::Local,
        LookupScope::Module(name) => {
            if name.eq_ignore_ascii_case(&module.name) {
                return Target::Local;
            }
            match resolver.and_then(|resolver| resolver.resolve_module(name)) {
                Some(shared) => Target::External(shared),
                None => Target::Unknown,
            }
        }
        LookupScope::Assembly(reference) => {
            let own = module
                .assembly
                .as_ref()
                .is_some_and(|assembly| assembly.name.eq_ignore_ascii_case(&reference.name));
            if own {
                return Target::Local;
            }
            match resolver.and_then(|resolver| resolver.resolve(reference)) {
                Some(shared) => Target::External(shared),
                None => Target::Unknown,
            }
        }
    }
}

/// Look up `namespace` plus nesting chain `names` behind `scope`, following one forwarder
fn lookup(
    module: &mut ModuleDefinition,
    scope: &LookupScope,
    namespace: &str,
    names: &[String],
    follow_forwarders: bool,
) -> Result<Option<ResolvedType>> {
    let target = match target_of(module, scope) {
        Target::Local => None,
        Target::External(shared) => Some(shared),
        Target::Unknown => {
            tracing::debug!(namespace, ?names, "resolution scope not available");
            return Ok(None);
        }
    };

    let (found, forwarded) = with_target(module, target.as_ref(), |target| {
        if let Some(id) = target.find_type_path(namespace, names)? {
            return Ok((Some(id), None));
        }
        if !follow_forwarders {
            return Ok((None, None));
        }

        let Some(outermost) = names.first() else {
            return Ok((None, None));
        };
        let forwarder = target.exported_types()?.iter().find_map(|exported| {
            match exported.implementation {
                Implementation::AssemblyRef(id)
                    if exported.namespace == namespace && exported.name == *outermost =>
                {
                    Some(id)
                }
                _ => None,
            }
        });
        Ok((None, forwarder.map(|id| target.graph().assembly_ref(id).clone())))
    })?;

    if let Some(id) = found {
        return Ok(Some(ResolvedType::Local(id).rebase(target.as_ref())));
    }

    let Some(reference) = forwarded else {
        return Ok(None);
    };
    tracing::trace!(namespace, ?names, assembly = %reference.name, "following type forwarder");
    // The forwarder names an assembly of the target module, not of `module`
    match target {
        Some(shared) => {
            let resolver = lock!(shared)?.options().assembly_resolver.clone();
            let Some(next) = resolver.and_then(|resolver| resolver.resolve(&reference)) else {
                return Ok(None);
            };
            let found = lock!(next)?.find_type_path(namespace, names)?;
            Ok(found.map(|id| ResolvedType::External(next.clone(), id)))
        }
        None => lookup(module, &LookupScope::Assembly(reference), namespace, names, false),
    }
}

/// Resolve a type handle to its definition
///
/// Definitions resolve to themselves. References are looked up behind their scope by
/// namespace and nesting chain; a miss follows one hop of `ExportedType` forwarding.
///
/// # Errors
/// Returns an error if a module involved has damaged metadata or a poisoned lock
pub fn resolve_type(
    module: &mut ModuleDefinition,
    handle: TypeHandle,
) -> Result<Option<ResolvedType>> {
    let id = match handle {
        TypeHandle::Definition(id) => return Ok(Some(ResolvedType::Local(id))),
        TypeHandle::Reference(id) => id,
    };

    let chain = module.graph().type_ref_chain(id)?;
    let outermost = chain[chain.len() - 1];
    let scope = match module.graph().type_ref(outermost).scope {
        ResolutionScope::Module | ResolutionScope::None | ResolutionScope::TypeRef(_) => {
            LookupScope::Local
        }
        ResolutionScope::ModuleRef(id) => {
            LookupScope::Module(module.graph().module_ref(id).name.clone())
        }
        ResolutionScope::AssemblyRef(id) => {
            LookupScope::Assembly(module.graph().assembly_ref(id).clone())
        }
    };

    let (namespace, names) = module.graph().type_path(handle)?;
    lookup(module, &scope, &namespace, &names, true)
}

/// Resolve the named type at the bottom of `signature`
///
/// # Errors
/// See [`resolve_type`]
pub fn resolve_type_sig(
    module: &mut ModuleDefinition,
    signature: &TypeSig,
) -> Result<Option<ResolvedType>> {
    match signature.element_handle() {
        Some(handle) => resolve_type(module, handle),
        None => Ok(None),
    }
}

/// What a member lookup compares against
enum MemberShape {
    Method(MethodShape),
    Field(TypeShape),
}

/// Find `name` with `shape` on `ty` or its base types
fn find_member(
    module: &mut ModuleDefinition,
    mut target: Option<ModuleRc>,
    mut ty: TypeDefId,
    name: &str,
    shape: &MemberShape,
) -> Result<Option<(Option<ModuleRc>, MemberId)>> {
    for _ in 0..MAX_BASE_DEPTH {
        let step = with_target(module, target.as_ref(), |current| {
            match shape {
                MemberShape::Method(wanted) => {
                    for id in current.methods(ty)?.to_vec() {
                        let method = current.graph().method(id);
                        if method.name == name
                            && MethodShape::of(current.graph(), &method.signature)? == *wanted
                        {
                            return Ok(Step::Found(MemberId::Method(id)));
                        }
                    }
                }
                MemberShape::Field(wanted) => {
                    for id in current.fields(ty)?.to_vec() {
                        let field = current.graph().field(id);
                        if field.name == name
                            && TypeShape::of(current.graph(), &field.signature)? == *wanted
                        {
                            return Ok(Step::Found(MemberId::Field(id)));
                        }
                    }
                }
            }

            let base = current.graph().type_def(ty).base_type.clone();
            match base {
                Some(base) => Ok(Step::Base(resolve_type_sig(current, &base)?)),
                None => Ok(Step::Base(None)),
            }
        })?;

        match step {
            Step::Found(member) => return Ok(Some((target, member))),
            Step::Base(None) => return Ok(None),
            Step::Base(Some(base)) => {
                let base = base.rebase(target.as_ref());
                ty = base.id();
                target = base.module().cloned();
            }
        }
    }

    Err(Resolution(format!("base type chain of {} is deeper than {}", name, MAX_BASE_DEPTH)))
}

enum MemberId {
    Method(MethodId),
    Field(FieldId),
}

enum Step {
    Found(MemberId),
    Base(Option<ResolvedType>),
}

/// The module and type a member reference parent points at
fn declaring_type_of(
    module: &mut ModuleDefinition,
    parent: &MemberRefParent,
) -> Result<Option<ResolvedType>> {
    match parent {
        MemberRefParent::Type(signature) => resolve_type_sig(module, signature),
        MemberRefParent::ModuleRef(id) => {
            let name = module.graph().module_ref(*id).name.clone();
            let target = match target_of(module, &LookupScope::Module(name)) {
                Target::Local => None,
                Target::External(shared) => Some(shared),
                Target::Unknown => return Ok(None),
            };
            let global = with_target(module, target.as_ref(), |target| {
                target.find_type("", "<Module>")
            })?;
            Ok(global.map(|id| ResolvedType::Local(id).rebase(target.as_ref())))
        }
        MemberRefParent::Method(id) => {
            Ok(module.graph().method(*id).declaring_type.map(ResolvedType::Local))
        }
    }
}

/// Resolve a method handle to its definition
///
/// Instantiations resolve to their generic method. References are matched by name and
/// [`MethodShape`] on the declaring type and then on its base types.
///
/// # Errors
/// Returns an error if a module involved has damaged metadata or a poisoned lock
pub fn resolve_method(
    module: &mut ModuleDefinition,
    handle: MethodHandle,
) -> Result<Option<ResolvedMethod>> {
    let id = match handle {
        MethodHandle::Definition(id) => return Ok(Some(ResolvedMethod::Local(id))),
        MethodHandle::Specification(id) => {
            let generic = module.graph().method_spec(id).method;
            return resolve_method(module, generic);
        }
        MethodHandle::Reference(id) => id,
    };

    let reference = module.graph().member_ref(id).clone();
    let signature = match &reference.signature {
        MemberSig::Method(signature) => signature,
        MemberSig::Field(_) => {
            return Err(InvalidOperation(format!("{} is a field reference", reference.name)));
        }
    };
    if let MemberRefParent::Method(id) = reference.parent {
        return Ok(Some(ResolvedMethod::Local(id)));
    }

    let shape = MemberShape::Method(MethodShape::of(module.graph(), signature)?);
    let Some(declaring) = declaring_type_of(module, &reference.parent)? else {
        return Ok(None);
    };

    let found = find_member(
        module,
        declaring.module().cloned(),
        declaring.id(),
        &reference.name,
        &shape,
    )?;
    Ok(match found {
        Some((target, MemberId::Method(id))) => {
            Some(ResolvedMethod::Local(id).rebase(target.as_ref()))
        }
        _ => None,
    })
}

/// Resolve a field handle to its definition
///
/// # Errors
/// Returns an error if a module involved has damaged metadata or a poisoned lock
pub fn resolve_field(
    module: &mut ModuleDefinition,
    handle: FieldHandle,
) -> Result<Option<ResolvedField>> {
    let id = match handle {
        FieldHandle::Definition(id) => return Ok(Some(ResolvedField::Local(id))),
        FieldHandle::Reference(id) => id,
    };

    let reference = module.graph().member_ref(id).clone();
    let MemberSig::Field(field_type) = &reference.signature else {
        return Err(InvalidOperation(format!("{} is a method reference", reference.name)));
    };

    let shape = MemberShape::Field(TypeShape::of(module.graph(), field_type)?);
    let Some(declaring) = declaring_type_of(module, &reference.parent)? else {
        return Ok(None);
    };

    let found = find_member(
        module,
        declaring.module().cloned(),
        declaring.id(),
        &reference.name,
        &shape,
    )?;
    Ok(match found {
        Some((target, MemberId::Field(id))) => {
            Some(ResolvedField::Local(id).rebase(target.as_ref()))
        }
        _ => None,
    })
}

/// Decode the blob of `attribute` against its constructor
///
/// Enum arguments need the underlying type of the enum, which is read from the `value__`
/// field of the resolved enum definition. Failing to resolve it is an error since the width
/// of the stored value is unknown.
///
/// # Errors
/// Returns [`crate::Error::Resolution`] for an enum that cannot be resolved, otherwise an
/// error if the blob is malformed
pub fn custom_attribute_value(
    module: &mut ModuleDefinition,
    attribute: &CustomAttribute,
) -> Result<CustomAttributeValue> {
    let constructor = constructor_signature(module, attribute.constructor)?;
    let mut fixed_types = Vec::with_capacity(constructor.params.len());
    for param in &constructor.params {
        fixed_types.push(argument_type(module, param)?);
    }

    parse_custom_attribute(&attribute.blob, &fixed_types, |serialized| {
        enum_underlying_by_name(module, serialized)
    })
}

fn constructor_signature(
    module: &ModuleDefinition,
    constructor: MethodHandle,
) -> Result<MethodSig> {
    match constructor {
        MethodHandle::Definition(id) => Ok(module.graph().method(id).signature.clone()),
        MethodHandle::Reference(id) => match &module.graph().member_ref(id).signature {
            MemberSig::Method(signature) => Ok(signature.clone()),
            MemberSig::Field(_) => {
                Err(malformed_error!("Attribute constructor is a field reference"))
            }
        },
        MethodHandle::Specification(_) => {
            Err(malformed_error!("Attribute constructor is a generic instance"))
        }
    }
}

/// Map a constructor parameter to the type it is serialized as
fn argument_type(module: &mut ModuleDefinition, signature: &TypeSig) -> Result<ArgumentType> {
    Ok(match signature {
        TypeSig::Boolean => ArgumentType::Boolean,
        TypeSig::Char => ArgumentType::Char,
        TypeSig::I1 => ArgumentType::I1,
        TypeSig::U1 => ArgumentType::U1,
        TypeSig::I2 => ArgumentType::I2,
        TypeSig::U2 => ArgumentType::U2,
        TypeSig::I4 => ArgumentType::I4,
        TypeSig::U4 => ArgumentType::U4,
        TypeSig::I8 => ArgumentType::I8,
        TypeSig::U8 => ArgumentType::U8,
        TypeSig::R4 => ArgumentType::R4,
        TypeSig::R8 => ArgumentType::R8,
        TypeSig::String => ArgumentType::String,
        TypeSig::Object => ArgumentType::Object,
        TypeSig::SzArray(element) => {
            ArgumentType::SzArray(Box::new(argument_type(module, element)?))
        }
        TypeSig::Class(handle) if module.graph().is_type(*handle, "System", "Type") => {
            ArgumentType::Type
        }
        TypeSig::Class(handle) if module.graph().is_type(*handle, "System", "Object") => {
            ArgumentType::Object
        }
        TypeSig::ValueType(handle) => {
            let type_name = module.graph().type_full_name(*handle).replace('/', "+");
            let Some(resolved) = resolve_type(module, *handle)? else {
                return Err(Resolution(format!("cannot resolve enum {}", type_name)));
            };
            ArgumentType::Enum {
                underlying: Box::new(enum_underlying(module, &resolved, &type_name)?),
                type_name,
            }
        }
        other => {
            return Err(malformed_error!(
                "Type 0x{:02x} cannot appear in an attribute constructor",
                other.element_type()
            ))
        }
    })
}

/// Underlying primitive of an enum definition, the type of its instance `value__` field
fn enum_underlying(
    module: &mut ModuleDefinition,
    resolved: &ResolvedType,
    type_name: &str,
) -> Result<ArgumentType> {
    let id = resolved.id();
    let underlying = with_target(module, resolved.module(), |target| {
        for field in target.fields(id)?.to_vec() {
            let field = target.graph().field(field);
            if field.name == "value__" && !field.flags.is_static() {
                return Ok(Some(field.signature.clone()));
            }
        }
        Ok(None)
    })?;

    let primitive = match underlying {
        Some(TypeSig::Boolean) => ArgumentType::Boolean,
        Some(TypeSig::Char) => ArgumentType::Char,
        Some(TypeSig::I1) => ArgumentType::I1,
        Some(TypeSig::U1) => ArgumentType::U1,
        Some(TypeSig::I2) => ArgumentType::I2,
        Some(TypeSig::U2) => ArgumentType::U2,
        Some(TypeSig::I4) => ArgumentType::I4,
        Some(TypeSig::U4) => ArgumentType::U4,
        Some(TypeSig::I8) => ArgumentType::I8,
        Some(TypeSig::U8) => ArgumentType::U8,
        _ => return Err(Resolution(format!("{} is not an enum", type_name))),
    };
    Ok(primitive)
}

/// Underlying primitive of an enum named by its serialized name,
/// `Namespace.Outer+Inner, Assembly, Version=...`
fn enum_underlying_by_name(
    module: &mut ModuleDefinition,
    serialized: &str,
) -> Result<ArgumentType> {
    let (type_part, assembly) = match serialized.split_once(',') {
        Some((type_part, rest)) => (type_part.trim(), rest.split(',').next().map(str::trim)),
        None => (serialized.trim(), None),
    };

    let mut names: Vec<String> = type_part.split('+').map(str::to_string).collect();
    let (namespace, outermost) = match names[0].rsplit_once('.') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (String::new(), names[0].clone()),
    };
    names[0] = outermost;

    let scope = match assembly {
        None => LookupScope::Local,
        Some(name) => {
            let own = module
                .assembly
                .as_ref()
                .is_some_and(|assembly| assembly.name.eq_ignore_ascii_case(name));
            let reference = module
                .assembly_references()?
                .into_iter()
                .map(|id| module.graph().assembly_ref(id).clone())
                .find(|reference| reference.name.eq_ignore_ascii_case(name));
            match reference {
                Some(reference) if !own => LookupScope::Assembly(reference),
                _ => LookupScope::Local,
            }
        }
    };

    let Some(resolved) = lookup(module, &scope, &namespace, &names, true)? else {
        return Err(Resolution(format!("cannot resolve enum {}", serialized)));
    };
    enum_underlying(module, &resolved, serialized)
}

/// A type signature with every module specific id replaced by names
///
/// Two shapes are equal when the signatures they come from describe the same type, no
/// matter which module each signature was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// A primitive, `string`, `object`, `typedref` or `void`, by element type
    Primitive(u8),
    /// A named class or value type
    Named {
        /// `true` for value types
        value_type: bool,
        /// Namespace of the outermost type
        namespace: String,
        /// Names of the nesting chain, outermost first
        names: Vec<String>,
    },
    /// Unmanaged pointer
    Ptr(Box<TypeShape>),
    /// Managed reference
    ByRef(Box<TypeShape>),
    /// Pinned local
    Pinned(Box<TypeShape>),
    /// Single dimension, zero based array
    SzArray(Box<TypeShape>),
    /// General array; bounds do not take part in the comparison
    Array(Box<TypeShape>, u32),
    /// Generic instantiation
    GenericInst(Box<TypeShape>, Vec<TypeShape>),
    /// Type placeholder by position
    Var(u32),
    /// Method placeholder by position
    MVar(u32),
    /// Function pointer
    FnPtr(Box<MethodShape>),
    /// Custom modifier
    Modified {
        /// `modreq` rather than `modopt`
        required: bool,
        /// Namespace and nesting chain of the modifier type
        modifier: (String, Vec<String>),
        /// The modified type
        element: Box<TypeShape>,
    },
    /// First vararg parameter
    Sentinel(Box<TypeShape>),
}

impl TypeShape {
    /// Normalize `signature`, whose ids index into `graph`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a named type sits in a nesting cycle
    pub fn of(graph: &MetadataGraph, signature: &TypeSig) -> Result<Self> {
        let boxed = |inner: &TypeSig| TypeShape::of(graph, inner).map(Box::new);
        Ok(match signature {
            TypeSig::Class(handle) | TypeSig::ValueType(handle) => {
                let (namespace, names) = graph.type_path(*handle)?;
                TypeShape::Named {
                    value_type: matches!(signature, TypeSig::ValueType(_)),
                    namespace,
                    names,
                }
            }
            TypeSig::Ptr(inner) => TypeShape::Ptr(boxed(inner)?),
            TypeSig::ByRef(inner) => TypeShape::ByRef(boxed(inner)?),
            TypeSig::Pinned(inner) => TypeShape::Pinned(boxed(inner)?),
            TypeSig::SzArray(inner) => TypeShape::SzArray(boxed(inner)?),
            TypeSig::Sentinel(inner) => TypeShape::Sentinel(boxed(inner)?),
            TypeSig::Array(shape) => TypeShape::Array(boxed(&shape.element)?, shape.rank),
            TypeSig::GenericInst { generic, arguments } => TypeShape::GenericInst(
                boxed(generic)?,
                arguments
                    .iter()
                    .map(|argument| TypeShape::of(graph, argument))
                    .collect::<Result<_>>()?,
            ),
            TypeSig::Var(parameter) => TypeShape::Var(parameter.position),
            TypeSig::MVar(parameter) => TypeShape::MVar(parameter.position),
            TypeSig::FnPtr(method) => TypeShape::FnPtr(Box::new(MethodShape::of(graph, method)?)),
            TypeSig::RequiredModifier { modifier, element }
            | TypeSig::OptionalModifier { modifier, element } => TypeShape::Modified {
                required: matches!(signature, TypeSig::RequiredModifier { .. }),
                modifier: graph.type_path(*modifier)?,
                element: boxed(element)?,
            },
            primitive => TypeShape::Primitive(primitive.element_type()),
        })
    }
}

/// A method signature normalized like [`TypeShape`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodShape {
    /// The return type
    pub return_type: TypeShape,
    /// Parameter types, vararg sentinel included
    pub params: Vec<TypeShape>,
    /// Position of the first vararg parameter
    pub sentinel: Option<usize>,
    /// Number of generic parameters
    pub generic_arity: u32,
}

impl MethodShape {
    /// Normalize `signature`, whose ids index into `graph`
    ///
    /// # Errors
    /// See [`TypeShape::of`]
    pub fn of(graph: &MetadataGraph, signature: &MethodSig) -> Result<Self> {
        Ok(MethodShape {
            return_type: TypeShape::of(graph, &signature.return_type)?,
            params: signature
                .params
                .iter()
                .map(|param| TypeShape::of(graph, param))
                .collect::<Result<_>>()?,
            sentinel: signature.sentinel_position(),
            generic_arity: signature.generic_arity,
        })
    }
}

/// Returns `true` if two type signatures, each from its own graph, describe the same type
///
/// # Errors
/// See [`TypeShape::of`]
pub fn same_type(
    left_graph: &MetadataGraph,
    left: &TypeSig,
    right_graph: &MetadataGraph,
    right: &TypeSig,
) -> Result<bool> {
    Ok(TypeShape::of(left_graph, left)? == TypeShape::of(right_graph, right)?)
}

/// Returns `true` if two method signatures, each from its own graph, have the same shape
///
/// # Errors
/// See [`TypeShape::of`]
pub fn same_method_signature(
    left_graph: &MetadataGraph,
    left: &MethodSig,
    right_graph: &MetadataGraph,
    right: &MethodSig,
) -> Result<bool> {
    Ok(MethodShape::of(left_graph, left)? == MethodShape::of(right_graph, right)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        model::{
            AssemblyDefinition, AssemblyVersion, ExportedType, FieldAttributes, FieldDefinition,
            MemberReference, MethodAttributes, MethodDefinition, TypeAttributes, TypeDefinition,
            TypeReference,
        },
        options::ReaderOptions,
        signatures::{ArrayShape, GenericParamSig},
    };

    fn shared(module: ModuleDefinition) -> ModuleRc {
        Arc::new(Mutex::new(module))
    }

    fn library() -> ModuleDefinition {
        let mut module = ModuleDefinition::new_assembly(
            "Lib.dll",
            AssemblyDefinition::new("Lib", AssemblyVersion::new(1, 0, 0, 0)),
        );
        let base = module
            .add_type(TypeDefinition::new("Lib", "Base", TypeAttributes::PUBLIC, None))
            .unwrap();
        module
            .add_method(
                base,
                MethodDefinition::new(
                    "Run",
                    MethodAttributes::PUBLIC,
                    MethodSig::new_instance(TypeSig::Void, vec![TypeSig::I4]),
                ),
            )
            .unwrap();
        module
            .add_field(base, FieldDefinition::new("count", FieldAttributes::PUBLIC, TypeSig::I4))
            .unwrap();
        module
            .add_type(TypeDefinition::new(
                "Lib",
                "Derived",
                TypeAttributes::PUBLIC,
                Some(TypeSig::Class(TypeHandle::Definition(base))),
            ))
            .unwrap();
        module
    }

    fn consumer(resolver: Arc<DefaultAssemblyResolver>) -> ModuleDefinition {
        let mut module = ModuleDefinition::new("App.dll");
        module.set_assembly_resolver(resolver);
        module
    }

    #[test]
    fn shapes_ignore_bounds_and_owners() {
        let graph = MetadataGraph::default();
        let bounded = TypeSig::Array(ArrayShape {
            element: Box::new(TypeSig::I4),
            rank: 2,
            sizes: vec![3, 4],
            lower_bounds: vec![0, 0],
        });
        let unbounded = TypeSig::Array(ArrayShape {
            element: Box::new(TypeSig::I4),
            rank: 2,
            sizes: vec![],
            lower_bounds: vec![],
        });
        assert!(same_type(&graph, &bounded, &graph, &unbounded).unwrap());

        let var = TypeSig::Var(GenericParamSig::unbound(0));
        let mvar = TypeSig::MVar(GenericParamSig::unbound(0));
        assert!(!same_type(&graph, &var, &graph, &mvar).unwrap());
        let vector = TypeSig::SzArray(Box::new(TypeSig::I4));
        assert!(!same_type(&graph, &vector, &graph, &bounded).unwrap());
    }

    #[test]
    fn shapes_across_graphs() {
        let mut left = ModuleDefinition::new("Left.dll");
        let mut right = ModuleDefinition::new("Right.dll");
        let local = left
            .add_type(TypeDefinition::new("System", "Object", TypeAttributes::PUBLIC, None))
            .unwrap();
        let remote = right.add_type_reference(TypeReference::new(
            ResolutionScope::Module,
            "System",
            "Object",
        ));

        let strings = vec![TypeSig::String];
        let left_sig =
            MethodSig::new_static(TypeSig::Class(TypeHandle::Definition(local)), strings.clone());
        let right_sig =
            MethodSig::new_static(TypeSig::Class(TypeHandle::Reference(remote)), strings.clone());
        assert!(same_method_signature(left.graph(), &left_sig, right.graph(), &right_sig).unwrap());

        let value = MethodSig::new_static(
            TypeSig::ValueType(TypeHandle::Reference(remote)),
            vec![TypeSig::String],
        );
        assert!(!same_method_signature(left.graph(), &left_sig, right.graph(), &value).unwrap());
    }

    #[test]
    fn resolve_through_registry() {
        let resolver = Arc::new(DefaultAssemblyResolver::new());
        resolver.register(shared(library())).unwrap();
        assert_eq!(resolver.len(), 1);

        let mut module = consumer(resolver);
        let reference = AssemblyNameReference::new("Lib", AssemblyVersion::new(1, 0, 0, 0));
        let scope = ResolutionScope::AssemblyRef(module.add_assembly_reference(reference).unwrap());
        let derived = module.add_type_reference(TypeReference::new(scope, "Lib", "Derived"));
        let missing = module.add_type_reference(TypeReference::new(scope, "Lib", "Missing"));

        let resolved = resolve_type(&mut module, TypeHandle::Reference(derived)).unwrap().unwrap();
        assert!(!resolved.is_local());
        assert!(resolve_type(&mut module, TypeHandle::Reference(missing)).unwrap().is_none());

        // Run and count live on the base type
        let parent = MemberRefParent::Type(TypeSig::Class(TypeHandle::Reference(derived)));
        let run = module.add_member_reference(MemberReference::new(
            parent.clone(),
            "Run",
            MemberSig::Method(MethodSig::new_instance(TypeSig::Void, vec![TypeSig::I4])),
        ));
        let method = resolve_method(&mut module, MethodHandle::Reference(run)).unwrap().unwrap();
        let name = lock!(method.module().unwrap())
            .unwrap()
            .graph()
            .method(method.id())
            .name
            .clone();
        assert_eq!(name, "Run");

        let overload = module.add_member_reference(MemberReference::new(
            parent.clone(),
            "Run",
            MemberSig::Method(MethodSig::new_instance(TypeSig::Void, vec![TypeSig::I8])),
        ));
        assert!(resolve_method(&mut module, MethodHandle::Reference(overload)).unwrap().is_none());

        let count = module.add_member_reference(MemberReference::new(
            parent,
            "count",
            MemberSig::Field(TypeSig::I4),
        ));
        assert!(resolve_field(&mut module, FieldHandle::Reference(count)).unwrap().is_some());
        assert!(resolve_method(&mut module, MethodHandle::Reference(count)).is_err());
    }

    #[test]
    fn follows_one_forwarder() {
        let resolver = Arc::new(DefaultAssemblyResolver::new());
        resolver.register(shared(library())).unwrap();

        let mut facade = ModuleDefinition::new_assembly(
            "Facade.dll",
            AssemblyDefinition::new("Facade", AssemblyVersion::new(1, 0, 0, 0)),
        );
        let lib = facade
            .add_assembly_reference(AssemblyNameReference::new(
                "Lib",
                AssemblyVersion::new(1, 0, 0, 0),
            ))
            .unwrap();
        facade.exported_types().unwrap().push(ExportedType::forwarder("Lib", "Base", lib));
        let image = facade.write().unwrap();
        let options = ReaderOptions::default().with_resolver(resolver.clone());
        let facade = ModuleDefinition::from_mem_with(image, options).unwrap();
        resolver.register(shared(facade)).unwrap();

        let mut module = consumer(resolver);
        let scope = ResolutionScope::AssemblyRef(
            module
                .add_assembly_reference(AssemblyNameReference::new(
                    "Facade",
                    AssemblyVersion::new(1, 0, 0, 0),
                ))
                .unwrap(),
        );
        let forwarded = module.add_type_reference(TypeReference::new(scope, "Lib", "Base"));
        let resolved = resolve_type(&mut module, TypeHandle::Reference(forwarded))
            .unwrap()
            .unwrap();
        let name = lock!(resolved.module().unwrap()).unwrap().name.clone();
        assert_eq!(name, "Lib.dll");
    }

    #[test]
    fn cyclic_scope_is_malformed() {
        let mut module = ModuleDefinition::new("Cycle.dll");
        let first =
            module.add_type_reference(TypeReference::new(ResolutionScope::None, "N", "First"));
        let second = module.add_type_reference(TypeReference::new(
            ResolutionScope::TypeRef(first),
            "",
            "Second",
        ));
        module.graph_mut().type_ref_mut(first).scope = ResolutionScope::TypeRef(second);

        let result = resolve_type(&mut module, TypeHandle::Reference(second));
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn unknown_scope_is_soft() {
        let mut module = ModuleDefinition::new("Alone.dll");
        let reference = module
            .add_assembly_reference(AssemblyNameReference::new(
                "Nowhere",
                AssemblyVersion::new(1, 0, 0, 0),
            ))
            .unwrap();
        let scope = ResolutionScope::AssemblyRef(reference);
        let ty = module.add_type_reference(TypeReference::new(scope, "N", "T"));
        assert!(resolve_type(&mut module, TypeHandle::Reference(ty)).unwrap().is_none());

        let local =
            module.add_type_reference(TypeReference::new(ResolutionScope::Module, "", "<Module>"));
        let resolved = resolve_type(&mut module, TypeHandle::Reference(local)).unwrap();
        assert!(resolved.unwrap().is_local());
    }
}
