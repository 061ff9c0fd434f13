//! Resolving references against modules that were written and read back.

use std::sync::{Arc, Mutex};

use dotmeta::prelude::*;

fn shared(image: Vec<u8>, resolver: &Arc<DefaultAssemblyResolver>) -> Result<ModuleRc> {
    let module = ModuleDefinition::from_mem_with(
        image,
        ReaderOptions::default().with_resolver(resolver.clone()),
    )?;
    Ok(Arc::new(Mutex::new(module)))
}

/// `Lib.Base` with `Run(int)` and `count`, `Lib.Derived : Base`, `Lib.Outer/Inner`
fn library_image() -> Result<Vec<u8>> {
    let mut module = ModuleDefinition::new_assembly(
        "Lib.dll",
        AssemblyDefinition::new("Lib", AssemblyVersion::new(1, 0, 0, 0)),
    );
    let base = module.add_type(TypeDefinition::new("Lib", "Base", TypeAttributes::PUBLIC, None))?;
    module.add_method(
        base,
        MethodDefinition::new(
            "Run",
            MethodAttributes::PUBLIC,
            MethodSig::new_instance(TypeSig::Void, vec![TypeSig::I4]),
        ),
    )?;
    module.add_method(
        base,
        MethodDefinition::new(
            "Run",
            MethodAttributes::PUBLIC,
            MethodSig::new_instance(TypeSig::Void, vec![TypeSig::String]),
        ),
    )?;
    module.add_field(base, FieldDefinition::new("count", FieldAttributes::PUBLIC, TypeSig::I4))?;
    module.add_type(TypeDefinition::new(
        "Lib",
        "Derived",
        TypeAttributes::PUBLIC,
        Some(TypeSig::Class(TypeHandle::Definition(base))),
    ))?;
    let outer = module.add_type(TypeDefinition::new("Lib", "Outer", TypeAttributes::PUBLIC, None))?;
    module.add_nested_type(
        outer,
        TypeDefinition::new("", "Inner", TypeAttributes::NESTED_PUBLIC, None),
    )?;
    module.write()
}

/// `Facade` forwarding `Lib.Base` and `Lib.Outer` to `Lib`
fn facade_image() -> Result<Vec<u8>> {
    let mut facade = ModuleDefinition::new_assembly(
        "Facade.dll",
        AssemblyDefinition::new("Facade", AssemblyVersion::new(1, 0, 0, 0)),
    );
    let lib = facade.add_assembly_reference(AssemblyNameReference::new(
        "Lib",
        AssemblyVersion::new(1, 0, 0, 0),
    ))?;
    facade.exported_types()?.push(ExportedType::forwarder("Lib", "Base", lib));
    facade.exported_types()?.push(ExportedType::forwarder("Lib", "Outer", lib));
    facade.write()
}

fn registry() -> Result<Arc<DefaultAssemblyResolver>> {
    let resolver = Arc::new(DefaultAssemblyResolver::new());
    resolver.register(shared(library_image()?, &resolver)?)?;
    resolver.register(shared(facade_image()?, &resolver)?)?;
    Ok(resolver)
}

fn consumer(
    resolver: Arc<DefaultAssemblyResolver>,
    assembly: &str,
) -> Result<(ModuleDefinition, ResolutionScope)> {
    let mut module = ModuleDefinition::new("App.dll");
    module.set_assembly_resolver(resolver);
    let reference = module.add_assembly_reference(AssemblyNameReference::new(
        assembly,
        AssemblyVersion::new(1, 0, 0, 0),
    ))?;
    Ok((module, ResolutionScope::AssemblyRef(reference)))
}

fn defining_module(resolved: Option<&ModuleRc>) -> String {
    resolved.unwrap().lock().unwrap().name.clone()
}

#[test]
fn members_found_on_base_types() -> Result<()> {
    let (mut module, scope) = consumer(registry()?, "Lib")?;
    let derived = module.add_type_reference(TypeReference::new(scope, "Lib", "Derived"));
    let parent = MemberRefParent::Type(TypeSig::Class(TypeHandle::Reference(derived)));

    let run_string = module.add_member_reference(MemberReference::new(
        parent.clone(),
        "Run",
        MemberSig::Method(MethodSig::new_instance(TypeSig::Void, vec![TypeSig::String])),
    ));
    let resolved = resolve_method(&mut module, MethodHandle::Reference(run_string))?.unwrap();
    let shared = resolved.module().unwrap().clone();
    {
        let library = shared.lock().unwrap();
        let method = library.graph().method(resolved.id());
        assert_eq!(method.signature.params, [TypeSig::String]);
        assert_eq!(library.name, "Lib.dll");
    }

    let count = module.add_member_reference(MemberReference::new(
        parent.clone(),
        "count",
        MemberSig::Field(TypeSig::I4),
    ));
    assert!(resolve_field(&mut module, FieldHandle::Reference(count))?.is_some());

    let wrong_type = module.add_member_reference(MemberReference::new(
        parent,
        "count",
        MemberSig::Field(TypeSig::I8),
    ));
    assert!(resolve_field(&mut module, FieldHandle::Reference(wrong_type))?.is_none());
    Ok(())
}

#[test]
fn forwarded_types_resolve_once() -> Result<()> {
    let (mut module, scope) = consumer(registry()?, "Facade")?;

    let base = module.add_type_reference(TypeReference::new(scope, "Lib", "Base"));
    let resolved = resolve_type(&mut module, TypeHandle::Reference(base))?.unwrap();
    assert!(!resolved.is_local());
    assert_eq!(defining_module(resolved.module()), "Lib.dll");

    // nested types follow the forwarder of their outermost type
    let outer = module.add_type_reference(TypeReference::new(scope, "Lib", "Outer"));
    let nested = TypeReference::new(ResolutionScope::TypeRef(outer), "", "Inner");
    let inner = module.add_type_reference(nested);
    let resolved = resolve_type(&mut module, TypeHandle::Reference(inner))?.unwrap();
    assert_eq!(defining_module(resolved.module()), "Lib.dll");

    let missing = module.add_type_reference(TypeReference::new(scope, "Lib", "Derived"));
    assert!(resolve_type(&mut module, TypeHandle::Reference(missing))?.is_none());
    Ok(())
}

#[test]
fn unknown_assembly_is_not_an_error() -> Result<()> {
    let (mut module, scope) = consumer(registry()?, "Elsewhere")?;
    let stray = module.add_type_reference(TypeReference::new(scope, "Lib", "Base"));
    assert!(resolve_type(&mut module, TypeHandle::Reference(stray))?.is_none());
    Ok(())
}
