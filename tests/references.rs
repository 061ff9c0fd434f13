//! Reference handling across modules: importing, interning and the rows it produces.

use dotmeta::{
    metadata::{
        model::EntityHandle,
        root::Root,
        signatures::{parse_type_spec_signature, RowTokens},
        streams::{Blob, TablesHeader},
        tables::{CodedIndexType, GenericParamRaw, MemberRefRaw, TypeSpecRaw},
    },
    prelude::*,
};

/// The `#~` stream of a written image
fn tables(image: &[u8]) -> Result<(TablesHeader, &[u8])> {
    let root = Root::read(image)?;
    let Some(stream) = root.stream_data(image, "#~")? else {
        return Err(Error::Empty);
    };
    Ok((TablesHeader::from(stream)?, stream))
}

fn row_count(image: &[u8], table: TableId) -> Result<u32> {
    Ok(tables(image)?.0.info.row_count(table))
}

fn library() -> Result<(ModuleDefinition, TypeDefId, FieldId, MethodId)> {
    let mut module = ModuleDefinition::new_assembly(
        "Lib.dll",
        AssemblyDefinition::new("Lib", AssemblyVersion::new(2, 0, 0, 0)),
    );

    let boxed = module.add_type(TypeDefinition::new(
        "Lib",
        "Box`1",
        TypeAttributes::PUBLIC,
        None,
    ))?;
    let t = module.add_generic_parameter(
        GenericOwner::Type(boxed),
        "T",
        GenericParamAttributes::empty(),
    )?;
    let value = module.add_field(
        boxed,
        FieldDefinition::new(
            "value",
            FieldAttributes::PUBLIC,
            TypeSig::Var(GenericParamSig {
                position: 0,
                owner: Some(t),
            }),
        ),
    )?;

    let text = module.add_type(TypeDefinition::new(
        "Lib",
        "Text",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
        None,
    ))?;
    let format = module.add_method(
        text,
        MethodDefinition::new(
            "Format",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSig::new_static(
                TypeSig::String,
                vec![TypeSig::String, TypeSig::Object, TypeSig::Object],
            ),
        ),
    )?;
    Ok((module, boxed, value, format))
}

#[test]
fn generic_instance_is_interned() -> Result<()> {
    let (mut library, boxed, value, _) = library()?;
    let mut app = ModuleDefinition::new("App.dll");

    let imported = app.import_type(&mut library, TypeHandle::Definition(boxed))?;
    let TypeHandle::Reference(box_ref) = imported else {
        panic!("types of other modules import as references");
    };
    let box_of_int = TypeSig::GenericInst {
        generic: Box::new(TypeSig::Class(TypeHandle::Reference(box_ref))),
        arguments: vec![TypeSig::I4],
    };

    let holder = app.add_type(TypeDefinition::new("App", "Holder", TypeAttributes::PUBLIC, None))?;
    app.add_field(
        holder,
        FieldDefinition::new("boxed", FieldAttributes::PUBLIC, box_of_int.clone()),
    )?;
    // Box<int32>::value from two call sites
    for _ in 0..2 {
        let imported = app.import_field(&mut library, FieldHandle::Definition(value))?;
        let FieldHandle::Reference(open) = imported else {
            panic!("fields of other modules import as references");
        };
        let signature = app.graph().member_ref(open).signature.clone();
        app.add_member_reference(MemberReference::new(
            MemberRefParent::Type(box_of_int.clone()),
            "value",
            signature,
        ));
    }

    let image = app.write()?;
    assert_eq!(row_count(&image, TableId::TypeSpec)?, 1);

    let root = Root::read(&image)?;
    let blobs = Blob::from(root.stream_data(&image, "#Blob")?.unwrap())?;
    let (header, stream) = tables(&image)?;
    let spec = header.table::<TypeSpecRaw>(stream)?.get(1)?;
    let decoded = parse_type_spec_signature(blobs.get(spec.signature as usize)?, &mut RowTokens)?;
    let TypeSig::GenericInst { generic, arguments } = decoded else {
        panic!("TypeSpec is not a generic instance");
    };
    assert!(matches!(*generic, TypeSig::Class(TypeHandle::Reference(_))));
    assert_eq!(arguments, [TypeSig::I4]);

    // Box<int32>::value once, plus the open Box`1::value of the imports
    let refs = header.table::<MemberRefRaw>(stream)?;
    let on_spec = refs
        .iter()
        .filter(|row| matches!(row, Ok(row) if row.class.table_id() == Some(TableId::TypeSpec)))
        .count();
    assert_eq!(on_spec, 1);

    let mut reread = ModuleDefinition::from_mem(image)?;
    let holder = reread.find_type("App", "Holder")?.unwrap();
    let field = reread.fields(holder)?[0];
    let TypeSig::GenericInst { generic, arguments } = reread.graph().field(field).signature.clone()
    else {
        panic!("field type is not a generic instance");
    };
    let TypeSig::Class(handle) = *generic else {
        panic!("generic instance of a non class");
    };
    assert_eq!(reread.graph().type_full_name(handle), "Lib.Box`1");
    assert_eq!(arguments, [TypeSig::I4]);
    Ok(())
}

#[test]
fn method_imported_twice_is_one_row() -> Result<()> {
    let (mut library, _, _, format) = library()?;
    let mut app = ModuleDefinition::new("App.dll");

    let first = app.import_method(&mut library, MethodHandle::Definition(format))?;
    let second = app.import_method(&mut library, MethodHandle::Definition(format))?;
    assert_ne!(first, second);
    assert_eq!(app.assembly_references()?.len(), 1);

    let image = app.write()?;
    assert_eq!(row_count(&image, TableId::MemberRef)?, 1);
    assert_eq!(row_count(&image, TableId::TypeRef)?, 1);
    assert_eq!(row_count(&image, TableId::AssemblyRef)?, 1);

    let verbatim = app.write_with(&WriterOptions::verbatim())?;
    assert_eq!(row_count(&verbatim, TableId::MemberRef)?, 2);

    let mut reread = ModuleDefinition::from_mem_with(image, ReaderOptions::immediate())?;
    let token = Token::from_parts(TableId::MemberRef, 1);
    let Some(EntityHandle::MemberReference(id)) = reread.lookup_token(token)? else {
        panic!("MemberRef 1 is missing");
    };
    let reference = reread.graph().member_ref(id);
    assert_eq!(reference.name, "Format");
    let MemberSig::Method(signature) = &reference.signature else {
        panic!("Format is not a method reference");
    };
    assert_eq!(signature.params.len(), 3);
    Ok(())
}

#[test]
fn generic_parameters_sorted_on_disk() -> Result<()> {
    let mut module = ModuleDefinition::new("Sorted.dll");
    let first = module.add_type(TypeDefinition::new("", "First`1", TypeAttributes::PUBLIC, None))?;
    let second =
        module.add_type(TypeDefinition::new("", "Second`2", TypeAttributes::PUBLIC, None))?;
    let method = module.add_method(
        first,
        MethodDefinition::new(
            "Make",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSig {
                generic_arity: 1,
                ..MethodSig::new_static(TypeSig::Void, vec![])
            },
        ),
    )?;

    // declared in an order unrelated to the owners
    let none = GenericParamAttributes::empty();
    module.add_generic_parameter(GenericOwner::Type(second), "A", none)?;
    module.add_generic_parameter(GenericOwner::Method(method), "M", none)?;
    module.add_generic_parameter(GenericOwner::Type(first), "T", none)?;
    module.add_generic_parameter(GenericOwner::Type(second), "B", none)?;

    let image = module.write()?;
    let (header, stream) = tables(&image)?;
    let mut keys = Vec::new();
    for row in header.table::<GenericParamRaw>(stream)?.iter() {
        let row = row?;
        keys.push((CodedIndexType::TypeOrMethodDef.compress(row.owner)?, row.number));
    }
    assert_eq!(keys.len(), 4);
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    assert!(header.sorted & TableId::GenericParam.bit() != 0);

    let mut reread = ModuleDefinition::from_mem(image)?;
    let second = reread.find_type("", "Second`2")?.unwrap();
    let names: Vec<String> = reread
        .type_generic_parameters(second)?
        .to_vec()
        .into_iter()
        .map(|id| reread.graph().generic_parameter(id).name.clone())
        .collect();
    assert_eq!(names, ["A", "B"]);
    Ok(())
}

#[test]
fn shadowed_owner_name_binds_by_name() -> Result<()> {
    // Two generic types sharing one full name
    let mut library = ModuleDefinition::new("Shadow.dll");
    let outer = library.add_type(TypeDefinition::new("N", "Box`1", TypeAttributes::PUBLIC, None))?;
    let shadow = library.add_type(TypeDefinition::new("N", "Box`1", TypeAttributes::PUBLIC, None))?;
    let none = GenericParamAttributes::empty();
    let outer_t = library.add_generic_parameter(GenericOwner::Type(outer), "T", none)?;
    library.add_generic_parameter(GenericOwner::Type(shadow), "T", none)?;

    // a field of the shadow typed with the placeholder of the other type
    let field = library.add_field(
        shadow,
        FieldDefinition::new(
            "value",
            FieldAttributes::PUBLIC,
            TypeSig::Var(GenericParamSig {
                position: 0,
                owner: Some(outer_t),
            }),
        ),
    )?;

    let mut app = ModuleDefinition::new("App.dll");
    let handle = app.import_field(&mut library, FieldHandle::Definition(field))?;
    let FieldHandle::Reference(imported) = handle else {
        panic!("fields of other modules import as references");
    };

    let reference = app.graph().member_ref(imported).clone();
    let MemberRefParent::Type(TypeSig::Class(TypeHandle::Reference(parent))) = reference.parent
    else {
        panic!("unexpected parent {:?}", reference.parent);
    };
    let MemberSig::Field(TypeSig::Var(placeholder)) = reference.signature else {
        panic!("unexpected signature {:?}", reference.signature);
    };
    // the owner is matched by name, so the placeholder lands on the shadow's parameter
    let mirrored = app.graph().type_ref(parent).generic_parameters.clone();
    assert_eq!(placeholder.owner, Some(mirrored[0]));
    Ok(())
}
