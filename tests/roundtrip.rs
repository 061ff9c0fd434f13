//! Write a module, read it back and check that the object graph survived.

use dotmeta::{
    metadata::{
        customattributes::{encode_custom_attribute, CustomAttributeArgument, CustomAttributeValue},
        model::{ClassLayout, PInvokeAttributes, PInvokeInfo},
        resolver::custom_attribute_value,
        security::{encode_permission_set, parse_permission_set, SecurityAttribute},
    },
    prelude::*,
};

struct Sample {
    module: ModuleDefinition,
}

/// An assembly touching most tables: nesting, members with constants, semantics,
/// generics, attributes, security, layout and P/Invoke
fn sample() -> Result<Sample> {
    let mut module = ModuleDefinition::new_assembly(
        "Sample.dll",
        AssemblyDefinition::new("Sample", AssemblyVersion::new(1, 2, 3, 4)),
    );
    let corlib = module.add_assembly_reference(AssemblyNameReference::new(
        "mscorlib",
        AssemblyVersion::new(4, 0, 0, 0),
    ))?;
    let scope = ResolutionScope::AssemblyRef(corlib);
    let object = module.add_type_reference(TypeReference::new(scope, "System", "Object"));
    let value_type = module.add_type_reference(TypeReference::new(scope, "System", "ValueType"));
    let attribute =
        module.add_type_reference(TypeReference::new(scope, "System", "ObsoleteAttribute"));
    let disposable = module.add_type_reference(TypeReference::new(scope, "System", "IDisposable"));
    let handler = module.add_type_reference(TypeReference::new(scope, "System", "EventHandler"));

    let widget = module.add_type(TypeDefinition::new(
        "Sample",
        "Widget",
        TypeAttributes::PUBLIC,
        Some(TypeSig::Class(TypeHandle::Reference(object))),
    ))?;
    module.add_interface(widget, TypeSig::Class(TypeHandle::Reference(disposable)))?;

    let mut limit = FieldDefinition::new(
        "Limit",
        FieldAttributes::PUBLIC | FieldAttributes::STATIC | FieldAttributes::LITERAL,
        TypeSig::I4,
    );
    limit.constant = Some(Constant::new(&ConstantValue::I4(42)));
    module.add_field(widget, limit)?;
    let name_field = module.add_field(
        widget,
        FieldDefinition::new("name", FieldAttributes::PRIVATE, TypeSig::String),
    )?;

    let get_name = module.add_method(
        widget,
        MethodDefinition::new(
            "get_Name",
            MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
            MethodSig::new_instance(TypeSig::String, vec![]),
        ),
    )?;
    let rename = module.add_method(
        widget,
        MethodDefinition::new(
            "Rename",
            MethodAttributes::PUBLIC,
            MethodSig::new_instance(TypeSig::Void, vec![TypeSig::String, TypeSig::I4]),
        ),
    )?;
    module.add_parameter(rename, ParameterDefinition::new("name", 1, ParamAttributes::empty()))?;
    let mut times = ParameterDefinition::new(
        "times",
        2,
        ParamAttributes::OPTIONAL | ParamAttributes::HAS_DEFAULT,
    );
    times.constant = Some(Constant::new(&ConstantValue::I4(1)));
    module.add_parameter(rename, times)?;

    let add_changed = module.add_method(
        widget,
        MethodDefinition::new(
            "add_Changed",
            MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
            MethodSig::new_instance(
                TypeSig::Void,
                vec![TypeSig::Class(TypeHandle::Reference(handler))],
            ),
        ),
    )?;

    let mut name_property = PropertyDefinition::new(
        "Name",
        PropertyAttributes::empty(),
        PropertySig {
            has_this: true,
            property_type: TypeSig::String,
            params: Vec::new(),
        },
    );
    name_property.getter = Some(get_name);
    module.add_property(widget, name_property)?;

    let mut changed = EventDefinition::new(
        "Changed",
        EventAttributes::empty(),
        TypeSig::Class(TypeHandle::Reference(handler)),
    );
    changed.add_method = Some(add_changed);
    module.add_event(widget, changed)?;

    let mut point = TypeDefinition::new(
        "",
        "Point",
        TypeAttributes::NESTED_PUBLIC | TypeAttributes::SEQUENTIAL_LAYOUT,
        Some(TypeSig::Class(TypeHandle::Reference(value_type))),
    );
    point.layout = Some(ClassLayout {
        packing_size: 4,
        class_size: 8,
    });
    let point = module.add_nested_type(widget, point)?;
    module.add_field(point, FieldDefinition::new("x", FieldAttributes::PUBLIC, TypeSig::I4))?;
    module.add_field(point, FieldDefinition::new("y", FieldAttributes::PUBLIC, TypeSig::I4))?;

    let boxed = module.add_type(TypeDefinition::new(
        "Sample",
        "Box`1",
        TypeAttributes::PUBLIC,
        Some(TypeSig::Class(TypeHandle::Reference(object))),
    ))?;
    let t = module.add_generic_parameter(
        GenericOwner::Type(boxed),
        "T",
        GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT,
    )?;
    module.add_generic_constraint(t, TypeSig::Class(TypeHandle::Reference(disposable)))?;
    module.add_field(
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

    let native = module.add_module_reference("user32.dll")?;
    let mut beep = MethodDefinition::new(
        "MessageBeep",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::PINVOKE_IMPL,
        MethodSig::new_static(TypeSig::Boolean, vec![TypeSig::U4]),
    );
    beep.pinvoke = Some(PInvokeInfo {
        flags: PInvokeAttributes::empty(),
        entry_point: "MessageBeep".to_string(),
        module: native,
    });
    module.add_method(widget, beep)?;

    let obsolete_ctor = module.add_member_reference(MemberReference::new(
        MemberRefParent::Type(TypeSig::Class(TypeHandle::Reference(attribute))),
        ".ctor",
        MemberSig::Method(MethodSig::new_instance(TypeSig::Void, vec![TypeSig::String])),
    ));
    let blob = encode_custom_attribute(&CustomAttributeValue {
        fixed_args: vec![CustomAttributeArgument::String(Some("use Gadget".to_string()))],
        named_args: Vec::new(),
    })?;
    module.add_custom_attribute(
        AttributeOwner::Type(widget),
        CustomAttribute::new(MethodHandle::Reference(obsolete_ctor), blob.clone()),
    )?;
    module.add_custom_attribute(
        AttributeOwner::Field(name_field),
        CustomAttribute::new(MethodHandle::Reference(obsolete_ctor), blob),
    )?;

    let permissions = encode_permission_set(&[SecurityAttribute {
        type_name: "System.Security.Permissions.SecurityPermissionAttribute, mscorlib".to_string(),
        named_args: Vec::new(),
    }])?;
    module.add_security_declaration(
        SecurityOwner::Assembly,
        SecurityDeclaration {
            token: Token::default(),
            action: SecurityAction::RequestMinimum,
            permission_set: permissions,
        },
    )?;

    Ok(Sample { module })
}

#[test]
fn file_roundtrip() -> Result<()> {
    let mut sample = sample()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Sample.dll");
    sample.module.write_to_file(&path, &WriterOptions::default())?;

    let mut module = ModuleDefinition::from_file(&path)?;
    assert_eq!(module.name, "Sample.dll");
    assert_eq!(module.mvid, sample.module.mvid);
    let assembly = module.assembly.clone().unwrap();
    assert_eq!(assembly.name, "Sample");
    assert_eq!(assembly.version, AssemblyVersion::new(1, 2, 3, 4));
    assert_eq!(module.assembly_references()?.len(), 1);
    assert_eq!(module.module_references()?.len(), 1);

    // <Module>, Widget, Point, Box`1
    assert_eq!(module.all_types()?.len(), 4);
    let widget = module.find_type("Sample", "Widget")?.unwrap();
    assert_eq!(module.interfaces(widget)?.len(), 1);

    let fields = module.fields(widget)?.to_vec();
    assert_eq!(fields.len(), 2);
    let limit = module.graph().field(fields[0]).clone();
    assert_eq!(limit.name, "Limit");
    assert_eq!(limit.constant.unwrap().value()?, ConstantValue::I4(42));

    let methods = module.methods(widget)?.to_vec();
    let names: Vec<String> = methods
        .iter()
        .map(|id| module.graph().method(*id).name.clone())
        .collect();
    assert_eq!(names, ["get_Name", "Rename", "add_Changed", "MessageBeep"]);

    let parameters = module.parameters(methods[1])?.to_vec();
    assert_eq!(parameters.len(), 2);
    let times = module.graph().parameter(parameters[1]).clone();
    assert_eq!(times.name, "times");
    assert_eq!(times.sequence, 2);
    assert_eq!(times.constant.unwrap().value()?, ConstantValue::I4(1));

    let pinvoke = module.graph().method(methods[3]).pinvoke.clone().unwrap();
    assert_eq!(pinvoke.entry_point, "MessageBeep");
    assert_eq!(module.graph().module_ref(pinvoke.module).name, "user32.dll");

    let property = module.properties(widget)?[0];
    assert_eq!(module.graph().property(property).getter, Some(methods[0]));
    let event = module.events(widget)?[0];
    assert_eq!(module.graph().event(event).add_method, Some(methods[2]));

    let nested = module.nested_types(widget)?.to_vec();
    assert_eq!(nested.len(), 1);
    let point = module.graph().type_def(nested[0]).clone();
    assert_eq!(point.name, "Point");
    assert_eq!(point.declaring_type, Some(widget));
    assert_eq!(
        point.layout,
        Some(ClassLayout {
            packing_size: 4,
            class_size: 8,
        })
    );
    assert_eq!(
        module.find_type_by_full_name("Sample.Widget/Point")?,
        Some(nested[0])
    );

    let boxed = module.find_type("Sample", "Box`1")?.unwrap();
    let t = module.type_generic_parameters(boxed)?[0];
    assert_eq!(module.graph().generic_parameter(t).name, "T");
    assert_eq!(module.constraints(t)?.len(), 1);
    let value = module.fields(boxed)?[0];
    let TypeSig::Var(placeholder) = module.graph().field(value).signature.clone() else {
        panic!("field of Box`1 is not a type placeholder");
    };
    assert_eq!(placeholder.position, 0);
    assert_eq!(placeholder.owner, Some(t));

    let attribute = module.custom_attributes(AttributeOwner::Type(widget))?[0].clone();
    let decoded = custom_attribute_value(&mut module, &attribute)?;
    assert_eq!(
        decoded.fixed_args,
        [CustomAttributeArgument::String(Some("use Gadget".to_string()))]
    );
    assert_eq!(module.custom_attributes(AttributeOwner::Field(fields[1]))?.len(), 1);

    let declaration = module.security_declarations(SecurityOwner::Assembly)?[0].clone();
    assert_eq!(declaration.action, SecurityAction::RequestMinimum);
    let permissions = parse_permission_set(&declaration.permission_set, |name| {
        Err(Error::Resolution(name.to_string()))
    })?
    .unwrap();
    assert_eq!(permissions.len(), 1);
    Ok(())
}

#[test]
fn rewrite_after_lazy_read() -> Result<()> {
    let image = sample()?.module.write()?;

    let mut lazy = ModuleDefinition::from_mem(image.clone())?;
    let widget = lazy.find_type("Sample", "Widget")?.unwrap();
    lazy.add_field(
        widget,
        FieldDefinition::new("extra", FieldAttributes::PRIVATE, TypeSig::R8),
    )?;
    let rewritten = lazy.write()?;

    let mut reread = ModuleDefinition::from_mem_with(rewritten, ReaderOptions::immediate())?;
    let widget = reread.find_type("Sample", "Widget")?.unwrap();
    let fields = reread.fields(widget)?.to_vec();
    assert_eq!(fields.len(), 3);
    assert_eq!(reread.graph().field(fields[2]).name, "extra");
    // nothing else was lost on the way
    assert_eq!(reread.all_types()?.len(), 4);
    assert_eq!(reread.custom_attributes(AttributeOwner::Type(widget))?.len(), 1);
    assert_eq!(reread.security_declarations(SecurityOwner::Assembly)?.len(), 1);
    Ok(())
}

#[test]
fn written_image_is_stable() -> Result<()> {
    let first = sample()?.module.write()?;
    let second = sample()?.module.write()?;
    assert_eq!(first, second);
    Ok(())
}

fn interface_reference(module: &mut ModuleDefinition, id: TypeDefId) -> Result<TypeRefId> {
    match module.interfaces(id)?[0].interface {
        TypeSig::Class(TypeHandle::Reference(reference)) => Ok(reference),
        ref other => panic!("unexpected interface {:?}", other),
    }
}

#[test]
fn attributes_on_rows_without_definitions() -> Result<()> {
    let mut module = sample()?.module;
    let widget = module.find_type("Sample", "Widget")?.unwrap();
    let constructor = module.custom_attributes(AttributeOwner::Type(widget))?[0].constructor;
    let disposable = interface_reference(&mut module, widget)?;
    let corlib = module.assembly_references()?[0];

    let holder = module.add_type(TypeDefinition::new(
        "Sample",
        "Holder`1",
        TypeAttributes::PUBLIC,
        None,
    ))?;
    let none = GenericParamAttributes::empty();
    let item = module.add_generic_parameter(GenericOwner::Type(holder), "T", none)?;
    module.add_generic_constraint(item, TypeSig::Class(TypeHandle::Reference(disposable)))?;
    module
        .type_specifications()?
        .push(TypeSpecification::new(TypeSig::SzArray(Box::new(TypeSig::I4))));

    let owners = [
        AttributeOwner::InterfaceImplementation(widget, 0),
        AttributeOwner::TypeReference(disposable),
        AttributeOwner::GenericParameterConstraint(item, 0),
        AttributeOwner::TypeSpecification(0),
        AttributeOwner::AssemblyReference(corlib),
    ];
    for owner in owners {
        let attribute = CustomAttribute::new(constructor, vec![0x01, 0x00, 0x00, 0x00]);
        module.add_custom_attribute(owner, attribute)?;
    }

    let image = module.write()?;
    let check = |reread: &mut ModuleDefinition| -> Result<()> {
        let widget = reread.find_type("Sample", "Widget")?.unwrap();
        let holder = reread.find_type("Sample", "Holder`1")?.unwrap();
        let item = reread.type_generic_parameters(holder)?[0];
        reread.constraints(item)?;
        let disposable = interface_reference(reread, widget)?;
        let corlib = reread.assembly_references()?[0];
        let array = TypeSig::SzArray(Box::new(TypeSig::I4));
        let spec = reread
            .type_specifications()?
            .iter()
            .position(|specification| specification.signature == array)
            .unwrap();

        for owner in [
            AttributeOwner::InterfaceImplementation(widget, 0),
            AttributeOwner::TypeReference(disposable),
            AttributeOwner::GenericParameterConstraint(item, 0),
            AttributeOwner::TypeSpecification(spec),
            AttributeOwner::AssemblyReference(corlib),
        ] {
            assert!(reread.has_custom_attributes(owner)?, "{:?}", owner);
            let attributes = reread.custom_attributes(owner)?;
            assert_eq!(attributes.len(), 1, "{:?}", owner);
            assert_eq!(attributes[0].blob, vec![0x01, 0x00, 0x00, 0x00]);
        }
        Ok(())
    };

    let mut lazy = ModuleDefinition::from_mem(image)?;
    check(&mut lazy)?;

    // a second generation loads the owners through load_all
    let second = ModuleDefinition::from_mem(lazy.write()?)?.write()?;
    let mut rewritten = ModuleDefinition::from_mem(second)?;
    check(&mut rewritten)?;
    Ok(())
}
