//! Benchmarks for writing and re-reading a whole module.

extern crate dotmeta;

use criterion::{criterion_group, criterion_main, Criterion};
use dotmeta::prelude::*;
use std::hint::black_box;

/// A module with `count` classes, each holding a field, a generic method and a property
fn build_module(count: usize) -> ModuleDefinition {
    let mut module = ModuleDefinition::new_assembly(
        "Bench.dll",
        AssemblyDefinition::new("Bench", AssemblyVersion::new(1, 0, 0, 0)),
    );
    let corlib = module
        .add_assembly_reference(AssemblyNameReference::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
        ))
        .unwrap();
    let object = module.add_type_reference(TypeReference::new(
        ResolutionScope::AssemblyRef(corlib),
        "System",
        "Object",
    ));

    for index in 0..count {
        let ty = module
            .add_type(TypeDefinition::new(
                "Bench.Types",
                &format!("Type{index}"),
                TypeAttributes::PUBLIC,
                Some(TypeSig::Class(TypeHandle::Reference(object))),
            ))
            .unwrap();
        module
            .add_field(
                ty,
                FieldDefinition::new("value", FieldAttributes::PRIVATE, TypeSig::String),
            )
            .unwrap();
        let method = module
            .add_method(
                ty,
                MethodDefinition::new(
                    "Echo",
                    MethodAttributes::PUBLIC,
                    MethodSig {
                        generic_arity: 1,
                        ..MethodSig::new_instance(
                            TypeSig::MVar(GenericParamSig::unbound(0)),
                            vec![TypeSig::MVar(GenericParamSig::unbound(0))],
                        )
                    },
                ),
            )
            .unwrap();
        module
            .add_generic_parameter(
                GenericOwner::Method(method),
                "T",
                GenericParamAttributes::empty(),
            )
            .unwrap();
        module
            .add_property(
                ty,
                PropertyDefinition::new(
                    "Value",
                    PropertyAttributes::empty(),
                    PropertySig {
                        has_this: true,
                        property_type: TypeSig::String,
                        params: Vec::new(),
                    },
                ),
            )
            .unwrap();
    }
    module
}

fn bench_write_module(c: &mut Criterion) {
    let mut module = build_module(500);

    c.bench_function("module_write_500_types", |b| {
        b.iter(|| {
            let image = module.write().unwrap();
            black_box(image)
        });
    });
}

fn bench_read_module_immediate(c: &mut Criterion) {
    let image = build_module(500).write().unwrap();

    c.bench_function("module_read_immediate_500_types", |b| {
        b.iter(|| {
            let options = ReaderOptions::immediate();
            let module =
                ModuleDefinition::from_mem_with(black_box(image.clone()), options).unwrap();
            black_box(module)
        });
    });
}

fn bench_read_module_lazy_lookup(c: &mut Criterion) {
    let image = build_module(500).write().unwrap();

    c.bench_function("module_read_lazy_find_type", |b| {
        b.iter(|| {
            let mut module = ModuleDefinition::from_mem(black_box(image.clone())).unwrap();
            let found = module.find_type("Bench.Types", "Type250").unwrap();
            black_box(found)
        });
    });
}

criterion_group!(
    benches,
    bench_write_module,
    bench_read_module_immediate,
    bench_read_module_lazy_lookup
);
criterion_main!(benches);
