//! Integration tests for override and interface gating.
//!
//! Each scenario builds a small hierarchy and flips one condition at a time: whether the
//! declaring type of the override is marked, instantiated, or has an abstract base.

mod common;

use common::{filler, has_edge, last_hop, Fixture};
use reachscope::prelude::*;

struct Hierarchy {
    fixture: Fixture,
    derived: TypeId,
    base_foo: MethodId,
    derived_foo: MethodId,
    derived_ctor: MethodId,
}

/// `class Base { virtual Foo() }` and `class Derived : Base { override Foo() }`.
fn hierarchy(abstract_base: bool) -> Result<Hierarchy> {
    let mut fixture = Fixture::new()?;
    let object = fixture.core.object;
    let base_def = TypeDef::new(common::APP, "Base").with_base(object);
    let base_def = if abstract_base {
        base_def.with_flags(TypeAttributes::ABSTRACT)
    } else {
        base_def
    };
    let base = fixture.universe.add_type(fixture.app, base_def)?;
    let base_foo = if abstract_base {
        fixture.universe.add_method(
            base,
            MethodDef::new("Foo").with_modifiers(
                MethodModifiers::VIRTUAL
                    | MethodModifiers::ABSTRACT
                    | MethodModifiers::NEW_SLOT
                    | MethodModifiers::HIDE_BY_SIG,
            ),
        )?
    } else {
        fixture.universe.add_method(
            base,
            MethodDef::new("Foo")
                .with_modifiers(
                    MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT | MethodModifiers::HIDE_BY_SIG,
                )
                .with_body(filler()),
        )?
    };

    let derived = fixture.class_with_base("Derived", base)?;
    let derived_ctor = fixture.ctor(derived)?;
    let derived_foo = fixture.universe.add_method(
        derived,
        MethodDef::new("Foo")
            .with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::HIDE_BY_SIG)
            .with_body(filler()),
    )?;
    Ok(Hierarchy {
        fixture,
        derived,
        base_foo,
        derived_foo,
        derived_ctor,
    })
}

/// `base.Foo()` on a null receiver, plus an optional mention of `Derived`.
fn call_base(h: &Hierarchy, mention_derived: bool, construct_derived: bool) -> Vec<(OpCode, Operand)> {
    let mut ops = vec![
        (OpCode::Ldnull, Operand::None),
        (OpCode::Callvirt, Operand::Method(h.base_foo.into())),
    ];
    if mention_derived {
        ops.push((OpCode::Ldtoken, Operand::Type(h.derived.into())));
        ops.push((OpCode::Pop, Operand::None));
    }
    if construct_derived {
        ops.push((OpCode::Newobj, Operand::Method(h.derived_ctor.into())));
        ops.push((OpCode::Pop, Operand::None));
    }
    ops
}

#[test]
fn test_override_on_uninstantiated_type_is_removed() -> Result<()> {
    let mut h = hierarchy(false)?;
    let ops = call_base(&h, true, false);
    h.fixture.main(ops)?;
    let (derived, derived_foo, base_foo) = (h.derived, h.derived_foo, h.base_foo);
    let context = h.fixture.link(LinkerConfig::default())?;

    let annotations = context.annotations();
    assert!(annotations.is_marked(base_foo));
    assert!(annotations.is_marked(derived));
    assert!(!annotations.is_instantiated(derived));
    assert!(!annotations.is_marked(derived_foo));
    Ok(())
}

#[test]
fn test_instantiation_keeps_override() -> Result<()> {
    let mut h = hierarchy(false)?;
    let ops = call_base(&h, true, true);
    h.fixture.main(ops)?;
    let (derived, derived_foo) = (h.derived, h.derived_foo);
    let context = h.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_instantiated(derived));
    assert!(context.annotations().is_marked(derived_foo));
    assert_eq!(
        last_hop(&context, derived_foo),
        Some((DependencyNode::Type(derived), DependencyKind::OverrideOnInstantiatedType))
    );
    Ok(())
}

#[test]
fn test_override_kept_without_override_removal() -> Result<()> {
    let mut h = hierarchy(false)?;
    let ops = call_base(&h, true, false);
    h.fixture.main(ops)?;
    let (derived_foo, base_foo) = (h.derived_foo, h.base_foo);
    let config = LinkerConfig::default().with_optimizations(Optimizations::empty());
    let context = h.fixture.link(config)?;

    assert!(context.annotations().is_marked(derived_foo));
    assert_eq!(
        last_hop(&context, derived_foo),
        Some((DependencyNode::Method(base_foo), DependencyKind::Override))
    );
    Ok(())
}

#[test]
fn test_override_of_abstract_base_is_kept() -> Result<()> {
    let mut h = hierarchy(true)?;
    let ops = call_base(&h, true, false);
    h.fixture.main(ops)?;
    let (derived_foo, base_foo) = (h.derived_foo, h.base_foo);
    let context = h.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(derived_foo));
    assert_eq!(
        last_hop(&context, derived_foo),
        Some((DependencyNode::Method(base_foo), DependencyKind::Override))
    );
    Ok(())
}

#[test]
fn test_unmarked_declaring_type_blocks_override() -> Result<()> {
    let mut h = hierarchy(true)?;
    let ops = call_base(&h, false, false);
    h.fixture.main(ops)?;
    let (derived, derived_foo) = (h.derived, h.derived_foo);
    let config = LinkerConfig::default().with_optimizations(Optimizations::empty());
    let context = h.fixture.link(config)?;

    assert!(!context.annotations().is_marked(derived));
    assert!(!context.annotations().is_marked(derived_foo));
    Ok(())
}

#[test]
fn test_override_marks_its_base() -> Result<()> {
    let mut h = hierarchy(false)?;
    let (derived_ctor, derived_foo, base_foo) = (h.derived_ctor, h.derived_foo, h.base_foo);
    h.fixture.main(vec![
        (OpCode::Newobj, Operand::Method(derived_ctor.into())),
        (OpCode::Callvirt, Operand::Method(derived_foo.into())),
    ])?;
    let context = h.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(base_foo));
    assert!(has_edge(
        &context,
        &DependencyNode::Method(derived_foo),
        &DependencyNode::Method(base_foo),
        DependencyKind::BaseMethod
    ));
    Ok(())
}

struct Shapes {
    fixture: Fixture,
    shape: TypeId,
    area: MethodId,
    square: TypeId,
    square_ctor: MethodId,
    square_area: MethodId,
    implementation: InterfaceImplId,
}

/// `interface IShape { Area() }` and `class Square : IShape`.
fn shapes() -> Result<Shapes> {
    let mut fixture = Fixture::new()?;
    let shape = fixture.interface("IShape")?;
    let area = fixture.universe.add_method(
        shape,
        MethodDef::new("Area").with_modifiers(
            MethodModifiers::VIRTUAL
                | MethodModifiers::ABSTRACT
                | MethodModifiers::NEW_SLOT
                | MethodModifiers::HIDE_BY_SIG,
        ),
    )?;
    let square = fixture.class("Square")?;
    let implementation = fixture.universe.add_interface_impl(square, shape)?;
    let square_ctor = fixture.ctor(square)?;
    let square_area = fixture.universe.add_method(
        square,
        MethodDef::new("Area")
            .with_modifiers(
                MethodModifiers::VIRTUAL
                    | MethodModifiers::FINAL
                    | MethodModifiers::NEW_SLOT
                    | MethodModifiers::HIDE_BY_SIG,
            )
            .with_body(filler()),
    )?;
    Ok(Shapes {
        fixture,
        shape,
        area,
        square,
        square_ctor,
        square_area,
        implementation,
    })
}

#[test]
fn test_interface_implementation_on_instantiated_type() -> Result<()> {
    let mut s = shapes()?;
    let (area, square_ctor) = (s.area, s.square_ctor);
    s.fixture.main(vec![
        (OpCode::Newobj, Operand::Method(square_ctor.into())),
        (OpCode::Callvirt, Operand::Method(area.into())),
    ])?;
    let (shape, square, square_area, implementation) =
        (s.shape, s.square, s.square_area, s.implementation);
    let context = s.fixture.link(LinkerConfig::default())?;

    let annotations = context.annotations();
    assert!(annotations.is_marked(shape));
    assert!(annotations.is_marked(implementation));
    assert!(annotations.is_marked(square_area));
    assert!(has_edge(
        &context,
        &DependencyNode::Type(square),
        &DependencyNode::InterfaceImpl(implementation),
        DependencyKind::InterfaceImplementationOnType
    ));
    Ok(())
}

#[test]
fn test_unused_interface_is_not_kept() -> Result<()> {
    let mut s = shapes()?;
    let square_ctor = s.square_ctor;
    s.fixture.main(vec![(OpCode::Newobj, Operand::Method(square_ctor.into()))])?;
    let (shape, square, square_area, implementation) =
        (s.shape, s.square, s.square_area, s.implementation);
    let context = s.fixture.link(LinkerConfig::default())?;

    let annotations = context.annotations();
    assert!(annotations.is_instantiated(square));
    assert!(!annotations.is_marked(shape));
    assert!(!annotations.is_marked(implementation));
    assert!(!annotations.is_marked(square_area));
    Ok(())
}

#[test]
fn test_interface_kept_when_optimization_is_off() -> Result<()> {
    let mut s = shapes()?;
    let square_ctor = s.square_ctor;
    s.fixture.main(vec![(OpCode::Newobj, Operand::Method(square_ctor.into()))])?;
    let (shape, implementation) = (s.shape, s.implementation);
    let config = LinkerConfig::default().with_optimizations(Optimizations::OVERRIDE_REMOVAL);
    let context = s.fixture.link(config)?;

    assert!(context.annotations().is_marked(implementation));
    assert!(context.annotations().is_marked(shape));
    Ok(())
}

#[test]
fn test_default_interface_method_kept_for_instantiated_type() -> Result<()> {
    let mut fixture = Fixture::new()?;
    let abstract_virtual = MethodModifiers::VIRTUAL
        | MethodModifiers::ABSTRACT
        | MethodModifiers::NEW_SLOT
        | MethodModifiers::HIDE_BY_SIG;

    let greeter = fixture.interface("IGreeter")?;
    let greet = fixture
        .universe
        .add_method(greeter, MethodDef::new("Greet").with_modifiers(abstract_virtual))?;

    let polite = fixture.interface("IPoliteGreeter")?;
    let polite_greet = fixture.universe.add_method(
        polite,
        MethodDef::new("App.IGreeter.Greet")
            .with_access(Accessibility::Private)
            .with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::FINAL | MethodModifiers::HIDE_BY_SIG)
            .overriding(greet.into())
            .with_body(filler()),
    )?;

    let host = fixture.class("Host")?;
    fixture.universe.add_interface_impl(host, greeter)?;
    let polite_impl = fixture.universe.add_interface_impl(host, polite)?;
    let host_ctor = fixture.ctor(host)?;

    fixture.main(vec![
        (OpCode::Newobj, Operand::Method(host_ctor.into())),
        (OpCode::Callvirt, Operand::Method(greet.into())),
    ])?;
    let context = fixture.link(LinkerConfig::default())?;

    let annotations = context.annotations();
    assert!(annotations.is_marked(polite_greet));
    assert!(annotations.is_marked(polite_impl));
    assert!(has_edge(
        &context,
        &DependencyNode::Type(host),
        &DependencyNode::Method(polite_greet),
        DependencyKind::DefaultImplementationForImplementingType
    ));
    assert!(has_edge(
        &context,
        &DependencyNode::Type(host),
        &DependencyNode::InterfaceImpl(polite_impl),
        DependencyKind::InterfaceImplementationOnType
    ));
    Ok(())
}
