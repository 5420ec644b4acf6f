//! Integration tests for reflection pattern detection during marking.

mod common;

use common::{filler, has_edge, type_of, Fixture};
use reachscope::prelude::*;

struct Scenario {
    fixture: Fixture,
    widget: TypeId,
    widget_ctor: MethodId,
    hidden: MethodId,
    other: MethodId,
    name: PropertyId,
    get_name: MethodId,
}

/// `class Widget { Widget(); void Hidden(); void Other(); string Name { get; } }`
fn scenario() -> Result<Scenario> {
    let mut fixture = Fixture::new()?;
    let string = fixture.core.string;
    let widget = fixture.class("Widget")?;
    let widget_ctor = fixture.ctor(widget)?;
    let hidden = fixture
        .universe
        .add_method(widget, MethodDef::new("Hidden").with_body(filler()))?;
    let other = fixture
        .universe
        .add_method(widget, MethodDef::new("Other").with_body(filler()))?;
    let get_name = fixture.universe.add_method(
        widget,
        MethodDef::new("get_Name")
            .with_modifiers(MethodModifiers::SPECIAL_NAME | MethodModifiers::HIDE_BY_SIG)
            .returning(string)
            .with_body(filler()),
    )?;
    let name = fixture.universe.add_property(
        widget,
        PropertyDef {
            name: "Name".to_string(),
            getter: Some(get_name),
            ..PropertyDef::default()
        },
    )?;
    Ok(Scenario {
        fixture,
        widget,
        widget_ctor,
        hidden,
        other,
        name,
        get_name,
    })
}

fn lookup(fixture: &Fixture, owner: TypeId, name: &str, params: usize, generics: usize) -> Result<MethodId> {
    fixture
        .universe
        .methods_named(owner, name)
        .find(|&m| {
            let def = fixture.universe.method(m);
            def.params.len() == params && def.generic_params.len() == generics
        })
        .ok_or_else(|| Error::Error(format!("{name} missing")))
}

/// `typeof(Widget).<api>("<member>")`
fn get_member(s: &mut Scenario, api: &str, member: &str) -> Result<MethodId> {
    let type_type = s.fixture.core.type_type;
    let api = lookup(&s.fixture, type_type, api, 1, 0)?;
    let mut ops = type_of(&s.fixture.core, s.widget);
    ops.push((OpCode::Ldstr, Operand::String(member.into())));
    ops.push((OpCode::Callvirt, Operand::Method(api.into())));
    ops.push((OpCode::Pop, Operand::None));
    s.fixture.main(ops)
}

#[test]
fn test_literal_get_method_keeps_only_the_named_method() -> Result<()> {
    let mut s = scenario()?;
    let main = get_member(&mut s, "GetMethod", "Hidden")?;
    let (hidden, other) = (s.hidden, s.other);
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(hidden));
    assert!(!context.annotations().is_marked(other));
    assert!(has_edge(
        &context,
        &DependencyNode::Method(main),
        &DependencyNode::Method(hidden),
        DependencyKind::AccessedViaReflection
    ));
    assert!(context.annotations().recorder().unsafe_reaching().is_empty());
    assert_eq!(context.diagnostics().count_code(DiagnosticCode::UnrecognizedReflectionPattern), 0);
    Ok(())
}

#[test]
fn test_get_property_keeps_accessors() -> Result<()> {
    let mut s = scenario()?;
    get_member(&mut s, "GetProperty", "Name")?;
    let (name, get_name) = (s.name, s.get_name);
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(name));
    assert!(context.annotations().is_marked(get_name));
    Ok(())
}

#[test]
fn test_unknown_member_name_is_reported() -> Result<()> {
    let mut s = scenario()?;
    let type_type = s.fixture.core.type_type;
    let get_method = lookup(&s.fixture, type_type, "GetMethod", 1, 0)?;
    let program = s.fixture.program;
    let string = s.fixture.core.string;
    let name_field = s.fixture.universe.add_field(
        program,
        FieldDef::new("memberName", string).with_flags(FieldAttributes::STATIC),
    )?;
    let mut ops = type_of(&s.fixture.core, s.widget);
    ops.extend([
        (OpCode::Ldsfld, Operand::Field(name_field.into())),
        (OpCode::Callvirt, Operand::Method(get_method.into())),
        (OpCode::Pop, Operand::None),
    ]);
    let main = s.fixture.main(ops)?;
    let hidden = s.hidden;
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(!context.annotations().is_marked(hidden));
    let facts = context.annotations().recorder().unsafe_reaching();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].callsite.caller, main);
    assert_eq!(facts[0].data.kind, ReflectionDataKind::Unknown);

    let diagnostics: Vec<&Diagnostic> = context
        .diagnostics()
        .iter()
        .filter(|d| d.code == DiagnosticCode::UnrecognizedReflectionPattern)
        .collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].origin.as_deref(), Some("App.Program::Main()"));
    Ok(())
}

#[test]
fn test_reflection_scanning_can_be_disabled() -> Result<()> {
    let mut s = scenario()?;
    get_member(&mut s, "GetMethod", "Hidden")?;
    let hidden = s.hidden;
    let config = LinkerConfig {
        scan_reflection: false,
        ..LinkerConfig::default()
    };
    let context = s.fixture.link(config)?;

    assert!(!context.annotations().is_marked(hidden));
    assert!(context.annotations().recorder().unsafe_reaching().is_empty());
    Ok(())
}

#[test]
fn test_generic_create_instance_keeps_default_constructor() -> Result<()> {
    let mut s = scenario()?;
    let activator = s.fixture.core.activator;
    let create = lookup(&s.fixture, activator, "CreateInstance", 0, 1)?;
    let spec = s.fixture.universe.add_member_ref(MemberRef::MethodSpec {
        method: create.into(),
        args: vec![TypeSig::Def(s.widget)],
    })?;
    let main = s.fixture.main(vec![
        (OpCode::Call, Operand::Method(MethodHandle::Ref(spec))),
        (OpCode::Pop, Operand::None),
    ])?;
    let (widget, widget_ctor) = (s.widget, s.widget_ctor);
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(widget_ctor));
    assert!(context.annotations().is_instantiated(widget));
    assert!(has_edge(
        &context,
        &DependencyNode::Method(main),
        &DependencyNode::Method(widget_ctor),
        DependencyKind::DefaultConstructorForReflection
    ));
    Ok(())
}

#[test]
fn test_create_instance_by_name() -> Result<()> {
    let mut s = scenario()?;
    let activator = s.fixture.core.activator;
    let create = lookup(&s.fixture, activator, "CreateInstance", 2, 0)?;
    s.fixture.main(vec![
        (OpCode::Ldstr, Operand::String(common::APP.into())),
        (OpCode::Ldstr, Operand::String("App.Widget".into())),
        (OpCode::Call, Operand::Method(create.into())),
        (OpCode::Pop, Operand::None),
    ])?;
    let widget_ctor = s.widget_ctor;
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(widget_ctor));
    assert!(context.annotations().recorder().unsafe_reaching().is_empty());
    Ok(())
}

#[test]
fn test_type_name_that_does_not_resolve() -> Result<()> {
    let mut s = scenario()?;
    let type_type = s.fixture.core.type_type;
    let get_type = lookup(&s.fixture, type_type, "GetType", 1, 0)?;
    s.fixture.main(vec![
        (OpCode::Ldstr, Operand::String("App.Gadget".into())),
        (OpCode::Call, Operand::Method(get_type.into())),
        (OpCode::Pop, Operand::None),
    ])?;
    let context = s.fixture.link(LinkerConfig::default())?;

    let facts = context.annotations().recorder().unsafe_reaching();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].data.kind, ReflectionDataKind::UnresolvedName);
    assert_eq!(facts[0].data.value.as_deref(), Some("App.Gadget"));
    Ok(())
}

#[test]
fn test_name_stored_in_local_is_followed() -> Result<()> {
    let mut s = scenario()?;
    let type_type = s.fixture.core.type_type;
    let get_method = lookup(&s.fixture, type_type, "GetMethod", 1, 0)?;
    let mut ops = vec![
        (OpCode::Ldstr, Operand::String("Other".into())),
        (OpCode::Stloc, Operand::Local(0)),
    ];
    ops.extend(type_of(&s.fixture.core, s.widget));
    ops.extend([
        (OpCode::Ldloc, Operand::Local(0)),
        (OpCode::Callvirt, Operand::Method(get_method.into())),
        (OpCode::Pop, Operand::None),
    ]);
    let main = s.fixture.main(ops)?;
    let string = s.fixture.core.string;
    if let Some(def) = s.fixture.universe.method_mut(main) {
        if let Some(body) = def.body.as_mut() {
            body.locals = vec![TypeSig::Def(string)];
        }
    }
    let (hidden, other) = (s.hidden, s.other);
    let context = s.fixture.link(LinkerConfig::default())?;

    assert!(context.annotations().is_marked(other));
    assert!(!context.annotations().is_marked(hidden));
    Ok(())
}
