//! Integration tests for roots, assembly actions and unresolved references.

mod common;

use common::{filler, Fixture, APP};
use reachscope::prelude::*;

fn mark(universe: Universe, config: LinkerConfig) -> Result<LinkContext> {
    let mut context = LinkContext::new(universe, config)?;
    context.mark()?;
    Ok(context)
}

#[test]
fn test_visible_members_root_skips_private_members() -> Result<()> {
    let mut fixture = Fixture::new()?;
    let api = fixture.class("Api")?;
    let run = fixture
        .universe
        .add_method(api, MethodDef::new("Run").with_body(filler()))?;
    let helper = fixture.universe.add_method(
        api,
        MethodDef::new("Helper")
            .with_access(Accessibility::Private)
            .with_body(filler()),
    )?;
    let open = fixture.universe.add_type(
        fixture.app,
        TypeDef::new(APP, "Open").nested_in(api).with_base(fixture.core.object),
    )?;
    let secret = fixture.universe.add_type(
        fixture.app,
        TypeDef::new(APP, "Secret")
            .nested_in(api)
            .with_access(Accessibility::Private)
            .with_base(fixture.core.object),
    )?;

    let config = LinkerConfig::default().with_root(APP, RootVisibility::VisibleMembers);
    let context = mark(fixture.universe, config)?;
    let annotations = context.annotations();

    assert!(annotations.is_marked(api));
    assert!(annotations.is_marked(run));
    assert!(annotations.is_marked(open));
    assert!(!annotations.is_marked(helper));
    assert!(!annotations.is_marked(secret));
    Ok(())
}

#[test]
fn test_all_root_keeps_private_members() -> Result<()> {
    let mut fixture = Fixture::new()?;
    let api = fixture.class("Api")?;
    let helper = fixture.universe.add_method(
        api,
        MethodDef::new("Helper")
            .with_access(Accessibility::Private)
            .with_body(filler()),
    )?;

    let config = LinkerConfig::default().with_root(APP, RootVisibility::All);
    let context = mark(fixture.universe, config)?;

    assert!(context.annotations().is_marked(helper));
    let entry = context
        .annotations()
        .recorder()
        .entry(&DependencyNode::Method(helper))
        .map(|info| info.kind);
    assert_eq!(entry, Some(EntryKind::RootAssembly));
    Ok(())
}

#[test]
fn test_copy_action_keeps_unreferenced_code() -> Result<()> {
    let mut fixture = Fixture::new()?;
    fixture.main(Vec::new())?;
    let unused = fixture.class("Unused")?;
    let work = fixture
        .universe
        .add_method(unused, MethodDef::new("Work").with_body(filler()))?;

    let config = LinkerConfig::default().with_action(APP, AssemblyAction::Copy);
    let context = fixture.link(config)?;
    let annotations = context.annotations();

    assert!(annotations.is_marked(unused));
    assert!(annotations.is_marked(work));
    assert_eq!(annotations.get_method_action(work), MethodAction::ForceParse);
    Ok(())
}

#[test]
fn test_link_action_drops_unreferenced_code() -> Result<()> {
    let mut fixture = Fixture::new()?;
    fixture.main(Vec::new())?;
    let unused = fixture.class("Unused")?;

    let context = fixture.link(LinkerConfig::default())?;

    assert!(!context.annotations().is_marked(unused));
    Ok(())
}

#[test]
fn test_explicit_root() -> Result<()> {
    let mut fixture = Fixture::new()?;
    let tool = fixture.class("Tool")?;
    let run = fixture
        .universe
        .add_method(tool, MethodDef::new("Run").with_body(filler()))?;

    let mut context = LinkContext::new(fixture.universe, LinkerConfig::default())?;
    context.add_root(run, EntryKind::CommandLine);
    context.mark()?;

    assert!(context.annotations().is_marked(run));
    assert!(context.annotations().is_marked(tool));
    let entry = context
        .annotations()
        .recorder()
        .entry(&DependencyNode::Method(run))
        .map(|info| info.kind);
    assert_eq!(entry, Some(EntryKind::CommandLine));
    assert_eq!(context.paths_to(run, false), vec![Vec::new()]);
    Ok(())
}

#[test]
fn test_entry_point_root_without_entry_point() -> Result<()> {
    let fixture = Fixture::new()?;
    let context = fixture.link(LinkerConfig::default())?;

    assert_eq!(
        context
            .diagnostics()
            .count_code(DiagnosticCode::RootAssemblyWithoutEntryPoint),
        1
    );
    Ok(())
}

#[test]
fn test_unknown_root_assembly_fails() -> Result<()> {
    let fixture = Fixture::new()?;
    let config = LinkerConfig::default().with_root("Missing", RootVisibility::All);

    match mark(fixture.universe, config) {
        Err(Error::ResolutionFailed { kind, name }) => {
            assert_eq!(kind, ReferenceKind::Assembly);
            assert_eq!(name, "Missing");
        }
        other => panic!("expected a resolution failure, got {other:?}"),
    }
    Ok(())
}

/// `Main` touching an unresolved type, method and field.
fn unresolved_references(fixture: &mut Fixture) -> Result<()> {
    let method = fixture.universe.add_member_ref(MemberRef::UnresolvedMethod {
        name: "Lib.Gone::Call()".to_string(),
    })?;
    let field = fixture.universe.add_member_ref(MemberRef::UnresolvedField {
        name: "Lib.Gone::value".to_string(),
    })?;
    fixture.main(vec![
        (OpCode::Ldtoken, Operand::Type(TypeSig::Unresolved("Lib.Gone".to_string()))),
        (OpCode::Pop, Operand::None),
        (OpCode::Call, Operand::Method(MethodHandle::Ref(method))),
        (OpCode::Ldsfld, Operand::Field(FieldHandle::Ref(field))),
        (OpCode::Pop, Operand::None),
    ])?;
    Ok(())
}

#[test]
fn test_unresolved_reference_fails_by_default() -> Result<()> {
    let mut fixture = Fixture::new()?;
    unresolved_references(&mut fixture)?;

    let result = fixture.link(LinkerConfig::default());

    assert!(matches!(
        result,
        Err(Error::ResolutionFailed {
            kind: ReferenceKind::Type,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_unresolved_references_are_reported_when_ignored() -> Result<()> {
    let mut fixture = Fixture::new()?;
    unresolved_references(&mut fixture)?;
    let config = LinkerConfig {
        ignore_unresolved: true,
        ..LinkerConfig::default()
    };

    let context = fixture.link(config)?;
    let diagnostics = context.diagnostics();

    assert_eq!(diagnostics.count_code(DiagnosticCode::UnresolvedType), 1);
    assert_eq!(diagnostics.count_code(DiagnosticCode::UnresolvedMethod), 1);
    assert_eq!(diagnostics.count_code(DiagnosticCode::UnresolvedField), 1);
    let codes: Vec<u32> = diagnostics.iter().map(|d| d.code.code()).collect();
    assert!(codes.contains(&2008));
    assert!(codes.contains(&2009));
    assert!(codes.contains(&2012));
    Ok(())
}
