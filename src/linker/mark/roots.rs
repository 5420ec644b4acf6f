//! Initialization: assembly actions and roots.

use crate::{
    linker::{
        mark::{MarkStep, PendingAttribute},
        AssemblyAction, DependencyInfo, DependencyKind, DependencyNode, DiagnosticCode, EntryInfo,
        EntryKind, Member, MethodAction, RootVisibility,
    },
    model::{AssemblyId, TypeId, Universe},
    Error, ReferenceKind, Result,
};

impl MarkStep<'_> {
    /// Applies assembly actions, then marks root assemblies and explicit roots.
    pub(super) fn initialize(&mut self) -> Result<()> {
        let universe = self.universe;
        let config = self.config;
        let roots = self.roots;
        for assembly in universe.assembly_ids() {
            let action = self.annotations.get_action(assembly)?;
            if action.keeps_everything() {
                self.mark_entry(EntryInfo {
                    kind: EntryKind::AssemblyAction,
                    source: None,
                    entry: Member::Assembly(assembly),
                })?;
                self.mark_assembly_contents(assembly)?;
            }
        }

        for root in &config.root_assemblies {
            let assembly =
                universe
                    .find_assembly(&root.name)
                    .ok_or_else(|| Error::ResolutionFailed {
                        kind: ReferenceKind::Assembly,
                        name: root.name.clone(),
                    })?;
            self.mark_root_assembly(assembly, root.visibility)?;
        }

        for &(member, kind) in roots {
            self.mark_entry(EntryInfo {
                kind,
                source: None,
                entry: member,
            })?;
        }

        tracing::debug!(
            queued = self.method_queue.len(),
            lazy_attributes = self.lazy_attributes.len(),
            "initialized mark step"
        );
        Ok(())
    }

    fn mark_root_assembly(&mut self, assembly: AssemblyId, visibility: RootVisibility) -> Result<()> {
        let universe = self.universe;
        let def = universe.assembly(assembly);
        let source = Some(DependencyNode::Assembly(assembly));
        let root = |entry: Member| EntryInfo {
            kind: EntryKind::RootAssembly,
            source: source.clone(),
            entry,
        };

        match visibility {
            RootVisibility::EntryPoint => {
                let Some(entry_point) = def.entry_point else {
                    self.diagnostics.report(
                        DiagnosticCode::RootAssemblyWithoutEntryPoint,
                        format!("root assembly {} has no entry point", def.name),
                    );
                    return Ok(());
                };
                self.mark_entry(root(Member::Method(entry_point)))
            }
            RootVisibility::All => {
                self.mark_entry(root(Member::Assembly(assembly)))?;
                for &ty in &def.types {
                    self.mark_entry(root(Member::Type(ty)))?;
                    for member in type_members(universe, ty) {
                        self.mark_entry(root(member))?;
                    }
                }
                Ok(())
            }
            RootVisibility::VisibleMembers => {
                self.mark_entry(root(Member::Assembly(assembly)))?;
                for &ty in &def.types {
                    if !self.is_type_visible(ty) {
                        continue;
                    }
                    self.mark_entry(root(Member::Type(ty)))?;
                    for member in type_members(universe, ty) {
                        if is_member_visible(universe, member) {
                            self.mark_entry(root(member))?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn is_type_visible(&self, ty: TypeId) -> bool {
        let universe = self.universe;
        let mut current = Some(ty);
        while let Some(t) = current {
            let def = universe.type_def(t);
            let visible = match def.declaring_type {
                None => def.access.is_public(),
                Some(_) => def.access.is_externally_visible(),
            };
            if !visible {
                return false;
            }
            current = def.declaring_type;
        }
        true
    }

    /// Runs once, when the assembly is first marked. Assemblies kept whole when used are
    /// entry-marked; the assembly-level attributes of linked ones start waiting for their
    /// attribute types.
    pub(super) fn process_assembly(&mut self, assembly: AssemblyId) -> Result<()> {
        let action = self.annotations.get_action(assembly)?;
        if action.keeps_everything_when_used() {
            tracing::debug!(
                assembly = %self.universe.assembly(assembly).name,
                %action,
                "assembly used, keeping all of it"
            );
            self.mark_assembly_contents(assembly)?;
        } else if action == AssemblyAction::Link {
            for &attribute in &self.universe.assembly(assembly).attributes {
                self.lazy_attributes.push(PendingAttribute {
                    attribute,
                    provider: DependencyNode::Assembly(assembly),
                });
            }
        }
        Ok(())
    }

    /// Marks every type and member of an assembly. Method bodies are force-parsed.
    pub(super) fn mark_assembly_contents(&mut self, assembly: AssemblyId) -> Result<()> {
        let universe = self.universe;
        let def = universe.assembly(assembly);
        for &attribute in &def.attributes {
            self.mark_member(
                Member::Attribute(attribute),
                DependencyInfo::new(DependencyKind::CustomAttribute, assembly),
            )?;
        }
        for &ty in &def.types {
            let reason = match universe.type_def(ty).declaring_type {
                Some(outer) => DependencyInfo::new(DependencyKind::NestedType, outer),
                None => DependencyInfo::new(DependencyKind::TypeInAssembly, assembly),
            };
            self.mark_type(ty, reason)?;
            for member in type_members(universe, ty) {
                if let Member::Method(method) = member {
                    self.annotations
                        .set_method_action(method, MethodAction::ForceParse);
                }
                let kind = match member {
                    Member::InterfaceImpl(_) => DependencyKind::InterfaceImplementationOnType,
                    _ => DependencyKind::MemberOfType,
                };
                self.mark_member(member, DependencyInfo::new(kind, ty))?;
            }
        }
        Ok(())
    }
}

/// Members declared directly on `ty`, nested types excluded.
fn type_members(universe: &Universe, ty: TypeId) -> Vec<Member> {
    let def = universe.type_def(ty);
    def.methods
        .iter()
        .map(|&m| Member::Method(m))
        .chain(def.fields.iter().map(|&f| Member::Field(f)))
        .chain(def.properties.iter().map(|&p| Member::Property(p)))
        .chain(def.events.iter().map(|&e| Member::Event(e)))
        .chain(def.interfaces.iter().map(|&i| Member::InterfaceImpl(i)))
        .collect()
}

fn is_member_visible(universe: &Universe, member: Member) -> bool {
    match member {
        Member::Method(m) => universe.method(m).access.is_externally_visible(),
        Member::Field(f) => universe.field(f).access.is_externally_visible(),
        Member::Property(p) => {
            let def = universe.property(p);
            def.getter
                .into_iter()
                .chain(def.setter)
                .any(|m| universe.method(m).access.is_externally_visible())
        }
        Member::Event(e) => {
            let def = universe.event(e);
            def.add
                .into_iter()
                .chain(def.remove)
                .any(|m| universe.method(m).access.is_externally_visible())
        }
        Member::InterfaceImpl(_) => true,
        Member::Assembly(_) | Member::Type(_) | Member::Attribute(_) => false,
    }
}
