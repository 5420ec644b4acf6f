//! Custom attributes, including the lazy and late attribute phases.

use crate::{
    linker::{
        mark::{MarkStep, PendingAttribute},
        AssemblyAction, DependencyInfo, DependencyKind, DependencyNode, EntryInfo, EntryKind,
        Member,
    },
    model::{AttributeArg, AttributeId, NamedArgTarget, TypeId},
    Result,
};

/// Whether a deferred attribute can be marked now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeReadiness {
    /// Mark it now
    Ready,
    /// Ask again after the next primary phase
    Waiting,
}

impl MarkStep<'_> {
    /// Marks the attributes on a provider, deferring the ones that are only kept for used
    /// attribute types.
    pub(crate) fn mark_custom_attributes(
        &mut self,
        attributes: &[AttributeId],
        provider: DependencyNode,
    ) -> Result<()> {
        for &attribute in attributes {
            if self.config.keep_used_attribute_types_only
                && !self.attribute_type(attribute).is_some_and(|t| self.annotations.is_marked(t))
            {
                self.late_attributes.push(PendingAttribute {
                    attribute,
                    provider: provider.clone(),
                });
                continue;
            }
            self.mark_member(
                Member::Attribute(attribute),
                DependencyInfo {
                    kind: DependencyKind::CustomAttribute,
                    source: Some(provider.clone()),
                },
            )?;
        }
        Ok(())
    }

    fn attribute_type(&self, attribute: AttributeId) -> Option<TypeId> {
        let universe = self.universe;
        universe
            .resolve_method(universe.attribute(attribute).constructor)
            .map(|ctor| universe.method_owner(ctor))
    }

    /// Marks what an attribute instance needs: its constructor, the types its arguments name,
    /// and the fields and properties its named arguments assign.
    pub(super) fn process_attribute(&mut self, attribute: AttributeId) -> Result<()> {
        let universe = self.universe;
        let def = universe.attribute(attribute);
        let source = DependencyNode::Attribute(attribute);

        self.mark_method_handle(
            def.constructor,
            DependencyInfo::new(DependencyKind::AttributeConstructor, attribute),
        )?;
        for arg in &def.fixed_args {
            self.mark_attribute_argument(arg, &source)?;
        }

        let attribute_type = self.attribute_type(attribute);
        for named in &def.named_args {
            self.mark_attribute_argument(&named.value, &source)?;
            let Some(ty) = attribute_type else {
                continue;
            };
            match named.target {
                NamedArgTarget::Field => {
                    if let Some(field) = find_in_hierarchy(universe, ty, |t| {
                        universe.type_def(t).fields.iter().copied().find(|&f| universe.field(f).name == named.name)
                    }) {
                        self.mark_member(
                            Member::Field(field),
                            DependencyInfo::new(DependencyKind::CustomAttributeField, attribute),
                        )?;
                    }
                }
                NamedArgTarget::Property => {
                    if let Some(property) = find_in_hierarchy(universe, ty, |t| {
                        universe
                            .type_def(t)
                            .properties
                            .iter()
                            .copied()
                            .find(|&p| universe.property(p).name == named.name)
                    }) {
                        let reason = DependencyInfo::new(DependencyKind::CustomAttributeProperty, attribute);
                        self.mark_member(Member::Property(property), reason.clone())?;
                        if let Some(setter) = universe.property(property).setter {
                            self.mark_method(setter, reason)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn mark_attribute_argument(&mut self, arg: &AttributeArg, source: &DependencyNode) -> Result<()> {
        let reason = DependencyInfo {
            kind: DependencyKind::CustomAttributeArgumentType,
            source: Some(source.clone()),
        };
        match arg {
            AttributeArg::Type(sig) | AttributeArg::Enum(sig, _) => self.mark_type_sig(sig, reason),
            AttributeArg::Array(items) => {
                for item in items {
                    self.mark_attribute_argument(item, source)?;
                }
                Ok(())
            }
            AttributeArg::Bool(_) | AttributeArg::Int(_) | AttributeArg::String(_) => Ok(()),
        }
    }

    /// Assembly-level attributes of a used linked assembly are kept once the assembly defining
    /// the attribute type is in use, or when that assembly is not being trimmed.
    fn lazy_readiness(&self, pending: &PendingAttribute) -> AttributeReadiness {
        if let DependencyNode::Assembly(owner) = &pending.provider {
            if !self.annotations.is_marked(*owner) {
                return AttributeReadiness::Waiting;
            }
        }
        let Some(ty) = self.attribute_type(pending.attribute) else {
            return AttributeReadiness::Ready;
        };
        let assembly = self.universe.type_assembly(ty);
        let trimmed = self
            .annotations
            .get_action(assembly)
            .is_ok_and(|action| action == AssemblyAction::Link);
        if self.annotations.is_marked(ty) || self.annotations.is_marked(assembly) || !trimmed {
            AttributeReadiness::Ready
        } else {
            AttributeReadiness::Waiting
        }
    }

    /// Attributes deferred for `keep_used_attribute_types_only` are kept once their type is.
    fn late_readiness(&self, pending: &PendingAttribute) -> AttributeReadiness {
        match self.attribute_type(pending.attribute) {
            Some(ty) if !self.annotations.is_marked(ty) => AttributeReadiness::Waiting,
            _ => AttributeReadiness::Ready,
        }
    }

    pub(super) fn process_lazy_attributes(&mut self) -> Result<bool> {
        let pending = std::mem::take(&mut self.lazy_attributes);
        let mut progressed = false;
        for item in pending {
            if self.lazy_readiness(&item) == AttributeReadiness::Waiting {
                self.lazy_attributes.push(item);
                continue;
            }
            progressed = true;
            self.mark_entry(EntryInfo {
                kind: EntryKind::AssemblyOrModuleAttribute,
                source: Some(item.provider),
                entry: Member::Attribute(item.attribute),
            })?;
        }
        Ok(progressed)
    }

    pub(super) fn process_late_attributes(&mut self) -> Result<bool> {
        let pending = std::mem::take(&mut self.late_attributes);
        let mut progressed = false;
        for item in pending {
            if self.late_readiness(&item) == AttributeReadiness::Waiting {
                self.late_attributes.push(item);
                continue;
            }
            progressed = true;
            self.mark_member(
                Member::Attribute(item.attribute),
                DependencyInfo {
                    kind: DependencyKind::CustomAttribute,
                    source: Some(item.provider),
                },
            )?;
        }
        Ok(progressed)
    }
}

fn find_in_hierarchy<T>(
    universe: &crate::model::Universe,
    ty: TypeId,
    find: impl Fn(TypeId) -> Option<T>,
) -> Option<T> {
    let mut current = Some(ty);
    for _ in 0..crate::model::MAX_HIERARCHY_DEPTH {
        let t = current?;
        if let Some(found) = find(t) {
            return Some(found);
        }
        current = universe.base_type(t);
    }
    None
}
