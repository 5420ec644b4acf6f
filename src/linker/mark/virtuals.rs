//! Virtual dispatch: overrides and default interface methods.

use crate::{
    linker::{
        mark::MarkStep, DefaultInterfaceImplementation, DependencyInfo, DependencyKind, Member,
        Optimizations, OverrideInformation,
    },
    Result,
};

impl MarkStep<'_> {
    /// Revisits every marked virtual method and marks the overrides that have become needed.
    pub(super) fn process_virtual_methods(&mut self) -> Result<bool> {
        let generation = self.annotations.generation();
        let mut index = 0;
        while let Some(&base) = self.virtual_methods.get(index) {
            index += 1;
            let overrides = self.annotations.get_overrides(base).to_vec();
            for info in overrides {
                self.process_override(info)?;
            }
            let defaults = self.annotations.get_default_implementations(base).to_vec();
            for info in defaults {
                self.process_default_implementation(info)?;
            }
        }
        Ok(self.annotations.generation() != generation)
    }

    /// Decides whether one override of a marked virtual method is needed.
    ///
    /// The declaring type of the override must be marked. An interface override on a class is
    /// skipped while its `T : I` declaration is unmarked and unused interfaces are removed.
    /// Otherwise the override is kept when override removal is off, when its type is
    /// instantiated, or when the base is abstract.
    fn process_override(&mut self, info: OverrideInformation) -> Result<()> {
        let universe = self.universe;
        let method = info.override_method;
        if self.annotations.is_marked(method) {
            return Ok(());
        }
        let owner = universe.method_owner(method);
        if !self.annotations.is_marked(owner) {
            return Ok(());
        }

        if let Some(interface_impl) = info.matching_interface_impl {
            if !universe.type_def(owner).is_interface()
                && self.is_optimization_enabled(Optimizations::UNUSED_INTERFACES, owner)
                && !self.annotations.is_marked(interface_impl)
            {
                return Ok(());
            }
        }

        let removal = self.is_optimization_enabled(Optimizations::OVERRIDE_REMOVAL, owner);
        let instantiated = self.annotations.is_instantiated(owner);
        let base_is_abstract = universe.method(info.base).is_abstract();
        if removal && !instantiated && !base_is_abstract {
            return Ok(());
        }

        let reason = if removal && instantiated {
            DependencyInfo::new(DependencyKind::OverrideOnInstantiatedType, owner)
        } else {
            DependencyInfo::new(DependencyKind::Override, info.base)
        };
        self.mark_method(method, reason)
    }

    /// Keeps a default interface method for a class that relies on it, once the class is
    /// instantiated.
    fn process_default_implementation(&mut self, info: DefaultInterfaceImplementation) -> Result<()> {
        let ty = info.implementing_type;
        if self.annotations.is_marked(info.implementation) && self.annotations.is_marked(info.interface_impl) {
            return Ok(());
        }
        let needed = self.annotations.is_instantiated(ty)
            || (self.annotations.is_marked(ty)
                && !self.is_optimization_enabled(Optimizations::OVERRIDE_REMOVAL, ty));
        if !needed {
            return Ok(());
        }
        let provider = self.universe.interface_impl_owner(info.interface_impl);
        self.mark_member(
            Member::InterfaceImpl(info.interface_impl),
            DependencyInfo::new(DependencyKind::InterfaceImplementationOnType, provider),
        )?;
        self.mark_method(
            info.implementation,
            DependencyInfo::new(DependencyKind::DefaultImplementationForImplementingType, ty),
        )
    }
}
