//! Override and interface implementation resolution.
//!
//! The [`TypeMap`] computes, per assembly on first use, which virtual method each method
//! overrides and which method satisfies each interface method of every implemented interface.
//! The results are registered in the [`AnnotationStore`] override registries, where the mark
//! step consumes them.
//!
//! # Matching
//!
//! Signatures are compared structurally after inflating the candidate's declaring type with the
//! generic arguments of the path through which it was reached: `class D : B<int>` overrides
//! `B<T>.M(T)` with `M(int)`. Name, parameter count, generic parameter count, return type and
//! every parameter type must be equal. The first match in base-chain order wins.
//!
//! # Memoization
//!
//! Every cache is write-once per key. Base method lookups memoize `None` as well, so a method
//! that overrides nothing is not searched again. Interface resolution is memoized per
//! `(type, interface impl)` pair and per processed assembly.

use dashmap::DashMap;

use crate::{
    linker::{AnnotationStore, DefaultInterfaceImplementation, OverrideInformation},
    model::{
        AssemblyId, InterfaceImplId, MethodId, TypeId, TypeSig, Universe, MAX_HIERARCHY_DEPTH,
    },
};

/// Write-once caches of the override and interface maps.
#[derive(Debug, Default)]
pub struct TypeMap {
    base_methods: DashMap<MethodId, Option<MethodId>>,
    interface_resolutions: DashMap<(TypeId, InterfaceImplId), usize>,
    processed_assemblies: DashMap<AssemblyId, usize>,
}

impl TypeMap {
    /// Creates empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the override map of `assembly` has been computed.
    #[must_use]
    pub fn is_processed(&self, assembly: AssemblyId) -> bool {
        self.processed_assemblies.contains_key(&assembly)
    }

    /// Computes the override map of every type in `assembly`, once.
    pub fn ensure_processed(
        &self,
        universe: &Universe,
        annotations: &mut AnnotationStore,
        assembly: AssemblyId,
    ) {
        if self.processed_assemblies.contains_key(&assembly) {
            return;
        }
        let types = &universe.assembly(assembly).types;
        for &ty in types {
            self.map_type(universe, annotations, ty);
        }
        self.processed_assemblies.insert(assembly, types.len());
        tracing::debug!(
            assembly = %universe.assembly(assembly).name,
            types = types.len(),
            "computed override map"
        );
    }

    fn map_type(&self, universe: &Universe, annotations: &mut AnnotationStore, ty: TypeId) {
        let def = universe.type_def(ty);

        for &method in &def.methods {
            let method_def = universe.method(method);
            if method_def.is_virtual() && !method_def.is_new_slot() && !def.is_interface() {
                if let Some(base) = self.find_base_method(universe, method) {
                    register(
                        annotations,
                        OverrideInformation {
                            base,
                            override_method: method,
                            matching_interface_impl: None,
                        },
                    );
                }
            }

            for &target in &method_def.overrides {
                let Some(base) = universe.resolve_method(target) else {
                    continue;
                };
                let base_owner = universe.method_owner(base);
                let matching_interface_impl = if universe.type_def(base_owner).is_interface() {
                    find_interface_impl(universe, ty, base_owner)
                } else {
                    None
                };
                register(
                    annotations,
                    OverrideInformation {
                        base,
                        override_method: method,
                        matching_interface_impl,
                    },
                );
            }
        }

        if def.is_interface() {
            return;
        }
        for &interface_impl in &def.interfaces {
            self.resolve_interface(universe, annotations, ty, interface_impl);
        }
    }

    fn resolve_interface(
        &self,
        universe: &Universe,
        annotations: &mut AnnotationStore,
        ty: TypeId,
        interface_impl: InterfaceImplId,
    ) {
        if self.interface_resolutions.contains_key(&(ty, interface_impl)) {
            return;
        }
        let interface_sig = &universe.interface_impl(interface_impl).interface;
        let Some(interface) = interface_sig.definition() else {
            self.interface_resolutions.insert((ty, interface_impl), 0);
            return;
        };
        let interface_args = interface_sig.generic_args();

        let mut resolved = 0;
        for &interface_method in &universe.type_def(interface).methods {
            let im = universe.method(interface_method);
            if !im.is_virtual() || im.is_static() {
                continue;
            }
            if let Some(implementation) =
                find_implementation(universe, ty, interface_method, interface_args)
            {
                register(
                    annotations,
                    OverrideInformation {
                        base: interface_method,
                        override_method: implementation,
                        matching_interface_impl: Some(interface_impl),
                    },
                );
                resolved += 1;
            } else if let Some((providing, implementation)) =
                find_default_implementation(universe, ty, interface_method)
            {
                annotations.add_default_implementation(DefaultInterfaceImplementation {
                    interface_method,
                    implementing_type: ty,
                    interface_impl: providing,
                    implementation,
                });
                resolved += 1;
            }
        }
        self.interface_resolutions
            .insert((ty, interface_impl), resolved);
    }

    /// Finds the method `method` directly overrides by signature, searching the base chain.
    ///
    /// Returns `None` for non-virtual, new-slot and interface methods, and when no base
    /// matches.
    pub fn find_base_method(&self, universe: &Universe, method: MethodId) -> Option<MethodId> {
        if let Some(cached) = self.base_methods.get(&method).map(|entry| *entry) {
            return cached;
        }
        let found = compute_base_method(universe, method);
        self.base_methods.insert(method, found);
        found
    }
}

fn register(annotations: &mut AnnotationStore, info: OverrideInformation) {
    annotations.add_override(info);
    annotations.add_base_method(info);
}

fn compute_base_method(universe: &Universe, method: MethodId) -> Option<MethodId> {
    let def = universe.method(method);
    let owner = universe.method_owner(method);
    if !def.is_virtual() || def.is_new_slot() || universe.type_def(owner).is_interface() {
        return None;
    }
    inflated_bases(universe, owner)
        .into_iter()
        .find_map(|(base, args)| {
            universe.type_def(base).methods.iter().copied().find(|&candidate| {
                universe.method(candidate).is_virtual()
                    && signatures_match(universe, method, &[], candidate, &args)
            })
        })
}

/// Walks the base chain of `ty`, yielding each base type with its generic arguments expressed
/// in the context of `ty`.
pub(crate) fn inflated_bases(universe: &Universe, ty: TypeId) -> Vec<(TypeId, Vec<TypeSig>)> {
    let mut chain = Vec::new();
    let mut current = universe.type_def(ty).base.clone();
    while let Some(sig) = current {
        if chain.len() >= MAX_HIERARCHY_DEPTH {
            break;
        }
        let Some(base) = sig.definition() else {
            break;
        };
        let args = sig.generic_args().to_vec();
        current = universe
            .type_def(base)
            .base
            .as_ref()
            .map(|next| next.inflate(&args));
        chain.push((base, args));
    }
    chain
}

/// Structural signature comparison of `a` declared in a type instantiated with `a_args` and
/// `b` declared in a type instantiated with `b_args`.
pub(crate) fn signatures_match(
    universe: &Universe,
    a: MethodId,
    a_args: &[TypeSig],
    b: MethodId,
    b_args: &[TypeSig],
) -> bool {
    let a = universe.method(a);
    let b = universe.method(b);
    a.name == b.name
        && a.params.len() == b.params.len()
        && a.generic_params.len() == b.generic_params.len()
        && a.return_type.inflate(a_args) == b.return_type.inflate(b_args)
        && a.params
            .iter()
            .zip(&b.params)
            .all(|(pa, pb)| pa.inflate(a_args) == pb.inflate(b_args))
}

/// Finds the `T : I` declaration of `interface` on `ty` or its base types.
pub(crate) fn find_interface_impl(
    universe: &Universe,
    ty: TypeId,
    interface: TypeId,
) -> Option<InterfaceImplId> {
    std::iter::once(ty)
        .chain(inflated_bases(universe, ty).into_iter().map(|(base, _)| base))
        .find_map(|t| {
            universe.type_def(t).interfaces.iter().copied().find(|&ii| {
                universe.interface_impl(ii).interface.definition() == Some(interface)
            })
        })
}

fn overrides_explicitly(universe: &Universe, method: MethodId, target: MethodId) -> bool {
    universe
        .method(method)
        .overrides
        .iter()
        .any(|&handle| universe.resolve_method(handle) == Some(target))
}

fn find_implementation(
    universe: &Universe,
    ty: TypeId,
    interface_method: MethodId,
    interface_args: &[TypeSig],
) -> Option<MethodId> {
    let own = &universe.type_def(ty).methods;
    if let Some(&explicit) = own
        .iter()
        .find(|&&m| overrides_explicitly(universe, m, interface_method))
    {
        return Some(explicit);
    }
    if let Some(&exact) = own.iter().find(|&&m| {
        universe.method(m).is_virtual()
            && signatures_match(universe, m, &[], interface_method, interface_args)
    }) {
        return Some(exact);
    }
    inflated_bases(universe, ty)
        .into_iter()
        .find_map(|(base, args)| {
            universe.type_def(base).methods.iter().copied().find(|&m| {
                overrides_explicitly(universe, m, interface_method)
                    || (universe.method(m).is_virtual()
                        && signatures_match(universe, m, &args, interface_method, interface_args))
            })
        })
}

/// Finds a default implementation of `interface_method` through the interfaces of `ty` and
/// then of its base types. The first one found wins.
fn find_default_implementation(
    universe: &Universe,
    ty: TypeId,
    interface_method: MethodId,
) -> Option<(InterfaceImplId, MethodId)> {
    let declaring_interface = universe.method_owner(interface_method);
    std::iter::once(ty)
        .chain(inflated_bases(universe, ty).into_iter().map(|(base, _)| base))
        .flat_map(|t| universe.type_def(t).interfaces.iter().copied())
        .find_map(|ii| {
            let provider = universe.interface_impl(ii).interface.definition()?;
            if provider == declaring_interface {
                return universe
                    .method(interface_method)
                    .body
                    .is_some()
                    .then_some((ii, interface_method));
            }
            universe
                .type_def(provider)
                .methods
                .iter()
                .copied()
                .find(|&m| {
                    universe.method(m).body.is_some()
                        && overrides_explicitly(universe, m, interface_method)
                })
                .map(|m| (ii, m))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{MethodBody, MethodDef, MethodModifiers, OpCode, Operand, TypeAttributes, TypeDef},
        Result,
    };

    fn virtual_method(name: &str) -> MethodDef {
        MethodDef::new(name).with_modifiers(MethodModifiers::VIRTUAL)
    }

    fn interface_method(name: &str) -> MethodDef {
        MethodDef::new(name)
            .with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT | MethodModifiers::NEW_SLOT)
    }

    #[test]
    fn test_generic_base_override() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let int = u.add_type(asm, TypeDef::new("App", "Int"))?;
        let base = u.add_type(asm, TypeDef::new("App", "Base`1").with_generic_params(&["T"]))?;
        let base_m = u.add_method(
            base,
            virtual_method("M")
                .with_modifiers(MethodModifiers::NEW_SLOT)
                .with_params(vec![TypeSig::Var(0)]),
        )?;
        let derived = u.add_type(
            asm,
            TypeDef::new("App", "Derived")
                .with_base(TypeSig::GenericInst(base, vec![TypeSig::Def(int)])),
        )?;
        let derived_m = u.add_method(derived, virtual_method("M").with_params(vec![TypeSig::Def(int)]))?;
        let unrelated = u.add_method(derived, virtual_method("M").with_params(vec![TypeSig::Def(derived)]))?;

        let map = TypeMap::new();
        let mut store = AnnotationStore::new(&u)?;
        map.ensure_processed(&u, &mut store, asm);

        assert_eq!(map.find_base_method(&u, derived_m), Some(base_m));
        assert_eq!(map.find_base_method(&u, unrelated), None);
        assert_eq!(map.find_base_method(&u, base_m), None);
        assert_eq!(store.get_overrides(base_m).len(), 1);
        assert_eq!(store.get_base_methods(derived_m)[0].base, base_m);
        assert!(map.is_processed(asm));
        Ok(())
    }

    #[test]
    fn test_interface_resolution_order() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let iface = u.add_type(
            asm,
            TypeDef::new("App", "IRun").with_flags(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT),
        )?;
        let run = u.add_method(iface, interface_method("Run"))?;
        let stop = u.add_method(iface, interface_method("Stop"))?;

        let base = u.add_type(asm, TypeDef::new("App", "Base"))?;
        let base_stop = u.add_method(base, virtual_method("Stop"))?;
        let impl_ty = u.add_type(asm, TypeDef::new("App", "Runner").with_base(base))?;
        let explicit = u.add_method(
            impl_ty,
            virtual_method("App.IRun.Run")
                .with_access(crate::model::Accessibility::Private)
                .overriding(run.into()),
        )?;
        let ii = u.add_interface_impl(impl_ty, iface)?;

        let map = TypeMap::new();
        let mut store = AnnotationStore::new(&u)?;
        map.ensure_processed(&u, &mut store, asm);

        let run_overrides = store.get_overrides(run);
        assert!(run_overrides
            .iter()
            .all(|o| o.override_method == explicit && o.matching_interface_impl == Some(ii)));
        assert!(!run_overrides.is_empty());
        assert_eq!(
            store.get_overrides(stop),
            &[OverrideInformation {
                base: stop,
                override_method: base_stop,
                matching_interface_impl: Some(ii),
            }]
        );
        Ok(())
    }

    #[test]
    fn test_default_interface_method() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let iface = u.add_type(
            asm,
            TypeDef::new("App", "IGreet").with_flags(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT),
        )?;
        let greet = u.add_method(
            iface,
            MethodDef::new("Greet")
                .with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT)
                .with_body(MethodBody::from_ops(vec![(OpCode::Ret, Operand::None)])),
        )?;
        let ty = u.add_type(asm, TypeDef::new("App", "Greeter"))?;
        let ii = u.add_interface_impl(ty, iface)?;

        let map = TypeMap::new();
        let mut store = AnnotationStore::new(&u)?;
        map.ensure_processed(&u, &mut store, asm);

        assert!(store.get_overrides(greet).is_empty());
        assert_eq!(
            store.get_default_implementations(greet),
            &[DefaultInterfaceImplementation {
                interface_method: greet,
                implementing_type: ty,
                interface_impl: ii,
                implementation: greet,
            }]
        );
        Ok(())
    }

    #[test]
    fn test_unresolved_base_is_no_match() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let ty = u.add_type(
            asm,
            TypeDef::new("App", "Orphan").with_base(TypeSig::Unresolved("Gone.Base".into())),
        )?;
        let m = u.add_method(ty, virtual_method("M"))?;
        let map = TypeMap::new();
        assert_eq!(map.find_base_method(&u, m), None);
        assert!(inflated_bases(&u, ty).is_empty());
        Ok(())
    }
}
