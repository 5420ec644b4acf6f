//! Types, fields, properties, events and interface implementations.

use crate::{
    linker::{
        mark::MarkStep, DependencyInfo, DependencyKind, DependencyNode, Member, Optimizations,
    },
    model::{
        EventId, FieldHandle, FieldId, InterfaceImplId, MemberRef, MethodId, PropertyId,
        TypeAttributes, TypeId, TypeSig,
    },
    ReferenceKind, Result,
};

impl MarkStep<'_> {
    /// Marks every type a signature mentions.
    ///
    /// Composite signatures are recorded as type-specification nodes: the edge for `reason`
    /// ends at the node, and the element types and generic arguments hang off it.
    pub(crate) fn mark_type_sig(&mut self, sig: &TypeSig, reason: DependencyInfo) -> Result<()> {
        match sig {
            TypeSig::Def(ty) => self.mark_type(*ty, reason),
            TypeSig::Void | TypeSig::Var(_) | TypeSig::MVar(_) => Ok(()),
            TypeSig::Unresolved(name) => {
                self.unresolved(ReferenceKind::Type, name, reason.source.as_ref())
            }
            TypeSig::GenericInst(definition, args) => {
                let node = DependencyNode::TypeSpec(sig.clone());
                self.record_reference(&reason, node.clone())?;
                for arg in args {
                    self.mark_type_sig(
                        arg,
                        DependencyInfo {
                            kind: DependencyKind::GenericArgumentType,
                            source: Some(node.clone()),
                        },
                    )?;
                }
                self.mark_type(
                    *definition,
                    DependencyInfo {
                        kind: DependencyKind::ElementType,
                        source: Some(node),
                    },
                )
            }
            TypeSig::SzArray(inner)
            | TypeSig::Array(inner, _)
            | TypeSig::ByRef(inner)
            | TypeSig::Pointer(inner) => {
                let node = DependencyNode::TypeSpec(sig.clone());
                self.record_reference(&reason, node.clone())?;
                self.mark_type_sig(
                    inner,
                    DependencyInfo {
                        kind: DependencyKind::ElementType,
                        source: Some(node),
                    },
                )
            }
        }
    }

    /// Marks the field behind a handle, redirecting generic instance references to the
    /// definition.
    pub(crate) fn mark_field_handle(&mut self, handle: FieldHandle, reason: DependencyInfo) -> Result<()> {
        let member_ref = match handle {
            FieldHandle::Def(field) => return self.mark_member(Member::Field(field), reason),
            FieldHandle::Ref(member_ref) => member_ref,
        };
        let universe = self.universe;
        match universe.member_ref(member_ref) {
            MemberRef::FieldOnGenericInstance { declaring, field } => {
                let node = DependencyNode::MemberRef(member_ref);
                self.record_reference(&reason, node.clone())?;
                for arg in declaring.generic_args() {
                    self.mark_type_sig(
                        arg,
                        DependencyInfo {
                            kind: DependencyKind::GenericArgumentType,
                            source: Some(node.clone()),
                        },
                    )?;
                }
                self.mark_member(
                    Member::Field(*field),
                    DependencyInfo {
                        kind: DependencyKind::FieldOnGenericInstance,
                        source: Some(node),
                    },
                )
            }
            MemberRef::UnresolvedField { name } => {
                self.unresolved(ReferenceKind::Field, name, reason.source.as_ref())
            }
            other => Err(internal_error!("{:?} used as a field operand", other)),
        }
    }

    pub(super) fn process_type(&mut self, ty: TypeId) -> Result<()> {
        let universe = self.universe;
        let def = universe.type_def(ty);
        let assembly = universe.type_assembly(ty);

        self.mark_member(
            Member::Assembly(assembly),
            DependencyInfo::new(DependencyKind::ScopeOfType, ty),
        )?;
        let type_map = self.type_map;
        type_map.ensure_processed(universe, &mut *self.annotations, assembly);

        if let Some(base) = &def.base {
            self.mark_type_sig(base, DependencyInfo::new(DependencyKind::BaseType, ty))?;
        }
        if let Some(outer) = def.declaring_type {
            self.mark_type(outer, DependencyInfo::new(DependencyKind::DeclaringType, ty))?;
        }
        for param in &def.generic_params {
            for constraint in &param.constraints {
                self.mark_type_sig(
                    constraint,
                    DependencyInfo::new(DependencyKind::GenericParameterConstraintType, ty),
                )?;
            }
        }
        self.mark_custom_attributes(&def.attributes, DependencyNode::Type(ty))?;

        self.mark_special_type_members(ty)?;

        if !def.interfaces.is_empty() {
            self.types_with_interfaces.push(ty);
        }

        if !def.flags.contains(TypeAttributes::BEFORE_FIELD_INIT) {
            if let Some(cctor) = universe.type_initializer(ty) {
                self.mark_method(cctor, DependencyInfo::new(DependencyKind::CctorForType, ty))?;
            }
        }

        if let Some(preserve) = self.annotations.get_preserve(ty) {
            if preserve.fields() {
                for &field in &def.fields {
                    self.mark_member(
                        Member::Field(field),
                        DependencyInfo::new(DependencyKind::TypePreserve, ty),
                    )?;
                }
            }
            if preserve.methods() {
                for &method in &def.methods {
                    self.mark_method(method, DependencyInfo::new(DependencyKind::TypePreserve, ty))?;
                }
            }
        }
        Ok(())
    }

    /// Value types keep their layout, enums their values, delegates their runtime-provided
    /// methods.
    fn mark_special_type_members(&mut self, ty: TypeId) -> Result<()> {
        let universe = self.universe;
        let def = universe.type_def(ty);
        let derives = |ancestor: Option<TypeId>| {
            ancestor.is_some_and(|a| a != ty && universe.derives_from(ty, a))
        };

        if derives(self.well_known.enum_type) {
            for &field in &def.fields {
                self.mark_member(
                    Member::Field(field),
                    DependencyInfo::new(DependencyKind::EnumField, ty),
                )?;
            }
        } else if derives(self.well_known.value_type) {
            for &field in &def.fields {
                if !universe.field(field).is_static() {
                    self.mark_member(
                        Member::Field(field),
                        DependencyInfo::new(DependencyKind::ValueTypeField, ty),
                    )?;
                }
            }
        } else if derives(self.well_known.multicast_delegate) || derives(self.well_known.delegate) {
            for &method in &def.methods {
                self.mark_method(
                    method,
                    DependencyInfo::new(DependencyKind::MethodForSpecialType, ty),
                )?;
            }
        }
        Ok(())
    }

    /// Handles the first construction of `ty` by `ctor`.
    pub(super) fn mark_requirements_for_instantiated_type(
        &mut self,
        ty: TypeId,
        ctor: MethodId,
    ) -> Result<()> {
        if !self.annotations.mark_instantiated_by_constructor(ctor, ty)? {
            return Ok(());
        }
        let universe = self.universe;
        let mut base = universe.base_type(ty);
        while let Some(b) = base {
            if !self.annotations.mark_instantiated_untracked(b) {
                break;
            }
            base = universe.base_type(b);
        }

        self.mark_interface_impls_of(ty)?;

        if let Some(cctor) = universe.type_initializer(ty) {
            self.mark_method(cctor, DependencyInfo::new(DependencyKind::CctorForType, ty))?;
        }
        let finalizer = universe.methods_named(ty, "Finalize").find(|&m| {
            let def = universe.method(m);
            def.is_virtual() && def.params.is_empty()
        });
        if let Some(finalizer) = finalizer {
            self.mark_method(
                finalizer,
                DependencyInfo::new(DependencyKind::MethodForInstantiatedType, ty),
            )?;
        }
        Ok(())
    }

    fn mark_interface_impls_of(&mut self, ty: TypeId) -> Result<bool> {
        let universe = self.universe;
        let mut progressed = false;
        for &interface_impl in &universe.type_def(ty).interfaces {
            if self.annotations.is_marked(interface_impl) || !self.should_mark_interface_impl(interface_impl) {
                continue;
            }
            self.mark_member(
                Member::InterfaceImpl(interface_impl),
                DependencyInfo::new(DependencyKind::InterfaceImplementationOnType, ty),
            )?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// An interface implementation is needed once its interface is used, or always when the
    /// unused-interface optimization is off for the implementing type.
    pub(super) fn should_mark_interface_impl(&self, interface_impl: InterfaceImplId) -> bool {
        let universe = self.universe;
        let owner = universe.interface_impl_owner(interface_impl);
        if !self.is_optimization_enabled(Optimizations::UNUSED_INTERFACES, owner) {
            return true;
        }
        let def = universe.type_def(owner);
        if def.flags.contains(TypeAttributes::IMPORT) {
            return true;
        }
        universe
            .interface_impl(interface_impl)
            .interface
            .definition()
            .is_some_and(|interface| self.annotations.is_marked(interface))
    }

    /// Revisits types with interfaces whose implementations may have become needed.
    pub(super) fn process_types_with_interfaces(&mut self) -> Result<bool> {
        let universe = self.universe;
        let mut progressed = false;
        for ty in self.types_with_interfaces.clone() {
            let relevant = self.annotations.is_instantiated(ty)
                || universe.type_def(ty).is_interface()
                || !self.is_optimization_enabled(Optimizations::UNUSED_INTERFACES, ty);
            if relevant {
                progressed |= self.mark_interface_impls_of(ty)?;
            }
        }
        Ok(progressed)
    }

    pub(super) fn is_optimization_enabled(&self, optimization: Optimizations, ty: TypeId) -> bool {
        self.annotations
            .get_action(self.universe.type_assembly(ty))
            .is_ok_and(|action| self.config.is_optimization_enabled(optimization, action))
    }

    pub(super) fn process_field(&mut self, field: FieldId) -> Result<()> {
        let universe = self.universe;
        let def = universe.field(field);
        self.mark_type(
            universe.field_owner(field),
            DependencyInfo::new(DependencyKind::DeclaringType, field),
        )?;
        self.mark_type_sig(&def.field_type, DependencyInfo::new(DependencyKind::FieldType, field))?;
        self.mark_custom_attributes(&def.attributes, DependencyNode::Field(field))
    }

    pub(super) fn process_property(&mut self, property: PropertyId) -> Result<()> {
        let universe = self.universe;
        self.mark_type(
            universe.property_owner(property),
            DependencyInfo::new(DependencyKind::DeclaringType, property),
        )?;
        self.mark_custom_attributes(
            &universe.property(property).attributes,
            DependencyNode::Property(property),
        )
    }

    pub(super) fn process_event(&mut self, event: EventId) -> Result<()> {
        let universe = self.universe;
        let def = universe.event(event);
        self.mark_type(
            universe.event_owner(event),
            DependencyInfo::new(DependencyKind::DeclaringType, event),
        )?;
        self.mark_type_sig(&def.event_type, DependencyInfo::new(DependencyKind::EventType, event))?;
        self.mark_custom_attributes(&def.attributes, DependencyNode::Event(event))
    }

    pub(super) fn process_interface_impl(&mut self, interface_impl: InterfaceImplId) -> Result<()> {
        let universe = self.universe;
        let def = universe.interface_impl(interface_impl);
        self.mark_type_sig(
            &def.interface,
            DependencyInfo::new(
                DependencyKind::InterfaceImplementationInterfaceType,
                interface_impl,
            ),
        )?;
        self.mark_custom_attributes(&def.attributes, DependencyNode::InterfaceImpl(interface_impl))
    }

    /// Marks a property together with its accessors.
    pub(crate) fn mark_property_with_accessors(
        &mut self,
        property: PropertyId,
        reason: DependencyInfo,
    ) -> Result<()> {
        self.mark_member(Member::Property(property), reason)?;
        let universe = self.universe;
        let def = universe.property(property);
        for accessor in def.getter.into_iter().chain(def.setter) {
            self.mark_method(accessor, DependencyInfo::new(DependencyKind::PropertyMethod, property))?;
        }
        Ok(())
    }

    /// Marks an event together with its accessors.
    pub(crate) fn mark_event_with_accessors(&mut self, event: EventId, reason: DependencyInfo) -> Result<()> {
        self.mark_member(Member::Event(event), reason)?;
        let universe = self.universe;
        let def = universe.event(event);
        for accessor in def.add.into_iter().chain(def.remove).chain(def.raise) {
            self.mark_method(accessor, DependencyInfo::new(DependencyKind::EventMethod, event))?;
        }
        Ok(())
    }
}
