//! The member universe: an arena holding every definition the analysis can see.
//!
//! The universe is populated once and then treated as immutable for the duration of a link.
//! All cross references are typed arena indices. Ownership relations (which type declares a
//! method, which assembly defines a type) live in parallel owner tables so that definitions stay
//! plain data.

use std::collections::HashMap;

use crate::{
    model::{
        AssemblyDef, AssemblyId, AttributeId, AttributeTarget, CustomAttributeDef, EventDef,
        EventId, FieldDef, FieldHandle, FieldId, Instruction, InterfaceImplDef, InterfaceImplId,
        MemberRef, MemberRefId, MethodDef, MethodHandle, MethodId, OpCode, Operand, PropertyDef,
        PropertyId, StackBehavior, TypeDef, TypeId, TypeSig,
    },
    Error, Result,
};

/// Upper bound on base-type chain walks, protecting against cyclic hierarchies.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// The in-memory member model.
///
/// # Examples
///
/// ```rust,ignore
/// use reachscope::model::{Universe, TypeDef, MethodDef};
///
/// let mut universe = Universe::new();
/// let app = universe.add_assembly("App")?;
/// let program = universe.add_type(app, TypeDef::new("App", "Program"))?;
/// let main = universe.add_method(program, MethodDef::new("Main"))?;
///
/// assert_eq!(universe.method_full_name(main), "App.Program::Main()");
/// ```
#[derive(Debug, Default)]
pub struct Universe {
    assemblies: Vec<AssemblyDef>,
    types: Vec<TypeDef>,
    type_owner: Vec<AssemblyId>,
    methods: Vec<MethodDef>,
    method_owner: Vec<TypeId>,
    fields: Vec<FieldDef>,
    field_owner: Vec<TypeId>,
    properties: Vec<PropertyDef>,
    property_owner: Vec<TypeId>,
    events: Vec<EventDef>,
    event_owner: Vec<TypeId>,
    interface_impls: Vec<InterfaceImplDef>,
    interface_impl_owner: Vec<TypeId>,
    attributes: Vec<CustomAttributeDef>,
    member_refs: Vec<MemberRef>,
    types_by_name: HashMap<String, TypeId>,
    assemblies_by_name: HashMap<String, AssemblyId>,
}

impl Universe {
    /// Creates an empty universe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------------------------
    // Population
    // ---------------------------------------------------------------------------------------

    /// Adds an assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if an assembly with the same name already exists.
    pub fn add_assembly(&mut self, name: &str) -> Result<AssemblyId> {
        if self.assemblies_by_name.contains_key(name) {
            return Err(Error::Error(format!("duplicate assembly {name}")));
        }
        let id = arena_push!(
            self.assemblies,
            AssemblyDef {
                name: name.to_string(),
                ..AssemblyDef::default()
            },
            AssemblyId
        );
        self.assemblies_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds a type to `assembly`, registering it with its enclosing type if nested.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same full name already exists or the enclosing type
    /// is unknown.
    pub fn add_type(&mut self, assembly: AssemblyId, def: TypeDef) -> Result<TypeId> {
        self.check_assembly(assembly)?;
        if let Some(outer) = def.declaring_type {
            self.check_type(outer)?;
        }
        let full_name = self.compose_full_name(&def);
        if self.types_by_name.contains_key(&full_name) {
            return Err(Error::Error(format!("duplicate type {full_name}")));
        }

        let declaring = def.declaring_type;
        let id = arena_push!(self.types, def, TypeId);
        self.type_owner.push(assembly);
        self.assemblies[assembly.index()].types.push(id);
        if let Some(outer) = declaring {
            self.types[outer.index()].nested_types.push(id);
        }
        self.types_by_name.insert(full_name, id);
        Ok(id)
    }

    /// Adds a method to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner` does not exist.
    pub fn add_method(&mut self, owner: TypeId, def: MethodDef) -> Result<MethodId> {
        self.check_type(owner)?;
        let id = arena_push!(self.methods, def, MethodId);
        self.method_owner.push(owner);
        self.types[owner.index()].methods.push(id);
        Ok(id)
    }

    /// Adds a field to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner` does not exist.
    pub fn add_field(&mut self, owner: TypeId, def: FieldDef) -> Result<FieldId> {
        self.check_type(owner)?;
        let id = arena_push!(self.fields, def, FieldId);
        self.field_owner.push(owner);
        self.types[owner.index()].fields.push(id);
        Ok(id)
    }

    /// Adds a property to `owner`. Accessors must already be methods of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner` does not exist.
    pub fn add_property(&mut self, owner: TypeId, def: PropertyDef) -> Result<PropertyId> {
        self.check_type(owner)?;
        let id = arena_push!(self.properties, def, PropertyId);
        self.property_owner.push(owner);
        self.types[owner.index()].properties.push(id);
        Ok(id)
    }

    /// Adds an event to `owner`. Accessors must already be methods of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner` does not exist.
    pub fn add_event(&mut self, owner: TypeId, def: EventDef) -> Result<EventId> {
        self.check_type(owner)?;
        let id = arena_push!(self.events, def, EventId);
        self.event_owner.push(owner);
        self.types[owner.index()].events.push(id);
        Ok(id)
    }

    /// Declares that `implementor` implements `interface`.
    ///
    /// # Errors
    ///
    /// Returns an error if `implementor` does not exist.
    pub fn add_interface_impl(
        &mut self,
        implementor: TypeId,
        interface: impl Into<TypeSig>,
    ) -> Result<InterfaceImplId> {
        self.check_type(implementor)?;
        let id = arena_push!(
            self.interface_impls,
            InterfaceImplDef {
                interface: interface.into(),
                attributes: Vec::new(),
            },
            InterfaceImplId
        );
        self.interface_impl_owner.push(implementor);
        self.types[implementor.index()].interfaces.push(id);
        Ok(id)
    }

    /// Applies a custom attribute to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not exist.
    pub fn add_attribute(
        &mut self,
        target: AttributeTarget,
        def: CustomAttributeDef,
    ) -> Result<AttributeId> {
        let id = arena_push!(self.attributes, def, AttributeId);
        let list = match target {
            AttributeTarget::Assembly(a) => self.assemblies.get_mut(a.index()).map(|d| &mut d.attributes),
            AttributeTarget::Type(t) => self.types.get_mut(t.index()).map(|d| &mut d.attributes),
            AttributeTarget::Method(m) => self.methods.get_mut(m.index()).map(|d| &mut d.attributes),
            AttributeTarget::Field(f) => self.fields.get_mut(f.index()).map(|d| &mut d.attributes),
            AttributeTarget::Property(p) => {
                self.properties.get_mut(p.index()).map(|d| &mut d.attributes)
            }
            AttributeTarget::Event(e) => self.events.get_mut(e.index()).map(|d| &mut d.attributes),
            AttributeTarget::InterfaceImpl(i) => {
                self.interface_impls.get_mut(i.index()).map(|d| &mut d.attributes)
            }
        };
        match list {
            Some(list) => {
                list.push(id);
                Ok(id)
            }
            None => {
                self.attributes.pop();
                Err(Error::Error(format!("attribute target {target:?} does not exist")))
            }
        }
    }

    /// Adds a member reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is exhausted.
    pub fn add_member_ref(&mut self, member_ref: MemberRef) -> Result<MemberRefId> {
        Ok(arena_push!(self.member_refs, member_ref, MemberRefId))
    }

    /// Sets the managed entry point of `assembly`.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembly does not exist.
    pub fn set_entry_point(&mut self, assembly: AssemblyId, method: MethodId) -> Result<()> {
        self.check_assembly(assembly)?;
        self.assemblies[assembly.index()].entry_point = Some(method);
        Ok(())
    }

    /// Gives mutable access to a method, for attaching a body after creation.
    pub fn method_mut(&mut self, id: MethodId) -> Option<&mut MethodDef> {
        self.methods.get_mut(id.index())
    }

    fn check_assembly(&self, id: AssemblyId) -> Result<()> {
        if id.index() < self.assemblies.len() {
            Ok(())
        } else {
            Err(Error::Error(format!("assembly {id} does not exist")))
        }
    }

    fn check_type(&self, id: TypeId) -> Result<()> {
        if id.index() < self.types.len() {
            Ok(())
        } else {
            Err(Error::Error(format!("type {id} does not exist")))
        }
    }

    fn compose_full_name(&self, def: &TypeDef) -> String {
        match def.declaring_type {
            Some(outer) => format!("{}/{}", self.type_full_name(outer), def.name),
            None if def.namespace.is_empty() => def.name.clone(),
            None => format!("{}.{}", def.namespace, def.name),
        }
    }

    // ---------------------------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------------------------

    /// Returns the assembly definition.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this universe.
    #[must_use]
    pub fn assembly(&self, id: AssemblyId) -> &AssemblyDef {
        &self.assemblies[id.index()]
    }

    /// Returns the type definition.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this universe.
    #[must_use]
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    /// Returns the method definition.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this universe.
    #[must_use]
    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    /// Returns the field definition.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this universe.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    /// Returns the property definition.
    #[must_use]
    pub fn property(&self, id: PropertyId) -> &PropertyDef {
        &self.properties[id.index()]
    }

    /// Returns the event definition.
    #[must_use]
    pub fn event(&self, id: EventId) -> &EventDef {
        &self.events[id.index()]
    }

    /// Returns the interface implementation row.
    #[must_use]
    pub fn interface_impl(&self, id: InterfaceImplId) -> &InterfaceImplDef {
        &self.interface_impls[id.index()]
    }

    /// Returns the custom attribute instance.
    #[must_use]
    pub fn attribute(&self, id: AttributeId) -> &CustomAttributeDef {
        &self.attributes[id.index()]
    }

    /// Returns the member reference.
    #[must_use]
    pub fn member_ref(&self, id: MemberRefId) -> &MemberRef {
        &self.member_refs[id.index()]
    }

    /// The assembly that defines `ty`.
    #[must_use]
    pub fn type_assembly(&self, ty: TypeId) -> AssemblyId {
        self.type_owner[ty.index()]
    }

    /// The type that declares `method`.
    #[must_use]
    pub fn method_owner(&self, method: MethodId) -> TypeId {
        self.method_owner[method.index()]
    }

    /// The type that declares `field`.
    #[must_use]
    pub fn field_owner(&self, field: FieldId) -> TypeId {
        self.field_owner[field.index()]
    }

    /// The type that declares `property`.
    #[must_use]
    pub fn property_owner(&self, property: PropertyId) -> TypeId {
        self.property_owner[property.index()]
    }

    /// The type that declares `event`.
    #[must_use]
    pub fn event_owner(&self, event: EventId) -> TypeId {
        self.event_owner[event.index()]
    }

    /// The type carrying the `T : I` declaration.
    #[must_use]
    pub fn interface_impl_owner(&self, id: InterfaceImplId) -> TypeId {
        self.interface_impl_owner[id.index()]
    }

    /// The assembly that defines `method`.
    #[must_use]
    pub fn method_assembly(&self, method: MethodId) -> AssemblyId {
        self.type_assembly(self.method_owner(method))
    }

    /// Iterates all assembly ids.
    pub fn assembly_ids(&self) -> impl Iterator<Item = AssemblyId> + '_ {
        (0..self.assemblies.len()).map(|i| AssemblyId::new(i as u32))
    }

    /// Number of assemblies.
    #[must_use]
    pub fn assembly_count(&self) -> usize {
        self.assemblies.len()
    }

    /// Number of types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of properties.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of custom attributes.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Number of interface implementation rows.
    #[must_use]
    pub fn interface_impl_count(&self) -> usize {
        self.interface_impls.len()
    }

    /// Finds a type by its full name, using `/` for nesting.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeId> {
        self.types_by_name.get(full_name).copied()
    }

    /// Finds a type by full name, restricted to one assembly.
    #[must_use]
    pub fn find_type_in(&self, assembly: AssemblyId, full_name: &str) -> Option<TypeId> {
        self.find_type(full_name)
            .filter(|&t| self.type_assembly(t) == assembly)
    }

    /// Finds an assembly by simple name.
    #[must_use]
    pub fn find_assembly(&self, name: &str) -> Option<AssemblyId> {
        self.assemblies_by_name.get(name).copied()
    }

    /// Finds the methods named `name` on `ty`, not searching base types.
    pub fn methods_named<'a>(
        &'a self,
        ty: TypeId,
        name: &'a str,
    ) -> impl Iterator<Item = MethodId> + 'a {
        self.type_def(ty)
            .methods
            .iter()
            .copied()
            .filter(move |&m| self.method(m).name == name)
    }

    /// Returns the type initializer of `ty`, if any.
    #[must_use]
    pub fn type_initializer(&self, ty: TypeId) -> Option<MethodId> {
        self.type_def(ty)
            .methods
            .iter()
            .copied()
            .find(|&m| self.method(m).is_type_initializer())
    }

    /// Returns the parameterless instance constructor of `ty`, if any.
    #[must_use]
    pub fn default_constructor(&self, ty: TypeId) -> Option<MethodId> {
        self.type_def(ty).methods.iter().copied().find(|&m| {
            let def = self.method(m);
            def.is_instance_constructor() && def.params.is_empty()
        })
    }

    // ---------------------------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------------------------

    /// Resolves a method handle to its uninstantiated definition.
    ///
    /// Generic instance references and method specifications resolve to the method on the
    /// generic definition. Returns `None` for unresolved references.
    #[must_use]
    pub fn resolve_method(&self, handle: MethodHandle) -> Option<MethodId> {
        match handle {
            MethodHandle::Def(id) => Some(id),
            MethodHandle::Ref(r) => match self.member_ref(r) {
                MemberRef::MethodOnGenericInstance { method, .. } => Some(*method),
                MemberRef::MethodSpec { method, .. } => self.resolve_method(*method),
                _ => None,
            },
        }
    }

    /// Resolves a field handle to its uninstantiated definition.
    #[must_use]
    pub fn resolve_field(&self, handle: FieldHandle) -> Option<FieldId> {
        match handle {
            FieldHandle::Def(id) => Some(id),
            FieldHandle::Ref(r) => match self.member_ref(r) {
                MemberRef::FieldOnGenericInstance { field, .. } => Some(*field),
                _ => None,
            },
        }
    }

    /// Returns the base type definition of `ty`.
    #[must_use]
    pub fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        self.type_def(ty).base.as_ref().and_then(TypeSig::definition)
    }

    /// Returns `true` if `ty` derives, directly or transitively, from `ancestor`.
    #[must_use]
    pub fn derives_from(&self, ty: TypeId, ancestor: TypeId) -> bool {
        let mut current = self.base_type(ty);
        for _ in 0..MAX_HIERARCHY_DEPTH {
            match current {
                Some(t) if t == ancestor => return true,
                Some(t) => current = self.base_type(t),
                None => return false,
            }
        }
        false
    }

    /// Computes the stack effect of an instruction.
    ///
    /// Call-like opcodes take their effect from the callee signature: every parameter is
    /// popped, plus `this` for instance `call`/`callvirt`; a non-void result is pushed, and
    /// `newobj` always pushes the new object. Returns `None` when the callee cannot be resolved.
    #[must_use]
    pub fn stack_behavior(&self, instruction: &Instruction) -> Option<StackBehavior> {
        if let Some(fixed) = instruction.opcode.stack_behavior() {
            return Some(fixed);
        }
        let Operand::Method(handle) = &instruction.operand else {
            return None;
        };
        let callee = self.method(self.resolve_method(*handle)?);
        let params = u8::try_from(callee.params.len()).ok()?;
        let (pops, pushes) = match instruction.opcode {
            OpCode::Newobj => (params, 1),
            _ => {
                let this = u8::from(!callee.is_static());
                let result = u8::from(callee.return_type != TypeSig::Void);
                (params.checked_add(this)?, result)
            }
        };
        Some(StackBehavior::new(pops, pushes))
    }

    // ---------------------------------------------------------------------------------------
    // Naming
    // ---------------------------------------------------------------------------------------

    /// Full name of a type, `Namespace.Name` or `Outer/Inner`.
    #[must_use]
    pub fn type_full_name(&self, ty: TypeId) -> String {
        self.compose_full_name(self.type_def(ty))
    }

    /// Renders a type signature, e.g. ``System.Collections.Generic.List`1<System.Int32>[]``.
    #[must_use]
    pub fn sig_name(&self, sig: &TypeSig) -> String {
        match sig {
            TypeSig::Void => "System.Void".to_string(),
            TypeSig::Def(t) => self.type_full_name(*t),
            TypeSig::GenericInst(t, args) => {
                let args: Vec<String> = args.iter().map(|a| self.sig_name(a)).collect();
                format!("{}<{}>", self.type_full_name(*t), args.join(","))
            }
            TypeSig::SzArray(inner) => format!("{}[]", self.sig_name(inner)),
            TypeSig::Array(inner, rank) => {
                let commas = ",".repeat((*rank as usize).saturating_sub(1));
                format!("{}[{}]", self.sig_name(inner), commas)
            }
            TypeSig::ByRef(inner) => format!("{}&", self.sig_name(inner)),
            TypeSig::Pointer(inner) => format!("{}*", self.sig_name(inner)),
            TypeSig::Var(n) => format!("!{n}"),
            TypeSig::MVar(n) => format!("!!{n}"),
            TypeSig::Unresolved(name) => name.clone(),
        }
    }

    /// Full name of a method, e.g. `App.Foo::Bar(System.String)`.
    #[must_use]
    pub fn method_full_name(&self, method: MethodId) -> String {
        let def = self.method(method);
        let params: Vec<String> = def.params.iter().map(|p| self.sig_name(p)).collect();
        format!(
            "{}::{}({})",
            self.type_full_name(self.method_owner(method)),
            def.name,
            params.join(",")
        )
    }

    /// Full name of a field, e.g. `App.Foo::count`.
    #[must_use]
    pub fn field_full_name(&self, field: FieldId) -> String {
        format!(
            "{}::{}",
            self.type_full_name(self.field_owner(field)),
            self.field(field).name
        )
    }

    /// Full name of a property.
    #[must_use]
    pub fn property_full_name(&self, property: PropertyId) -> String {
        format!(
            "{}::{}",
            self.type_full_name(self.property_owner(property)),
            self.property(property).name
        )
    }

    /// Full name of an event.
    #[must_use]
    pub fn event_full_name(&self, event: EventId) -> String {
        format!(
            "{}::{}",
            self.type_full_name(self.event_owner(event)),
            self.event(event).name
        )
    }

    /// Renders a member reference, e.g. ``System.Collections.Generic.List`1<System.Int32>::Add``.
    #[must_use]
    pub fn member_ref_name(&self, id: MemberRefId) -> String {
        match self.member_ref(id) {
            MemberRef::MethodOnGenericInstance { declaring, method } => {
                format!("{}::{}", self.sig_name(declaring), self.method(*method).name)
            }
            MemberRef::FieldOnGenericInstance { declaring, field } => {
                format!("{}::{}", self.sig_name(declaring), self.field(*field).name)
            }
            MemberRef::MethodSpec { method, args } => {
                let base = match self.resolve_method(*method) {
                    Some(m) => self.method_full_name(m),
                    None => "<unresolved>".to_string(),
                };
                let args: Vec<String> = args.iter().map(|a| self.sig_name(a)).collect();
                format!("{}<{}>", base, args.join(","))
            }
            MemberRef::UnresolvedMethod { name } | MemberRef::UnresolvedField { name } => {
                name.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, MethodModifiers};

    #[test]
    fn test_population_and_names() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let outer = u.add_type(asm, TypeDef::new("App", "Outer"))?;
        let inner = u.add_type(asm, TypeDef::new("", "Inner").nested_in(outer))?;
        let m = u.add_method(
            inner,
            MethodDef::new("Run").with_params(vec![TypeSig::Def(outer)]),
        )?;
        let f = u.add_field(outer, FieldDef::new("count", TypeSig::Def(inner)))?;

        assert_eq!(u.type_full_name(inner), "App.Outer/Inner");
        assert_eq!(u.find_type("App.Outer/Inner"), Some(inner));
        assert_eq!(u.type_def(outer).nested_types, vec![inner]);
        assert_eq!(u.method_full_name(m), "App.Outer/Inner::Run(App.Outer)");
        assert_eq!(u.field_full_name(f), "App.Outer::count");
        assert_eq!(u.method_assembly(m), asm);
        assert!(u.add_type(asm, TypeDef::new("App", "Outer")).is_err());
        Ok(())
    }

    #[test]
    fn test_resolution_through_refs() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("Lib")?;
        let list = u.add_type(asm, TypeDef::new("Lib", "List`1").with_generic_params(&["T"]))?;
        let add = u.add_method(list, MethodDef::new("Add").with_params(vec![TypeSig::Var(0)]))?;
        let int = u.add_type(asm, TypeDef::new("Lib", "Int"))?;

        let on_inst = u.add_member_ref(MemberRef::MethodOnGenericInstance {
            declaring: TypeSig::GenericInst(list, vec![TypeSig::Def(int)]),
            method: add,
        })?;
        let missing = u.add_member_ref(MemberRef::UnresolvedMethod {
            name: "Lib.Gone::Away()".into(),
        })?;

        assert_eq!(u.resolve_method(MethodHandle::Ref(on_inst)), Some(add));
        assert_eq!(u.resolve_method(MethodHandle::Ref(missing)), None);
        assert_eq!(u.member_ref_name(on_inst), "Lib.List`1<Lib.Int>::Add");
        Ok(())
    }

    #[test]
    fn test_call_stack_behavior() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let t = u.add_type(asm, TypeDef::new("App", "T"))?;
        let inst = u.add_method(
            t,
            MethodDef::new("M").with_params(vec![TypeSig::Def(t), TypeSig::Def(t)]).returning(t),
        )?;
        let stat = u.add_method(
            t,
            MethodDef::new("S").with_modifiers(MethodModifiers::STATIC),
        )?;
        let ctor = u.add_method(t, MethodDef::constructor().with_params(vec![TypeSig::Def(t)]))?;

        let call = |opcode, m: MethodId| Instruction {
            offset: 0,
            opcode,
            operand: Operand::Method(MethodHandle::Def(m)),
        };
        assert_eq!(u.stack_behavior(&call(OpCode::Callvirt, inst)), Some(StackBehavior::new(3, 1)));
        assert_eq!(u.stack_behavior(&call(OpCode::Call, stat)), Some(StackBehavior::new(0, 0)));
        assert_eq!(u.stack_behavior(&call(OpCode::Newobj, ctor)), Some(StackBehavior::new(1, 1)));
        Ok(())
    }

    #[test]
    fn test_derives_from() -> Result<()> {
        let mut u = Universe::new();
        let asm = u.add_assembly("App")?;
        let a = u.add_type(asm, TypeDef::new("App", "A"))?;
        let b = u.add_type(asm, TypeDef::new("App", "B").with_base(a))?;
        let c = u.add_type(asm, TypeDef::new("App", "C").with_base(b))?;
        assert!(u.derives_from(c, a));
        assert!(!u.derives_from(a, c));
        assert_eq!(u.base_type(c), Some(b));
        Ok(())
    }
}
