//! The annotation store: every piece of per-member state the mark step maintains.
//!
//! The store is the single source of truth for "is X marked", "has X been processed", "is this
//! type ever constructed", and for the per-assembly and per-method actions. Marking goes
//! exclusively through the `mark_*` helpers, each of which records a provenance edge before
//! setting the bit, so a member can never become reachable without a recorded reason.
//!
//! All state is monotonic: nothing is ever unmarked, unprocessed or uninstantiated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    linker::{
        provenance::DependencyRecorder, DependencyInfo, DependencyKind, DependencyNode,
        EntryInfo, Member,
    },
    model::{
        AssemblyId, AttributeId, EventId, FieldId, InterfaceImplId, MethodId, PropertyId, TypeId,
        Universe,
    },
    utils::BitSet,
    Error, Result,
};

/// What happens to an assembly in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum AssemblyAction {
    /// Neither processed nor written
    Skip,
    /// Kept byte for byte; everything in it is marked
    Copy,
    /// Kept byte for byte if anything in it is used
    CopyUsed,
    /// Trimmed to the marked members
    Link,
    /// Removed from the output
    Delete,
    /// Kept, with metadata rewritten; everything in it is marked
    Save,
    /// Like `Copy`, dropping native images
    AddBypassNGen,
    /// Like `CopyUsed`, dropping native images
    AddBypassNGenUsed,
}

impl AssemblyAction {
    /// Returns `true` for actions that keep the whole assembly unconditionally.
    #[must_use]
    pub fn keeps_everything(self) -> bool {
        matches!(
            self,
            AssemblyAction::Copy | AssemblyAction::Save | AssemblyAction::AddBypassNGen
        )
    }

    /// Returns `true` for actions that keep the whole assembly once anything in it is used.
    #[must_use]
    pub fn keeps_everything_when_used(self) -> bool {
        matches!(
            self,
            AssemblyAction::CopyUsed | AssemblyAction::AddBypassNGenUsed
        )
    }
}

/// What happens to a method body in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum MethodAction {
    /// Not decided yet
    Nothing,
    /// Body scanned and kept
    Parse,
    /// Body scanned and kept regardless of optimizations
    ForceParse,
    /// Body replaced with an empty stub
    ConvertToStub,
    /// Body replaced with `throw new NotSupportedException()`
    ConvertToThrow,
}

/// Which members of a type to keep whenever the type is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypePreserve {
    /// Every field and method
    All,
    /// Every field
    Fields,
    /// Every method
    Methods,
}

impl TypePreserve {
    fn merge(self, other: TypePreserve) -> TypePreserve {
        if self == other {
            self
        } else {
            TypePreserve::All
        }
    }

    /// Returns `true` if fields are preserved.
    #[must_use]
    pub fn fields(self) -> bool {
        matches!(self, TypePreserve::All | TypePreserve::Fields)
    }

    /// Returns `true` if methods are preserved.
    #[must_use]
    pub fn methods(self) -> bool {
        matches!(self, TypePreserve::All | TypePreserve::Methods)
    }
}

/// `override_method` satisfies `base`, optionally through a specific `T : I` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverrideInformation {
    /// The overridden virtual or interface method
    pub base: MethodId,
    /// The overriding method
    pub override_method: MethodId,
    /// The interface implementation through which an interface method is satisfied
    pub matching_interface_impl: Option<InterfaceImplId>,
}

impl OverrideInformation {
    /// Returns `true` if `base` is an interface method.
    #[must_use]
    pub fn is_interface_override(&self) -> bool {
        self.matching_interface_impl.is_some()
    }
}

/// A default interface method used by a type that does not implement the method itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultInterfaceImplementation {
    /// The interface method being satisfied
    pub interface_method: MethodId,
    /// The class or struct needing an implementation
    pub implementing_type: TypeId,
    /// The `T : I` declaration through which the default was found
    pub interface_impl: InterfaceImplId,
    /// The method with the body
    pub implementation: MethodId,
}

#[derive(Debug, Clone)]
struct MemberBits {
    assemblies: BitSet,
    types: BitSet,
    methods: BitSet,
    fields: BitSet,
    properties: BitSet,
    events: BitSet,
    attributes: BitSet,
    interface_impls: BitSet,
}

impl MemberBits {
    fn new(universe: &Universe) -> Self {
        MemberBits {
            assemblies: BitSet::new(universe.assembly_count()),
            types: BitSet::new(universe.type_count()),
            methods: BitSet::new(universe.method_count()),
            fields: BitSet::new(universe.field_count()),
            properties: BitSet::new(universe.property_count()),
            events: BitSet::new(universe.event_count()),
            attributes: BitSet::new(universe.attribute_count()),
            interface_impls: BitSet::new(universe.interface_impl_count()),
        }
    }

    fn set(&self, member: Member) -> (&BitSet, usize) {
        match member {
            Member::Assembly(id) => (&self.assemblies, id.index()),
            Member::Type(id) => (&self.types, id.index()),
            Member::Method(id) => (&self.methods, id.index()),
            Member::Field(id) => (&self.fields, id.index()),
            Member::Property(id) => (&self.properties, id.index()),
            Member::Event(id) => (&self.events, id.index()),
            Member::Attribute(id) => (&self.attributes, id.index()),
            Member::InterfaceImpl(id) => (&self.interface_impls, id.index()),
        }
    }

    fn set_mut(&mut self, member: Member) -> (&mut BitSet, usize) {
        match member {
            Member::Assembly(id) => (&mut self.assemblies, id.index()),
            Member::Type(id) => (&mut self.types, id.index()),
            Member::Method(id) => (&mut self.methods, id.index()),
            Member::Field(id) => (&mut self.fields, id.index()),
            Member::Property(id) => (&mut self.properties, id.index()),
            Member::Event(id) => (&mut self.events, id.index()),
            Member::Attribute(id) => (&mut self.attributes, id.index()),
            Member::InterfaceImpl(id) => (&mut self.interface_impls, id.index()),
        }
    }

    fn contains(&self, member: Member) -> bool {
        let (set, index) = self.set(member);
        set.contains(index)
    }

    fn insert(&mut self, member: Member) -> Result<bool> {
        let (set, index) = self.set_mut(member);
        if index >= set.len() {
            return Err(internal_error!("{:?} is not part of the universe", member));
        }
        Ok(set.insert(index))
    }
}

/// Mark and process bits, actions, override registries and the provenance recorder.
#[derive(Debug)]
pub struct AnnotationStore {
    marked: MemberBits,
    processed: MemberBits,
    instantiated: BitSet,
    assembly_names: Vec<String>,
    assembly_actions: Vec<Option<AssemblyAction>>,
    method_actions: HashMap<MethodId, MethodAction>,
    overrides: HashMap<MethodId, Vec<OverrideInformation>>,
    base_methods: HashMap<MethodId, Vec<OverrideInformation>>,
    default_implementations: HashMap<MethodId, Vec<DefaultInterfaceImplementation>>,
    preserve: HashMap<TypeId, TypePreserve>,
    generation: u64,
    recorder: DependencyRecorder,
}

/// Types the runtime constructs without visible IL.
const ALWAYS_INSTANTIATED: [&str; 4] = [
    "System.Delegate",
    "System.MulticastDelegate",
    "System.ValueType",
    "System.Enum",
];

impl AnnotationStore {
    /// Creates an empty store sized for `universe`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provenance recorder cannot be created.
    pub fn new(universe: &Universe) -> Result<Self> {
        let mut instantiated = BitSet::new(universe.type_count());
        for name in ALWAYS_INSTANTIATED {
            if let Some(ty) = universe.find_type(name) {
                instantiated.insert(ty.index());
            }
        }
        Ok(AnnotationStore {
            marked: MemberBits::new(universe),
            processed: MemberBits::new(universe),
            instantiated,
            assembly_names: universe
                .assembly_ids()
                .map(|a| universe.assembly(a).name.clone())
                .collect(),
            assembly_actions: vec![None; universe.assembly_count()],
            method_actions: HashMap::new(),
            overrides: HashMap::new(),
            base_methods: HashMap::new(),
            default_implementations: HashMap::new(),
            preserve: HashMap::new(),
            generation: 0,
            recorder: DependencyRecorder::new()?,
        })
    }

    // ---------------------------------------------------------------------------------------
    // Marking
    // ---------------------------------------------------------------------------------------

    /// Marks a method. Returns `true` if it was not marked before.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_method(&mut self, method: MethodId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Method(method), reason)
    }

    /// Marks a type.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_type(&mut self, ty: TypeId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Type(ty), reason)
    }

    /// Marks a field.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_field(&mut self, field: FieldId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Field(field), reason)
    }

    /// Marks a property.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_property(&mut self, property: PropertyId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Property(property), reason)
    }

    /// Marks an event.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_event(&mut self, event: EventId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Event(event), reason)
    }

    /// Marks a custom attribute instance.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_attribute(&mut self, attribute: AttributeId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Attribute(attribute), reason)
    }

    /// Marks an interface implementation declaration.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_interface_impl(
        &mut self,
        interface_impl: InterfaceImplId,
        reason: &DependencyInfo,
    ) -> Result<bool> {
        self.mark(Member::InterfaceImpl(interface_impl), reason)
    }

    /// Marks an assembly.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `reason` requires a source and has none.
    pub fn mark_assembly(&mut self, assembly: AssemblyId, reason: &DependencyInfo) -> Result<bool> {
        self.mark(Member::Assembly(assembly), reason)
    }

    /// Marks a root. The member becomes an entry node of the provenance graph.
    ///
    /// # Errors
    ///
    /// Propagates recorder errors.
    pub fn mark_entry(&mut self, info: EntryInfo) -> Result<bool> {
        let member = info.entry;
        self.recorder.record_entry(info)?;
        self.set_marked(member)
    }

    /// Records an edge between nodes that are not themselves marked, such as member
    /// references and type specifications.
    ///
    /// # Errors
    ///
    /// Propagates recorder errors.
    pub fn record_dependency(
        &mut self,
        from: DependencyNode,
        to: DependencyNode,
        kind: DependencyKind,
    ) -> Result<bool> {
        self.recorder.record_dependency(from, to, kind)
    }

    fn mark(&mut self, member: Member, reason: &DependencyInfo) -> Result<bool> {
        let source = match &reason.source {
            Some(source) => source.clone(),
            None if reason.kind.requires_source() => {
                return Err(internal_error!(
                    "{} reason for {:?} arrived without a source",
                    reason.kind,
                    member
                ));
            }
            None => DependencyNode::Linker,
        };
        self.recorder
            .record_dependency(source, member.into(), reason.kind)?;
        self.set_marked(member)
    }

    fn set_marked(&mut self, member: Member) -> Result<bool> {
        let newly = self.marked.insert(member)?;
        if newly {
            self.generation += 1;
            tracing::trace!(member = ?member, "marked");
        }
        Ok(newly)
    }

    /// Returns `true` if `member` is marked.
    #[must_use]
    pub fn is_marked(&self, member: impl Into<Member>) -> bool {
        self.marked.contains(member.into())
    }

    /// Returns `true` if `member` has been processed.
    #[must_use]
    pub fn is_processed(&self, member: impl Into<Member>) -> bool {
        self.processed.contains(member.into())
    }

    /// Sets the processed flag. Returns `true` if it was not set before.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `member` is not part of the universe.
    pub fn set_processed(&mut self, member: impl Into<Member>) -> Result<bool> {
        self.processed.insert(member.into())
    }

    /// Monotonic counter bumped on every new mark or instantiation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Iterates the marked methods in id order.
    pub fn marked_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.marked.methods.iter().map(index_to_id(MethodId::new))
    }

    /// Iterates the marked types in id order.
    pub fn marked_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.marked.types.iter().map(index_to_id(TypeId::new))
    }

    /// Iterates the marked fields in id order.
    pub fn marked_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.marked.fields.iter().map(index_to_id(FieldId::new))
    }

    /// Iterates every marked member.
    pub fn marked_members(&self) -> impl Iterator<Item = Member> + '_ {
        let bits = &self.marked;
        bits.assemblies
            .iter()
            .map(|i| Member::Assembly(index_to_id(AssemblyId::new)(i)))
            .chain(bits.types.iter().map(|i| Member::Type(index_to_id(TypeId::new)(i))))
            .chain(bits.methods.iter().map(|i| Member::Method(index_to_id(MethodId::new)(i))))
            .chain(bits.fields.iter().map(|i| Member::Field(index_to_id(FieldId::new)(i))))
            .chain(
                bits.properties
                    .iter()
                    .map(|i| Member::Property(index_to_id(PropertyId::new)(i))),
            )
            .chain(bits.events.iter().map(|i| Member::Event(index_to_id(EventId::new)(i))))
            .chain(
                bits.attributes
                    .iter()
                    .map(|i| Member::Attribute(index_to_id(AttributeId::new)(i))),
            )
            .chain(
                bits.interface_impls
                    .iter()
                    .map(|i| Member::InterfaceImpl(index_to_id(InterfaceImplId::new)(i))),
            )
    }

    // ---------------------------------------------------------------------------------------
    // Instantiation
    // ---------------------------------------------------------------------------------------

    /// Returns `true` if `ty` is known to be constructed somewhere.
    #[must_use]
    pub fn is_instantiated(&self, ty: TypeId) -> bool {
        self.instantiated.contains(ty.index())
    }

    /// Marks `ty` as instantiated without recording a reason.
    pub fn mark_instantiated_untracked(&mut self, ty: TypeId) -> bool {
        let newly = ty.index() < self.instantiated.len() && self.instantiated.insert(ty.index());
        if newly {
            self.generation += 1;
        }
        newly
    }

    /// Marks `ty` as instantiated by `ctor`, recording the edge.
    ///
    /// # Errors
    ///
    /// Propagates recorder errors.
    pub fn mark_instantiated_by_constructor(&mut self, ctor: MethodId, ty: TypeId) -> Result<bool> {
        self.recorder.record_dependency(
            DependencyNode::Method(ctor),
            DependencyNode::Type(ty),
            DependencyKind::InstantiatedByCtor,
        )?;
        Ok(self.mark_instantiated_untracked(ty))
    }

    // ---------------------------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------------------------

    /// Sets the action of an assembly.
    pub fn set_action(&mut self, assembly: AssemblyId, action: AssemblyAction) {
        if let Some(slot) = self.assembly_actions.get_mut(assembly.index()) {
            *slot = Some(action);
        }
    }

    /// Returns the action of an assembly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAssemblyAction`] if no action was set.
    pub fn get_action(&self, assembly: AssemblyId) -> Result<AssemblyAction> {
        self.assembly_actions
            .get(assembly.index())
            .copied()
            .flatten()
            .ok_or_else(|| {
                Error::MissingAssemblyAction(
                    self.assembly_names
                        .get(assembly.index())
                        .cloned()
                        .unwrap_or_else(|| assembly.to_string()),
                )
            })
    }

    /// Sets the action of a method.
    pub fn set_method_action(&mut self, method: MethodId, action: MethodAction) {
        self.method_actions.insert(method, action);
    }

    /// Returns the action of a method, [`MethodAction::Nothing`] if none was set.
    #[must_use]
    pub fn get_method_action(&self, method: MethodId) -> MethodAction {
        self.method_actions
            .get(&method)
            .copied()
            .unwrap_or(MethodAction::Nothing)
    }

    // ---------------------------------------------------------------------------------------
    // Registries
    // ---------------------------------------------------------------------------------------

    /// Registers that `info.override_method` overrides `info.base`.
    pub fn add_override(&mut self, info: OverrideInformation) {
        let list = self.overrides.entry(info.base).or_default();
        if !list.contains(&info) {
            list.push(info);
        }
    }

    /// Every known override of `base`.
    #[must_use]
    pub fn get_overrides(&self, base: MethodId) -> &[OverrideInformation] {
        self.overrides.get(&base).map_or(&[], Vec::as_slice)
    }

    /// Registers that `info.base` is overridden by `info.override_method`.
    pub fn add_base_method(&mut self, info: OverrideInformation) {
        let list = self.base_methods.entry(info.override_method).or_default();
        if !list.contains(&info) {
            list.push(info);
        }
    }

    /// Every method `method` overrides.
    #[must_use]
    pub fn get_base_methods(&self, method: MethodId) -> &[OverrideInformation] {
        self.base_methods.get(&method).map_or(&[], Vec::as_slice)
    }

    /// Registers a default interface method used by an implementing type.
    pub fn add_default_implementation(&mut self, info: DefaultInterfaceImplementation) {
        let list = self
            .default_implementations
            .entry(info.interface_method)
            .or_default();
        if !list.contains(&info) {
            list.push(info);
        }
    }

    /// Every default implementation registered for `interface_method`.
    #[must_use]
    pub fn get_default_implementations(
        &self,
        interface_method: MethodId,
    ) -> &[DefaultInterfaceImplementation] {
        self.default_implementations
            .get(&interface_method)
            .map_or(&[], Vec::as_slice)
    }

    /// Requests that members of `ty` be kept whenever it is marked. Requests accumulate.
    pub fn set_preserve(&mut self, ty: TypeId, preserve: TypePreserve) {
        self.preserve
            .entry(ty)
            .and_modify(|p| *p = p.merge(preserve))
            .or_insert(preserve);
    }

    /// The preserve request for `ty`.
    #[must_use]
    pub fn get_preserve(&self, ty: TypeId) -> Option<TypePreserve> {
        self.preserve.get(&ty).copied()
    }

    // ---------------------------------------------------------------------------------------
    // Provenance
    // ---------------------------------------------------------------------------------------

    /// The provenance recorder.
    #[must_use]
    pub fn recorder(&self) -> &DependencyRecorder {
        &self.recorder
    }

    /// Mutable access to the provenance recorder.
    pub fn recorder_mut(&mut self) -> &mut DependencyRecorder {
        &mut self.recorder
    }
}

fn index_to_id<I>(make: fn(u32) -> I) -> impl Fn(usize) -> I {
    move |index| make(u32::try_from(index).unwrap_or(u32::MAX))
}
