//! Dependency reasons.
//!
//! Every mark carries a [`DependencyInfo`]: a [`DependencyKind`] saying *why* plus the
//! [`DependencyNode`] it came from. Roots carry an [`EntryInfo`] instead. The kinds form a
//! closed taxonomy; adding a new way for members to become reachable means adding a variant
//! here, not passing a free-form string.

use serde::Serialize;
use strum::{Display, EnumCount, EnumIter};

use crate::{
    model::{
        AssemblyId, AttributeId, EventId, FieldId, InterfaceImplId, MemberRefId, MethodId,
        PropertyId, TypeId, TypeSig, Universe,
    },
};

/// Why a member was pulled into the dependency graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, Serialize,
)]
pub enum DependencyKind {
    // Entry points
    /// Member of a root assembly, kept by its visibility rule
    RootAssembly,
    /// Named by an XML descriptor
    XmlDescriptor,
    /// Kept because its assembly is copied or saved as a whole
    AssemblyAction,
    /// Assembly- or module-level custom attribute
    AssemblyOrModuleAttribute,
    /// Named on the command line
    CommandLine,

    // Containment
    /// The declaring type of a member
    DeclaringType,
    /// A nested type of a fully kept type
    NestedType,
    /// A member of a fully kept type
    MemberOfType,
    /// A type of a fully kept assembly
    TypeInAssembly,
    /// The assembly defining a marked type
    ScopeOfType,
    /// The property an accessor belongs to
    PropertyOfPropertyMethod,
    /// The event an accessor belongs to
    EventOfEventMethod,
    /// An accessor of a marked property
    PropertyMethod,
    /// An accessor of a marked event
    EventMethod,
    /// A runtime-required method of a special type such as a delegate
    MethodForSpecialType,
    /// The value field or a constant of a marked enum
    EnumField,
    /// An instance field of a marked value type, kept for its layout
    ValueTypeField,

    // Type relationships
    /// Base type of a marked type
    BaseType,
    /// The interface named by an interface implementation
    InterfaceImplementationInterfaceType,
    /// An interface implementation of a marked type
    InterfaceImplementationOnType,
    /// A generic parameter constraint
    GenericParameterConstraintType,
    /// A generic argument of an instantiation
    GenericArgumentType,
    /// The element or definition of a composite type signature
    ElementType,
    /// A parameter type
    ParameterType,
    /// A return type
    ReturnType,
    /// The type of a marked field
    FieldType,
    /// The type of a local variable
    VariableType,
    /// The type caught by an exception handler
    CatchType,
    /// The delegate type of an event
    EventType,

    // Instructions
    /// `call`
    DirectCall,
    /// `callvirt`; the target is one possible dispatch target, not a proven one
    VirtualCall,
    /// `newobj`
    Newobj,
    /// `ldftn`
    Ldftn,
    /// `ldvirtftn`
    Ldvirtftn,
    /// `ldtoken`
    Ldtoken,
    /// `ldfld`, `stfld`, `ldsfld` and friends
    FieldAccess,
    /// A type operand such as `castclass` or `box`
    InstructionTypeRef,
    /// A static field access runs the declaring type's static constructor
    TriggersCctorThroughFieldAccess,
    /// A static method call runs the declaring type's static constructor
    TriggersCctorForCalledMethod,

    // Instantiation
    /// A type instantiated by a marked constructor
    InstantiatedByCtor,
    /// Static constructor of an instantiated type
    CctorForType,
    /// Runtime-required method of an instantiated type
    MethodForInstantiatedType,
    /// Definition behind a method reference on a generic instantiation
    MethodOnGenericInstance,
    /// Definition behind a field reference on a generic instantiation
    FieldOnGenericInstance,
    /// Generic method definition behind a method specification
    ElementMethod,

    // Overrides
    /// Override kept because override removal is off or its base is abstract
    Override,
    /// Override kept because its declaring type is instantiated
    OverrideOnInstantiatedType,
    /// A method overridden by a marked method
    BaseMethod,
    /// Target of an explicit `.override`
    MethodImplOverride,
    /// Default interface method used by an instantiated implementing type
    DefaultImplementationForImplementingType,

    // Custom attributes
    /// A custom attribute of a marked member
    CustomAttribute,
    /// The constructor of a marked custom attribute
    AttributeConstructor,
    /// A `Type` or enum argument of a custom attribute
    CustomAttributeArgumentType,
    /// A field assigned by a named attribute argument
    CustomAttributeField,
    /// A property assigned by a named attribute argument
    CustomAttributeProperty,
    /// Named by a `DynamicDependencyAttribute`
    DynamicDependency,
    /// Named by a `PreserveDependencyAttribute`
    PreserveDependency,

    // Reflection
    /// Target of a recognized reflection pattern
    AccessedViaReflection,
    /// Default constructor needed by `Activator.CreateInstance` and similar
    DefaultConstructorForReflection,

    // Interop
    /// Member needed by the marshaller for a P/Invoke signature
    InteropMethodDependency,
    /// Field of a struct the marshaller copies by value
    MarshalledTypeField,

    // Linker internals
    /// Reason not tracked further
    Unspecified,
    /// Deliberately untracked; attributed to the linker node
    Untracked,
    /// Member needed to rewrite a body that can never run
    UnreachableBodyRequirement,
    /// Member kept by a type preserve annotation
    TypePreserve,
    /// Marked by a mark-step hook
    Custom,
}

/// Coarse grouping of [`DependencyKind`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[allow(missing_docs)]
pub enum DependencyCategory {
    Entry,
    Containment,
    TypeRelationship,
    Instruction,
    Instantiation,
    Override,
    CustomAttribute,
    Reflection,
    Interop,
    Internal,
}

impl DependencyKind {
    /// Returns the category of this kind.
    #[must_use]
    pub fn category(self) -> DependencyCategory {
        use DependencyKind::*;
        match self {
            RootAssembly | XmlDescriptor | AssemblyAction | AssemblyOrModuleAttribute
            | CommandLine => DependencyCategory::Entry,
            DeclaringType | NestedType | MemberOfType | TypeInAssembly | ScopeOfType
            | PropertyOfPropertyMethod | EventOfEventMethod | PropertyMethod | EventMethod
            | MethodForSpecialType | EnumField | ValueTypeField => DependencyCategory::Containment,
            BaseType
            | InterfaceImplementationInterfaceType
            | InterfaceImplementationOnType
            | GenericParameterConstraintType
            | GenericArgumentType
            | ElementType
            | ParameterType
            | ReturnType
            | FieldType
            | VariableType
            | CatchType
            | EventType => DependencyCategory::TypeRelationship,
            DirectCall
            | VirtualCall
            | Newobj
            | Ldftn
            | Ldvirtftn
            | Ldtoken
            | FieldAccess
            | InstructionTypeRef
            | TriggersCctorThroughFieldAccess
            | TriggersCctorForCalledMethod => DependencyCategory::Instruction,
            InstantiatedByCtor
            | CctorForType
            | MethodForInstantiatedType
            | MethodOnGenericInstance
            | FieldOnGenericInstance
            | ElementMethod => DependencyCategory::Instantiation,
            Override
            | OverrideOnInstantiatedType
            | BaseMethod
            | MethodImplOverride
            | DefaultImplementationForImplementingType => DependencyCategory::Override,
            CustomAttribute
            | AttributeConstructor
            | CustomAttributeArgumentType
            | CustomAttributeField
            | CustomAttributeProperty
            | DynamicDependency
            | PreserveDependency => DependencyCategory::CustomAttribute,
            AccessedViaReflection | DefaultConstructorForReflection => {
                DependencyCategory::Reflection
            }
            InteropMethodDependency | MarshalledTypeField => DependencyCategory::Interop,
            Unspecified | Untracked | UnreachableBodyRequirement | TypePreserve | Custom => {
                DependencyCategory::Internal
            }
        }
    }

    /// Returns `true` if a reason of this kind must name the member it came from.
    #[must_use]
    pub fn requires_source(self) -> bool {
        !matches!(
            self,
            DependencyKind::Unspecified | DependencyKind::Untracked | DependencyKind::Custom
        )
    }
}

/// Why a member is a root of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[allow(missing_docs)]
pub enum EntryKind {
    RootAssembly,
    XmlDescriptor,
    AssemblyAction,
    AssemblyOrModuleAttribute,
    CommandLine,
}

impl From<EntryKind> for DependencyKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::RootAssembly => DependencyKind::RootAssembly,
            EntryKind::XmlDescriptor => DependencyKind::XmlDescriptor,
            EntryKind::AssemblyAction => DependencyKind::AssemblyAction,
            EntryKind::AssemblyOrModuleAttribute => DependencyKind::AssemblyOrModuleAttribute,
            EntryKind::CommandLine => DependencyKind::CommandLine,
        }
    }
}

/// A payload of the provenance graph.
///
/// Member variants are keyed by arena id; [`DependencyNode::TypeSpec`] is keyed structurally so
/// every occurrence of `List<int>` maps to the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum DependencyNode {
    Assembly(AssemblyId),
    Type(TypeId),
    Method(MethodId),
    Field(FieldId),
    Property(PropertyId),
    Event(EventId),
    Attribute(AttributeId),
    InterfaceImpl(InterfaceImplId),
    /// A member reference on a generic instance or a method specification
    MemberRef(MemberRefId),
    /// A composite type signature such as a generic instantiation or an array
    TypeSpec(TypeSig),
    /// The linker itself, source of untracked reasons
    Linker,
}

impl DependencyNode {
    /// Renders the node for trace output.
    #[must_use]
    pub fn describe(&self, universe: &Universe) -> String {
        match self {
            DependencyNode::Assembly(a) => universe.assembly(*a).name.clone(),
            DependencyNode::Type(t) => universe.type_full_name(*t),
            DependencyNode::Method(m) => universe.method_full_name(*m),
            DependencyNode::Field(f) => universe.field_full_name(*f),
            DependencyNode::Property(p) => universe.property_full_name(*p),
            DependencyNode::Event(e) => universe.event_full_name(*e),
            DependencyNode::Attribute(a) => match universe.resolve_method(universe.attribute(*a).constructor) {
                Some(ctor) => format!("[{}]", universe.type_full_name(universe.method_owner(ctor))),
                None => format!("[{a}]"),
            },
            DependencyNode::InterfaceImpl(i) => format!(
                "{} : {}",
                universe.type_full_name(universe.interface_impl_owner(*i)),
                universe.sig_name(&universe.interface_impl(*i).interface)
            ),
            DependencyNode::MemberRef(r) => universe.member_ref_name(*r),
            DependencyNode::TypeSpec(sig) => universe.sig_name(sig),
            DependencyNode::Linker => "<linker>".to_string(),
        }
    }
}

/// The markable subset of [`DependencyNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Member {
    Assembly(AssemblyId),
    Type(TypeId),
    Method(MethodId),
    Field(FieldId),
    Property(PropertyId),
    Event(EventId),
    Attribute(AttributeId),
    InterfaceImpl(InterfaceImplId),
}

impl From<Member> for DependencyNode {
    fn from(member: Member) -> Self {
        match member {
            Member::Assembly(id) => DependencyNode::Assembly(id),
            Member::Type(id) => DependencyNode::Type(id),
            Member::Method(id) => DependencyNode::Method(id),
            Member::Field(id) => DependencyNode::Field(id),
            Member::Property(id) => DependencyNode::Property(id),
            Member::Event(id) => DependencyNode::Event(id),
            Member::Attribute(id) => DependencyNode::Attribute(id),
            Member::InterfaceImpl(id) => DependencyNode::InterfaceImpl(id),
        }
    }
}

macro_rules! member_from_id {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for Member {
                fn from(id: $id) -> Self {
                    Member::$variant(id)
                }
            }

            impl From<$id> for DependencyNode {
                fn from(id: $id) -> Self {
                    DependencyNode::$variant(id)
                }
            }
        )*
    };
}

member_from_id!(
    AssemblyId => Assembly,
    TypeId => Type,
    MethodId => Method,
    FieldId => Field,
    PropertyId => Property,
    EventId => Event,
    AttributeId => Attribute,
    InterfaceImplId => InterfaceImpl,
);

impl From<MemberRefId> for DependencyNode {
    fn from(id: MemberRefId) -> Self {
        DependencyNode::MemberRef(id)
    }
}

/// A `(kind, source)` reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyInfo {
    /// Why
    pub kind: DependencyKind,
    /// From where; `None` only for untracked kinds
    pub source: Option<DependencyNode>,
}

impl DependencyInfo {
    /// Creates a reason with a source.
    #[must_use]
    pub fn new(kind: DependencyKind, source: impl Into<DependencyNode>) -> Self {
        DependencyInfo {
            kind,
            source: Some(source.into()),
        }
    }

    /// Creates a reason attributed to the linker itself.
    #[must_use]
    pub fn untracked() -> Self {
        DependencyInfo {
            kind: DependencyKind::Untracked,
            source: None,
        }
    }
}

/// Why a member is a root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryInfo {
    /// The root rule
    pub kind: EntryKind,
    /// What the rule was attached to, e.g. the root assembly; `None` for command line roots
    pub source: Option<DependencyNode>,
    /// The rooted member
    pub entry: Member,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_kind_has_a_category() {
        let internal: Vec<DependencyKind> = DependencyKind::iter()
            .filter(|k| k.category() == DependencyCategory::Internal)
            .collect();
        assert_eq!(internal.len(), 5);
        assert_eq!(DependencyKind::COUNT, DependencyKind::iter().count());
        assert_eq!(
            DependencyKind::from(EntryKind::CommandLine).category(),
            DependencyCategory::Entry
        );
    }

    #[test]
    fn test_requires_source() {
        assert!(!DependencyKind::Untracked.requires_source());
        assert!(!DependencyKind::Unspecified.requires_source());
        assert!(!DependencyKind::Custom.requires_source());
        assert!(DependencyKind::MarshalledTypeField.requires_source());
        assert!(DependencyKind::DirectCall.requires_source());
        assert!(DependencyInfo::untracked().source.is_none());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DependencyKind::AccessedViaReflection.to_string(), "AccessedViaReflection");
        assert_eq!(
            DependencyNode::from(Member::Method(MethodId::new(1))),
            DependencyNode::Method(MethodId::new(1))
        );
    }
}
