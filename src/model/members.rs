//! Member definitions stored in the [`Universe`](super::Universe) arena.
//!
//! Definitions do not know their owner: ownership is recorded by the universe in parallel
//! tables when a definition is added, so the same builder value can be constructed before the
//! declaring type exists.

use serde::{Deserialize, Serialize};

use crate::model::{
    Accessibility, AttributeId, EventId, FieldAttributes, FieldId, InterfaceImplId,
    MemberRefId, MethodBody, MethodId, MethodModifiers, PropertyId, TypeAttributes, TypeId,
    TypeSig,
};

/// An assembly: the unit that carries a link action.
#[derive(Debug, Clone, Default)]
pub struct AssemblyDef {
    /// Simple assembly name, e.g. `System.Private.CoreLib`
    pub name: String,
    /// Every type defined in the assembly, nested types included, in definition order
    pub types: Vec<TypeId>,
    /// Assembly- and module-level custom attributes
    pub attributes: Vec<AttributeId>,
    /// The managed entry point, for executables
    pub entry_point: Option<MethodId>,
}

/// A generic parameter of a type or method.
#[derive(Debug, Clone, Default)]
pub struct GenericParamDef {
    /// Parameter name, e.g. `T`
    pub name: String,
    /// Constraint types
    pub constraints: Vec<TypeSig>,
}

impl GenericParamDef {
    /// Creates an unconstrained generic parameter.
    #[must_use]
    pub fn new(name: &str) -> Self {
        GenericParamDef {
            name: name.to_string(),
            constraints: Vec::new(),
        }
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Namespace; empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name including any generic arity suffix, e.g. ``List`1``
    pub name: String,
    /// Accessibility of the type
    pub access: Accessibility,
    /// Non-visibility flags
    pub flags: TypeAttributes,
    /// Base type, `None` for `System.Object` and interfaces
    pub base: Option<TypeSig>,
    /// The enclosing type for nested types
    pub declaring_type: Option<TypeId>,
    /// Generic parameters of the type
    pub generic_params: Vec<GenericParamDef>,
    /// Interface implementations declared on this type
    pub interfaces: Vec<InterfaceImplId>,
    /// Methods in definition order
    pub methods: Vec<MethodId>,
    /// Fields in definition order
    pub fields: Vec<FieldId>,
    /// Properties in definition order
    pub properties: Vec<PropertyId>,
    /// Events in definition order
    pub events: Vec<EventId>,
    /// Directly nested types
    pub nested_types: Vec<TypeId>,
    /// Custom attributes applied to the type
    pub attributes: Vec<AttributeId>,
}

impl TypeDef {
    /// Creates a public, non-generic class with no base type.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeDef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            access: Accessibility::Public,
            flags: TypeAttributes::empty(),
            base: None,
            declaring_type: None,
            generic_params: Vec::new(),
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            nested_types: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Sets the base type.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<TypeSig>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Sets the accessibility.
    #[must_use]
    pub fn with_access(mut self, access: Accessibility) -> Self {
        self.access = access;
        self
    }

    /// Adds type flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Declares generic parameters by name.
    #[must_use]
    pub fn with_generic_params(mut self, names: &[&str]) -> Self {
        self.generic_params = names.iter().map(|n| GenericParamDef::new(n)).collect();
        self
    }

    /// Makes this a nested type of `outer`.
    #[must_use]
    pub fn nested_in(mut self, outer: TypeId) -> Self {
        self.declaring_type = Some(outer);
        self.namespace.clear();
        self
    }

    /// Returns `true` if the type is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns `true` if the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeAttributes::ABSTRACT)
    }
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name; `.ctor` and `.cctor` for constructors
    pub name: String,
    /// Accessibility of the method
    pub access: Accessibility,
    /// Modifier flags
    pub modifiers: MethodModifiers,
    /// Return type
    pub return_type: TypeSig,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeSig>,
    /// Generic parameters of the method
    pub generic_params: Vec<GenericParamDef>,
    /// Explicit `.override` targets (MethodImpl rows)
    pub overrides: Vec<MethodHandle>,
    /// IL body, absent for abstract, runtime and P/Invoke methods
    pub body: Option<MethodBody>,
    /// Custom attributes applied to the method
    pub attributes: Vec<AttributeId>,
}

impl MethodDef {
    /// Creates a public instance method returning `void` with no parameters and no body.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodDef {
            name: name.to_string(),
            access: Accessibility::Public,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            return_type: TypeSig::Void,
            params: Vec::new(),
            generic_params: Vec::new(),
            overrides: Vec::new(),
            body: None,
            attributes: Vec::new(),
        }
    }

    /// Creates a public instance constructor.
    #[must_use]
    pub fn constructor() -> Self {
        MethodDef::new(".ctor").with_modifiers(
            MethodModifiers::SPECIAL_NAME | MethodModifiers::RT_SPECIAL_NAME,
        )
    }

    /// Creates a type initializer.
    #[must_use]
    pub fn type_initializer() -> Self {
        MethodDef::new(".cctor")
            .with_access(Accessibility::Private)
            .with_modifiers(
                MethodModifiers::STATIC
                    | MethodModifiers::SPECIAL_NAME
                    | MethodModifiers::RT_SPECIAL_NAME,
            )
    }

    /// Sets the accessibility.
    #[must_use]
    pub fn with_access(mut self, access: Accessibility) -> Self {
        self.access = access;
        self
    }

    /// Adds modifier flags.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Sets the parameter types.
    #[must_use]
    pub fn with_params(mut self, params: Vec<TypeSig>) -> Self {
        self.params = params;
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returning(mut self, return_type: impl Into<TypeSig>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// Declares generic parameters by name.
    #[must_use]
    pub fn with_generic_params(mut self, names: &[&str]) -> Self {
        self.generic_params = names.iter().map(|n| GenericParamDef::new(n)).collect();
        self
    }

    /// Adds an explicit override target.
    #[must_use]
    pub fn overriding(mut self, target: MethodHandle) -> Self {
        self.overrides.push(target);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` for virtual methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns `true` for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` for methods that start a new vtable slot.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.modifiers.contains(MethodModifiers::NEW_SLOT)
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_instance_constructor(&self) -> bool {
        self.name == ".ctor" && !self.is_static()
    }

    /// Returns `true` for the type initializer.
    #[must_use]
    pub fn is_type_initializer(&self) -> bool {
        self.name == ".cctor" && self.is_static()
    }

    /// Returns `true` for P/Invoke declarations.
    #[must_use]
    pub fn is_pinvoke(&self) -> bool {
        self.modifiers.contains(MethodModifiers::PINVOKE_IMPL)
    }
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Accessibility of the field
    pub access: Accessibility,
    /// Field flags
    pub flags: FieldAttributes,
    /// Field type
    pub field_type: TypeSig,
    /// Custom attributes applied to the field
    pub attributes: Vec<AttributeId>,
}

impl FieldDef {
    /// Creates a public instance field.
    #[must_use]
    pub fn new(name: &str, field_type: impl Into<TypeSig>) -> Self {
        FieldDef {
            name: name.to_string(),
            access: Accessibility::Public,
            flags: FieldAttributes::empty(),
            field_type: field_type.into(),
            attributes: Vec::new(),
        }
    }

    /// Sets the accessibility.
    #[must_use]
    pub fn with_access(mut self, access: Accessibility) -> Self {
        self.access = access;
        self
    }

    /// Adds field flags.
    #[must_use]
    pub fn with_flags(mut self, flags: FieldAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

/// A property definition. Accessors are ordinary methods of the declaring type.
#[derive(Debug, Clone, Default)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Getter method
    pub getter: Option<MethodId>,
    /// Setter method
    pub setter: Option<MethodId>,
    /// Custom attributes applied to the property
    pub attributes: Vec<AttributeId>,
}

/// An event definition. Accessors are ordinary methods of the declaring type.
#[derive(Debug, Clone)]
pub struct EventDef {
    /// Event name
    pub name: String,
    /// Delegate type of the event
    pub event_type: TypeSig,
    /// `add_` accessor
    pub add: Option<MethodId>,
    /// `remove_` accessor
    pub remove: Option<MethodId>,
    /// `raise_` accessor, rarely emitted by compilers
    pub raise: Option<MethodId>,
    /// Custom attributes applied to the event
    pub attributes: Vec<AttributeId>,
}

/// A `T : I` declaration.
#[derive(Debug, Clone)]
pub struct InterfaceImplDef {
    /// The interface, possibly a generic instantiation
    pub interface: TypeSig,
    /// Custom attributes applied to the declaration
    pub attributes: Vec<AttributeId>,
}

/// A method operand: either a definition or a reference needing redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodHandle {
    /// A method definition
    Def(MethodId),
    /// A member reference (generic instance, method spec or unresolved)
    Ref(MemberRefId),
}

impl From<MethodId> for MethodHandle {
    fn from(id: MethodId) -> Self {
        MethodHandle::Def(id)
    }
}

/// A field operand: either a definition or a reference needing redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldHandle {
    /// A field definition
    Def(FieldId),
    /// A member reference (generic instance or unresolved)
    Ref(MemberRefId),
}

impl From<FieldId> for FieldHandle {
    fn from(id: FieldId) -> Self {
        FieldHandle::Def(id)
    }
}

/// A reference to a member that is not itself a definition.
///
/// These never get marked; the mark phase records them as provenance nodes and redirects the
/// mark to the uninstantiated definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    /// A method on a generic instantiation, e.g. `List<int>::Add`
    MethodOnGenericInstance {
        /// The instantiated declaring type
        declaring: TypeSig,
        /// The method on the generic definition
        method: MethodId,
    },
    /// A field on a generic instantiation, e.g. `KeyValuePair<string,int>::key`
    FieldOnGenericInstance {
        /// The instantiated declaring type
        declaring: TypeSig,
        /// The field on the generic definition
        field: FieldId,
    },
    /// A generic method instantiation, e.g. `Activator::CreateInstance<Foo>`
    MethodSpec {
        /// The generic method
        method: MethodHandle,
        /// Method generic arguments
        args: Vec<TypeSig>,
    },
    /// A method reference whose target could not be found
    UnresolvedMethod {
        /// Textual name of the reference
        name: String,
    },
    /// A field reference whose target could not be found
    UnresolvedField {
        /// Textual name of the reference
        name: String,
    },
}

/// A custom attribute argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArg {
    /// A boolean
    Bool(bool),
    /// Any integral value
    Int(i64),
    /// A string, `None` for a null literal
    String(Option<String>),
    /// A `System.Type` value
    Type(TypeSig),
    /// A value of an enum type
    Enum(TypeSig, i64),
    /// An array of values
    Array(Vec<AttributeArg>),
}

/// Whether a named attribute argument targets a field or a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedArgTarget {
    /// A public field of the attribute type
    Field,
    /// A settable property of the attribute type
    Property,
}

/// A named custom attribute argument, e.g. `[Foo(Bar = 1)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    /// Field or property
    pub target: NamedArgTarget,
    /// Member name
    pub name: String,
    /// Assigned value
    pub value: AttributeArg,
}

/// A custom attribute instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeDef {
    /// The attribute constructor
    pub constructor: MethodHandle,
    /// Positional constructor arguments
    pub fixed_args: Vec<AttributeArg>,
    /// Named field and property assignments
    pub named_args: Vec<NamedArg>,
}

impl CustomAttributeDef {
    /// Creates an attribute instance with positional arguments only.
    #[must_use]
    pub fn new(constructor: impl Into<MethodHandle>, fixed_args: Vec<AttributeArg>) -> Self {
        CustomAttributeDef {
            constructor: constructor.into(),
            fixed_args,
            named_args: Vec::new(),
        }
    }

    /// Adds a named argument.
    #[must_use]
    pub fn with_named(mut self, target: NamedArgTarget, name: &str, value: AttributeArg) -> Self {
        self.named_args.push(NamedArg {
            target,
            name: name.to_string(),
            value,
        });
        self
    }
}

/// Where a custom attribute is applied. Used when adding attributes to the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeTarget {
    /// Assembly- or module-level attribute
    Assembly(crate::model::AssemblyId),
    /// Attribute on a type
    Type(TypeId),
    /// Attribute on a method
    Method(MethodId),
    /// Attribute on a field
    Field(FieldId),
    /// Attribute on a property
    Property(PropertyId),
    /// Attribute on an event
    Event(EventId),
    /// Attribute on an interface implementation
    InterfaceImpl(InterfaceImplId),
}
