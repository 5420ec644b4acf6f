//! Method processing.

use crate::{
    linker::{
        mark::MarkStep, DependencyInfo, DependencyKind, DependencyNode, Diagnostic,
        DiagnosticCode, Member, MethodAction, Optimizations,
    },
    model::{
        AttributeArg, AttributeId, MemberRef, MethodHandle, MethodId, TypeAttributes, TypeId,
        TypeSig,
    },
    ReferenceKind, Result,
};

const DYNAMIC_DEPENDENCY_ATTRIBUTE: &str =
    "System.Diagnostics.CodeAnalysis.DynamicDependencyAttribute";
const PRESERVE_DEPENDENCY_ATTRIBUTE: &str =
    "System.Runtime.CompilerServices.PreserveDependencyAttribute";

/// `DynamicallyAccessedMemberTypes` bits understood by dependency attributes.
mod member_types {
    pub const PUBLIC_PARAMETERLESS_CONSTRUCTOR: i64 = 0x0001;
    pub const PUBLIC_CONSTRUCTORS: i64 = 0x0002 | PUBLIC_PARAMETERLESS_CONSTRUCTOR;
    pub const NON_PUBLIC_CONSTRUCTORS: i64 = 0x0004;
    pub const PUBLIC_METHODS: i64 = 0x0008;
    pub const NON_PUBLIC_METHODS: i64 = 0x0010;
    pub const PUBLIC_FIELDS: i64 = 0x0020;
    pub const NON_PUBLIC_FIELDS: i64 = 0x0040;
    pub const PUBLIC_PROPERTIES: i64 = 0x0200;
    pub const NON_PUBLIC_PROPERTIES: i64 = 0x0400;
    pub const PUBLIC_EVENTS: i64 = 0x0800;
    pub const NON_PUBLIC_EVENTS: i64 = 0x1000;
}

/// What a dependency attribute asks for on its target type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MemberSelector {
    /// A documentation-style signature: `Name`, `Name(T1,T2)`, `#ctor`, or `*`
    Signature(String),
    /// A `DynamicallyAccessedMemberTypes` mask
    MemberTypes(i64),
}

/// Where a dependency attribute's target type comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeSelector {
    /// The type declaring the attributed method
    Declaring,
    /// A `typeof` argument
    Type(TypeSig),
    /// A type name, optionally qualified by an assembly name
    Named {
        type_name: String,
        assembly: Option<String>,
    },
}

impl MarkStep<'_> {
    /// Marks the method behind a handle, redirecting references through their provenance node.
    pub(crate) fn mark_method_handle(&mut self, handle: MethodHandle, reason: DependencyInfo) -> Result<()> {
        let member_ref = match handle {
            MethodHandle::Def(method) => return self.mark_method(method, reason),
            MethodHandle::Ref(member_ref) => member_ref,
        };
        let universe = self.universe;
        let node = DependencyNode::MemberRef(member_ref);
        match universe.member_ref(member_ref) {
            MemberRef::MethodOnGenericInstance { declaring, method } => {
                self.record_reference(&reason, node.clone())?;
                self.mark_generic_arguments(declaring.generic_args(), &node)?;
                self.mark_method(
                    *method,
                    DependencyInfo {
                        kind: DependencyKind::MethodOnGenericInstance,
                        source: Some(node),
                    },
                )
            }
            MemberRef::MethodSpec { method, args } => {
                self.record_reference(&reason, node.clone())?;
                self.mark_generic_arguments(args, &node)?;
                self.mark_method_handle(
                    *method,
                    DependencyInfo {
                        kind: DependencyKind::ElementMethod,
                        source: Some(node),
                    },
                )
            }
            MemberRef::UnresolvedMethod { name } => {
                self.unresolved(ReferenceKind::Method, name, reason.source.as_ref())
            }
            other => Err(internal_error!("{:?} used as a method operand", other)),
        }
    }

    fn mark_generic_arguments(&mut self, args: &[TypeSig], node: &DependencyNode) -> Result<()> {
        for arg in args {
            self.mark_type_sig(
                arg,
                DependencyInfo {
                    kind: DependencyKind::GenericArgumentType,
                    source: Some(node.clone()),
                },
            )?;
        }
        Ok(())
    }

    pub(super) fn process_method(&mut self, method: MethodId, reason: &DependencyInfo) -> Result<()> {
        if !self.annotations.set_processed(method)? {
            return Ok(());
        }
        let universe = self.universe;
        let def = universe.method(method);
        let owner = universe.method_owner(method);
        tracing::trace!(method = %universe.method_full_name(method), kind = %reason.kind, "processing method");

        self.mark_type(owner, DependencyInfo::new(DependencyKind::DeclaringType, method))?;
        self.mark_custom_attributes(&def.attributes, DependencyNode::Method(method))?;
        for param in &def.generic_params {
            for constraint in &param.constraints {
                self.mark_type_sig(
                    constraint,
                    DependencyInfo::new(DependencyKind::GenericParameterConstraintType, method),
                )?;
            }
        }

        if def.is_instance_constructor() {
            self.mark_requirements_for_instantiated_type(owner, method)?;
        } else if def.is_static()
            && !def.is_type_initializer()
            && !universe.type_def(owner).flags.contains(TypeAttributes::BEFORE_FIELD_INIT)
        {
            if let Some(cctor) = universe.type_initializer(owner) {
                self.mark_method(
                    cctor,
                    DependencyInfo::new(DependencyKind::TriggersCctorForCalledMethod, method),
                )?;
            }
        }

        self.mark_accessor_owners(owner, method)?;

        self.mark_type_sig(&def.return_type, DependencyInfo::new(DependencyKind::ReturnType, method))?;
        for param in &def.params {
            self.mark_type_sig(param, DependencyInfo::new(DependencyKind::ParameterType, method))?;
        }
        if def.is_pinvoke() {
            self.mark_interop_requirements(method)?;
        }

        self.mark_base_methods(method)?;
        for &target in &def.overrides {
            self.mark_method_handle(target, DependencyInfo::new(DependencyKind::MethodImplOverride, method))?;
            self.mark_explicit_interface_implementation(owner, target)?;
        }

        self.mark_dependency_attributes(method)?;

        if def.body.is_some() {
            if self.should_defer_body(method, owner) {
                tracing::trace!(method = %universe.method_full_name(method), "deferring unreachable body");
                self.unreachable_bodies.push((method, reason.clone()));
            } else {
                self.mark_method_body(method)?;
            }
        }

        if def.is_virtual() && self.virtual_seen.insert(method) {
            self.virtual_methods.push(method);
        }
        Ok(())
    }

    fn mark_accessor_owners(&mut self, owner: TypeId, method: MethodId) -> Result<()> {
        let universe = self.universe;
        let def = universe.type_def(owner);
        for &property in &def.properties {
            let p = universe.property(property);
            if p.getter == Some(method) || p.setter == Some(method) {
                self.mark_member(
                    Member::Property(property),
                    DependencyInfo::new(DependencyKind::PropertyOfPropertyMethod, method),
                )?;
            }
        }
        for &event in &def.events {
            let e = universe.event(event);
            if [e.add, e.remove, e.raise].contains(&Some(method)) {
                self.mark_member(
                    Member::Event(event),
                    DependencyInfo::new(DependencyKind::EventOfEventMethod, method),
                )?;
            }
        }
        Ok(())
    }

    /// The marshaller constructs returned classes and reads every field of by-value structs.
    fn mark_interop_requirements(&mut self, method: MethodId) -> Result<()> {
        let universe = self.universe;
        let def = universe.method(method);
        for sig in std::iter::once(&def.return_type).chain(&def.params) {
            let Some(ty) = sig.definition() else {
                continue;
            };
            if let Some(ctor) = universe.default_constructor(ty) {
                self.mark_method(ctor, DependencyInfo::new(DependencyKind::InteropMethodDependency, method))?;
            }
            let is_value_type = self
                .well_known
                .value_type
                .is_some_and(|vt| universe.derives_from(ty, vt));
            if is_value_type {
                for &field in &universe.type_def(ty).fields {
                    self.mark_member(
                        Member::Field(field),
                        DependencyInfo::new(DependencyKind::MarshalledTypeField, method),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Marks the virtual methods `method` overrides. Interface methods are left to the
    /// interface machinery unless `method` itself is declared on an interface.
    fn mark_base_methods(&mut self, method: MethodId) -> Result<()> {
        let universe = self.universe;
        let on_interface = universe.type_def(universe.method_owner(method)).is_interface();
        let bases = self.annotations.get_base_methods(method).to_vec();
        for info in bases {
            if info.is_interface_override() && !on_interface {
                continue;
            }
            self.mark_method(info.base, DependencyInfo::new(DependencyKind::BaseMethod, method))?;
        }
        Ok(())
    }

    fn mark_explicit_interface_implementation(&mut self, owner: TypeId, target: MethodHandle) -> Result<()> {
        let universe = self.universe;
        let Some(base) = universe.resolve_method(target) else {
            return Ok(());
        };
        let interface = universe.method_owner(base);
        if !universe.type_def(interface).is_interface() {
            return Ok(());
        }
        if let Some(interface_impl) = crate::linker::typemap::find_interface_impl(universe, owner, interface) {
            if universe.interface_impl_owner(interface_impl) == owner {
                self.mark_member(
                    Member::InterfaceImpl(interface_impl),
                    DependencyInfo::new(DependencyKind::InterfaceImplementationOnType, owner),
                )?;
            }
        }
        Ok(())
    }

    /// Instance bodies on types nobody constructs can become throwing stubs, if nothing later
    /// constructs the type.
    fn should_defer_body(&self, method: MethodId, owner: TypeId) -> bool {
        let universe = self.universe;
        let def = universe.method(method);
        if def.is_static() || def.is_instance_constructor() || universe.type_def(owner).is_interface() {
            return false;
        }
        if self.annotations.get_method_action(method) == MethodAction::ForceParse {
            return false;
        }
        if self.annotations.is_instantiated(owner)
            || !self.is_optimization_enabled(Optimizations::UNREACHABLE_BODIES, owner)
        {
            return false;
        }
        def.body
            .as_ref()
            .is_some_and(crate::model::MethodBody::is_worth_converting_to_throw)
    }

    /// Scans deferred bodies whose declaring type has since been instantiated.
    pub(super) fn process_pending_bodies(&mut self) -> Result<bool> {
        if self.unreachable_bodies.is_empty() {
            return Ok(false);
        }
        let universe = self.universe;
        let pending = std::mem::take(&mut self.unreachable_bodies);
        let mut progressed = false;
        for (method, reason) in pending {
            let owner = universe.method_owner(method);
            if self.annotations.is_instantiated(owner)
                || self.annotations.get_method_action(method) == MethodAction::ForceParse
            {
                self.mark_method_body(method)?;
                progressed = true;
            } else {
                self.unreachable_bodies.push((method, reason));
            }
        }
        Ok(progressed)
    }

    // ---------------------------------------------------------------------------------------
    // Dependency attributes
    // ---------------------------------------------------------------------------------------

    fn mark_dependency_attributes(&mut self, method: MethodId) -> Result<()> {
        let universe = self.universe;
        for &attribute in &universe.method(method).attributes {
            let Some(ctor) = universe.resolve_method(universe.attribute(attribute).constructor) else {
                continue;
            };
            let attribute_type = universe.type_full_name(universe.method_owner(ctor));
            if attribute_type == DYNAMIC_DEPENDENCY_ATTRIBUTE {
                self.process_dependency_attribute(method, attribute, DependencyKind::DynamicDependency)?;
            } else if attribute_type == PRESERVE_DEPENDENCY_ATTRIBUTE {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::DeprecatedPreserveDependency,
                        "PreserveDependencyAttribute is deprecated, use DynamicDependencyAttribute",
                    )
                    .with_origin(universe.method_full_name(method)),
                );
                self.process_dependency_attribute(method, attribute, DependencyKind::PreserveDependency)?;
            }
        }
        Ok(())
    }

    fn process_dependency_attribute(
        &mut self,
        method: MethodId,
        attribute: AttributeId,
        kind: DependencyKind,
    ) -> Result<()> {
        let universe = self.universe;
        let origin = universe.method_full_name(method);
        let args = &universe.attribute(attribute).fixed_args;
        let Some((members, target)) = parse_dependency_arguments(args) else {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::InvalidDynamicDependencyArguments,
                    format!("invalid arguments to {kind} attribute"),
                )
                .with_origin(origin),
            );
            return Ok(());
        };

        let ty = match target {
            TypeSelector::Declaring => universe.method_owner(method),
            TypeSelector::Type(sig) => match sig.definition() {
                Some(ty) => ty,
                None => {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::UnresolvedDependencyType,
                            format!("type {} could not be resolved", universe.sig_name(&sig)),
                        )
                        .with_origin(origin),
                    );
                    return Ok(());
                }
            },
            TypeSelector::Named { type_name, assembly } => {
                let found = match assembly {
                    Some(assembly_name) => {
                        let Some(assembly) = universe.find_assembly(&assembly_name) else {
                            self.diagnostics.push(
                                Diagnostic::new(
                                    DiagnosticCode::UnresolvedDependencyAssembly,
                                    format!("assembly {assembly_name} could not be resolved"),
                                )
                                .with_origin(origin),
                            );
                            return Ok(());
                        };
                        universe.find_type_in(assembly, &type_name)
                    }
                    None => universe.find_type(&type_name),
                };
                let Some(ty) = found else {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::UnresolvedDependencyType,
                            format!("type {type_name} could not be resolved"),
                        )
                        .with_origin(origin),
                    );
                    return Ok(());
                };
                ty
            }
        };

        let reason = DependencyInfo::new(kind, method);
        self.mark_type(ty, reason.clone())?;
        let selected = select_members(universe, ty, &members);
        if selected.is_empty() {
            if let MemberSelector::Signature(signature) = &members {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UnresolvedDependencyMember,
                        format!("no member {signature} on {}", universe.type_full_name(ty)),
                    )
                    .with_origin(origin),
                );
            }
            return Ok(());
        }
        for member in selected {
            match member {
                Member::Property(property) => self.mark_property_with_accessors(property, reason.clone())?,
                Member::Event(event) => self.mark_event_with_accessors(event, reason.clone())?,
                other => self.mark_member(other, reason.clone())?,
            }
        }
        Ok(())
    }
}

/// Interprets the positional arguments of a dependency attribute.
fn parse_dependency_arguments(args: &[AttributeArg]) -> Option<(MemberSelector, TypeSelector)> {
    let members = match args.first()? {
        AttributeArg::String(Some(signature)) => MemberSelector::Signature(signature.clone()),
        AttributeArg::Enum(_, mask) | AttributeArg::Int(mask) => MemberSelector::MemberTypes(*mask),
        _ => return None,
    };
    let target = match &args[1..] {
        [] if matches!(members, MemberSelector::Signature(_)) => TypeSelector::Declaring,
        [AttributeArg::Type(sig)] => TypeSelector::Type(sig.clone()),
        [AttributeArg::String(Some(type_name))] => TypeSelector::Named {
            type_name: type_name.clone(),
            assembly: None,
        },
        [AttributeArg::String(Some(type_name)), AttributeArg::String(Some(assembly))] => {
            TypeSelector::Named {
                type_name: type_name.clone(),
                assembly: Some(assembly.clone()),
            }
        }
        _ => return None,
    };
    Some((members, target))
}

/// Members of `ty` matching a selector, in declaration order.
fn select_members(universe: &crate::model::Universe, ty: TypeId, selector: &MemberSelector) -> Vec<Member> {
    let def = universe.type_def(ty);
    match selector {
        MemberSelector::Signature(signature) if signature.trim() == "*" => def
            .methods
            .iter()
            .map(|&m| Member::Method(m))
            .chain(def.fields.iter().map(|&f| Member::Field(f)))
            .chain(def.properties.iter().map(|&p| Member::Property(p)))
            .chain(def.events.iter().map(|&e| Member::Event(e)))
            .collect(),
        MemberSelector::Signature(signature) => {
            let (name, params) = split_signature(signature);
            let name = match name {
                "#ctor" => ".ctor",
                "#cctor" => ".cctor",
                other => other,
            };
            let methods = def.methods.iter().copied().filter(|&m| {
                let method = universe.method(m);
                method.name == name
                    && params.as_ref().map_or(true, |params| {
                        params.len() == method.params.len()
                            && params
                                .iter()
                                .zip(&method.params)
                                .all(|(expected, actual)| *expected == universe.sig_name(actual))
                    })
            });
            let mut selected: Vec<Member> = methods.map(Member::Method).collect();
            if params.is_none() {
                selected.extend(
                    def.fields
                        .iter()
                        .filter(|&&f| universe.field(f).name == name)
                        .map(|&f| Member::Field(f)),
                );
                selected.extend(
                    def.properties
                        .iter()
                        .filter(|&&p| universe.property(p).name == name)
                        .map(|&p| Member::Property(p)),
                );
                selected.extend(
                    def.events
                        .iter()
                        .filter(|&&e| universe.event(e).name == name)
                        .map(|&e| Member::Event(e)),
                );
            }
            selected
        }
        MemberSelector::MemberTypes(mask) => {
            use member_types::*;
            let mask = *mask;
            let wants = |public: bool, public_bit: i64, non_public_bit: i64| {
                let bit = if public { public_bit } else { non_public_bit };
                mask == -1 || mask & bit != 0
            };
            let mut selected = Vec::new();
            for &m in &def.methods {
                let method = universe.method(m);
                let public = method.access.is_public();
                let wanted = if method.is_instance_constructor() {
                    (public && method.params.is_empty() && mask & PUBLIC_PARAMETERLESS_CONSTRUCTOR != 0)
                        || wants(public, PUBLIC_CONSTRUCTORS, NON_PUBLIC_CONSTRUCTORS)
                } else if method.is_type_initializer() {
                    false
                } else {
                    wants(public, PUBLIC_METHODS, NON_PUBLIC_METHODS)
                };
                if wanted {
                    selected.push(Member::Method(m));
                }
            }
            for &f in &def.fields {
                if wants(universe.field(f).access.is_public(), PUBLIC_FIELDS, NON_PUBLIC_FIELDS) {
                    selected.push(Member::Field(f));
                }
            }
            for &p in &def.properties {
                let property = universe.property(p);
                let public = property
                    .getter
                    .into_iter()
                    .chain(property.setter)
                    .any(|m| universe.method(m).access.is_public());
                if wants(public, PUBLIC_PROPERTIES, NON_PUBLIC_PROPERTIES) {
                    selected.push(Member::Property(p));
                }
            }
            for &e in &def.events {
                let event = universe.event(e);
                let public = event
                    .add
                    .into_iter()
                    .chain(event.remove)
                    .any(|m| universe.method(m).access.is_public());
                if wants(public, PUBLIC_EVENTS, NON_PUBLIC_EVENTS) {
                    selected.push(Member::Event(e));
                }
            }
            selected
        }
    }
}

/// Splits `Name(T1, T2)` into the name and its parameter type names.
fn split_signature(signature: &str) -> (&str, Option<Vec<String>>) {
    let signature = signature.trim();
    let Some(open) = signature.find('(') else {
        return (signature, None);
    };
    let name = signature[..open].trim();
    let inner = signature[open + 1..].trim_end_matches(')').trim();
    let params = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|p| p.trim().to_string()).collect()
    };
    (name, Some(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_signature() {
        assert_eq!(split_signature("Run"), ("Run", None));
        assert_eq!(split_signature("Run()"), ("Run", Some(Vec::new())));
        assert_eq!(
            split_signature(" Run(System.String, System.Int32) "),
            (
                "Run",
                Some(vec!["System.String".to_string(), "System.Int32".to_string()])
            )
        );
    }

    #[test]
    fn test_parse_dependency_arguments() {
        let member = AttributeArg::String(Some("Run".to_string()));
        assert_eq!(
            parse_dependency_arguments(&[member.clone()]),
            Some((MemberSelector::Signature("Run".to_string()), TypeSelector::Declaring))
        );
        assert_eq!(
            parse_dependency_arguments(&[
                member.clone(),
                AttributeArg::String(Some("App.Foo".to_string())),
                AttributeArg::String(Some("App".to_string())),
            ]),
            Some((
                MemberSelector::Signature("Run".to_string()),
                TypeSelector::Named {
                    type_name: "App.Foo".to_string(),
                    assembly: Some("App".to_string()),
                }
            ))
        );
        assert_eq!(parse_dependency_arguments(&[]), None);
        assert_eq!(parse_dependency_arguments(&[AttributeArg::Bool(true)]), None);
        assert_eq!(
            parse_dependency_arguments(&[AttributeArg::Int(member_types::PUBLIC_METHODS)]),
            None
        );
        assert_eq!(
            parse_dependency_arguments(&[member, AttributeArg::Int(1), AttributeArg::Int(2)]),
            None
        );
    }
}
