//! The mark step: a worklist fixpoint over the member model.
//!
//! [`MarkStep`] starts from the roots of a [`LinkContext`] and marks everything they
//! transitively depend on. Methods are expanded from a FIFO queue; types, fields, properties,
//! events, attributes and interface implementations are expanded as soon as they are first
//! marked. Work whose outcome depends on state that is not yet known is kept in explicit
//! deferred lists and revisited by the scheduler:
//!
//! - **virtual methods** - overrides become needed once their declaring type is marked and,
//!   with override removal, instantiated
//! - **types with interfaces** - interface implementations become needed once the type is
//!   instantiated and the interface is used
//! - **unreachable bodies** - bodies of instance methods on types that are never constructed
//! - **lazy attributes** - assembly-level attributes of used linked assemblies, kept once their
//!   attribute type's assembly is used
//! - **late attributes** - attributes kept only if their type is used elsewhere
//!
//! # Scheduling
//!
//! The scheduler runs three named phases in order, restarting from the primary phase whenever
//! one of them makes progress, and stops when none does:
//!
//! 1. [`Phase::Primary`]: drain the method queue, process virtual methods, types with
//!    interfaces, pending bodies and hooks, repeated until the queue is empty and the
//!    annotation generation is unchanged
//! 2. [`Phase::LazyAttributes`]
//! 3. [`Phase::LateAttributes`]
//!
//! After the fixpoint, bodies that stayed unreachable are converted to throwing stubs.
//!
//! # Extension
//!
//! Additional processing can be injected with [`MarkStepHook`]s, which run at the end of every
//! primary iteration.

mod attributes;
mod body;
mod methods;
mod roots;
mod types;
mod virtuals;

use std::collections::{HashSet, VecDeque};

use crate::{
    linker::{
        reflection::ReflectionCatalog, AnnotationStore, DependencyInfo, DependencyKind,
        DependencyNode, Diagnostic, DiagnosticCode, Diagnostics, EntryInfo, EntryKind,
        LinkContext, LinkerConfig, Member, MethodAction, TypeMap,
    },
    model::{AttributeId, MethodId, TypeId, Universe},
    Error, ReferenceKind, Result,
};

pub use attributes::AttributeReadiness;

/// Extra processing run at the end of every primary iteration.
pub trait MarkStepHook {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the hook. Returns `true` if it marked anything.
    ///
    /// # Errors
    ///
    /// Errors abort the mark step.
    fn process(&mut self, step: &mut MarkStep<'_>) -> Result<bool>;
}

/// The scheduler phases, in the order they are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    /// The method queue and the lists derived from it
    Primary,
    /// Assembly-level attributes
    LazyAttributes,
    /// Attributes kept only for used attribute types
    LateAttributes,
}

impl Phase {
    const ORDER: [Phase; 3] = [Phase::Primary, Phase::LazyAttributes, Phase::LateAttributes];
}

/// An attribute whose marking has been deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingAttribute {
    pub(crate) attribute: AttributeId,
    pub(crate) provider: DependencyNode,
}

#[derive(Debug, Clone, Copy, Default)]
struct WellKnownTypes {
    value_type: Option<TypeId>,
    enum_type: Option<TypeId>,
    delegate: Option<TypeId>,
    multicast_delegate: Option<TypeId>,
    not_supported_exception: Option<TypeId>,
}

impl WellKnownTypes {
    fn find(universe: &Universe) -> Self {
        WellKnownTypes {
            value_type: universe.find_type("System.ValueType"),
            enum_type: universe.find_type("System.Enum"),
            delegate: universe.find_type("System.Delegate"),
            multicast_delegate: universe.find_type("System.MulticastDelegate"),
            not_supported_exception: universe.find_type("System.NotSupportedException"),
        }
    }
}

/// The mark step over one [`LinkContext`].
pub struct MarkStep<'a> {
    universe: &'a Universe,
    config: &'a LinkerConfig,
    annotations: &'a mut AnnotationStore,
    type_map: &'a TypeMap,
    diagnostics: &'a Diagnostics,
    roots: &'a [(Member, EntryKind)],
    well_known: WellKnownTypes,
    method_queue: VecDeque<(MethodId, DependencyInfo)>,
    virtual_methods: Vec<MethodId>,
    virtual_seen: HashSet<MethodId>,
    types_with_interfaces: Vec<TypeId>,
    unreachable_bodies: Vec<(MethodId, DependencyInfo)>,
    lazy_attributes: Vec<PendingAttribute>,
    late_attributes: Vec<PendingAttribute>,
    hooks: Vec<Box<dyn MarkStepHook + 'a>>,
    reflection: ReflectionCatalog,
}

impl<'a> MarkStep<'a> {
    /// Borrows the state of `context` for one run.
    pub fn new(context: &'a mut LinkContext) -> Self {
        let (universe, config, annotations, type_map, diagnostics, roots) = context.split();
        MarkStep {
            universe,
            config,
            annotations,
            type_map,
            diagnostics,
            roots,
            well_known: WellKnownTypes::find(universe),
            method_queue: VecDeque::new(),
            virtual_methods: Vec::new(),
            virtual_seen: HashSet::new(),
            types_with_interfaces: Vec::new(),
            unreachable_bodies: Vec::new(),
            lazy_attributes: Vec::new(),
            late_attributes: Vec::new(),
            hooks: Vec::new(),
            reflection: ReflectionCatalog::new(),
        }
    }

    /// Adds hooks run at the end of every primary iteration.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Vec<Box<dyn MarkStepHook + 'a>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Runs the mark step to its fixpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResolutionFailed`] for unresolved references unless the configuration
    /// ignores them, [`Error::MissingAssemblyAction`] for assemblies without an action, and
    /// internal errors on invariant violations.
    pub fn run(mut self) -> Result<()> {
        self.initialize()?;
        loop {
            self.schedule()?;
            if !self.complete()? {
                break;
            }
        }
        tracing::debug!(
            methods = self.annotations.marked_methods().count(),
            types = self.annotations.marked_types().count(),
            edges = self.annotations.recorder().graph().edge_count(),
            "mark step finished"
        );
        Ok(())
    }

    fn schedule(&mut self) -> Result<()> {
        'phases: loop {
            for phase in Phase::ORDER {
                let progressed = match phase {
                    Phase::Primary => self.process_primary_queue()?,
                    Phase::LazyAttributes => self.process_lazy_attributes()?,
                    Phase::LateAttributes => self.process_late_attributes()?,
                };
                tracing::debug!(%phase, progressed, "phase finished");
                if progressed {
                    continue 'phases;
                }
            }
            return Ok(());
        }
    }

    fn process_primary_queue(&mut self) -> Result<bool> {
        let mut progressed = false;
        loop {
            let generation = self.annotations.generation();
            let drained = self.drain_method_queue()?;
            self.process_virtual_methods()?;
            self.process_types_with_interfaces()?;
            self.process_pending_bodies()?;
            self.run_hooks()?;

            let stable = self.method_queue.is_empty() && self.annotations.generation() == generation;
            progressed |= drained > 0 || !stable;
            if stable {
                return Ok(progressed);
            }
        }
    }

    fn drain_method_queue(&mut self) -> Result<usize> {
        let mut drained = 0;
        while let Some((method, reason)) = self.method_queue.pop_front() {
            self.process_method(method, &reason)?;
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(drained, "drained method queue");
        }
        Ok(drained)
    }

    fn run_hooks(&mut self) -> Result<bool> {
        if self.hooks.is_empty() {
            return Ok(false);
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        let mut progressed = false;
        let mut result = Ok(());
        for hook in &mut hooks {
            match hook.process(self) {
                Ok(p) => {
                    if p {
                        tracing::debug!(hook = hook.name(), "hook made progress");
                    }
                    progressed |= p;
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        hooks.append(&mut self.hooks);
        self.hooks = hooks;
        result.map(|()| progressed)
    }

    /// Converts bodies that stayed unreachable. Returns `true` if another round of scheduling
    /// is needed first.
    ///
    /// The throwing stubs need the `NotSupportedException` constructor. It is marked before
    /// anything is converted, since its own dependencies may instantiate a type whose bodies
    /// are still pending.
    fn complete(&mut self) -> Result<bool> {
        let Some(&(first, _)) = self.unreachable_bodies.first() else {
            return Ok(false);
        };
        let ctor = self
            .well_known
            .not_supported_exception
            .and_then(|ty| self.universe.default_constructor(ty));
        if let Some(ctor) = ctor {
            if !self.annotations.is_marked(ctor) {
                self.mark_method(
                    ctor,
                    DependencyInfo::new(DependencyKind::UnreachableBodyRequirement, first),
                )?;
                return Ok(true);
            }
        }

        let pending = std::mem::take(&mut self.unreachable_bodies);
        let generation = self.annotations.generation();
        tracing::debug!(count = pending.len(), "converting unreachable bodies to throw");
        for (method, _) in pending {
            self.annotations
                .set_method_action(method, MethodAction::ConvertToThrow);
            if let Some(ctor) = ctor {
                self.mark_method(
                    ctor,
                    DependencyInfo::new(DependencyKind::UnreachableBodyRequirement, method),
                )?;
            }
        }
        if self.annotations.generation() != generation || !self.method_queue.is_empty() {
            return Err(internal_error!("converting unreachable bodies marked new members"));
        }
        Ok(false)
    }

    // ---------------------------------------------------------------------------------------
    // Marking primitives
    // ---------------------------------------------------------------------------------------

    /// Marks a member and expands it if it was not marked before.
    ///
    /// Methods are queued; every other member kind is expanded immediately.
    ///
    /// # Errors
    ///
    /// Propagates errors from the annotation store and from expansion.
    pub fn mark_member(&mut self, member: Member, reason: DependencyInfo) -> Result<()> {
        let newly = match member {
            Member::Assembly(id) => self.annotations.mark_assembly(id, &reason)?,
            Member::Type(id) => self.annotations.mark_type(id, &reason)?,
            Member::Method(id) => self.annotations.mark_method(id, &reason)?,
            Member::Field(id) => self.annotations.mark_field(id, &reason)?,
            Member::Property(id) => self.annotations.mark_property(id, &reason)?,
            Member::Event(id) => self.annotations.mark_event(id, &reason)?,
            Member::Attribute(id) => self.annotations.mark_attribute(id, &reason)?,
            Member::InterfaceImpl(id) => self.annotations.mark_interface_impl(id, &reason)?,
        };
        self.after_mark(member, newly, reason)
    }

    /// Marks a root.
    ///
    /// # Errors
    ///
    /// Propagates errors from the annotation store and from expansion.
    pub fn mark_entry(&mut self, info: EntryInfo) -> Result<()> {
        let member = info.entry;
        let reason = DependencyInfo {
            kind: info.kind.into(),
            source: info.source.clone(),
        };
        let newly = self.annotations.mark_entry(info)?;
        self.after_mark(member, newly, reason)
    }

    fn after_mark(&mut self, member: Member, newly: bool, reason: DependencyInfo) -> Result<()> {
        match member {
            Member::Method(id) => {
                if newly && !self.annotations.is_processed(id) {
                    self.method_queue.push_back((id, reason));
                }
            }
            Member::Assembly(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_assembly(id)?;
                }
            }
            Member::Type(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_type(id)?;
                }
            }
            Member::Field(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_field(id)?;
                }
            }
            Member::Property(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_property(id)?;
                }
            }
            Member::Event(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_event(id)?;
                }
            }
            Member::Attribute(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_attribute(id)?;
                }
            }
            Member::InterfaceImpl(id) => {
                if self.annotations.set_processed(id)? {
                    self.process_interface_impl(id)?;
                }
            }
        }
        Ok(())
    }

    /// Marks a method definition.
    ///
    /// # Errors
    ///
    /// Propagates errors from the annotation store.
    pub fn mark_method(&mut self, method: MethodId, reason: DependencyInfo) -> Result<()> {
        self.mark_member(Member::Method(method), reason)
    }

    /// Marks a type definition.
    ///
    /// # Errors
    ///
    /// Propagates errors from the annotation store and from expansion.
    pub fn mark_type(&mut self, ty: TypeId, reason: DependencyInfo) -> Result<()> {
        self.mark_member(Member::Type(ty), reason)
    }

    /// Records an edge to a node that is never marked itself, such as a member reference.
    fn record_reference(&mut self, reason: &DependencyInfo, node: DependencyNode) -> Result<()> {
        let source = match &reason.source {
            Some(source) => source.clone(),
            None if reason.kind.requires_source() => {
                return Err(internal_error!(
                    "{} reference to {:?} arrived without a source",
                    reason.kind,
                    node
                ));
            }
            None => DependencyNode::Linker,
        };
        self.annotations
            .record_dependency(source, node, reason.kind)?;
        Ok(())
    }

    /// Applies the configured policy to an unresolved reference.
    fn unresolved(&mut self, kind: ReferenceKind, name: &str, origin: Option<&DependencyNode>) -> Result<()> {
        if !self.config.ignore_unresolved {
            return Err(Error::ResolutionFailed {
                kind,
                name: name.to_string(),
            });
        }
        let code = match kind {
            ReferenceKind::Method => DiagnosticCode::UnresolvedMethod,
            ReferenceKind::Field => DiagnosticCode::UnresolvedField,
            ReferenceKind::Type | ReferenceKind::Assembly => DiagnosticCode::UnresolvedType,
        };
        let mut diagnostic =
            Diagnostic::new(code, format!("unresolved {kind} reference {name}"));
        if let Some(origin) = origin {
            diagnostic = diagnostic.with_origin(origin.describe(self.universe));
        }
        self.diagnostics.push(diagnostic);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Accessors for hooks
    // ---------------------------------------------------------------------------------------

    /// The member model.
    #[must_use]
    pub fn universe(&self) -> &'a Universe {
        self.universe
    }

    /// The annotation store.
    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        self.annotations
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &'a LinkerConfig {
        self.config
    }

    /// Number of methods waiting in the queue.
    #[must_use]
    pub fn queued_methods(&self) -> usize {
        self.method_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        linker::{LinkerConfig, MethodAction},
        model::{FieldAttributes, FieldDef, MethodDef, OpCode, Operand},
        test::{filler, TestApp},
    };

    #[test]
    fn test_entry_point_reaches_callees_only() {
        let mut app = TestApp::new();
        let program = app.program;
        let helper = app.static_method(program, "Helper", vec![]);
        let unused = app.static_method(program, "Unused", vec![]);
        let main = app.main(vec![(OpCode::Call, Operand::Method(helper.into()))]);
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_marked(main));
        assert!(annotations.is_marked(helper));
        assert!(annotations.is_marked(program));
        assert!(!annotations.is_marked(unused));
        assert!(annotations.is_processed(helper));
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let mut app = TestApp::new();
        let program = app.program;
        let a = app.static_method(program, "A", vec![]);
        let b = app.static_method(program, "B", vec![(OpCode::Call, Operand::Method(a.into()))]);
        if let Some(def) = app.universe.method_mut(a) {
            def.body = Some(crate::test::body(vec![
                (OpCode::Call, Operand::Method(b.into())),
                (OpCode::Ret, Operand::None),
            ]));
        }
        let main = app.main(vec![(OpCode::Call, Operand::Method(a.into()))]);
        let context = app.link();

        assert!(context.annotations().is_marked(b));
        let paths = context.paths_to(b, false);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].first().map(|e| e.from.clone()), Some(DependencyNode::Method(main)));
    }

    #[test]
    fn test_unreachable_instance_body_becomes_throw() {
        let mut app = TestApp::new();
        let widget = app.class("Widget");
        let draw = app.method(widget, MethodDef::new("Draw").with_body(filler()));
        app.main(vec![
            (OpCode::Ldnull, Operand::None),
            (OpCode::Call, Operand::Method(draw.into())),
        ]);
        let not_supported = app.core.not_supported_exception_ctor;
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_marked(draw));
        assert_eq!(annotations.get_method_action(draw), MethodAction::ConvertToThrow);
        assert!(annotations.is_marked(not_supported));
    }

    #[test]
    fn test_body_reached_through_stub_constructor_is_kept() {
        let mut app = TestApp::new();
        let widget = app.class("Widget");
        let ctor = app.ctor(widget);
        let draw = app.method(widget, MethodDef::new("Draw").with_body(filler()));
        app.main(vec![
            (OpCode::Ldnull, Operand::None),
            (OpCode::Call, Operand::Method(draw.into())),
        ]);
        let not_supported = app.core.not_supported_exception_ctor;
        if let Some(def) = app.universe.method_mut(not_supported) {
            def.body = Some(crate::test::body(vec![
                (OpCode::Newobj, Operand::Method(ctor.into())),
                (OpCode::Pop, Operand::None),
                (OpCode::Ret, Operand::None),
            ]));
        }
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_marked(not_supported));
        assert!(annotations.is_instantiated(widget));
        assert_eq!(annotations.get_method_action(draw), MethodAction::Parse);
    }

    #[test]
    fn test_instantiated_type_keeps_its_bodies() {
        let mut app = TestApp::new();
        let widget = app.class("Widget");
        let ctor = app.ctor(widget);
        let draw = app.method(widget, MethodDef::new("Draw").with_body(filler()));
        app.main(vec![
            (OpCode::Newobj, Operand::Method(ctor.into())),
            (OpCode::Call, Operand::Method(draw.into())),
        ]);
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_instantiated(widget));
        assert_eq!(annotations.get_method_action(draw), MethodAction::Parse);
    }

    #[test]
    fn test_override_on_constructed_type_is_kept() {
        let mut app = TestApp::new();
        let shape = app.class("Shape");
        let base_draw = app.virtual_method(shape, "Draw");
        let circle = app.class_with_base("Circle", shape);
        let ctor = app.ctor(circle);
        let circle_draw = app.virtual_method(circle, "Draw");
        let unused = app.interface("IUnused");
        app.universe.add_interface_impl(circle, unused).unwrap();
        app.main(vec![
            (OpCode::Newobj, Operand::Method(ctor.into())),
            (OpCode::Callvirt, Operand::Method(base_draw.into())),
        ]);
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_instantiated(circle));
        assert!(annotations.is_marked(circle_draw));
        assert!(!annotations.is_marked(unused));
    }

    #[test]
    fn test_value_type_and_enum_fields_keep_their_reasons() {
        let mut app = TestApp::new();
        let (value_type, enum_type, int32) = (app.core.value_type, app.core.enum_type, app.core.int32);
        let point = app.class_with_base("Point", value_type);
        let x = app.universe.add_field(point, FieldDef::new("X", int32)).unwrap();
        let origin = app
            .universe
            .add_field(point, FieldDef::new("Origin", point).with_flags(FieldAttributes::STATIC))
            .unwrap();
        let color = app.class_with_base("Color", enum_type);
        let red = app
            .universe
            .add_field(
                color,
                FieldDef::new("Red", color).with_flags(FieldAttributes::STATIC | FieldAttributes::LITERAL),
            )
            .unwrap();
        app.main(vec![
            (OpCode::Ldtoken, Operand::Type(point.into())),
            (OpCode::Pop, Operand::None),
            (OpCode::Ldtoken, Operand::Type(color.into())),
            (OpCode::Pop, Operand::None),
        ]);
        let context = app.link();

        let annotations = context.annotations();
        assert!(annotations.is_marked(x));
        assert!(!annotations.is_marked(origin));
        assert!(annotations.is_marked(red));
        let graph = annotations.recorder().graph();
        let has = |from: TypeId, to: crate::model::FieldId, kind: DependencyKind| {
            graph.edges().any(|edge| {
                edge.from == DependencyNode::Type(from)
                    && edge.to == DependencyNode::Field(to)
                    && edge.kind == kind
            })
        };
        assert!(has(point, x, DependencyKind::ValueTypeField));
        assert!(has(color, red, DependencyKind::EnumField));
    }

    struct KeepOnce {
        method: MethodId,
        runs: usize,
    }

    impl MarkStepHook for KeepOnce {
        fn name(&self) -> &str {
            "keep-once"
        }

        fn process(&mut self, step: &mut MarkStep<'_>) -> Result<bool> {
            self.runs += 1;
            if step.annotations().is_marked(self.method) {
                return Ok(false);
            }
            step.mark_method(
                self.method,
                DependencyInfo {
                    kind: DependencyKind::Custom,
                    source: None,
                },
            )?;
            Ok(true)
        }
    }

    #[test]
    fn test_hooks_mark_until_stable() -> Result<()> {
        let mut app = TestApp::new();
        let program = app.program;
        let extra = app.static_method(program, "Extra", vec![]);
        app.main(vec![]);
        let mut context = app.context(LinkerConfig::default());
        let hook = KeepOnce { method: extra, runs: 0 };
        context.mark_with_hooks(vec![Box::new(hook)])?;

        assert!(context.annotations().is_marked(extra));
        assert!(context.annotations().is_processed(extra));
        assert!(context
            .annotations()
            .recorder()
            .graph()
            .edges()
            .any(|edge| edge.from == DependencyNode::Linker
                && edge.to == DependencyNode::Method(extra)
                && edge.kind == DependencyKind::Custom));
        Ok(())
    }
}
