use crate::{
    linker::{
        AnnotationStore, DependencyNode, Diagnostics, EntryKind, LinkerConfig, MarkStep,
        MarkStepHook, Member, PathEdge, DependencyKind, ProvenanceReport, TypeMap,
    },
    model::Universe,
    Result,
};

/// Everything one link owns: the universe being analysed, its configuration, and the state
/// the mark step builds up.
///
/// Assembly actions are assigned from the configuration when the context is created.
/// Additional roots can be added with [`LinkContext::add_root`] before calling
/// [`LinkContext::mark`].
///
/// # Examples
///
/// ```rust,no_run
/// use reachscope::prelude::*;
///
/// # fn example(universe: Universe, main: MethodId) -> reachscope::Result<()> {
/// let mut context = LinkContext::new(universe, LinkerConfig::default())?;
/// context.add_root(main, EntryKind::CommandLine);
/// context.mark()?;
/// assert!(context.annotations().is_marked(main));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LinkContext {
    universe: Universe,
    config: LinkerConfig,
    annotations: AnnotationStore,
    type_map: TypeMap,
    diagnostics: Diagnostics,
    roots: Vec<(Member, EntryKind)>,
}

impl LinkContext {
    /// Creates a context and assigns every assembly its configured action.
    ///
    /// # Errors
    ///
    /// Returns an error if the annotation store cannot be created.
    pub fn new(universe: Universe, config: LinkerConfig) -> Result<Self> {
        let mut annotations = AnnotationStore::new(&universe)?;
        for assembly in universe.assembly_ids() {
            let action = config.action_for(&universe.assembly(assembly).name);
            annotations.set_action(assembly, action);
        }
        Ok(LinkContext {
            universe,
            config,
            annotations,
            type_map: TypeMap::new(),
            diagnostics: Diagnostics::new(),
            roots: Vec::new(),
        })
    }

    /// Adds an explicit root.
    pub fn add_root(&mut self, member: impl Into<Member>, kind: EntryKind) {
        self.roots.push((member.into(), kind));
    }

    /// Runs the mark step.
    ///
    /// # Errors
    ///
    /// See [`MarkStep::run`].
    pub fn mark(&mut self) -> Result<()> {
        MarkStep::new(self).run()
    }

    /// Runs the mark step with additional hooks.
    ///
    /// # Errors
    ///
    /// See [`MarkStep::run`].
    pub fn mark_with_hooks<'h>(&'h mut self, hooks: Vec<Box<dyn MarkStepHook + 'h>>) -> Result<()> {
        MarkStep::new(self).with_hooks(hooks).run()
    }

    /// The member model.
    #[must_use]
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// The annotation store.
    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// Mutable access to the annotation store, for setting actions and preserve requests
    /// before marking.
    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    /// The type/override map.
    #[must_use]
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    /// Diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The shortest dependency paths from a root to `member`, root first.
    ///
    /// With `all_roots`, one path per root that reaches the member; otherwise only the first.
    #[must_use]
    pub fn paths_to(
        &self,
        member: impl Into<Member>,
        all_roots: bool,
    ) -> Vec<Vec<PathEdge<DependencyNode, DependencyKind>>> {
        let node = DependencyNode::from(member.into());
        self.annotations.recorder().paths_to(&node, all_roots)
    }

    /// Renders the unsafe reaching facts with their traces.
    #[must_use]
    pub fn provenance_report(&self) -> ProvenanceReport {
        ProvenanceReport::build(self.annotations.recorder(), &self.universe)
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn split(
        &mut self,
    ) -> (
        &Universe,
        &LinkerConfig,
        &mut AnnotationStore,
        &TypeMap,
        &Diagnostics,
        &[(Member, EntryKind)],
    ) {
        (
            &self.universe,
            &self.config,
            &mut self.annotations,
            &self.type_map,
            &self.diagnostics,
            &self.roots,
        )
    }
}
