//! The linker mark step and its supporting state.
//!
//! # Architecture
//!
//! - [`LinkContext`] - Owns the universe, the configuration and every piece of mark state
//! - [`MarkStep`] - The worklist fixpoint that decides what is kept
//! - [`AnnotationStore`] - Mark, process and instantiation bits, actions and override registries
//! - [`TypeMap`] - Lazily computed override and interface relationships
//! - [`DependencyRecorder`] - Provenance: why each member was kept
//! - [`Diagnostics`] - Warnings and errors collected during the run
//!
//! # Usage
//!
//! ```rust,no_run
//! use reachscope::prelude::*;
//! use reachscope::model::Universe;
//!
//! # fn example(universe: Universe) -> reachscope::Result<()> {
//! let config = LinkerConfig::default().with_root("App", RootVisibility::EntryPoint);
//! let mut context = LinkContext::new(universe, config)?;
//! context.mark()?;
//! for diagnostic in context.diagnostics().iter() {
//!     println!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```

mod annotations;
mod config;
mod context;
mod dependency;
mod diagnostics;
mod mark;
pub mod provenance;
pub mod reflection;
mod typemap;

pub use annotations::{
    AnnotationStore, AssemblyAction, DefaultInterfaceImplementation, MethodAction,
    OverrideInformation, TypePreserve,
};
pub use config::{LinkerConfig, Optimizations, RootAssembly, RootVisibility};
pub use context::LinkContext;
pub use dependency::{
    DependencyCategory, DependencyInfo, DependencyKind, DependencyNode, EntryInfo, EntryKind,
    Member,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, DiagnosticSeverity, Diagnostics,
};
pub use mark::{AttributeReadiness, MarkStep, MarkStepHook, Phase};
pub use provenance::{
    CallSite, DependencyGraph, DependencyRecorder, PathEdge, ProvenanceReport, ReflectionData,
    ReflectionDataKind, UnsafeReachingData,
};
pub use typemap::TypeMap;
