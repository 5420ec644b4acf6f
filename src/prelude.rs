//! # reachscope Prelude
//!
//! Import this module to get the types needed to build a member model, configure a link and
//! inspect its results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all reachscope operations
pub use crate::Error;

/// The result type used throughout reachscope
pub use crate::Result;

/// What kind of reference failed to resolve
pub use crate::ReferenceKind;

// ================================================================================================
// Member Model
// ================================================================================================

/// The arena and its builders
pub use crate::model::{
    AttributeArg, AttributeTarget, CustomAttributeDef, EventDef, FieldDef, MemberRef, MethodDef,
    PropertyDef, TypeDef, Universe,
};

/// Typed identifiers
pub use crate::model::{
    AssemblyId, AttributeId, EventId, FieldId, InterfaceImplId, MemberRefId, MethodId,
    PropertyId, TypeId,
};

/// Flags and signatures
pub use crate::model::{
    Accessibility, BindingFlags, FieldAttributes, FieldHandle, MethodHandle, MethodModifiers,
    NamedArgTarget, TypeAttributes, TypeSig,
};

/// IL bodies
pub use crate::model::{ExceptionHandler, Instruction, MethodBody, OpCode, Operand};

/// The synthetic core library
pub use crate::model::{CoreLibrary, CORELIB_NAME};

// ================================================================================================
// Linker
// ================================================================================================

/// Driving a link
pub use crate::linker::{LinkContext, LinkerConfig, Optimizations, RootAssembly, RootVisibility};

/// Mark step and hooks
pub use crate::linker::{MarkStep, MarkStepHook};

/// Per-member state
pub use crate::linker::{AnnotationStore, AssemblyAction, MethodAction, TypePreserve};

/// Dependency reasons
pub use crate::linker::{
    DependencyCategory, DependencyInfo, DependencyKind, DependencyNode, EntryInfo, EntryKind,
    Member,
};

// ================================================================================================
// Results
// ================================================================================================

/// Diagnostics collected during marking
pub use crate::linker::{Diagnostic, DiagnosticCode, DiagnosticSeverity, Diagnostics};

/// Provenance graph and report
pub use crate::linker::{
    CallSite, DependencyGraph, DependencyRecorder, PathEdge, ProvenanceReport, ReflectionData,
    ReflectionDataKind, UnsafeReachingData,
};
