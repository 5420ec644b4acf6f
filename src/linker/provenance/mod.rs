//! Provenance: why each member was kept.
//!
//! - [`DependencyGraph`] - Generic canonical-node multigraph with shortest path queries
//! - [`DependencyRecorder`] - The graph specialised to dependency nodes, plus roots and
//!   unsafe reaching facts
//! - [`ProvenanceReport`] - JSON rendering of unsafe reaching facts with their traces

mod graph;
mod recorder;
mod report;

pub use graph::{DependencyGraph, Node, PathEdge};
pub use recorder::{
    CallSite, DependencyRecorder, ReflectionData, ReflectionDataKind, UnsafeReachingData,
};
pub use report::{ProvenanceReport, UnsafeReachingEntry};
