//! Trait definitions for graph abstractions.
//!
//! Algorithms in [`crate::utils::graph::algorithms`] are written against these traits rather
//! than against [`DirectedGraph`](crate::utils::graph::DirectedGraph) directly.
//!
//! - [`GraphBase`] - Core properties: node count and node iteration
//! - [`Successors`] - Forward edge traversal (outgoing edges)
//! - [`Predecessors`] - Backward edge traversal (incoming edges)

use crate::utils::graph::NodeId;

/// Base trait providing fundamental graph properties.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node identifiers in ascending order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs supporting forward traversal.
///
/// Implementations must yield successors in edge insertion order; breadth-first searches over
/// the provenance graph depend on it for reproducible tie-breaking.
pub trait Successors: GraphBase {
    /// Returns the targets of all outgoing edges of `node`, in insertion order.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs supporting backward traversal.
pub trait Predecessors: GraphBase {
    /// Returns the sources of all incoming edges of `node`, in insertion order.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}
