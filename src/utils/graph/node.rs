//! Node identifier for directed graphs.
//!
//! [`NodeId`] is a strongly-typed index into the node table of a
//! [`DirectedGraph`](crate::utils::graph::DirectedGraph). The provenance graph hands these out
//! from its canonicalizing registry, so for a given member the id never changes once assigned.

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// Node IDs are assigned sequentially starting from 0 in insertion order. The provenance graph
/// relies on this ordering: "start-node insertion order" is simply ascending `NodeId` order.
///
/// # Examples
///
/// ```rust,ignore
/// use reachscope::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let a: NodeId = graph.add_node("A");
/// let b: NodeId = graph.add_node("B");
/// assert!(a < b);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw 0-based index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display_and_order() {
        let a = NodeId::new(1);
        let b = NodeId::from(7usize);
        assert_eq!(format!("{a}"), "n1");
        assert_eq!(format!("{b:?}"), "NodeId(7)");
        assert!(a < b);
        assert_eq!(usize::from(b), 7);
    }
}
