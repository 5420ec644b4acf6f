//! Breadth-first traversal algorithms.
//!
//! - [`bfs`] - Lazy breadth-first iteration from a single node
//! - [`bfs_tree`] - Multi-source breadth-first search that records the discovering
//!   predecessor of every reached node
//!
//! Both visit successors in the order [`Successors::successors`] yields them and use a FIFO
//! queue, so for a fixed graph the visit order and the recorded predecessors are reproducible.

use std::collections::VecDeque;

use crate::utils::graph::{NodeId, Successors};

/// Iterator for breadth-first traversal.
pub struct BfsIterator<'g, G: Successors> {
    graph: &'g G,
    queue: VecDeque<NodeId>,
    visited: Vec<bool>,
}

impl<G: Successors> Iterator for BfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for succ in self.graph.successors(node) {
            if !self.visited[succ.index()] {
                self.visited[succ.index()] = true;
                self.queue.push_back(succ);
            }
        }
        Some(node)
    }
}

/// Performs a breadth-first traversal starting at `start`.
///
/// The start node is yielded first. An out-of-range start yields nothing.
pub fn bfs<G: Successors>(graph: &G, start: NodeId) -> BfsIterator<'_, G> {
    let node_count = graph.node_count();
    let mut visited = vec![false; node_count];
    let mut queue = VecDeque::new();
    if start.index() < node_count {
        visited[start.index()] = true;
        queue.push_back(start);
    }
    BfsIterator {
        graph,
        queue,
        visited,
    }
}

/// The predecessor tree produced by [`bfs_tree`].
#[derive(Debug, Clone)]
pub struct BfsTree {
    parent: Vec<Option<NodeId>>,
    reached: Vec<bool>,
}

impl BfsTree {
    /// Returns `true` if `node` was reached by the search.
    #[must_use]
    pub fn reached(&self, node: NodeId) -> bool {
        self.reached.get(node.index()).copied().unwrap_or(false)
    }

    /// Returns the node through which `node` was first discovered.
    ///
    /// Sources and unreached nodes have no parent.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parent.get(node.index()).copied().flatten()
    }

    /// Reconstructs the node sequence from the discovering source to `target`, inclusive.
    ///
    /// Returns `None` if `target` was not reached.
    #[must_use]
    pub fn path_to(&self, target: NodeId) -> Option<Vec<NodeId>> {
        if !self.reached(target) {
            return None;
        }
        let mut path = vec![target];
        let mut current = target;
        while let Some(prev) = self.parent(current) {
            path.push(prev);
            current = prev;
        }
        path.reverse();
        Some(path)
    }
}

/// Breadth-first search from several sources at once, recording discovery predecessors.
///
/// All `sources` are seeded into the queue in the given order before any expansion, so the
/// resulting tree holds a shortest path from the nearest source to every reached node. Among
/// equally short paths the first discovered one wins.
///
/// `admit` filters which successors may be entered at all. Nodes it rejects are neither
/// reached nor expanded; sources are always admitted.
pub fn bfs_tree<G, F>(graph: &G, sources: &[NodeId], mut admit: F) -> BfsTree
where
    G: Successors,
    F: FnMut(NodeId) -> bool,
{
    let node_count = graph.node_count();
    let mut tree = BfsTree {
        parent: vec![None; node_count],
        reached: vec![false; node_count],
    };

    let mut queue = VecDeque::with_capacity(sources.len());
    for &source in sources {
        if source.index() < node_count && !tree.reached[source.index()] {
            tree.reached[source.index()] = true;
            queue.push_back(source);
        }
    }

    while let Some(node) = queue.pop_front() {
        for succ in graph.successors(node) {
            if tree.reached[succ.index()] || !admit(succ) {
                continue;
            }
            tree.reached[succ.index()] = true;
            tree.parent[succ.index()] = Some(node);
            queue.push_back(succ);
        }
    }

    tree
}
