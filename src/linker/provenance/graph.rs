//! A searchable dependency graph with canonical nodes.
//!
//! [`DependencyGraph`] stores "why is X reachable" as a directed multigraph over arbitrary
//! hashable payloads. Each payload maps to exactly one node for the lifetime of the graph; a
//! second `add_edge` naming the same payload reuses the node. Nodes carry two flags: *entry*
//! marks the start of a path search and *dangerous* marks its end.
//!
//! # Path semantics
//!
//! Path queries run a breadth-first search seeded from the entry nodes. The search never
//! enters an entry node it did not start from: every path explains its target through exactly
//! one root. Among equally short paths the first one discovered in FIFO order wins, and among
//! parallel edges between two nodes the first inserted one is reported. For a fixed insertion
//! order all results are therefore reproducible.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::{
    utils::graph::{
        algorithms::{bfs, bfs_tree, BfsTree},
        DirectedGraph, NodeId,
    },
    Result,
};

/// A node payload plus its search flags.
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// The payload
    pub value: T,
    /// Whether path searches start here
    pub entry: bool,
    /// Whether path searches report paths ending here
    pub dangerous: bool,
}

impl<T> Node<T> {
    /// Returns `true` for entry nodes.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.entry
    }

    /// Returns `true` for dangerous nodes.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.dangerous
    }
}

/// One hop of a reported path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEdge<T, E> {
    /// Where the edge starts
    pub from: T,
    /// Where the edge ends
    pub to: T,
    /// The edge label
    pub kind: E,
}

/// A directed multigraph over canonical payload nodes.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T, E> {
    graph: DirectedGraph<Node<T>, E>,
    registry: HashMap<T, NodeId>,
    edge_keys: HashSet<(NodeId, NodeId, E)>,
}

impl<T, E> Default for DependencyGraph<T, E>
where
    T: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> DependencyGraph<T, E>
where
    T: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        DependencyGraph {
            graph: DirectedGraph::new(),
            registry: HashMap::new(),
            edge_keys: HashSet::new(),
        }
    }

    /// Registers `value`, merging the flags into any existing node.
    ///
    /// Flags only ever go up: registering a known dangerous node as not dangerous leaves it
    /// dangerous.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `value` is already an entry node and `entry` is `false`.
    pub fn add_node(&mut self, value: T, entry: bool, dangerous: bool) -> Result<NodeId> {
        if let Some(&id) = self.registry.get(&value) {
            let node = self
                .graph
                .node_mut(id)
                .ok_or_else(|| internal_error!("registry names missing node {}", id))?;
            if node.entry && !entry {
                return Err(internal_error!("entry node {} re-registered as non-entry", id));
            }
            node.entry |= entry;
            node.dangerous |= dangerous;
            return Ok(id);
        }
        Ok(self.intern(value, entry, dangerous))
    }

    /// Adds an edge, interning both endpoints without touching their flags.
    ///
    /// Returns `false` if an identical `(from, to, kind)` edge already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying graph rejects the edge.
    pub fn add_edge(&mut self, from: T, to: T, kind: E) -> Result<bool> {
        let from = self.node_id_or_intern(from);
        let to = self.node_id_or_intern(to);
        if !self.edge_keys.insert((from, to, kind.clone())) {
            return Ok(false);
        }
        self.graph.add_edge(from, to, kind)?;
        Ok(true)
    }

    /// Returns the node registered for `value`.
    #[must_use]
    pub fn node(&self, value: &T) -> Option<&Node<T>> {
        self.registry.get(value).and_then(|&id| self.graph.node(id))
    }

    /// Returns `true` if `value` has a node.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.registry.contains_key(value)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        self.graph.nodes().map(|(_, n)| n)
    }

    /// Iterates edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = PathEdge<T, E>> + '_ {
        self.graph.edges().filter_map(|(_, from, to, kind)| self.path_edge(from, to, kind))
    }

    /// Number of edges ending at `value`.
    #[must_use]
    pub fn in_degree(&self, value: &T) -> usize {
        self.registry
            .get(value)
            .map_or(0, |&id| self.graph.in_degree(id))
    }

    /// Iterates the payloads reachable from `value` by following edges, `value` included.
    pub fn reachable_from(&self, value: &T) -> Vec<T> {
        let Some(&start) = self.registry.get(value) else {
            return Vec::new();
        };
        bfs(&self.graph, start)
            .filter_map(|id| self.graph.node(id).map(|n| n.value.clone()))
            .collect()
    }

    /// Computes shortest paths from entry nodes to `target`.
    ///
    /// With `return_multiple == false` the result holds at most one path: the shortest over
    /// all entries. With `return_multiple == true` it holds one shortest path for every entry
    /// that reaches `target`, in entry insertion order.
    ///
    /// An unknown or unreachable target yields an empty vector. An entry target yields a
    /// single empty path.
    #[must_use]
    pub fn shortest_paths_to(&self, target: &T, return_multiple: bool) -> Vec<Vec<PathEdge<T, E>>> {
        let Some(&target_id) = self.registry.get(target) else {
            return Vec::new();
        };
        if self.is_start(target_id) {
            return vec![Vec::new()];
        }

        let starts = self.start_nodes();
        if return_multiple {
            starts
                .iter()
                .filter_map(|&start| self.path_in(&self.search(&[start]), target_id))
                .collect()
        } else {
            self.path_in(&self.search(&starts), target_id)
                .into_iter()
                .collect()
        }
    }

    /// Computes one shortest path to every dangerous node, in node insertion order.
    ///
    /// Dangerous nodes no entry reaches are omitted.
    #[must_use]
    pub fn all_shortest_paths(&self) -> Vec<(T, Vec<PathEdge<T, E>>)> {
        let tree = self.search(&self.start_nodes());
        self.graph
            .nodes()
            .filter(|(_, node)| node.is_end())
            .filter_map(|(id, node)| {
                let path = if node.is_start() {
                    Vec::new()
                } else {
                    self.path_in(&tree, id)?
                };
                Some((node.value.clone(), path))
            })
            .collect()
    }

    fn intern(&mut self, value: T, entry: bool, dangerous: bool) -> NodeId {
        let id = self.graph.add_node(Node {
            value: value.clone(),
            entry,
            dangerous,
        });
        self.registry.insert(value, id);
        id
    }

    fn node_id_or_intern(&mut self, value: T) -> NodeId {
        match self.registry.get(&value) {
            Some(&id) => id,
            None => self.intern(value, false, false),
        }
    }

    fn is_start(&self, id: NodeId) -> bool {
        self.graph.node(id).is_some_and(Node::is_start)
    }

    fn start_nodes(&self) -> Vec<NodeId> {
        self.graph
            .nodes()
            .filter(|(_, n)| n.is_start())
            .map(|(id, _)| id)
            .collect()
    }

    fn search(&self, sources: &[NodeId]) -> BfsTree {
        bfs_tree(&self.graph, sources, |n| !self.is_start(n))
    }

    fn path_in(&self, tree: &BfsTree, target: NodeId) -> Option<Vec<PathEdge<T, E>>> {
        let nodes = tree.path_to(target)?;
        nodes
            .windows(2)
            .map(|hop| {
                self.graph
                    .outgoing_edges(hop[0])
                    .find(|(_, to, _)| *to == hop[1])
                    .and_then(|(_, to, kind)| self.path_edge(hop[0], to, kind))
            })
            .collect()
    }

    fn path_edge(&self, from: NodeId, to: NodeId, kind: &E) -> Option<PathEdge<T, E>> {
        Some(PathEdge {
            from: self.graph.node(from)?.value.clone(),
            to: self.graph.node(to)?.value.clone(),
            kind: kind.clone(),
        })
    }
}
