//! The provenance recorder owned by the annotation store.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    linker::{
        provenance::{DependencyGraph, PathEdge},
        DependencyKind, DependencyNode, EntryInfo,
    },
    model::MethodId,
    Result,
};

/// A reflection-sensitive call: who called what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// The method containing the call
    pub caller: MethodId,
    /// The reflection API called
    pub callee: MethodId,
}

/// What kind of data reached a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum ReflectionDataKind {
    /// A value that cannot be determined statically
    Unknown,
    /// A literal name that does not resolve to anything
    UnresolvedName,
}

/// The data that reached a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectionData {
    /// Classification of the data
    pub kind: ReflectionDataKind,
    /// The literal, when there was one
    pub value: Option<String>,
}

/// "Unanalyzable data reached this reflection call from this caller."
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnsafeReachingData {
    /// Where
    pub callsite: CallSite,
    /// What
    pub data: ReflectionData,
}

/// Records every dependency edge and every root, and flags dangerous call sites.
///
/// The graph always contains the [`DependencyNode::Linker`] entry node; untracked reasons are
/// attributed to it so that no marked member is left without an incoming edge.
#[derive(Debug, Clone)]
pub struct DependencyRecorder {
    graph: DependencyGraph<DependencyNode, DependencyKind>,
    entries: HashMap<DependencyNode, EntryInfo>,
    unsafe_reaching: Vec<UnsafeReachingData>,
}

impl DependencyRecorder {
    /// Creates a recorder holding only the linker node.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the linker node is registered on an empty graph.
    pub fn new() -> Result<Self> {
        let mut graph = DependencyGraph::new();
        graph.add_node(DependencyNode::Linker, true, false)?;
        Ok(DependencyRecorder {
            graph,
            entries: HashMap::new(),
            unsafe_reaching: Vec::new(),
        })
    }

    /// Records a `from -> to` dependency.
    ///
    /// # Errors
    ///
    /// Propagates graph errors.
    pub fn record_dependency(
        &mut self,
        from: DependencyNode,
        to: DependencyNode,
        kind: DependencyKind,
    ) -> Result<bool> {
        self.graph.add_edge(from, to, kind)
    }

    /// Records that `info.entry` is a root. The first entry reason of a node is kept.
    ///
    /// # Errors
    ///
    /// Propagates graph errors.
    pub fn record_entry(&mut self, info: EntryInfo) -> Result<()> {
        let node = DependencyNode::from(info.entry);
        self.graph.add_node(node.clone(), true, false)?;
        self.entries.entry(node).or_insert(info);
        Ok(())
    }

    /// Records an unsafe reaching fact and flags its caller as dangerous.
    ///
    /// # Errors
    ///
    /// Propagates graph errors.
    pub fn record_unsafe(&mut self, data: UnsafeReachingData) -> Result<()> {
        let caller = DependencyNode::Method(data.callsite.caller);
        let entry = self.graph.node(&caller).is_some_and(|n| n.entry);
        self.graph.add_node(caller, entry, true)?;
        self.unsafe_reaching.push(data);
        Ok(())
    }

    /// The underlying graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<DependencyNode, DependencyKind> {
        &self.graph
    }

    /// The entry reason of a root node.
    #[must_use]
    pub fn entry(&self, node: &DependencyNode) -> Option<&EntryInfo> {
        self.entries.get(node)
    }

    /// Every unsafe reaching fact, in recording order.
    #[must_use]
    pub fn unsafe_reaching(&self) -> &[UnsafeReachingData] {
        &self.unsafe_reaching
    }

    /// Shortest dependency paths from roots to `node`.
    #[must_use]
    pub fn paths_to(
        &self,
        node: &DependencyNode,
        return_multiple: bool,
    ) -> Vec<Vec<PathEdge<DependencyNode, DependencyKind>>> {
        self.graph.shortest_paths_to(node, return_multiple)
    }

    /// Returns `true` if `node` has an incoming edge or is a root.
    #[must_use]
    pub fn is_explained(&self, node: &DependencyNode) -> bool {
        *node == DependencyNode::Linker
            || self.entries.contains_key(node)
            || self.graph.in_degree(node) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{EntryKind, Member};
    use crate::model::AssemblyId;

    #[test]
    fn test_unsafe_keeps_entry_flag() -> Result<()> {
        let mut recorder = DependencyRecorder::new()?;
        let main = MethodId::new(0);
        recorder.record_entry(EntryInfo {
            kind: EntryKind::RootAssembly,
            source: Some(DependencyNode::Assembly(AssemblyId::new(0))),
            entry: Member::Method(main),
        })?;
        recorder.record_unsafe(UnsafeReachingData {
            callsite: CallSite {
                caller: main,
                callee: MethodId::new(1),
            },
            data: ReflectionData {
                kind: ReflectionDataKind::Unknown,
                value: None,
            },
        })?;

        let node = recorder.graph().node(&DependencyNode::Method(main));
        assert!(node.is_some_and(|n| n.is_start() && n.is_end()));
        assert_eq!(recorder.paths_to(&DependencyNode::Method(main), true), vec![Vec::new()]);
        assert_eq!(recorder.unsafe_reaching().len(), 1);
        Ok(())
    }

    #[test]
    fn test_untracked_attribution() -> Result<()> {
        let mut recorder = DependencyRecorder::new()?;
        let m = DependencyNode::Method(MethodId::new(3));
        assert!(!recorder.is_explained(&m));
        recorder.record_dependency(DependencyNode::Linker, m.clone(), DependencyKind::Untracked)?;
        assert!(recorder.is_explained(&m));
        assert_eq!(recorder.paths_to(&m, false).len(), 1);
        Ok(())
    }
}
