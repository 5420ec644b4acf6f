//! Generic directed graph infrastructure.
//!
//! [`DirectedGraph`] stores node and edge payloads in flat vectors with per-node adjacency
//! lists. The provenance graph in [`crate::linker::provenance`] layers a canonicalizing
//! registry and start/end flags on top of it; the breadth-first machinery it uses lives in
//! [`algorithms`].

mod directed;
mod edge;
mod node;
mod traits;

pub mod algorithms;

pub use directed::DirectedGraph;
pub use edge::EdgeId;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, Successors};
