//! Graph algorithms operating on the traits in [`crate::utils::graph`].

mod traversal;

pub use traversal::{bfs, bfs_tree, BfsTree};
