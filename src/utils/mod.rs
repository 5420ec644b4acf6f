//! Shared data structures used by the member model and the linker.

mod bitset;
pub mod graph;

pub use bitset::BitSet;
