//! Disk-backed B+Tree.
//!
//! # Layout
//! - [`node`] - Page codec shared by both node kinds
//! - `leaf` / `internal` - Node bodies and their in-memory edits
//! - `capacity` - Fan-out derived from the page size
//! - `tree` - The [`BPlusTree`] handle, lookup and page helpers
//! - `insert` / `delete` - Mutations with split and merge propagation
//! - `verify` - Validation and statistics traversals
//!
//! # Invariants
//! - Every key lives in exactly one leaf; leaves are chained left to right
//!   in key order.
//! - An internal node with `n` keys has `n + 1` children, and a key equal
//!   to a separator lives in the subtree to its right.
//! - Non-root nodes hold at least `max_keys / 2` keys after a delete
//!   unless no sibling can lend or merge.

mod capacity;
mod delete;
mod insert;
mod internal;
mod leaf;
pub mod node;
mod options;
mod stats;
mod tree;
mod verify;

pub use capacity::{CapacityOptions, NodeCapacity};
pub use internal::InternalNode;
pub use leaf::{LeafEntry, LeafNode};
pub use node::{Node, NodeKind, NodeType};
pub use options::TreeOptions;
pub use stats::{Statistics, ValidationReport};
pub use tree::BPlusTree;
