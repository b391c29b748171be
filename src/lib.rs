//! bplusdb - a single-writer, disk-backed B+Tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            bplusdb                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   BPlusTree: get / insert / delete / validate / stats   │   │
//! │  │   Node codec · split & merge propagation · free list    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + LRU replacer + Stats       │   │
//! │  │   Pinned pages are never evicted                         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   DiskManager + Page + metadata header                   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`storage`] - File I/O, the metadata header and the page container
//! - [`buffer`] - Buffer pool management and LRU eviction
//! - [`index`] - The B+Tree
//!
//! # Quick Start
//! ```no_run
//! use bplusdb::BPlusTree;
//!
//! let mut tree = BPlusTree::create("my_index.db", 4096)?;
//! for i in 0..100 {
//!     let key = format!("key_{:04}", i);
//!     tree.insert(&key, ["value1", "value2", "value3"], &format!("row-{}", i))?;
//! }
//!
//! assert!(tree.get("key_0050")?.is_some());
//! println!("{}", tree.statistics()?);
//! tree.close()?;
//! # Ok::<(), bplusdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::DEFAULT_PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::{BPlusTree, Statistics, TreeOptions, ValidationReport};
pub use storage::page::Page;
pub use storage::{DiskManager, TreeMetadata};
