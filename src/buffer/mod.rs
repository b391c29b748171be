//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the tree and the data
//! file. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - [`Frame`] - A slot holding a page plus pin/dirty bookkeeping
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII pins on a page
//! - [`BufferPoolStats`] - Hit/miss/access counters
//! - [`replacer`] - Eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
