//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - least recently used, skipping pinned frames

mod lru;

pub use lru::LruReplacer;
