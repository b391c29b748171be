//! Error types for bplusdb.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in bplusdb.
///
/// Every public operation returns this single type. Structural errors
/// abort the operation that hit them and carry the page id, depth or
/// key needed to diagnose the problem; they never leave a page pinned.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations (open, read, write, sync).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A real page was required but the id is the INVALID sentinel.
    #[error("Invalid page id: {0}")]
    InvalidPageId(PageId),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No page can be evicted: all frames in the buffer pool are pinned")]
    NoFreeFrames,

    /// A flush needed the page latch while a guard on the same page was live.
    #[error("{0} is latched by a live guard and cannot be flushed")]
    PageLatched(PageId),

    /// A typed write would cross the page boundary.
    #[error("Write of {len} bytes at offset {offset} exceeds page size {page_size}")]
    OutOfRange {
        offset: usize,
        len: usize,
        page_size: usize,
    },

    /// Requested page size is outside the supported range.
    #[error("Invalid page size {size}: must be between {min} and {max}")]
    InvalidPageSize { size: usize, min: usize, max: usize },

    /// An open-time option is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The file was created with a different page size.
    #[error("Page size mismatch: file uses {file}, requested {requested}")]
    PageSizeMismatch { file: usize, requested: usize },

    /// The metadata header checksum does not match its contents.
    #[error("Corrupt metadata header: stored checksum {stored:#010x}, computed {computed:#010x}")]
    CorruptMetadata { stored: u32, computed: u32 },

    /// A node page carries a type tag no decoder understands.
    #[error("Unknown node type {tag} on {page_id}")]
    UnknownNodeType { page_id: PageId, tag: i32 },

    /// A traversal reached a page it had already visited.
    #[error("Cycle detected: {page_id} revisited at depth {depth}")]
    CycleDetected { page_id: PageId, depth: usize },

    /// A traversal went deeper than the configured bound.
    #[error("Maximum depth {max_depth} exceeded at {page_id} (depth {depth})")]
    DepthExceeded {
        page_id: PageId,
        depth: usize,
        max_depth: usize,
    },

    /// An internal node lists itself as one of its children.
    #[error("Internal node {page_id} references itself as a child")]
    SelfReference { page_id: PageId },

    /// An internal node has no usable child at the selected slot.
    #[error("Internal node {parent} has an invalid child pointer at index {index}")]
    InvalidChild { parent: PageId, index: usize },

    /// A node's contents contradict the tree structure around it.
    #[error("Corrupt node {page_id}: {reason}")]
    CorruptNode { page_id: PageId, reason: String },

    /// Insert into an already-full node outside the split path.
    #[error("Node {page_id} is full ({max_keys} keys)")]
    NodeFull { page_id: PageId, max_keys: usize },

    /// Encoding a node with more keys than its page layout allows.
    #[error("Node {page_id} holds {key_count} keys, layout allows {max_keys}")]
    NodeOverflow {
        page_id: PageId,
        key_count: usize,
        max_keys: usize,
    },

    /// A leaf's encoded size exceeds the page.
    #[error("Node {page_id} needs {required} bytes, page holds {page_size}")]
    PageOverflow {
        page_id: PageId,
        required: usize,
        page_size: usize,
    },

    /// Keys are stored in a fixed slot and cannot be truncated safely.
    #[error("Key {key:?} is {len} bytes, maximum is {max}")]
    KeyTooLong { key: String, len: usize, max: usize },

    /// A single entry is too large to share a leaf with a sibling entry.
    #[error("Entry for key {key:?} needs {size} bytes, limit is {limit}")]
    EntryTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// The free list points at a page that is not a free page.
    #[error("Corrupt free list: {page_id} is not a free page")]
    CorruptFreeList { page_id: PageId },
}
