//! Configuration constants for bplusdb.
//!
//! File layout and node encoding constants live here so the storage,
//! buffer and index layers agree on them. Per-tree settings that may vary
//! between opens are carried by [`TreeOptions`](crate::index::btree::TreeOptions).

/// Default size of a page in bytes (4KB).
///
/// The page size is fixed per open file, not per build. 4KB matches the
/// OS page size on most systems and is what new trees use unless told
/// otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size a tree may be opened with.
///
/// A leaf must hold at least three worst-case entries (three 64-byte
/// values each) so that a full leaf always has something to split.
pub const MIN_PAGE_SIZE: usize = 1024;

/// Largest page size a tree may be opened with.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Size of the metadata header at the start of every data file.
///
/// # File Layout
/// ```text
/// ┌──────────────────┬─────────┬─────────┬─────────┐
/// │ Metadata (16KB)  │ Page 0  │ Page 1  │  ...    │
/// └──────────────────┴─────────┴─────────┴─────────┘
/// Offset: 0          16384     16384+P   16384+2P
/// ```
pub const METADATA_SIZE: usize = 16 * 1024;

/// Magic number stored in the first four bytes of the metadata header.
pub const METADATA_MAGIC: i32 = 0x1234_5678;

/// Size of every fixed string slot in a node page.
///
/// A slot is a 4-byte length prefix followed by up to 60 payload bytes.
pub const SLOT_SIZE: usize = 64;

/// Largest string payload a slot can carry.
pub const MAX_SLOT_PAYLOAD: usize = SLOT_SIZE - 4;

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Default bound on root-to-leaf depth during any traversal.
///
/// A correct tree never gets close to this; hitting it means the page
/// graph is corrupt.
pub const DEFAULT_MAX_DEPTH: usize = 50;
