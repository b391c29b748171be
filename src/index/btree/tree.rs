//! The tree handle: open/close, lookup, and the page-level helpers the
//! mutating operations share.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::config::MAX_SLOT_PAYLOAD;
use crate::common::{Error, PageId, Result};
use crate::storage::{DiskManager, TreeMetadata};

use super::capacity::NodeCapacity;
use super::internal::InternalNode;
use super::leaf::{LeafEntry, LeafNode};
use super::node::{self, Node, NodeKind};
use super::options::TreeOptions;

/// One internal node on a root-to-leaf descent and the child taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PathStep {
    pub page_id: PageId,
    pub child_index: usize,
}

/// A leaf reached by descent, with the path that led to it.
pub(super) struct LeafCursor {
    pub page_id: PageId,
    pub leaf: LeafNode,
    /// Root first. Empty when the leaf is the root.
    pub path: Vec<PathStep>,
}

impl LeafCursor {
    pub fn parent_page_id(&self) -> PageId {
        self.path.last().map_or(PageId::INVALID, |s| s.page_id)
    }
}

/// A disk-backed B+Tree mapping string keys to a value list and row id.
///
/// # File
/// One data file per tree: a metadata header followed by fixed-size
/// pages, cached through a [`BufferPoolManager`].
///
/// # Concurrency
/// Single writer. Mutations take `&mut self`; nothing is shared between
/// handles, so two handles on one file will corrupt it.
///
/// # Example
/// ```no_run
/// use bplusdb::BPlusTree;
///
/// let mut tree = BPlusTree::create("index.db", 4096)?;
/// tree.insert("key_0001", ["a", "b", "c"], "row-1")?;
/// assert_eq!(tree.get("key_0001")?, Some(vec!["a".into(), "b".into(), "c".into()]));
/// assert!(tree.delete("key_0001")?);
/// tree.close()?;
/// # Ok::<(), bplusdb::Error>(())
/// ```
pub struct BPlusTree {
    pub(super) bpm: BufferPoolManager,
    pub(super) meta: TreeMetadata,
    pub(super) capacity: NodeCapacity,
    pub(super) options: TreeOptions,
    path: PathBuf,
    closed: bool,
}

impl BPlusTree {
    /// Open the tree at `path` with default options and `page_size`,
    /// creating the file if needed.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        Self::open(path, TreeOptions::default().with_page_size(page_size))
    }

    /// Open or create the tree at `path`.
    ///
    /// An existing tree is validated before it is returned.
    ///
    /// # Errors
    /// - [`Error::InvalidPageSize`] / [`Error::InvalidConfig`] for bad options
    /// - [`Error::PageSizeMismatch`] if the file records another page size
    /// - [`Error::CorruptMetadata`] on a header checksum mismatch
    /// - Any fatal structural error found by validation
    pub fn open<P: AsRef<Path>>(path: P, options: TreeOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let capacity = NodeCapacity::derive(options.page_size, &options.capacity)?;

        let dm = DiskManager::open(&path, options.page_size)?;
        let bpm = BufferPoolManager::new(options.pool_size, dm);

        let meta = match TreeMetadata::decode(&bpm.read_metadata()?)? {
            Some(mut meta) => {
                match meta.page_size {
                    Some(file) if file != options.page_size => {
                        return Err(Error::PageSizeMismatch {
                            file,
                            requested: options.page_size,
                        });
                    }
                    Some(_) => {}
                    None => meta.page_size = Some(options.page_size),
                }
                meta
            }
            None => {
                let meta = TreeMetadata::new(options.page_size);
                bpm.write_metadata(&meta.encode())?;
                meta
            }
        };

        let tree = Self {
            bpm,
            meta,
            capacity,
            options,
            path,
            closed: false,
        };

        if !tree.is_empty() {
            let report = tree.validate()?;
            if !report.is_consistent() {
                warn!(
                    parent_mismatches = report.parent_mismatches,
                    chain_violations = report.chain_violations,
                    "btree.open.inconsistent"
                );
            }
        }

        info!(
            path = %tree.path.display(),
            root = %tree.meta.root_page_id,
            page_size = tree.options.page_size,
            max_keys = tree.capacity.max_keys(),
            splits = tree.meta.split_count,
            merges = tree.meta.merge_count,
            "btree.open"
        );
        Ok(tree)
    }

    /// Flush everything and close the file.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        info!(path = %self.path.display(), "btree.close");
        Ok(())
    }

    /// Write all dirty pages, then the metadata header.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.save_metadata()
    }

    /// Look up the value list stored for `key`.
    pub fn get(&self, key: &str) -> Result<Option<Vec<String>>> {
        Ok(self.get_entry(key)?.map(|entry| entry.values))
    }

    /// Look up the full entry (values and row id) stored for `key`.
    pub fn get_entry(&self, key: &str) -> Result<Option<LeafEntry>> {
        // Longer keys are rejected on insert, so they cannot be present.
        if self.is_empty() || key.len() > MAX_SLOT_PAYLOAD {
            return Ok(None);
        }

        let cursor = self.find_leaf(key)?;
        Ok(cursor.leaf.get(key).cloned())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn root_page_id(&self) -> PageId {
        self.meta.root_page_id
    }

    pub fn is_empty(&self) -> bool {
        !self.meta.root_page_id.is_valid()
    }

    pub fn max_keys_per_node(&self) -> usize {
        self.capacity.max_keys()
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    pub fn split_count(&self) -> u32 {
        self.meta.split_count
    }

    pub fn merge_count(&self) -> u32 {
        self.meta.merge_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn buffer_pool_stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    /// Pages currently pinned. Zero whenever no operation is running.
    pub fn pinned_pages(&self) -> u32 {
        self.bpm.total_pins()
    }

    pub fn reset_page_access_count(&self) {
        self.bpm.stats().reset_page_accesses();
    }

    // ========================================================================
    // Descent
    // ========================================================================

    /// Walk from the root to the leaf that owns `key`.
    ///
    /// # Errors
    /// - [`Error::CycleDetected`] if a page repeats on the path
    /// - [`Error::DepthExceeded`] past `max_depth` nodes
    /// - [`Error::SelfReference`] / [`Error::InvalidChild`] for bad pointers
    pub(super) fn find_leaf(&self, key: &str) -> Result<LeafCursor> {
        let max_depth = self.options.max_depth;
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut page_id = self.meta.root_page_id;

        loop {
            let depth = path.len();
            if depth >= max_depth {
                return Err(Error::DepthExceeded {
                    page_id,
                    depth,
                    max_depth,
                });
            }
            if !visited.insert(page_id) {
                return Err(Error::CycleDetected { page_id, depth });
            }

            let node = self.read_node(page_id)?;
            match node.kind {
                NodeKind::Leaf(leaf) => {
                    return Ok(LeafCursor {
                        page_id,
                        leaf,
                        path,
                    })
                }
                NodeKind::Internal(internal) => {
                    let child_index = internal.child_index(key);
                    let child = checked_child(page_id, &internal, child_index)?;
                    path.push(PathStep {
                        page_id,
                        child_index,
                    });
                    page_id = child;
                }
            }
        }
    }

    // ========================================================================
    // Page helpers
    // ========================================================================

    pub(super) fn read_node(&self, page_id: PageId) -> Result<Node> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        Node::decode(page_id, &guard, self.capacity.max_keys())
    }

    pub(super) fn write_node(&self, node: &Node) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(node.page_id)?;
        node.encode(&mut guard, self.capacity.max_keys())
    }

    /// Point `child` at `parent`, touching the page only if it changes.
    pub(super) fn set_parent(&self, child: PageId, parent: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(child)?;
        if node::read_parent(&guard) != parent {
            node::write_parent(&mut guard, parent)?;
        }
        Ok(())
    }

    /// Take a page from the free list, or extend the file.
    pub(super) fn allocate_page(&mut self) -> Result<PageId> {
        let head = self.meta.free_list_head;
        if head.is_valid() {
            let next = {
                let guard = self.bpm.fetch_page_read(head)?;
                node::decode_free(head, &guard)?
            };
            self.meta.free_list_head = next;
            debug!(page_id = %head, "btree.page.reuse");
            return Ok(head);
        }

        let raw = self.meta.next_page_id;
        if raw > i32::MAX as u32 {
            return Err(Error::InvalidPageId(PageId::new(raw)));
        }
        self.meta.next_page_id += 1;
        debug!(page_id = raw, "btree.page.allocate");
        Ok(PageId::new(raw))
    }

    /// Put `page_id` on the free list.
    pub(super) fn free_page(&mut self, page_id: PageId) -> Result<()> {
        {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            node::encode_free(&mut guard, self.meta.free_list_head)?;
        }
        self.meta.free_list_head = page_id;
        debug!(%page_id, "btree.page.free");
        Ok(())
    }

    pub(super) fn save_metadata(&self) -> Result<()> {
        self.bpm.write_metadata(&self.meta.encode())
    }

    /// Run `op`, persisting the metadata header if it changed, even when
    /// `op` fails part way.
    pub(super) fn with_metadata<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let before = self.meta;
        let result = op(self);
        if self.meta != before {
            self.save_metadata()?;
        }
        result
    }
}

impl Drop for BPlusTree {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "btree.drop.flush_failed");
        }
    }
}

/// Child `index` of `internal`, rejecting INVALID and self pointers.
pub(super) fn checked_child(
    parent: PageId,
    internal: &InternalNode,
    index: usize,
) -> Result<PageId> {
    match internal.children.get(index).copied() {
        Some(child) if child == parent => Err(Error::SelfReference { page_id: parent }),
        Some(child) if child.is_valid() => Ok(child),
        _ => Err(Error::InvalidChild { parent, index }),
    }
}

pub(super) fn internal_mut(node: &mut Node) -> Result<&mut InternalNode> {
    let page_id = node.page_id;
    match &mut node.kind {
        NodeKind::Internal(internal) => Ok(internal),
        NodeKind::Leaf(_) => Err(Error::CorruptNode {
            page_id,
            reason: "expected an internal node, found a leaf".into(),
        }),
    }
}

pub(super) fn leaf_mut(node: &mut Node) -> Result<&mut LeafNode> {
    let page_id = node.page_id;
    match &mut node.kind {
        NodeKind::Leaf(leaf) => Ok(leaf),
        NodeKind::Internal(_) => Err(Error::CorruptNode {
            page_id,
            reason: "expected a leaf, found an internal node".into(),
        }),
    }
}

/// Index of `child` within `parent`, trusting the recorded descent step
/// when it still matches.
pub(super) fn locate_child(parent: &Node, hint: usize, child: PageId) -> Result<usize> {
    let internal = parent.as_internal().ok_or_else(|| Error::CorruptNode {
        page_id: parent.page_id,
        reason: "expected an internal node, found a leaf".into(),
    })?;

    if internal.children.get(hint) == Some(&child) {
        return Ok(hint);
    }
    internal.position_of(child).ok_or_else(|| Error::CorruptNode {
        page_id: parent.page_id,
        reason: format!("{} is not a child", child),
    })
}
