//! Delete with underflow repair: borrow from a sibling, else merge.

use tracing::{debug, trace, warn};

use crate::common::config::MAX_SLOT_PAYLOAD;
use crate::common::{PageId, Result};

use super::internal::InternalNode;
use super::leaf::LeafNode;
use super::node::{Node, NodeKind, LEAF_HEADER_SIZE};
use super::tree::{checked_child, internal_mut, leaf_mut, locate_child, BPlusTree, PathStep};

impl BPlusTree {
    /// Remove `key`. Returns `false` if it was not present.
    ///
    /// Leaves and internal nodes left with fewer than `max_keys / 2` keys
    /// borrow from a sibling or merge with one. Pages released by merges
    /// and root collapses go on the free list.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        if self.is_empty() || key.len() > MAX_SLOT_PAYLOAD {
            return Ok(false);
        }
        self.with_metadata(|tree| tree.delete_entry(key))
    }

    fn delete_entry(&mut self, key: &str) -> Result<bool> {
        let mut cursor = self.find_leaf(key)?;
        if cursor.leaf.remove(key).is_none() {
            return Ok(false);
        }

        let parent = cursor.parent_page_id();
        let node = Node::new_leaf(cursor.page_id, parent, cursor.leaf);
        self.write_node(&node)?;
        trace!(page_id = %node.page_id, keys = node.key_count(), "btree.delete.leaf");

        self.rebalance(node, cursor.path)?;
        Ok(true)
    }

    /// Repair underflow from `node` upward along `path`.
    fn rebalance(&mut self, mut node: Node, mut path: Vec<PathStep>) -> Result<()> {
        let max_keys = self.capacity.max_keys();

        loop {
            let step = match path.pop() {
                Some(step) => step,
                None => return self.shrink_root(),
            };
            if !node.is_underflow(max_keys) {
                return Ok(());
            }

            let grandparent = path.last().map_or(PageId::INVALID, |s| s.page_id);
            let mut parent = self.read_node(step.page_id)?;
            parent.parent_page_id = grandparent;
            let index = locate_child(&parent, step.child_index, node.page_id)?;

            let merged = match node.kind {
                NodeKind::Leaf(leaf) => self.repair_leaf(&mut parent, index, node.page_id, leaf)?,
                NodeKind::Internal(internal) => {
                    self.repair_internal(&mut parent, index, node.page_id, internal)?
                }
            };
            if !merged {
                return Ok(());
            }

            // The parent lost a separator and may underflow in turn.
            node = parent;
        }
    }

    /// Fix an underflowing leaf at child `index` of `parent`.
    ///
    /// Returns `true` if two leaves merged, so the parent shrank.
    fn repair_leaf(
        &mut self,
        parent: &mut Node,
        index: usize,
        page_id: PageId,
        mut leaf: LeafNode,
    ) -> Result<bool> {
        let min_keys = self.capacity.min_keys();
        let max_keys = self.capacity.max_keys();
        let page_size = self.options.page_size;
        let parent_id = parent.page_id;

        let (left_id, right_id) = siblings(parent, index)?;
        let mut left = left_id.map(|id| self.read_node(id)).transpose()?;
        let mut right = right_id.map(|id| self.read_node(id)).transpose()?;

        // Borrow the left sibling's last entry.
        if let Some(left) = left.as_mut() {
            let left_leaf = leaf_mut(left)?;
            let fits = left_leaf
                .entries
                .last()
                .is_some_and(|e| leaf.encoded_size() + e.encoded_size() <= page_size);
            if left_leaf.len() > min_keys && fits {
                if let Some(moved) = left_leaf.entries.pop() {
                    let separator = moved.key.clone();
                    leaf.entries.insert(0, moved);
                    internal_mut(parent)?.keys[index - 1] = separator;

                    left.parent_page_id = parent_id;
                    self.write_node(left)?;
                    self.write_node(&Node::new_leaf(page_id, parent_id, leaf))?;
                    self.write_node(parent)?;
                    trace!(%page_id, from = %left.page_id, "btree.borrow.left");
                    return Ok(false);
                }
            }
        }

        // Borrow the right sibling's first entry.
        if let Some(right) = right.as_mut() {
            let right_leaf = leaf_mut(right)?;
            let fits = right_leaf
                .entries
                .first()
                .is_some_and(|e| leaf.encoded_size() + e.encoded_size() <= page_size);
            if right_leaf.len() > min_keys && fits {
                let moved = right_leaf.entries.remove(0);
                leaf.entries.push(moved);
                let separator = right_leaf.first_key().unwrap_or_default().to_string();
                internal_mut(parent)?.keys[index] = separator;

                right.parent_page_id = parent_id;
                self.write_node(right)?;
                self.write_node(&Node::new_leaf(page_id, parent_id, leaf))?;
                self.write_node(parent)?;
                trace!(%page_id, from = %right.page_id, "btree.borrow.right");
                return Ok(false);
            }
        }

        // Merge into the left sibling.
        if let Some(mut left) = left {
            let left_leaf = leaf_mut(&mut left)?;
            let bytes = left_leaf.encoded_size() + leaf.encoded_size() - LEAF_HEADER_SIZE;
            if left_leaf.len() + leaf.len() <= max_keys && bytes <= page_size {
                left_leaf.entries.append(&mut leaf.entries);
                left_leaf.next_leaf = leaf.next_leaf;
                internal_mut(parent)?.remove_at(index - 1);

                left.parent_page_id = parent_id;
                self.write_node(&left)?;
                self.write_node(parent)?;
                self.free_page(page_id)?;
                self.meta.merge_count += 1;
                debug!(into = %left.page_id, freed = %page_id, "btree.merge.leaf");
                return Ok(true);
            }
        }

        // Absorb the right sibling.
        if let Some(mut right) = right {
            let right_leaf = leaf_mut(&mut right)?;
            let bytes = leaf.encoded_size() + right_leaf.encoded_size() - LEAF_HEADER_SIZE;
            if leaf.len() + right_leaf.len() <= max_keys && bytes <= page_size {
                leaf.entries.append(&mut right_leaf.entries);
                leaf.next_leaf = right_leaf.next_leaf;
                internal_mut(parent)?.remove_at(index);

                self.write_node(&Node::new_leaf(page_id, parent_id, leaf))?;
                self.write_node(parent)?;
                self.free_page(right.page_id)?;
                self.meta.merge_count += 1;
                debug!(into = %page_id, freed = %right.page_id, "btree.merge.leaf");
                return Ok(true);
            }
        }

        warn!(%page_id, keys = leaf.len(), "btree.rebalance.skipped");
        Ok(false)
    }

    /// Fix an underflowing internal node at child `index` of `parent`.
    ///
    /// Returns `true` if two nodes merged, so the parent shrank.
    fn repair_internal(
        &mut self,
        parent: &mut Node,
        index: usize,
        page_id: PageId,
        mut internal: InternalNode,
    ) -> Result<bool> {
        let min_keys = self.capacity.min_keys();
        let max_keys = self.capacity.max_keys();
        let parent_id = parent.page_id;

        let (left_id, right_id) = siblings(parent, index)?;
        let mut left = left_id.map(|id| self.read_node(id)).transpose()?;
        let mut right = right_id.map(|id| self.read_node(id)).transpose()?;

        // Rotate right: the left sibling's last child moves over and its
        // last key replaces the separator, which comes down.
        if let Some(left) = left.as_mut() {
            let left_internal = internal_mut(left)?;
            if left_internal.len() > min_keys {
                if let (Some(key), Some(child)) =
                    (left_internal.keys.pop(), left_internal.children.pop())
                {
                    let separator = &mut internal_mut(parent)?.keys[index - 1];
                    internal.keys.insert(0, std::mem::replace(separator, key));
                    internal.children.insert(0, child);

                    left.parent_page_id = parent_id;
                    self.write_node(left)?;
                    self.write_node(&Node::new_internal(page_id, parent_id, internal))?;
                    self.write_node(parent)?;
                    self.set_parent(child, page_id)?;
                    trace!(%page_id, from = %left.page_id, "btree.rotate.right");
                    return Ok(false);
                }
            }
        }

        // Rotate left, mirrored.
        if let Some(right) = right.as_mut() {
            let right_internal = internal_mut(right)?;
            if right_internal.len() > min_keys {
                let key = right_internal.keys.remove(0);
                let child = right_internal.children.remove(0);
                let separator = &mut internal_mut(parent)?.keys[index];
                internal.keys.push(std::mem::replace(separator, key));
                internal.children.push(child);

                right.parent_page_id = parent_id;
                self.write_node(right)?;
                self.write_node(&Node::new_internal(page_id, parent_id, internal))?;
                self.write_node(parent)?;
                self.set_parent(child, page_id)?;
                trace!(%page_id, from = %right.page_id, "btree.rotate.left");
                return Ok(false);
            }
        }

        // Merge into the left sibling, pulling the separator down.
        if let Some(mut left) = left {
            let left_internal = internal_mut(&mut left)?;
            if left_internal.len() + internal.len() < max_keys {
                let (separator, _) = internal_mut(parent)?.remove_at(index - 1);
                left_internal.keys.push(separator);
                left_internal.keys.append(&mut internal.keys);
                left_internal.children.extend_from_slice(&internal.children);

                left.parent_page_id = parent_id;
                self.write_node(&left)?;
                self.write_node(parent)?;
                self.reparent(&internal.children, left.page_id)?;
                self.free_page(page_id)?;
                self.meta.merge_count += 1;
                debug!(into = %left.page_id, freed = %page_id, "btree.merge.internal");
                return Ok(true);
            }
        }

        // Absorb the right sibling.
        if let Some(mut right) = right {
            let right_internal = internal_mut(&mut right)?;
            if internal.len() + right_internal.len() < max_keys {
                let (separator, _) = internal_mut(parent)?.remove_at(index);
                let moved = right_internal.children.clone();
                internal.keys.push(separator);
                internal.keys.append(&mut right_internal.keys);
                internal.children.append(&mut right_internal.children);

                self.write_node(&Node::new_internal(page_id, parent_id, internal))?;
                self.write_node(parent)?;
                self.reparent(&moved, page_id)?;
                self.free_page(right.page_id)?;
                self.meta.merge_count += 1;
                debug!(into = %page_id, freed = %right.page_id, "btree.merge.internal");
                return Ok(true);
            }
        }

        warn!(%page_id, keys = internal.len(), "btree.rebalance.skipped");
        Ok(false)
    }

    /// Drop empty roots: an empty leaf root empties the tree, an internal
    /// root with one child hands the root to that child.
    fn shrink_root(&mut self) -> Result<()> {
        loop {
            let root_id = self.meta.root_page_id;
            if !root_id.is_valid() {
                return Ok(());
            }

            let root = self.read_node(root_id)?;
            match &root.kind {
                NodeKind::Leaf(leaf) if leaf.is_empty() => {
                    self.free_page(root_id)?;
                    self.meta.root_page_id = PageId::INVALID;
                    debug!(freed = %root_id, "btree.root.empty");
                    return Ok(());
                }
                NodeKind::Internal(internal) if internal.is_empty() => {
                    let child = checked_child(root_id, internal, 0)?;
                    self.set_parent(child, PageId::INVALID)?;
                    self.free_page(root_id)?;
                    self.meta.root_page_id = child;
                    debug!(root = %child, freed = %root_id, "btree.root.collapse");
                }
                _ => return Ok(()),
            }
        }
    }
}

/// Siblings of child `index` under the same parent.
fn siblings(parent: &Node, index: usize) -> Result<(Option<PageId>, Option<PageId>)> {
    let internal = match &parent.kind {
        NodeKind::Internal(internal) => internal,
        NodeKind::Leaf(_) => return Ok((None, None)),
    };

    let left = match index.checked_sub(1) {
        Some(i) => Some(checked_child(parent.page_id, internal, i)?),
        None => None,
    };
    let right = if index + 1 < internal.children.len() {
        Some(checked_child(parent.page_id, internal, index + 1)?)
    } else {
        None
    };
    Ok((left, right))
}
