//! Insert with leaf splits and split propagation.

use tracing::{debug, trace};

use crate::common::config::MAX_SLOT_PAYLOAD;
use crate::common::{Error, PageId, Result};

use super::internal::InternalNode;
use super::leaf::{LeafEntry, LeafNode};
use super::node::{Node, LEAF_HEADER_SIZE};
use super::tree::{internal_mut, locate_child, BPlusTree, LeafCursor, PathStep};

impl BPlusTree {
    /// Insert `key`, replacing the values and row id if it already exists.
    ///
    /// Values and the row id are stored in 60-byte slots and truncated to
    /// fit. Keys are not.
    ///
    /// # Errors
    /// - [`Error::KeyTooLong`] for keys over 60 bytes
    /// - [`Error::EntryTooLarge`] if the entry could not share a page
    ///   with a sibling entry
    /// - Structural and I/O errors from descent and page writes
    pub fn insert<I, V>(&mut self, key: &str, values: I, row_id: &str) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let entry = LeafEntry::new(key, values.into_iter().map(Into::into).collect(), row_id);
        self.check_entry(&entry)?;
        self.with_metadata(|tree| tree.insert_entry(entry))
    }

    fn check_entry(&self, entry: &LeafEntry) -> Result<()> {
        if entry.key.len() > MAX_SLOT_PAYLOAD {
            return Err(Error::KeyTooLong {
                key: entry.key.clone(),
                len: entry.key.len(),
                max: MAX_SLOT_PAYLOAD,
            });
        }

        let size = entry.encoded_size();
        let limit = self.capacity.max_entry_size();
        if size > limit {
            return Err(Error::EntryTooLarge {
                key: entry.key.clone(),
                size,
                limit,
            });
        }
        Ok(())
    }

    fn insert_entry(&mut self, entry: LeafEntry) -> Result<()> {
        if self.is_empty() {
            let page_id = self.allocate_page()?;
            let mut leaf = LeafNode::new();
            leaf.upsert(entry);
            self.write_node(&Node::new_leaf(page_id, PageId::INVALID, leaf))?;
            self.meta.root_page_id = page_id;
            debug!(%page_id, "btree.root.create");
            return Ok(());
        }

        let mut cursor = self.find_leaf(&entry.key)?;
        let page_size = self.options.page_size;

        match cursor.leaf.search(&entry.key) {
            Ok(index) => {
                let added = entry.encoded_size();
                let removed = cursor.leaf.entries[index].encoded_size();
                if cursor.leaf.encoded_size() + added - removed <= page_size {
                    cursor.leaf.entries[index] = entry;
                    trace!(page_id = %cursor.page_id, "btree.insert.replace");
                    return self.write_cursor(cursor);
                }

                // The new value list no longer fits beside its neighbours.
                cursor.leaf.entries.remove(index);
                self.split_leaf(cursor, entry)
            }
            Err(_) => {
                let fits_count = cursor.leaf.len() < self.capacity.max_keys();
                let fits_bytes = cursor.leaf.encoded_size() + entry.encoded_size() <= page_size;
                if fits_count && fits_bytes {
                    cursor.leaf.upsert(entry);
                    trace!(page_id = %cursor.page_id, keys = cursor.leaf.len(), "btree.insert.leaf");
                    return self.write_cursor(cursor);
                }

                self.split_leaf(cursor, entry)
            }
        }
    }

    fn write_cursor(&self, cursor: LeafCursor) -> Result<()> {
        let parent = cursor.parent_page_id();
        self.write_node(&Node::new_leaf(cursor.page_id, parent, cursor.leaf))
    }

    /// Split the cursor's leaf and add `entry` to the correct half.
    fn split_leaf(&mut self, cursor: LeafCursor, entry: LeafEntry) -> Result<()> {
        let parent = cursor.parent_page_id();
        let LeafCursor {
            page_id,
            mut leaf,
            path,
        } = cursor;

        // Midpoint of the existing entries, shifted by one when the new
        // entry lands in the left half.
        let mid = leaf.len() / 2;
        let goes_left = leaf
            .entries
            .get(mid)
            .is_some_and(|e| entry.key.as_str() < e.key.as_str());
        let preferred = if goes_left { mid + 1 } else { mid };

        leaf.upsert(entry);
        let at = self.leaf_split_point(page_id, &leaf, preferred)?;

        let right_id = self.allocate_page()?;
        let right = leaf.split_off(at);
        leaf.next_leaf = right_id;

        let separator = right.first_key().unwrap_or_default().to_string();
        let (left_len, right_len) = (leaf.len(), right.len());

        self.write_node(&Node::new_leaf(page_id, parent, leaf))?;
        self.write_node(&Node::new_leaf(right_id, parent, right))?;
        self.meta.split_count += 1;

        debug!(
            left = %page_id,
            right = %right_id,
            left_keys = left_len,
            right_keys = right_len,
            %separator,
            "btree.split.leaf"
        );

        self.insert_into_parent(path, page_id, separator, right_id)
    }

    /// Choose where to cut a leaf holding one entry too many.
    ///
    /// Uses `preferred` when both halves fit the page, otherwise the
    /// nearest cut that does. Entries are at most half the usable page,
    /// so some cut always fits.
    fn leaf_split_point(&self, page_id: PageId, leaf: &LeafNode, preferred: usize) -> Result<usize> {
        let len = leaf.len();
        let max_keys = self.capacity.max_keys();
        let page_size = self.options.page_size;

        let mut prefix = Vec::with_capacity(len + 1);
        prefix.push(0usize);
        for entry in &leaf.entries {
            prefix.push(prefix[prefix.len() - 1] + entry.encoded_size());
        }
        let total = prefix[len];

        let fits = |at: usize| {
            at >= 1
                && at < len
                && at <= max_keys
                && len - at <= max_keys
                && LEAF_HEADER_SIZE + prefix[at] <= page_size
                && LEAF_HEADER_SIZE + total - prefix[at] <= page_size
        };

        let preferred = preferred.clamp(1, len.saturating_sub(1).max(1));
        for distance in 0..len {
            if preferred >= distance && fits(preferred - distance) {
                return Ok(preferred - distance);
            }
            if fits(preferred + distance) {
                return Ok(preferred + distance);
            }
        }

        Err(Error::PageOverflow {
            page_id,
            required: LEAF_HEADER_SIZE + total,
            page_size,
        })
    }

    /// Hook `right` in beside `left` in their parent, splitting upward as
    /// far as needed.
    fn insert_into_parent(
        &mut self,
        mut path: Vec<PathStep>,
        mut left: PageId,
        mut separator: String,
        mut right: PageId,
    ) -> Result<()> {
        let max_keys = self.capacity.max_keys();

        loop {
            let step = match path.pop() {
                Some(step) => step,
                None => return self.grow_root(left, separator, right),
            };
            let grandparent = path.last().map_or(PageId::INVALID, |s| s.page_id);

            let mut parent = self.read_node(step.page_id)?;
            parent.parent_page_id = grandparent;
            let index = locate_child(&parent, step.child_index, left)?;
            let internal = internal_mut(&mut parent)?;
            internal.insert_after(index, separator, right);

            if internal.len() <= max_keys {
                self.write_node(&parent)?;
                return self.set_parent(right, parent.page_id);
            }

            // Transiently one over capacity: split and promote the middle.
            let (promoted, right_half) = internal.split();
            let left_children = internal.children.clone();
            let right_children = right_half.children.clone();

            let new_id = self.allocate_page()?;
            self.write_node(&parent)?;
            self.write_node(&Node::new_internal(new_id, grandparent, right_half))?;
            self.reparent(&left_children, parent.page_id)?;
            self.reparent(&right_children, new_id)?;
            self.meta.split_count += 1;

            debug!(
                left = %parent.page_id,
                right = %new_id,
                %promoted,
                "btree.split.internal"
            );

            left = parent.page_id;
            separator = promoted;
            right = new_id;
        }
    }

    /// The old root split: put a new root above both halves.
    fn grow_root(&mut self, left: PageId, separator: String, right: PageId) -> Result<()> {
        let root_id = self.allocate_page()?;
        let root = InternalNode::new_root(left, separator, right);
        self.write_node(&Node::new_internal(root_id, PageId::INVALID, root))?;
        self.set_parent(left, root_id)?;
        self.set_parent(right, root_id)?;
        self.meta.root_page_id = root_id;

        debug!(root = %root_id, %left, %right, "btree.root.grow");
        Ok(())
    }

    pub(super) fn reparent(&self, children: &[PageId], parent: PageId) -> Result<()> {
        for &child in children {
            self.set_parent(child, parent)?;
        }
        Ok(())
    }
}
