//! Internal nodes: separator keys and child pointers.

use crate::common::config::SLOT_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

use super::node::INTERNAL_HEADER_SIZE;

/// An internal node.
///
/// Always holds `keys.len() + 1` children. Child `i` covers keys in
/// `[keys[i-1], keys[i])`; a key equal to a separator lives to its right.
///
/// The page layout reserves `max_keys` key slots followed by
/// `max_keys + 1` child slots regardless of how many are in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub keys: Vec<String>,
    pub children: Vec<PageId>,
}

impl InternalNode {
    pub fn new(keys: Vec<String>, children: Vec<PageId>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self { keys, children }
    }

    /// A fresh root over two children.
    pub fn new_root(left: PageId, separator: String, right: PageId) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the child whose range contains `key`.
    #[inline]
    pub fn child_index(&self, key: &str) -> usize {
        self.keys.partition_point(|k| k.as_str() <= key)
    }

    pub fn position_of(&self, child: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Insert `key` with `right_child` immediately after child `index`.
    pub fn insert_after(&mut self, index: usize, key: String, right_child: PageId) {
        self.keys.insert(index, key);
        self.children.insert(index + 1, right_child);
    }

    /// Remove separator `key_index` and the child to its right.
    pub fn remove_at(&mut self, key_index: usize) -> (String, PageId) {
        let key = self.keys.remove(key_index);
        let child = self.children.remove(key_index + 1);
        (key, child)
    }

    /// Split around the middle key, which is returned rather than kept
    /// by either half.
    ///
    /// Left keeps `keys[..mid]` and `children[..=mid]`; the returned
    /// node takes the rest.
    pub fn split(&mut self) -> (String, InternalNode) {
        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let promoted = self.keys.pop().unwrap_or_default();

        (
            promoted,
            InternalNode {
                keys: right_keys,
                children: right_children,
            },
        )
    }

    pub(super) fn encode_body(&self, page: &mut Page, max_keys: usize) -> Result<()> {
        for i in 0..max_keys {
            let key = self.keys.get(i).map(String::as_str).unwrap_or("");
            page.write_string(INTERNAL_HEADER_SIZE + i * SLOT_SIZE, key, SLOT_SIZE)?;
        }

        let children_at = INTERNAL_HEADER_SIZE + max_keys * SLOT_SIZE;
        for i in 0..=max_keys {
            let child = self.children.get(i).copied().unwrap_or(PageId::INVALID);
            page.write_int(children_at + i * 4, child.to_raw())?;
        }
        Ok(())
    }

    pub(super) fn decode_body(
        page_id: PageId,
        page: &Page,
        key_count: usize,
        max_keys: usize,
    ) -> Result<Self> {
        if key_count > max_keys {
            return Err(Error::CorruptNode {
                page_id,
                reason: format!(
                    "internal node has {} keys, layout holds {}",
                    key_count, max_keys
                ),
            });
        }

        let keys = (0..key_count)
            .map(|i| page.read_string(INTERNAL_HEADER_SIZE + i * SLOT_SIZE, SLOT_SIZE))
            .collect();

        let children_at = INTERNAL_HEADER_SIZE + max_keys * SLOT_SIZE;
        let children = (0..=key_count)
            .map(|i| PageId::from_raw(page.read_int(children_at + i * 4)))
            .collect();

        Ok(Self { keys, children })
    }
}
