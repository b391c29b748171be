//! Leaf nodes: sorted entries plus the link to the next leaf.

use crate::common::config::SLOT_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

use super::node::{LEAF_HEADER_SIZE, NEXT_LEAF_OFFSET};

/// One key with its value list and row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: String,
    pub values: Vec<String>,
    pub row_id: String,
}

impl LeafEntry {
    pub fn new(key: impl Into<String>, values: Vec<String>, row_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values,
            row_id: row_id.into(),
        }
    }

    /// Bytes this entry occupies in a leaf page.
    pub fn encoded_size(&self) -> usize {
        Self::size_for(self.values.len())
    }

    /// Encoded size of an entry carrying `value_count` values.
    #[inline]
    pub fn size_for(value_count: usize) -> usize {
        SLOT_SIZE * 2 + 4 + SLOT_SIZE * value_count
    }
}

/// A leaf node.
///
/// Entries are kept sorted by key with no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub next_leaf: PageId,
    pub entries: Vec<LeafEntry>,
}

impl LeafNode {
    pub fn new() -> Self {
        Self {
            next_leaf: PageId::INVALID,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|e| e.key.as_str())
    }

    pub fn last_key(&self) -> Option<&str> {
        self.entries.last().map(|e| e.key.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Binary search by key: `Ok(index)` if present, `Err(insert_at)` if not.
    pub fn search(&self, key: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.as_str().cmp(key))
    }

    pub fn get(&self, key: &str) -> Option<&LeafEntry> {
        self.search(key).ok().map(|i| &self.entries[i])
    }

    /// Insert or replace the entry for `entry.key`.
    ///
    /// Returns the replaced entry, if any. Capacity is the caller's concern.
    pub fn upsert(&mut self, entry: LeafEntry) -> Option<LeafEntry> {
        match self.search(&entry.key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i], entry)),
            Err(i) => {
                self.entries.insert(i, entry);
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<LeafEntry> {
        let i = self.search(key).ok()?;
        Some(self.entries.remove(i))
    }

    /// Bytes this leaf occupies when encoded, header included.
    pub fn encoded_size(&self) -> usize {
        LEAF_HEADER_SIZE + self.entries.iter().map(LeafEntry::encoded_size).sum::<usize>()
    }

    /// Move the entries from `at` onward into a new leaf.
    ///
    /// The new leaf inherits this leaf's next pointer; linking it back in
    /// is up to the caller.
    pub fn split_off(&mut self, at: usize) -> LeafNode {
        LeafNode {
            next_leaf: self.next_leaf,
            entries: self.entries.split_off(at),
        }
    }

    pub(super) fn encode_body(&self, page: &mut Page) -> Result<()> {
        page.write_int(NEXT_LEAF_OFFSET, self.next_leaf.to_raw())?;

        let mut offset = LEAF_HEADER_SIZE;
        for entry in &self.entries {
            page.write_string(offset, &entry.key, SLOT_SIZE)?;
            offset += SLOT_SIZE;
            page.write_string(offset, &entry.row_id, SLOT_SIZE)?;
            offset += SLOT_SIZE;
            page.write_int(offset, entry.values.len() as i32)?;
            offset += 4;
            for value in &entry.values {
                page.write_string(offset, value, SLOT_SIZE)?;
                offset += SLOT_SIZE;
            }
        }
        Ok(())
    }

    pub(super) fn decode_body(page_id: PageId, page: &Page, key_count: usize) -> Result<Self> {
        let next_leaf = PageId::from_raw(page.read_int(NEXT_LEAF_OFFSET));
        let corrupt = |index: usize, offset: usize| Error::CorruptNode {
            page_id,
            reason: format!(
                "leaf entry {} of {} overruns the page at offset {}",
                index, key_count, offset
            ),
        };

        let mut entries = Vec::with_capacity(key_count.min(page.size() / LeafEntry::size_for(0)));
        let mut offset = LEAF_HEADER_SIZE;
        for i in 0..key_count {
            if page.remaining(offset) < LeafEntry::size_for(0) {
                return Err(corrupt(i, offset));
            }
            let key = page.read_string(offset, SLOT_SIZE);
            offset += SLOT_SIZE;
            let row_id = page.read_string(offset, SLOT_SIZE);
            offset += SLOT_SIZE;
            let value_count = page.read_int(offset).max(0) as usize;
            offset += 4;

            if page.remaining(offset) < value_count.saturating_mul(SLOT_SIZE) {
                return Err(corrupt(i, offset));
            }
            let values = (0..value_count)
                .map(|j| page.read_string(offset + j * SLOT_SIZE, SLOT_SIZE))
                .collect();
            offset += value_count * SLOT_SIZE;

            entries.push(LeafEntry {
                key,
                values,
                row_id,
            });
        }

        Ok(Self { next_leaf, entries })
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::node::KEY_COUNT_OFFSET;

    fn entry(key: &str) -> LeafEntry {
        LeafEntry::new(key, vec!["v1".into(), "v2".into()], format!("row-{}", key))
    }

    #[test]
    fn test_upsert_keeps_sorted_and_unique() {
        let mut leaf = LeafNode::new();
        for key in ["m", "c", "x", "a"] {
            assert!(leaf.upsert(entry(key)).is_none());
        }
        assert_eq!(leaf.keys().collect::<Vec<_>>(), ["a", "c", "m", "x"]);

        let replaced = leaf
            .upsert(LeafEntry::new("c", vec!["new".into()], "r2"))
            .unwrap();
        assert_eq!(replaced.row_id, "row-c");
        assert_eq!(leaf.len(), 4);
        assert_eq!(leaf.get("c").unwrap().values, ["new"]);
    }

    #[test]
    fn test_remove() {
        let mut leaf = LeafNode::new();
        leaf.upsert(entry("a"));
        leaf.upsert(entry("b"));

        assert_eq!(leaf.remove("a").unwrap().key, "a");
        assert!(leaf.remove("a").is_none());
        assert_eq!(leaf.first_key(), Some("b"));
    }

    #[test]
    fn test_encoded_size() {
        let mut leaf = LeafNode::new();
        assert_eq!(leaf.encoded_size(), 16);

        leaf.upsert(entry("a"));
        assert_eq!(leaf.encoded_size(), 16 + 64 + 64 + 4 + 2 * 64);
    }

    #[test]
    fn test_split_off_inherits_next() {
        let mut leaf = LeafNode::new();
        for key in ["a", "b", "c", "d", "e"] {
            leaf.upsert(entry(key));
        }
        leaf.next_leaf = PageId::new(12);

        let right = leaf.split_off(2);
        assert_eq!(leaf.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(right.keys().collect::<Vec<_>>(), ["c", "d", "e"]);
        assert_eq!(right.next_leaf, PageId::new(12));
    }

    #[test]
    fn test_values_and_row_id_truncated_on_encode() {
        let long = "v".repeat(80);
        let mut leaf = LeafNode::new();
        leaf.upsert(LeafEntry::new("k", vec![long.clone()], long));

        let mut page = Page::new(1024);
        leaf.encode_body(&mut page).unwrap();
        let decoded = LeafNode::decode_body(PageId::new(0), &page, 1).unwrap();

        assert_eq!(decoded.entries[0].values[0].len(), 60);
        assert_eq!(decoded.entries[0].row_id.len(), 60);
    }

    #[test]
    fn test_decode_overrunning_count_is_corrupt() {
        let mut page = Page::new(1024);
        page.write_int(KEY_COUNT_OFFSET, 50).unwrap();

        assert!(matches!(
            LeafNode::decode_body(PageId::new(3), &page, 50),
            Err(Error::CorruptNode { .. })
        ));
    }

    #[test]
    fn test_negative_value_count_reads_as_empty() {
        let mut page = Page::new(1024);
        page.write_string(16, "k", 64).unwrap();
        page.write_int(16 + 128, -4).unwrap();

        let leaf = LeafNode::decode_body(PageId::new(0), &page, 1).unwrap();
        assert_eq!(leaf.entries[0].key, "k");
        assert!(leaf.entries[0].values.is_empty());
    }
}
