//! Node representation and page codec.
//!
//! A tree page holds exactly one node. The first three 4-byte fields are
//! shared by both node kinds, so the parent pointer can be rewritten in
//! place without decoding the rest of the page.
//!
//! ```text
//! Leaf:     [type=1][keyCount][parent][nextLeaf] entries...
//! Internal: [type=0][keyCount][parent] key slots... child ids...
//! Free:     [type=2][nextFree]
//! ```

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

use super::internal::InternalNode;
use super::leaf::LeafNode;

pub const NODE_TYPE_OFFSET: usize = 0;
pub const KEY_COUNT_OFFSET: usize = 4;
pub const PARENT_OFFSET: usize = 8;
pub const NEXT_LEAF_OFFSET: usize = 12;
pub const FREE_NEXT_OFFSET: usize = 4;

pub const INTERNAL_HEADER_SIZE: usize = 12;
pub const LEAF_HEADER_SIZE: usize = 16;

/// Type tag stored in the first four bytes of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
    /// A reclaimed page on the free list.
    Free = 2,
}

impl NodeType {
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Internal),
            1 => Some(Self::Leaf),
            2 => Some(Self::Free),
            _ => None,
        }
    }

    #[inline]
    pub fn tag(self) -> i32 {
        self as i32
    }
}

/// A decoded tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub page_id: PageId,
    /// INVALID for the root.
    pub parent_page_id: PageId,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn new_leaf(page_id: PageId, parent_page_id: PageId, leaf: LeafNode) -> Self {
        Self {
            page_id,
            parent_page_id,
            kind: NodeKind::Leaf(leaf),
        }
    }

    pub fn new_internal(page_id: PageId, parent_page_id: PageId, internal: InternalNode) -> Self {
        Self {
            page_id,
            parent_page_id,
            kind: NodeKind::Internal(internal),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Leaf(_) => NodeType::Leaf,
            NodeKind::Internal(_) => NodeType::Internal,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn key_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.len(),
            NodeKind::Internal(internal) => internal.len(),
        }
    }

    #[inline]
    pub fn is_full(&self, max_keys: usize) -> bool {
        self.key_count() >= max_keys
    }

    #[inline]
    pub fn is_underflow(&self, max_keys: usize) -> bool {
        self.key_count() < max_keys / 2
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn as_internal(&self) -> Option<&InternalNode> {
        match &self.kind {
            NodeKind::Internal(internal) => Some(internal),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Decode the node stored in `page`.
    ///
    /// # Errors
    /// - [`Error::UnknownNodeType`] for a tag that is not a node
    ///   (including a free page)
    /// - [`Error::CorruptNode`] when counts disagree with the page bytes
    pub fn decode(page_id: PageId, page: &Page, max_keys: usize) -> Result<Self> {
        let tag = page.read_int(NODE_TYPE_OFFSET);
        let key_count = page.read_int(KEY_COUNT_OFFSET);
        let parent_page_id = PageId::from_raw(page.read_int(PARENT_OFFSET));

        if key_count < 0 {
            return Err(Error::CorruptNode {
                page_id,
                reason: format!("negative key count {}", key_count),
            });
        }
        let key_count = key_count as usize;

        let kind = match NodeType::from_tag(tag) {
            Some(NodeType::Leaf) => NodeKind::Leaf(LeafNode::decode_body(page_id, page, key_count)?),
            Some(NodeType::Internal) => {
                NodeKind::Internal(InternalNode::decode_body(page_id, page, key_count, max_keys)?)
            }
            Some(NodeType::Free) | None => return Err(Error::UnknownNodeType { page_id, tag }),
        };

        Ok(Self {
            page_id,
            parent_page_id,
            kind,
        })
    }

    /// Encode this node into `page`, replacing its previous contents.
    ///
    /// Size limits are checked before the page is touched, so a failed
    /// encode leaves the page unchanged.
    pub fn encode(&self, page: &mut Page, max_keys: usize) -> Result<()> {
        let key_count = self.key_count();
        if key_count > max_keys {
            return Err(Error::NodeOverflow {
                page_id: self.page_id,
                key_count,
                max_keys,
            });
        }

        if let NodeKind::Leaf(leaf) = &self.kind {
            let required = leaf.encoded_size();
            if required > page.size() {
                return Err(Error::PageOverflow {
                    page_id: self.page_id,
                    required,
                    page_size: page.size(),
                });
            }
        }

        page.clear();
        page.write_int(NODE_TYPE_OFFSET, self.node_type().tag())?;
        page.write_int(KEY_COUNT_OFFSET, key_count as i32)?;
        page.write_int(PARENT_OFFSET, self.parent_page_id.to_raw())?;

        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.encode_body(page),
            NodeKind::Internal(internal) => internal.encode_body(page, max_keys),
        }
    }
}

/// Rewrite only the parent pointer of an encoded node.
pub fn write_parent(page: &mut Page, parent_page_id: PageId) -> Result<()> {
    page.write_int(PARENT_OFFSET, parent_page_id.to_raw())
}

pub fn read_parent(page: &Page) -> PageId {
    PageId::from_raw(page.read_int(PARENT_OFFSET))
}

/// Turn `page` into a free-list entry pointing at `next_free`.
pub fn encode_free(page: &mut Page, next_free: PageId) -> Result<()> {
    page.clear();
    page.write_int(NODE_TYPE_OFFSET, NodeType::Free.tag())?;
    page.write_int(FREE_NEXT_OFFSET, next_free.to_raw())
}

/// Read the next pointer of a free-list entry.
///
/// # Errors
/// [`Error::CorruptFreeList`] if `page` is not a free page.
pub fn decode_free(page_id: PageId, page: &Page) -> Result<PageId> {
    if NodeType::from_tag(page.read_int(NODE_TYPE_OFFSET)) != Some(NodeType::Free) {
        return Err(Error::CorruptFreeList { page_id });
    }
    Ok(PageId::from_raw(page.read_int(FREE_NEXT_OFFSET)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::leaf::LeafEntry;
    use proptest::prelude::*;

    const PAGE: usize = 4096;
    const MAX: usize = 10;

    fn leaf_with(keys: &[&str]) -> LeafNode {
        let mut leaf = LeafNode::new();
        for key in keys {
            leaf.upsert(LeafEntry::new(*key, vec![format!("{}-v", key)], format!("row-{}", key)));
        }
        leaf
    }

    #[test]
    fn test_leaf_roundtrip() {
        let mut leaf = leaf_with(&["a", "b", "c"]);
        leaf.next_leaf = PageId::new(9);
        let node = Node::new_leaf(PageId::new(4), PageId::new(2), leaf);

        let mut page = Page::new(PAGE);
        node.encode(&mut page, MAX).unwrap();
        assert_eq!(page.read_int(NODE_TYPE_OFFSET), 1);
        assert_eq!(page.read_int(KEY_COUNT_OFFSET), 3);
        assert_eq!(page.read_int(NEXT_LEAF_OFFSET), 9);

        let decoded = Node::decode(PageId::new(4), &page, MAX).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_internal_roundtrip_and_unused_slots() {
        let internal = InternalNode::new(
            vec!["m".to_string()],
            vec![PageId::new(1), PageId::new(2)],
        );
        let node = Node::new_internal(PageId::new(3), PageId::INVALID, internal);

        let mut page = Page::new(PAGE);
        node.encode(&mut page, MAX).unwrap();

        assert_eq!(page.read_int(NODE_TYPE_OFFSET), 0);
        assert_eq!(page.read_int(PARENT_OFFSET), -1);
        // Unused child slots hold -1.
        let children_at = INTERNAL_HEADER_SIZE + MAX * 64;
        assert_eq!(page.read_int(children_at + 2 * 4), -1);
        assert_eq!(page.read_int(children_at + MAX * 4), -1);

        assert_eq!(Node::decode(PageId::new(3), &page, MAX).unwrap(), node);
    }

    #[test]
    fn test_encode_overflow_leaves_page_untouched() {
        let keys: Vec<String> = (0..11).map(|i| format!("k{:02}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let node = Node::new_leaf(PageId::new(0), PageId::INVALID, leaf_with(&refs));

        let mut page = Page::new(PAGE);
        page.write_int(0, 77).unwrap();

        assert!(matches!(
            node.encode(&mut page, MAX),
            Err(Error::NodeOverflow { key_count: 11, .. })
        ));
        assert_eq!(page.read_int(0), 77);
    }

    #[test]
    fn test_leaf_page_overflow() {
        let mut leaf = LeafNode::new();
        for i in 0..3 {
            let values = (0..8).map(|v| format!("value-{}", v)).collect();
            leaf.upsert(LeafEntry::new(format!("k{}", i), values, "r"));
        }
        let node = Node::new_leaf(PageId::new(0), PageId::INVALID, leaf);

        let mut page = Page::new(1024);
        assert!(matches!(
            node.encode(&mut page, MAX),
            Err(Error::PageOverflow { page_size: 1024, .. })
        ));
    }

    #[test]
    fn test_unknown_tag() {
        let mut page = Page::new(PAGE);
        page.write_int(NODE_TYPE_OFFSET, 7).unwrap();
        assert!(matches!(
            Node::decode(PageId::new(5), &page, MAX),
            Err(Error::UnknownNodeType { tag: 7, .. })
        ));
    }

    #[test]
    fn test_free_page_is_not_a_node() {
        let mut page = Page::new(PAGE);
        encode_free(&mut page, PageId::new(8)).unwrap();

        assert!(matches!(
            Node::decode(PageId::new(5), &page, MAX),
            Err(Error::UnknownNodeType { tag: 2, .. })
        ));
        assert_eq!(decode_free(PageId::new(5), &page).unwrap(), PageId::new(8));
    }

    #[test]
    fn test_decode_free_rejects_node_page() {
        let mut page = Page::new(PAGE);
        Node::new_leaf(PageId::new(1), PageId::INVALID, LeafNode::new())
            .encode(&mut page, MAX)
            .unwrap();
        assert!(matches!(
            decode_free(PageId::new(1), &page),
            Err(Error::CorruptFreeList { .. })
        ));
    }

    #[test]
    fn test_write_parent_in_place() {
        let node = Node::new_leaf(PageId::new(1), PageId::new(2), leaf_with(&["x"]));
        let mut page = Page::new(PAGE);
        node.encode(&mut page, MAX).unwrap();

        write_parent(&mut page, PageId::new(40)).unwrap();
        assert_eq!(read_parent(&page), PageId::new(40));

        let decoded = Node::decode(PageId::new(1), &page, MAX).unwrap();
        assert_eq!(decoded.parent_page_id, PageId::new(40));
        assert_eq!(decoded.kind, node.kind);
    }

    #[test]
    fn test_full_and_underflow() {
        let node = Node::new_leaf(PageId::new(0), PageId::INVALID, leaf_with(&["a", "b", "c", "d"]));
        assert!(!node.is_full(MAX));
        assert!(node.is_underflow(MAX));
        assert!(node.is_full(4));
        assert!(!node.is_underflow(8));
    }

    #[test]
    fn test_negative_key_count_is_corrupt() {
        let mut page = Page::new(PAGE);
        page.write_int(NODE_TYPE_OFFSET, 1).unwrap();
        page.write_int(KEY_COUNT_OFFSET, -3).unwrap();
        assert!(matches!(
            Node::decode(PageId::new(0), &page, MAX),
            Err(Error::CorruptNode { .. })
        ));
    }

    fn slot_string() -> impl Strategy<Value = String> {
        "[a-z0-9_]{0,60}"
    }

    proptest! {
        #[test]
        fn prop_leaf_codec_roundtrip(
            entries in prop::collection::btree_map(
                "[a-z0-9]{1,20}",
                (prop::collection::vec(slot_string(), 0..4), slot_string()),
                0..8,
            ),
            parent in prop::option::of(0u32..1000),
            next in prop::option::of(0u32..1000),
        ) {
            let mut leaf = LeafNode::new();
            for (key, (values, row_id)) in entries {
                leaf.upsert(LeafEntry::new(key, values, row_id));
            }
            leaf.next_leaf = next.map(PageId::new).unwrap_or(PageId::INVALID);
            let node = Node::new_leaf(
                PageId::new(1),
                parent.map(PageId::new).unwrap_or(PageId::INVALID),
                leaf,
            );

            let mut page = Page::new(8192);
            node.encode(&mut page, 20).unwrap();
            prop_assert_eq!(Node::decode(PageId::new(1), &page, 20).unwrap(), node);
        }

        #[test]
        fn prop_internal_codec_roundtrip(
            keys in prop::collection::btree_set("[a-z0-9]{1,60}", 1..10),
            seed in 0u32..10_000,
        ) {
            let keys: Vec<String> = keys.into_iter().collect();
            let children = (0..=keys.len() as u32).map(|i| PageId::new(seed + i)).collect();
            let node = Node::new_internal(
                PageId::new(0),
                PageId::new(seed),
                InternalNode::new(keys, children),
            );

            let mut page = Page::new(PAGE);
            node.encode(&mut page, MAX).unwrap();
            prop_assert_eq!(Node::decode(PageId::new(0), &page, MAX).unwrap(), node);
        }
    }
}
