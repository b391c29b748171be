//! Full-tree traversals: structural validation and statistics.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::common::{Error, PageId, Result};

use super::node::{Node, NodeKind};
use super::stats::{Statistics, ValidationReport};
use super::tree::{checked_child, BPlusTree};

/// What validation keeps of each leaf to check the chain afterwards.
struct LeafSummary {
    page_id: PageId,
    next_leaf: PageId,
    first_key: Option<String>,
    last_key: Option<String>,
}

impl BPlusTree {
    /// Walk every node depth first, children left to right.
    ///
    /// `visit` gets each node with the parent that points at it and its
    /// depth, the root being depth 1.
    ///
    /// # Errors
    /// Aborts on a revisited page, a path deeper than `max_depth`, or a
    /// child pointer that is INVALID or points back at its parent.
    fn walk(&self, mut visit: impl FnMut(&Node, PageId, usize)) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let max_depth = self.options.max_depth;
        let mut visited = HashSet::new();
        let mut stack = vec![(self.meta.root_page_id, PageId::INVALID, 1usize)];

        while let Some((page_id, parent, depth)) = stack.pop() {
            if depth > max_depth {
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
            if let NodeKind::Internal(internal) = &node.kind {
                for index in (0..internal.children.len()).rev() {
                    let child = checked_child(page_id, internal, index)?;
                    stack.push((child, page_id, depth + 1));
                }
            }
            visit(&node, parent, depth);
        }
        Ok(())
    }

    /// Check the whole tree.
    ///
    /// Cycles, self references, invalid children and excessive depth are
    /// errors. Parent pointer mismatches, broken leaf links and keys out
    /// of order are logged and counted in the report.
    pub fn validate(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let mut leaves = Vec::new();

        self.walk(|node, parent, depth| {
            report.node_count += 1;
            report.height = report.height.max(depth);

            if node.parent_page_id != parent {
                warn!(
                    page_id = %node.page_id,
                    stored = %node.parent_page_id,
                    expected = %parent,
                    "btree.validate.parent_mismatch"
                );
                report.parent_mismatches += 1;
            }

            match &node.kind {
                NodeKind::Leaf(leaf) => {
                    report.leaf_count += 1;
                    report.key_count += leaf.len();
                    if !is_sorted(leaf.keys()) {
                        warn!(page_id = %node.page_id, "btree.validate.leaf_unsorted");
                        report.chain_violations += 1;
                    }
                    leaves.push(LeafSummary {
                        page_id: node.page_id,
                        next_leaf: leaf.next_leaf,
                        first_key: leaf.first_key().map(str::to_string),
                        last_key: leaf.last_key().map(str::to_string),
                    });
                }
                NodeKind::Internal(internal) => {
                    report.internal_count += 1;
                    if !is_sorted(internal.keys.iter().map(String::as_str)) {
                        warn!(page_id = %node.page_id, "btree.validate.internal_unsorted");
                        report.chain_violations += 1;
                    }
                }
            }
        })?;

        for pair in leaves.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.next_leaf != b.page_id {
                warn!(
                    page_id = %a.page_id,
                    next = %a.next_leaf,
                    expected = %b.page_id,
                    "btree.validate.chain_link"
                );
                report.chain_violations += 1;
            }
            if let (Some(last), Some(first)) = (&a.last_key, &b.first_key) {
                if last >= first {
                    warn!(
                        left = %a.page_id,
                        right = %b.page_id,
                        %last,
                        %first,
                        "btree.validate.chain_order"
                    );
                    report.chain_violations += 1;
                }
            }
        }
        if let Some(last) = leaves.last() {
            if last.next_leaf.is_valid() {
                warn!(page_id = %last.page_id, next = %last.next_leaf, "btree.validate.chain_tail");
                report.chain_violations += 1;
            }
        }

        debug!(
            nodes = report.node_count,
            leaves = report.leaf_count,
            keys = report.key_count,
            height = report.height,
            "btree.validate"
        );
        Ok(report)
    }

    /// Fill rate, height and node count from a full traversal, plus the
    /// split/merge counters and buffer pool fetches.
    ///
    /// The fetch count is read before the traversal, so it does not
    /// include the traversal's own fetches.
    pub fn statistics(&self) -> Result<Statistics> {
        let page_access_count = self.bpm.stats().page_accesses();
        let max_keys = self.capacity.max_keys();

        let mut height = 0;
        let mut node_count = 0;
        let mut used = 0usize;
        self.walk(|node, _, depth| {
            node_count += 1;
            height = height.max(depth);
            used += node.key_count();
        })?;

        let total = node_count * max_keys;
        let fill_rate = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        };

        Ok(Statistics {
            fill_rate,
            height,
            node_count,
            split_count: self.meta.split_count,
            merge_count: self.meta.merge_count,
            page_access_count,
        })
    }
}

fn is_sorted<'a>(mut keys: impl Iterator<Item = &'a str>) -> bool {
    let mut prev = match keys.next() {
        Some(key) => key,
        None => return true,
    };
    for key in keys {
        if key <= prev {
            return false;
        }
        prev = key;
    }
    true
}
