//! Reports produced by full-tree traversals.

use std::fmt;

/// Shape and activity summary returned by
/// [`BPlusTree::statistics`](super::BPlusTree::statistics).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    /// Used key slots over total key slots, 0.0 for an empty tree.
    pub fill_rate: f64,
    /// Nodes on the root-to-leaf path. 0 for an empty tree.
    pub height: usize,
    pub node_count: usize,
    pub split_count: u32,
    pub merge_count: u32,
    /// Buffer pool fetches since open or the last reset.
    pub page_access_count: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Statistics {{ fill_rate: {:.2}%, height: {}, nodes: {}, splits: {}, merges: {}, page_accesses: {} }}",
            self.fill_rate * 100.0,
            self.height,
            self.node_count,
            self.split_count,
            self.merge_count,
            self.page_access_count
        )
    }
}

/// Result of a structural check.
///
/// Fatal problems (cycles, self references, depth overflow) abort the
/// check with an error; what is counted here is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub node_count: usize,
    pub leaf_count: usize,
    pub internal_count: usize,
    pub key_count: usize,
    pub height: usize,
    /// Nodes whose stored parent differs from the node that points at them.
    pub parent_mismatches: usize,
    /// Leaf-chain links or key orderings that disagree with the tree.
    pub chain_violations: usize,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.parent_mismatches == 0 && self.chain_violations == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_display() {
        let stats = Statistics {
            fill_rate: 0.5,
            height: 2,
            node_count: 3,
            split_count: 2,
            merge_count: 0,
            page_access_count: 17,
        };
        let display = stats.to_string();
        assert!(display.contains("fill_rate: 50.00%"));
        assert!(display.contains("page_accesses: 17"));
    }

    #[test]
    fn test_report_consistency() {
        let mut report = ValidationReport::default();
        assert!(report.is_consistent());

        report.parent_mismatches = 1;
        assert!(!report.is_consistent());
    }
}
