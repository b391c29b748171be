//! Node fan-out derived from the page size.

use crate::common::config::SLOT_SIZE;
use crate::common::{Error, Result};

use super::node::{INTERNAL_HEADER_SIZE, LEAF_HEADER_SIZE};

/// Inputs to the fan-out estimate.
///
/// A leaf entry's size depends on how many values it carries, which is
/// unknown until insert time. The estimate assumes
/// `expected_values_per_entry` values and then leaves
/// `safety_margin_percent` of headroom. Leaves still check their real
/// encoded size on every insert, so a low estimate costs fill rate and a
/// high one costs extra byte-driven splits, never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityOptions {
    pub expected_values_per_entry: usize,
    pub safety_margin_percent: usize,
    pub min_keys: usize,
    pub max_keys: usize,
}

impl Default for CapacityOptions {
    fn default() -> Self {
        Self {
            expected_values_per_entry: 3,
            safety_margin_percent: 10,
            min_keys: 3,
            max_keys: 20,
        }
    }
}

impl CapacityOptions {
    pub fn validate(&self) -> Result<()> {
        if self.safety_margin_percent >= 100 {
            return Err(Error::InvalidConfig(format!(
                "safety margin must be below 100%, got {}%",
                self.safety_margin_percent
            )));
        }
        // Fewer than three keys per node cannot split into two non-empty
        // halves plus a promoted separator.
        if self.min_keys < 3 {
            return Err(Error::InvalidConfig(format!(
                "min_keys must be at least 3, got {}",
                self.min_keys
            )));
        }
        if self.min_keys > self.max_keys {
            return Err(Error::InvalidConfig(format!(
                "min_keys {} exceeds max_keys {}",
                self.min_keys, self.max_keys
            )));
        }
        Ok(())
    }

    /// Estimated encoded size of one leaf entry.
    pub fn estimated_entry_size(&self) -> usize {
        SLOT_SIZE * 2 + 4 + SLOT_SIZE * self.expected_values_per_entry
    }
}

/// Per-tree node capacity, fixed at open time.
///
/// # Example
/// ```
/// use bplusdb::index::btree::{CapacityOptions, NodeCapacity};
///
/// let cap = NodeCapacity::derive(4096, &CapacityOptions::default()).unwrap();
/// assert_eq!(cap.max_keys(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCapacity {
    max_keys: usize,
    page_size: usize,
}

impl NodeCapacity {
    /// Derive `max_keys` for `page_size`.
    ///
    /// 1. usable leaf bytes / estimated entry size
    /// 2. minus the safety margin
    /// 3. clamped to `[min_keys, max_keys]`
    /// 4. clamped to what an internal node can lay out in one page
    pub fn derive(page_size: usize, options: &CapacityOptions) -> Result<Self> {
        options.validate()?;

        let usable = page_size.saturating_sub(LEAF_HEADER_SIZE);
        let estimate = usable / options.estimated_entry_size();
        let with_margin = estimate * (100 - options.safety_margin_percent) / 100;
        let clamped = with_margin.clamp(options.min_keys, options.max_keys);

        let internal_limit = Self::internal_limit(page_size);
        let max_keys = clamped.min(internal_limit);
        if max_keys < options.min_keys {
            return Err(Error::InvalidConfig(format!(
                "page size {} fits only {} separator keys, need {}",
                page_size, internal_limit, options.min_keys
            )));
        }

        Ok(Self {
            max_keys,
            page_size,
        })
    }

    /// Largest key count whose internal layout (key slots plus one more
    /// child pointer) fits in `page_size`.
    pub fn internal_limit(page_size: usize) -> usize {
        page_size.saturating_sub(INTERNAL_HEADER_SIZE + 4) / (SLOT_SIZE + 4)
    }

    #[inline]
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Nodes with fewer keys than this are underflowing.
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.max_keys / 2
    }

    /// Largest leaf entry accepted, so that any two entries share a page.
    #[inline]
    pub fn max_entry_size(&self) -> usize {
        (self.page_size - LEAF_HEADER_SIZE) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};

    #[test]
    fn test_default_4k() {
        let opts = CapacityOptions::default();
        assert_eq!(opts.estimated_entry_size(), 324);

        // 4080 / 324 = 12, minus 10% = 10
        let cap = NodeCapacity::derive(4096, &opts).unwrap();
        assert_eq!(cap.max_keys(), 10);
        assert_eq!(cap.min_keys(), 5);
        assert_eq!(cap.max_entry_size(), 2040);
    }

    #[test]
    fn test_small_page_clamps_to_min() {
        let cap = NodeCapacity::derive(MIN_PAGE_SIZE, &CapacityOptions::default()).unwrap();
        assert_eq!(cap.max_keys(), 3);
    }

    #[test]
    fn test_large_page_clamps_to_max() {
        let cap = NodeCapacity::derive(MAX_PAGE_SIZE, &CapacityOptions::default()).unwrap();
        assert_eq!(cap.max_keys(), 20);
    }

    #[test]
    fn test_internal_node_always_fits() {
        let opts = CapacityOptions {
            expected_values_per_entry: 0,
            safety_margin_percent: 0,
            min_keys: 3,
            max_keys: 1000,
        };

        for page_size in [MIN_PAGE_SIZE, 4096, 8192, MAX_PAGE_SIZE] {
            let cap = NodeCapacity::derive(page_size, &opts).unwrap();
            assert!(cap.max_keys() <= NodeCapacity::internal_limit(page_size));

            let bytes = INTERNAL_HEADER_SIZE
                + cap.max_keys() * SLOT_SIZE
                + (cap.max_keys() + 1) * 4;
            assert!(bytes <= page_size, "page size {}", page_size);
        }
    }

    #[test]
    fn test_invalid_options() {
        let bad_margin = CapacityOptions {
            safety_margin_percent: 100,
            ..CapacityOptions::default()
        };
        assert!(matches!(
            NodeCapacity::derive(4096, &bad_margin),
            Err(Error::InvalidConfig(_))
        ));

        let bad_min = CapacityOptions {
            min_keys: 2,
            ..CapacityOptions::default()
        };
        assert!(bad_min.validate().is_err());

        let inverted = CapacityOptions {
            min_keys: 10,
            max_keys: 5,
            ..CapacityOptions::default()
        };
        assert!(inverted.validate().is_err());
    }
}
