//! Open-time configuration for a tree.

use crate::common::config::{
    DEFAULT_MAX_DEPTH, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
use crate::common::{Error, Result};

use super::capacity::CapacityOptions;

/// Settings used when opening a [`BPlusTree`](super::BPlusTree).
///
/// # Example
/// ```
/// use bplusdb::index::btree::TreeOptions;
///
/// let options = TreeOptions::default()
///     .with_page_size(8192)
///     .with_pool_size(32);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Page size in bytes. Must match the size recorded in an existing file.
    pub page_size: usize,
    /// Number of buffer pool frames.
    pub pool_size: usize,
    /// Deepest root-to-leaf path any traversal accepts.
    pub max_depth: usize,
    pub capacity: CapacityOptions,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            capacity: CapacityOptions::default(),
        }
    }
}

impl TreeOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_capacity(mut self, capacity: CapacityOptions) -> Self {
        self.capacity = capacity;
        self
    }

    /// # Errors
    /// - [`Error::InvalidPageSize`] outside `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`
    /// - [`Error::InvalidConfig`] for a zero pool size or depth, or bad
    ///   capacity options
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidPageSize {
                size: self.page_size,
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max_depth must be > 0".into()));
        }
        self.capacity.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = TreeOptions::default();
        assert_eq!(options.page_size, 4096);
        assert_eq!(options.pool_size, 100);
        assert_eq!(options.max_depth, 50);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        for size in [0, 512, MIN_PAGE_SIZE - 1, MAX_PAGE_SIZE + 1] {
            assert!(matches!(
                TreeOptions::default().with_page_size(size).validate(),
                Err(Error::InvalidPageSize { .. })
            ));
        }
        assert!(TreeOptions::default()
            .with_page_size(MIN_PAGE_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_pool_and_depth() {
        assert!(matches!(
            TreeOptions::default().with_pool_size(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TreeOptions::default().with_max_depth(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
