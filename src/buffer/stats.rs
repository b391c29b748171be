//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the buffer pool.
///
/// All counters are atomic and use `Ordering::Relaxed`: only atomicity
/// matters, not ordering between counters.
///
/// `page_accesses` counts every fetch, hit or miss. The tree reports it
/// as its page access count and it can be reset independently of the
/// other counters.
///
/// # Example
/// ```
/// use bplusdb::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct BufferPoolStats {
    /// Number of fetches served from a resident frame.
    pub cache_hits: AtomicU64,

    /// Number of fetches that had to go to disk.
    pub cache_misses: AtomicU64,

    pub evictions: AtomicU64,

    pub pages_read: AtomicU64,

    pub pages_written: AtomicU64,

    /// Every fetch, hit or miss.
    pub page_accesses: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            pages_read: AtomicU64::new(0),
            pages_written: AtomicU64::new(0),
            page_accesses: AtomicU64::new(0),
        }
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    #[inline]
    pub fn page_accesses(&self) -> u64 {
        self.page_accesses.load(Ordering::Relaxed)
    }

    /// Zero the page access counter only.
    pub fn reset_page_accesses(&self) {
        self.page_accesses.store(0, Ordering::Relaxed);
    }

    /// Get a non-atomic copy for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            page_accesses: self.page_accesses.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.pages_read.store(0, Ordering::Relaxed);
        self.pages_written.store(0, Ordering::Relaxed);
        self.page_accesses.store(0, Ordering::Relaxed);
    }
}

impl Default for BufferPoolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of buffer pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub page_accesses: u64,
}

impl StatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ accesses: {}, hits: {}, misses: {}, evictions: {}, written: {}, hit_rate: {:.2}% }}",
            self.page_accesses,
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(7, Ordering::Relaxed);
        stats.cache_misses.fetch_add(3, Ordering::Relaxed);

        assert_eq!(stats.hit_rate(), 0.7);
        assert_eq!(stats.snapshot().cache_hits, 7);
    }

    #[test]
    fn test_reset_page_accesses_only() {
        let stats = BufferPoolStats::new();
        stats.page_accesses.fetch_add(12, Ordering::Relaxed);
        stats.cache_hits.fetch_add(4, Ordering::Relaxed);

        stats.reset_page_accesses();

        assert_eq!(stats.page_accesses(), 0);
        assert_eq!(stats.snapshot().cache_hits, 4);
    }

    #[test]
    fn test_reset_all() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(100, Ordering::Relaxed);
        stats.page_accesses.fetch_add(100, Ordering::Relaxed);

        stats.reset();

        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_display() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(80, Ordering::Relaxed);
        stats.cache_misses.fetch_add(20, Ordering::Relaxed);
        stats.page_accesses.fetch_add(100, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());
        assert!(display.contains("accesses: 100"));
        assert!(display.contains("hits: 80"));
        assert!(display.contains("80.00%"));
    }
}
