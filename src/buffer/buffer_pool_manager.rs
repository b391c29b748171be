//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - LRU eviction that never touches a pinned page
//! - Dirty page write-back on eviction and flush

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a fixed pool of frames caching pages of one data file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pin Contract
/// Every successful fetch returns a guard holding one pin. Dropping the
/// guard releases it. A page with a nonzero pin count is never evicted;
/// if every resident page is pinned when a miss needs a frame, the fetch
/// fails with [`Error::NoFreeFrames`].
///
/// # Latching
/// Guards hold the frame's page latch for their whole lifetime. Fetching
/// the same page for writing while any guard on it is alive blocks, so
/// callers keep at most one write guard per page and drop guards before
/// fetching the page again.
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::open("tree.db", 4096)?;
/// let bpm = BufferPoolManager::new(100, dm);
///
/// {
///     let mut guard = bpm.fetch_page_write(PageId::new(0))?;
///     guard.write_int(0, 42)?;
/// } // released dirty, unpinned
///
/// let guard = bpm.fetch_page_read(PageId::new(0))?;
/// assert_eq!(guard.read_int(0), 42);
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,

    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Frames not holding any page (LIFO).
    free_list: Mutex<Vec<FrameId>>,

    replacer: Mutex<LruReplacer>,

    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,

    pool_size: usize,

    page_size: usize,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` frames over `disk_manager`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let page_size = disk_manager.page_size();
        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new(page_size)).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
            page_size,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch and pin a page for reading.
    ///
    /// On a miss the page is loaded from disk; a page that was never
    /// written reads as zeros.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the INVALID sentinel
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from loading or from flushing an evicted page
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch and pin a page for writing.
    ///
    /// # Errors
    /// Same as [`BufferPoolManager::fetch_page_read`].
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Release one pin on a resident page, optionally marking it dirty.
    ///
    /// A no-op if the page is not resident. Guards call this on drop;
    /// calling it directly while a guard on the page is alive releases
    /// that guard's pin early.
    pub fn unpin_page(&self, page_id: PageId, mark_dirty: bool) {
        let frame_id = match self.page_table.read().get(&page_id) {
            Some(&fid) => fid,
            None => return,
        };
        self.release_frame(frame_id, mark_dirty);
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a resident page to disk if it is dirty.
    ///
    /// # Errors
    /// - `Error::PageLatched` if a guard on the page is alive
    /// - I/O errors from the disk write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.read().get(&page_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Write every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };
        pages.sort_unstable();

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Metadata header
    // ========================================================================

    /// Read the data file's metadata header.
    pub fn read_metadata(&self) -> Result<Vec<u8>> {
        self.disk_manager.lock().read_metadata()
    }

    /// Overwrite the data file's metadata header.
    pub fn write_metadata(&self, metadata: &[u8]) -> Result<()> {
        self.disk_manager.lock().write_metadata(metadata)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages currently resident.
    pub fn resident_count(&self) -> usize {
        self.page_table.read().len()
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Pin count of a resident page, `None` if not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.read().get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Sum of pin counts across all frames. Zero between tree operations.
    pub fn total_pins(&self) -> u32 {
        self.frames.iter().map(Frame::pin_count).sum()
    }

    // ========================================================================
    // Internal: Called by guards on drop
    // ========================================================================

    pub(crate) fn release_frame(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }

        self.stats.page_accesses.fetch_add(1, Ordering::Relaxed);

        let hit = self.page_table.read().get(&page_id).copied();
        match hit {
            Some(frame_id) => {
                self.handle_cache_hit(frame_id);
                Ok(frame_id)
            }
            None => self.handle_cache_miss(page_id),
        }
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];

        let loaded = {
            let mut page = frame.page_mut();
            self.disk_manager.lock().read_page(page_id, &mut page)
        };
        if let Err(e) = loaded {
            frame.reset();
            self.free_list.lock().push(frame_id);
            return Err(e);
        }

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        frame.clear_dirty();
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        tracing::trace!(%page_id, %frame_id, "page loaded");
        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(Error::NoFreeFrames)?;

        let frame = &self.frames[frame_id.0];

        if let Some(old_page_id) = frame.page_id() {
            if let Err(e) = self.flush_frame(frame_id, old_page_id) {
                // Keep the page resident so its changes are not lost.
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, true);
                return Err(e);
            }

            self.page_table.write().remove(&old_page_id);
            tracing::trace!(page_id = %old_page_id, %frame_id, "page evicted");
        }

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        frame.reset();

        Ok(frame_id)
    }

    /// Write a frame to disk if it differs from disk.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        let mut page = frame.try_page_mut().ok_or(Error::PageLatched(page_id))?;
        if frame.is_dirty() || page.is_dirty() {
            self.disk_manager.lock().write_page(page_id, &mut page)?;
            frame.clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}
