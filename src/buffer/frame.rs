//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the bookkeeping the pool needs:
//! - Which page is resident (if any)
//! - Pin count gating eviction
//! - Dirty flag for write-back

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// The pool allocates a fixed number of frames up front, each sized to
/// the data file's page size.
///
/// # Dirty Tracking
/// A page is dirty if either the frame flag or the page's own flag is
/// set. Typed writes set the page flag; [`Frame::mark_dirty`] sets the
/// frame flag for callers that release a page with `mark_dirty = true`.
pub struct Frame {
    page: RwLock<Page>,
    page_id: Mutex<Option<PageId>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create an empty frame holding a zeroed page of `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: RwLock::new(Page::new(page_size)),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access
    // ========================================================================

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Write latch without blocking, `None` if a guard holds the page.
    #[inline]
    pub fn try_page_mut(&self) -> Option<RwLockWriteGuard<'_, Page>> {
        self.page.try_write()
    }

    // ========================================================================
    // Page id
    // ========================================================================

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// Unpinning an unpinned frame is a no-op that returns 0, so a stray
    /// release can never wrap the counter.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self
            .pin_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        match prev {
            Ok(old) => old - 1,
            Err(_) => 0,
        }
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Frame-level dirty flag only. See [`Frame::needs_flush`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Whether the resident page differs from disk.
    ///
    /// Takes the page read latch, so it must not be called while the
    /// caller holds a write guard on this frame.
    pub fn needs_flush(&self) -> bool {
        self.is_dirty() || self.page().is_dirty()
    }

    // ========================================================================
    // Frame state
    // ========================================================================

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }

    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.page_id().is_some() && !self.is_pinned()
    }

    /// Reset the frame to empty state for reuse.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}
