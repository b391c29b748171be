//! Buffer Pool Manager Tests
//!
//! Pin, eviction and latch behavior exercised through the public API,
//! in the spirit of BusTub's buffer_pool_manager_test.cpp.

use bplusdb::buffer::BufferPoolManager;
use bplusdb::common::PageId;
use bplusdb::storage::DiskManager;
use bplusdb::Error;
use tempfile::tempdir;

const FRAMES: usize = 10;
const PAGE: usize = 1024;
const SLOT: usize = 64;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::open(&path, PAGE).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

// ============================================================================
// VeryBasicTest
// ============================================================================

#[test]
fn test_very_basic() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let pid = PageId::new(0);
    let str_data = "Hello, world!";

    {
        let mut guard = bpm.fetch_page_write(pid).unwrap();
        guard.write_string(0, str_data, SLOT).unwrap();
        assert_eq!(guard.read_string(0, SLOT), str_data);
    }

    {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.read_string(0, SLOT), str_data);
    }

    {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.read_string(0, SLOT), str_data);
    }

    assert_eq!(bpm.pin_count(pid), Some(0));
}

// ============================================================================
// PagePinEasyTest
// ============================================================================

#[test]
fn test_page_pin_easy() {
    let (bpm, _dir) = create_bpm(2);

    let pageid0 = PageId::new(0);
    let pageid1 = PageId::new(1);
    let temp_page_id1 = PageId::new(2);
    let temp_page_id2 = PageId::new(3);

    {
        let mut page0 = bpm.fetch_page_write(pageid0).unwrap();
        page0.write_string(0, "page0", SLOT).unwrap();
        let mut page1 = bpm.fetch_page_write(pageid1).unwrap();
        page1.write_string(0, "page1", SLOT).unwrap();

        assert_eq!(bpm.pin_count(pageid0), Some(1));
        assert_eq!(bpm.pin_count(pageid1), Some(1));

        // Both frames pinned.
        assert!(matches!(
            bpm.fetch_page_read(temp_page_id1),
            Err(Error::NoFreeFrames)
        ));
        assert!(matches!(
            bpm.fetch_page_write(temp_page_id2),
            Err(Error::NoFreeFrames)
        ));

        drop(page0);
        assert_eq!(bpm.pin_count(pageid0), Some(0));
        drop(page1);
        assert_eq!(bpm.pin_count(pageid1), Some(0));
    }

    {
        drop(bpm.fetch_page_read(temp_page_id1).unwrap());
        drop(bpm.fetch_page_write(temp_page_id2).unwrap());

        // Both originals were evicted.
        assert!(bpm.pin_count(pageid0).is_none());
        assert!(bpm.pin_count(pageid1).is_none());
    }

    {
        let mut page0 = bpm.fetch_page_write(pageid0).unwrap();
        assert_eq!(page0.read_string(0, SLOT), "page0");
        page0.write_string(0, "page0updated", SLOT).unwrap();

        let mut page1 = bpm.fetch_page_write(pageid1).unwrap();
        assert_eq!(page1.read_string(0, SLOT), "page1");
        page1.write_string(0, "page1updated", SLOT).unwrap();

        assert_eq!(bpm.pin_count(pageid0), Some(1));
        assert_eq!(bpm.pin_count(pageid1), Some(1));
    }

    assert_eq!(bpm.pin_count(pageid0), Some(0));
    assert_eq!(bpm.pin_count(pageid1), Some(0));

    {
        let page0 = bpm.fetch_page_read(pageid0).unwrap();
        assert_eq!(page0.read_string(0, SLOT), "page0updated");
        let page1 = bpm.fetch_page_read(pageid1).unwrap();
        assert_eq!(page1.read_string(0, SLOT), "page1updated");
    }
}

// ============================================================================
// PagePinMediumTest
// ============================================================================

#[test]
fn test_page_pin_medium() {
    let (bpm, _dir) = create_bpm(FRAMES);

    // Fill every frame and keep them pinned.
    let mut guards = Vec::new();
    for i in 0..FRAMES as u32 {
        let mut guard = bpm.fetch_page_write(PageId::new(i)).unwrap();
        guard.write_int(0, i as i32).unwrap();
        guards.push(guard);
    }
    assert_eq!(bpm.total_pins(), FRAMES as u32);

    for i in FRAMES as u32..FRAMES as u32 + 5 {
        assert!(matches!(
            bpm.fetch_page_read(PageId::new(i)),
            Err(Error::NoFreeFrames)
        ));
    }

    // Release half; the new pages take their frames.
    guards.truncate(FRAMES / 2);
    for i in FRAMES as u32..FRAMES as u32 + 5 {
        drop(bpm.fetch_page_read(PageId::new(i)).unwrap());
    }

    // Pinned pages stayed resident.
    for i in 0..(FRAMES / 2) as u32 {
        assert_eq!(bpm.pin_count(PageId::new(i)), Some(1));
    }
    drop(guards);

    // Evicted pages come back from disk.
    for i in 0..FRAMES as u32 {
        let guard = bpm.fetch_page_read(PageId::new(i)).unwrap();
        assert_eq!(guard.read_int(0), i as i32);
    }
}

// ============================================================================
// Pin counting
// ============================================================================

#[test]
fn test_read_guards_share_pin() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let pid = PageId::new(7);

    let a = bpm.fetch_page_read(pid).unwrap();
    let b = bpm.fetch_page_read(pid).unwrap();
    assert_eq!(bpm.pin_count(pid), Some(2));

    drop(a);
    assert_eq!(bpm.pin_count(pid), Some(1));
    drop(b);
    assert_eq!(bpm.pin_count(pid), Some(0));
}

#[test]
fn test_manual_unpin_saturates() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let pid = PageId::new(1);

    drop(bpm.fetch_page_read(pid).unwrap());
    bpm.unpin_page(pid, false);
    bpm.unpin_page(pid, false);
    assert_eq!(bpm.pin_count(pid), Some(0));

    // Unpinning a page that is not resident is a no-op.
    bpm.unpin_page(PageId::new(500), true);
    assert!(!bpm.contains_page(PageId::new(500)));
}

// ============================================================================
// Eviction order
// ============================================================================

#[test]
fn test_evicts_least_recently_used() {
    let (bpm, _dir) = create_bpm(3);

    for i in 0..3 {
        drop(bpm.fetch_page_read(PageId::new(i)).unwrap());
    }
    // Touch page 0 so page 1 becomes the oldest.
    drop(bpm.fetch_page_read(PageId::new(0)).unwrap());

    drop(bpm.fetch_page_read(PageId::new(3)).unwrap());

    assert!(bpm.contains_page(PageId::new(0)));
    assert!(!bpm.contains_page(PageId::new(1)));
    assert!(bpm.contains_page(PageId::new(2)));
    assert!(bpm.contains_page(PageId::new(3)));
}

#[test]
fn test_pinned_page_is_skipped_by_eviction() {
    let (bpm, _dir) = create_bpm(2);

    let held = bpm.fetch_page_read(PageId::new(0)).unwrap();
    drop(bpm.fetch_page_read(PageId::new(1)).unwrap());

    // Page 0 is older but pinned, so page 1 goes.
    drop(bpm.fetch_page_read(PageId::new(2)).unwrap());
    assert!(bpm.contains_page(PageId::new(0)));
    assert!(!bpm.contains_page(PageId::new(1)));
    drop(held);
}

// ============================================================================
// Dirty tracking and flushing
// ============================================================================

#[test]
fn test_read_guard_never_dirties() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let pid = PageId::new(0);

    drop(bpm.fetch_page_read(pid).unwrap());
    bpm.flush_all_pages().unwrap();
    assert_eq!(bpm.stats().snapshot().pages_written, 0);

    {
        let mut guard = bpm.fetch_page_write(pid).unwrap();
        guard.write_int(0, 1).unwrap();
    }
    bpm.flush_all_pages().unwrap();
    assert_eq!(bpm.stats().snapshot().pages_written, 1);

    // Already clean.
    bpm.flush_page(pid).unwrap();
    assert_eq!(bpm.stats().snapshot().pages_written, 1);
}

#[test]
fn test_flush_latched_page() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let pid = PageId::new(0);

    let mut guard = bpm.fetch_page_write(pid).unwrap();
    guard.write_int(0, 5).unwrap();

    assert!(matches!(bpm.flush_page(pid), Err(Error::PageLatched(p)) if p == pid));
    drop(guard);
    assert!(bpm.flush_page(pid).is_ok());
}

#[test]
fn test_invalid_page_id() {
    let (bpm, _dir) = create_bpm(FRAMES);
    assert!(matches!(
        bpm.fetch_page_write(PageId::INVALID),
        Err(Error::InvalidPageId(_))
    ));
    assert_eq!(bpm.free_frame_count(), FRAMES);
}
