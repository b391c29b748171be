//! Disk Manager - low-level file I/O for the metadata header and pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Creating or opening the data file
//! - Reading and writing the metadata header
//! - Reading and writing pages

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::METADATA_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single data file.
///
/// # File Layout
/// ```text
/// ┌──────────────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Metadata (16KB)  │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └──────────────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset: 0          16384     16384+P   ...       16384+N×P
/// ```
///
/// Page N is located at file offset `METADATA_SIZE + N × page_size`.
///
/// # Sparse Pages
/// Pages are never explicitly allocated on disk. Reading a page whose
/// region lies past the end of the file yields a zeroed page, and writing
/// one extends the file. A never-written page therefore reads as empty.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is
/// responsible for serializing access to the disk manager.
///
/// # Durability
/// All writes are followed by `fsync()`. There is no write-ahead log, so
/// this is the only durability guarantee the engine makes.
pub struct DiskManager {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl DiskManager {
    /// Open a data file, creating it with a zeroed metadata header if it
    /// doesn't exist.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !exists {
            file.write_all(&vec![0u8; METADATA_SIZE])?;
            file.sync_all()?;
            tracing::debug!(path = %path.display(), "created data file");
        }

        Ok(Self {
            file,
            path,
            page_size,
        })
    }

    /// Read a page from disk into `page`.
    ///
    /// Regions that lie past the end of the file read as zeros; a short
    /// read is zero-padded.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the INVALID sentinel
    /// - I/O errors from seek/read
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = self.page_offset(page_id)?;
        debug_assert_eq!(page.size(), self.page_size);

        read_zero_padded(&mut self.file, offset, page.as_mut_slice())?;
        page.clear_dirty();
        Ok(())
    }

    /// Write a page to disk and clear its dirty flag.
    ///
    /// Extends the file when the page's region doesn't exist yet.
    ///
    /// # Durability
    /// This method calls `fsync()` after writing.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the INVALID sentinel
    /// - I/O errors from seek/write/sync
    pub fn write_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = self.page_offset(page_id)?;
        debug_assert_eq!(page.size(), self.page_size);

        let end = offset + self.page_size as u64;
        if self.file.metadata()?.len() < end {
            self.file.set_len(end)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        page.clear_dirty();
        Ok(())
    }

    /// Read the full metadata header, zero-padded if the file is short.
    pub fn read_metadata(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; METADATA_SIZE];
        read_zero_padded(&mut self.file, 0, &mut buf)?;
        Ok(buf)
    }

    /// Overwrite the metadata header.
    ///
    /// # Panics
    /// Panics if `metadata` is larger than the header region.
    pub fn write_metadata(&mut self, metadata: &[u8]) -> Result<()> {
        assert!(
            metadata.len() <= METADATA_SIZE,
            "metadata larger than header region"
        );

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(metadata)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Page size this manager was opened with.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Path of the underlying data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the total size of the data file in bytes.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of page regions currently backed by the file.
    pub fn page_count(&self) -> Result<u64> {
        let len = self.file_size()?;
        Ok(len.saturating_sub(METADATA_SIZE as u64) / self.page_size as u64)
    }

    fn page_offset(&self, page_id: PageId) -> Result<u64> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        Ok(METADATA_SIZE as u64 + page_id.0 as u64 * self.page_size as u64)
    }
}

/// Fill `buf` from `offset`, leaving zeros wherever the file ends early.
fn read_zero_padded(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    buf.fill(0);

    let len = file.metadata()?.len();
    if offset >= len {
        return Ok(());
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 4096;

    #[test]
    fn test_open_creates_zeroed_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::open(&path, PAGE).unwrap();
        assert_eq!(dm.file_size().unwrap(), METADATA_SIZE as u64);
        assert_eq!(dm.page_count().unwrap(), 0);

        let meta = dm.read_metadata().unwrap();
        assert_eq!(meta.len(), METADATA_SIZE);
        assert!(meta.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_open_existing_keeps_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open(&path, PAGE).unwrap();
            dm.write_metadata(&[1, 2, 3, 4]).unwrap();
        }

        let mut dm = DiskManager::open(&path, PAGE).unwrap();
        let meta = dm.read_metadata().unwrap();
        assert_eq!(&meta[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_read_missing_page_is_zeroed() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("test.db"), PAGE).unwrap();

        let mut page = Page::new(PAGE);
        page.as_mut_slice()[0] = 0xAA;
        dm.read_page(PageId::new(10), &mut page).unwrap();

        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_extends_file_and_clears_dirty() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("test.db"), PAGE).unwrap();

        let mut page = Page::new(PAGE);
        page.write_int(0, 0x42).unwrap();
        assert!(page.is_dirty());

        dm.write_page(PageId::new(3), &mut page).unwrap();
        assert!(!page.is_dirty());
        assert_eq!(
            dm.file_size().unwrap(),
            (METADATA_SIZE + 4 * PAGE) as u64
        );

        // Pages below the written one exist but read as zeros.
        let mut hole = Page::new(PAGE);
        dm.read_page(PageId::new(1), &mut hole).unwrap();
        assert_eq!(hole.read_int(0), 0);
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("test.db"), PAGE).unwrap();

        let mut page = Page::new(PAGE);
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[100] = 0xCD;
        page.as_mut_slice()[PAGE - 1] = 0xEF;
        dm.write_page(PageId::new(0), &mut page).unwrap();

        let mut read = Page::new(PAGE);
        dm.read_page(PageId::new(0), &mut read).unwrap();
        assert_eq!(read.as_slice()[0], 0xAB);
        assert_eq!(read.as_slice()[100], 0xCD);
        assert_eq!(read.as_slice()[PAGE - 1], 0xEF);
    }

    #[test]
    fn test_page_does_not_clobber_metadata() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("test.db"), PAGE).unwrap();

        dm.write_metadata(&[9, 9, 9, 9]).unwrap();
        let mut page = Page::new(PAGE);
        page.as_mut_slice().fill(0x11);
        dm.write_page(PageId::new(0), &mut page).unwrap();

        let meta = dm.read_metadata().unwrap();
        assert_eq!(&meta[..4], &[9, 9, 9, 9]);
        assert_eq!(meta[METADATA_SIZE - 1], 0);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open(&path, PAGE).unwrap();
            let mut page = Page::new(PAGE);
            page.write_int(0, 0x42).unwrap();
            dm.write_page(PageId::new(2), &mut page).unwrap();
        }

        let mut dm = DiskManager::open(&path, PAGE).unwrap();
        assert_eq!(dm.page_count().unwrap(), 3);

        let mut page = Page::new(PAGE);
        dm.read_page(PageId::new(2), &mut page).unwrap();
        assert_eq!(page.read_int(0), 0x42);
    }

    #[test]
    fn test_invalid_page_id() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("test.db"), PAGE).unwrap();

        let mut page = Page::new(PAGE);
        assert!(matches!(
            dm.read_page(PageId::INVALID, &mut page),
            Err(Error::InvalidPageId(_))
        ));
        assert!(matches!(
            dm.write_page(PageId::INVALID, &mut page),
            Err(Error::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_short_metadata_is_zero_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.db");
        std::fs::write(&path, [0x12u8, 0x34]).unwrap();

        let mut dm = DiskManager::open(&path, PAGE).unwrap();
        let meta = dm.read_metadata().unwrap();
        assert_eq!(meta.len(), METADATA_SIZE);
        assert_eq!(&meta[..3], &[0x12, 0x34, 0]);
    }
}
