//! Page - the fundamental fixed-size unit of storage.
//!
//! A [`Page`] is a raw byte block that serves as the unit of I/O between
//! disk and memory. Pages are held in [`Frame`](crate::buffer::Frame)s
//! within the buffer pool.

use crate::common::{Error, Result};

/// A page of data.
///
/// The size is chosen when the data file is opened and stays fixed for
/// the lifetime of the file, so it is a runtime value rather than a
/// const generic.
///
/// # Typed Access
/// Node codecs never index the buffer directly. They go through the
/// bounds-checked primitives below, which have deliberately asymmetric
/// failure modes:
/// - writes that would cross the page boundary fail with
///   [`Error::OutOfRange`]
/// - reads of out-of-range or malformed data degrade to "absent"
///   (`0` / empty string) so that never-written regions read as empty
///
/// All integers are 4-byte big-endian.
///
/// # Dirty Flag
/// Every successful write sets the dirty flag. The disk manager clears
/// it once the page has been written back.
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code; copying a page
/// should be explicit. A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use bplusdb::storage::page::Page;
///
/// let mut page = Page::new(4096);
/// page.write_int(0, 42).unwrap();
/// page.write_string(4, "hello", 64).unwrap();
/// assert_eq!(page.read_int(0), 42);
/// assert_eq!(page.read_string(4, 64), "hello");
/// assert!(page.is_dirty());
/// ```
pub struct Page {
    data: Box<[u8]>,
    is_dirty: bool,
}

impl Page {
    /// Create a new zeroed, clean page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            is_dirty: false,
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    ///
    /// Raw access does not touch the dirty flag; callers that modify the
    /// page this way must call [`Page::mark_dirty`] themselves.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of this page in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether the page has been modified since it was last written.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    /// Zero out the entire page and mark it dirty.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.is_dirty = true;
    }

    /// Zero out the page and reset the dirty flag (frame reuse).
    pub(crate) fn reset(&mut self) {
        self.data.fill(0);
        self.is_dirty = false;
    }

    /// Write a 4-byte integer at `offset`.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if the integer would cross the page boundary.
    pub fn write_int(&mut self, offset: usize, value: i32) -> Result<()> {
        let end = self.check_range(offset, 4)?;
        self.data[offset..end].copy_from_slice(&value.to_be_bytes());
        self.is_dirty = true;
        Ok(())
    }

    /// Read a 4-byte integer at `offset`, or `0` if out of range.
    pub fn read_int(&self, offset: usize) -> i32 {
        match offset.checked_add(4) {
            Some(end) if end <= self.data.len() => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&self.data[offset..end]);
                i32::from_be_bytes(buf)
            }
            _ => 0,
        }
    }

    /// Write a length-prefixed UTF-8 string into a fixed slot.
    ///
    /// The payload is truncated to `slot_size - 4` bytes, backing off to a
    /// char boundary so the stored bytes stay valid UTF-8.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if the slot would overflow the page.
    pub fn write_string(&mut self, offset: usize, value: &str, slot_size: usize) -> Result<()> {
        self.check_range(offset, slot_size.max(4))?;

        let capacity = slot_size.saturating_sub(4);
        let mut len = value.len().min(capacity);
        while !value.is_char_boundary(len) {
            len -= 1;
        }

        self.data[offset..offset + 4].copy_from_slice(&(len as i32).to_be_bytes());
        self.data[offset + 4..offset + 4 + len].copy_from_slice(&value.as_bytes()[..len]);
        self.is_dirty = true;
        Ok(())
    }

    /// Read a length-prefixed string from a fixed slot.
    ///
    /// Returns an empty string when the stored length is not positive,
    /// exceeds the slot's payload capacity, or would overrun the page.
    pub fn read_string(&self, offset: usize, slot_size: usize) -> String {
        let len = self.read_int(offset);
        if len <= 0 {
            return String::new();
        }

        let len = len as usize;
        let start = offset + 4;
        if len > slot_size.saturating_sub(4) || start + len > self.data.len() {
            return String::new();
        }

        String::from_utf8_lossy(&self.data[start..start + len]).into_owned()
    }

    /// Bytes available from `offset` to the end of the page.
    #[inline]
    pub fn remaining(&self, offset: usize) -> usize {
        self.data.len().saturating_sub(offset)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(end),
            _ => Err(Error::OutOfRange {
                offset,
                len,
                page_size: self.data.len(),
            }),
        }
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_dirty: self.is_dirty,
        }
    }
}
