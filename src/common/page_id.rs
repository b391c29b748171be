//! Page identifier type.

use std::fmt;

/// Identifies a page in the data file.
///
/// On disk a page id is a signed 4-byte integer where `-1` means "no
/// page". In memory that sentinel is [`PageId::INVALID`], which has the
/// same bit pattern (`u32::MAX`), so the conversion is a plain cast.
///
/// # Example
/// ```
/// use bplusdb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::from_raw(-1), PageId::INVALID);
/// assert_eq!(PageId::INVALID.to_raw(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Used to represent "no page": an empty tree's root, the root's
    /// parent, the last leaf's next pointer, the end of the free list.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Decode the on-disk representation. Any negative value is INVALID.
    #[inline]
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Self::INVALID
        } else {
            PageId(raw as u32)
        }
    }

    /// Encode to the on-disk representation (`-1` for INVALID).
    #[inline]
    pub fn to_raw(self) -> i32 {
        if self.is_valid() {
            self.0 as i32
        } else {
            -1
        }
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
