//! Frame identifier type.

use std::fmt;

/// Identifies a frame (slot) in the buffer pool.
///
/// Frames live in a `Vec<Frame>` sized once at pool construction, so a
/// frame id is simply the index: `frames[frame_id.0]`. Unlike a
/// [`PageId`](crate::PageId), a frame id never reaches disk.
///
/// # Example
/// ```
/// use bplusdb::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
