//! LRU (Least Recently Used) replacement policy.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::common::FrameId;

/// Least-recently-used eviction gated by pin state.
///
/// Each access stamps the frame with a monotonically increasing counter.
/// `history` orders frames by their latest stamp, so eviction walks from
/// least to most recent and takes the first evictable frame.
///
/// # Complexity
/// - `record_access`: O(log n)
/// - `set_evictable`: O(1)
/// - `evict`: O(n) worst case when most frames are pinned
pub struct LruReplacer {
    /// Access stamp → frame, ordered oldest first.
    history: BTreeMap<u64, FrameId>,

    /// Frame → its current stamp in `history`.
    stamps: HashMap<FrameId, u64>,

    /// Frames whose pin count is zero.
    evictable: HashSet<FrameId>,

    clock: u64,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            history: BTreeMap::new(),
            stamps: HashMap::new(),
            evictable: HashSet::new(),
            clock: 0,
        }
    }

    /// Mark `frame_id` as the most recently used frame.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if let Some(old) = self.stamps.remove(&frame_id) {
            self.history.remove(&old);
        }

        self.clock += 1;
        self.history.insert(self.clock, frame_id);
        self.stamps.insert(frame_id, self.clock);
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if self.stamps.contains_key(&frame_id) {
                self.evictable.insert(frame_id);
            }
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Remove and return the least recently used evictable frame.
    ///
    /// Returns `None` if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let (&stamp, &frame_id) = self
            .history
            .iter()
            .find(|(_, fid)| self.evictable.contains(fid))?;

        self.history.remove(&stamp);
        self.stamps.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Stop tracking a frame entirely.
    pub fn remove(&mut self, frame_id: FrameId) {
        if let Some(stamp) = self.stamps.remove(&frame_id) {
            self.history.remove(&stamp);
        }
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
