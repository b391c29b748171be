//! Metadata header codec.
//!
//! The first [`METADATA_SIZE`] bytes of every data file hold the tree's
//! persistent state. Only the first 32 bytes are used; the rest is
//! reserved and kept zero.

use crate::common::config::{METADATA_MAGIC, METADATA_SIZE};
use crate::common::{Error, PageId, Result};

/// Persistent tree state stored in the metadata header.
///
/// # Layout (big-endian, 4 bytes per field)
/// ```text
/// Offset  Field
/// ------  -----
/// 0       magic (0x12345678)
/// 4       root_page_id      (-1 = empty tree)
/// 8       next_page_id
/// 12      split_count
/// 16      merge_count
/// 20      page_size         (0 = not recorded)
/// 24      free_list_head    (-1 = empty; 0 in a header without a checksum = empty)
/// 28      checksum          (CRC32 of bytes 0..28; 0 = not recorded)
/// ```
///
/// Headers that predate the page-size, free-list and checksum fields
/// have zeros there and are accepted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMetadata {
    pub root_page_id: PageId,
    pub next_page_id: u32,
    pub split_count: u32,
    pub merge_count: u32,
    /// Page size the file was created with, if recorded.
    pub page_size: Option<usize>,
    pub free_list_head: PageId,
}

impl TreeMetadata {
    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_ROOT: usize = 4;
    pub const OFFSET_NEXT_PAGE: usize = 8;
    pub const OFFSET_SPLITS: usize = 12;
    pub const OFFSET_MERGES: usize = 16;
    pub const OFFSET_PAGE_SIZE: usize = 20;
    pub const OFFSET_FREE_HEAD: usize = 24;
    pub const OFFSET_CHECKSUM: usize = 28;

    /// State of a freshly created, empty tree.
    pub fn new(page_size: usize) -> Self {
        Self {
            root_page_id: PageId::INVALID,
            next_page_id: 0,
            split_count: 0,
            merge_count: 0,
            page_size: Some(page_size),
            free_list_head: PageId::INVALID,
        }
    }

    /// Serialize into a full-size header buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; METADATA_SIZE];
        put_i32(&mut buf, Self::OFFSET_MAGIC, METADATA_MAGIC);
        put_i32(&mut buf, Self::OFFSET_ROOT, self.root_page_id.to_raw());
        put_u32(&mut buf, Self::OFFSET_NEXT_PAGE, self.next_page_id);
        put_u32(&mut buf, Self::OFFSET_SPLITS, self.split_count);
        put_u32(&mut buf, Self::OFFSET_MERGES, self.merge_count);
        put_u32(
            &mut buf,
            Self::OFFSET_PAGE_SIZE,
            self.page_size.unwrap_or(0) as u32,
        );
        put_i32(&mut buf, Self::OFFSET_FREE_HEAD, self.free_list_head.to_raw());

        let checksum = Self::compute_checksum(&buf);
        put_u32(&mut buf, Self::OFFSET_CHECKSUM, checksum);
        buf
    }

    /// Parse a header buffer.
    ///
    /// Returns `Ok(None)` when the magic number is absent, which is how a
    /// brand-new (zeroed) file looks. Short buffers are treated as if
    /// zero-padded.
    ///
    /// # Errors
    /// [`Error::CorruptMetadata`] if a recorded checksum does not match.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if get_i32(buf, Self::OFFSET_MAGIC) != METADATA_MAGIC {
            return Ok(None);
        }

        let stored = get_u32(buf, Self::OFFSET_CHECKSUM);
        if stored != 0 {
            let computed = Self::compute_checksum(buf);
            if stored != computed {
                return Err(Error::CorruptMetadata { stored, computed });
            }
        }

        let page_size = match get_u32(buf, Self::OFFSET_PAGE_SIZE) {
            0 => None,
            size => Some(size as usize),
        };

        // Legacy headers leave the free-list slot zeroed, which would
        // otherwise read as "page 0 is free".
        let free_list_head = if stored == 0 {
            PageId::INVALID
        } else {
            PageId::from_raw(get_i32(buf, Self::OFFSET_FREE_HEAD))
        };

        Ok(Some(Self {
            root_page_id: PageId::from_raw(get_i32(buf, Self::OFFSET_ROOT)),
            next_page_id: get_u32(buf, Self::OFFSET_NEXT_PAGE),
            split_count: get_u32(buf, Self::OFFSET_SPLITS),
            merge_count: get_u32(buf, Self::OFFSET_MERGES),
            page_size,
            free_list_head,
        }))
    }

    /// CRC32 over the header fields that precede the checksum.
    pub fn compute_checksum(buf: &[u8]) -> u32 {
        let mut field = [0u8; Self::OFFSET_CHECKSUM];
        let n = buf.len().min(Self::OFFSET_CHECKSUM);
        field[..n].copy_from_slice(&buf[..n]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&field);
        hasher.finalize()
    }
}

fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    match buf.get(offset..offset + 4) {
        Some(bytes) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        None => 0,
    }
}

fn get_i32(buf: &[u8], offset: usize) -> i32 {
    get_u32(buf, offset) as i32
}
