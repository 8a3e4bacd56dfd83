//! Fixed-size records of the serialized image.
//!
//! An image is a [`FileHeader`] followed by the payload. Inside the payload
//! every offset is relative to the payload start, so offset 0 always names
//! the [`TableRecord`] and is free to serve as the "no entry" sentinel.
//! All integers are stored in native byte order.

use bytemuck::{Pod, Zeroable};
use crate::error::{ChainMapError, Result};

pub const MAGIC: u32 = 0x8576_3294;

/// Every record and byte run starts on a multiple of this.
pub const ALIGN: usize = 16;
const ALIGN_SHIFT: u8 = 4;

pub const FORMAT_VERSION: u8 = 1;

pub const HEADER_SIZE: usize = size_of::<FileHeader>();
pub const TABLE_RECORD_SIZE: usize = size_of::<TableRecord>();
pub const ENTRY_RECORD_SIZE: usize = size_of::<EntryRecord>();
pub const BUCKET_SLOT_SIZE: usize = size_of::<u64>();

/// Offset 0 is the table record, never an entry.
pub const NO_ENTRY: u64 = 0;

#[inline]
pub const fn round_up(len: usize) -> usize {
    (len + ALIGN - 1) & !(ALIGN - 1)
}

/// `round_up` for lengths read from an untrusted image.
#[inline]
pub fn checked_round_up(len: usize) -> Option<usize> {
    Some(len.checked_add(ALIGN - 1)? & !(ALIGN - 1))
}

#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
#[repr(C)]
pub struct FileHeader {
    pub magic: u32,
    pub payload_size: u32,
    pub reserved: [u32; 2],
}

impl FileHeader {
    pub fn new(payload_len: usize) -> Result<Self> {
        let payload_size =
            u32::try_from(payload_len).map_err(|_| ChainMapError::PayloadTooLarge(payload_len))?;
        Ok(Self {
            magic: MAGIC,
            payload_size,
            reserved: [0; 2],
        })
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        let raw = bytes
            .get(..HEADER_SIZE)
            .ok_or_else(|| ChainMapError::corrupt("image is shorter than its file header"))?;
        let header: FileHeader = bytemuck::pod_read_unaligned(raw);
        if header.magic != MAGIC {
            return Err(ChainMapError::corrupt(format!(
                "bad magic {:#010x}",
                header.magic
            )));
        }
        Ok(header)
    }
}

mod flags {
    // the bitfield expansion wraps generated expressions in parentheses
    #![allow(unused_parens)]

    use modular_bitfield::prelude::*;

    /// Packed into the `flags` word of the table record.
    #[bitfield]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TableFlags {
        pub format_version: B8,
        pub align_shift: B4,
        #[skip]
        __: B20,
    }
}

pub use flags::TableFlags;

impl From<TableFlags> for u32 {
    fn from(flags: TableFlags) -> u32 {
        u32::from_le_bytes(flags.into_bytes())
    }
}

impl From<u32> for TableFlags {
    fn from(value: u32) -> Self {
        TableFlags::from_bytes(value.to_le_bytes())
    }
}

impl TableFlags {
    pub fn current() -> Self {
        TableFlags::new()
            .with_format_version(FORMAT_VERSION)
            .with_align_shift(ALIGN_SHIFT)
    }
}

/// Scalar fields of the table, at payload offset 0.
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
#[repr(C)]
pub struct TableRecord {
    pub size: u64,
    pub entry_count: u64,
    pub max_chain: u64,
    /// Where the bucket array starts; always right after this record.
    pub buckets_offset: u64,
    pub flags: u32,
    pub reserved: [u32; 3],
}

/// A run of bytes inside the payload.
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq, Default)]
#[repr(C)]
pub struct DiskSpan {
    pub offset: u64,
    pub len: u64,
}

/// Serialized form of one entry. The value bytes follow it, then the key bytes.
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
#[repr(C)]
pub struct EntryRecord {
    pub key: DiskSpan,
    pub value: DiskSpan,
    pub hash: u64,
    /// Next entry of the chain, or [`NO_ENTRY`].
    pub next: u64,
}

/// Bytes one entry occupies in the payload, padding included.
#[inline]
pub const fn entry_footprint(key_len: usize, value_len: usize) -> usize {
    ENTRY_RECORD_SIZE + round_up(value_len) + round_up(key_len)
}

/// Bytes the table record and a bucket array of `size` slots occupy.
#[inline]
pub const fn table_footprint(size: usize) -> usize {
    TABLE_RECORD_SIZE + round_up(size * BUCKET_SLOT_SIZE)
}

/// Read a `T` out of `bytes` at `offset`, failing if it does not fit.
pub fn read_record<T: Pod>(bytes: &[u8], offset: usize, what: &str) -> Result<T> {
    let end = offset
        .checked_add(size_of::<T>())
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            ChainMapError::corrupt(format!("{what} at offset {offset} runs past the end of the image"))
        })?;
    Ok(bytemuck::pod_read_unaligned(&bytes[offset..end]))
}
