//! Rebuilding a live table from a serialized image.
//!
//! Images are untrusted input. Only the exact layout the serializer produces
//! is accepted: every record must sit where the serializer would have put
//! it, every span must lie inside the payload, and the whole payload must be
//! consumed. Anything else is [`ChainMapError::CorruptData`]. On failure
//! nothing built so far survives.

use std::io::Read;

use tracing::{debug, warn};

use crate::chain_map::{ChainHashMap, empty_buckets};
use crate::entry::{Entry, EntryArena, EntryId, insert_entry};
use crate::error::{ChainMapError, Result};
use crate::layout::{
    BUCKET_SLOT_SIZE, DiskSpan, ENTRY_RECORD_SIZE, EntryRecord, FileHeader, HEADER_SIZE, NO_ENTRY,
    TABLE_RECORD_SIZE, TableFlags, TableRecord, checked_round_up, read_record,
};

impl<H> ChainHashMap<H>
where
    H: Fn(&[u8]) -> u64,
{
    /// Load an image produced by [`to_bytes`](Self::to_bytes) or [`sync`](Self::sync).
    ///
    /// `hash_fn` must be the function the image was built with.
    pub fn from_bytes(bytes: &[u8], hash_fn: H) -> Result<Self> {
        let header = FileHeader::read(bytes).inspect_err(log_rejection)?;
        let payload = &bytes[HEADER_SIZE..];
        if header.payload_size as usize != payload.len() {
            let err = ChainMapError::corrupt(format!(
                "header declares {} payload bytes, image holds {}",
                header.payload_size,
                payload.len()
            ));
            log_rejection(&err);
            return Err(err);
        }
        Self::from_payload(payload, hash_fn)
    }

    /// Read an image from `reader`: one read for the header, one for the payload.
    pub fn open<R: Read>(reader: &mut R, hash_fn: H) -> Result<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        let header = FileHeader::read(&raw).inspect_err(log_rejection)?;

        let len = header.payload_size as usize;
        let mut payload = Vec::new();
        payload.try_reserve_exact(len)?;
        payload.resize(len, 0);
        reader.read_exact(&mut payload)?;

        Self::from_payload(&payload, hash_fn)
    }

    /// Rebuild a table from a payload without its file header.
    pub fn from_payload(payload: &[u8], hash_fn: H) -> Result<Self> {
        let map = rebuild(payload, hash_fn).inspect_err(log_rejection)?;
        debug!(
            size = map.size(),
            entries = map.len(),
            bytes = payload.len(),
            "deserialized table"
        );
        Ok(map)
    }
}

fn log_rejection(err: &ChainMapError) {
    warn!(%err, "rejected serialized table");
}

/// Returns the entry's bytes, checking the span sits at `expected` and fits.
fn read_span<'a>(payload: &'a [u8], span: DiskSpan, expected: usize, what: &str) -> Result<&'a [u8]> {
    if span.len == 0 {
        return Err(ChainMapError::corrupt(format!("empty {what} at offset {expected}")));
    }
    if span.offset != expected as u64 {
        return Err(ChainMapError::corrupt(format!(
            "{what} at offset {}, expected {expected}",
            span.offset
        )));
    }
    let end = usize::try_from(span.len)
        .ok()
        .and_then(|len| expected.checked_add(len))
        .filter(|&end| end <= payload.len())
        .ok_or_else(|| {
            ChainMapError::corrupt(format!(
                "{what} of {} bytes at offset {expected} runs past the end of the image",
                span.len
            ))
        })?;
    Ok(&payload[expected..end])
}

/// Round `end` up to the next record boundary, which must still be inside the payload.
fn next_boundary(payload: &[u8], end: usize) -> Result<usize> {
    checked_round_up(end)
        .filter(|&aligned| aligned <= payload.len())
        .ok_or_else(|| ChainMapError::corrupt(format!("padding after offset {end} is missing")))
}

fn rebuild<H>(payload: &[u8], hash_fn: H) -> Result<ChainHashMap<H>>
where
    H: Fn(&[u8]) -> u64,
{
    let table: TableRecord = read_record(payload, 0, "table record")?;

    let flags = TableFlags::from(table.flags);
    if flags != TableFlags::current() {
        return Err(ChainMapError::corrupt(format!(
            "unsupported format version {} with alignment shift {}",
            flags.format_version(),
            flags.align_shift()
        )));
    }
    if table.size == 0 {
        return Err(ChainMapError::corrupt("table has no buckets"));
    }
    if table.buckets_offset != TABLE_RECORD_SIZE as u64 {
        return Err(ChainMapError::corrupt(format!(
            "bucket array recorded at {}, expected {TABLE_RECORD_SIZE}",
            table.buckets_offset
        )));
    }

    let bucket_bytes = usize::try_from(table.size)
        .ok()
        .and_then(|size| size.checked_mul(BUCKET_SLOT_SIZE))
        .and_then(|bytes| TABLE_RECORD_SIZE.checked_add(bytes))
        .filter(|&end| end <= payload.len())
        .ok_or_else(|| {
            ChainMapError::corrupt(format!(
                "bucket array of {} slots does not fit in {} bytes",
                table.size,
                payload.len()
            ))
        })?;
    let size = table.size as usize;
    let table_end = next_boundary(payload, bucket_bytes)?;

    let entry_count = usize::try_from(table.entry_count)
        .map_err(|_| ChainMapError::corrupt("entry count overflows"))?;
    let max_chain = usize::try_from(table.max_chain)
        .map_err(|_| ChainMapError::corrupt("chain length overflows"))?;

    let mut buckets = empty_buckets(size)?;
    let mut entries = EntryArena::with_key();
    // never trust the count for more than the payload could hold
    entries.try_reserve(entry_count.min(payload.len() / ENTRY_RECORD_SIZE))?;

    let mut expected = table_end;
    let mut hash_checked = false;
    let mut longest = 0;

    for (idx, slot) in buckets.iter_mut().enumerate() {
        let head: u64 = read_record(payload, TABLE_RECORD_SIZE + idx * BUCKET_SLOT_SIZE, "bucket slot")?;
        if head == NO_ENTRY {
            continue;
        }
        if head != expected as u64 {
            return Err(ChainMapError::corrupt(format!(
                "bucket {idx} points at offset {head}, expected {expected}"
            )));
        }

        let mut parent: Option<EntryId> = None;
        let mut chain_len = 0;
        loop {
            let record: EntryRecord = read_record(payload, expected, "entry record")?;

            let value_at = expected + ENTRY_RECORD_SIZE;
            let value = read_span(payload, record.value, value_at, "value")?;
            let key_at = next_boundary(payload, value_at + value.len())?;
            let key = read_span(payload, record.key, key_at, "key")?;
            let end = next_boundary(payload, key_at + key.len())?;

            if record.hash % table.size != idx as u64 {
                return Err(ChainMapError::corrupt(format!(
                    "entry at offset {expected} hashes to bucket {}, found in bucket {idx}",
                    record.hash % table.size
                )));
            }
            if !hash_checked {
                let computed = hash_fn(key);
                if computed != record.hash {
                    return Err(ChainMapError::HashMismatch {
                        stored: record.hash,
                        computed,
                    });
                }
                hash_checked = true;
            }

            let mut seen = *slot;
            while let Some(id) = seen {
                if entries[id].matches(key, record.hash) {
                    return Err(ChainMapError::corrupt(format!(
                        "duplicate key in bucket {idx} at offset {expected}"
                    )));
                }
                seen = entries[id].next;
            }

            let mut entry = Entry::new(key, value, record.hash)?;
            entry.parent = parent;
            let id = insert_entry(&mut entries, entry)?;
            match parent {
                Some(p) => entries[p].next = Some(id),
                None => *slot = Some(id),
            }
            parent = Some(id);
            chain_len += 1;
            expected = end;

            match record.next {
                NO_ENTRY => break,
                next if next == end as u64 => continue,
                next => {
                    return Err(ChainMapError::corrupt(format!(
                        "chain link at offset {next}, expected {end}"
                    )));
                }
            }
        }
        longest = longest.max(chain_len);
    }

    if expected != payload.len() {
        return Err(ChainMapError::corrupt(format!(
            "{} unreferenced bytes after offset {expected}",
            payload.len() - expected
        )));
    }
    if entries.len() != entry_count {
        return Err(ChainMapError::corrupt(format!(
            "found {} entries, header records {entry_count}",
            entries.len()
        )));
    }
    if longest > max_chain {
        return Err(ChainMapError::corrupt(format!(
            "chain of length {longest} exceeds the recorded maximum {max_chain}"
        )));
    }

    Ok(ChainHashMap::from_parts(buckets, entries, max_chain, hash_fn))
}
