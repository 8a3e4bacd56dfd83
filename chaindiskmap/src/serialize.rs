use std::io::Write;

use bytemuck::bytes_of;
use tracing::debug;

use crate::chain_map::ChainHashMap;
use crate::error::Result;
use crate::layout::{
    BUCKET_SLOT_SIZE, DiskSpan, ENTRY_RECORD_SIZE, EntryRecord, FileHeader, HEADER_SIZE, NO_ENTRY,
    TABLE_RECORD_SIZE, TableFlags, TableRecord, entry_footprint, round_up, table_footprint,
};

impl<H> ChainHashMap<H> {
    /// Length of the serialized payload, file header excluded.
    pub fn serialized_len(&self) -> usize {
        table_footprint(self.size())
            + self
                .chains()
                .flatten()
                .map(|entry| entry_footprint(entry.key.len(), entry.value.len()))
                .sum::<usize>()
    }

    /// Serialize the table into a standalone image: file header, then payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload_len = self.serialized_len();
        let header = FileHeader::new(payload_len)?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(HEADER_SIZE + payload_len)?;
        buf.extend_from_slice(bytes_of(&header));
        self.write_payload(&mut buf, payload_len);
        Ok(buf)
    }

    /// Write the image to `writer`: one write for the header, one for the payload.
    ///
    /// The writer is used from wherever it is currently positioned and is not flushed.
    pub fn sync<W: Write>(&self, writer: &mut W) -> Result<()> {
        let payload_len = self.serialized_len();
        let header = FileHeader::new(payload_len)?;

        let mut payload = Vec::new();
        payload.try_reserve_exact(payload_len)?;
        self.write_payload(&mut payload, payload_len);

        writer.write_all(bytes_of(&header))?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// Append the payload to `buf`, which must already have room for
    /// `payload_len` more bytes. Offsets are relative to where the payload starts.
    fn write_payload(&self, buf: &mut Vec<u8>, payload_len: usize) {
        let base = buf.len();
        let size = self.size();
        let table_end = table_footprint(size);

        let record = TableRecord {
            size: size as u64,
            entry_count: self.len() as u64,
            max_chain: self.max_chain() as u64,
            buckets_offset: TABLE_RECORD_SIZE as u64,
            flags: TableFlags::current().into(),
            reserved: [0; 3],
        };
        buf.extend_from_slice(bytes_of(&record));

        // bucket slots: where each chain will start
        let mut offset = table_end;
        for chain in self.chains() {
            let chain_len: usize = chain
                .map(|entry| entry_footprint(entry.key.len(), entry.value.len()))
                .sum();
            let head = if chain_len == 0 { NO_ENTRY } else { offset as u64 };
            buf.extend_from_slice(&head.to_ne_bytes());
            offset += chain_len;
        }
        debug_assert_eq!(buf.len() - base, TABLE_RECORD_SIZE + size * BUCKET_SLOT_SIZE);
        buf.resize(base + table_end, 0);

        let mut offset = table_end;
        for chain in self.chains() {
            let mut chain = chain.peekable();
            while let Some(entry) = chain.next() {
                let value_offset = offset + ENTRY_RECORD_SIZE;
                let key_offset = value_offset + round_up(entry.value.len());
                let end = key_offset + round_up(entry.key.len());

                let record = EntryRecord {
                    key: DiskSpan {
                        offset: key_offset as u64,
                        len: entry.key.len() as u64,
                    },
                    value: DiskSpan {
                        offset: value_offset as u64,
                        len: entry.value.len() as u64,
                    },
                    hash: entry.hash,
                    next: if chain.peek().is_some() { end as u64 } else { NO_ENTRY },
                };
                buf.extend_from_slice(bytes_of(&record));
                buf.extend_from_slice(&entry.value);
                buf.resize(base + key_offset, 0);
                buf.extend_from_slice(&entry.key);
                buf.resize(base + end, 0);

                offset = end;
            }
        }

        debug_assert_eq!(buf.len() - base, payload_len);
        debug!(size, entries = self.len(), bytes = payload_len, "serialized table");
    }
}
