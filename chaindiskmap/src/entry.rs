use slotmap::{SlotMap, new_key_type};

use crate::error::Result;

new_key_type! {
    /// Stable handle to an entry; stops resolving once the entry is removed.
    pub(crate) struct EntryId;
}

/// Owns every entry of a table. Chains link entries through [`EntryId`]s,
/// so the arena is the only owner and links never form ownership cycles.
pub(crate) type EntryArena = SlotMap<EntryId, Entry>;

/// Store `entry`, reporting allocation failure instead of aborting.
pub(crate) fn insert_entry(arena: &mut EntryArena, entry: Entry) -> Result<EntryId> {
    arena.try_reserve(1)?;
    Ok(arena.insert(entry))
}

/// A live key/value pair and its links in the collision chain.
#[derive(Debug)]
pub(crate) struct Entry {
    pub key: Box<[u8]>,
    /// `Vec` so `change` can reuse capacity when the new value fits
    pub value: Vec<u8>,
    pub hash: u64,
    pub next: Option<EntryId>,
    pub parent: Option<EntryId>,
}

pub(crate) fn try_copy(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(buf)
}

impl Entry {
    /// Copies key and value into freshly owned storage; the caller's memory is never aliased.
    pub fn new(key: &[u8], value: &[u8], hash: u64) -> Result<Self> {
        let key = try_copy(key)?.into_boxed_slice();
        let value = try_copy(value)?;
        Ok(Self {
            key,
            value,
            hash,
            next: None,
            parent: None,
        })
    }

    #[inline]
    pub fn matches(&self, key: &[u8], hash: u64) -> bool {
        self.hash == hash && *self.key == *key
    }

    /// Overwrite the value in place if the current allocation is big enough,
    /// otherwise allocate a new buffer. On failure the old value is kept.
    pub fn replace_value(&mut self, new_value: &[u8]) -> Result<()> {
        if new_value.len() <= self.value.capacity() {
            self.value.clear();
            self.value.extend_from_slice(new_value);
        } else {
            self.value = try_copy(new_value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &[u8], value: &[u8]) -> Entry {
        Entry::new(key, value, 7).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = EntryArena::with_key();
        let a = insert_entry(&mut arena, entry(b"a", b"1")).unwrap();
        let b = insert_entry(&mut arena, entry(b"b", b"2")).unwrap();
        assert_eq!(arena.len(), 2);
        assert_eq!(&*arena[a].key, b"a");
        assert_eq!(arena[b].value, b"2");
    }

    #[test]
    fn test_removed_handle_stops_resolving() {
        let mut arena = EntryArena::with_key();
        let a = insert_entry(&mut arena, entry(b"a", b"1")).unwrap();
        let removed = arena.remove(a).unwrap();
        assert_eq!(&*removed.key, b"a");
        assert_eq!(arena.len(), 0);

        let b = insert_entry(&mut arena, entry(b"b", b"2")).unwrap();
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(&*arena[b].key, b"b");
    }

    #[test]
    fn test_replace_value_reuses_capacity() {
        let mut e = entry(b"k", b"a long value");
        let ptr = e.value.as_ptr();
        e.replace_value(b"short").unwrap();
        assert_eq!(e.value, b"short");
        assert_eq!(e.value.as_ptr(), ptr);

        e.replace_value(b"a much much longer value than before").unwrap();
        assert_eq!(e.value, b"a much much longer value than before");
    }

    #[test]
    fn test_matches_needs_hash_and_bytes() {
        let e = entry(b"key", b"v");
        assert!(e.matches(b"key", 7));
        assert!(!e.matches(b"key", 8));
        assert!(!e.matches(b"kez", 7));
    }
}
