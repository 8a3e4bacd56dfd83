use std::iter::FusedIterator;

use crate::chain_map::ChainHashMap;
use crate::entry::EntryId;

/// Resumable position for [`ChainHashMap::iterate`].
///
/// The default value points at the start of the table. Once iteration is
/// exhausted the cursor is reset to the default, so the next call starts
/// over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    bucket: usize,
    current: Option<EntryId>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> ChainHashMap<H> {
    /// Advance `cursor` and return the pair it now points at.
    ///
    /// Entries are visited depth-first along each chain, buckets in
    /// ascending order. If the entry the cursor sits on has been removed
    /// since the last call, iteration carries on with the next bucket.
    pub fn iterate<'a>(&'a self, cursor: &mut Cursor) -> Option<(&'a [u8], &'a [u8])> {
        let mut next = cursor
            .current
            .and_then(|id| self.entry(id))
            .and_then(|entry| entry.next);

        while next.is_none() {
            if cursor.current.is_some() {
                cursor.bucket += 1;
                cursor.current = None;
            }
            if cursor.bucket >= self.size() {
                *cursor = Cursor::default();
                return None;
            }
            next = self.bucket_head(cursor.bucket);
            if next.is_none() {
                cursor.bucket += 1;
            }
        }

        let id = next?;
        let entry = self.entry(id)?;
        cursor.current = Some(id);
        Some((&entry.key[..], &entry.value[..]))
    }

    /// Iterate over all key-value pairs in chain order.
    pub fn iter(&self) -> Iter<'_, H> {
        Iter {
            map: self,
            cursor: Cursor::default(),
            remaining: self.len(),
        }
    }
}

/// Iterator over key-value pairs in a ChainHashMap
pub struct Iter<'a, H> {
    map: &'a ChainHashMap<H>,
    cursor: Cursor,
    remaining: usize,
}

impl<'a, H> Iterator for Iter<'a, H> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.map.iterate(&mut self.cursor)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<H> ExactSizeIterator for Iter<'_, H> {}

impl<H> FusedIterator for Iter<'_, H> {}

impl<'a, H> IntoIterator for &'a ChainHashMap<H> {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizeConfig;
    use crate::hash::djb;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_iterate_empty_map() {
        let map = ChainHashMap::new(7, djb).unwrap();
        let mut cursor = Cursor::new();
        assert!(map.iterate(&mut cursor).is_none());
        assert_eq!(cursor, Cursor::default());
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn test_iterate_visits_chain_before_next_bucket() {
        // each key lands in bucket `first byte % 3`
        let by_first_byte = |k: &[u8]| k[0] as u64;
        let cfg = ResizeConfig {
            load_factor_threshold: 100.0,
            ..Default::default()
        };
        let mut map = ChainHashMap::with_config(3, by_first_byte, cfg).unwrap();
        map.put([2u8, 0], b"a").unwrap();
        map.put([1u8, 0], b"b").unwrap();
        map.put([4u8, 0], b"c").unwrap();
        map.put([0u8, 0], b"d").unwrap();
        map.put([3u8, 0], b"e").unwrap();

        let values: Vec<&[u8]> = map.iter().map(|(_, v)| v).collect();
        // bucket 0: [0], [3]; bucket 1: [1], [4]; bucket 2: [2]
        assert_eq!(values, [b"d", b"e", b"b", b"c", b"a"].map(|v| v.as_slice()));
    }

    #[test]
    fn test_iterate_restarts_after_exhaustion() {
        let mut map = ChainHashMap::new(11, djb).unwrap();
        map.put(b"one", b"1").unwrap();
        map.put(b"two", b"2").unwrap();

        let mut cursor = Cursor::new();
        let mut first = Vec::new();
        while let Some((k, _)) = map.iterate(&mut cursor) {
            first.push(k.to_vec());
        }
        assert_eq!(first.len(), 2);
        assert_eq!(cursor, Cursor::default());

        let mut second = Vec::new();
        while let Some((k, _)) = map.iterate(&mut cursor) {
            second.push(k.to_vec());
        }
        assert_eq!(first, second);
    }

    #[test]
    fn test_iterate_survives_removal_of_current_entry() {
        let by_first_byte = |k: &[u8]| k[0] as u64;
        let cfg = ResizeConfig {
            load_factor_threshold: 100.0,
            ..Default::default()
        };
        let mut map = ChainHashMap::with_config(3, by_first_byte, cfg).unwrap();
        // bucket 0: [0], [3], [6]; bucket 1: [1], [4]; bucket 2: [2]
        for first in [0u8, 3, 6, 1, 4, 2] {
            map.put([first, 1], b"v").unwrap();
        }

        let mut cursor = Cursor::new();
        assert_eq!(map.iterate(&mut cursor).unwrap().0, [0u8, 1]);
        assert_eq!(map.iterate(&mut cursor).unwrap().0, [3u8, 1]);
        map.remove([3u8, 1]).unwrap();

        // the rest of bucket 0 is skipped, later buckets are visited in full
        let mut rest = Vec::new();
        while let Some((k, _)) = map.iterate(&mut cursor) {
            rest.push(k.to_vec());
        }
        assert_eq!(rest, [[1u8, 1], [4, 1], [2, 1]].map(|k| k.to_vec()));
        assert_eq!(cursor, Cursor::default());
        assert!(map.contains_key([6u8, 1]));
    }

    #[test]
    fn test_iter_is_exact_size() {
        let mut map = ChainHashMap::new(5, djb).unwrap();
        for i in 0..20u32 {
            map.put(i.to_le_bytes(), i.to_be_bytes()).unwrap();
        }
        let mut iter = map.iter();
        assert_eq!(iter.len(), 20);
        iter.next();
        assert_eq!(iter.len(), 19);
        assert_eq!(iter.count(), 19);
    }

    proptest! {
        #[test]
        fn prop_iteration_yields_every_pair_once(
            hm in prop::collection::hash_map(
                prop::collection::vec(any::<u8>(), 1..24),
                prop::collection::vec(any::<u8>(), 1..24),
                0..200,
            )
        ) {
            let mut map = ChainHashMap::new(1, djb).unwrap();
            for (k, v) in &hm {
                map.put(k, v).unwrap();
            }

            let mut seen = HashMap::new();
            for (k, v) in &map {
                prop_assert!(seen.insert(k.to_vec(), v.to_vec()).is_none());
            }
            prop_assert_eq!(seen, hm);
        }
    }
}
