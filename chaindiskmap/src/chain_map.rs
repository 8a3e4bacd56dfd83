use std::collections::TryReserveError;
use std::fmt;

use tracing::{debug, warn};

use crate::config::ResizeConfig;
use crate::entry::{Entry, EntryArena, EntryId, insert_entry};
use crate::error::{ChainMapError, Result};
use crate::hash::{DEFAULT_HASH, HashFn};

pub(crate) fn empty_buckets(size: usize) -> std::result::Result<Vec<Option<EntryId>>, TryReserveError> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(size)?;
    buckets.resize(size, None);
    Ok(buckets)
}

/// A hash map with separate chaining that keeps everything in memory and
/// can be written out as, and rebuilt from, a single flat image.
///
/// Keys and values are arbitrary non-empty byte strings and are always
/// copied in. Each bucket holds the head of a collision chain; new keys are
/// appended at the tail of their chain. The bucket array grows (never
/// shrinks) once the load factor or a chain length crosses the limits in
/// [`ResizeConfig`]. The bucket count is whatever the caller picked and need
/// not be a power of two.
///
/// The hash function is any `Fn(&[u8]) -> u64`; it is not part of the
/// serialized image, so the same function must be supplied on reopen.
pub struct ChainHashMap<H = HashFn> {
    buckets: Vec<Option<EntryId>>,
    entries: EntryArena,
    max_chain: usize,
    hash_fn: H,
    resize: ResizeConfig,
}

impl ChainHashMap<HashFn> {
    /// Creates a map using [`DEFAULT_HASH`].
    pub fn with_default_hash(size: usize) -> Result<Self> {
        Self::new(size, DEFAULT_HASH)
    }
}

impl<H> ChainHashMap<H>
where
    H: Fn(&[u8]) -> u64,
{
    /// Creates an empty map with `size` buckets. `size` may not be zero.
    pub fn new(size: usize, hash_fn: H) -> Result<Self> {
        Self::with_config(size, hash_fn, ResizeConfig::default())
    }

    pub fn with_config(size: usize, hash_fn: H, resize: ResizeConfig) -> Result<Self> {
        if size == 0 {
            return Err(ChainMapError::InvalidArgument("bucket count must be non-zero"));
        }
        resize.validate()?;
        Ok(Self {
            buckets: empty_buckets(size)?,
            entries: EntryArena::with_key(),
            max_chain: 0,
            hash_fn,
            resize,
        })
    }

    /// Assemble a map from already linked parts, used when loading an image.
    pub(crate) fn from_parts(
        buckets: Vec<Option<EntryId>>,
        entries: EntryArena,
        max_chain: usize,
        hash_fn: H,
    ) -> Self {
        Self {
            buckets,
            entries,
            max_chain,
            hash_fn,
            resize: ResizeConfig::default(),
        }
    }

    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        (self.hash_fn)(key)
    }

    /// Find the entry holding `key`.
    fn seek(&self, key: &[u8]) -> Result<EntryId> {
        if key.is_empty() {
            return Err(ChainMapError::InvalidArgument("key must be non-empty"));
        }
        let hash = self.hash_key(key);
        let mut cursor = self.buckets[self.bucket_of(hash)];
        while let Some(id) = cursor {
            let entry = &self.entries[id];
            if entry.matches(key, hash) {
                return Ok(id);
            }
            cursor = entry.next;
        }
        Err(ChainMapError::NotFound)
    }

    /// Insert a copy of `key` and `value`.
    ///
    /// Fails with [`ChainMapError::DuplicateKey`] if the key is already
    /// present; use [`change`](Self::change) to replace a value. If the
    /// insertion pushes the map past its resize limits the bucket array is
    /// grown; a failure to grow is logged and leaves the map unresized, the
    /// insertion itself still succeeds.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let key = key.as_ref();
        let value = value.as_ref();
        if key.is_empty() || value.is_empty() {
            return Err(ChainMapError::InvalidArgument("key and value must be non-empty"));
        }

        let hash = self.hash_key(key);
        let idx = self.bucket_of(hash);

        // walk to the tail, rejecting duplicates on the way
        let mut depth = 1;
        let mut tail = None;
        let mut cursor = self.buckets[idx];
        while let Some(id) = cursor {
            let entry = &self.entries[id];
            if entry.matches(key, hash) {
                return Err(ChainMapError::DuplicateKey);
            }
            depth += 1;
            tail = Some(id);
            cursor = entry.next;
        }

        let mut entry = Entry::new(key, value, hash)?;
        entry.parent = tail;
        let id = insert_entry(&mut self.entries, entry)?;
        match tail {
            Some(t) => self.entries[t].next = Some(id),
            None => self.buckets[idx] = Some(id),
        }

        self.max_chain = self.max_chain.max(depth);

        if self.resize.limits_exceeded(self.size(), self.len(), depth) {
            if let Err(err) = self.grow() {
                warn!(size = self.size(), entries = self.len(), %err, "failed to grow bucket array");
            }
        }
        Ok(())
    }

    /// Get a value by key
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<&[u8]> {
        let id = self.seek(key.as_ref())?;
        Ok(&self.entries[id].value)
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.seek(key.as_ref()).is_ok()
    }

    /// Remove the entry for `key`. The bucket array is never shrunk.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
        let id = self.seek(key.as_ref())?;
        let Some(entry) = self.entries.remove(id) else {
            return Err(ChainMapError::NotFound);
        };

        match entry.parent {
            Some(parent) => self.entries[parent].next = entry.next,
            None => {
                let idx = self.bucket_of(entry.hash);
                self.buckets[idx] = entry.next;
            }
        }
        if let Some(next) = entry.next {
            self.entries[next].parent = entry.parent;
        }
        Ok(())
    }

    /// Replace the value stored for `key`, reusing its allocation when the
    /// new value fits.
    pub fn change(&mut self, key: impl AsRef<[u8]>, new_value: impl AsRef<[u8]>) -> Result<()> {
        let new_value = new_value.as_ref();
        if new_value.is_empty() {
            return Err(ChainMapError::InvalidArgument("value must be non-empty"));
        }
        let id = self.seek(key.as_ref())?;
        self.entries[id].replace_value(new_value)
    }

    /// Grow the bucket array to at least `min_size` buckets.
    pub fn reserve_buckets(&mut self, min_size: usize) -> Result<()> {
        if min_size <= self.size() {
            return Ok(());
        }
        self.relink(min_size)
    }

    fn grow(&mut self) -> Result<()> {
        let new_size = self
            .resize
            .next_size(self.size())
            .ok_or(ChainMapError::InvalidArgument("bucket count overflow"))?;
        self.relink(new_size)
    }

    /// Move every entry into a fresh bucket array of `new_size` slots.
    /// Only links change; keys and values stay where they are.
    fn relink(&mut self, new_size: usize) -> Result<()> {
        let new_buckets = empty_buckets(new_size)?;
        let old_buckets = std::mem::replace(&mut self.buckets, new_buckets);
        let old_size = old_buckets.len();

        let mut max_chain = 0;
        for head in old_buckets {
            let mut cursor = head;
            while let Some(id) = cursor {
                // read before linking clobbers it
                cursor = self.entries[id].next;
                max_chain = max_chain.max(self.link_at_tail(id));
            }
        }
        self.max_chain = max_chain;

        debug!(old_size, new_size, entries = self.len(), max_chain, "resized bucket array");
        Ok(())
    }

    /// Append an unlinked entry to the tail of its chain, returning the chain length.
    fn link_at_tail(&mut self, id: EntryId) -> usize {
        let idx = self.bucket_of(self.entries[id].hash);
        let mut depth = 1;
        let mut tail = None;
        let mut cursor = self.buckets[idx];
        while let Some(c) = cursor {
            depth += 1;
            tail = Some(c);
            cursor = self.entries[c].next;
        }

        let entry = &mut self.entries[id];
        entry.next = None;
        entry.parent = tail;
        match tail {
            Some(t) => self.entries[t].next = Some(id),
            None => self.buckets[idx] = Some(id),
        }
        depth
    }
}

impl<H> ChainHashMap<H> {
    /// Returns the number of key-value pairs in the map
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map contains no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Longest chain observed since the bucket array was last rebuilt.
    /// `1` means no collisions, `0` means nothing was inserted.
    pub fn max_chain(&self) -> usize {
        self.max_chain
    }

    /// Returns the load factor of the map (len / buckets)
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.size() as f64
    }

    pub fn hash_fn(&self) -> &H {
        &self.hash_fn
    }

    pub fn resize_config(&self) -> &ResizeConfig {
        &self.resize
    }

    pub fn set_resize_config(&mut self, resize: ResizeConfig) -> Result<()> {
        resize.validate()?;
        self.resize = resize;
        Ok(())
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub(crate) fn bucket_head(&self, idx: usize) -> Option<EntryId> {
        self.buckets.get(idx).copied().flatten()
    }

    pub(crate) fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// The collision chain rooted at bucket `idx`, head first.
    pub(crate) fn chain(&self, idx: usize) -> Chain<'_> {
        Chain {
            entries: &self.entries,
            cursor: self.bucket_head(idx),
        }
    }

    /// Every chain in ascending bucket order, empty buckets included.
    pub(crate) fn chains(&self) -> impl Iterator<Item = Chain<'_>> + '_ {
        (0..self.buckets.len()).map(move |idx| self.chain(idx))
    }
}

impl<H> fmt::Debug for ChainHashMap<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHashMap")
            .field("size", &self.buckets.len())
            .field("len", &self.entries.len())
            .field("max_chain", &self.max_chain)
            .field("resize", &self.resize)
            .finish()
    }
}

/// Iterator over the entries of one collision chain
pub(crate) struct Chain<'a> {
    entries: &'a EntryArena,
    cursor: Option<EntryId>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = &self.entries[self.cursor?];
        self.cursor = entry.next;
        Some(entry)
    }
}
