use std::fmt;

use crate::chain_map::ChainHashMap;

/// How well the hash function spreads the current keys.
///
/// Useful for comparing hash functions on a representative key set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    /// Buckets holding at least one entry
    pub hits: usize,
    /// Empty buckets
    pub misses: usize,
    /// Entries that are not the head of their chain
    pub collisions: usize,
    /// Longest chain seen since the last resize
    pub max_collisions: usize,
    /// Payload bytes a save would write right now
    pub size: usize,
    pub entries: usize,
    pub load_factor: f64,
}

impl<H> ChainHashMap<H> {
    pub fn diagnostics(&self) -> Diagnostics {
        let mut misses = 0;
        let mut collisions = 0;
        for chain in self.chains() {
            match chain.count() {
                0 => misses += 1,
                n => collisions += n - 1,
            }
        }

        Diagnostics {
            hits: self.size() - misses,
            misses,
            collisions,
            max_collisions: self.max_chain(),
            size: self.serialized_len(),
            entries: self.len(),
            load_factor: self.len() as f64 / self.size() as f64,
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hits:           {}", self.hits)?;
        writeln!(f, "misses:         {}", self.misses)?;
        writeln!(f, "collisions:     {}", self.collisions)?;
        writeln!(f, "max collisions: {}", self.max_collisions)?;
        writeln!(f, "size:           {}", self.size)?;
        writeln!(f, "entries:        {}", self.entries)?;
        write!(f, "load factor:    {:.3}", self.load_factor)
    }
}
