use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;

use memmap2::Mmap;
use tracing::info;

use crate::chain_map::ChainHashMap;
use crate::error::Result;

impl<H> ChainHashMap<H> {
    /// Write the image to `path`, replacing any existing file, and sync it to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        self.sync(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(path = %path.display(), entries = self.len(), size = self.size(), "saved table");
        Ok(())
    }
}

impl<H> ChainHashMap<H>
where
    H: Fn(&[u8]) -> u64,
{
    /// Load a table saved with [`save`](Self::save), reading the file through a
    /// read-only memory map.
    pub fn open_path(path: impl AsRef<Path>, hash_fn: H) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // entries are copied out before the map is dropped
        let mmap = unsafe { Mmap::map(&file)? };
        let map = Self::from_bytes(&mmap, hash_fn)?;

        info!(path = %path.display(), entries = map.len(), size = map.size(), "opened table");
        Ok(map)
    }
}
