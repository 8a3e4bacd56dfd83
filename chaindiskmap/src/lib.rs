//! A separately chained hash table of byte keys and values that can be saved
//! as a single flat image and loaded back with validation.

mod chain_map;
pub mod config;
mod deserialize;
mod diag;
mod entry;
pub mod error;
pub mod hash;
mod iter;
pub mod layout;
mod serialize;
mod storage;

pub use chain_map::ChainHashMap;
pub use config::ResizeConfig;
pub use diag::Diagnostics;
pub use error::{ChainMapError, Result};
pub use hash::{DEFAULT_HASH, HashFn};
pub use iter::{Cursor, Iter};
