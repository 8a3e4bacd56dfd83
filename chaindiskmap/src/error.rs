use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// Errors that can occur when working with a chained disk hash map
#[derive(Error, Debug)]
pub enum ChainMapError {
    /// Empty key or value, zero bucket count, or an unusable resize config
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `put` was called for a key that is already present
    #[error("Key already present")]
    DuplicateKey,

    /// Key not found in the map
    #[error("Key not found")]
    NotFound,

    /// A fallible allocation could not be satisfied
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// The image being loaded is truncated, malformed or not ours
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// The hash function supplied at load time is not the one the image was built with
    #[error("Hash mismatch: stored {stored:#x}, computed {computed:#x}")]
    HashMismatch { stored: u64, computed: u64 },

    /// The image does not fit in the 32-bit payload size of the file header
    #[error("Payload of {0} bytes is too large for the file header")]
    PayloadTooLarge(usize),

    /// IO errors when reading/writing the image, including short transfers
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ChainMapError>;

impl ChainMapError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        ChainMapError::CorruptData(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_and_messages() {
        let overflow = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
        let err: ChainMapError = overflow.into();
        assert!(matches!(err, ChainMapError::OutOfMemory(_)));

        let err: ChainMapError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, ChainMapError::Io(_)));

        let err = ChainMapError::corrupt("bad magic");
        assert_eq!(err.to_string(), "Corrupt data: bad magic");
    }
}
