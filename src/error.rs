//! Error types for trie operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Lookup or deletion of a key that is not stored.
    #[error("key not found")]
    KeyNotFound,

    /// A buffer handed to the loader is malformed, truncated, corrupted, or
    /// was written by an incompatible format or code-table version.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The array store cannot grow any further.
    #[error("resource exhausted: array store cannot grow past {limit} slots")]
    ResourceExhausted { limit: usize },

    /// A detached node handle no longer names a live node.
    #[error("invalid node handle")]
    InvalidHandle,

    #[error("key of {len} bytes exceeds the {max}-byte limit")]
    KeyTooLong { len: usize, max: usize },

    #[error("invalid code table: {0}")]
    InvalidCodeTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
