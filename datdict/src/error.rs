//! Error types for dictionary operations.

use std::io;

use thiserror::Error;

/// Errors returned by [`Dict`](crate::Dict) operations.
#[derive(Error, Debug)]
pub enum DictError {
    /// Reading or writing a dictionary file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The trie rejected the operation.
    #[error(transparent)]
    Trie(#[from] dat_rs::Error),
}

impl DictError {
    /// Whether this is a lookup or deletion of an absent key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DictError::Trie(dat_rs::Error::KeyNotFound))
    }
}

/// Result alias for dictionary operations.
pub type Result<T> = std::result::Result<T, DictError>;
