//! A dictionary shared between threads.

use std::path::Path;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use dat_rs::DoubleArrayTrie;

use crate::error::Result;
use crate::Dict;

/// A [`Dict`] behind a read-write lock: any number of concurrent readers or
/// one writer.
#[derive(Debug, Default)]
pub struct SharedDict {
    inner: RwLock<Dict>,
}

impl SharedDict {
    /// Wrap an existing dictionary.
    pub fn new(dict: Dict) -> Self {
        Self {
            inner: RwLock::new(dict),
        }
    }

    /// Shared access for queries that borrow the dictionary, such as
    /// iteration or node handles.
    pub fn read(&self) -> RwLockReadGuard<'_, Dict> {
        self.inner.read()
    }

    /// Exclusive access for batches of mutations.
    pub fn write(&self) -> RwLockWriteGuard<'_, Dict> {
        self.inner.write()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: impl AsRef<[u8]>, value: i32) -> Result<()> {
        self.inner.write().set(key, value)
    }

    /// The value under `key`, if any.
    pub fn lookup(&self, key: impl AsRef<[u8]>) -> Option<i32> {
        self.inner.read().lookup(key)
    }

    /// The value under `key`; `KeyNotFound` if absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<i32> {
        self.inner.read().get(key)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.inner.read().contains(key)
    }

    /// Delete `key`, returning its value.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> Result<i32> {
        self.inner.write().remove(key)
    }

    /// The value under `key`; if absent, stores `default` first.
    pub fn setdefault(&self, key: impl AsRef<[u8]>, default: i32) -> Result<i32> {
        self.inner.write().setdefault(key, default)
    }

    /// Add `delta` to the value under `key` and return the result.
    pub fn add(&self, key: impl AsRef<[u8]>, delta: i32) -> Result<i32> {
        self.inner.write().add(key, delta)
    }

    /// Every stored prefix of `query` with its value, shortest first.
    pub fn find(&self, query: impl AsRef<[u8]>) -> Vec<(Vec<u8>, i32)> {
        self.inner.read().find(query.as_ref()).collect()
    }

    /// Every stored key starting with `prefix`, with its value.
    pub fn predict(&self, prefix: impl AsRef<[u8]>) -> Vec<(Vec<u8>, i32)> {
        self.inner.read().trie().predict(prefix.as_ref()).collect()
    }

    /// An independent copy, rebuilt from the serialized image, that can be
    /// read without holding the lock.
    pub fn snapshot(&self) -> Result<Dict> {
        let (bytes, config, sync_on_save) = {
            let dict = self.inner.read();
            (
                dict.trie.to_bytes(),
                dict.trie.config().clone(),
                dict.sync_on_save,
            )
        };
        let trie = DoubleArrayTrie::from_bytes_with_config(&bytes, config)?;
        debug!(keys = trie.len(), bytes = bytes.len(), "took dictionary snapshot");
        Ok(Dict { trie, sync_on_save })
    }

    /// Write the dictionary to `path` under a read lock.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.read().save(path)
    }

    /// Replace the contents from `path`; readers see either the old or the
    /// new dictionary, never a mix.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.write().load(path)
    }

    /// Unwrap the dictionary.
    pub fn into_inner(self) -> Dict {
        self.inner.into_inner()
    }
}

impl From<Dict> for SharedDict {
    fn from(dict: Dict) -> Self {
        Self::new(dict)
    }
}
