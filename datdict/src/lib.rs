//! # datdict
//!
//! A dictionary over byte-string keys and `i32` values, backed by an
//! updatable double-array trie.
//!
//! ## Features
//!
//! - **Map operations**: set, get, delete, membership, `setdefault`, counters
//! - **Prefix queries**: every stored prefix of a query, and every stored
//!   extension of a node
//! - **Persistence**: atomic save to a file, memory-mapped load
//! - **Sharing**: [`SharedDict`] puts a dictionary behind a read-write lock
//!
//! ## Example
//!
//! ```rust
//! use datdict::Dict;
//!
//! let mut d = Dict::new();
//! d.set("twenty", 20).unwrap();
//! d.set("twenty two", 22).unwrap();
//!
//! assert_eq!(d.get("twenty").unwrap(), 20);
//! assert!(d.get("twenty one").is_err());
//!
//! let found: Vec<_> = d.find("twenty two").collect();
//! assert_eq!(found, vec![(b"twenty".to_vec(), 20), (b"twenty two".to_vec(), 22)]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod persist;
mod shared;

pub use dat_rs::{CodeTable, Entries, Node, NodeRef, Traversal};
pub use error::{DictError, Result};
pub use shared::SharedDict;

use std::path::Path;

use dat_rs::DoubleArrayTrie;

/// Configuration for a [`Dict`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Tuning of the underlying trie.
    pub trie: dat_rs::Config,
    /// Bytes that should sort first during iteration, in order.
    pub code_priority: Option<Vec<u8>>,
    /// Flush saved files to disk before renaming them into place.
    pub sync_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trie: dat_rs::Config::default(),
            code_priority: None,
            sync_on_save: true,
        }
    }
}

/// A byte-string to `i32` dictionary.
#[derive(Debug, Clone)]
pub struct Dict {
    trie: DoubleArrayTrie,
    sync_on_save: bool,
}

impl Dict {
    /// Create an empty dictionary with default configuration.
    pub fn new() -> Self {
        Self {
            trie: DoubleArrayTrie::new(),
            sync_on_save: Config::default().sync_on_save,
        }
    }

    /// Create an empty dictionary with the given configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let codes = match &config.code_priority {
            Some(front) => CodeTable::with_priority(front)?,
            None => CodeTable::identity(),
        };
        Ok(Self {
            trie: DoubleArrayTrie::with_config(config.trie, codes)?,
            sync_on_save: config.sync_on_save,
        })
    }

    /// Open a dictionary previously written by [`save`](Self::save).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut dict = Self::new();
        dict.load(path)?;
        Ok(dict)
    }

    /// Open a dictionary written by [`save`](Self::save), applying `config`.
    /// The trie limits are enforced on the loaded image; the code table is
    /// the one stored in the file.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let mut dict = Self {
            trie: DoubleArrayTrie::with_config(config.trie, CodeTable::identity())?,
            sync_on_save: config.sync_on_save,
        };
        dict.load(path)?;
        Ok(dict)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl AsRef<[u8]>, value: i32) -> Result<()> {
        self.trie.insert(key.as_ref(), value)?;
        Ok(())
    }

    /// The value under `key`; [`KeyNotFound`](dat_rs::Error::KeyNotFound)
    /// if absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<i32> {
        self.lookup(key)
            .ok_or(DictError::Trie(dat_rs::Error::KeyNotFound))
    }

    /// The value under `key`, if any.
    pub fn lookup(&self, key: impl AsRef<[u8]>) -> Option<i32> {
        self.trie.get(key.as_ref())
    }

    /// The value under `key`, or `default` if absent.
    pub fn get_or(&self, key: impl AsRef<[u8]>, default: i32) -> i32 {
        self.lookup(key).unwrap_or(default)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.trie.contains_key(key.as_ref())
    }

    /// Delete `key`, returning its value;
    /// [`KeyNotFound`](dat_rs::Error::KeyNotFound) if absent.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Result<i32> {
        self.trie
            .remove(key.as_ref())
            .ok_or(DictError::Trie(dat_rs::Error::KeyNotFound))
    }

    /// The value under `key`; if absent, stores `default` first.
    pub fn setdefault(&mut self, key: impl AsRef<[u8]>, default: i32) -> Result<i32> {
        let key = key.as_ref();
        if let Some(v) = self.trie.get(key) {
            return Ok(v);
        }
        self.trie.insert(key, default)?;
        Ok(default)
    }

    /// Add `delta` to the value under `key` (absent counts as 0) and return
    /// the result.
    pub fn add(&mut self, key: impl AsRef<[u8]>, delta: i32) -> Result<i32> {
        Ok(self.trie.add(key.as_ref(), delta)?)
    }

    /// Store every `(key, value)` pair from `iter`, in order.
    ///
    /// Stops at the first pair the trie rejects and returns its error; pairs
    /// before it stay stored, pairs after it are not consumed.
    pub fn try_extend<K, I>(&mut self, iter: I) -> Result<()>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, i32)>,
    {
        for (k, v) in iter {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.trie.clear();
    }

    /// All `(key, value)` pairs in key order. Same as [`items`](Self::items).
    pub fn iter(&self) -> Entries<'_> {
        self.trie.iter()
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.trie.keys()
    }

    /// All values, in key order.
    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.trie.values()
    }

    /// All `(key, value)` pairs in key order.
    pub fn items(&self) -> Entries<'_> {
        self.trie.iter()
    }

    /// Every stored key that is a prefix of `query`, shortest first.
    pub fn find<'a, Q>(&'a self, query: &'a Q) -> impl Iterator<Item = (Vec<u8>, i32)> + 'a
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.trie
            .common_prefix(query.as_ref())
            .map(|(k, v)| (k.to_vec(), v))
    }

    /// Keys returned by [`find`](Self::find).
    pub fn find_keys<'a, Q>(&'a self, query: &'a Q) -> impl Iterator<Item = Vec<u8>> + 'a
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.find(query).map(|(k, _)| k)
    }

    /// Values returned by [`find`](Self::find).
    pub fn find_values<'a, Q>(&'a self, query: &'a Q) -> impl Iterator<Item = i32> + 'a
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.trie.common_prefix(query.as_ref()).map(|(_, v)| v)
    }

    /// Node at the end of `path`, if the path exists.
    pub fn get_node(&self, path: impl AsRef<[u8]>) -> Option<Node<'_>> {
        self.trie.get_node(path.as_ref())
    }

    /// Write the dictionary to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persist::write_trie(&self.trie, path.as_ref(), self.sync_on_save)
    }

    /// Replace the contents with a file written by [`save`](Self::save).
    /// On error the dictionary is unchanged.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        persist::read_trie(&mut self.trie, path.as_ref())
    }

    /// The underlying trie.
    pub fn trie(&self) -> &DoubleArrayTrie {
        &self.trie
    }

    /// Heap bytes held by the dictionary.
    pub fn memory_usage(&self) -> usize {
        self.trie.memory_usage()
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = (Vec<u8>, i32);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Entries<'a> {
        self.iter()
    }
}
