//! # dat-rs
//!
//! An efficiently-updatable double-array trie mapping byte-string keys to
//! `i32` values.
//!
//! Nodes live in one flat array of `(base, check)` pairs: the child of `s`
//! through code `c` is `base[s] ^ c`, and it belongs to `s` only if its CHECK
//! equals `s`. Lookup is one array probe per byte. Insertion and erasure keep
//! the array compact by tracking free slots per block of 512 and relocating
//! the smaller of two colliding sibling sets.
//!
//! ## Example
//!
//! ```rust
//! use dat_rs::DoubleArrayTrie;
//!
//! let mut trie = DoubleArrayTrie::new();
//! trie.insert(b"twenty", 20).unwrap();
//! trie.insert(b"twenty two", 22).unwrap();
//!
//! assert_eq!(trie.get(b"twenty"), Some(20));
//!
//! let found: Vec<_> = trie.common_prefix(b"twenty two").collect();
//! assert_eq!(found, vec![(&b"twenty"[..], 20), (&b"twenty two"[..], 22)]);
//!
//! let copy = dat_rs::DoubleArrayTrie::from_bytes(&trie.to_bytes()).unwrap();
//! assert_eq!(copy.predict(b"tw").count(), 2);
//! ```

#![forbid(unsafe_code)]

mod array;
pub mod code_table;
mod config;
mod error;
mod node;
mod search;
mod serialize;
mod trie;

pub use code_table::CodeTable;
pub use config::{Config, DEFAULT_MAX_KEY_LEN, MAX_SLOTS};
pub use error::{Error, Result};
pub use node::{Children, Descendants, Node, NodeRef, Traversal};
pub use search::{CommonPrefix, Entries};
pub use serialize::{FORMAT_VERSION, MAGIC};
pub use trie::DoubleArrayTrie;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut t = DoubleArrayTrie::new();
        t.insert(b"hello", 1).unwrap();
        t.insert(b"world", 2).unwrap();
        assert_eq!(t.get(b"hello"), Some(1));
        assert_eq!(t.get(b"world"), Some(2));
        assert_eq!(t.get(b"missing"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_update() {
        let mut t = DoubleArrayTrie::new();
        assert_eq!(t.insert(b"key", 1).unwrap(), None);
        assert_eq!(t.insert(b"key", 2).unwrap(), Some(1));
        assert_eq!(t.get(b"key"), Some(2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut t = DoubleArrayTrie::new();
        t.insert(b"a", 1).unwrap();
        t.insert(b"b", 2).unwrap();
        t.insert(b"c", 3).unwrap();

        assert_eq!(t.remove(b"b"), Some(2));
        assert_eq!(t.get(b"b"), None);
        assert_eq!(t.len(), 2);

        // Reinserting a removed key should increase length.
        assert_eq!(t.insert(b"b", 4).unwrap(), None);
        assert_eq!(t.get(b"b"), Some(4));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_many() {
        let mut t = DoubleArrayTrie::new();
        for i in 0..10_000i32 {
            let key = format!("key{:05}", i);
            t.insert(key.as_bytes(), i).unwrap();
        }
        assert_eq!(t.len(), 10_000);
        for i in 0..10_000i32 {
            let key = format!("key{:05}", i);
            assert_eq!(t.get(key.as_bytes()), Some(i), "Failed at {}", i);
        }
        let keys: Vec<Vec<u8>> = t.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_memory_usage_tracks_growth() {
        let mut t = DoubleArrayTrie::new();
        let empty = t.memory_usage();
        for i in 0..5000i32 {
            t.insert(&i.to_le_bytes(), i).unwrap();
        }
        assert!(t.memory_usage() > empty);
        assert!(t.num_slots() >= t.num_nodes());
        t.shrink_to_fit();
        assert_eq!(t.get(&4999i32.to_le_bytes()), Some(4999));
    }

    #[test]
    fn test_node_navigation_example() {
        let mut t = DoubleArrayTrie::new();
        for (k, v) in [("tea", 1), ("ted", 2), ("ten", 3), ("to", 4)] {
            t.insert(k.as_bytes(), v).unwrap();
        }
        let te = t.get_node(b"te").unwrap();
        let kids: Vec<u8> = te.children().map(|(b, _)| b).collect();
        assert_eq!(kids, b"adn");
        match t.root().traverse(b"tex") {
            Traversal::NoPath { node, consumed } => {
                assert_eq!(consumed, 2);
                assert_eq!(node, te);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[cfg(test)]
mod proptests;
