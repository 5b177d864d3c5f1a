//! Read-only queries: exact match, common-prefix search, predictive search and
//! ordered enumeration.
//!
//! Enumeration is a depth-first walk over the sibling links, so keys come out
//! in code order: a key before its extensions, siblings by ascending code.

use crate::array::ROOT;
use crate::code_table::TERMINAL;
use crate::trie::{Codes, DoubleArrayTrie};

impl DoubleArrayTrie {
    /// Value stored under exactly `key`.
    pub fn get(&self, key: &[u8]) -> Option<i32> {
        self.walk(ROOT, key).and_then(|node| self.value_at(node))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Every stored key that is a prefix of `query` (the empty key and
    /// `query` itself included), shortest first.
    pub fn common_prefix<'k>(&self, query: &'k [u8]) -> CommonPrefix<'_, 'k> {
        CommonPrefix {
            trie: self,
            query,
            node: Some(ROOT),
            pos: 0,
        }
    }

    /// Every stored key starting with `prefix`, in code order.
    pub fn predict(&self, prefix: &[u8]) -> Entries<'_> {
        Entries {
            dfs: Dfs::new(self, self.walk(ROOT, prefix), prefix.to_vec()),
        }
    }

    /// All `(key, value)` pairs in code order.
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            dfs: Dfs::new(self, Some(ROOT), Vec::new()),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        let mut dfs = Dfs::new(self, Some(ROOT), Vec::new());
        std::iter::from_fn(move || dfs.next_key().map(|(_, v)| v))
    }
}

impl<'a> IntoIterator for &'a DoubleArrayTrie {
    type Item = (Vec<u8>, i32);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Entries<'a> {
        self.iter()
    }
}

/// Iterator returned by [`DoubleArrayTrie::common_prefix`].
pub struct CommonPrefix<'a, 'k> {
    trie: &'a DoubleArrayTrie,
    query: &'k [u8],
    node: Option<u32>,
    pos: usize,
}

impl<'a, 'k> Iterator for CommonPrefix<'a, 'k> {
    type Item = (&'k [u8], i32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.node?;
            let pos = self.pos;
            let value = self.trie.value_at(node);
            self.node = self
                .query
                .get(pos)
                .and_then(|&b| self.trie.step(node, self.trie.codes.code(b)));
            self.pos += 1;
            if let Some(value) = value {
                return Some((&self.query[..pos], value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.node {
            None => (0, Some(0)),
            Some(_) => (0, Some(self.query.len() + 1 - self.pos)),
        }
    }
}

/// Iterator over `(key, value)` pairs, returned by [`DoubleArrayTrie::iter`]
/// and [`DoubleArrayTrie::predict`].
pub struct Entries<'a> {
    dfs: Dfs<'a>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (Vec<u8>, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, value) = self.dfs.next_key()?;
        Some((self.dfs.key().to_vec(), value))
    }
}

#[derive(Clone, Copy)]
struct Frame {
    id: u32,
    code: u16,
    /// Length of the path to `id`; a terminal shares its owner's depth.
    depth: usize,
}

/// Depth-first enumeration of the keys below one node.
pub(crate) struct Dfs<'a> {
    trie: &'a DoubleArrayTrie,
    stack: Vec<Frame>,
    key: Vec<u8>,
    codes: Codes,
}

impl<'a> Dfs<'a> {
    /// Walks the subtree of `start`, whose path is `path`. `None` yields
    /// nothing.
    pub(crate) fn new(trie: &'a DoubleArrayTrie, start: Option<u32>, path: Vec<u8>) -> Self {
        let mut dfs = Self {
            trie,
            stack: Vec::new(),
            key: path,
            codes: Codes::new(),
        };
        if let Some(start) = start {
            let depth = dfs.key.len();
            dfs.expand(start, depth);
        }
        dfs
    }

    fn expand(&mut self, id: u32, depth: usize) {
        self.codes.clear();
        self.trie.child_codes(id, &mut self.codes);
        let base = self.trie.store.slots[id as usize].base as u32;
        for &code in self.codes.iter().rev() {
            self.stack.push(Frame {
                id: base ^ code as u32,
                code,
                depth: if code == TERMINAL { depth } else { depth + 1 },
            });
        }
    }

    /// Advances to the next stored key and returns the id of its node and its
    /// value; [`key`](Self::key) then holds the key.
    pub(crate) fn next_key(&mut self) -> Option<(u32, i32)> {
        while let Some(frame) = self.stack.pop() {
            if frame.code == TERMINAL {
                self.key.truncate(frame.depth);
                let slot = self.trie.store.slots[frame.id as usize];
                return Some((slot.check as u32, slot.base));
            }
            self.key.truncate(frame.depth - 1);
            self.key.extend(self.trie.codes.byte(frame.code));
            self.expand(frame.id, frame.depth);
        }
        None
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_table::CodeTable;

    fn sample() -> DoubleArrayTrie {
        let mut t = DoubleArrayTrie::new();
        for (k, v) in [
            ("", 0),
            ("a", 1),
            ("ab", 2),
            ("abc", 3),
            ("abd", 4),
            ("b", 5),
            ("bcd", 6),
        ] {
            t.insert(k.as_bytes(), v).unwrap();
        }
        t
    }

    fn strs(items: impl Iterator<Item = (Vec<u8>, i32)>) -> Vec<(String, i32)> {
        items
            .map(|(k, v)| (String::from_utf8(k).unwrap(), v))
            .collect()
    }

    #[test]
    fn test_contains_key() {
        let t = sample();
        assert!(t.contains_key(b"abc"));
        assert!(t.contains_key(b""));
        assert!(!t.contains_key(b"bc"));
    }

    #[test]
    fn test_common_prefix() {
        let t = sample();
        let found: Vec<_> = t.common_prefix(b"abcz").collect();
        assert_eq!(
            found,
            vec![(&b""[..], 0), (&b"a"[..], 1), (&b"ab"[..], 2), (&b"abc"[..], 3)]
        );

        let found: Vec<_> = t.common_prefix(b"bc").collect();
        assert_eq!(found, vec![(&b""[..], 0), (&b"b"[..], 5)]);

        let found: Vec<_> = t.common_prefix(b"").collect();
        assert_eq!(found, vec![(&b""[..], 0)]);

        assert_eq!(DoubleArrayTrie::new().common_prefix(b"abc").count(), 0);
    }

    #[test]
    fn test_common_prefix_borrows_query() {
        let t = sample();
        let query = b"abd".to_vec();
        let lens: Vec<usize> = t.common_prefix(&query).map(|(k, _)| k.len()).collect();
        assert_eq!(lens, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_predict() {
        let t = sample();
        assert_eq!(
            strs(t.predict(b"ab")),
            vec![
                ("ab".to_string(), 2),
                ("abc".to_string(), 3),
                ("abd".to_string(), 4)
            ]
        );
        assert_eq!(strs(t.predict(b"bc")), vec![("bcd".to_string(), 6)]);
        assert_eq!(t.predict(b"x").count(), 0);
        assert_eq!(t.predict(b"abcd").count(), 0);
        assert_eq!(t.predict(b"").count(), t.len());
    }

    #[test]
    fn test_iter_order() {
        let t = sample();
        let keys: Vec<String> = t
            .keys()
            .map(|k| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["", "a", "ab", "abc", "abd", "b", "bcd"]);
        let values: Vec<i32> = t.values().collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!((&t).into_iter().count(), 7);
    }

    #[test]
    fn test_iter_follows_code_table() {
        let mut t = DoubleArrayTrie::with_code_table(CodeTable::with_priority(b"zb").unwrap());
        for k in ["a", "b", "z", "ba", "bz"] {
            t.insert(k.as_bytes(), 0).unwrap();
        }
        let keys: Vec<String> = t
            .keys()
            .map(|k| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["z", "b", "bz", "ba", "a"]);
    }

    #[test]
    fn test_binary_keys() {
        let mut t = DoubleArrayTrie::new();
        t.insert(&[0xff, 0x00], 1).unwrap();
        t.insert(&[0x00], 2).unwrap();
        t.insert(&[0x00, 0x00, 0x00], 3).unwrap();
        let got: Vec<_> = t.iter().collect();
        assert_eq!(
            got,
            vec![(vec![0x00], 2), (vec![0x00, 0x00, 0x00], 3), (vec![0xff, 0x00], 1)]
        );
    }
}
