//! Node handles for incremental navigation.
//!
//! A [`Node`] borrows the trie, so it cannot outlive a mutation. To keep a
//! position across mutations, [`detach`](Node::detach) it into a
//! [`NodeRef`] and [`attach`](DoubleArrayTrie::attach) it again later; this
//! fails once the trie's structure has changed in between.

use std::fmt;

use crate::array::ROOT;
use crate::code_table::TERMINAL;
use crate::error::{Error, Result};
use crate::search::Dfs;
use crate::trie::{Codes, DoubleArrayTrie};

/// A position in the trie: the root or the end of some path of stored-key
/// prefixes.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    trie: &'a DoubleArrayTrie,
    id: u32,
}

/// A node position detached from the trie borrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    id: u32,
    epoch: u64,
}

impl NodeRef {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Outcome of [`Node::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal<'a> {
    /// The whole path exists and ends at a stored key.
    Value(Node<'a>, i32),
    /// The whole path exists but no key ends there.
    NoValue(Node<'a>),
    /// The path leaves the trie after `consumed` bytes; `node` is the last
    /// node reached.
    NoPath { node: Node<'a>, consumed: usize },
}

impl DoubleArrayTrie {
    pub fn root(&self) -> Node<'_> {
        Node { trie: self, id: ROOT }
    }

    /// Node at the end of `path` from the root.
    pub fn get_node(&self, path: &[u8]) -> Option<Node<'_>> {
        self.root().child(path)
    }

    /// Re-binds a detached handle to this trie.
    pub fn attach(&self, handle: NodeRef) -> Result<Node<'_>> {
        if handle.epoch != self.epoch || !self.is_live_node(handle.id) {
            return Err(Error::InvalidHandle);
        }
        Ok(Node {
            trie: self,
            id: handle.id,
        })
    }

    /// Whether `id` is an occupied, non-terminal slot.
    fn is_live_node(&self, id: u32) -> bool {
        if id as usize >= self.store.len() || self.store.is_free(id) {
            return false;
        }
        match self.parent_of(id) {
            None => true,
            Some((_, code)) => code != TERMINAL,
        }
    }
}

impl<'a> Node<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT
    }

    /// Bytes leading from the root to this node.
    pub fn path(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut id = self.id;
        while let Some((parent, code)) = self.trie.parent_of(id) {
            bytes.extend(self.trie.codes.byte(code));
            id = parent;
        }
        bytes.reverse();
        bytes
    }

    /// The stored key ending here, if any.
    pub fn key(&self) -> Option<Vec<u8>> {
        self.is_key().then(|| self.path())
    }

    pub fn value(&self) -> Option<i32> {
        self.trie.value_at(self.id)
    }

    pub fn is_key(&self) -> bool {
        self.trie.terminal(self.id).is_some()
    }

    /// Descends along `bytes`.
    pub fn child(&self, bytes: &[u8]) -> Option<Node<'a>> {
        self.trie.walk(self.id, bytes).map(|id| Node {
            trie: self.trie,
            id,
        })
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.trie.parent_of(self.id).map(|(id, _)| Node {
            trie: self.trie,
            id,
        })
    }

    /// Direct children and the byte leading to each, in code order.
    pub fn children(&self) -> Children<'a> {
        let mut codes = Codes::new();
        self.trie.child_codes(self.id, &mut codes);
        codes.retain(|c| *c != TERMINAL);
        Children {
            trie: self.trie,
            base: self.trie.store.slots[self.id as usize].base as u32,
            codes: codes.into_iter(),
        }
    }

    /// Walks `bytes` as far as the trie allows.
    pub fn traverse(&self, bytes: &[u8]) -> Traversal<'a> {
        let mut id = self.id;
        for (i, &b) in bytes.iter().enumerate() {
            match self.trie.step(id, self.trie.codes.code(b)) {
                Some(next) => id = next,
                None => {
                    return Traversal::NoPath {
                        node: Node {
                            trie: self.trie,
                            id,
                        },
                        consumed: i,
                    }
                }
            }
        }
        let node = Node {
            trie: self.trie,
            id,
        };
        match node.value() {
            Some(v) => Traversal::Value(node, v),
            None => Traversal::NoValue(node),
        }
    }

    /// Key nodes below this node whose path continues with `suffix`, in code
    /// order. This node itself is included when `suffix` is empty.
    pub fn find_nodes(&self, suffix: &[u8]) -> Descendants<'a> {
        let start = self.trie.walk(self.id, suffix);
        let mut path = if start.is_some() {
            self.path()
        } else {
            Vec::new()
        };
        path.extend_from_slice(suffix);
        Descendants {
            trie: self.trie,
            dfs: Dfs::new(self.trie, start, path),
        }
    }

    /// Releases the borrow, keeping the position.
    pub fn detach(&self) -> NodeRef {
        NodeRef {
            id: self.id,
            epoch: self.trie.epoch,
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.trie, other.trie) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("path", &String::from_utf8_lossy(&self.path()))
            .finish()
    }
}

/// Iterator returned by [`Node::children`].
pub struct Children<'a> {
    trie: &'a DoubleArrayTrie,
    base: u32,
    codes: smallvec::IntoIter<[u16; 16]>,
}

impl<'a> Iterator for Children<'a> {
    type Item = (u8, Node<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let code = self.codes.next()?;
        let byte = self.trie.codes.byte(code)?;
        Some((
            byte,
            Node {
                trie: self.trie,
                id: self.base ^ code as u32,
            },
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.codes.size_hint()
    }
}

/// Iterator returned by [`Node::find_nodes`].
pub struct Descendants<'a> {
    trie: &'a DoubleArrayTrie,
    dfs: Dfs<'a>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        let (id, _) = self.dfs.next_key()?;
        Some(Node {
            trie: self.trie,
            id,
        })
    }
}
