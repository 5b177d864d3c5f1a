//! The updatable double array: insertion, value updates and erasure.
//!
//! Node `t` is a child of `s` through code `c` iff
//! `t == base[s] ^ c && check[t] == s`. A key's value lives in the BASE of the
//! terminal node hanging off the key's last node through code 0. Every node
//! also records its first child and next sibling code so that a sibling set
//! can be enumerated, relocated or erased without scanning all 257 codes.

use std::fmt;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::array::{ArrayStore, Links, Slot, NO_BASE, NO_CODE, ROOT, ROOT_CHECK};
use crate::code_table::{CodeTable, TERMINAL};
use crate::config::Config;
use crate::error::{Error, Result};

/// Codes of one sibling set, ascending.
pub(crate) type Codes = SmallVec<[u16; 16]>;

/// A double-array trie mapping byte strings to `i32` values.
#[derive(Clone)]
pub struct DoubleArrayTrie {
    pub(crate) store: ArrayStore,
    pub(crate) codes: CodeTable,
    pub(crate) config: Config,
    pub(crate) count: usize,
    pub(crate) epoch: u64,
}

impl Default for DoubleArrayTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleArrayTrie {
    /// Creates an empty trie with the identity code table.
    pub fn new() -> Self {
        Self::with_code_table(CodeTable::identity())
    }

    /// Creates an empty trie whose children are ordered by `codes`.
    pub fn with_code_table(codes: CodeTable) -> Self {
        let config = Config::default();
        Self {
            store: ArrayStore::new(config.max_trial, config.max_slots),
            codes,
            config,
            count: 0,
            epoch: 0,
        }
    }

    /// Creates an empty trie with explicit tuning; fails only if
    /// `initial_blocks` cannot be reserved under `max_slots`.
    pub fn with_config(config: Config, codes: CodeTable) -> Result<Self> {
        let config = config.normalized();
        let mut store = ArrayStore::new(config.max_trial, config.max_slots);
        store.reserve_blocks(config.initial_blocks)?;
        Ok(Self {
            store,
            codes,
            config,
            count: 0,
            epoch: 0,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Structural generation counter. Changes whenever a slot is allocated,
    /// released or relocated, so detached node handles taken before the
    /// change are rejected by [`attach`](Self::attach).
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn code_table(&self) -> &CodeTable {
        &self.codes
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Slots allocated in the array, free ones included.
    pub fn num_slots(&self) -> usize {
        self.store.len()
    }

    /// Occupied slots: the root, every inner node and every terminal.
    pub fn num_nodes(&self) -> usize {
        self.store.num_nodes()
    }

    /// Heap bytes held by the trie.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.store.memory_usage()
    }

    pub fn shrink_to_fit(&mut self) {
        self.store.shrink_to_fit();
    }

    /// Removes every key, keeping the code table and configuration.
    pub fn clear(&mut self) {
        self.store = ArrayStore::new(self.config.max_trial, self.config.max_slots);
        self.count = 0;
        self.bump_epoch();
    }

    /// Stores `value` under `key`, returning the value it replaced.
    ///
    /// On failure the trie is left holding exactly the keys it held before.
    pub fn insert(&mut self, key: &[u8], value: i32) -> Result<Option<i32>> {
        let (leaf, created) = self.value_slot(key)?;
        let old = std::mem::replace(&mut self.store.slots[leaf as usize].base, value);
        Ok((!created).then_some(old))
    }

    /// Adds `delta` to the value under `key`, treating a missing key as 0.
    /// Returns the new value; overflow wraps.
    pub fn add(&mut self, key: &[u8], delta: i32) -> Result<i32> {
        let (leaf, _) = self.value_slot(key)?;
        let value = &mut self.store.slots[leaf as usize].base;
        *value = value.wrapping_add(delta);
        Ok(*value)
    }

    /// Erases `key`, returning its value. Inner nodes left without any key
    /// below them are released too.
    pub fn remove(&mut self, key: &[u8]) -> Option<i32> {
        let from = self.walk(ROOT, key)?;
        let leaf = self.terminal(from)?;
        let value = self.store.slots[leaf as usize].base;
        self.detach(from, leaf);
        self.prune(from);
        self.count -= 1;
        Some(value)
    }

    // ========================================================================
    // Read-side navigation
    // ========================================================================

    /// Child of `from` through `code`, if it exists.
    #[inline]
    pub(crate) fn step(&self, from: u32, code: u16) -> Option<u32> {
        let base = self.store.slots[from as usize].base;
        if base < 0 {
            return None;
        }
        let to = base as u32 ^ code as u32;
        (self.store.slots[to as usize].check == from as i32).then_some(to)
    }

    /// Follows `bytes` from `from`.
    pub(crate) fn walk(&self, from: u32, bytes: &[u8]) -> Option<u32> {
        bytes
            .iter()
            .try_fold(from, |node, &b| self.step(node, self.codes.code(b)))
    }

    #[inline]
    pub(crate) fn terminal(&self, from: u32) -> Option<u32> {
        self.step(from, TERMINAL)
    }

    #[inline]
    pub(crate) fn value_at(&self, from: u32) -> Option<i32> {
        self.terminal(from)
            .map(|leaf| self.store.slots[leaf as usize].base)
    }

    /// Parent of `id` and the code of the edge leading to it.
    pub(crate) fn parent_of(&self, id: u32) -> Option<(u32, u16)> {
        if id == ROOT {
            return None;
        }
        let parent = self.store.slots[id as usize].check as u32;
        let base = self.store.slots[parent as usize].base as u32;
        Some((parent, (base ^ id) as u16))
    }

    /// Appends the child codes of `id` to `out`, terminal first.
    pub(crate) fn child_codes(&self, id: u32, out: &mut Codes) {
        let base = self.store.slots[id as usize].base;
        let mut c = self.store.links[id as usize].child;
        while c != NO_CODE {
            out.push(c);
            c = self.store.links[(base as u32 ^ c as u32) as usize].sibling;
        }
    }

    // ========================================================================
    // Write-side machinery
    // ========================================================================

    #[inline]
    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Walks `key` creating missing nodes, and returns the terminal that holds
    /// its value plus whether that terminal was just created.
    fn value_slot(&mut self, key: &[u8]) -> Result<(u32, bool)> {
        let max = self.config.max_key_len;
        if key.len() > max {
            return Err(Error::KeyTooLong {
                len: key.len(),
                max,
            });
        }

        let mut from = ROOT;
        for &b in key {
            let code = self.codes.code(b);
            from = match self.follow(from, code) {
                Ok(to) => to,
                Err(err) => {
                    self.rollback(from, &err);
                    return Err(err);
                }
            };
        }
        if let Some(leaf) = self.terminal(from) {
            return Ok((leaf, false));
        }
        match self.follow(from, TERMINAL) {
            Ok(leaf) => {
                self.count += 1;
                Ok((leaf, true))
            }
            Err(err) => {
                self.rollback(from, &err);
                Err(err)
            }
        }
    }

    /// Undoes the inner nodes a failed insertion already created.
    fn rollback(&mut self, from: u32, err: &Error) {
        warn!(node = from, error = %err, "insertion failed, pruning partial path");
        self.prune(from);
    }

    /// Child of `from` through `code`, created if missing.
    fn follow(&mut self, from: u32, code: u16) -> Result<u32> {
        let base = self.store.slots[from as usize].base;
        if base < 0 {
            let e = self.store.find_place()?;
            let base = (e ^ code as u32) as i32;
            self.store.slots[from as usize].base = base;
            let to = self.claim(base, code, from);
            self.push_sibling(from, base, code);
            return Ok(to);
        }

        let to = base as u32 ^ code as u32;
        let check = self.store.slots[to as usize].check;
        if check < 0 {
            let to = self.claim(base, code, from);
            self.push_sibling(from, base, code);
            Ok(to)
        } else if check != from as i32 {
            self.resolve(from, base, code)
        } else {
            Ok(to)
        }
    }

    /// Occupies the free slot `base ^ code` with a fresh child of `from`.
    fn claim(&mut self, base: i32, code: u16, from: u32) -> u32 {
        let e = base as u32 ^ code as u32;
        self.store.alloc(e);
        self.store.slots[e as usize] = Slot {
            base: if code == TERMINAL { 0 } else { NO_BASE },
            check: from as i32,
        };
        self.store.links[e as usize] = Links::EMPTY;
        self.bump_epoch();
        e
    }

    /// Links `code` into `from`'s child list, keeping it sorted.
    fn push_sibling(&mut self, from: u32, base: i32, code: u16) {
        let node = |c: u16| (base as u32 ^ c as u32) as usize;
        let head = self.store.links[from as usize].child;
        if head == NO_CODE || code < head {
            self.store.links[node(code)].sibling = head;
            self.store.links[from as usize].child = code;
            return;
        }
        let mut prev = head;
        loop {
            let next = self.store.links[node(prev)].sibling;
            if next == NO_CODE || code < next {
                self.store.links[node(code)].sibling = next;
                self.store.links[node(prev)].sibling = code;
                return;
            }
            prev = next;
        }
    }

    /// Unlinks `code` from `from`'s child list.
    fn pop_sibling(&mut self, from: u32, base: i32, code: u16) {
        let node = |c: u16| (base as u32 ^ c as u32) as usize;
        let next = self.store.links[node(code)].sibling;
        let head = self.store.links[from as usize].child;
        if head == code {
            self.store.links[from as usize].child = next;
            return;
        }
        let mut prev = head;
        while prev != NO_CODE {
            let after = self.store.links[node(prev)].sibling;
            if after == code {
                self.store.links[node(prev)].sibling = next;
                return;
            }
            prev = after;
        }
        debug_assert!(false, "code {code} is not a child of {from}");
    }

    /// Whether `a` has strictly fewer children than `b`. Both must have at
    /// least one child.
    fn has_fewer_children(&self, a: u32, b: u32) -> bool {
        let (base_a, base_b) = (
            self.store.slots[a as usize].base as u32,
            self.store.slots[b as usize].base as u32,
        );
        let (mut ca, mut cb) = (
            self.store.links[a as usize].child,
            self.store.links[b as usize].child,
        );
        loop {
            ca = self.store.links[(base_a ^ ca as u32) as usize].sibling;
            cb = self.store.links[(base_b ^ cb as u32) as usize].sibling;
            if ca == NO_CODE || cb == NO_CODE {
                return cb != NO_CODE;
            }
        }
    }

    /// Collects `id`'s child codes with `extra` merged in at its sorted
    /// position.
    fn collect_with(&self, id: u32, extra: Option<u16>, out: &mut Codes) {
        let base = self.store.slots[id as usize].base as u32;
        let mut c = self.store.links[id as usize].child;
        if let Some(x) = extra {
            while c != NO_CODE && c < x {
                out.push(c);
                c = self.store.links[(base ^ c as u32) as usize].sibling;
            }
            out.push(x);
        }
        while c != NO_CODE {
            out.push(c);
            c = self.store.links[(base ^ c as u32) as usize].sibling;
        }
    }

    /// `from_n` wants child `code_n`, but slot `base_n ^ code_n` belongs to
    /// another parent. Moves whichever of the two sibling sets is smaller to a
    /// fresh base and returns the id of the new child.
    fn resolve(&mut self, from_n: u32, base_n: i32, code_n: u16) -> Result<u32> {
        let to_pn = base_n as u32 ^ code_n as u32;
        let occupant = self.store.slots[to_pn as usize].check;

        // The root can never move, so its slot always pushes the newcomer away.
        let (move_new, from, base_old) = match occupant {
            ROOT_CHECK => (true, from_n, base_n),
            p if !self.has_fewer_children(from_n, p as u32) => {
                (false, p as u32, self.store.slots[p as usize].base)
            }
            _ => (true, from_n, base_n),
        };

        let mut codes = Codes::new();
        self.collect_with(from, move_new.then_some(code_n), &mut codes);
        let e = if codes.len() == 1 {
            self.store.find_place()?
        } else {
            self.store.find_place_for(&codes)?
        };
        let base = (e ^ codes[0] as u32) as i32;
        trace!(
            parent = from,
            from = base_old,
            to = base,
            children = codes.len(),
            "relocating sibling set"
        );

        self.store.links[from as usize].child = codes[0];
        self.store.slots[from as usize].base = base;

        let mut from_n = from_n;
        for (i, &c) in codes.iter().enumerate() {
            let to = self.claim(base, c, from);
            self.store.links[to as usize].sibling = codes.get(i + 1).copied().unwrap_or(NO_CODE);
            if move_new && c == code_n {
                continue;
            }

            let old = base_old as u32 ^ c as u32;
            let moved = self.store.slots[old as usize];
            self.store.slots[to as usize].base = moved.base;
            if c != TERMINAL {
                let first = self.store.links[old as usize].child;
                self.store.links[to as usize].child = first;
                let mut gc = first;
                while gc != NO_CODE {
                    let g = (moved.base as u32 ^ gc as u32) as usize;
                    self.store.slots[g].check = to as i32;
                    gc = self.store.links[g].sibling;
                }
            }

            if !move_new && old == from_n {
                from_n = to;
            }
            if !move_new && old == to_pn {
                // The vacated slot becomes the requested child.
                self.store.slots[old as usize] = Slot {
                    base: if code_n == TERMINAL { 0 } else { NO_BASE },
                    check: from_n as i32,
                };
                self.store.links[old as usize] = Links::EMPTY;
                self.push_sibling(from_n, base_n, code_n);
            } else {
                self.store.release(old);
            }
        }
        self.bump_epoch();

        Ok(if move_new {
            base as u32 ^ code_n as u32
        } else {
            to_pn
        })
    }

    /// Unlinks and frees child `id` of `parent`.
    fn detach(&mut self, parent: u32, id: u32) {
        let base = self.store.slots[parent as usize].base;
        let code = (base as u32 ^ id) as u16;
        self.pop_sibling(parent, base, code);
        self.store.release(id);
        if self.store.links[parent as usize].child == NO_CODE {
            self.store.slots[parent as usize].base = NO_BASE;
        }
        self.bump_epoch();
    }

    /// Frees `node` and its ancestors for as long as they have no children.
    fn prune(&mut self, mut node: u32) {
        while node != ROOT && self.store.links[node as usize].child == NO_CODE {
            let parent = self.store.slots[node as usize].check as u32;
            self.detach(parent, node);
            node = parent;
        }
    }
}

impl fmt::Debug for DoubleArrayTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), v)),
            )
            .finish()
    }
}
