//! Flat binary image of the trie.
//!
//! Layout, all integers little-endian:
//! ```text
//! magic              4   b"DAT1"
//! format_version     u16
//! code_table_version u16
//! code_table_size    u16 (256)
//! reserved           u16
//! num_slots          u32 (highest occupied id + 1)
//! num_keys           u64
//! code_table         [u8; 256] (bytes in code order)
//! slots              num_slots * (base i32, check i32)
//! checksum           u64 xxh64 of everything above
//! ```
//! Free slots are written as `(0, -1)`; free rings, block lists and sibling
//! links are rebuilt on load.

use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::array::{ArrayStore, Slot, NO_BASE, NO_CODE, ROOT, ROOT_CHECK};
use crate::code_table::{CodeTable, ALPHABET_SIZE, CODE_TABLE_VERSION, TERMINAL};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::trie::DoubleArrayTrie;

pub const MAGIC: [u8; 4] = *b"DAT1";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 2 + 2 + 2 + 4 + 8 + ALPHABET_SIZE;
const SLOT_LEN: usize = 8;
const CHECKSUM_LEN: usize = 8;

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidFormat(msg.into())
}

/// Little-endian cursor over a buffer whose length was already checked.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
}

impl DoubleArrayTrie {
    /// Serializes the trie into a self-contained buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let used = self.store.used_len();
        let mut buf = Vec::with_capacity(HEADER_LEN + used * SLOT_LEN + CHECKSUM_LEN);
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&CODE_TABLE_VERSION.to_le_bytes());
        buf.extend_from_slice(&(ALPHABET_SIZE as u16).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(used as u32).to_le_bytes());
        buf.extend_from_slice(&(self.count as u64).to_le_bytes());
        buf.extend_from_slice(self.codes.order());
        for &slot in &self.store.slots[..used] {
            let slot = if slot.is_free() { Slot::VACANT } else { slot };
            buf.extend_from_slice(&slot.base.to_le_bytes());
            buf.extend_from_slice(&slot.check.to_le_bytes());
        }
        let checksum = xxh64(&buf, 0);
        buf.extend_from_slice(&checksum.to_le_bytes());
        debug!(slots = used, keys = self.count, bytes = buf.len(), "serialized trie");
        buf
    }

    /// Rebuilds a trie from [`to_bytes`](Self::to_bytes) output with the
    /// default configuration.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(data, Config::default())
    }

    /// Rebuilds a trie from [`to_bytes`](Self::to_bytes) output. The buffer
    /// is fully validated; anything malformed is [`Error::InvalidFormat`].
    pub fn from_bytes_with_config(data: &[u8], config: Config) -> Result<Self> {
        let config = config.normalized();
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(invalid(format!("buffer of {} bytes is truncated", data.len())));
        }
        let mut r = Reader { data, pos: 0 };
        if r.take::<4>() != MAGIC {
            return Err(invalid("bad magic"));
        }
        let version = r.u16();
        if version != FORMAT_VERSION {
            return Err(invalid(format!("unsupported format version {version}")));
        }
        let table_version = r.u16();
        if table_version != CODE_TABLE_VERSION {
            return Err(invalid(format!(
                "unsupported code table version {table_version}"
            )));
        }
        let table_size = r.u16() as usize;
        if table_size != ALPHABET_SIZE {
            return Err(invalid(format!("code table of {table_size} entries")));
        }
        let _reserved = r.u16();
        let num_slots = r.u32() as usize;
        let num_keys = r.u64();

        let expected = num_slots
            .checked_mul(SLOT_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN + CHECKSUM_LEN))
            .ok_or_else(|| invalid("slot count overflows"))?;
        if data.len() != expected {
            return Err(invalid(format!(
                "expected {expected} bytes for {num_slots} slots, got {}",
                data.len()
            )));
        }
        let (body, tail) = data.split_at(data.len() - CHECKSUM_LEN);
        let mut stored = [0u8; CHECKSUM_LEN];
        stored.copy_from_slice(tail);
        if xxh64(body, 0) != u64::from_le_bytes(stored) {
            return Err(invalid("checksum mismatch"));
        }

        let codes = CodeTable::from_order(&r.take::<ALPHABET_SIZE>())
            .map_err(|e| invalid(e.to_string()))?;

        if num_slots == 0 {
            return Err(invalid("missing root"));
        }
        let slots: Vec<Slot> = (0..num_slots)
            .map(|_| Slot {
                base: r.i32(),
                check: r.i32(),
            })
            .map(|s| if s.is_free() { Slot::VACANT } else { s })
            .collect();

        let (store, keys) = rebuild(slots, &config)?;
        if keys as u64 != num_keys {
            return Err(invalid(format!(
                "header claims {num_keys} keys, found {keys}"
            )));
        }
        debug!(slots = num_slots, keys, "loaded trie");
        Ok(Self {
            store,
            codes,
            config,
            count: keys,
            epoch: 0,
        })
    }

    /// Replaces the contents with a deserialized buffer, keeping this trie's
    /// configuration. On error `self` is untouched.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut loaded = Self::from_bytes_with_config(data, self.config.clone())?;
        loaded.epoch = self.epoch.wrapping_add(1);
        *self = loaded;
        Ok(())
    }
}

/// Validates raw slots and rebuilds the free-slot bookkeeping and sibling
/// links around them. Returns the store and the number of stored keys.
fn rebuild(mut slots: Vec<Slot>, config: &Config) -> Result<(ArrayStore, usize)> {
    let n = slots.len();
    if slots[ROOT as usize].check != ROOT_CHECK {
        return Err(invalid("root slot is not marked as root"));
    }

    // (parent, code, child) for every non-root node.
    let mut edges: Vec<(u32, u16, u32)> = Vec::new();
    for (id, slot) in slots.iter().enumerate().skip(1) {
        if slot.is_free() {
            continue;
        }
        let parent = slot.check as usize;
        if parent >= n || parent == id || slots[parent].is_free() {
            return Err(invalid(format!("slot {id} has invalid parent {parent}")));
        }
        let base = slots[parent].base;
        if base < 0 {
            return Err(invalid(format!("slot {id} hangs off childless slot {parent}")));
        }
        let code = base as u32 ^ id as u32;
        if code as usize > ALPHABET_SIZE {
            return Err(invalid(format!("slot {id} has out-of-range code {code}")));
        }
        edges.push((parent as u32, code as u16, id as u32));
    }

    let mut is_terminal = vec![false; n];
    for &(_, code, id) in &edges {
        is_terminal[id as usize] = code == TERMINAL;
    }
    let mut has_children = vec![false; n];
    for &(parent, _, id) in &edges {
        if is_terminal[parent as usize] {
            return Err(invalid(format!("slot {id} hangs off terminal slot {parent}")));
        }
        has_children[parent as usize] = true;
    }
    for id in 1..n {
        if !slots[id].is_free() && !is_terminal[id] && !has_children[id] {
            return Err(invalid(format!("slot {id} leads to no key")));
        }
    }
    if !has_children[ROOT as usize] {
        slots[ROOT as usize].base = NO_BASE;
    }

    let keys = is_terminal.iter().filter(|t| **t).count();
    let mut store = ArrayStore::from_slots(slots, config.max_trial, config.max_slots)?;

    edges.sort_unstable();
    for (i, &(parent, code, id)) in edges.iter().enumerate() {
        let first = i == 0 || edges[i - 1].0 != parent;
        if first {
            store.links[parent as usize].child = code;
        }
        store.links[id as usize].sibling = match edges.get(i + 1) {
            Some(&(next_parent, next_code, _)) if next_parent == parent => next_code,
            _ => NO_CODE,
        };
    }

    // Every node must hang below the root; anything else is a cycle.
    let mut reached = 0usize;
    let mut stack = vec![ROOT];
    while let Some(id) = stack.pop() {
        reached += 1;
        let base = store.slots[id as usize].base as u32;
        let mut c = store.links[id as usize].child;
        while c != NO_CODE {
            let child = base ^ c as u32;
            if c != TERMINAL {
                stack.push(child);
            } else {
                reached += 1;
            }
            c = store.links[child as usize].sibling;
        }
    }
    if reached != edges.len() + 1 {
        return Err(invalid(format!(
            "{} of {} nodes are unreachable from the root",
            edges.len() + 1 - reached,
            edges.len() + 1
        )));
    }

    Ok((store, keys))
}
