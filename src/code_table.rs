//! Byte to transition-code mapping.
//!
//! Every input byte maps to a code in `1..=256`; code `0` is the terminal
//! transition that marks the end of a key. Children of a node are kept in
//! code order, so the table also fixes the iteration order of the trie.

use std::fmt;

use crate::error::{Error, Result};

/// Code of the transition that ends a key.
pub const TERMINAL: u16 = 0;

/// Number of distinct byte codes.
pub const ALPHABET_SIZE: usize = 256;

/// Version stamp written next to the table in persisted buffers.
pub const CODE_TABLE_VERSION: u16 = 1;

/// Bijection between bytes and non-terminal codes.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeTable {
    codes: [u16; ALPHABET_SIZE],
    /// `bytes[c - 1]` is the byte with code `c`.
    bytes: [u8; ALPHABET_SIZE],
}

impl CodeTable {
    /// `code = byte + 1`: iteration is plain lexicographic byte order.
    pub fn identity() -> Self {
        let mut codes = [0u16; ALPHABET_SIZE];
        let mut bytes = [0u8; ALPHABET_SIZE];
        for b in 0..ALPHABET_SIZE {
            codes[b] = b as u16 + 1;
            bytes[b] = b as u8;
        }
        Self { codes, bytes }
    }

    /// Bytes in `front` get the lowest codes, in the given order; all other
    /// bytes follow in ascending byte order.
    pub fn with_priority(front: &[u8]) -> Result<Self> {
        let mut seen = [false; ALPHABET_SIZE];
        let mut order = Vec::with_capacity(ALPHABET_SIZE);
        for &b in front {
            if seen[b as usize] {
                return Err(Error::InvalidCodeTable(format!(
                    "byte 0x{b:02x} listed twice"
                )));
            }
            seen[b as usize] = true;
            order.push(b);
        }
        order.extend((0..=u8::MAX).filter(|b| !seen[*b as usize]));
        Self::from_order(&order)
    }

    /// Builds a table from a full permutation: `order[i]` gets code `i + 1`.
    pub fn from_order(order: &[u8]) -> Result<Self> {
        if order.len() != ALPHABET_SIZE {
            return Err(Error::InvalidCodeTable(format!(
                "expected {ALPHABET_SIZE} entries, got {}",
                order.len()
            )));
        }
        let mut codes = [u16::MAX; ALPHABET_SIZE];
        let mut bytes = [0u8; ALPHABET_SIZE];
        for (i, &b) in order.iter().enumerate() {
            if codes[b as usize] != u16::MAX {
                return Err(Error::InvalidCodeTable(format!(
                    "byte 0x{b:02x} appears twice"
                )));
            }
            codes[b as usize] = i as u16 + 1;
            bytes[i] = b;
        }
        Ok(Self { codes, bytes })
    }

    #[inline]
    pub fn code(&self, byte: u8) -> u16 {
        self.codes[byte as usize]
    }

    /// The byte for a non-terminal code; `None` for [`TERMINAL`] or codes
    /// outside the table.
    #[inline]
    pub fn byte(&self, code: u16) -> Option<u8> {
        match code {
            TERMINAL => None,
            c if (c as usize) <= ALPHABET_SIZE => Some(self.bytes[c as usize - 1]),
            _ => None,
        }
    }

    /// Bytes in code order.
    pub fn order(&self) -> &[u8; ALPHABET_SIZE] {
        &self.bytes
    }

    pub fn is_identity(&self) -> bool {
        self.bytes.iter().enumerate().all(|(i, &b)| i == b as usize)
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for CodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str("CodeTable(identity)");
        }
        f.debug_tuple("CodeTable").field(&&self.bytes[..]).finish()
    }
}
