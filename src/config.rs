//! Tuning knobs for the trie.

use crate::array::BLOCK_SIZE;

/// Largest slot count the store may reach. Ids must stay below `i32::MAX`,
/// which is reserved as the root's CHECK sentinel.
pub const MAX_SLOTS: usize = (i32::MAX as usize + 1) - BLOCK_SIZE;

/// Default bound on key length in bytes.
pub const DEFAULT_MAX_KEY_LEN: usize = 1 << 16;

/// Configuration for a [`DoubleArrayTrie`](crate::DoubleArrayTrie).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Failed placement attempts after which an open block is closed and no
    /// longer searched when relocating sibling sets.
    pub max_trial: u32,
    /// Number of blocks allocated up front.
    pub initial_blocks: usize,
    /// Hard cap on the number of slots; growth past it is
    /// [`Error::ResourceExhausted`](crate::Error::ResourceExhausted).
    pub max_slots: usize,
    /// Longest accepted key, in bytes.
    pub max_key_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_trial: 1,
            initial_blocks: 1,
            max_slots: MAX_SLOTS,
            max_key_len: DEFAULT_MAX_KEY_LEN,
        }
    }
}

impl Config {
    pub(crate) fn normalized(mut self) -> Self {
        self.max_trial = self.max_trial.max(1);
        self.initial_blocks = self.initial_blocks.max(1);
        self.max_slots = self.max_slots.clamp(BLOCK_SIZE, MAX_SLOTS);
        self
    }
}
