//! BASE/CHECK slot array with block-based free-slot management.
//!
//! Slots are grouped into blocks of [`BLOCK_SIZE`]. Since every code is below
//! `BLOCK_SIZE`, `base ^ code` never leaves the block that `base` lives in.
//!
//! A free slot stores its neighbours in a per-block circular ring:
//! ```text
//! base  = -prev_free
//! check = -next_free
//! ```
//! Slot 0 is the root and never free, so a free slot's fields are always
//! strictly negative.
//!
//! Blocks themselves sit in one of three circular lists:
//! - full:   no free slot
//! - closed: one free slot, or too many failed placement trials
//! - open:   everything else; searched when placing a sibling set

use tracing::debug;

use crate::error::{Error, Result};

pub const BLOCK_BITS: u32 = 9;
pub const BLOCK_SIZE: usize = 1 << BLOCK_BITS;

/// Root node id.
pub const ROOT: u32 = 0;
/// CHECK of the root; larger than any id the store hands out.
pub const ROOT_CHECK: i32 = i32::MAX;
/// BASE of a non-terminal node without children.
pub const NO_BASE: i32 = -1;
/// "No code" in sibling/child links.
pub const NO_CODE: u16 = u16::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub base: i32,
    pub check: i32,
}

impl Slot {
    /// How unused slots look in a persisted buffer.
    pub const VACANT: Slot = Slot { base: 0, check: -1 };

    #[inline]
    pub fn is_free(self) -> bool {
        self.check < 0
    }
}

/// First-child and next-sibling codes of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Links {
    pub sibling: u16,
    pub child: u16,
}

impl Links {
    pub const EMPTY: Links = Links {
        sibling: NO_CODE,
        child: NO_CODE,
    };
}

#[derive(Clone, Copy, Debug)]
pub struct Block {
    pub prev: u32,
    pub next: u32,
    /// Free slots in this block.
    pub num: u16,
    /// Smallest sibling-set size known not to fit.
    pub reject: u16,
    pub trial: u32,
    /// First free slot of the ring.
    pub ehead: u32,
}

impl Block {
    fn fresh(bi: u32) -> Self {
        Self {
            prev: bi,
            next: bi,
            num: BLOCK_SIZE as u16,
            reject: BLOCK_SIZE as u16 + 1,
            trial: 0,
            ehead: bi << BLOCK_BITS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockList {
    Full,
    Closed,
    Open,
}

#[derive(Clone, Debug)]
pub struct ArrayStore {
    pub slots: Vec<Slot>,
    pub links: Vec<Links>,
    pub blocks: Vec<Block>,
    full: Option<u32>,
    closed: Option<u32>,
    open: Option<u32>,
    /// `reject[n]`: smallest set size that failed in a block with `n` free slots.
    reject: Vec<u16>,
    max_trial: u32,
    max_slots: usize,
}

impl ArrayStore {
    /// A store of one block holding only the root.
    pub fn new(max_trial: u32, max_slots: usize) -> Self {
        let mut store = Self::empty(max_trial, max_slots);
        store.push_fresh_block();
        store.alloc(ROOT);
        store.slots[ROOT as usize] = Slot {
            base: NO_BASE,
            check: ROOT_CHECK,
        };
        store
    }

    /// Grows the store until it has at least `total` blocks.
    pub fn reserve_blocks(&mut self, total: usize) -> Result<()> {
        while self.blocks.len() < total {
            self.add_block()?;
        }
        Ok(())
    }

    fn empty(max_trial: u32, max_slots: usize) -> Self {
        Self {
            slots: Vec::new(),
            links: Vec::new(),
            blocks: Vec::new(),
            full: None,
            closed: None,
            open: None,
            reject: (0..=BLOCK_SIZE as u16).map(|n| n + 1).collect(),
            max_trial,
            max_slots,
        }
    }

    /// Rebuilds free rings and block lists around an existing slot array.
    ///
    /// `slots` may end mid-block; the tail is padded with free slots. Any slot
    /// with a negative CHECK is treated as free. Links are left empty.
    pub fn from_slots(mut slots: Vec<Slot>, max_trial: u32, max_slots: usize) -> Result<Self> {
        let padded = slots.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
        if padded > max_slots {
            return Err(Error::ResourceExhausted { limit: max_slots });
        }
        slots.resize(padded, Slot::VACANT);

        let mut store = Self::empty(max_trial, max_slots);
        store.links = vec![Links::EMPTY; padded];
        let num_blocks = padded / BLOCK_SIZE;
        store.blocks = (0..num_blocks as u32).map(Block::fresh).collect();

        let mut free: Vec<u32> = Vec::with_capacity(BLOCK_SIZE);
        for bi in 0..num_blocks {
            let start = bi * BLOCK_SIZE;
            free.clear();
            free.extend(
                (start..start + BLOCK_SIZE)
                    .filter(|&e| slots[e].is_free())
                    .map(|e| e as u32),
            );
            for (i, &e) in free.iter().enumerate() {
                let prev = free[(i + free.len() - 1) % free.len()];
                let next = free[(i + 1) % free.len()];
                slots[e as usize] = Slot {
                    base: -(prev as i32),
                    check: -(next as i32),
                };
            }
            let block = &mut store.blocks[bi];
            block.num = free.len() as u16;
            block.ehead = free.first().copied().unwrap_or(start as u32);
            let list = match block.num {
                0 => BlockList::Full,
                1 => BlockList::Closed,
                _ => BlockList::Open,
            };
            store.push_block(bi as u32, list);
        }
        store.slots = slots;
        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots, root included.
    pub fn num_nodes(&self) -> usize {
        self.slots.len() - self.blocks.iter().map(|b| b.num as usize).sum::<usize>()
    }

    /// Highest occupied id plus one.
    pub fn used_len(&self) -> usize {
        self.slots
            .iter()
            .rposition(|s| !s.is_free())
            .map_or(0, |i| i + 1)
    }

    pub fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot>()
            + self.links.capacity() * std::mem::size_of::<Links>()
            + self.blocks.capacity() * std::mem::size_of::<Block>()
            + self.reject.capacity() * std::mem::size_of::<u16>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        self.links.shrink_to_fit();
        self.blocks.shrink_to_fit();
    }

    #[inline]
    pub fn is_free(&self, id: u32) -> bool {
        self.slots[id as usize].is_free()
    }

    /// A free slot for a node whose parent has no children yet.
    pub fn find_place(&mut self) -> Result<u32> {
        if let Some(bi) = self.closed {
            return Ok(self.blocks[bi as usize].ehead);
        }
        if let Some(bi) = self.open {
            return Ok(self.blocks[bi as usize].ehead);
        }
        Ok(self.add_block()? << BLOCK_BITS)
    }

    /// A free slot `e` such that `e ^ codes[0] ^ c` is free for every code `c`
    /// in `codes`. The caller derives the base as `e ^ codes[0]`.
    pub fn find_place_for(&mut self, codes: &[u16]) -> Result<u32> {
        debug_assert!(codes.len() > 1);
        let nc = codes.len() as u16;
        if let Some(head) = self.open {
            let last = self.blocks[head as usize].prev;
            let mut bi = head;
            loop {
                let next = self.blocks[bi as usize].next;
                let block = self.blocks[bi as usize];
                if block.num >= nc && nc < block.reject {
                    let mut e = block.ehead;
                    loop {
                        let base = e ^ codes[0] as u32;
                        if codes[1..]
                            .iter()
                            .all(|&c| self.slots[(base ^ c as u32) as usize].is_free())
                        {
                            self.blocks[bi as usize].ehead = e;
                            return Ok(e);
                        }
                        e = (-self.slots[e as usize].check) as u32;
                        if e == block.ehead {
                            break;
                        }
                    }
                }

                let block = &mut self.blocks[bi as usize];
                block.reject = nc;
                let num = block.num as usize;
                if nc < self.reject[num] {
                    self.reject[num] = nc;
                }
                block.trial += 1;
                if block.trial == self.max_trial {
                    self.transfer_block(bi, BlockList::Open, BlockList::Closed);
                }
                if bi == last {
                    break;
                }
                bi = next;
            }
        }
        Ok(self.add_block()? << BLOCK_BITS)
    }

    /// Takes free slot `e` out of its block's ring.
    pub fn alloc(&mut self, e: u32) {
        let bi = e >> BLOCK_BITS;
        let block = &mut self.blocks[bi as usize];
        debug_assert!(block.num > 0);
        block.num -= 1;
        if block.num == 0 {
            self.transfer_block(bi, BlockList::Closed, BlockList::Full);
            return;
        }

        let slot = self.slots[e as usize];
        let prev = (-slot.base) as usize;
        let next = (-slot.check) as usize;
        self.slots[prev].check = slot.check;
        self.slots[next].base = slot.base;

        let block = &mut self.blocks[bi as usize];
        if e == block.ehead {
            block.ehead = next as u32;
        }
        if block.num == 1 && block.trial != self.max_trial {
            self.transfer_block(bi, BlockList::Open, BlockList::Closed);
        }
    }

    /// Returns slot `e` to its block's ring and clears its links.
    pub fn release(&mut self, e: u32) {
        let bi = e >> BLOCK_BITS;
        let max_trial = self.max_trial;
        let block = &mut self.blocks[bi as usize];
        block.num += 1;

        if block.num == 1 {
            block.ehead = e;
            self.slots[e as usize] = Slot {
                base: -(e as i32),
                check: -(e as i32),
            };
            self.transfer_block(bi, BlockList::Full, BlockList::Closed);
        } else {
            let prev = block.ehead;
            let next = (-self.slots[prev as usize].check) as u32;
            self.slots[e as usize] = Slot {
                base: -(prev as i32),
                check: -(next as i32),
            };
            self.slots[prev as usize].check = -(e as i32);
            self.slots[next as usize].base = -(e as i32);

            let (num, trial) = (block.num, block.trial);
            if num == 2 || trial == max_trial {
                self.transfer_block(bi, BlockList::Closed, BlockList::Open);
            }
            self.blocks[bi as usize].trial = 0;
        }

        let block = &mut self.blocks[bi as usize];
        let floor = self.reject[block.num as usize];
        if block.reject < floor {
            block.reject = floor;
        }
        self.links[e as usize] = Links::EMPTY;
    }

    fn add_block(&mut self) -> Result<u32> {
        let end = self.slots.len() + BLOCK_SIZE;
        let limit = self.max_slots;
        if end > limit {
            return Err(Error::ResourceExhausted { limit });
        }
        let exhausted = |_| Error::ResourceExhausted { limit };
        self.slots.try_reserve(BLOCK_SIZE).map_err(exhausted)?;
        self.links.try_reserve(BLOCK_SIZE).map_err(exhausted)?;
        self.blocks.try_reserve(1).map_err(exhausted)?;
        Ok(self.push_fresh_block())
    }

    /// Appends a block whose slots are all free and puts it on the open list.
    fn push_fresh_block(&mut self) -> u32 {
        let start = self.slots.len();
        let end = start + BLOCK_SIZE;
        for i in 0..BLOCK_SIZE {
            let prev = start + (i + BLOCK_SIZE - 1) % BLOCK_SIZE;
            let next = start + (i + 1) % BLOCK_SIZE;
            self.slots.push(Slot {
                base: -(prev as i32),
                check: -(next as i32),
            });
        }
        self.links.resize(end, Links::EMPTY);

        let bi = self.blocks.len() as u32;
        self.blocks.push(Block::fresh(bi));
        self.push_block(bi, BlockList::Open);
        debug!(block = bi, slots = end, "added block to array store");
        bi
    }

    fn head_mut(&mut self, list: BlockList) -> &mut Option<u32> {
        match list {
            BlockList::Full => &mut self.full,
            BlockList::Closed => &mut self.closed,
            BlockList::Open => &mut self.open,
        }
    }

    fn transfer_block(&mut self, bi: u32, from: BlockList, to: BlockList) {
        self.pop_block(bi, from);
        self.push_block(bi, to);
    }

    /// Links `bi` in as the new head of `list`.
    fn push_block(&mut self, bi: u32, list: BlockList) {
        let head = *self.head_mut(list);
        match head {
            None => {
                let block = &mut self.blocks[bi as usize];
                block.prev = bi;
                block.next = bi;
            }
            Some(head) => {
                let tail = self.blocks[head as usize].prev;
                self.blocks[bi as usize].prev = tail;
                self.blocks[bi as usize].next = head;
                self.blocks[tail as usize].next = bi;
                self.blocks[head as usize].prev = bi;
            }
        }
        *self.head_mut(list) = Some(bi);
    }

    fn pop_block(&mut self, bi: u32, list: BlockList) {
        let Block { prev, next, .. } = self.blocks[bi as usize];
        let head = self.head_mut(list);
        debug_assert!(head.is_some(), "{list:?} list is empty");
        if next == bi {
            *head = None;
            return;
        }
        if *head == Some(bi) {
            *head = Some(next);
        }
        self.blocks[prev as usize].next = next;
        self.blocks[next as usize].prev = prev;
    }

    /// Which list `bi` should be on given its counters.
    #[cfg(test)]
    pub fn expected_list(&self, bi: u32) -> BlockList {
        let block = &self.blocks[bi as usize];
        match block.num {
            0 => BlockList::Full,
            1 => BlockList::Closed,
            _ if block.trial >= self.max_trial => BlockList::Closed,
            _ => BlockList::Open,
        }
    }

    /// Members of `list`, head first.
    #[cfg(test)]
    pub fn list_members(&self, list: BlockList) -> Vec<u32> {
        let head = match list {
            BlockList::Full => self.full,
            BlockList::Closed => self.closed,
            BlockList::Open => self.open,
        };
        let mut out = Vec::new();
        if let Some(head) = head {
            let mut bi = head;
            loop {
                out.push(bi);
                bi = self.blocks[bi as usize].next;
                if bi == head {
                    break;
                }
            }
        }
        out
    }
}
