//! DIR-24-8: IPv4 lookup in one or two memory accesses.
//!
//! The top 24 address bits index a flat direct table. A direct slot either
//! holds a next-hop for prefixes up to /24, or points at a 256-slot
//! extension block indexed by the low address byte for /25../32.
//!
//! Slots are stored as two parallel arrays: the raw 32-bit word (next-hop or
//! block index) and a tag byte. The tag holds the owning prefix length plus
//! one, `TAG_EMPTY`, or `TAG_EXTENDED`. Extension blocks carry the value of
//! the covering /0../24 in every slot not owned by a longer prefix, so a
//! lookup never has to look back at the direct slot.
//!
//! Mutating a short prefix costs one write per covered direct slot (up to
//! 2^24 for a /0), plus the covered slots of any extension block in range.

use tracing::trace;

use crate::engine::Engine;
use crate::error::Result;
use crate::mem::{boxed_slice, reserve};
use crate::prefix::{bits_of, NextHop};
use crate::rib::{Rib, Route};

const DIRECT_BITS: u8 = 24;
const DIRECT_SLOTS: usize = 1 << DIRECT_BITS;
const BLOCK_SLOTS: usize = 256;

const TAG_EMPTY: u8 = 0;
const TAG_EXTENDED: u8 = 0xFF;

#[inline]
fn tag_of(route: Option<Route>) -> (u8, u32) {
    match route {
        Some(r) => (r.len + 1, r.next_hop),
        None => (TAG_EMPTY, 0),
    }
}

#[inline]
fn route_at(tag: u8, word: u32) -> Option<Route> {
    debug_assert_ne!(tag, TAG_EXTENDED);
    (tag != TAG_EMPTY).then(|| Route::new(word, tag - 1))
}

/// Whether a prefix of `len` bits may overwrite a slot tagged `tag`.
#[inline]
fn yields_to(tag: u8, len: u8) -> bool {
    tag == TAG_EMPTY || tag <= len + 1
}

#[inline]
fn span_of(addr: u32, len: u8, width: u8) -> (usize, usize) {
    let span = 1usize << (width - len);
    let index = if width == DIRECT_BITS {
        (addr >> 8) as usize
    } else {
        (addr & 0xFF) as usize
    };
    (index & !(span - 1), span)
}

// =============================================================================
// Extension blocks
// =============================================================================

struct Block {
    tags: Box<[u8]>,
    words: Box<[u32]>,
    /// Prefixes longer than /24 ending in this block.
    prefixes: u16,
}

impl Block {
    fn new(inherited: Option<Route>) -> Result<Self> {
        let mut block = Self {
            tags: boxed_slice(BLOCK_SLOTS, "extension block")?,
            words: boxed_slice(BLOCK_SLOTS, "extension block")?,
            prefixes: 0,
        };
        let (tag, word) = tag_of(inherited);
        block.tags.fill(tag);
        block.words.fill(word);
        Ok(block)
    }

    fn fill(&mut self, start: usize, span: usize, route: Route) {
        for i in start..start + span {
            if yields_to(self.tags[i], route.len) {
                self.tags[i] = route.len + 1;
                self.words[i] = route.next_hop;
            }
        }
    }

    fn clear(&mut self, start: usize, span: usize, len: u8, shadow: Option<Route>) {
        let (tag, word) = tag_of(shadow);
        for i in start..start + span {
            if self.tags[i] == len + 1 {
                self.tags[i] = tag;
                self.words[i] = word;
            }
        }
    }

    #[inline]
    fn route(&self, low: usize) -> Option<Route> {
        route_at(self.tags[low], self.words[low])
    }

    #[inline]
    fn lookup(&self, low: u8) -> Option<NextHop> {
        let low = usize::from(low);
        (self.tags[low] != TAG_EMPTY).then(|| self.words[low])
    }
}

// =============================================================================
// Engine
// =============================================================================

/// IPv4-only direct table with 8-bit extension blocks.
pub(crate) struct Dir24 {
    tags: Box<[u8]>,
    words: Box<[u32]>,
    blocks: Vec<Option<Block>>,
    /// Released block indices, reused before the pool grows.
    free: Vec<u32>,
    live_blocks: usize,
    rib: Rib,
}

impl Dir24 {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            tags: boxed_slice(DIRECT_SLOTS, "DIR-24-8 direct table")?,
            words: boxed_slice(DIRECT_SLOTS, "DIR-24-8 direct table")?,
            blocks: Vec::new(),
            free: Vec::new(),
            live_blocks: 0,
            rib: Rib::default(),
        })
    }

    fn alloc_block(&mut self, inherited: Option<Route>) -> Result<u32> {
        let block = Block::new(inherited)?;
        let index = match self.free.pop() {
            Some(index) => {
                self.blocks[index as usize] = Some(block);
                index
            }
            None => {
                reserve(&mut self.blocks, 1, "extension block pool")?;
                // Room for every index to come back through release_block.
                reserve(&mut self.free, self.blocks.len() + 1, "extension block pool")?;
                self.blocks.push(Some(block));
                (self.blocks.len() - 1) as u32
            }
        };
        self.live_blocks += 1;
        trace!(index, "allocated extension block");
        Ok(index)
    }

    fn release_block(&mut self, index: u32) -> Option<Block> {
        let block = self.blocks[index as usize].take()?;
        self.free.push(index);
        self.live_blocks -= 1;
        trace!(index, "released extension block");
        Some(block)
    }

    #[inline]
    fn set_direct(&mut self, i: usize, route: Option<Route>) {
        let (tag, word) = tag_of(route);
        self.tags[i] = tag;
        self.words[i] = word;
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        let extended = self.tags.iter().filter(|&&t| t == TAG_EXTENDED).count();
        assert_eq!(extended, self.live_blocks, "extension block count drift");
        let live = self.blocks.iter().flatten().count();
        assert_eq!(live, self.live_blocks, "block pool drift");

        let mut long_prefixes = 0;
        for block in self.blocks.iter().flatten() {
            assert!(block.prefixes > 0, "empty extension block kept alive");
            long_prefixes += usize::from(block.prefixes);
        }
        let expected = self.rib.iter().filter(|(_, r)| r.len > DIRECT_BITS).count();
        assert_eq!(long_prefixes, expected, "long prefix count drift");
    }
}

#[inline]
fn ipv4_word(addr: &[u8]) -> u32 {
    u32::from_be_bytes([addr[0], addr[1], addr[2], addr[3]])
}

impl Engine for Dir24 {
    fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>> {
        let bits = bits_of(network);
        let addr = ipv4_word(network);
        let previous = self.rib.get(bits, len);
        let route = Route::new(next_hop, len);

        if len <= DIRECT_BITS {
            let (start, span) = span_of(addr, len, DIRECT_BITS);
            for i in start..start + span {
                match self.tags[i] {
                    TAG_EXTENDED => {
                        let index = self.words[i] as usize;
                        if let Some(block) = self.blocks[index].as_mut() {
                            block.fill(0, BLOCK_SLOTS, route);
                        }
                    }
                    tag if yields_to(tag, len) => {
                        self.tags[i] = len + 1;
                        self.words[i] = next_hop;
                    }
                    _ => {}
                }
            }
        } else {
            let i = (addr >> 8) as usize;
            let index = if self.tags[i] == TAG_EXTENDED {
                self.words[i]
            } else {
                let inherited = route_at(self.tags[i], self.words[i]);
                let index = self.alloc_block(inherited)?;
                self.tags[i] = TAG_EXTENDED;
                self.words[i] = index;
                index
            };
            let (start, span) = span_of(addr, len, 32);
            if let Some(block) = self.blocks[index as usize].as_mut() {
                block.fill(start, span, route);
                if previous.is_none() {
                    block.prefixes += 1;
                }
            }
        }

        self.rib.insert(bits, len, next_hop);
        Ok(previous)
    }

    fn remove(&mut self, network: &[u8], len: u8) -> Option<NextHop> {
        let bits = bits_of(network);
        let addr = ipv4_word(network);
        let next_hop = self.rib.get(bits, len)?;
        // Blocks hold covering /0../24 values too, so the fallback search
        // always reaches down to /0.
        let shadow = self.rib.shadow(bits, len, 0);

        if len <= DIRECT_BITS {
            let (start, span) = span_of(addr, len, DIRECT_BITS);
            for i in start..start + span {
                match self.tags[i] {
                    TAG_EXTENDED => {
                        let index = self.words[i] as usize;
                        if let Some(block) = self.blocks[index].as_mut() {
                            block.clear(0, BLOCK_SLOTS, len, shadow);
                        }
                    }
                    tag if tag == len + 1 => self.set_direct(i, shadow),
                    _ => {}
                }
            }
        } else {
            let i = (addr >> 8) as usize;
            debug_assert_eq!(self.tags[i], TAG_EXTENDED);
            let index = self.words[i];
            let (start, span) = span_of(addr, len, 32);
            let mut drained = false;
            if let Some(block) = self.blocks[index as usize].as_mut() {
                block.clear(start, span, len, shadow);
                block.prefixes -= 1;
                drained = block.prefixes == 0;
            }
            if drained {
                // With no long prefix left every slot carries the same
                // covering value; hand it back to the direct slot.
                if let Some(block) = self.release_block(index) {
                    self.set_direct(i, block.route(0));
                }
            }
        }

        self.rib.remove(bits, len);
        Some(next_hop)
    }

    #[inline]
    fn lookup(&self, addr: &[u8]) -> Option<NextHop> {
        let i = (usize::from(addr[0]) << 16) | (usize::from(addr[1]) << 8) | usize::from(addr[2]);
        match self.tags[i] {
            TAG_EMPTY => None,
            TAG_EXTENDED => self.blocks[self.words[i] as usize]
                .as_ref()
                .and_then(|block| block.lookup(addr[3])),
            _ => Some(self.words[i]),
        }
    }

    fn rib(&self) -> &Rib {
        &self.rib
    }

    fn nodes(&self) -> usize {
        self.live_blocks
    }
}
