//! IPv6 trie with a 16-bit first level.
//!
//! The root is a flat 2^16-slot array indexed by the top 16 address bits.
//! Prefixes up to /16 fan out across root slots the way DIR-24-8 fills its
//! direct table. Longer prefixes go into an 8-bit stride sub-trie owned by
//! the root slot, created on first use and dropped once it empties; the
//! root slot value seeds the sub-trie descent as the best match so far.

use tracing::trace;

use crate::engine::Engine;
use crate::error::Result;
use crate::mem::boxed_slice;
use crate::prefix::{bits_of, NextHop};
use crate::rib::{Rib, Route};
use crate::stride8::{level_floor, terminal_byte, Node};

const ROOT_BITS: u8 = 16;
const ROOT_SLOTS: usize = 1 << ROOT_BITS;
/// Address byte the sub-tries start indexing at.
const SUBTRIE_BYTE: usize = 2;

#[derive(Default)]
struct RootSlot {
    route: Option<Route>,
    trie: Option<Box<Node>>,
}

#[inline]
fn root_index(addr: &[u8]) -> usize {
    (usize::from(addr[0]) << 8) | usize::from(addr[1])
}

/// IPv6-only 16-8-8-... stride trie.
pub(crate) struct Wide16 {
    root: Box<[RootSlot]>,
    rib: Rib,
    /// Sub-trie nodes.
    nodes: usize,
}

impl Wide16 {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            root: boxed_slice(ROOT_SLOTS, "wide16 root")?,
            rib: Rib::default(),
            nodes: 0,
        })
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        let mut nodes = 0;
        let mut long_prefixes = 0;
        for slot in self.root.iter() {
            if let Some(route) = slot.route {
                assert!(route.len <= ROOT_BITS, "/{} stored in the root", route.len);
            }
            if let Some(trie) = &slot.trie {
                assert!(!trie.is_empty(), "empty sub-trie kept alive");
                nodes += trie.validate(SUBTRIE_BYTE, false);
                long_prefixes += trie.prefix_total();
            }
        }
        assert_eq!(nodes, self.nodes, "node count drift");
        let expected = self.rib.iter().filter(|(_, r)| r.len > ROOT_BITS).count();
        assert_eq!(long_prefixes, expected, "long prefix count drift");
    }
}

impl Engine for Wide16 {
    fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>> {
        let bits = bits_of(network);
        let previous = self.rib.get(bits, len);
        let route = Route::new(next_hop, len);
        let top = root_index(network);

        if len <= ROOT_BITS {
            let span = 1usize << (ROOT_BITS - len);
            let start = top & !(span - 1);
            for slot in &mut self.root[start..start + span] {
                if slot.route.map_or(true, |r| r.len <= len) {
                    slot.route = Some(route);
                }
            }
        } else {
            let slot = &mut self.root[top];
            let (mut trie, created) = match slot.trie.take() {
                Some(trie) => (trie, false),
                None => (Node::new()?, true),
            };
            match trie.insert(network, SUBTRIE_BYTE, route, previous.is_none(), &mut self.nodes) {
                Ok(()) => {
                    if created {
                        self.nodes += 1;
                        trace!(slot = top, "allocated sub-trie");
                    }
                    slot.trie = Some(trie);
                }
                Err(err) => {
                    if !created {
                        slot.trie = Some(trie);
                    }
                    return Err(err);
                }
            }
        }

        self.rib.insert(bits, len, next_hop);
        Ok(previous)
    }

    fn remove(&mut self, network: &[u8], len: u8) -> Option<NextHop> {
        let bits = bits_of(network);
        let next_hop = self.rib.get(bits, len)?;
        let top = root_index(network);

        if len <= ROOT_BITS {
            let shadow = self.rib.shadow(bits, len, 0);
            let span = 1usize << (ROOT_BITS - len);
            let start = top & !(span - 1);
            for slot in &mut self.root[start..start + span] {
                if slot.route.is_some_and(|r| r.len == len) {
                    slot.route = shadow;
                }
            }
        } else {
            let shadow = self.rib.shadow(bits, len, level_floor(terminal_byte(len)));
            let slot = &mut self.root[top];
            if let Some(trie) = slot.trie.as_mut() {
                if trie.remove(network, SUBTRIE_BYTE, len, shadow, &mut self.nodes) {
                    slot.trie = None;
                    self.nodes -= 1;
                    trace!(slot = top, "released sub-trie");
                }
            }
        }

        self.rib.remove(bits, len);
        Some(next_hop)
    }

    #[inline]
    fn lookup(&self, addr: &[u8]) -> Option<NextHop> {
        let slot = &self.root[root_index(addr)];
        let best = slot.route.map(|r| r.next_hop);
        match slot.trie.as_deref() {
            Some(trie) => trie.lookup(addr, SUBTRIE_BYTE, best),
            None => best,
        }
    }

    fn rib(&self) -> &Rib {
        &self.rib
    }

    fn nodes(&self) -> usize {
        self.nodes
    }

    fn wide_nodes(&self) -> usize {
        1
    }
}
