//! Multi-bit trie consuming the address one byte per level.
//!
//! Each [`Node`] holds 256 slots indexed by one address byte. A prefix whose
//! last bit falls inside a node's byte is fanned out over every slot sharing
//! its leading bits. Slot values carry the length of the prefix that placed
//! them, so overlapping prefixes resolve longest-wins and a delete only
//! clears slots it owns.
//!
//! Lookups remember the best value seen while descending, which lets a slot
//! value cover the whole subtree hanging below that slot: a node only ever
//! holds prefixes that end inside its own byte.
//!
//! IPv4 uses up to 4 levels, IPv6 up to 16. [`Wide16`](crate::wide16) reuses
//! [`Node`] for everything below its 16-bit root.

use tracing::trace;

use crate::engine::Engine;
use crate::error::Result;
use crate::mem::boxed_slice;
use crate::prefix::{bits_of, NextHop};
use crate::rib::{Rib, Route};

pub(crate) const STRIDE_SLOTS: usize = 256;

/// Byte index of the level a prefix of `len` bits ends in.
#[inline]
pub(crate) fn terminal_byte(len: u8) -> usize {
    usize::from(len.saturating_sub(1)) / 8
}

/// Shortest prefix length that ends in the level at `byte`.
///
/// The root level also takes the zero-length default prefix.
#[inline]
pub(crate) fn level_floor(byte: usize) -> u8 {
    if byte == 0 {
        0
    } else {
        (byte * 8 + 1) as u8
    }
}

/// First slot and slot count covered by a prefix with `bits` significant bits
/// (0..=8) in the indexing byte `value`.
#[inline]
pub(crate) fn fan_out(value: u8, bits: usize) -> (usize, usize) {
    debug_assert!(bits <= 8);
    let span = 1usize << (8 - bits);
    (usize::from(value) & !(span - 1), span)
}

#[derive(Default)]
struct Slot {
    route: Option<Route>,
    child: Option<Box<Node>>,
}

/// 256-slot trie level.
pub(crate) struct Node {
    slots: Box<[Slot]>,
    /// Prefixes ending in this level.
    prefixes: u16,
    children: u16,
}

impl Node {
    pub(crate) fn new() -> Result<Box<Self>> {
        Ok(Box::new(Self {
            slots: boxed_slice(STRIDE_SLOTS, "trie node")?,
            prefixes: 0,
            children: 0,
        }))
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.prefixes == 0 && self.children == 0
    }

    /// Writes `route` below this node, which indexes address byte `byte`.
    ///
    /// `fresh` is set when the prefix was not stored before. Children created
    /// on the way down are counted into `nodes`; if a deeper allocation
    /// fails, the ones created by this call are dropped again and nothing
    /// has been written.
    pub(crate) fn insert(
        &mut self,
        key: &[u8],
        byte: usize,
        route: Route,
        fresh: bool,
        nodes: &mut usize,
    ) -> Result<()> {
        let len = usize::from(route.len);
        if len <= (byte + 1) * 8 {
            let (start, span) = fan_out(key[byte], len - byte * 8);
            for slot in &mut self.slots[start..start + span] {
                if slot.route.map_or(true, |r| r.len <= route.len) {
                    slot.route = Some(route);
                }
            }
            if fresh {
                self.prefixes += 1;
            }
            return Ok(());
        }

        let idx = usize::from(key[byte]);
        let (mut child, created) = match self.slots[idx].child.take() {
            Some(child) => (child, false),
            None => (Node::new()?, true),
        };
        let result = child.insert(key, byte + 1, route, fresh, nodes);
        if created {
            if result.is_err() {
                return result;
            }
            self.children += 1;
            *nodes += 1;
        }
        self.slots[idx].child = Some(child);
        result
    }

    /// Clears the prefix of `len` bits from the slots it owns, putting
    /// `shadow` back in its place, and prunes children left empty.
    ///
    /// Returns true once this node holds nothing.
    pub(crate) fn remove(
        &mut self,
        key: &[u8],
        byte: usize,
        len: u8,
        shadow: Option<Route>,
        nodes: &mut usize,
    ) -> bool {
        let bits = usize::from(len);
        if bits <= (byte + 1) * 8 {
            let (start, span) = fan_out(key[byte], bits - byte * 8);
            for slot in &mut self.slots[start..start + span] {
                if slot.route.is_some_and(|r| r.len == len) {
                    slot.route = shadow;
                }
            }
            self.prefixes -= 1;
        } else {
            let slot = &mut self.slots[usize::from(key[byte])];
            if let Some(child) = slot.child.as_mut() {
                if child.remove(key, byte + 1, len, shadow, nodes) {
                    slot.child = None;
                    self.children -= 1;
                    *nodes -= 1;
                    trace!(byte = byte + 1, "pruned empty trie node");
                }
            }
        }
        self.is_empty()
    }

    /// Single pass descent starting at `byte` with `best` as the value
    /// inherited from above.
    #[inline]
    pub(crate) fn lookup(&self, key: &[u8], mut byte: usize, mut best: Option<NextHop>) -> Option<NextHop> {
        let mut node = self;
        loop {
            let slot = &node.slots[usize::from(key[byte])];
            if let Some(route) = slot.route {
                best = Some(route.next_hop);
            }
            match slot.child.as_deref() {
                Some(child) => {
                    node = child;
                    byte += 1;
                }
                None => return best,
            }
        }
    }

    /// Checks per-node bookkeeping and returns the number of nodes in this subtree.
    #[cfg(test)]
    pub(crate) fn validate(&self, byte: usize, is_root: bool) -> usize {
        assert!(is_root || !self.is_empty(), "empty node left reachable at byte {byte}");
        let mut count = 1;
        let mut children = 0;
        for slot in self.slots.iter() {
            if let Some(route) = slot.route {
                assert!(
                    route.len >= level_floor(byte) && usize::from(route.len) <= (byte + 1) * 8,
                    "route /{} stored at level {byte}",
                    route.len
                );
            }
            if let Some(child) = &slot.child {
                children += 1;
                count += child.validate(byte + 1, false);
            }
        }
        assert_eq!(children, usize::from(self.children), "child count drift");
        if self.prefixes == 0 {
            assert!(
                self.slots.iter().all(|s| s.route.is_none()),
                "slot values left behind in a level without prefixes"
            );
        }
        count
    }

    /// Prefixes ending anywhere in this subtree.
    #[cfg(test)]
    pub(crate) fn prefix_total(&self) -> usize {
        usize::from(self.prefixes)
            + self
                .slots
                .iter()
                .filter_map(|s| s.child.as_deref())
                .map(Node::prefix_total)
                .sum::<usize>()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// 8-bit stride trie for either family.
pub(crate) struct Stride8 {
    root: Box<Node>,
    rib: Rib,
    /// Allocated nodes, root included.
    nodes: usize,
}

impl Stride8 {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            root: Node::new()?,
            rib: Rib::default(),
            nodes: 1,
        })
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        assert_eq!(self.root.validate(0, true), self.nodes, "node count drift");
        assert_eq!(self.root.prefix_total(), self.rib.len(), "prefix count drift");
    }
}

impl Engine for Stride8 {
    fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>> {
        let bits = bits_of(network);
        let previous = self.rib.get(bits, len);
        self.root.insert(
            network,
            0,
            Route::new(next_hop, len),
            previous.is_none(),
            &mut self.nodes,
        )?;
        self.rib.insert(bits, len, next_hop);
        Ok(previous)
    }

    fn remove(&mut self, network: &[u8], len: u8) -> Option<NextHop> {
        let bits = bits_of(network);
        let next_hop = self.rib.get(bits, len)?;
        let shadow = self.rib.shadow(bits, len, level_floor(terminal_byte(len)));
        // The root stays allocated even when it empties.
        self.root.remove(network, 0, len, shadow, &mut self.nodes);
        self.rib.remove(bits, len);
        Some(next_hop)
    }

    #[inline]
    fn lookup(&self, addr: &[u8]) -> Option<NextHop> {
        self.root.lookup(addr, 0, None)
    }

    fn rib(&self) -> &Rib {
        &self.rib
    }

    fn nodes(&self) -> usize {
        self.nodes
    }
}
