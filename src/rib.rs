//! Exact-prefix index kept alongside every layout.
//!
//! The slot arrays only answer "what covers this address". The index answers
//! the questions they cannot: whether a prefix is stored, how many are
//! stored, and which less-specific prefix a slot falls back to when the
//! prefix occupying it is deleted.

use std::collections::HashMap;

use crate::prefix::{mask, NextHop};

/// A slot value tagged with the length of the prefix that placed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Route {
    pub next_hop: NextHop,
    pub len: u8,
}

impl Route {
    #[inline]
    pub fn new(next_hop: NextHop, len: u8) -> Self {
        Self { next_hop, len }
    }
}

/// Stored prefixes keyed by `(length, left-aligned canonical bits)`.
#[derive(Debug, Default)]
pub(crate) struct Rib {
    routes: HashMap<(u8, u128), NextHop>,
}

impl Rib {
    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn get(&self, bits: u128, len: u8) -> Option<NextHop> {
        self.routes.get(&(len, bits & mask(len))).copied()
    }

    pub fn insert(&mut self, bits: u128, len: u8, next_hop: NextHop) -> Option<NextHop> {
        self.routes.insert((len, bits & mask(len)), next_hop)
    }

    pub fn remove(&mut self, bits: u128, len: u8) -> Option<NextHop> {
        self.routes.remove(&(len, bits & mask(len)))
    }

    /// Longest stored prefix covering `bits` whose length lies in `floor..len`.
    ///
    /// This is the value a slot owned by `bits/len` reverts to once that
    /// prefix is deleted. The floor keeps the search inside the layout level
    /// the deleted prefix lives in. Costs one map probe per candidate
    /// length, so O(prefix length) per delete.
    pub fn shadow(&self, bits: u128, len: u8, floor: u8) -> Option<Route> {
        (floor..len)
            .rev()
            .find_map(|l| self.get(bits, l).map(|next_hop| Route::new(next_hop, l)))
    }

    /// Every stored prefix covering `bits`, least specific first.
    pub fn covering(&self, bits: u128, max_len: u8) -> impl Iterator<Item = (u128, Route)> + '_ {
        (0..=max_len).filter_map(move |l| {
            self.get(bits, l)
                .map(|next_hop| (bits & mask(l), Route::new(next_hop, l)))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (u128, Route)> + '_ {
        self.routes
            .iter()
            .map(|(&(len, bits), &next_hop)| (bits, Route::new(next_hop, len)))
    }
}
