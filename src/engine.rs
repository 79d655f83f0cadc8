//! Call surface shared by the three table layouts.

use crate::error::Result;
use crate::prefix::NextHop;
use crate::rib::Rib;

/// One longest-prefix-match layout.
///
/// Callers hand in validated input: `network` and `addr` are exactly one
/// address wide, `len` is in range for the family, `network` carries no host
/// bits and `next_hop` is not the reserved sentinel.
pub(crate) trait Engine {
    /// Stores `next_hop` for `network/len`, returning the value it replaced.
    fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>>;

    /// Deletes `network/len`, returning its next-hop, or `None` if it was never stored.
    fn remove(&mut self, network: &[u8], len: u8) -> Option<NextHop>;

    /// Next-hop of the most specific stored prefix covering `addr`.
    fn lookup(&self, addr: &[u8]) -> Option<NextHop>;

    fn rib(&self) -> &Rib;

    /// Allocated internal nodes (trie nodes or extension blocks).
    fn nodes(&self) -> usize;

    /// Allocated 16-bit stride nodes.
    fn wide_nodes(&self) -> usize {
        0
    }
}
