//! Batch lookups against a single engine.
//!
//! The loops are generic over the engine so each layout gets its own
//! monomorphized copy with the lookup inlined. Results are identical to
//! calling `lookup` once per address.

use crate::engine::Engine;
use crate::prefix::NextHop;

/// Resolves `addrs[i]` into `out[i]`.
///
/// Addresses are already validated and `out` has the same length.
pub(crate) fn lookup_batch<E, A>(engine: &E, addrs: &[A], out: &mut [Option<NextHop>])
where
    E: Engine,
    A: AsRef<[u8]>,
{
    debug_assert_eq!(addrs.len(), out.len());
    for (addr, result) in addrs.iter().zip(out.iter_mut()) {
        *result = engine.lookup(addr.as_ref());
    }
}

/// Batch lookup over IPv4 addresses given as host-order integers.
pub(crate) fn lookup_batch_ipv4<E: Engine>(engine: &E, addrs: &[u32], out: &mut [Option<NextHop>]) {
    debug_assert_eq!(addrs.len(), out.len());
    for (&addr, result) in addrs.iter().zip(out.iter_mut()) {
        *result = engine.lookup(&addr.to_be_bytes());
    }
}
