//! The public routing table: one engine chosen at construction.

use std::fmt;
use std::net::IpAddr;

use tracing::debug;

use crate::batch;
use crate::config::{Algorithm, TableConfig};
use crate::dir24::Dir24;
use crate::engine::Engine;
use crate::error::{LpmError, Result};
use crate::prefix::{bits_of, Family, NextHop, Prefix, NO_ROUTE};
use crate::stride8::Stride8;
use crate::wide16::Wide16;

enum AnyEngine {
    Stride8(Stride8),
    Dir24(Dir24),
    Wide16(Wide16),
}

impl AnyEngine {
    fn new(algorithm: Algorithm) -> Result<Self> {
        Ok(match algorithm {
            Algorithm::Stride8 => AnyEngine::Stride8(Stride8::new()?),
            Algorithm::Dir24 => AnyEngine::Dir24(Dir24::new()?),
            Algorithm::Wide16 => AnyEngine::Wide16(Wide16::new()?),
        })
    }

    fn get(&self) -> &dyn Engine {
        match self {
            AnyEngine::Stride8(e) => e,
            AnyEngine::Dir24(e) => e,
            AnyEngine::Wide16(e) => e,
        }
    }

    fn get_mut(&mut self) -> &mut dyn Engine {
        match self {
            AnyEngine::Stride8(e) => e,
            AnyEngine::Dir24(e) => e,
            AnyEngine::Wide16(e) => e,
        }
    }
}

/// Table counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub algorithm: Algorithm,
    pub family: Family,
    /// Stored prefixes.
    pub prefixes: usize,
    /// Allocated trie nodes or extension blocks.
    pub nodes: usize,
    /// Allocated 16-bit stride nodes (Wide16 only).
    pub wide_nodes: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} prefixes, {} nodes",
            self.family, self.algorithm, self.prefixes, self.nodes
        )?;
        if self.algorithm == Algorithm::Wide16 {
            write!(f, ", {} wide nodes", self.wide_nodes)?;
        }
        Ok(())
    }
}

/// Longest-prefix-match table for one address family.
///
/// Lookups take `&self` and mutations `&mut self`; wrap the table in
/// [`SharedTable`](crate::SharedTable) (or any lock) to share it between
/// threads. After [`close`](Table::close) every operation fails with
/// [`LpmError::Closed`].
pub struct Table {
    family: Family,
    algorithm: Algorithm,
    strict: bool,
    engine: Option<AnyEngine>,
}

impl Table {
    /// Creates an empty table using `algorithm`.
    pub fn new(family: Family, algorithm: Algorithm) -> Result<Self> {
        Self::with_config(family, TableConfig::default().algorithm(algorithm))
    }

    /// IPv4 table with the default layout (DIR-24-8).
    pub fn ipv4() -> Result<Self> {
        Self::with_config(Family::Ipv4, TableConfig::default())
    }

    /// IPv6 table with the default layout (Wide16).
    pub fn ipv6() -> Result<Self> {
        Self::with_config(Family::Ipv6, TableConfig::default())
    }

    pub fn with_config(family: Family, config: TableConfig) -> Result<Self> {
        let algorithm = config.algorithm.unwrap_or(Algorithm::default_for(family));
        if !algorithm.supports(family) {
            return Err(LpmError::UnsupportedAlgorithm { algorithm, family });
        }
        let engine = AnyEngine::new(algorithm)?;
        debug!(%family, %algorithm, strict = config.strict, "created table");
        Ok(Self {
            family,
            algorithm,
            strict: config.strict,
            engine: Some(engine),
        })
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    #[inline]
    fn engine(&self) -> Result<&AnyEngine> {
        self.engine.as_ref().ok_or(LpmError::Closed)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Stores `next_hop` for `network/len`.
    ///
    /// Host bits in `network` are masked off, or rejected when the table was
    /// built with [`TableConfig::strict`]. Inserting a stored prefix again
    /// replaces its next-hop; the previous value is returned.
    pub fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>> {
        let (family, strict) = (self.family, self.strict);
        let engine = self.engine.as_mut().ok_or(LpmError::Closed)?;
        if next_hop == NO_ROUTE {
            return Err(LpmError::InvalidNextHop(next_hop));
        }
        let prefix = Prefix::build(family, network, len, strict)?;
        engine.get_mut().insert(prefix.octets(), len, next_hop)
    }

    /// Deletes `network/len`, returning its next-hop.
    pub fn delete(&mut self, network: &[u8], len: u8) -> Result<NextHop> {
        let (family, strict) = (self.family, self.strict);
        let engine = self.engine.as_mut().ok_or(LpmError::Closed)?;
        let prefix = Prefix::build(family, network, len, strict)?;
        engine
            .get_mut()
            .remove(prefix.octets(), len)
            .ok_or(LpmError::NotFound(prefix))
    }

    pub fn insert_prefix(&mut self, prefix: &Prefix, next_hop: NextHop) -> Result<Option<NextHop>> {
        self.insert(prefix.octets(), prefix.prefix_len(), next_hop)
    }

    pub fn delete_prefix(&mut self, prefix: &Prefix) -> Result<NextHop> {
        self.delete(prefix.octets(), prefix.prefix_len())
    }

    /// Releases every node, block and sub-trie. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            let engine = engine.get();
            debug!(
                family = %self.family,
                algorithm = %self.algorithm,
                prefixes = engine.rib().len(),
                nodes = engine.nodes(),
                "closing table"
            );
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Next-hop of the most specific stored prefix covering `addr`.
    #[inline]
    pub fn lookup(&self, addr: &[u8]) -> Result<Option<NextHop>> {
        let engine = self.engine()?;
        self.family.check_addr(addr)?;
        Ok(engine.get().lookup(addr))
    }

    pub fn lookup_ip(&self, addr: IpAddr) -> Result<Option<NextHop>> {
        match addr {
            IpAddr::V4(a) => self.lookup(&a.octets()),
            IpAddr::V6(a) => self.lookup(&a.octets()),
        }
    }

    /// IPv4 lookup with the address as a host-order integer.
    pub fn lookup_ipv4(&self, addr: u32) -> Result<Option<NextHop>> {
        self.lookup(&addr.to_be_bytes())
    }

    /// Looks up every address, writing `out[i]` for `addrs[i]`.
    ///
    /// `out` must be exactly as long as `addrs`. All addresses are validated
    /// before any result is written.
    pub fn lookup_batch<A: AsRef<[u8]>>(&self, addrs: &[A], out: &mut [Option<NextHop>]) -> Result<()> {
        let engine = self.engine()?;
        if addrs.len() != out.len() {
            return Err(LpmError::BatchLengthMismatch {
                expected: addrs.len(),
                actual: out.len(),
            });
        }
        if addrs.is_empty() {
            return Ok(());
        }
        for addr in addrs {
            self.family.check_addr(addr.as_ref())?;
        }
        match engine {
            AnyEngine::Stride8(e) => batch::lookup_batch(e, addrs, out),
            AnyEngine::Dir24(e) => batch::lookup_batch(e, addrs, out),
            AnyEngine::Wide16(e) => batch::lookup_batch(e, addrs, out),
        }
        Ok(())
    }

    /// Batch form of [`lookup_ipv4`](Table::lookup_ipv4).
    pub fn lookup_batch_ipv4(&self, addrs: &[u32], out: &mut [Option<NextHop>]) -> Result<()> {
        let engine = self.engine()?;
        if self.family != Family::Ipv4 {
            return Err(LpmError::InvalidAddressLength {
                family: self.family,
                expected: self.family.addr_len(),
                actual: 4,
            });
        }
        if addrs.len() != out.len() {
            return Err(LpmError::BatchLengthMismatch {
                expected: addrs.len(),
                actual: out.len(),
            });
        }
        match engine {
            AnyEngine::Stride8(e) => batch::lookup_batch_ipv4(e, addrs, out),
            AnyEngine::Dir24(e) => batch::lookup_batch_ipv4(e, addrs, out),
            AnyEngine::Wide16(e) => batch::lookup_batch_ipv4(e, addrs, out),
        }
        Ok(())
    }

    /// Exact-match read of a stored prefix.
    pub fn get(&self, network: &[u8], len: u8) -> Result<Option<NextHop>> {
        let engine = self.engine()?;
        let prefix = Prefix::build(self.family, network, len, self.strict)?;
        Ok(engine.get().rib().get(prefix.bits(), len))
    }

    /// Every stored prefix covering `addr`, least specific first.
    pub fn matches(&self, addr: &[u8]) -> Result<Vec<(Prefix, NextHop)>> {
        let engine = self.engine()?;
        self.family.check_addr(addr)?;
        Ok(engine
            .get()
            .rib()
            .covering(bits_of(addr), self.family.max_len())
            .map(|(bits, route)| (Prefix::from_bits(self.family, bits, route.len), route.next_hop))
            .collect())
    }

    /// Every stored prefix with its next-hop, ordered by address then length.
    pub fn routes(&self) -> Result<Vec<(Prefix, NextHop)>> {
        let engine = self.engine()?;
        let mut routes: Vec<_> = engine
            .get()
            .rib()
            .iter()
            .map(|(bits, route)| (bits, route.len, route.next_hop))
            .collect();
        routes.sort_unstable_by_key(|&(bits, len, _)| (bits, len));
        Ok(routes
            .into_iter()
            .map(|(bits, len, next_hop)| (Prefix::from_bits(self.family, bits, len), next_hop))
            .collect())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn stats(&self) -> Result<Stats> {
        let engine = self.engine()?.get();
        Ok(Stats {
            algorithm: self.algorithm,
            family: self.family,
            prefixes: engine.rib().len(),
            nodes: engine.nodes(),
            wide_nodes: engine.wide_nodes(),
        })
    }

    pub fn num_prefixes(&self) -> Result<usize> {
        Ok(self.engine()?.get().rib().len())
    }

    pub fn num_nodes(&self) -> Result<usize> {
        Ok(self.engine()?.get().nodes())
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) {
        match &self.engine {
            Some(AnyEngine::Stride8(e)) => e.validate(),
            Some(AnyEngine::Dir24(e)) => e.validate(),
            Some(AnyEngine::Wide16(e)) => e.validate(),
            None => {}
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Table");
        s.field("family", &self.family).field("algorithm", &self.algorithm);
        match &self.engine {
            Some(engine) => s.field("prefixes", &engine.get().rib().len()).field("status", &"open"),
            None => s.field("status", &"closed"),
        };
        s.finish()
    }
}
