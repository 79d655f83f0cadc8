//! Address families, canonical prefixes and next-hop values.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{LpmError, Result};

/// Opaque 32-bit payload associated with a stored prefix.
pub type NextHop = u32;

/// Reserved next-hop meaning "no route". Never a legal stored value.
pub const NO_ROUTE: NextHop = u32::MAX;

/// Address family of a table or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Address width in bytes.
    #[inline]
    pub const fn addr_len(self) -> usize {
        match self {
            Family::Ipv4 => 4,
            Family::Ipv6 => 16,
        }
    }

    /// Longest legal prefix length.
    #[inline]
    pub const fn max_len(self) -> u8 {
        match self {
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
        }
    }

    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }

    /// Rejects byte slices that are not exactly one address wide.
    pub(crate) fn check_addr(self, addr: &[u8]) -> Result<()> {
        if addr.len() != self.addr_len() {
            return Err(LpmError::InvalidAddressLength {
                family: self,
                expected: self.addr_len(),
                actual: addr.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Ipv4 => f.write_str("IPv4"),
            Family::Ipv6 => f.write_str("IPv6"),
        }
    }
}

// =============================================================================
// Bit helpers
// =============================================================================

/// Left-aligned 128-bit view of an address; IPv4 occupies the top 32 bits.
#[inline]
pub(crate) fn bits_of(addr: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf[..addr.len()].copy_from_slice(addr);
    u128::from_be_bytes(buf)
}

/// Mask keeping the leading `len` bits of a left-aligned address.
#[inline]
pub(crate) fn mask(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(len))
    }
}

// =============================================================================
// Prefix
// =============================================================================

/// A network prefix whose bits beyond `len` are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    family: Family,
    octets: [u8; 16],
    len: u8,
}

impl Prefix {
    /// Builds a prefix, masking away any host bits.
    pub fn new(family: Family, network: &[u8], len: u8) -> Result<Self> {
        Self::build(family, network, len, false)
    }

    /// Builds a prefix, rejecting host bits with [`LpmError::HostBitsSet`].
    pub fn new_strict(family: Family, network: &[u8], len: u8) -> Result<Self> {
        Self::build(family, network, len, true)
    }

    pub(crate) fn build(family: Family, network: &[u8], len: u8, strict: bool) -> Result<Self> {
        family.check_addr(network)?;
        if len > family.max_len() {
            return Err(LpmError::InvalidPrefixLength {
                family,
                len,
                max: family.max_len(),
            });
        }
        let bits = bits_of(network);
        let canonical = bits & mask(len);
        if strict && canonical != bits {
            let raw = Self::from_bits(family, bits, len);
            return Err(LpmError::HostBitsSet(raw.to_string()));
        }
        Ok(Self::from_bits(family, canonical, len))
    }

    pub(crate) fn from_bits(family: Family, bits: u128, len: u8) -> Self {
        Self {
            family,
            octets: bits.to_be_bytes(),
            len,
        }
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Number of significant leading bits.
    #[inline]
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// Network address bytes: 4 for IPv4, 16 for IPv6.
    #[inline]
    pub fn octets(&self) -> &[u8] {
        &self.octets[..self.family.addr_len()]
    }

    #[inline]
    pub(crate) fn bits(&self) -> u128 {
        u128::from_be_bytes(self.octets)
    }

    pub fn network(&self) -> IpAddr {
        match self.family {
            Family::Ipv4 => {
                let [a, b, c, d, ..] = self.octets;
                IpAddr::V4(Ipv4Addr::new(a, b, c, d))
            }
            Family::Ipv6 => IpAddr::V6(Ipv6Addr::from(self.octets)),
        }
    }

    /// Whether `addr` (same family width) falls inside this prefix.
    pub fn contains(&self, addr: &[u8]) -> bool {
        addr.len() == self.family.addr_len() && bits_of(addr) & mask(self.len) == self.bits()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Parses `address/length`, masking host bits.
impl FromStr for Prefix {
    type Err = LpmError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LpmError::InvalidPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.trim().parse().map_err(|_| invalid())?;
        let len: u8 = len.trim().parse().map_err(|_| invalid())?;
        match addr {
            IpAddr::V4(a) => Self::new(Family::Ipv4, &a.octets(), len),
            IpAddr::V6(a) => Self::new(Family::Ipv6, &a.octets(), len),
        }
    }
}

/// Host prefix (/32 or /128) for a single address.
impl From<IpAddr> for Prefix {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(a) => Self::from_bits(Family::Ipv4, bits_of(&a.octets()), 32),
            IpAddr::V6(a) => Self::from_bits(Family::Ipv6, bits_of(&a.octets()), 128),
        }
    }
}
