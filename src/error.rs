//! Error taxonomy shared by every table operation.

use thiserror::Error;

use crate::config::Algorithm;
use crate::prefix::{Family, NextHop, Prefix};

/// Failure of a single table operation.
///
/// Every variant is local to the call that produced it. The table stays usable
/// afterwards, except after [`LpmError::Closed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LpmError {
    /// Prefix length outside `0..=32` (IPv4) or `0..=128` (IPv6).
    #[error("prefix length {len} exceeds {max} for {family}")]
    InvalidPrefixLength { family: Family, len: u8, max: u8 },

    /// Network or address byte slice of the wrong width for the family.
    #[error("{family} address must be {expected} bytes, got {actual}")]
    InvalidAddressLength {
        family: Family,
        expected: usize,
        actual: usize,
    },

    /// Host bits set while strict validation is enabled.
    #[error("prefix {0} has host bits set")]
    HostBitsSet(String),

    /// Unparseable prefix text.
    #[error("invalid prefix {0:?}")]
    InvalidPrefix(String),

    /// The reserved "no route" value was offered as a next-hop.
    #[error("next hop {0:#010x} is reserved")]
    InvalidNextHop(NextHop),

    /// Delete of a prefix that is not stored.
    #[error("prefix {0} not found")]
    NotFound(Prefix),

    /// A node, extension block or direct table could not be allocated.
    #[error("failed to allocate {0}")]
    Allocation(&'static str),

    /// Operation attempted after [`Table::close`](crate::Table::close).
    #[error("table is closed")]
    Closed,

    /// Algorithm not available for the requested address family.
    #[error("{algorithm} does not support {family}")]
    UnsupportedAlgorithm { algorithm: Algorithm, family: Family },

    /// Unknown algorithm name.
    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// Batch output buffer length differs from the address count.
    #[error("batch output holds {actual} results for {expected} addresses")]
    BatchLengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, LpmError>;
