//! Algorithm selection and table configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::LpmError;
use crate::prefix::Family;

/// Table layout, fixed for a table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// 8-bit stride trie. Works for both families.
    Stride8,
    /// 24-bit direct table with 8-bit extension blocks. IPv4 only.
    Dir24,
    /// 16-bit first level with 8-bit stride sub-tries. IPv6 only.
    Wide16,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Stride8, Algorithm::Dir24, Algorithm::Wide16];

    pub const fn name(self) -> &'static str {
        match self {
            Algorithm::Stride8 => "stride8",
            Algorithm::Dir24 => "dir24",
            Algorithm::Wide16 => "wide16",
        }
    }

    pub const fn supports(self, family: Family) -> bool {
        matches!(
            (self, family),
            (Algorithm::Stride8, _)
                | (Algorithm::Dir24, Family::Ipv4)
                | (Algorithm::Wide16, Family::Ipv6)
        )
    }

    /// DIR-24-8 for IPv4, Wide16 for IPv6.
    pub const fn default_for(family: Family) -> Self {
        match family {
            Family::Ipv4 => Algorithm::Dir24,
            Family::Ipv6 => Algorithm::Wide16,
        }
    }

    /// Algorithms usable with `family`.
    pub fn for_family(family: Family) -> impl Iterator<Item = Algorithm> {
        Self::ALL.into_iter().filter(move |a| a.supports(family))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = LpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stride8" | "8stride" => Ok(Algorithm::Stride8),
            "dir24" | "dir24-8" | "dir-24-8" => Ok(Algorithm::Dir24),
            "wide16" => Ok(Algorithm::Wide16),
            _ => Err(LpmError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Construction options for a [`Table`](crate::Table).
#[derive(Debug, Clone, Default)]
pub struct TableConfig {
    /// Layout to use. `None` picks [`Algorithm::default_for`] the family.
    pub algorithm: Option<Algorithm>,
    /// Reject prefixes with host bits set instead of masking them.
    pub strict: bool,
}

impl TableConfig {
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
