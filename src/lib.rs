//! # lpm-rs
//!
//! Longest-prefix-match routing tables for IPv4 and IPv6.
//!
//! A [`Table`] maps network prefixes to 32-bit next-hop identifiers and
//! answers, for any address, the next-hop of the most specific stored prefix
//! that covers it. Three layouts are available, chosen once per table:
//!
//! - [`Algorithm::Stride8`]: an 8-bit stride trie, for either family.
//! - [`Algorithm::Dir24`]: DIR-24-8, a 2^24-slot direct table plus 256-slot
//!   extension blocks. IPv4 only; the IPv4 default.
//! - [`Algorithm::Wide16`]: a 2^16-slot first level over 8-bit stride
//!   sub-tries. IPv6 only; the IPv6 default.
//!
//! ## Example
//!
//! ```rust
//! use lpm_rs::{Algorithm, Family, Table};
//!
//! let mut table = Table::new(Family::Ipv4, Algorithm::Stride8)?;
//! table.insert(&[192, 168, 0, 0], 16, 100)?;
//! table.insert(&[192, 168, 1, 0], 24, 200)?;
//!
//! assert_eq!(table.lookup(&[192, 168, 1, 7])?, Some(200));
//! assert_eq!(table.lookup(&[192, 168, 9, 7])?, Some(100));
//! assert_eq!(table.lookup(&[10, 0, 0, 1])?, None);
//!
//! table.delete(&[192, 168, 1, 0], 24)?;
//! assert_eq!(table.lookup(&[192, 168, 1, 7])?, Some(100));
//! # Ok::<(), lpm_rs::LpmError>(())
//! ```

mod batch;
mod config;
mod dir24;
mod engine;
mod error;
mod mem;
mod prefix;
mod rib;
mod stride8;
mod sync;
mod table;
mod wide16;

pub use config::{Algorithm, TableConfig};
pub use error::{LpmError, Result};
pub use prefix::{Family, NextHop, Prefix, NO_ROUTE};
pub use sync::SharedTable;
pub use table::{Stats, Table};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod proptests;
