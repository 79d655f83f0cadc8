//! A [`Table`] behind a reader-writer lock.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::prefix::NextHop;
use crate::table::{Stats, Table};

/// Thread-safe wrapper around a [`Table`].
///
/// Lookups take the read lock and run in parallel; insert, delete and close
/// take the write lock.
pub struct SharedTable {
    inner: RwLock<Table>,
}

impl SharedTable {
    pub fn new(table: Table) -> Self {
        Self {
            inner: RwLock::new(table),
        }
    }

    pub fn insert(&self, network: &[u8], len: u8, next_hop: NextHop) -> Result<Option<NextHop>> {
        self.inner.write().insert(network, len, next_hop)
    }

    pub fn delete(&self, network: &[u8], len: u8) -> Result<NextHop> {
        self.inner.write().delete(network, len)
    }

    pub fn lookup(&self, addr: &[u8]) -> Result<Option<NextHop>> {
        self.inner.read().lookup(addr)
    }

    pub fn lookup_batch<A: AsRef<[u8]>>(&self, addrs: &[A], out: &mut [Option<NextHop>]) -> Result<()> {
        self.inner.read().lookup_batch(addrs, out)
    }

    pub fn stats(&self) -> Result<Stats> {
        self.inner.read().stats()
    }

    pub fn close(&self) {
        self.inner.write().close();
    }

    /// Holds the read lock for a sequence of reads.
    pub fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.inner.read()
    }

    /// Holds the write lock for a sequence of updates.
    pub fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.inner.write()
    }

    pub fn into_inner(self) -> Table {
        self.inner.into_inner()
    }
}

impl From<Table> for SharedTable {
    fn from(table: Table) -> Self {
        Self::new(table)
    }
}
