//! Fallible slot-array allocation.
//!
//! Node arrays, extension blocks and the direct tables are allocated through
//! here so that running out of memory comes back as [`LpmError::Allocation`]
//! before any slot has been touched.

use tracing::warn;

use crate::error::{LpmError, Result};

/// Allocates `len` default-initialised slots.
pub(crate) fn boxed_slice<T: Default>(len: usize, what: &'static str) -> Result<Box<[T]>> {
    let mut slots = Vec::new();
    if injected_failure() || slots.try_reserve_exact(len).is_err() {
        warn!(len, what, "slot array allocation failed");
        return Err(LpmError::Allocation(what));
    }
    slots.resize_with(len, T::default);
    Ok(slots.into_boxed_slice())
}

/// Grows `vec` by room for `additional` more elements.
pub(crate) fn reserve<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    if injected_failure() || vec.try_reserve(additional).is_err() {
        warn!(additional, what, "pool reservation failed");
        return Err(LpmError::Allocation(what));
    }
    Ok(())
}

#[cfg(not(test))]
#[inline(always)]
fn injected_failure() -> bool {
    false
}

#[cfg(test)]
thread_local! {
    static FAIL_AFTER: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

#[cfg(test)]
fn injected_failure() -> bool {
    FAIL_AFTER.with(|left| match left.get() {
        Some(0) => true,
        Some(n) => {
            left.set(Some(n - 1));
            false
        }
        None => false,
    })
}

/// Makes every allocation on this thread fail once `n` more have succeeded.
/// Dropping the guard turns failures off again.
#[cfg(test)]
pub(crate) struct FailAfter;

#[cfg(test)]
impl FailAfter {
    pub(crate) fn new(n: usize) -> Self {
        FAIL_AFTER.with(|left| left.set(Some(n)));
        FailAfter
    }
}

#[cfg(test)]
impl Drop for FailAfter {
    fn drop(&mut self) {
        FAIL_AFTER.with(|left| left.set(None));
    }
}
