//! Per-address write locks.
//!
//! Operations touching disjoint accounts never contend. Operations sharing
//! an account serialize on it. Locks are always taken in ascending address
//! order, so two operations with overlapping write sets cannot deadlock.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::crypto::Address;

/// A lazily-populated table of one mutex per written address.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handles for `addresses`, in ascending order.
    ///
    /// The caller takes the guards by iterating the returned vector. A
    /// `BTreeSet` is already sorted, which is what keeps acquisition order
    /// global.
    pub fn handles(&self, addresses: &BTreeSet<Address>) -> Vec<Arc<Mutex<()>>> {
        addresses
            .iter()
            .map(|address| {
                self.locks
                    .entry(*address)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .value()
                    .clone()
            })
            .collect()
    }

    /// Number of addresses that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
