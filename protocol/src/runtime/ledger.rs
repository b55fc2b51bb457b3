//! # Ledger
//!
//! The account store every operation reads and writes through.
//!
//! ```text
//!  execute(accounts, op)
//!     │ lock writable addresses (ascending order)
//!     ▼
//!  TxContext ──reads──► cache (DashMap) ──miss──► ReitDb (sled)
//!     │ staged writes
//!     ▼ op returned Ok
//!  commit: ReitDb batch first, then cache
//! ```
//!
//! The cache is populated on read with `or_insert`, so a stale disk read
//! can never overwrite a value that a concurrent commit already cached.

use std::collections::BTreeMap;

use dashmap::DashMap;
use parking_lot::MutexGuard;
use tracing::{debug, trace};

use super::account::{Account, AccountRecord};
use super::context::{AccountSet, TxContext};
use super::error::RuntimeError;
use super::locks::LockTable;
use crate::crypto::Address;
use crate::storage::ReitDb;

/// In-memory account cache with optional sled persistence.
#[derive(Debug, Default)]
pub struct Ledger {
    cache: DashMap<Address, Account>,
    db: Option<ReitDb>,
    locks: LockTable,
}

impl Ledger {
    /// A ledger that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A ledger backed by `db`. Existing accounts are loaded lazily.
    pub fn persistent(db: ReitDb) -> Self {
        Self {
            cache: DashMap::new(),
            db: Some(db),
            locks: LockTable::new(),
        }
    }

    /// Whether commits reach disk.
    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }

    /// Raw read outside any operation.
    pub fn get(&self, address: &Address) -> Result<Option<Account>, RuntimeError> {
        if let Some(hit) = self.cache.get(address) {
            return Ok(Some(hit.value().clone()));
        }
        let Some(db) = &self.db else {
            return Ok(None);
        };
        match db.get_account(address)? {
            Some(bytes) => {
                trace!(%address, "ledger cache miss served from disk");
                let account = self
                    .cache
                    .entry(*address)
                    .or_insert(Account::from_bytes(bytes))
                    .value()
                    .clone();
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Typed read outside any operation.
    ///
    /// Suitable for queries and for resolving which accounts an operation
    /// must declare. Anything that decides a write must re-read inside
    /// [`Ledger::execute`].
    pub fn read<T: AccountRecord>(&self, address: &Address) -> Result<Option<T>, RuntimeError> {
        match self.get(address)? {
            Some(account) => account.decode(address).map(Some),
            None => Ok(None),
        }
    }

    /// Run `op` against a staged view of `accounts`.
    ///
    /// Writable accounts stay locked for the duration of `op` and the
    /// commit. If `op` returns `Err`, nothing it staged is applied.
    pub fn execute<R, E, F>(&self, accounts: &AccountSet, op: F) -> Result<R, E>
    where
        F: FnOnce(&mut TxContext<'_>) -> Result<R, E>,
        E: From<RuntimeError>,
    {
        let handles = self.locks.handles(accounts.writable_set());
        let _guards: Vec<MutexGuard<'_, ()>> = handles.iter().map(|lock| lock.lock()).collect();

        let mut ctx = TxContext::new(self, accounts);
        let result = op(&mut ctx)?;
        let writes = ctx.into_writes();
        self.commit(writes)?;
        Ok(result)
    }

    fn commit(&self, writes: BTreeMap<Address, Account>) -> Result<(), RuntimeError> {
        if writes.is_empty() {
            return Ok(());
        }
        if let Some(db) = &self.db {
            db.apply_accounts(
                writes
                    .iter()
                    .map(|(address, account)| (address, account.as_bytes())),
            )?;
        }
        debug!(accounts = writes.len(), "committed operation");
        for (address, account) in writes {
            self.cache.insert(address, account);
        }
        Ok(())
    }

    /// Number of accounts currently cached in memory.
    pub fn cached_accounts(&self) -> usize {
        self.cache.len()
    }

    /// Flush pending disk writes. A no-op for in-memory ledgers.
    pub fn flush(&self) -> Result<(), RuntimeError> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }
}
