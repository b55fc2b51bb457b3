//! # Transaction Context
//!
//! Every engine operation runs inside a [`TxContext`]. The context:
//!
//! - only lets the operation see accounts it declared in its [`AccountSet`],
//! - only lets it write accounts it declared writable,
//! - stages every write in an overlay that is committed all at once when
//!   the operation succeeds, or dropped when it fails.
//!
//! Failure therefore never leaves a half-applied operation behind.

use std::collections::{BTreeMap, BTreeSet};

use super::account::{Account, AccountRecord};
use super::error::RuntimeError;
use super::ledger::Ledger;
use crate::crypto::Address;

// ---------------------------------------------------------------------------
// AccountSet
// ---------------------------------------------------------------------------

/// The accounts an operation declares up front.
#[derive(Debug, Clone, Default)]
pub struct AccountSet {
    writable: BTreeSet<Address>,
    readonly: BTreeSet<Address>,
}

impl AccountSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `address` writable. Writable wins if declared both ways.
    pub fn writable(mut self, address: Address) -> Self {
        self.readonly.remove(&address);
        self.writable.insert(address);
        self
    }

    /// Declare `address` read-only.
    pub fn readonly(mut self, address: Address) -> Self {
        if !self.writable.contains(&address) {
            self.readonly.insert(address);
        }
        self
    }

    pub fn is_declared(&self, address: &Address) -> bool {
        self.writable.contains(address) || self.readonly.contains(address)
    }

    pub fn is_writable(&self, address: &Address) -> bool {
        self.writable.contains(address)
    }

    /// Writable addresses in lock order.
    pub fn writable_set(&self) -> &BTreeSet<Address> {
        &self.writable
    }
}

// ---------------------------------------------------------------------------
// TxContext
// ---------------------------------------------------------------------------

/// A staged view of the ledger for a single operation.
pub struct TxContext<'a> {
    ledger: &'a Ledger,
    accounts: &'a AccountSet,
    writes: BTreeMap<Address, Account>,
}

impl<'a> TxContext<'a> {
    pub(crate) fn new(ledger: &'a Ledger, accounts: &'a AccountSet) -> Self {
        Self {
            ledger,
            accounts,
            writes: BTreeMap::new(),
        }
    }

    fn check_declared(&self, address: &Address) -> Result<(), RuntimeError> {
        if self.accounts.is_declared(address) {
            Ok(())
        } else {
            Err(RuntimeError::UndeclaredAccount(*address))
        }
    }

    fn check_writable(&self, address: &Address) -> Result<(), RuntimeError> {
        self.check_declared(address)?;
        if self.accounts.is_writable(address) {
            Ok(())
        } else {
            Err(RuntimeError::ReadOnlyAccount(*address))
        }
    }

    fn raw(&self, address: &Address) -> Result<Option<Account>, RuntimeError> {
        self.check_declared(address)?;
        if let Some(staged) = self.writes.get(address) {
            return Ok(Some(staged.clone()));
        }
        self.ledger.get(address)
    }

    /// Returns `true` if any record lives at `address`.
    pub fn exists(&self, address: &Address) -> Result<bool, RuntimeError> {
        Ok(self.raw(address)?.is_some())
    }

    /// Load a record, failing if absent or of another type.
    pub fn load<T: AccountRecord>(&self, address: &Address) -> Result<T, RuntimeError> {
        self.try_load(address)?
            .ok_or(RuntimeError::AccountNotFound(*address))
    }

    /// Load a record if one exists.
    pub fn try_load<T: AccountRecord>(&self, address: &Address) -> Result<Option<T>, RuntimeError> {
        match self.raw(address)? {
            Some(account) => account.decode(address).map(Some),
            None => Ok(None),
        }
    }

    /// Stage a write over whatever lives at `address`.
    pub fn store<T: AccountRecord>(&mut self, address: &Address, record: &T) -> Result<(), RuntimeError> {
        self.check_writable(address)?;
        let account = Account::from_record(record)?;
        self.writes.insert(*address, account);
        Ok(())
    }

    /// Stage a new record; fails if the address is already occupied.
    pub fn create<T: AccountRecord>(&mut self, address: &Address, record: &T) -> Result<(), RuntimeError> {
        self.check_writable(address)?;
        if self.raw(address)?.is_some() {
            return Err(RuntimeError::AccountAlreadyExists(*address));
        }
        self.store(address, record)
    }

    /// Number of staged writes.
    pub fn dirty(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn into_writes(self) -> BTreeMap<Address, Account> {
        self.writes
    }
}
