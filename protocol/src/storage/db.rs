//! # ReitDb: Persistent Account Store
//!
//! The persistence layer for the custody engine, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                | Value                          |
//! |------------|--------------------|--------------------------------|
//! | `accounts` | `address` (32B)    | discriminator + bincode record |
//! | `metadata` | key (UTF-8)        | value (bytes)                  |
//!
//! Addresses are stored as raw 32-byte keys so a prefix scan over the
//! `accounts` tree walks them in byte order.
//!
//! ## Atomicity
//!
//! A committed operation may touch a handful of accounts (scheme, vault,
//! investor, holding, mint). They are written in a single `Batch`: either
//! every account of the operation lands on disk or none does.

use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::crypto::Address;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Key in the `metadata` tree holding the number of committed operations.
const META_COMMIT_COUNT: &[u8] = b"commit_count";

// ---------------------------------------------------------------------------
// ReitDb
// ---------------------------------------------------------------------------

/// Persistent storage for ledger accounts.
///
/// Wraps a sled `Db` and stores account payloads verbatim; decoding is the
/// runtime's job. Cloning is cheap (sled handles are reference counted), so
/// `ReitDb` can be shared across threads without extra synchronization.
#[derive(Debug, Clone)]
pub struct ReitDb {
    db: Db,
    accounts: Tree,
    metadata: Tree,
}

impl ReitDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database, removed when the handle is dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            accounts,
            metadata,
        })
    }

    // -- Account operations -------------------------------------------------

    /// Read the raw payload stored at `address`.
    pub fn get_account(&self, address: &Address) -> DbResult<Option<Vec<u8>>> {
        Ok(self.accounts.get(address.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Write every `(address, payload)` pair in one atomic batch and bump
    /// the commit counter.
    pub fn apply_accounts<'a, I>(&self, writes: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (&'a Address, &'a [u8])>,
    {
        let mut batch = Batch::default();
        for (address, payload) in writes {
            batch.insert(&address.as_bytes()[..], payload);
        }
        self.accounts.apply_batch(batch)?;

        self.metadata.fetch_and_update(META_COMMIT_COUNT, |old| {
            let current = old
                .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            Some(current.saturating_add(1).to_be_bytes().to_vec())
        })?;

        self.db.flush()?;
        Ok(())
    }

    /// Every stored address, in byte order.
    pub fn addresses(&self) -> DbResult<Vec<Address>> {
        let mut out = Vec::with_capacity(self.accounts.len());
        for entry in self.accounts.iter() {
            let (key, _) = entry?;
            let address = Address::try_from_slice(&key)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            out.push(address);
        }
        Ok(out)
    }

    // -- Metadata operations ------------------------------------------------

    /// Number of atomic commits applied to this database.
    pub fn commit_count(&self) -> DbResult<u64> {
        match self.metadata.get(META_COMMIT_COUNT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Serialization("invalid commit counter".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    // -- Utility operations -------------------------------------------------

    /// Return the number of accounts stored in the database.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
