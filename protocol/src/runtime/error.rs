//! Error types for the ledger runtime.
//!
//! These describe violations of the account model itself (undeclared
//! accounts, type confusion, storage failures), not business rules. The
//! engine wraps them; callers rarely match on them directly.

use thiserror::Error;

use crate::crypto::Address;
use crate::storage::DbError;

/// Errors raised while loading, staging, or committing accounts.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The operation touched an account it did not declare up front.
    #[error("account {0} was not declared by the operation")]
    UndeclaredAccount(Address),

    /// The operation tried to write an account it declared read-only.
    #[error("account {0} is declared read-only")]
    ReadOnlyAccount(Address),

    /// No record exists at the address.
    #[error("account {0} does not exist")]
    AccountNotFound(Address),

    /// A create targeted an address that already holds a record.
    #[error("account {0} already exists")]
    AccountAlreadyExists(Address),

    /// The record at the address is of a different type.
    #[error("account {address} is not a {expected}")]
    TypeMismatch {
        /// The offending address.
        address: Address,
        /// The record type the caller expected.
        expected: &'static str,
    },

    /// Encoding or decoding a record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}
