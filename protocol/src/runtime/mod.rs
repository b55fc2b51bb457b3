//! # Ledger Runtime
//!
//! The host-ledger model the engine runs on: typed accounts at 32-byte
//! addresses, operations that declare their accounts up front, and
//! all-or-nothing commits.
//!
//! ```text
//! account.rs: record discriminators and encoding
//! context.rs: declared account sets and staged writes
//! ledger.rs: cache + sled persistence, execute/commit
//! locks.rs: per-address write locks
//! ```

pub mod account;
pub mod context;
pub mod error;
pub mod ledger;
pub mod locks;

pub use account::{Account, AccountRecord, DISCRIMINATOR_LEN};
pub use context::{AccountSet, TxContext};
pub use error::RuntimeError;
pub use ledger::Ledger;
pub use locks::LockTable;
