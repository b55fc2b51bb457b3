// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REIT Custody Protocol Core Library
//!
//! The substrate the custody engine runs on: addresses, signatures,
//! deterministic derivation, a typed account ledger, and the fungible
//! token primitive that both payments and scheme units are made of.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 identities, SHA-256, derived addresses with no
//!   private key, and the [`crypto::SignerProof`] capability.
//! - **runtime**: Typed accounts at 32-byte addresses, declared account
//!   sets, per-address locks, and all-or-nothing commits.
//! - **storage**: sled persistence for ledger accounts.
//! - **vault**: Token mints/accounts and the derived custody pair.
//! - **config**: Program id, seed tags, and field limits.
//!
//! ## Design Philosophy
//!
//! 1. Addresses are computed, never looked up. Anyone can re-derive them.
//! 2. Money math is integer, checked, and never wraps.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod runtime;
pub mod storage;
pub mod vault;

pub use crypto::{Address, Keypair, Signature, Signer, SignerProof};
pub use runtime::{AccountRecord, AccountSet, Ledger, RuntimeError, TxContext};
pub use storage::ReitDb;
