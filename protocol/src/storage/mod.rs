//! # Storage Module
//!
//! Durable persistence for ledger accounts. The runtime keeps a hot cache
//! in memory and uses [`ReitDb`] as the source of truth across restarts.
//!
//! Bincode is the on-disk encoding. JSON is for APIs and debugging.

pub mod db;

pub use db::{DbError, DbResult, ReitDb};
