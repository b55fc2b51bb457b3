//! # Vault Module
//!
//! Where value lives. Two pieces:
//!
//! ```text
//! token.rs: fungible mint/account primitive: issue, transfer, burn
//! custody.rs: derived (authority, vault) pairs with no private key
//! ```
//!
//! All amounts are `u64` in smallest-unit denomination. No floating point,
//! no division inside the primitive.

pub mod custody;
pub mod token;

pub use custody::{CustodyError, VaultCustodyPair};
pub use token::{
    holding_address, to_smallest_units, Mint, TokenAccount, TokenError, TokenResult,
};
