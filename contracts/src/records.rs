//! # Engine Records
//!
//! The persistent entities of the custody engine. Each lives at a
//! deterministic address and is stored as a typed account:
//!
//! | Record                  | Address                                     |
//! |-------------------------|---------------------------------------------|
//! | `ConfigurationRegistry` | `["investment-trusts-configs"]`             |
//! | `Scheme`                | `["investment-trust-scheme", promoter]`     |
//! | `Investor`              | `["investor", owner]`                       |
//! | `InvestorPosition`      | `["position", scheme, owner]`               |
//! | `DepositLedger`         | caller-supplied fresh address per scheme    |
//!
//! Nothing is ever deleted.

use std::fmt;

use serde::{Deserialize, Serialize};

use reit_protocol::crypto::Address;
use reit_protocol::runtime::AccountRecord;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// ConfigurationRegistry
// ---------------------------------------------------------------------------

/// Singleton that gates scheme registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRegistry {
    /// The administrator who initialized the engine.
    pub owner: Address,
    pub initialized: bool,
    pub bump: u8,
}

impl AccountRecord for ConfigurationRegistry {
    const NAME: &'static str = "ConfigurationRegistry";
}

// ---------------------------------------------------------------------------
// SchemeKind
// ---------------------------------------------------------------------------

/// The two kinds of trust a scheme can be.
///
/// On the wire this is the integer code `1` or `2`. Anything else is
/// rejected when the request is decoded, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SchemeKind {
    /// Capital raised to build or acquire property.
    Development,
    /// Capital invested in income-producing property.
    Income,
}

impl SchemeKind {
    pub fn code(self) -> u8 {
        match self {
            SchemeKind::Development => 1,
            SchemeKind::Income => 2,
        }
    }
}

impl TryFrom<u8> for SchemeKind {
    type Error = EngineError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SchemeKind::Development),
            2 => Ok(SchemeKind::Income),
            other => Err(EngineError::InvalidSchemeKind(other)),
        }
    }
}

impl From<SchemeKind> for u8 {
    fn from(kind: SchemeKind) -> Self {
        kind.code()
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeKind::Development => write!(f, "Development"),
            SchemeKind::Income => write!(f, "Income"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// Descriptive data the promoter supplies about the offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerInfo {
    pub issuer_name: String,
    pub scheme_name: String,
    pub kind: SchemeKind,
    /// Free-form listing date, e.g. "February 2021".
    pub listing_date: String,
}

/// One registered investment-trust offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    /// The promoter. One scheme per promoter.
    pub owner: Address,
    pub issuer_name: String,
    pub scheme_name: String,
    pub kind: SchemeKind,
    pub listing_date: String,
    pub country: String,
    /// Price of one smallest unit, in smallest units of the payment mint.
    pub unit_cost: u64,
    pub unit_decimals: u8,
    /// Unit mint; `None` until `create_mint` runs.
    pub mint: Option<Address>,
    /// The token investors pay with.
    pub payment_mint: Address,
    pub deposit_ledger: Address,
    pub vault_authority: Address,
    pub vault: Address,
    /// Units held by investors through buy/sell. Always equals the sum of
    /// `units_held` over the positions of `investors`.
    pub units_outstanding: u64,
    /// Buy and sell are refused while `false`.
    pub active: bool,
    /// Investor record addresses, in order of their first buy.
    pub investors: Vec<Address>,
    pub bump: u8,
    pub authority_bump: u8,
    pub vault_bump: u8,
}

impl AccountRecord for Scheme {
    const NAME: &'static str = "Scheme";
}

/// Running net of payments into a scheme's vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLedger {
    /// The vault authority derived from this ledger's address.
    pub owner_authority: Address,
    pub scheme: Address,
    /// Sum of buy payments minus sell proceeds.
    pub net_deposited: i128,
    /// Bump of `owner_authority`.
    pub bump: u8,
}

impl AccountRecord for DepositLedger {
    const NAME: &'static str = "DepositLedger";
}

// ---------------------------------------------------------------------------
// Investor
// ---------------------------------------------------------------------------

/// A registered investor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    pub owner: Address,
    pub full_names: String,
    pub country: String,
    /// Total units acquired through buy/sell, summed over every scheme.
    /// Per-scheme figures live in [`InvestorPosition`].
    pub units_held: u64,
    /// Buy and sell are refused while `false`.
    pub active: bool,
    pub bump: u8,
}

impl AccountRecord for Investor {
    const NAME: &'static str = "Investor";
}

/// What one investor holds in one scheme.
///
/// Created by the investor's first buy of the scheme. Sells are checked
/// against this record, never against the investor's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorPosition {
    pub scheme: Address,
    /// Address of the investor record, not the owner.
    pub investor: Address,
    pub units_held: u64,
    pub bump: u8,
}

impl AccountRecord for InvestorPosition {
    const NAME: &'static str = "InvestorPosition";
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A scheme and the address it lives at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeRef {
    pub address: Address,
    pub scheme: Scheme,
}

/// An investor and the address it lives at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorRef {
    pub address: Address,
    pub investor: Investor,
}
