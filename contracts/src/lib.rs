//! # REIT Custody Engine
//!
//! Registers investment-trust schemes, issues units against them, and lets
//! investors buy and sell those units against a custodial vault whose
//! signing authority is derived rather than held as a private key.
//!
//! - **Configuration**: one-time initialization, handed out as a
//!   [`ConfigHandle`] instead of ambient global state.
//! - **Schemes**: one per promoter, each with its own vault custody pair
//!   and unit mint.
//! - **Investors**: one per owner, with a position per scheme traded.
//! - **Units**: transfers between holding accounts and payment-token
//!   helpers.
//! - **Trading**: buy (floor pricing) and sell (exact proceeds).
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Wrapping arithmetic and
//!    money do not mix.
//! 2. Every operation declares its accounts, locks the writable ones in
//!    address order, and commits all of its writes or none of them.
//! 3. Callers are [`Signer`](reit_protocol::crypto::Signer)s, never bare
//!    addresses.
//! 4. Every address is re-derived before it is trusted.

pub mod configuration;
pub mod engine;
pub mod error;
pub mod investors;
pub mod pricing;
pub mod records;
pub mod schemes;
pub mod trading;
pub mod units;
pub mod validation;

pub use configuration::ConfigHandle;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, EngineResult};
pub use investors::RegisterInvestorParams;
pub use pricing::PricingPolicy;
pub use records::{
    ConfigurationRegistry, DepositLedger, Investor, InvestorPosition, InvestorRef, IssuerInfo,
    Scheme, SchemeKind, SchemeRef,
};
pub use schemes::{InitialIssue, RegisterSchemeParams};
pub use trading::{BuyReceipt, SellReceipt};
pub use units::{to_smallest_units, UnitAuthority};
