//! Engine error taxonomy.
//!
//! Every engine operation returns [`EngineError`] on failure and, when it
//! does, has changed nothing. Errors from the protocol layer are folded
//! into the business vocabulary here: a token overdraft is
//! `InsufficientBalance`, a forged derivation proof is `Unauthorized`, and
//! so on.

use thiserror::Error;

use reit_protocol::crypto::{Address, DerivationError};
use reit_protocol::runtime::RuntimeError;
use reit_protocol::storage::DbError;
use reit_protocol::vault::{CustodyError, TokenError};

/// Errors returned by [`Engine`](crate::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- Lifecycle ----------------------------------------------------------
    #[error("configuration registry is not initialized")]
    NotInitialized,

    #[error("configuration registry is already initialized")]
    AlreadyInitialized,

    // -- Structural collisions ----------------------------------------------
    /// The promoter already has a scheme, or the deposit ledger is taken.
    #[error("scheme already registered at {0}")]
    DuplicateScheme(Address),

    #[error("investor already registered at {0}")]
    DuplicateInvestor(Address),

    // -- Authorization ------------------------------------------------------
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    // -- Status -------------------------------------------------------------
    #[error("scheme {0} is not active")]
    SchemeInactive(Address),

    #[error("investor {0} is not active")]
    InvestorInactive(Address),

    // -- Economic shortfalls ------------------------------------------------
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("insufficient units: held {held}, requested {requested}")]
    InsufficientUnits { held: u64, requested: u64 },

    /// The vault cannot cover sell proceeds. Terminal; never retried.
    #[error("vault underfunded: holds {available}, proceeds require {required}")]
    VaultUnderfunded { available: u64, required: u64 },

    /// The payment does not buy a single smallest unit.
    #[error("payment of {payment} buys zero units at unit cost {unit_cost}")]
    ZeroUnits { payment: u64, unit_cost: u64 },

    /// The payment is not an exact multiple of the unit cost and the
    /// pricing policy refuses remainders.
    #[error("payment of {payment} is not a multiple of unit cost {unit_cost}")]
    InexactPayment { payment: u64, unit_cost: u64 },

    #[error("arithmetic overflow or underflow")]
    ArithmeticFault,

    // -- Derivation ---------------------------------------------------------
    /// No bump yields an off-curve address. Fatal configuration error.
    #[error("address derivation exhausted the bump space")]
    DerivationExhausted,

    #[error("derivation error: {0}")]
    Derivation(DerivationError),

    // -- Input validation ---------------------------------------------------
    #[error("issuer name must be 1..=30 bytes, got {0}")]
    InvalidIssuerLength(usize),

    #[error("scheme name must be 1..=30 bytes, got {0}")]
    InvalidNameLength(usize),

    #[error("listing date must be 1..=20 bytes, got {0}")]
    InvalidListingDateLength(usize),

    #[error("country code must be 2 or 3 bytes, got {0}")]
    InvalidCountryLength(usize),

    #[error("full names must be 1..=50 bytes, got {0}")]
    InvalidFullNamesLength(usize),

    #[error("unknown scheme kind {0}; expected 1 (development) or 2 (income)")]
    InvalidSchemeKind(u8),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("unit cost must be greater than zero")]
    InvalidUnitCost,

    #[error("decimals must be at most 18, got {0}")]
    InvalidDecimals(u8),

    // -- Mint lifecycle -----------------------------------------------------
    #[error("scheme {0} has no unit mint yet")]
    MintNotCreated(Address),

    #[error("scheme {0} already has a unit mint")]
    SchemeAlreadyHasMint(Address),

    // -- Accounts -----------------------------------------------------------
    #[error("account {0} does not exist")]
    AccountNotFound(Address),

    /// An account exists but is of the wrong type, mint, or owner.
    #[error("account {0} does not match what the operation expects")]
    AccountMismatch(Address),

    // -- Infrastructure -----------------------------------------------------
    #[error("runtime error: {0}")]
    Runtime(RuntimeError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<DerivationError> for EngineError {
    fn from(err: DerivationError) -> Self {
        match err {
            DerivationError::DerivationExhausted(_) => EngineError::DerivationExhausted,
            // Explicit seeds landing on the curve is a forged proof.
            DerivationError::InvalidSeeds => EngineError::Unauthorized,
            other => EngineError::Derivation(other),
        }
    }
}

impl From<RuntimeError> for EngineError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::AccountNotFound(address) => EngineError::AccountNotFound(address),
            RuntimeError::TypeMismatch { address, .. } => EngineError::AccountMismatch(address),
            RuntimeError::Storage(db) => EngineError::Storage(db),
            other => EngineError::Runtime(other),
        }
    }
}

impl From<TokenError> for EngineError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InsufficientBalance {
                available,
                requested,
            } => EngineError::InsufficientBalance {
                available,
                requested,
            },
            TokenError::Unauthorized | TokenError::FixedSupply(_) => EngineError::Unauthorized,
            TokenError::AccountMismatch(address) => EngineError::AccountMismatch(address),
            TokenError::Overflow => EngineError::ArithmeticFault,
            TokenError::Derivation(e) => e.into(),
            TokenError::Runtime(e) => e.into(),
        }
    }
}

impl From<CustodyError> for EngineError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::Derivation(e) => e.into(),
            CustodyError::Mismatch { expected_vault, .. } => {
                EngineError::AccountMismatch(expected_vault)
            }
        }
    }
}
