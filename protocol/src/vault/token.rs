//! # Fungible Token Primitive
//!
//! The minimum token machinery the custody engine needs: a [`Mint`] that
//! tracks supply and who may issue, and [`TokenAccount`]s that hold a
//! balance of exactly one mint for exactly one owner.
//!
//! Both the payment asset (what investors pay with) and every scheme's
//! units are tokens of this kind. Amounts are `u64` in smallest-unit
//! denomination; `decimals` is for display and conversion only, the
//! primitive never divides.
//!
//! ## Authorization
//!
//! Every debit takes a [`SignerProof`]. An `Owner` proof speaks for the key
//! holder. A `Derived` proof speaks for the address its seeds re-derive to,
//! which is how a vault authority with no private key moves funds.
//!
//! All functions stage writes on a [`TxContext`]; nothing is visible until
//! the surrounding operation commits.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::HOLDING_SEED;
use crate::crypto::{derive_address, Address, DerivationError, SignerProof};
use crate::runtime::{AccountRecord, RuntimeError, TxContext};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The debited account holds less than requested.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Balance at the time of the request.
        available: u64,
        /// Amount the caller asked to move.
        requested: u64,
    },

    /// The proof does not speak for the required signer.
    #[error("authority does not match the required signer")]
    Unauthorized,

    /// The mint has no issuing authority any more.
    #[error("mint {0} has a fixed supply")]
    FixedSupply(Address),

    /// A token account belongs to a different mint or owner than expected.
    #[error("token account {0} does not match the expected mint or owner")]
    AccountMismatch(Address),

    /// A balance or supply would overflow or underflow.
    #[error("token arithmetic overflow")]
    Overflow,

    /// The proof could not be resolved to an address.
    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type TokenResult<T> = Result<T, TokenError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Supply and issuing authority of a fungible token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    /// Who may issue new supply. `None` means supply is fixed.
    pub mint_authority: Option<Address>,
    /// Display precision of one whole token.
    pub decimals: u8,
    /// Total issued, in smallest units.
    pub supply: u64,
}

impl AccountRecord for Mint {
    const NAME: &'static str = "Mint";
}

/// A balance of one mint held by one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

impl AccountRecord for TokenAccount {
    const NAME: &'static str = "TokenAccount";
}

/// Deterministic holding-account address for `owner` and `mint`.
pub fn holding_address(
    owner: &Address,
    mint: &Address,
    program_id: &Address,
) -> Result<(Address, u8), DerivationError> {
    derive_address(
        &[HOLDING_SEED, owner.as_ref(), mint.as_ref()],
        program_id,
    )
}

/// Convert whole tokens to smallest units: `whole * 10^decimals`.
///
/// Returns `None` on overflow.
pub fn to_smallest_units(whole: u64, decimals: u8) -> Option<u64> {
    10u64
        .checked_pow(u32::from(decimals))
        .and_then(|scale| whole.checked_mul(scale))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Create a mint at `address` with zero supply.
pub fn initialize_mint(
    ctx: &mut TxContext<'_>,
    address: &Address,
    mint_authority: Option<Address>,
    decimals: u8,
) -> TokenResult<Mint> {
    let mint = Mint {
        mint_authority,
        decimals,
        supply: 0,
    };
    ctx.create(address, &mint)?;
    Ok(mint)
}

/// Open a token account, or return the existing one if it already matches.
///
/// An existing account of a different mint or owner is an error.
pub fn open_account(
    ctx: &mut TxContext<'_>,
    address: &Address,
    mint: &Address,
    owner: &Address,
) -> TokenResult<TokenAccount> {
    if let Some(existing) = ctx.try_load::<TokenAccount>(address)? {
        if existing.mint != *mint || existing.owner != *owner {
            return Err(TokenError::AccountMismatch(*address));
        }
        return Ok(existing);
    }
    // The mint must exist before anyone can hold it.
    ctx.load::<Mint>(mint)?;
    let account = TokenAccount {
        mint: *mint,
        owner: *owner,
        amount: 0,
    };
    ctx.create(address, &account)?;
    Ok(account)
}

/// Load a token account and check it belongs to `mint`.
pub fn load_account(
    ctx: &TxContext<'_>,
    address: &Address,
    mint: &Address,
) -> TokenResult<TokenAccount> {
    let account: TokenAccount = ctx.load(address)?;
    if account.mint != *mint {
        return Err(TokenError::AccountMismatch(*address));
    }
    Ok(account)
}

/// Issue `amount` new tokens into `destination`.
pub fn mint_to(
    ctx: &mut TxContext<'_>,
    mint_address: &Address,
    destination: &Address,
    amount: u64,
    authority: &SignerProof,
    program_id: &Address,
) -> TokenResult<()> {
    let mut mint: Mint = ctx.load(mint_address)?;
    let issuer = mint
        .mint_authority
        .ok_or(TokenError::FixedSupply(*mint_address))?;
    if authority.resolve(program_id)? != issuer {
        return Err(TokenError::Unauthorized);
    }

    let mut account = load_account(ctx, destination, mint_address)?;
    mint.supply = mint.supply.checked_add(amount).ok_or(TokenError::Overflow)?;
    account.amount = account
        .amount
        .checked_add(amount)
        .ok_or(TokenError::Overflow)?;

    ctx.store(mint_address, &mint)?;
    ctx.store(destination, &account)?;
    Ok(())
}

/// Move `amount` between two accounts of the same mint.
///
/// `authority` must resolve to the owner of `source`.
pub fn transfer(
    ctx: &mut TxContext<'_>,
    mint_address: &Address,
    source: &Address,
    destination: &Address,
    amount: u64,
    authority: &SignerProof,
    program_id: &Address,
) -> TokenResult<()> {
    let mut from = load_account(ctx, source, mint_address)?;
    if authority.resolve(program_id)? != from.owner {
        return Err(TokenError::Unauthorized);
    }
    if from.amount < amount {
        return Err(TokenError::InsufficientBalance {
            available: from.amount,
            requested: amount,
        });
    }
    let mut to = load_account(ctx, destination, mint_address)?;
    if source == destination {
        return Ok(());
    }

    from.amount -= amount;
    to.amount = to.amount.checked_add(amount).ok_or(TokenError::Overflow)?;

    ctx.store(source, &from)?;
    ctx.store(destination, &to)?;
    Ok(())
}

/// Destroy `amount` tokens held in `source`.
pub fn burn(
    ctx: &mut TxContext<'_>,
    mint_address: &Address,
    source: &Address,
    amount: u64,
    authority: &SignerProof,
    program_id: &Address,
) -> TokenResult<()> {
    let mut account = load_account(ctx, source, mint_address)?;
    if authority.resolve(program_id)? != account.owner {
        return Err(TokenError::Unauthorized);
    }
    if account.amount < amount {
        return Err(TokenError::InsufficientBalance {
            available: account.amount,
            requested: amount,
        });
    }
    let mut mint: Mint = ctx.load(mint_address)?;
    account.amount -= amount;
    mint.supply = mint.supply.checked_sub(amount).ok_or(TokenError::Overflow)?;

    ctx.store(source, &account)?;
    ctx.store(mint_address, &mint)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
