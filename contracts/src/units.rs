//! # Unit Transfers & Payment Tokens
//!
//! [`Engine::move_units`] moves token balances between holding accounts.
//! The required signer depends on who owns the source account:
//!
//! - a person: their own signature ([`UnitAuthority::Owner`]),
//! - a scheme's vault authority: the promoter asks, and the engine
//!   re-derives the custody pair and signs with its derivation proof
//!   ([`UnitAuthority::SchemeVault`]).
//!
//! The remaining helpers create and fund payment tokens so investors have
//! something to pay with.

use tracing::{info, warn};

use reit_protocol::config::MAX_DECIMALS;
use reit_protocol::crypto::{Address, Signer, SignerProof};
use reit_protocol::runtime::AccountSet;
use reit_protocol::vault::token;
use reit_protocol::vault::{Mint, VaultCustodyPair};

pub use reit_protocol::vault::to_smallest_units;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::records::Scheme;

/// Who is authorizing a debit in [`Engine::move_units`].
#[derive(Debug, Clone, Copy)]
pub enum UnitAuthority<'a> {
    /// The source account's owner, signing for themselves.
    Owner(&'a Signer),
    /// The promoter, directing their scheme's vault authority.
    SchemeVault { promoter: &'a Signer },
}

impl Engine {
    /// Move `amount` of `mint` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InsufficientBalance`] if `from` holds less.
    /// - [`EngineError::Unauthorized`] if the authority does not speak for
    ///   the owner of `from`.
    pub fn move_units(
        &self,
        mint: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
        authority: UnitAuthority<'_>,
    ) -> EngineResult<()> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }

        let mut accounts = AccountSet::new()
            .readonly(*mint)
            .writable(*from)
            .writable(*to);

        let (proof, scheme_address) = match authority {
            UnitAuthority::Owner(signer) => (SignerProof::Owner(*signer), None),
            UnitAuthority::SchemeVault { promoter } => {
                let scheme_address = self.scheme_address(&promoter.address())?;
                let scheme: Scheme = self
                    .scheme(&scheme_address)?
                    .ok_or(EngineError::Unauthorized)?;
                let pair = VaultCustodyPair::verify(
                    &scheme.deposit_ledger,
                    &scheme.vault_authority,
                    &scheme.vault,
                    self.program_id(),
                )?;
                accounts = accounts.readonly(scheme_address);
                (pair.signer_proof(), Some(scheme_address))
            }
        };

        self.ledger().execute(&accounts, |ctx| {
            if let Some(scheme_address) = &scheme_address {
                // The scheme must still name this promoter and this vault.
                let scheme: Scheme = ctx.load(scheme_address)?;
                if proof.resolve(self.program_id())? != scheme.vault_authority {
                    return Err(EngineError::Unauthorized);
                }
            }
            token::transfer(ctx, mint, from, to, amount, &proof, self.program_id())?;
            Ok(())
        })
        .map_err(|err| {
            if matches!(err, EngineError::Unauthorized) {
                warn!(%from, %mint, "move_units refused");
            }
            err
        })?;

        info!(%mint, %from, %to, amount, "units moved");
        Ok(())
    }

    /// Create a payment token at `mint_address`, issued by `authority`.
    pub fn create_payment_mint(
        &self,
        authority: &Signer,
        mint_address: &Address,
        decimals: u8,
    ) -> EngineResult<Mint> {
        if decimals > MAX_DECIMALS {
            return Err(EngineError::InvalidDecimals(decimals));
        }
        let accounts = AccountSet::new().writable(*mint_address);
        let mint = self.ledger().execute(&accounts, |ctx| {
            if ctx.exists(mint_address)? {
                return Err(EngineError::AccountMismatch(*mint_address));
            }
            Ok(token::initialize_mint(
                ctx,
                mint_address,
                Some(authority.address()),
                decimals,
            )?)
        })?;
        info!(mint = %mint_address, decimals, "payment mint created");
        Ok(mint)
    }

    /// Open (or find) `owner`'s holding account for `mint`.
    pub fn open_token_account(&self, owner: &Address, mint: &Address) -> EngineResult<Address> {
        let holding = self.holding_address(owner, mint)?;
        let accounts = AccountSet::new().readonly(*mint).writable(holding);
        self.ledger().execute(&accounts, |ctx| {
            token::open_account(ctx, &holding, mint, owner).map_err(EngineError::from)
        })?;
        Ok(holding)
    }

    /// Issue `amount` of `mint` into `owner`'s holding account, opening it
    /// if needed. `authority` must be the mint authority.
    pub fn issue_payment(
        &self,
        authority: &Signer,
        mint: &Address,
        owner: &Address,
        amount: u64,
    ) -> EngineResult<Address> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let holding = self.holding_address(owner, mint)?;
        let accounts = AccountSet::new().writable(*mint).writable(holding);
        let proof = SignerProof::Owner(*authority);
        self.ledger().execute(&accounts, |ctx| {
            token::open_account(ctx, &holding, mint, owner)?;
            token::mint_to(ctx, mint, &holding, amount, &proof, self.program_id())?;
            Ok::<_, EngineError>(())
        })?;
        info!(%mint, %owner, amount, "payment tokens issued");
        Ok(holding)
    }
}
