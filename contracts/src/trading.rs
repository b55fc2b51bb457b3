//! # Buy / Sell
//!
//! The two economic operations of a scheme.
//!
//! ## Buy
//!
//! ```text
//! investor payment account ──payment──► scheme vault
//! unit mint ──units = payment / unit_cost──► investor holding account
//! position.units_held += units, investor.units_held += units,
//! scheme.units_outstanding += units, deposit_ledger.net_deposited += payment
//! ```
//!
//! ## Sell
//!
//! ```text
//! investor holding account ──burn units──► ∅
//! scheme vault ──proceeds = units * unit_cost──► payout account
//! position.units_held -= units, investor.units_held -= units,
//! scheme.units_outstanding -= units, deposit_ledger.net_deposited -= proceeds
//! ```
//!
//! The vault debit is signed by the scheme's derived authority, which is
//! re-derived from the deposit ledger and checked against the scheme on
//! every call. Both operations are all-or-nothing, and both are refused
//! while the scheme or the investor is inactive.
//!
//! Holdings are accounted per (scheme, investor) in an
//! [`InvestorPosition`]; the investor record only keeps the total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use reit_protocol::config::POSITION_SEED;
use reit_protocol::crypto::{Address, Signer, SignerProof};
use reit_protocol::runtime::{AccountSet, TxContext};
use reit_protocol::vault::token;
use reit_protocol::vault::VaultCustodyPair;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::records::{DepositLedger, Investor, InvestorPosition, Scheme};

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Outcome of a successful buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub id: Uuid,
    pub scheme: Address,
    pub investor: Address,
    pub payment_amount: u64,
    pub units_credited: u64,
    pub unit_cost: u64,
    /// Where the units were credited.
    pub holding_account: Address,
    pub executed_at: DateTime<Utc>,
}

/// Outcome of a successful sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellReceipt {
    pub id: Uuid,
    pub scheme: Address,
    pub investor: Address,
    pub units_sold: u64,
    pub proceeds: u64,
    pub unit_cost: u64,
    /// Where the proceeds were paid.
    pub payout_account: Address,
    pub executed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Account resolution
// ---------------------------------------------------------------------------

/// Every address a buy or sell touches, resolved and verified up front.
struct Trade {
    scheme: Address,
    investor: Address,
    mint: Address,
    payment_mint: Address,
    holding: Address,
    position: Address,
    position_bump: u8,
    pair: VaultCustodyPair,
}

impl Trade {
    fn accounts(&self, counterparty: &Address) -> AccountSet {
        AccountSet::new()
            .readonly(self.payment_mint)
            .writable(self.scheme)
            .writable(self.investor)
            .writable(self.pair.deposit_ledger)
            .writable(self.pair.vault)
            .writable(self.mint)
            .writable(self.holding)
            .writable(self.position)
            .writable(*counterparty)
    }

    /// Re-read the records under lock and check they still describe the
    /// accounts this trade declared.
    fn load(
        &self,
        ctx: &TxContext<'_>,
        signer: &Signer,
    ) -> EngineResult<(Scheme, Investor, DepositLedger)> {
        let investor: Investor = ctx.load(&self.investor)?;
        if investor.owner != signer.address() {
            return Err(EngineError::Unauthorized);
        }
        if !investor.active {
            return Err(EngineError::InvestorInactive(self.investor));
        }

        let scheme: Scheme = ctx.load(&self.scheme)?;
        if scheme.mint != Some(self.mint)
            || scheme.payment_mint != self.payment_mint
            || scheme.deposit_ledger != self.pair.deposit_ledger
            || scheme.vault_authority != self.pair.authority
            || scheme.vault != self.pair.vault
        {
            return Err(EngineError::AccountMismatch(self.scheme));
        }
        if !scheme.active {
            return Err(EngineError::SchemeInactive(self.scheme));
        }

        let ledger: DepositLedger = ctx.load(&self.pair.deposit_ledger)?;
        if ledger.scheme != self.scheme || ledger.owner_authority != self.pair.authority {
            return Err(EngineError::AccountMismatch(self.pair.deposit_ledger));
        }

        Ok((scheme, investor, ledger))
    }

    /// The investor's position in this scheme, if one exists.
    fn position(&self, ctx: &TxContext<'_>) -> EngineResult<Option<InvestorPosition>> {
        let position: Option<InvestorPosition> = ctx.try_load(&self.position)?;
        if let Some(p) = &position {
            if p.scheme != self.scheme || p.investor != self.investor {
                return Err(EngineError::AccountMismatch(self.position));
            }
        }
        Ok(position)
    }
}

impl Engine {
    fn resolve_trade(
        &self,
        signer: &Signer,
        scheme_address: &Address,
        counterparty: &Address,
    ) -> EngineResult<Trade> {
        let investor = self.investor_address(&signer.address())?;
        let scheme = self
            .scheme(scheme_address)?
            .ok_or(EngineError::AccountNotFound(*scheme_address))?;

        // Never trust the supplied scheme address: it must re-derive from
        // the owner recorded inside it.
        if self.scheme_address(&scheme.owner)? != *scheme_address {
            return Err(EngineError::AccountMismatch(*scheme_address));
        }
        let mint = scheme
            .mint
            .ok_or(EngineError::MintNotCreated(*scheme_address))?;
        let pair = VaultCustodyPair::verify(
            &scheme.deposit_ledger,
            &scheme.vault_authority,
            &scheme.vault,
            self.program_id(),
        )?;
        // A vault-to-vault transfer moves nothing, so the vault is never
        // the other side of a trade.
        if *counterparty == pair.vault {
            return Err(EngineError::AccountMismatch(*counterparty));
        }
        let holding = self.holding_address(&signer.address(), &mint)?;
        let (position, position_bump) = self.derive(&[
            POSITION_SEED,
            scheme_address.as_ref(),
            signer.address().as_ref(),
        ])?;

        Ok(Trade {
            scheme: *scheme_address,
            investor,
            mint,
            payment_mint: scheme.payment_mint,
            holding,
            position,
            position_bump,
            pair,
        })
    }

    /// Buy units of `scheme` with `payment_amount` from `payment_source`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ZeroUnits`] if the payment buys nothing.
    /// - [`EngineError::InsufficientBalance`] if the source cannot pay.
    /// - [`EngineError::AccountNotFound`] if the caller is not a registered
    ///   investor or the scheme does not exist.
    pub fn buy(
        &self,
        investor: &Signer,
        scheme: &Address,
        payment_source: &Address,
        payment_amount: u64,
    ) -> EngineResult<BuyReceipt> {
        let result = self.buy_inner(investor, scheme, payment_source, payment_amount);
        if let Err(err) = &result {
            warn!(investor = %investor.address(), %scheme, payment_amount, error = %err, "buy rejected");
        }
        result
    }

    fn buy_inner(
        &self,
        signer: &Signer,
        scheme_address: &Address,
        payment_source: &Address,
        payment_amount: u64,
    ) -> EngineResult<BuyReceipt> {
        let trade = self.resolve_trade(signer, scheme_address, payment_source)?;
        let accounts = trade.accounts(payment_source);
        let pricing = self.settings().pricing;
        let program_id = *self.program_id();

        let (units, unit_cost) = self.ledger().execute(&accounts, |ctx| {
            let (mut scheme, mut investor, mut ledger) = trade.load(ctx, signer)?;
            let units = pricing.units_for_payment(payment_amount, scheme.unit_cost)?;
            let mut position = match trade.position(ctx)? {
                Some(position) => position,
                None => {
                    scheme.investors.push(trade.investor);
                    InvestorPosition {
                        scheme: trade.scheme,
                        investor: trade.investor,
                        units_held: 0,
                        bump: trade.position_bump,
                    }
                }
            };

            token::transfer(
                ctx,
                &trade.payment_mint,
                payment_source,
                &trade.pair.vault,
                payment_amount,
                &SignerProof::Owner(*signer),
                &program_id,
            )?;
            token::open_account(ctx, &trade.holding, &trade.mint, &signer.address())?;
            token::mint_to(
                ctx,
                &trade.mint,
                &trade.holding,
                units,
                &trade.pair.signer_proof(),
                &program_id,
            )?;

            position.units_held = position
                .units_held
                .checked_add(units)
                .ok_or(EngineError::ArithmeticFault)?;
            investor.units_held = investor
                .units_held
                .checked_add(units)
                .ok_or(EngineError::ArithmeticFault)?;
            scheme.units_outstanding = scheme
                .units_outstanding
                .checked_add(units)
                .ok_or(EngineError::ArithmeticFault)?;
            ledger.net_deposited = ledger
                .net_deposited
                .checked_add(i128::from(payment_amount))
                .ok_or(EngineError::ArithmeticFault)?;

            ctx.store(&trade.position, &position)?;
            ctx.store(&trade.investor, &investor)?;
            ctx.store(&trade.scheme, &scheme)?;
            ctx.store(&trade.pair.deposit_ledger, &ledger)?;
            Ok::<_, EngineError>((units, scheme.unit_cost))
        })?;

        info!(
            scheme = %trade.scheme,
            investor = %trade.investor,
            payment_amount,
            units,
            "units bought"
        );
        Ok(BuyReceipt {
            id: Uuid::new_v4(),
            scheme: trade.scheme,
            investor: trade.investor,
            payment_amount,
            units_credited: units,
            unit_cost,
            holding_account: trade.holding,
            executed_at: Utc::now(),
        })
    }

    /// Sell `unit_amount` units of `scheme`, paying proceeds into
    /// `payout_account`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InsufficientUnits`] if the investor holds fewer.
    /// - [`EngineError::VaultUnderfunded`] if the vault cannot cover the
    ///   proceeds. Terminal; the caller decides whether to resubmit.
    pub fn sell(
        &self,
        investor: &Signer,
        scheme: &Address,
        payout_account: &Address,
        unit_amount: u64,
    ) -> EngineResult<SellReceipt> {
        let result = self.sell_inner(investor, scheme, payout_account, unit_amount);
        if let Err(err) = &result {
            warn!(investor = %investor.address(), %scheme, unit_amount, error = %err, "sell rejected");
        }
        result
    }

    fn sell_inner(
        &self,
        signer: &Signer,
        scheme_address: &Address,
        payout_account: &Address,
        unit_amount: u64,
    ) -> EngineResult<SellReceipt> {
        if unit_amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let trade = self.resolve_trade(signer, scheme_address, payout_account)?;
        let accounts = trade.accounts(payout_account);
        let pricing = self.settings().pricing;
        let program_id = *self.program_id();

        let (proceeds, unit_cost) = self.ledger().execute(&accounts, |ctx| {
            let (mut scheme, mut investor, mut ledger) = trade.load(ctx, signer)?;
            let mut position = match trade.position(ctx)? {
                Some(position) if position.units_held >= unit_amount => position,
                other => {
                    return Err(EngineError::InsufficientUnits {
                        held: other.map_or(0, |p| p.units_held),
                        requested: unit_amount,
                    })
                }
            };
            let proceeds = pricing.proceeds_for_units(unit_amount, scheme.unit_cost)?;

            let vault = token::load_account(ctx, &trade.pair.vault, &trade.payment_mint)?;
            if vault.amount < proceeds {
                return Err(EngineError::VaultUnderfunded {
                    available: vault.amount,
                    required: proceeds,
                });
            }

            token::burn(
                ctx,
                &trade.mint,
                &trade.holding,
                unit_amount,
                &SignerProof::Owner(*signer),
                &program_id,
            )?;
            token::transfer(
                ctx,
                &trade.payment_mint,
                &trade.pair.vault,
                payout_account,
                proceeds,
                &trade.pair.signer_proof(),
                &program_id,
            )?;

            position.units_held -= unit_amount;
            investor.units_held = investor
                .units_held
                .checked_sub(unit_amount)
                .ok_or(EngineError::ArithmeticFault)?;
            scheme.units_outstanding = scheme
                .units_outstanding
                .checked_sub(unit_amount)
                .ok_or(EngineError::ArithmeticFault)?;
            ledger.net_deposited = ledger
                .net_deposited
                .checked_sub(i128::from(proceeds))
                .ok_or(EngineError::ArithmeticFault)?;

            ctx.store(&trade.position, &position)?;
            ctx.store(&trade.investor, &investor)?;
            ctx.store(&trade.scheme, &scheme)?;
            ctx.store(&trade.pair.deposit_ledger, &ledger)?;
            Ok((proceeds, scheme.unit_cost))
        })?;

        info!(
            scheme = %trade.scheme,
            investor = %trade.investor,
            unit_amount,
            proceeds,
            "units sold"
        );
        Ok(SellReceipt {
            id: Uuid::new_v4(),
            scheme: trade.scheme,
            investor: trade.investor,
            units_sold: unit_amount,
            proceeds,
            unit_cost,
            payout_account: *payout_account,
            executed_at: Utc::now(),
        })
    }
}
