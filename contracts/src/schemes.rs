//! # Scheme Registry
//!
//! A promoter registers exactly one scheme. Registration creates, in one
//! atomic step:
//!
//! - the [`Scheme`] record at `["investment-trust-scheme", promoter]`,
//! - the [`DepositLedger`] at the caller-supplied fresh address,
//! - the vault: a payment-token account owned by the authority derived
//!   from the deposit ledger.
//!
//! The unit mint comes later, via [`Engine::create_mint`], and is issued by
//! the same derived authority.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reit_protocol::config::SCHEME_SEED;
use reit_protocol::crypto::{Address, Signer};
use reit_protocol::runtime::AccountSet;
use reit_protocol::vault::token;
use reit_protocol::vault::{Mint, VaultCustodyPair};

use crate::configuration::ConfigHandle;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::records::{ConfigurationRegistry, DepositLedger, IssuerInfo, Scheme, SchemeRef};
use crate::validation;

/// Parameters for [`Engine::register_scheme`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSchemeParams {
    pub issuer: IssuerInfo,
    pub country: String,
    /// Price of one smallest unit, in smallest payment units.
    pub unit_cost: u64,
    pub decimals: u8,
    /// The token investors pay with. Must already exist.
    pub payment_mint: Address,
    /// A fresh address, unique per scheme, that anchors the vault.
    pub deposit_ledger: Address,
}

/// Units pre-issued when the mint is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialIssue {
    /// Owner of the holding account that receives the units.
    pub owner: Address,
    pub amount: u64,
}

impl Engine {
    /// Register the calling promoter's scheme.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotInitialized`] if the registry is missing.
    /// - [`EngineError::DuplicateScheme`] if the promoter already has a
    ///   scheme or the deposit ledger address is taken.
    /// - Validation errors for malformed issuer data, country, unit cost
    ///   or decimals.
    pub fn register_scheme(
        &self,
        config: &ConfigHandle,
        promoter: &Signer,
        params: RegisterSchemeParams,
    ) -> EngineResult<SchemeRef> {
        validation::issuer(&params.issuer)?;
        validation::country(&params.country)?;
        validation::unit_economics(params.unit_cost, params.decimals)?;
        debug!(promoter = %promoter.address(), "scheme parameters valid");

        let (address, bump) = self.derive(&[SCHEME_SEED, promoter.address().as_ref()])?;
        let pair = VaultCustodyPair::derive(&params.deposit_ledger, self.program_id())?;

        let accounts = AccountSet::new()
            .readonly(config.address())
            .readonly(params.payment_mint)
            .writable(address)
            .writable(params.deposit_ledger)
            .writable(pair.vault);

        let scheme = self.ledger().execute(&accounts, |ctx| {
            match ctx.try_load::<ConfigurationRegistry>(&config.address())? {
                Some(registry) if registry.initialized => {}
                _ => return Err(EngineError::NotInitialized),
            }
            if ctx.exists(&address)? {
                return Err(EngineError::DuplicateScheme(address));
            }
            if ctx.exists(&params.deposit_ledger)? || ctx.exists(&pair.vault)? {
                return Err(EngineError::DuplicateScheme(params.deposit_ledger));
            }
            ctx.load::<Mint>(&params.payment_mint)?;

            let scheme = Scheme {
                owner: promoter.address(),
                issuer_name: params.issuer.issuer_name.clone(),
                scheme_name: params.issuer.scheme_name.clone(),
                kind: params.issuer.kind,
                listing_date: params.issuer.listing_date.clone(),
                country: params.country.clone(),
                unit_cost: params.unit_cost,
                unit_decimals: params.decimals,
                mint: None,
                payment_mint: params.payment_mint,
                deposit_ledger: params.deposit_ledger,
                vault_authority: pair.authority,
                vault: pair.vault,
                units_outstanding: 0,
                active: true,
                investors: Vec::new(),
                bump,
                authority_bump: pair.authority_bump,
                vault_bump: pair.vault_bump,
            };
            ctx.create(&address, &scheme)?;
            ctx.create(
                &params.deposit_ledger,
                &DepositLedger {
                    owner_authority: pair.authority,
                    scheme: address,
                    net_deposited: 0,
                    bump: pair.authority_bump,
                },
            )?;
            token::open_account(ctx, &pair.vault, &params.payment_mint, &pair.authority)?;
            Ok(scheme)
        })?;

        info!(
            scheme = %address,
            promoter = %promoter.address(),
            vault = %scheme.vault,
            kind = %scheme.kind,
            "scheme registered"
        );
        Ok(SchemeRef { address, scheme })
    }

    /// Create the unit mint of `scheme`, issued by its vault authority.
    ///
    /// Only the scheme's promoter may call this, and only once. With
    /// `initial`, that many units are issued to the owner's holding account.
    pub fn create_mint(
        &self,
        promoter: &Signer,
        scheme_address: &Address,
        initial: Option<InitialIssue>,
    ) -> EngineResult<Address> {
        let current = self
            .scheme(scheme_address)?
            .ok_or(EngineError::AccountNotFound(*scheme_address))?;
        if current.owner != promoter.address() {
            warn!(scheme = %scheme_address, caller = %promoter.address(), "create_mint refused");
            return Err(EngineError::Unauthorized);
        }
        if current.mint.is_some() {
            return Err(EngineError::SchemeAlreadyHasMint(*scheme_address));
        }

        let pair = VaultCustodyPair::verify(
            &current.deposit_ledger,
            &current.vault_authority,
            &current.vault,
            self.program_id(),
        )?;
        let mint_address = self.unit_mint_address(scheme_address)?;
        let holding = match &initial {
            Some(issue) => Some(self.holding_address(&issue.owner, &mint_address)?),
            None => None,
        };

        let mut accounts = AccountSet::new()
            .writable(*scheme_address)
            .writable(mint_address);
        if let Some(holding) = holding {
            accounts = accounts.writable(holding);
        }

        self.ledger().execute(&accounts, |ctx| {
            let mut scheme: Scheme = ctx.load(scheme_address)?;
            if scheme.owner != promoter.address() {
                return Err(EngineError::Unauthorized);
            }
            if scheme.mint.is_some() || ctx.exists(&mint_address)? {
                return Err(EngineError::SchemeAlreadyHasMint(*scheme_address));
            }
            if scheme.deposit_ledger != pair.deposit_ledger {
                return Err(EngineError::AccountMismatch(*scheme_address));
            }

            token::initialize_mint(ctx, &mint_address, Some(pair.authority), scheme.unit_decimals)?;
            if let (Some(issue), Some(holding)) = (initial, holding) {
                token::open_account(ctx, &holding, &mint_address, &issue.owner)?;
                if issue.amount > 0 {
                    token::mint_to(
                        ctx,
                        &mint_address,
                        &holding,
                        issue.amount,
                        &pair.signer_proof(),
                        self.program_id(),
                    )?;
                }
            }
            scheme.mint = Some(mint_address);
            ctx.store(scheme_address, &scheme)?;
            Ok(())
        })?;

        info!(
            scheme = %scheme_address,
            mint = %mint_address,
            initial = initial.map_or(0, |issue| issue.amount),
            "unit mint created"
        );
        Ok(mint_address)
    }

    /// Suspend (`active = false`) or resume trading in the promoter's
    /// scheme. Registration and the roster are untouched.
    pub fn set_scheme_active(
        &self,
        promoter: &Signer,
        scheme_address: &Address,
        active: bool,
    ) -> EngineResult<()> {
        let accounts = AccountSet::new().writable(*scheme_address);
        self.ledger().execute(&accounts, |ctx| {
            let mut scheme: Scheme = ctx.load(scheme_address)?;
            if scheme.owner != promoter.address() {
                return Err(EngineError::Unauthorized);
            }
            scheme.active = active;
            ctx.store(scheme_address, &scheme)?;
            Ok(())
        })?;

        info!(scheme = %scheme_address, active, "scheme status changed");
        Ok(())
    }
}
