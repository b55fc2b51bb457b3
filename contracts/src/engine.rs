//! # Engine
//!
//! The entry point to every custody operation. An [`Engine`] owns the
//! ledger and the settings; the operations themselves live in sibling
//! modules as further `impl Engine` blocks:
//!
//! ```text
//! configuration.rs: initialize, load_config
//! schemes.rs: register_scheme, create_mint
//! investors.rs: register_investor
//! units.rs: move_units, payment-token helpers
//! trading.rs: buy, sell
//! ```
//!
//! Every operation follows the same shape: resolve the addresses it
//! touches, declare them, then re-read and verify everything inside
//! [`Ledger::execute`] before staging writes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use reit_protocol::config::{INVESTOR_SEED, POSITION_SEED, SCHEME_SEED, UNIT_MINT_SEED};
use reit_protocol::crypto::{derive_address, program_id, Address};
use reit_protocol::runtime::Ledger;
use reit_protocol::storage::ReitDb;
use reit_protocol::vault::{holding_address, Mint, TokenAccount};

use crate::error::{EngineError, EngineResult};
use crate::pricing::PricingPolicy;
use crate::records::{ConfigurationRegistry, DepositLedger, Investor, InvestorPosition, Scheme};

/// Knobs fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Scopes every derived address.
    pub program_id: Address,
    /// If set, only this identity may initialize the configuration registry.
    pub admin: Option<Address>,
    pub pricing: PricingPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program_id: program_id(),
            admin: None,
            pricing: PricingPolicy::default(),
        }
    }
}

/// The custody and unit-accounting engine.
///
/// `Engine` is `Send + Sync`; share it behind an `Arc` and call operations
/// from any number of threads.
#[derive(Debug)]
pub struct Engine {
    ledger: Ledger,
    settings: EngineSettings,
}

impl Engine {
    /// An engine over `ledger`.
    pub fn new(ledger: Ledger, settings: EngineSettings) -> Self {
        Self { ledger, settings }
    }

    /// An engine whose state lives only in memory.
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self::new(Ledger::in_memory(), settings)
    }

    /// An engine persisted in a sled database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, settings: EngineSettings) -> EngineResult<Self> {
        let db = ReitDb::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), accounts = db.account_count(), "opened ledger");
        Ok(Self::new(Ledger::persistent(db), settings))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn program_id(&self) -> &Address {
        &self.settings.program_id
    }

    // -- Address derivation -------------------------------------------------

    pub(crate) fn derive(&self, seeds: &[&[u8]]) -> EngineResult<(Address, u8)> {
        Ok(derive_address(seeds, &self.settings.program_id)?)
    }

    /// Address of the scheme owned by `promoter`.
    pub fn scheme_address(&self, promoter: &Address) -> EngineResult<Address> {
        Ok(self.derive(&[SCHEME_SEED, promoter.as_ref()])?.0)
    }

    /// Address of the investor record owned by `owner`.
    pub fn investor_address(&self, owner: &Address) -> EngineResult<Address> {
        Ok(self.derive(&[INVESTOR_SEED, owner.as_ref()])?.0)
    }

    /// Address the unit mint of `scheme` is created at.
    pub fn unit_mint_address(&self, scheme: &Address) -> EngineResult<Address> {
        Ok(self.derive(&[UNIT_MINT_SEED, scheme.as_ref()])?.0)
    }

    /// Address of `owner`'s position in `scheme`.
    pub fn position_address(&self, scheme: &Address, owner: &Address) -> EngineResult<Address> {
        Ok(self.derive(&[POSITION_SEED, scheme.as_ref(), owner.as_ref()])?.0)
    }

    /// Address of `owner`'s holding account for `mint`.
    pub fn holding_address(&self, owner: &Address, mint: &Address) -> EngineResult<Address> {
        Ok(holding_address(owner, mint, &self.settings.program_id)?.0)
    }

    // -- Queries ------------------------------------------------------------

    pub fn config(&self) -> EngineResult<Option<ConfigurationRegistry>> {
        let (address, _) = self.config_address()?;
        Ok(self.ledger.read(&address)?)
    }

    pub fn scheme(&self, address: &Address) -> EngineResult<Option<Scheme>> {
        Ok(self.ledger.read(address)?)
    }

    /// The scheme registered by `promoter`, if any.
    pub fn scheme_of(&self, promoter: &Address) -> EngineResult<Option<Scheme>> {
        let address = self.scheme_address(promoter)?;
        self.scheme(&address)
    }

    pub fn investor(&self, address: &Address) -> EngineResult<Option<Investor>> {
        Ok(self.ledger.read(address)?)
    }

    /// The investor record of `owner`, if registered.
    pub fn investor_of(&self, owner: &Address) -> EngineResult<Option<Investor>> {
        let address = self.investor_address(owner)?;
        self.investor(&address)
    }

    /// `owner`'s position in `scheme`, if they ever bought into it.
    pub fn position(
        &self,
        scheme: &Address,
        owner: &Address,
    ) -> EngineResult<Option<InvestorPosition>> {
        let address = self.position_address(scheme, owner)?;
        Ok(self.ledger.read(&address)?)
    }

    /// Every position in `scheme`, in roster order.
    pub fn scheme_positions(&self, scheme: &Address) -> EngineResult<Vec<InvestorPosition>> {
        let record = self
            .scheme(scheme)?
            .ok_or(EngineError::AccountNotFound(*scheme))?;
        let mut positions = Vec::with_capacity(record.investors.len());
        for investor_address in &record.investors {
            let investor = self
                .investor(investor_address)?
                .ok_or(EngineError::AccountNotFound(*investor_address))?;
            let position = self
                .position(scheme, &investor.owner)?
                .ok_or(EngineError::AccountNotFound(*investor_address))?;
            positions.push(position);
        }
        Ok(positions)
    }

    pub fn deposit_ledger(&self, address: &Address) -> EngineResult<Option<DepositLedger>> {
        Ok(self.ledger.read(address)?)
    }

    pub fn mint(&self, address: &Address) -> EngineResult<Option<Mint>> {
        Ok(self.ledger.read(address)?)
    }

    pub fn token_account(&self, address: &Address) -> EngineResult<Option<TokenAccount>> {
        Ok(self.ledger.read(address)?)
    }

    /// Balance of a token account, zero if it does not exist.
    pub fn balance(&self, address: &Address) -> EngineResult<u64> {
        Ok(self.token_account(address)?.map_or(0, |account| account.amount))
    }
}
