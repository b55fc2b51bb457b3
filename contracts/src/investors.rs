//! Investor registration.
//!
//! One investor record per owner, at `["investor", owner]`. The record
//! carries the investor's status and the total units acquired through
//! buy/sell; per-scheme figures live in positions, and the units
//! themselves sit in per-mint holding accounts.

use serde::{Deserialize, Serialize};
use tracing::info;

use reit_protocol::config::INVESTOR_SEED;
use reit_protocol::crypto::{Address, Signer};
use reit_protocol::runtime::AccountSet;

use crate::configuration::ConfigHandle;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::records::{ConfigurationRegistry, Investor, InvestorRef};
use crate::validation;

/// Parameters for [`Engine::register_investor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInvestorParams {
    pub full_names: String,
    pub country: String,
}

impl Engine {
    /// Register the caller as an investor.
    ///
    /// Fails with [`EngineError::DuplicateInvestor`] if the caller already
    /// has a record.
    pub fn register_investor(
        &self,
        owner: &Signer,
        params: RegisterInvestorParams,
    ) -> EngineResult<InvestorRef> {
        validation::full_names(&params.full_names)?;
        validation::country(&params.country)?;

        let (address, bump) = self.derive(&[INVESTOR_SEED, owner.address().as_ref()])?;
        let accounts = AccountSet::new().writable(address);

        let investor = self.ledger().execute(&accounts, |ctx| {
            if ctx.exists(&address)? {
                return Err(EngineError::DuplicateInvestor(address));
            }
            let investor = Investor {
                owner: owner.address(),
                full_names: params.full_names,
                country: params.country,
                units_held: 0,
                active: true,
                bump,
            };
            ctx.create(&address, &investor)?;
            Ok(investor)
        })?;

        info!(investor = %address, owner = %investor.owner, "investor registered");
        Ok(InvestorRef { address, investor })
    }

    /// Suspend or reinstate `owner` as an investor. Only the administrator
    /// who initialized the configuration registry may do this.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] if `admin` is not the registry owner.
    /// - [`EngineError::AccountNotFound`] if `owner` never registered.
    pub fn set_investor_active(
        &self,
        config: &ConfigHandle,
        admin: &Signer,
        owner: &Address,
        active: bool,
    ) -> EngineResult<()> {
        let address = self.investor_address(owner)?;
        let accounts = AccountSet::new()
            .readonly(config.address())
            .writable(address);

        self.ledger().execute(&accounts, |ctx| {
            let registry: ConfigurationRegistry = ctx.load(&config.address())?;
            if registry.owner != admin.address() {
                return Err(EngineError::Unauthorized);
            }
            let mut investor: Investor = ctx.load(&address)?;
            investor.active = active;
            ctx.store(&address, &investor)?;
            Ok(())
        })?;

        info!(investor = %address, active, "investor status changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use reit_protocol::crypto::Keypair;

    fn params() -> RegisterInvestorParams {
        RegisterInvestorParams {
            full_names: "Amina Wanjiru Otieno".into(),
            country: "KEN".into(),
        }
    }

    #[test]
    fn registers_at_derived_address() {
        let engine = Engine::in_memory(EngineSettings::default());
        let kp = Keypair::generate();
        let registered = engine
            .register_investor(&Signer::from_keypair(&kp), params())
            .unwrap();

        assert_eq!(registered.address, engine.investor_address(&kp.address()).unwrap());
        assert_eq!(registered.investor.units_held, 0);
        assert!(registered.investor.active);
        assert_eq!(engine.investor_of(&kp.address()).unwrap().unwrap(), registered.investor);
    }

    #[test]
    fn second_registration_is_duplicate() {
        let engine = Engine::in_memory(EngineSettings::default());
        let signer = Signer::from_keypair(&Keypair::generate());
        engine.register_investor(&signer, params()).unwrap();
        assert!(matches!(
            engine.register_investor(&signer, params()),
            Err(EngineError::DuplicateInvestor(_))
        ));
    }

    #[test]
    fn invalid_fields_store_nothing() {
        let engine = Engine::in_memory(EngineSettings::default());
        let kp = Keypair::generate();
        let bad = RegisterInvestorParams {
            full_names: String::new(),
            country: "KE".into(),
        };
        assert!(matches!(
            engine.register_investor(&Signer::from_keypair(&kp), bad),
            Err(EngineError::InvalidFullNamesLength(0))
        ));
        assert!(engine.investor_of(&kp.address()).unwrap().is_none());
    }
}
