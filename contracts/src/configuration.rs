//! # Configuration Registry
//!
//! A one-time initialization step that gates scheme registration.
//!
//! There is no ambient global: [`Engine::initialize`] and
//! [`Engine::load_config`] hand back a [`ConfigHandle`], and operations that
//! need the registry take it as an explicit argument. The handle can only
//! be minted by the engine after it has seen an initialized registry.

use serde::Serialize;
use tracing::{info, warn};

use reit_protocol::config::CONFIGS_SEED;
use reit_protocol::crypto::{Address, Signer};
use reit_protocol::runtime::AccountSet;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::records::ConfigurationRegistry;

/// Proof that the configuration registry is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigHandle {
    address: Address,
    owner: Address,
    bump: u8,
}

impl ConfigHandle {
    /// Where the registry lives.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The administrator who initialized it.
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }
}

impl Engine {
    /// Address and bump of the configuration registry.
    pub fn config_address(&self) -> EngineResult<(Address, u8)> {
        self.derive(&[CONFIGS_SEED])
    }

    /// Create the configuration registry with `admin` as its owner.
    ///
    /// # Errors
    ///
    /// - [`EngineError::AlreadyInitialized`] if the registry exists.
    /// - [`EngineError::Unauthorized`] if the engine pins a different admin.
    pub fn initialize(&self, admin: &Signer) -> EngineResult<ConfigHandle> {
        if let Some(pinned) = self.settings().admin {
            if pinned != admin.address() {
                warn!(caller = %admin.address(), "initialize refused: not the pinned admin");
                return Err(EngineError::Unauthorized);
            }
        }

        let (address, bump) = self.config_address()?;
        let accounts = AccountSet::new().writable(address);
        let registry = self.ledger().execute(&accounts, |ctx| {
            if ctx.exists(&address)? {
                return Err(EngineError::AlreadyInitialized);
            }
            let registry = ConfigurationRegistry {
                owner: admin.address(),
                initialized: true,
                bump,
            };
            ctx.create(&address, &registry)?;
            Ok(registry)
        })?;

        info!(config = %address, owner = %registry.owner, "configuration registry initialized");
        Ok(ConfigHandle {
            address,
            owner: registry.owner,
            bump,
        })
    }

    /// Load the handle for an already-initialized registry.
    pub fn load_config(&self) -> EngineResult<ConfigHandle> {
        let (address, bump) = self.config_address()?;
        match self.ledger().read::<ConfigurationRegistry>(&address)? {
            Some(registry) if registry.initialized => Ok(ConfigHandle {
                address,
                owner: registry.owner,
                bump,
            }),
            _ => Err(EngineError::NotInitialized),
        }
    }
}
