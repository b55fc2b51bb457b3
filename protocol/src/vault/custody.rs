//! # Vault Custody Pair
//!
//! Every scheme holds investor payments in a vault that no human can sign
//! for. The pair is:
//!
//! ```text
//! authority = derive(["auth", deposit_ledger])      signs, never holds
//! vault     = derive(["treasury-vault", authority])  holds, never signs
//! ```
//!
//! The authority has no private key. Moving funds out of the vault requires
//! the authority's seeds, which only the engine reconstructs, and only after
//! re-deriving the pair from the scheme's deposit ledger and checking it
//! against what the scheme recorded at registration.

use thiserror::Error;

use crate::config::{VAULT_AUTHORITY_SEED, VAULT_SEED};
use crate::crypto::{derive_address, Address, DerivationError, DerivedAuthority, SignerProof};

/// Errors from custody verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    /// The stored pair does not re-derive from the deposit ledger.
    #[error("custody pair mismatch: expected authority {expected_authority}, vault {expected_vault}")]
    Mismatch {
        expected_authority: Address,
        expected_vault: Address,
    },
}

/// The derived (authority, vault) pair of one deposit ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultCustodyPair {
    pub deposit_ledger: Address,
    pub authority: Address,
    pub authority_bump: u8,
    pub vault: Address,
    pub vault_bump: u8,
}

impl VaultCustodyPair {
    /// Derive the pair for `deposit_ledger`.
    pub fn derive(deposit_ledger: &Address, program_id: &Address) -> Result<Self, CustodyError> {
        let (authority, authority_bump) =
            derive_address(&[VAULT_AUTHORITY_SEED, deposit_ledger.as_ref()], program_id)?;
        let (vault, vault_bump) = derive_address(&[VAULT_SEED, authority.as_ref()], program_id)?;
        Ok(Self {
            deposit_ledger: *deposit_ledger,
            authority,
            authority_bump,
            vault,
            vault_bump,
        })
    }

    /// Re-derive from `deposit_ledger` and require the result to match the
    /// stored `authority` and `vault`.
    pub fn verify(
        deposit_ledger: &Address,
        authority: &Address,
        vault: &Address,
        program_id: &Address,
    ) -> Result<Self, CustodyError> {
        let pair = Self::derive(deposit_ledger, program_id)?;
        if pair.authority != *authority || pair.vault != *vault {
            tracing::warn!(
                %deposit_ledger,
                stored_authority = %authority,
                stored_vault = %vault,
                "custody pair does not re-derive"
            );
            return Err(CustodyError::Mismatch {
                expected_authority: pair.authority,
                expected_vault: pair.vault,
            });
        }
        Ok(pair)
    }

    /// The authority's signing capability: its seeds and bump.
    pub fn authority_capability(&self) -> DerivedAuthority {
        DerivedAuthority::new(
            vec![VAULT_AUTHORITY_SEED.to_vec(), self.deposit_ledger.to_bytes().to_vec()],
            self.authority_bump,
        )
    }

    /// A signer proof for debiting the vault.
    pub fn signer_proof(&self) -> SignerProof {
        SignerProof::Derived(self.authority_capability())
    }
}
