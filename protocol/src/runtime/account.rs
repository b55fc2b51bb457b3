//! # Typed Account Payloads
//!
//! Every account in the ledger is an opaque byte payload:
//!
//! ```text
//! [ discriminator: 8 bytes | bincode(record) ]
//! ```
//!
//! The discriminator is `SHA-256("account:<Name>")[..8]`. It stops one
//! record type from being decoded as another when a caller passes the wrong
//! address, which is the classic type-confusion attack on account-model
//! ledgers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::RuntimeError;
use crate::crypto::{sha256_array, Address};

/// Length of the type tag at the front of every account.
pub const DISCRIMINATOR_LEN: usize = 8;

/// A record type that can live in the ledger.
pub trait AccountRecord: Serialize + DeserializeOwned {
    /// Stable type name. Feeds the discriminator, so never rename it.
    const NAME: &'static str;

    /// The 8-byte type tag for this record.
    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        let digest = sha256_array(format!("account:{}", Self::NAME).as_bytes());
        let mut tag = [0u8; DISCRIMINATOR_LEN];
        tag.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
        tag
    }
}

/// Raw account bytes as stored by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    data: Vec<u8>,
}

impl Account {
    /// Encode a record with its discriminator.
    pub fn from_record<T: AccountRecord>(record: &T) -> Result<Self, RuntimeError> {
        let body =
            bincode::serialize(record).map_err(|e| RuntimeError::Serialization(e.to_string()))?;
        let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + body.len());
        data.extend_from_slice(&T::discriminator());
        data.extend_from_slice(&body);
        Ok(Self { data })
    }

    /// Wrap bytes loaded from storage.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The stored bytes, discriminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if this account holds a `T`.
    pub fn holds<T: AccountRecord>(&self) -> bool {
        self.data.len() >= DISCRIMINATOR_LEN && self.data[..DISCRIMINATOR_LEN] == T::discriminator()
    }

    /// Decode the payload as `T`, checking the discriminator first.
    pub fn decode<T: AccountRecord>(&self, address: &Address) -> Result<T, RuntimeError> {
        if !self.holds::<T>() {
            return Err(RuntimeError::TypeMismatch {
                address: *address,
                expected: T::NAME,
            });
        }
        bincode::deserialize(&self.data[DISCRIMINATOR_LEN..])
            .map_err(|e| RuntimeError::Serialization(e.to_string()))
    }
}
