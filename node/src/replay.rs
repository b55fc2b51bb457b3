//! # Replay Guard
//!
//! Every signed envelope names a `nonce` and an `expires_at` (unix seconds),
//! both covered by the signature. The node accepts an envelope only while it
//! is unexpired and no further out than the configured window, and accepts
//! each `(signer, nonce)` pair once. Pairs are remembered until their
//! envelope expires; after that the expiry check alone rejects them.
//!
//! Nonces are not sequential. Clients pick any value they have not used
//! within the window.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

use reit_protocol::crypto::Address;

/// Why an envelope was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("envelope expired at {expires_at}, now {now}")]
    Expired { expires_at: i64, now: i64 },

    #[error("envelope expiry {expires_at} is more than {ttl}s ahead of {now}")]
    TooFarAhead { expires_at: i64, now: i64, ttl: i64 },

    #[error("nonce {nonce} from {signer} was already used")]
    Replayed { signer: Address, nonce: u64 },
}

/// Remembers accepted `(signer, nonce)` pairs until their envelopes expire.
pub struct ReplayGuard {
    ttl: i64,
    inner: Mutex<Seen>,
}

struct Seen {
    entries: HashMap<(Address, u64), i64>,
    /// Earliest expiry among `entries`; nothing to prune before it.
    next_expiry: i64,
}

impl ReplayGuard {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            inner: Mutex::new(Seen {
                entries: HashMap::new(),
                next_expiry: i64::MAX,
            }),
        }
    }

    /// Check `expires_at` against the acceptance window at `now`.
    pub fn check_window(&self, expires_at: i64, now: i64) -> Result<(), ReplayError> {
        if expires_at <= now {
            return Err(ReplayError::Expired { expires_at, now });
        }
        if expires_at - now > self.ttl {
            return Err(ReplayError::TooFarAhead {
                expires_at,
                now,
                ttl: self.ttl,
            });
        }
        Ok(())
    }

    /// Record a verified envelope, failing if its pair was seen before.
    pub fn admit(
        &self,
        signer: Address,
        nonce: u64,
        expires_at: i64,
        now: i64,
    ) -> Result<(), ReplayError> {
        self.check_window(expires_at, now)?;

        let mut seen = self.inner.lock();
        if now >= seen.next_expiry {
            seen.entries.retain(|_, expiry| *expiry > now);
            seen.next_expiry = seen.entries.values().copied().min().unwrap_or(i64::MAX);
        }
        if seen.entries.contains_key(&(signer, nonce)) {
            return Err(ReplayError::Replayed { signer, nonce });
        }
        seen.entries.insert((signer, nonce), expires_at);
        seen.next_expiry = seen.next_expiry.min(expires_at);
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
