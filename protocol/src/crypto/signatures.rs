//! # Digital Signatures & Authenticated Callers
//!
//! Ed25519 signing and verification, plus [`Signer`]: the proof that an
//! operation's caller controls an identity.
//!
//! A `Signer` can only be built from a [`Keypair`] (possession of the
//! private key) or by verifying a signature over a request payload. Engine
//! operations take `&Signer` rather than a bare [`Address`], so "who is
//! calling" is never a caller-supplied string.

use thiserror::Error;

use super::keys::{Address, Keypair, Signature};

/// Errors during signature operations.
///
/// Intentionally vague: we don't tell attackers why verification failed.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message with a keypair.
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify an Ed25519 signature against an address and message.
pub fn verify(address: &Address, message: &[u8], signature: &Signature) -> bool {
    address.verify(message, signature)
}

/// Verify a signature from raw wire components.
///
/// The "I got these bytes off the wire" variant: parses the public key and
/// signature, then verifies.
pub fn verify_raw(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SignatureError> {
    let address =
        Address::try_from_slice(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
    address
        .to_verifying_key()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig_arr: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;
    if address.verify(message, &Signature::from_bytes(sig_arr)) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// An authenticated caller identity.
///
/// The field is private and there is no `From<Address>`: the only ways in
/// are [`Signer::from_keypair`] and [`Signer::verified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    address: Address,
}

impl Signer {
    /// Authenticate by holding the keypair.
    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            address: keypair.address(),
        }
    }

    /// Authenticate a remote caller by checking `signature` over `message`.
    pub fn verified(
        address: Address,
        message: &[u8],
        signature: &Signature,
    ) -> Result<Self, SignatureError> {
        address
            .to_verifying_key()
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        if address.verify(message, signature) {
            Ok(Self { address })
        } else {
            Err(SignatureError::VerificationFailed)
        }
    }

    /// The authenticated identity.
    pub fn address(&self) -> Address {
        self.address
    }
}

impl From<&Keypair> for Signer {
    fn from(keypair: &Keypair) -> Self {
        Self::from_keypair(keypair)
    }
}
