//! # Cryptographic Primitives
//!
//! Everything identity- and address-related flows through here:
//!
//! - **Ed25519** keypairs and signatures for human-held identities.
//! - **SHA-256** for address derivation, because external clients use it.
//! - **Derived addresses** with no private key, for accounts the engine
//!   itself controls (configuration, schemes, vault authorities).
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations. We don't roll our own.

pub mod derivation;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use derivation::{
    create_derived_address, derive_address, program_id, DerivationError, DerivedAuthority,
    SignerProof,
};
pub use hash::{hashv, sha256, sha256_array};
pub use keys::{Address, KeyError, Keypair, Signature};
pub use signatures::{sign, verify, verify_raw, SignatureError, Signer};
