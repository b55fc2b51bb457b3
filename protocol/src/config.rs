//! # Protocol Configuration & Constants
//!
//! Every magic number in the custody engine lives here: the program id that
//! scopes address derivation, the seed tags for each record type, and the
//! field limits enforced at registration. If you're hardcoding a seed tag
//! somewhere else, you're doing it wrong.
//!
//! Seed tags and the program id are part of the external contract. Clients
//! pre-compute addresses from them before submitting operations, so changing
//! any of these orphans every record already on disk.

// ---------------------------------------------------------------------------
// Program Identity
// ---------------------------------------------------------------------------

/// Base58 form of the program id that scopes every derived address.
pub const PROGRAM_ID_BASE58: &str = "7xckh4Xhzk9DDB4BjQK7PUdJbVGLoA5RFpSdcxAMvhRW";

/// Raw bytes of [`PROGRAM_ID_BASE58`].
pub const PROGRAM_ID_BYTES: [u8; 32] = [
    103, 101, 126, 15, 209, 137, 195, 91, 151, 87, 67, 39, 101, 38, 96, 76, 176, 125, 151, 22,
    93, 166, 188, 22, 53, 12, 43, 44, 21, 77, 230, 149,
];

/// Protocol version string reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Derivation Parameters
// ---------------------------------------------------------------------------

/// Domain marker appended to every derivation preimage.
pub const DERIVATION_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Upper bound on bump attempts. One per possible `u8` value.
pub const MAX_BUMP_ATTEMPTS: usize = 256;

// ---------------------------------------------------------------------------
// Seed Tags
// ---------------------------------------------------------------------------

/// Singleton configuration registry.
pub const CONFIGS_SEED: &[u8] = b"investment-trusts-configs";

/// One scheme per promoter: `[SCHEME_SEED, promoter]`.
pub const SCHEME_SEED: &[u8] = b"investment-trust-scheme";

/// One investor per owner: `[INVESTOR_SEED, owner]`.
pub const INVESTOR_SEED: &[u8] = b"investor";

/// Vault authority: `[VAULT_AUTHORITY_SEED, deposit_ledger]`.
pub const VAULT_AUTHORITY_SEED: &[u8] = b"auth";

/// Vault: `[VAULT_SEED, vault_authority]`.
pub const VAULT_SEED: &[u8] = b"treasury-vault";

/// Unit mint of a scheme: `[UNIT_MINT_SEED, scheme]`.
pub const UNIT_MINT_SEED: &[u8] = b"unit-mint";

/// Holding account of an owner for a mint: `[HOLDING_SEED, owner, mint]`.
pub const HOLDING_SEED: &[u8] = b"holding";

/// An investor's position in one scheme: `[POSITION_SEED, scheme, owner]`.
pub const POSITION_SEED: &[u8] = b"position";

// ---------------------------------------------------------------------------
// Field Limits
// ---------------------------------------------------------------------------

/// Maximum issuer name length in bytes.
pub const MAX_ISSUER_LEN: usize = 30;

/// Maximum scheme name length in bytes.
pub const MAX_SCHEME_NAME_LEN: usize = 30;

/// Maximum listing date length in bytes ("February 2021" and friends).
pub const MAX_LISTING_DATE_LEN: usize = 20;

/// Maximum investor full-names length in bytes.
pub const MAX_FULL_NAMES_LEN: usize = 50;

/// Country codes are ISO 3166 alpha-2 or alpha-3.
pub const COUNTRY_CODE_LENGTHS: [usize; 2] = [2, 3];

/// Largest decimal precision a mint may declare. `10^19` no longer fits a `u64`.
pub const MAX_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8899;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 8900;

/// Furthest into the future a signed envelope may set its expiry, in seconds.
pub const DEFAULT_ENVELOPE_TTL_SECS: u64 = 300;
