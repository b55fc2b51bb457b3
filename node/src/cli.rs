//! # CLI Interface
//!
//! Command-line structure for `reit-node`, built with `clap` derive. Four
//! subcommands: `serve`, `keygen`, `derive` and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use reit_contracts::PricingPolicy;
use reit_protocol::config::{DEFAULT_API_PORT, DEFAULT_ENVELOPE_TTL_SECS, DEFAULT_METRICS_PORT};

/// REIT custody node.
///
/// Hosts the custody engine: scheme and investor registries, unit mints and
/// buy/sell against derived-authority vaults. Serves a signed JSON API and
/// exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "reit-node",
    about = "REIT custody and unit-accounting node",
    version,
    propagate_version = true
)]
pub struct ReitNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open (or create) the ledger and serve the API.
    Serve(ServeArgs),
    /// Generate an Ed25519 keypair for an admin, promoter or investor.
    Keygen(KeygenArgs),
    /// Print a derived address without touching any ledger.
    Derive(DeriveArgs),
    /// Print version information and exit.
    Version,
}

/// Buy rounding rule, as accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingArg {
    /// Credit `floor(payment / unit_cost)` units.
    Floor,
    /// Reject payments that are not a multiple of the unit cost.
    Exact,
}

impl From<PricingArg> for PricingPolicy {
    fn from(arg: PricingArg) -> Self {
        match arg {
            PricingArg::Floor => PricingPolicy::Floor,
            PricingArg::Exact => PricingPolicy::ExactOnly,
        }
    }
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Directory holding the sled database. Created on first run.
    #[arg(long, short = 'd', env = "REIT_DATA_DIR", default_value = "./reit-data")]
    pub data_dir: PathBuf,

    /// Keep all state in memory. Nothing is written to `data_dir`.
    #[arg(long, env = "REIT_EPHEMERAL")]
    pub ephemeral: bool,

    /// Port for the JSON API.
    #[arg(long, env = "REIT_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "REIT_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Base58 address that alone may initialize the configuration registry.
    #[arg(long, env = "REIT_ADMIN")]
    pub admin: Option<String>,

    /// Longest lifetime, in seconds, a signed envelope may claim.
    #[arg(long, env = "REIT_ENVELOPE_TTL", default_value_t = DEFAULT_ENVELOPE_TTL_SECS)]
    pub envelope_ttl: u64,

    /// Rounding rule applied to buy payments.
    #[arg(long, env = "REIT_PRICING", value_enum, default_value_t = PricingArg::Floor)]
    pub pricing: PricingArg,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "REIT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Write the hex-encoded secret key here (mode 0600 on Unix).
    /// Without it, only the address is printed and the key is discarded.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Which derived address to compute.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveKind {
    /// The configuration registry (no key needed).
    Config,
    /// A promoter's scheme record.
    Scheme,
    /// An owner's investor record.
    Investor,
    /// Vault authority and vault for a deposit ledger.
    Vault,
    /// The unit mint of a scheme.
    UnitMint,
}

/// Arguments for the `derive` subcommand.
#[derive(Parser, Debug)]
pub struct DeriveArgs {
    /// What to derive.
    #[arg(value_enum)]
    pub kind: DeriveKind,

    /// Base58 input address: promoter, owner, deposit ledger or scheme.
    pub key: Option<String>,
}
