// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REIT Custody Node
//!
//! Entry point for the `reit-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the ledger and serves the JSON API.
//!
//! Subcommands:
//!
//! - `serve`   start the node
//! - `keygen`  generate an Ed25519 keypair
//! - `derive`  print a derived address offline
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod replay;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use reit_contracts::{Engine, EngineSettings};
use reit_protocol::crypto::{program_id, Address, Keypair};
use reit_protocol::vault::VaultCustodyPair;

use cli::{Commands, DeriveKind, ReitNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use replay::ReplayGuard;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ReitNodeCli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Derive(args) => derive(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the ledger and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    logging::init_logging(
        "reit_node=info,reit_contracts=info,reit_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let admin = args
        .admin
        .as_deref()
        .map(Address::from_base58)
        .transpose()
        .context("--admin is not a valid base58 address")?;
    let settings = EngineSettings {
        admin,
        pricing: args.pricing.into(),
        ..EngineSettings::default()
    };

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        pricing = ?settings.pricing,
        admin_pinned = settings.admin.is_some(),
        envelope_ttl = args.envelope_ttl,
        "starting reit-node"
    );

    // --- Ledger ---
    let engine = if args.ephemeral {
        tracing::warn!("running with an in-memory ledger; state is lost on exit");
        Engine::in_memory(settings)
    } else {
        let db_path = args.data_dir.join("ledger");
        std::fs::create_dir_all(&db_path).with_context(|| {
            format!("failed to create ledger directory: {}", db_path.display())
        })?;
        Engine::open(&db_path, settings)
            .with_context(|| format!("failed to open ledger at {}", db_path.display()))?
    };
    let engine = Arc::new(engine);

    match engine.config()? {
        Some(registry) => tracing::info!(owner = %registry.owner, "configuration registry loaded"),
        None => tracing::info!("configuration registry not yet initialized"),
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            reit_protocol::config::PROTOCOL_VERSION,
        ),
        engine: Arc::clone(&engine),
        metrics: Arc::clone(&node_metrics),
        replay: Arc::new(ReplayGuard::new(args.envelope_ttl)),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = metrics::router(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Err(e) = engine.ledger().flush() {
        tracing::error!("final ledger flush failed: {}", e);
    }
    tracing::info!("reit-node stopped");
    Ok(())
}

/// Generates a keypair, prints its address and optionally saves the secret.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = Keypair::generate();

    if let Some(path) = &args.out {
        if path.exists() {
            bail!("refusing to overwrite existing key file {}", path.display());
        }
        std::fs::write(path, keypair.secret_key_hex())
            .with_context(|| format!("failed to write key to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        println!("Secret key : {}", path.display());
    }

    println!("Address    : {}", keypair.address());
    Ok(())
}

/// Prints derived addresses for the default program id.
fn derive(args: cli::DeriveArgs) -> Result<()> {
    let engine = Engine::in_memory(EngineSettings::default());
    let key = || -> Result<Address> {
        let raw = args
            .key
            .as_deref()
            .context("this derivation needs an input address")?;
        Address::from_base58(raw).context("input is not a valid base58 address")
    };

    match args.kind {
        DeriveKind::Config => {
            let (address, bump) = engine.config_address()?;
            println!("config     : {address} (bump {bump})");
        }
        DeriveKind::Scheme => {
            println!("scheme     : {}", engine.scheme_address(&key()?)?);
        }
        DeriveKind::Investor => {
            println!("investor   : {}", engine.investor_address(&key()?)?);
        }
        DeriveKind::UnitMint => {
            println!("unit mint  : {}", engine.unit_mint_address(&key()?)?);
        }
        DeriveKind::Vault => {
            let pair = VaultCustodyPair::derive(&key()?, &program_id())?;
            println!("authority  : {} (bump {})", pair.authority, pair.authority_bump);
            println!("vault      : {} (bump {})", pair.vault, pair.vault_bump);
        }
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("reit-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", reit_protocol::config::PROTOCOL_VERSION);
    println!("program   {}", reit_protocol::config::PROGRAM_ID_BASE58);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
