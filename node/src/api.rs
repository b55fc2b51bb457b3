//! # JSON API
//!
//! Builds the axum router that exposes the custody engine over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Authentication
//!
//! Every mutating call is a [`SignedRequest`]: the caller's address, an
//! Ed25519 signature in hex, a nonce, an expiry in unix seconds and the JSON
//! payload. The signature covers [`signing_bytes`]: the compact serde_json
//! rendering of `{"expires_at", "nonce", "payload"}` with object keys
//! sorted. A request that fails verification never reaches the engine; one
//! that passes is executed as a [`Signer`] for that address.
//!
//! Each `(signer, nonce)` is accepted once while its envelope is live (see
//! [`crate::replay`]). Expired envelopes get `401 stale_envelope`, repeats
//! get `409 replayed_envelope`.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/status`                     | Node and registry summary          |
//! | GET    | `/config`                     | Configuration registry             |
//! | POST   | `/config/initialize`          | Create the registry (signed)       |
//! | POST   | `/payment-mints`              | Create a payment token (signed)    |
//! | POST   | `/payment-mints/issue`        | Issue payment tokens (signed)      |
//! | POST   | `/token-accounts`             | Open a holding account (signed)    |
//! | POST   | `/schemes`                    | Register a scheme (signed)         |
//! | POST   | `/schemes/mint`               | Create a scheme's unit mint        |
//! | POST   | `/schemes/status`             | Suspend or resume a scheme         |
//! | GET    | `/schemes/:address`           | Scheme by address                  |
//! | GET    | `/schemes/:address/positions` | Every position in a scheme         |
//! | GET    | `/promoters/:promoter/scheme` | Scheme by promoter                 |
//! | POST   | `/investors`                  | Register an investor (signed)      |
//! | POST   | `/investors/status`           | Suspend or resume an investor      |
//! | GET    | `/investors/:owner`           | Investor by owner                  |
//! | POST   | `/trades/buy`                 | Buy units (signed)                 |
//! | POST   | `/trades/sell`                | Sell units (signed)                |
//! | POST   | `/units/transfer`             | Move token balances (signed)       |
//! | GET    | `/accounts/:address`          | Token account                      |
//! | GET    | `/mints/:address`             | Mint                               |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use reit_contracts::{
    BuyReceipt, ConfigHandle, ConfigurationRegistry, Engine, EngineError, EngineResult,
    InitialIssue, InvestorPosition, InvestorRef, PricingPolicy, RegisterInvestorParams,
    RegisterSchemeParams, Scheme, SchemeRef, SellReceipt, UnitAuthority,
};
use reit_protocol::crypto::{Address, Signature, Signer};
use reit_protocol::vault::{Mint, TokenAccount};

use crate::metrics::SharedMetrics;
use crate::replay::{ReplayError, ReplayGuard};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub engine: Arc<Engine>,
    pub metrics: SharedMetrics,
    pub replay: Arc<ReplayGuard>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/config", get(config_handler))
        .route("/config/initialize", post(initialize_handler))
        .route("/payment-mints", post(create_payment_mint_handler))
        .route("/payment-mints/issue", post(issue_payment_handler))
        .route("/token-accounts", post(open_account_handler))
        .route("/schemes", post(register_scheme_handler))
        .route("/schemes/mint", post(create_mint_handler))
        .route("/schemes/status", post(scheme_status_handler))
        .route("/schemes/:address", get(scheme_handler))
        .route("/schemes/:address/positions", get(scheme_positions_handler))
        .route("/promoters/:promoter/scheme", get(promoter_scheme_handler))
        .route("/investors", post(register_investor_handler))
        .route("/investors/status", post(investor_status_handler))
        .route("/investors/:owner", get(investor_handler))
        .route("/trades/buy", post(buy_handler))
        .route("/trades/sell", post(sell_handler))
        .route("/units/transfer", post(transfer_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/mints/:address", get(mint_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Signed Envelope
// ---------------------------------------------------------------------------

/// A request authenticated by an Ed25519 signature over its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Base58 address of the caller; also their public key.
    pub signer: Address,
    /// Hex-encoded signature over [`signing_bytes`].
    pub signature: String,
    /// Single use per signer while the envelope is live.
    pub nonce: u64,
    /// Unix seconds after which the envelope is refused.
    pub expires_at: i64,
    pub payload: serde_json::Value,
}

/// The bytes a client signs for an envelope.
pub fn signing_bytes(
    payload: &serde_json::Value,
    nonce: u64,
    expires_at: i64,
) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&serde_json::json!({
        "expires_at": expires_at,
        "nonce": nonce,
        "payload": payload,
    }))
}

impl SignedRequest {
    /// Check freshness, verify the signature, consume the nonce and decode
    /// the payload.
    fn open<T: DeserializeOwned>(self, state: &AppState) -> Result<(Signer, T), ApiError> {
        let now = chrono::Utc::now().timestamp();
        state.replay.check_window(self.expires_at, now)?;

        let message = signing_bytes(&self.payload, self.nonce, self.expires_at)
            .map_err(|e| ApiError::BadRequest(format!("unencodable payload: {e}")))?;
        let verified = Signature::from_hex(&self.signature)
            .ok()
            .and_then(|sig| Signer::verified(self.signer, &message, &sig).ok());
        let Some(signer) = verified else {
            state.metrics.rejected_signatures_total.inc();
            tracing::warn!(signer = %self.signer, "envelope signature rejected");
            return Err(ApiError::BadSignature);
        };

        if let Err(err) = state
            .replay
            .admit(self.signer, self.nonce, self.expires_at, now)
        {
            if matches!(err, ReplayError::Replayed { .. }) {
                state.metrics.replayed_envelopes_total.inc();
                tracing::warn!(signer = %self.signer, nonce = self.nonce, "envelope replayed");
            }
            return Err(err.into());
        }

        let body = serde_json::from_value(self.payload)
            .map_err(|e| ApiError::BadRequest(format!("invalid payload: {e}")))?;
        Ok((signer, body))
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Payload of `POST /config/initialize`. Carries nothing; the signer is
/// the administrator.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InitializeRequest {}

/// Payload of `POST /payment-mints`. The signer becomes the mint authority.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentMintRequest {
    pub mint: Address,
    pub decimals: u8,
}

/// Payload of `POST /payment-mints/issue`. Signed by the mint authority.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuePaymentRequest {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

/// Payload of `POST /token-accounts`. Opens the signer's account.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub mint: Address,
}

/// Payload of `POST /schemes/mint`. Signed by the scheme's promoter.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMintRequest {
    pub scheme: Address,
    #[serde(default)]
    pub initial: Option<InitialIssue>,
}

/// Payload of `POST /trades/buy`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuyRequest {
    pub scheme: Address,
    pub payment_source: Address,
    pub payment_amount: u64,
}

/// Payload of `POST /trades/sell`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SellRequest {
    pub scheme: Address,
    pub payout_account: Address,
    pub unit_amount: u64,
}

/// Payload of `POST /schemes/status`. Signed by the scheme's promoter.
#[derive(Debug, Serialize, Deserialize)]
pub struct SchemeStatusRequest {
    pub scheme: Address,
    pub active: bool,
}

/// Payload of `POST /investors/status`. Signed by the registry owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvestorStatusRequest {
    pub owner: Address,
    pub active: bool,
}

/// Payload of `POST /units/transfer`.
///
/// With `via_scheme_vault`, the signer must be a promoter and `from` is
/// debited under their scheme's vault authority.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub mint: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    #[serde(default)]
    pub via_scheme_vault: bool,
}

/// Response for endpoints that create or locate a single account.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountCreated {
    pub address: Address,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub program_id: Address,
    pub config_address: Address,
    pub initialized: bool,
    pub pricing: PricingPolicy,
    /// Whether state is backed by disk.
    pub persistent: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response for `POST /units/transfer`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub mint: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `insufficient_units`.
    pub code: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    BadSignature,
    StaleEnvelope(String),
    ReplayedEnvelope(String),
    NotFound(String),
    Engine(EngineError),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<ReplayError> for ApiError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Replayed { .. } => ApiError::ReplayedEnvelope(err.to_string()),
            ReplayError::Expired { .. } | ReplayError::TooFarAhead { .. } => {
                ApiError::StaleEnvelope(err.to_string())
            }
        }
    }
}

/// HTTP status and stable code for an engine error.
fn classify(err: &EngineError) -> (StatusCode, &'static str) {
    use EngineError::*;
    match err {
        NotInitialized => (StatusCode::PRECONDITION_FAILED, "not_initialized"),
        AlreadyInitialized => (StatusCode::CONFLICT, "already_initialized"),
        DuplicateScheme(_) => (StatusCode::CONFLICT, "duplicate_scheme"),
        DuplicateInvestor(_) => (StatusCode::CONFLICT, "duplicate_investor"),
        SchemeAlreadyHasMint(_) => (StatusCode::CONFLICT, "scheme_already_has_mint"),
        Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
        SchemeInactive(_) => (StatusCode::PRECONDITION_FAILED, "scheme_inactive"),
        InvestorInactive(_) => (StatusCode::PRECONDITION_FAILED, "investor_inactive"),
        AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
        MintNotCreated(_) => (StatusCode::PRECONDITION_FAILED, "mint_not_created"),
        InsufficientBalance { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance"),
        InsufficientUnits { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_units"),
        VaultUnderfunded { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "vault_underfunded"),
        ZeroUnits { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "zero_units"),
        InexactPayment { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "inexact_payment"),
        AccountMismatch(_) => (StatusCode::UNPROCESSABLE_ENTITY, "account_mismatch"),
        InvalidIssuerLength(_)
        | InvalidNameLength(_)
        | InvalidListingDateLength(_)
        | InvalidCountryLength(_)
        | InvalidFullNamesLength(_)
        | InvalidSchemeKind(_)
        | InvalidAmount
        | InvalidUnitCost
        | InvalidDecimals(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        ArithmeticFault => (StatusCode::INTERNAL_SERVER_ERROR, "arithmetic_fault"),
        DerivationExhausted | Derivation(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "derivation_failed")
        }
        Runtime(_) | Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::BadSignature => (
                StatusCode::UNAUTHORIZED,
                "bad_signature",
                "signature verification failed".to_string(),
            ),
            ApiError::StaleEnvelope(msg) => (StatusCode::UNAUTHORIZED, "stale_envelope", msg),
            ApiError::ReplayedEnvelope(msg) => (StatusCode::CONFLICT, "replayed_envelope", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Engine(err) => {
                let (status, code) = classify(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "engine failure");
                }
                (status, code, err.to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "handler failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };
        let body = ErrorResponse {
            code: code.to_string(),
            error,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run a mutating engine call on the blocking pool, timing and counting it.
///
/// Engine operations take per-account locks and may flush sled, so they
/// stay off the async workers.
async fn run<T, F>(state: &AppState, operation: &'static str, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Engine) -> EngineResult<T> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let result = tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| ApiError::Internal(format!("engine task failed: {e}")))?;
    timer.observe_duration();
    state.metrics.record(operation, result.is_ok());
    Ok(result?)
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::from_base58(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn found<T>(value: Option<T>, what: &str, address: &Address) -> ApiResult<T> {
    value
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{what} not found at {address}")))
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up. Checks nothing else; that
/// belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let engine = &state.engine;
    let (config_address, _) = engine.config_address()?;
    let initialized = engine
        .config()?
        .map(|registry| registry.initialized)
        .unwrap_or(false);

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        program_id: *engine.program_id(),
        config_address,
        initialized,
        pricing: engine.settings().pricing,
        persistent: engine.ledger().is_persistent(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn config_handler(State(state): State<AppState>) -> ApiResult<ConfigurationRegistry> {
    let (address, _) = state.engine.config_address()?;
    found(state.engine.config()?, "configuration registry", &address)
}

async fn scheme_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Scheme> {
    let address = parse_address(&address)?;
    found(state.engine.scheme(&address)?, "scheme", &address)
}

async fn scheme_positions_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Vec<InvestorPosition>> {
    let address = parse_address(&address)?;
    Ok(Json(state.engine.scheme_positions(&address)?))
}

async fn promoter_scheme_handler(
    Path(promoter): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<SchemeRef> {
    let promoter = parse_address(&promoter)?;
    let address = state.engine.scheme_address(&promoter)?;
    let scheme = state
        .engine
        .scheme(&address)?
        .map(|scheme| SchemeRef { address, scheme });
    found(scheme, "scheme", &address)
}

async fn investor_handler(
    Path(owner): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<InvestorRef> {
    let owner = parse_address(&owner)?;
    let address = state.engine.investor_address(&owner)?;
    let investor = state
        .engine
        .investor(&address)?
        .map(|investor| InvestorRef { address, investor });
    found(investor, "investor", &address)
}

async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<TokenAccount> {
    let address = parse_address(&address)?;
    found(state.engine.token_account(&address)?, "token account", &address)
}

async fn mint_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Mint> {
    let address = parse_address(&address)?;
    found(state.engine.mint(&address)?, "mint", &address)
}

// ---------------------------------------------------------------------------
// Signed Handlers
// ---------------------------------------------------------------------------

async fn initialize_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<ConfigHandle> {
    let (admin, InitializeRequest {}) = req.open(&state)?;
    let handle = run(&state, "initialize", move |engine| engine.initialize(&admin)).await?;
    Ok(Json(handle))
}

async fn create_payment_mint_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<Mint> {
    let (authority, body): (Signer, CreatePaymentMintRequest) = req.open(&state)?;
    let mint = run(&state, "create_payment_mint", move |engine| {
        engine.create_payment_mint(&authority, &body.mint, body.decimals)
    })
    .await?;
    Ok(Json(mint))
}

async fn issue_payment_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<AccountCreated> {
    let (authority, body): (Signer, IssuePaymentRequest) = req.open(&state)?;
    let address = run(&state, "issue_payment", move |engine| {
        engine.issue_payment(&authority, &body.mint, &body.owner, body.amount)
    })
    .await?;
    Ok(Json(AccountCreated { address }))
}

async fn open_account_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<AccountCreated> {
    let (owner, body): (Signer, OpenAccountRequest) = req.open(&state)?;
    let address = run(&state, "open_token_account", move |engine| {
        engine.open_token_account(&owner.address(), &body.mint)
    })
    .await?;
    Ok(Json(AccountCreated { address }))
}

async fn register_scheme_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<SchemeRef> {
    let (promoter, params): (Signer, RegisterSchemeParams) = req.open(&state)?;
    let scheme = run(&state, "register_scheme", move |engine| {
        let config = engine.load_config()?;
        engine.register_scheme(&config, &promoter, params)
    })
    .await?;
    Ok(Json(scheme))
}

async fn create_mint_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<AccountCreated> {
    let (promoter, body): (Signer, CreateMintRequest) = req.open(&state)?;
    let address = run(&state, "create_mint", move |engine| {
        engine.create_mint(&promoter, &body.scheme, body.initial)
    })
    .await?;
    Ok(Json(AccountCreated { address }))
}

async fn scheme_status_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<SchemeRef> {
    let (promoter, body): (Signer, SchemeStatusRequest) = req.open(&state)?;
    let scheme = run(&state, "set_scheme_active", move |engine| {
        engine.set_scheme_active(&promoter, &body.scheme, body.active)?;
        let scheme = engine
            .scheme(&body.scheme)?
            .ok_or(EngineError::AccountNotFound(body.scheme))?;
        Ok(SchemeRef {
            address: body.scheme,
            scheme,
        })
    })
    .await?;
    Ok(Json(scheme))
}

async fn investor_status_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<InvestorRef> {
    let (admin, body): (Signer, InvestorStatusRequest) = req.open(&state)?;
    let investor = run(&state, "set_investor_active", move |engine| {
        let config = engine.load_config()?;
        engine.set_investor_active(&config, &admin, &body.owner, body.active)?;
        let address = engine.investor_address(&body.owner)?;
        let investor = engine
            .investor(&address)?
            .ok_or(EngineError::AccountNotFound(address))?;
        Ok(InvestorRef { address, investor })
    })
    .await?;
    Ok(Json(investor))
}

async fn register_investor_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<InvestorRef> {
    let (owner, params): (Signer, RegisterInvestorParams) = req.open(&state)?;
    let investor = run(&state, "register_investor", move |engine| {
        engine.register_investor(&owner, params)
    })
    .await?;
    Ok(Json(investor))
}

async fn buy_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<BuyReceipt> {
    let (investor, body): (Signer, BuyRequest) = req.open(&state)?;
    let receipt = run(&state, "buy", move |engine| {
        engine.buy(&investor, &body.scheme, &body.payment_source, body.payment_amount)
    })
    .await?;

    state.metrics.units_bought_total.inc_by(receipt.units_credited);
    state
        .metrics
        .payments_received_total
        .inc_by(receipt.payment_amount);
    Ok(Json(receipt))
}

async fn sell_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<SellReceipt> {
    let (investor, body): (Signer, SellRequest) = req.open(&state)?;
    let receipt = run(&state, "sell", move |engine| {
        engine.sell(&investor, &body.scheme, &body.payout_account, body.unit_amount)
    })
    .await?;

    state.metrics.units_sold_total.inc_by(receipt.units_sold);
    state.metrics.proceeds_paid_total.inc_by(receipt.proceeds);
    Ok(Json(receipt))
}

async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<SignedRequest>,
) -> ApiResult<TransferResponse> {
    let (signer, body): (Signer, TransferRequest) = req.open(&state)?;
    let (mint, from, to, amount) = (body.mint, body.from, body.to, body.amount);
    let via_vault = body.via_scheme_vault;
    run(&state, "move_units", move |engine| {
        let authority = if via_vault {
            UnitAuthority::SchemeVault { promoter: &signer }
        } else {
            UnitAuthority::Owner(&signer)
        };
        engine.move_units(&mint, &from, &to, amount, authority)
    })
    .await?;
    Ok(Json(TransferResponse {
        mint,
        from,
        to,
        amount,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use reit_contracts::{EngineSettings, IssuerInfo, SchemeKind};
    use reit_protocol::config::DEFAULT_ENVELOPE_TTL_SECS;
    use reit_protocol::crypto::Keypair;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tower::ServiceExt;

    use crate::metrics::NodeMetrics;

    static NEXT_NONCE: AtomicU64 = AtomicU64::new(1);

    fn test_state() -> AppState {
        AppState {
            version: "0.1.0-test".into(),
            engine: Arc::new(Engine::in_memory(EngineSettings::default())),
            metrics: Arc::new(NodeMetrics::new().expect("metrics")),
            replay: Arc::new(ReplayGuard::new(DEFAULT_ENVELOPE_TTL_SECS)),
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Wrap `payload` in an envelope signed by `keypair`, with a fresh nonce
    /// and a one-minute expiry.
    fn signed<T: Serialize>(keypair: &Keypair, payload: &T) -> serde_json::Value {
        let nonce = NEXT_NONCE.fetch_add(1, Ordering::Relaxed);
        signed_with(keypair, payload, nonce, now() + 60)
    }

    fn signed_with<T: Serialize>(
        keypair: &Keypair,
        payload: &T,
        nonce: u64,
        expires_at: i64,
    ) -> serde_json::Value {
        let payload = serde_json::to_value(payload).unwrap();
        let signature = keypair.sign(&signing_bytes(&payload, nonce, expires_at).unwrap());
        serde_json::to_value(SignedRequest {
            signer: keypair.address(),
            signature: signature.to_hex(),
            nonce,
            expires_at,
            payload,
        })
        .unwrap()
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    fn error_code(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorResponse>(body).unwrap().code
    }

    /// A market reachable over the API: initialized registry, one payment
    /// token, one listed scheme with its unit mint.
    struct Fixture {
        router: Router,
        state: AppState,
        admin: Keypair,
        promoter: Keypair,
        issuer: Keypair,
        payment_mint: Address,
        scheme: SchemeRef,
        unit_mint: Address,
    }

    async fn fixture() -> Fixture {
        let state = test_state();
        let router = create_router(state.clone());

        let admin = Keypair::generate();
        let (status, _) =
            post_json(&router, "/config/initialize", signed(&admin, &InitializeRequest {})).await;
        assert_eq!(status, StatusCode::OK);

        let issuer = Keypair::generate();
        let payment_mint = Keypair::generate().address();
        let (status, _) = post_json(
            &router,
            "/payment-mints",
            signed(
                &issuer,
                &CreatePaymentMintRequest {
                    mint: payment_mint,
                    decimals: 6,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let promoter = Keypair::generate();
        let params = RegisterSchemeParams {
            issuer: IssuerInfo {
                issuer_name: "Acorn Holdings".into(),
                scheme_name: "Acorn Student Housing".into(),
                kind: SchemeKind::Income,
                listing_date: "February 2021".into(),
            },
            country: "KE".into(),
            unit_cost: 100,
            decimals: 6,
            payment_mint,
            deposit_ledger: Keypair::generate().address(),
        };
        let (status, body) = post_json(&router, "/schemes", signed(&promoter, &params)).await;
        assert_eq!(status, StatusCode::OK);
        let scheme: SchemeRef = serde_json::from_slice(&body).unwrap();

        let (status, body) = post_json(
            &router,
            "/schemes/mint",
            signed(
                &promoter,
                &CreateMintRequest {
                    scheme: scheme.address,
                    initial: None,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let unit_mint = serde_json::from_slice::<AccountCreated>(&body).unwrap().address;

        Fixture {
            router,
            state,
            admin,
            promoter,
            issuer,
            payment_mint,
            scheme,
            unit_mint,
        }
    }

    /// Register `investor` and fund them with `amount` payment tokens.
    async fn funded_investor(f: &Fixture, investor: &Keypair, amount: u64) -> Address {
        let params = RegisterInvestorParams {
            full_names: "Wanjiku Achieng".into(),
            country: "KEN".into(),
        };
        let (status, _) = post_json(&f.router, "/investors", signed(investor, &params)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(
            &f.router,
            "/payment-mints/issue",
            signed(
                &f.issuer,
                &IssuePaymentRequest {
                    mint: f.payment_mint,
                    owner: investor.address(),
                    amount,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice::<AccountCreated>(&body).unwrap().address
    }

    // -- Health & status ------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_uninitialized_registry() {
        let router = create_router(test_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert!(!resp.initialized);
        assert!(!resp.persistent);
        assert_eq!(resp.pricing, PricingPolicy::Floor);
        assert_eq!(
            resp.config_address.to_base58(),
            "7orbTRCSmATDAsG5ffgUGM5sT3poCmBznZr4STXqw1Uj"
        );

        let (status, body) = get(&router, "/config").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "not_found");
    }

    // -- Envelope verification ------------------------------------------------

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let state = test_state();
        let router = create_router(state.clone());
        let investor = Keypair::generate();

        let mut envelope = signed(
            &investor,
            &RegisterInvestorParams {
                full_names: "Amina Otieno".into(),
                country: "KEN".into(),
            },
        );
        envelope["payload"]["full_names"] = serde_json::json!("Someone Else");

        let (status, body) = post_json(&router, "/investors", envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "bad_signature");
        assert_eq!(state.metrics.rejected_signatures_total.get(), 1);
        assert!(state
            .engine
            .investor_of(&investor.address())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn signature_from_another_key_is_rejected() {
        let router = create_router(test_state());
        let real = Keypair::generate();
        let impostor = Keypair::generate();

        let mut envelope = signed(&impostor, &InitializeRequest {});
        envelope["signer"] = serde_json::to_value(real.address()).unwrap();

        let (status, _) = post_json(&router, "/config/initialize", envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let router = create_router(test_state());
        let investor = Keypair::generate();
        let envelope = signed(&investor, &serde_json::json!({ "full_names": 7 }));

        let (status, body) = post_json(&router, "/investors", envelope).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "bad_request");
    }

    #[tokio::test]
    async fn replayed_envelope_is_conflict() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 5_000).await;

        let envelope = signed(
            &investor,
            &BuyRequest {
                scheme: f.scheme.address,
                payment_source: wallet,
                payment_amount: 1_000,
            },
        );
        let (status, _) = post_json(&f.router, "/trades/buy", envelope.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(&f.router, "/trades/buy", envelope).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), "replayed_envelope");
        assert_eq!(f.state.metrics.replayed_envelopes_total.get(), 1);

        // The payment moved once.
        assert_eq!(f.state.engine.balance(&wallet).unwrap(), 4_000);
        assert_eq!(f.state.metrics.units_bought_total.get(), 10);
    }

    #[tokio::test]
    async fn expired_or_distant_envelopes_are_stale() {
        let router = create_router(test_state());
        let investor = Keypair::generate();
        let params = RegisterInvestorParams {
            full_names: "Amina Otieno".into(),
            country: "KEN".into(),
        };

        let expired = signed_with(&investor, &params, 1, now() - 1);
        let (status, body) = post_json(&router, "/investors", expired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "stale_envelope");

        let ttl = i64::try_from(DEFAULT_ENVELOPE_TTL_SECS).unwrap();
        let distant = signed_with(&investor, &params, 2, now() + ttl + 120);
        let (status, body) = post_json(&router, "/investors", distant).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "stale_envelope");

        // A fresh envelope with the first nonce is still accepted.
        let fresh = signed_with(&investor, &params, 1, now() + 60);
        let (status, _) = post_json(&router, "/investors", fresh).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn nonce_and_expiry_are_signed() {
        let state = test_state();
        let router = create_router(state.clone());
        let investor = Keypair::generate();
        let params = RegisterInvestorParams {
            full_names: "Amina Otieno".into(),
            country: "KEN".into(),
        };

        let mut envelope = signed_with(&investor, &params, 5, now() + 60);
        envelope["nonce"] = serde_json::json!(6);
        let (status, body) = post_json(&router, "/investors", envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "bad_signature");

        let mut envelope = signed_with(&investor, &params, 5, now() + 60);
        envelope["expires_at"] = serde_json::json!(now() + 120);
        let (status, body) = post_json(&router, "/investors", envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "bad_signature");
        assert_eq!(state.metrics.rejected_signatures_total.get(), 2);
    }

    // -- Registry ---------------------------------------------------------------

    #[tokio::test]
    async fn scheme_is_readable_by_address_and_promoter() {
        let f = fixture().await;

        let (status, body) = get(&f.router, &format!("/schemes/{}", f.scheme.address)).await;
        assert_eq!(status, StatusCode::OK);
        let scheme: Scheme = serde_json::from_slice(&body).unwrap();
        assert_eq!(scheme.mint, Some(f.unit_mint));
        assert_eq!(scheme.kind, SchemeKind::Income);

        let (status, body) = get(
            &f.router,
            &format!("/promoters/{}/scheme", f.scheme.scheme.owner),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let by_promoter: SchemeRef = serde_json::from_slice(&body).unwrap();
        assert_eq!(by_promoter.address, f.scheme.address);

        let (status, body) = get(&f.router, &format!("/mints/{}", f.unit_mint)).await;
        assert_eq!(status, StatusCode::OK);
        let mint: Mint = serde_json::from_slice(&body).unwrap();
        assert_eq!(mint.mint_authority, Some(f.scheme.scheme.vault_authority));
    }

    #[tokio::test]
    async fn duplicate_investor_is_conflict() {
        let f = fixture().await;
        let investor = Keypair::generate();
        funded_investor(&f, &investor, 1).await;

        let params = RegisterInvestorParams {
            full_names: "Wanjiku Achieng".into(),
            country: "KEN".into(),
        };
        let (status, body) = post_json(&f.router, "/investors", signed(&investor, &params)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), "duplicate_investor");
    }

    #[tokio::test]
    async fn bad_path_address_is_bad_request() {
        let router = create_router(test_state());
        let (status, _) = get(&router, "/schemes/not-base58!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&router, &format!("/accounts/{}", Address::new([3; 32]))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "not_found");
    }

    // -- Trading ----------------------------------------------------------------

    #[tokio::test]
    async fn buy_and_sell_over_the_api() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 5_000).await;

        let (status, body) = post_json(
            &f.router,
            "/trades/buy",
            signed(
                &investor,
                &BuyRequest {
                    scheme: f.scheme.address,
                    payment_source: wallet,
                    payment_amount: 1_234,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let bought: BuyReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(bought.units_credited, 12);

        let (status, body) = post_json(
            &f.router,
            "/trades/sell",
            signed(
                &investor,
                &SellRequest {
                    scheme: f.scheme.address,
                    payout_account: wallet,
                    unit_amount: 5,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sold: SellReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(sold.proceeds, 500);

        let (_, body) = get(&f.router, &format!("/investors/{}", investor.address())).await;
        let investor_ref: InvestorRef = serde_json::from_slice(&body).unwrap();
        assert_eq!(investor_ref.investor.units_held, 7);

        let (_, body) = get(&f.router, &format!("/accounts/{wallet}")).await;
        let account: TokenAccount = serde_json::from_slice(&body).unwrap();
        assert_eq!(account.amount, 5_000 - 1_234 + 500);

        assert_eq!(f.state.metrics.units_bought_total.get(), 12);
        assert_eq!(f.state.metrics.units_sold_total.get(), 5);
        assert_eq!(f.state.metrics.proceeds_paid_total.get(), 500);
    }

    #[tokio::test]
    async fn economic_rejections_map_to_unprocessable() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 1_000).await;

        let (status, body) = post_json(
            &f.router,
            "/trades/buy",
            signed(
                &investor,
                &BuyRequest {
                    scheme: f.scheme.address,
                    payment_source: wallet,
                    payment_amount: 99,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(&body), "zero_units");

        let (status, body) = post_json(
            &f.router,
            "/trades/sell",
            signed(
                &investor,
                &SellRequest {
                    scheme: f.scheme.address,
                    payout_account: wallet,
                    unit_amount: 1,
                },
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(&body), "insufficient_units");

        let text = f.state.metrics.encode().unwrap();
        assert!(text.contains("reit_operations_total{operation=\"buy\",outcome=\"rejected\"} 1"));
    }

    #[tokio::test]
    async fn suspended_scheme_is_precondition_failed() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 1_000).await;
        let suspend = SchemeStatusRequest {
            scheme: f.scheme.address,
            active: false,
        };

        // Only the promoter may suspend.
        let (status, _) = post_json(&f.router, "/schemes/status", signed(&investor, &suspend)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            post_json(&f.router, "/schemes/status", signed(&f.promoter, &suspend)).await;
        assert_eq!(status, StatusCode::OK);
        let scheme: SchemeRef = serde_json::from_slice(&body).unwrap();
        assert!(!scheme.scheme.active);

        let buy = BuyRequest {
            scheme: f.scheme.address,
            payment_source: wallet,
            payment_amount: 500,
        };
        let (status, body) = post_json(&f.router, "/trades/buy", signed(&investor, &buy)).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(error_code(&body), "scheme_inactive");
        assert_eq!(f.state.engine.balance(&wallet).unwrap(), 1_000);
    }

    #[tokio::test]
    async fn admin_suspends_investors() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 1_000).await;
        let suspend = InvestorStatusRequest {
            owner: investor.address(),
            active: false,
        };

        let (status, _) =
            post_json(&f.router, "/investors/status", signed(&f.promoter, &suspend)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            post_json(&f.router, "/investors/status", signed(&f.admin, &suspend)).await;
        assert_eq!(status, StatusCode::OK);
        let suspended: InvestorRef = serde_json::from_slice(&body).unwrap();
        assert!(!suspended.investor.active);

        let buy = BuyRequest {
            scheme: f.scheme.address,
            payment_source: wallet,
            payment_amount: 500,
        };
        let (status, body) = post_json(&f.router, "/trades/buy", signed(&investor, &buy)).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(error_code(&body), "investor_inactive");
    }

    #[tokio::test]
    async fn positions_list_the_scheme_roster() {
        let f = fixture().await;
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let alice_wallet = funded_investor(&f, &alice, 1_000).await;
        let bob_wallet = funded_investor(&f, &bob, 1_000).await;

        for (keypair, wallet, amount) in [(&alice, alice_wallet, 700), (&bob, bob_wallet, 300)] {
            let buy = BuyRequest {
                scheme: f.scheme.address,
                payment_source: wallet,
                payment_amount: amount,
            };
            let (status, _) = post_json(&f.router, "/trades/buy", signed(keypair, &buy)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) =
            get(&f.router, &format!("/schemes/{}/positions", f.scheme.address)).await;
        assert_eq!(status, StatusCode::OK);
        let positions: Vec<InvestorPosition> = serde_json::from_slice(&body).unwrap();
        let units: Vec<u64> = positions.iter().map(|p| p.units_held).collect();
        assert_eq!(units, vec![7, 3]);

        let scheme = f.state.engine.scheme(&f.scheme.address).unwrap().unwrap();
        assert_eq!(scheme.units_outstanding, units.iter().sum::<u64>());
    }

    #[tokio::test]
    async fn selling_into_the_vault_is_rejected() {
        let f = fixture().await;
        let investor = Keypair::generate();
        let wallet = funded_investor(&f, &investor, 1_000).await;
        let buy = BuyRequest {
            scheme: f.scheme.address,
            payment_source: wallet,
            payment_amount: 1_000,
        };
        let (status, _) = post_json(&f.router, "/trades/buy", signed(&investor, &buy)).await;
        assert_eq!(status, StatusCode::OK);

        let sell = SellRequest {
            scheme: f.scheme.address,
            payout_account: f.scheme.scheme.vault,
            unit_amount: 5,
        };
        let (status, body) = post_json(&f.router, "/trades/sell", signed(&investor, &sell)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(&body), "account_mismatch");
        assert_eq!(f.state.engine.balance(&f.scheme.scheme.vault).unwrap(), 1_000);
    }

    #[tokio::test]
    async fn transfer_requires_the_owner() {
        let f = fixture().await;
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let alice_wallet = funded_investor(&f, &alice, 300).await;
        let bob_wallet = funded_investor(&f, &bob, 1).await;

        let request = TransferRequest {
            mint: f.payment_mint,
            from: alice_wallet,
            to: bob_wallet,
            amount: 100,
            via_scheme_vault: false,
        };
        let (status, body) = post_json(&f.router, "/units/transfer", signed(&bob, &request)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_code(&body), "unauthorized");

        let (status, _) = post_json(&f.router, "/units/transfer", signed(&alice, &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(f.state.engine.balance(&bob_wallet).unwrap(), 101);
    }
}
