//! Lendaro Server
//!
//! HTTP surface for the claim settlement and guarantee fund engine.
//! Exposes claim intake and processing, settlement simulation, solvency
//! reporting, and admin-gated fund operations. State is in-memory and
//! seeded with demo bookings at boot.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use lendaro_claims::{
    ClaimManager, FraudConfig, InMemoryClaimStore, InMemoryWallet, ManagerConfig,
    MultiplierSource, NeutralMultiplierSource, ProcessOutcome, RuleBasedFraudValidator,
    SimulatedGateway, StaticBookingInfo, StaticClassifier, StaticInspectionValidator,
    WaterfallExecutor,
};
use lendaro_eligibility::{EligibilityAssessor, EligibilityConfig};
use lendaro_fund::FundLedger;
use lendaro_risk::{DisplayAmounts, InMemorySnapshotStore, RiskPolicy, SnapshotParams, SnapshotStore};
use lendaro_stats::{AdjustmentResult, LossStatsEngine, SolvencyReport, StatsConfig};
use lendaro_types::{
    AdminId, Amount, BookingId, Claim, ClaimId, ClaimStatus, CountryCode, Currency, DamageItem,
    FxRate, GuaranteeMultipliers, LendaroError, RiskBucket, SubAccount, UserId,
    WaterfallBreakdown,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        })
    }
}

fn error_response<T>(err: LendaroError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &err {
        LendaroError::Validation { .. }
        | LendaroError::AmountOverflow
        | LendaroError::AmountUnderflow => StatusCode::BAD_REQUEST,
        LendaroError::SnapshotNotFound { .. } | LendaroError::ClaimNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        LendaroError::SnapshotExists { .. } | LendaroError::ClaimLocked { .. } => {
            StatusCode::CONFLICT
        }
        LendaroError::InvalidTransition { .. }
        | LendaroError::FraudBlocked { .. }
        | LendaroError::InspectionIncomplete { .. }
        | LendaroError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LendaroError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LendaroError::GatewayError { .. }
        | LendaroError::WalletError { .. }
        | LendaroError::ClassifierError { .. }
        | LendaroError::FraudValidatorUnavailable { .. } => StatusCode::BAD_GATEWAY,
        LendaroError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_code: Some(err.error_code().to_string()),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateClaimRequest {
    pub booking_id: String,
    pub reporter: String,
    pub items: Vec<DamageItem>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessClaimRequest {
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectClaimRequest {
    pub reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub booking_id: String,
    pub claim_amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct ClaimListQuery {
    pub status: Option<String>,
    pub booking_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub country: String,
    pub bucket: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DirectPayoutRequest {
    pub sub_account: String,
    pub amount: u64,
    pub country: String,
    pub bucket: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub breakdown: Option<WaterfallBreakdown>,
    pub rejection_reasons: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub solvency_ratio: f64,
    pub estimated_breakdown: Option<WaterfallBreakdown>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    /// When set, the user's bonus-malus multipliers scale the display
    /// amounts
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub policy: RiskPolicy,
    pub display: DisplayAmounts,
}

#[derive(Debug, Serialize)]
pub struct SegmentBalanceResponse {
    pub country: String,
    pub bucket: String,
    pub liquidity: Amount,
    pub contribution_rate_bps: u32,
}

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub manager: ClaimManager,
    pub fund: Arc<FundLedger>,
    pub stats: Arc<LossStatsEngine>,
    pub snapshots: Arc<InMemorySnapshotStore>,
    pub inspections: Arc<StaticInspectionValidator>,
    pub gateway: Arc<SimulatedGateway>,
    pub wallet: Arc<InMemoryWallet>,
    pub multipliers: Arc<dyn MultiplierSource>,
}

impl AppState {
    fn new(admins: Vec<AdminId>) -> Self {
        let store = Arc::new(InMemoryClaimStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let inspections = Arc::new(StaticInspectionValidator::new());
        let gateway = Arc::new(SimulatedGateway::new());
        let wallet = Arc::new(InMemoryWallet::new());
        let fund = Arc::new(FundLedger::new(admins.clone()));
        let stats = Arc::new(LossStatsEngine::new(
            fund.clone(),
            admins,
            StatsConfig::default(),
        ));
        let assessor = EligibilityAssessor::new(
            snapshots.clone(),
            stats.clone(),
            fund.clone(),
            store.clone(),
            EligibilityConfig::default(),
        );
        let executor = Arc::new(WaterfallExecutor::new(
            gateway.clone(),
            wallet.clone(),
            fund.clone(),
        ));
        let fraud = Arc::new(RuleBasedFraudValidator::new(
            store.clone(),
            Arc::new(StaticBookingInfo::new()),
            FraudConfig::default(),
        ));
        let manager = ClaimManager::new(
            store,
            snapshots.clone(),
            inspections.clone(),
            fraud,
            Arc::new(StaticClassifier::new()),
            assessor,
            executor,
            ManagerConfig::default(),
        );
        Self {
            manager,
            fund,
            stats,
            snapshots,
            inspections,
            gateway,
            wallet,
            multipliers: Arc::new(NeutralMultiplierSource),
        }
    }
}

// ============================================================================
// Seed Data
// ============================================================================

async fn seed_demo_data(state: &Arc<AppState>) {
    let fr = CountryCode::new("FR");

    // capitalize the French default-bucket segment
    for (sub_account, cents) in [
        (SubAccount::Liquidity, 1_500_000u64),
        (SubAccount::Capitalization, 500_000),
        (SubAccount::Profitability, 100_000),
    ] {
        if let Err(err) = state
            .fund
            .contribute(
                sub_account,
                Amount::cents(cents),
                fr.clone(),
                RiskBucket::Default,
                None,
                "initial capitalization",
            )
            .await
        {
            info!(error = %err, "seed contribution skipped");
        }
    }

    // one card-hold booking and one wallet-security booking, both in the
    // default bucket (80_000 estimated value)
    let policy = match lendaro_risk::resolve(80_000) {
        Ok(policy) => policy,
        Err(err) => {
            info!(error = %err, "seed policy resolution failed, skipping demo bookings");
            return;
        }
    };

    let card_booking = BookingId::from_string("bkg_demo_card".to_string());
    let _ = state
        .snapshots
        .create(SnapshotParams {
            booking_id: card_booking.clone(),
            country: fr.clone(),
            bucket: policy.bucket,
            currency: Currency::Eur,
            fx_rate: FxRate::unity(),
            hold_amount: policy.min_hold,
            wallet_security_amount: Amount::ZERO,
            franchise_amount: policy.standard_franchise,
            has_card_hold: true,
            has_wallet_security: false,
            authorization_ref: Some("auth_demo_1".to_string()),
        })
        .await;
    state.inspections.mark_complete(card_booking.clone()).await;
    state
        .gateway
        .authorize("auth_demo_1", policy.min_hold)
        .await;

    let wallet_booking = BookingId::from_string("bkg_demo_wallet".to_string());
    let _ = state
        .snapshots
        .create(SnapshotParams {
            booking_id: wallet_booking.clone(),
            country: fr,
            bucket: policy.bucket,
            currency: Currency::Eur,
            fx_rate: FxRate::unity(),
            hold_amount: Amount::ZERO,
            wallet_security_amount: policy.security_credit,
            franchise_amount: policy.standard_franchise,
            has_card_hold: false,
            has_wallet_security: true,
            authorization_ref: None,
        })
        .await;
    state
        .inspections
        .mark_complete(wallet_booking.clone())
        .await;
    state
        .wallet
        .set_balance(wallet_booking, policy.security_credit)
        .await;

    info!("demo bookings seeded");
}

// ============================================================================
// Helpers
// ============================================================================

fn admin_from_headers(headers: &HeaderMap) -> Result<AdminId, LendaroError> {
    headers
        .get("x-admin-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| AdminId::from_string(s.to_string()))
        .ok_or_else(|| LendaroError::unauthorized("missing x-admin-id header"))
}

fn parse_segment(country: &str, bucket: &str) -> Result<(CountryCode, RiskBucket), LendaroError> {
    let bucket = RiskBucket::parse(bucket)
        .ok_or_else(|| LendaroError::validation("bucket", format!("unknown bucket {bucket}")))?;
    Ok((CountryCode::new(country), bucket))
}

fn parse_sub_account(s: &str) -> Result<SubAccount, LendaroError> {
    SubAccount::parse(s)
        .ok_or_else(|| LendaroError::validation("sub_account", format!("unknown sub-account {s}")))
}

// ============================================================================
// API Handlers
// ============================================================================

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "lendaro-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_claim(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateClaimRequest>,
) -> Result<Json<ApiResponse<Claim>>, (StatusCode, Json<ApiResponse<Claim>>)> {
    let claim = state
        .manager
        .create(
            BookingId::from_string(req.booking_id),
            UserId::from_string(req.reporter),
            req.items,
            req.notes,
        )
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(claim))
}

async fn get_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Claim>>, StatusCode> {
    match state.manager.get(&ClaimId::from_string(id)).await {
        Some(claim) => Ok(ApiResponse::ok(claim)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn list_claims(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClaimListQuery>,
) -> Result<Json<ApiResponse<Vec<Claim>>>, (StatusCode, Json<ApiResponse<Vec<Claim>>>)> {
    if let Some(booking_id) = query.booking_id {
        let claims = state
            .manager
            .by_booking(&BookingId::from_string(booking_id))
            .await;
        return Ok(ApiResponse::ok(claims));
    }
    let status = match query.status.as_deref() {
        Some("draft") => ClaimStatus::Draft,
        Some("submitted") => ClaimStatus::Submitted,
        Some("under_review") => ClaimStatus::UnderReview,
        Some("approved") => ClaimStatus::Approved,
        Some("processing") => ClaimStatus::Processing,
        Some("paid") => ClaimStatus::Paid,
        Some("rejected") => ClaimStatus::Rejected,
        Some(other) => {
            return Err(error_response(LendaroError::validation(
                "status",
                format!("unknown status {other}"),
            )))
        }
        None => ClaimStatus::Submitted,
    };
    Ok(ApiResponse::ok(state.manager.by_status(status).await))
}

async fn submit_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Claim>>, (StatusCode, Json<ApiResponse<Claim>>)> {
    let claim = state
        .manager
        .submit(&ClaimId::from_string(id))
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(claim))
}

async fn review_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Claim>>, (StatusCode, Json<ApiResponse<Claim>>)> {
    let claim = state
        .manager
        .start_review(&ClaimId::from_string(id))
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(claim))
}

async fn approve_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Claim>>, (StatusCode, Json<ApiResponse<Claim>>)> {
    let claim = state
        .manager
        .approve(&ClaimId::from_string(id))
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(claim))
}

async fn reject_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RejectClaimRequest>,
) -> Result<Json<ApiResponse<Claim>>, (StatusCode, Json<ApiResponse<Claim>>)> {
    let claim = state
        .manager
        .reject(&ClaimId::from_string(id), req.reasons)
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(claim))
}

async fn process_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProcessClaimRequest>,
) -> Result<Json<ApiResponse<ProcessResponse>>, (StatusCode, Json<ApiResponse<ProcessResponse>>)> {
    let outcome = state
        .manager
        .process(
            &ClaimId::from_string(id),
            &UserId::from_string(req.actor),
        )
        .await
        .map_err(error_response)?;
    let response = match outcome {
        ProcessOutcome::Paid(breakdown) => ProcessResponse {
            status: "paid".to_string(),
            breakdown: Some(breakdown),
            rejection_reasons: None,
        },
        ProcessOutcome::Rejected(reasons) => ProcessResponse {
            status: "rejected".to_string(),
            breakdown: None,
            rejection_reasons: Some(reasons),
        },
    };
    Ok(ApiResponse::ok(response))
}

async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<ApiResponse<SimulateResponse>>, (StatusCode, Json<ApiResponse<SimulateResponse>>)>
{
    let result = state
        .manager
        .simulate(
            &BookingId::from_string(req.booking_id),
            Amount::cents(req.claim_amount),
        )
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(SimulateResponse {
        eligible: result.eligibility.eligible,
        reasons: result.eligibility.reasons,
        solvency_ratio: result.eligibility.solvency_ratio,
        estimated_breakdown: result.estimated_breakdown,
    }))
}

async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(estimated_value): Path<i64>,
    Query(query): Query<PolicyQuery>,
) -> Result<Json<ApiResponse<PolicyResponse>>, (StatusCode, Json<ApiResponse<PolicyResponse>>)> {
    let policy = lendaro_risk::resolve(estimated_value).map_err(error_response)?;
    let multipliers = match query.user {
        Some(user) => state
            .multipliers
            .multipliers_for(&UserId::from_string(user))
            .await
            .map_err(error_response)?,
        None => GuaranteeMultipliers::default(),
    };
    let display = lendaro_risk::display_amounts(&policy, multipliers);
    Ok(ApiResponse::ok(PolicyResponse { policy, display }))
}

async fn get_solvency(
    State(state): State<Arc<AppState>>,
    Path((country, bucket)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SolvencyReport>>, (StatusCode, Json<ApiResponse<SolvencyReport>>)> {
    let (country, bucket) = parse_segment(&country, &bucket).map_err(error_response)?;
    Ok(ApiResponse::ok(
        state.stats.solvency_ratio(&country, bucket).await,
    ))
}

async fn get_segment_balance(
    State(state): State<Arc<AppState>>,
    Path((country, bucket)): Path<(String, String)>,
) -> Result<
    Json<ApiResponse<SegmentBalanceResponse>>,
    (StatusCode, Json<ApiResponse<SegmentBalanceResponse>>),
> {
    let (country, bucket) = parse_segment(&country, &bucket).map_err(error_response)?;
    let liquidity = state.fund.segment_balance(&country, bucket).await;
    let rate = state.stats.current_rate(&country, bucket).await;
    Ok(ApiResponse::ok(SegmentBalanceResponse {
        country: country.to_string(),
        bucket: bucket.as_str().to_string(),
        liquidity,
        contribution_rate_bps: rate,
    }))
}

async fn admin_transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TransferRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, (StatusCode, Json<ApiResponse<serde_json::Value>>)>
{
    let admin = admin_from_headers(&headers).map_err(error_response)?;
    let from = parse_sub_account(&req.from).map_err(error_response)?;
    let to = parse_sub_account(&req.to).map_err(error_response)?;
    let (country, bucket) = parse_segment(&req.country, &req.bucket).map_err(error_response)?;

    let (debit, credit) = state
        .fund
        .transfer(
            from,
            to,
            Amount::cents(req.amount),
            country,
            bucket,
            req.reason,
            &admin,
        )
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(serde_json::json!({
        "debit_movement": debit,
        "credit_movement": credit,
    })))
}

async fn admin_direct_payout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DirectPayoutRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, (StatusCode, Json<ApiResponse<serde_json::Value>>)>
{
    let admin = admin_from_headers(&headers).map_err(error_response)?;
    let sub_account = parse_sub_account(&req.sub_account).map_err(error_response)?;
    let (country, bucket) = parse_segment(&req.country, &req.bucket).map_err(error_response)?;

    let movement = state
        .fund
        .direct_payout(
            sub_account,
            Amount::cents(req.amount),
            country,
            bucket,
            req.reason,
            &admin,
        )
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(serde_json::json!({ "movement": movement })))
}

async fn admin_adjust_rate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((country, bucket)): Path<(String, String)>,
) -> Result<Json<ApiResponse<AdjustmentResult>>, (StatusCode, Json<ApiResponse<AdjustmentResult>>)>
{
    let admin = admin_from_headers(&headers).map_err(error_response)?;
    let (country, bucket) = parse_segment(&country, &bucket).map_err(error_response)?;
    let result = state
        .stats
        .adjust_contribution_rate(&country, bucket, &admin)
        .await
        .map_err(error_response)?;
    Ok(ApiResponse::ok(result))
}

// ============================================================================
// Main Application
// ============================================================================

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let admin = match std::env::var("LENDARO_ADMIN_ID") {
        Ok(id) => AdminId::from_string(id),
        Err(_) => {
            let generated = AdminId::new();
            info!(admin = %generated, "no LENDARO_ADMIN_ID set, generated a fund operator id");
            generated
        }
    };

    let state = Arc::new(AppState::new(vec![admin]));
    seed_demo_data(&state).await;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        // claim lifecycle
        .route("/api/claims", get(list_claims).post(create_claim))
        .route("/api/claims/:id", get(get_claim))
        .route("/api/claims/:id/submit", post(submit_claim))
        .route("/api/claims/:id/review", post(review_claim))
        .route("/api/claims/:id/approve", post(approve_claim))
        .route("/api/claims/:id/reject", post(reject_claim))
        .route("/api/claims/:id/process", post(process_claim))
        // settlement forecast
        .route("/api/simulate", post(simulate))
        // risk policy lookup with bonus-malus display amounts
        .route("/api/policy/:estimated_value", get(get_policy))
        // fund & solvency reporting
        .route("/api/solvency/:country/:bucket", get(get_solvency))
        .route("/api/fund/:country/:bucket", get(get_segment_balance))
        // admin-gated fund operations
        .route("/api/admin/fund/transfer", post(admin_transfer))
        .route("/api/admin/fund/payout", post(admin_direct_payout))
        .route("/api/admin/rates/:country/:bucket", post(admin_adjust_rate))
        .layer(cors)
        .with_state(state);

    let port = std::env::var("LENDARO_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3010u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Lendaro Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
