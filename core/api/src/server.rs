// core/api/src/server.rs

use crate::metrics::{metrics_handler, track_requests};
use crate::rosetta::convert::error_to_wire;
use crate::rosetta::types as wire;
use crate::services::account::AccountApiService;
use crate::services::block::BlockApiService;
use crate::services::construction::ConstructionApiService;
use crate::services::mempool::MempoolApiService;
use crate::services::network::NetworkApiService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use mirror_domain::MirrorError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// A Rosetta error response: every failure is HTTP 500 with the catalog entry
/// as the body, per the Rosetta spec.
#[derive(Debug)]
pub struct ApiError(pub MirrorError);

impl From<MirrorError> for ApiError {
    fn from(error: MirrorError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_to_wire(self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared handler state; offline deployments leave the data services unset.
pub struct AppState {
    pub network: NetworkApiService,
    pub block: Option<BlockApiService>,
    pub account: Option<AccountApiService>,
    pub construction: ConstructionApiService,
    pub mempool: MempoolApiService,
}

/// Full endpoint set for online mode.
pub fn online_router(state: Arc<AppState>) -> Router {
    common_router()
        .route("/block", post(block))
        .route("/block/transaction", post(block_transaction))
        .route("/account/balance", post(account_balance))
        .route("/account/coins", post(account_coins))
        .route("/mempool", post(mempool))
        .route("/mempool/transaction", post(mempool_transaction))
        .route("/network/status", post(network_status))
        .route("/construction/metadata", post(construction_metadata))
        .with_state(state)
}

/// Offline subset: network list/options, construction, health, metrics.
pub fn offline_router(state: Arc<AppState>) -> Router {
    common_router().with_state(state)
}

fn common_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/network/list", post(network_list))
        .route("/network/options", post(network_options))
        .route("/construction/derive", post(construction_derive))
        .route("/construction/preprocess", post(construction_preprocess))
        .route("/construction/payloads", post(construction_payloads))
        .route("/construction/parse", post(construction_parse))
        .route("/construction/combine", post(construction_combine))
        .route("/construction/hash", post(construction_hash))
        .route("/construction/submit", post(construction_submit))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn network_list(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<wire::MetadataRequest>,
) -> ApiResult<wire::NetworkListResponse> {
    Ok(Json(state.network.network_list()))
}

async fn network_options(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<wire::NetworkRequest>,
) -> ApiResult<wire::NetworkOptionsResponse> {
    Ok(Json(state.network.network_options()))
}

async fn network_status(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<wire::NetworkRequest>,
) -> ApiResult<wire::NetworkStatusResponse> {
    Ok(Json(state.network.network_status().await?))
}

async fn block(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::BlockRequest>,
) -> ApiResult<wire::BlockResponse> {
    let service = state.block.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)?;
    Ok(Json(service.block(&request).await?))
}

async fn block_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::BlockTransactionRequest>,
) -> ApiResult<wire::BlockTransactionResponse> {
    let service = state.block.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)?;
    Ok(Json(service.block_transaction(&request).await?))
}

async fn account_balance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::AccountBalanceRequest>,
) -> ApiResult<wire::AccountBalanceResponse> {
    let service = state.account.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)?;
    Ok(Json(service.account_balance(&request).await?))
}

async fn account_coins(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<serde_json::Value>,
) -> ApiResult<serde_json::Value> {
    let service = state.account.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)?;
    service.account_coins()?;
    Ok(Json(serde_json::Value::Null))
}

async fn mempool(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<wire::NetworkRequest>,
) -> ApiResult<serde_json::Value> {
    state.mempool.mempool()?;
    Ok(Json(serde_json::Value::Null))
}

async fn mempool_transaction(
    State(state): State<Arc<AppState>>,
    Json(_request): Json<serde_json::Value>,
) -> ApiResult<serde_json::Value> {
    state.mempool.mempool_transaction()?;
    Ok(Json(serde_json::Value::Null))
}

async fn construction_derive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionDeriveRequest>,
) -> ApiResult<wire::ConstructionDeriveResponse> {
    Ok(Json(state.construction.derive(&request)?))
}

async fn construction_preprocess(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionPreprocessRequest>,
) -> ApiResult<wire::ConstructionPreprocessResponse> {
    Ok(Json(state.construction.preprocess(&request)?))
}

async fn construction_metadata(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionMetadataRequest>,
) -> ApiResult<wire::ConstructionMetadataResponse> {
    Ok(Json(state.construction.metadata(&request)?))
}

async fn construction_payloads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionPayloadsRequest>,
) -> ApiResult<wire::ConstructionPayloadsResponse> {
    Ok(Json(state.construction.payloads(&request).await?))
}

async fn construction_parse(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionParseRequest>,
) -> ApiResult<wire::ConstructionParseResponse> {
    Ok(Json(state.construction.parse(&request)?))
}

async fn construction_combine(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionCombineRequest>,
) -> ApiResult<wire::ConstructionCombineResponse> {
    Ok(Json(state.construction.combine(&request)?))
}

async fn construction_hash(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionHashRequest>,
) -> ApiResult<wire::TransactionIdentifierResponse> {
    Ok(Json(state.construction.hash(&request)?))
}

async fn construction_submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<wire::ConstructionSubmitRequest>,
) -> ApiResult<wire::TransactionIdentifierResponse> {
    Ok(Json(state.construction.submit(&request)?))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness() -> StatusCode {
    StatusCode::OK
}
