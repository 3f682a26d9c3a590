//! Axum router and all HTTP handlers for ogen-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use ogen_db::StoreError;
use ogen_runtime::results_to_csv;
use ogen_schemas::{new_batch_id, OrderBatch, OrderConfiguration, ValidationError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        BatchListItem, CancelBatchResponse, DeleteBatchesRequest, ErrorResponse, HealthResponse,
        StartBatchRequest, StartBatchResponse,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route(
            "/v1/configurations",
            get(list_configurations).post(create_configuration),
        )
        .route(
            "/v1/configurations/:id",
            get(get_configuration)
                .put(update_configuration)
                .delete(delete_configuration),
        )
        .route("/v1/batches", get(list_batches).post(start_batch))
        .route("/v1/batches/delete", post(delete_batches))
        .route("/v1/batches/:id", get(get_batch))
        .route("/v1/batches/:id/cancel", post(cancel_batch))
        .route("/v1/batches/:id/export.csv", get(export_batch))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

pub(crate) enum ApiError {
    Store(StoreError),
    Invalid(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, error) = match self {
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Store(e) => {
                let code = match &e {
                    StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    StoreError::AlreadyExists { .. }
                    | StoreError::AlreadyTerminal { .. }
                    | StoreError::InvalidTransition(_)
                    | StoreError::ConfigurationInUse(_) => StatusCode::CONFLICT,
                    StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (code, e.to_string())
            }
        };
        if code.is_server_error() {
            warn!(status = code.as_u16(), error = %error, "request failed");
        }
        (code, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/configurations
// ---------------------------------------------------------------------------

pub(crate) async fn list_configurations(State(st): State<Arc<AppState>>) -> ApiResult<Response> {
    let all = st.configurations.list_configurations().await?;
    Ok(Json(all).into_response())
}

pub(crate) async fn create_configuration(
    State(st): State<Arc<AppState>>,
    Json(cfg): Json<OrderConfiguration>,
) -> ApiResult<Response> {
    cfg.validate(&st.settings.limits)?;
    let rec = st.configurations.create_configuration(cfg).await?;
    info!(configuration_id = %rec.id, "configuration created");
    Ok((StatusCode::CREATED, Json(rec)).into_response())
}

pub(crate) async fn get_configuration(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let rec = st
        .configurations
        .get_configuration(&id)
        .await?
        .ok_or_else(|| StoreError::configuration_not_found(&id))?;
    Ok(Json(rec).into_response())
}

pub(crate) async fn update_configuration(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(cfg): Json<OrderConfiguration>,
) -> ApiResult<Response> {
    cfg.validate(&st.settings.limits)?;
    let rec = st.configurations.update_configuration(&id, cfg).await?;
    Ok(Json(rec).into_response())
}

/// Batches that referenced the configuration keep their history with the
/// link cleared.
pub(crate) async fn delete_configuration(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if st.configurations.get_configuration(&id).await?.is_none() {
        return Err(StoreError::configuration_not_found(&id).into());
    }
    let unlinked = st.batches.unlink_configuration(&id).await?;
    st.configurations.delete_configuration(&id).await?;
    info!(configuration_id = %id, unlinked, "configuration deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// /v1/batches
// ---------------------------------------------------------------------------

pub(crate) async fn list_batches(State(st): State<Arc<AppState>>) -> ApiResult<Response> {
    let items: Vec<BatchListItem> = st
        .batches
        .list_batches()
        .await?
        .iter()
        .map(BatchListItem::from)
        .collect();
    Ok(Json(items).into_response())
}

/// Create a pending batch and run it in the background. Returns 202 at once.
pub(crate) async fn start_batch(
    State(st): State<Arc<AppState>>,
    Json(req): Json<StartBatchRequest>,
) -> ApiResult<Response> {
    let rec = st
        .configurations
        .get_configuration(&req.configuration_id)
        .await?
        .ok_or_else(|| StoreError::configuration_not_found(&req.configuration_id))?;
    let cfg = rec.configuration;
    cfg.validate(&st.settings.limits)?;

    let batch_id = new_batch_id();
    let order_count = st.settings.limits.clamp_order_count(cfg.order_count);
    let batch = OrderBatch::new_pending(&batch_id, Some(rec.id.clone()), order_count);
    let status = batch.status;
    st.batches.create_batch(batch).await?;

    let _ = st.bus.send(BusMsg::LogLine {
        level: "info".to_string(),
        msg: format!("batch {batch_id} started ({order_count} orders)"),
    });

    let orchestrator = Arc::clone(&st.orchestrator);
    let run_id = batch_id.clone();
    tokio::spawn(async move {
        // Failures are already persisted on the batch record.
        if let Err(e) = orchestrator.run_batch(&cfg, &run_id).await {
            warn!(batch_id = %run_id, error = %e, "background batch run failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartBatchResponse {
            batch_id,
            status,
            order_count,
        }),
    )
        .into_response())
}

pub(crate) async fn get_batch(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let batch = load_batch(&st, &id).await?;
    Ok(Json(batch).into_response())
}

/// 409 once the batch is terminal. The orchestrator sees the request before
/// its next wave.
pub(crate) async fn cancel_batch(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let batch = st.batches.request_cancel(&id).await?;
    info!(batch_id = %id, "cancel requested");
    Ok(Json(CancelBatchResponse {
        batch_id: batch.batch_id,
        status: batch.status,
        cancel_signal: batch.cancel_signal,
    })
    .into_response())
}

pub(crate) async fn delete_batches(
    State(st): State<Arc<AppState>>,
    Json(req): Json<DeleteBatchesRequest>,
) -> ApiResult<Response> {
    if req.batch_ids.is_empty() {
        return Err(ApiError::Invalid("batch_ids must not be empty".to_string()));
    }
    let report = st
        .deleter
        .delete_batches(&req.batch_ids, req.purge_remote)
        .await;
    Ok(Json(report).into_response())
}

pub(crate) async fn export_batch(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let batch = load_batch(&st, &id).await?;
    let body = results_to_csv(&batch.results).map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{id}.csv\"")) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    Ok((headers, body).into_response())
}

async fn load_batch(st: &AppState, id: &str) -> ApiResult<OrderBatch> {
    st.batches
        .get_batch(id)
        .await?
        .ok_or_else(|| StoreError::batch_not_found(id).into())
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
