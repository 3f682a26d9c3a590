//! Request and response types for all ogen-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use ogen_schemas::{BatchStatus, CancelSignal, OrderBatch};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/batches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartBatchRequest {
    pub configuration_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartBatchResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub order_count: u32,
}

/// List entry; results are left out (fetch the batch for those).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchListItem {
    pub batch_id: String,
    pub configuration_id: Option<String>,
    pub order_count: u32,
    pub status: BatchStatus,
    pub progress: u8,
    pub succeeded: usize,
    pub failed: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&OrderBatch> for BatchListItem {
    fn from(b: &OrderBatch) -> Self {
        Self {
            batch_id: b.batch_id.clone(),
            configuration_id: b.configuration_id.clone(),
            order_count: b.order_count,
            status: b.status,
            progress: b.progress,
            succeeded: b.succeeded_count(),
            failed: b.failed_count(),
            error_message: b.error_message.clone(),
            created_at: b.created_at,
            completed_at: b.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBatchResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub cancel_signal: CancelSignal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBatchesRequest {
    pub batch_ids: Vec<String>,
    #[serde(default)]
    pub purge_remote: bool,
}
