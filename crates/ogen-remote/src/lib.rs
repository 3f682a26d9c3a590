//! ogen-remote
//!
//! Boundary to the remote commerce API.
//!
//! This crate owns the [`RemoteOrderService`] contract, the wire payload types
//! and one concrete adapter ([`AdminApiClient`]) for a REST admin API. The
//! orchestrators only ever see the trait, so tests swap in an in-process fake.

mod admin_api;
mod payload;

use async_trait::async_trait;
use ogen_schemas::{ProductInfo, RemoteOrder};
use serde::{Deserialize, Serialize};

pub use admin_api::AdminApiClient;
pub use payload::{OrderPayload, PayloadCustomer, PayloadLineItem};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`RemoteOrderService`] call may return. All of them are per-call:
/// the orchestrators convert them into result entries, never abort on them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network or transport failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx response.
    #[error("remote api error status={status}: {message}")]
    Http { status: u16, message: String },
    /// 429 from the remote API.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    /// A response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// An identifier that cannot address a remote resource.
    #[error("invalid remote id '{0}'")]
    InvalidId(String),
    /// Application-level error reported inside a 2xx body (GraphQL `errors`).
    #[error("remote api error: {0}")]
    Api(String),
}

// ---------------------------------------------------------------------------
// Auxiliary response types
// ---------------------------------------------------------------------------

/// Outcome of a delete call. A remote 404 is reported as success with
/// `already_gone = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub already_gone: bool,
    pub message: String,
}

impl DeleteOutcome {
    pub fn deleted() -> Self {
        Self {
            success: true,
            already_gone: false,
            message: "deleted".to_string(),
        }
    }

    pub fn already_gone() -> Self {
        Self {
            success: true,
            already_gone: true,
            message: "already deleted".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentOrder {
    pub id: String,
    pub assigned_location_id: Option<String>,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Remote commerce API contract. Every method is an independent network call
/// that may fail transiently.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent call of a wave.
#[async_trait]
pub trait RemoteOrderService: Send + Sync {
    /// Short identifier for logs (e.g. `"admin-api"`).
    fn name(&self) -> &'static str;

    async fn create_order(&self, payload: &OrderPayload) -> Result<RemoteOrder, RemoteError>;

    /// Treats "already gone" as success.
    async fn delete_order(&self, order_id: &str) -> Result<DeleteOutcome, RemoteError>;

    /// `Ok(None)` when no variant carries this SKU.
    async fn search_product_by_sku(&self, sku: &str) -> Result<Option<ProductInfo>, RemoteError>;

    async fn get_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<FulfillmentOrder>, RemoteError>;

    async fn move_fulfillment_order(
        &self,
        fulfillment_order_id: &str,
        location_id: &str,
    ) -> Result<(), RemoteError>;
}
