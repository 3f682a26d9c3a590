//! ogen-db
//!
//! Persistence for order configurations and batch records.
//!
//! Two backends implement the same store traits:
//! - [`InMemoryStore`]: process-local, used by tests and by the daemon when no
//!   database URL is configured.
//! - [`PgStore`]: Postgres via SQLx with embedded migrations.
//!
//! Every batch mutation is a field-level merge. `update_progress`,
//! `append_results`, `finalize` and `request_cancel` each touch only their own
//! columns, so a progress write can never clobber a concurrent cancel request.

mod memory;
mod postgres;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ogen_schemas::{BatchStatus, ConfigurationRecord, OrderBatch, OrderConfiguration, OrderResult};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub const ENV_DB_URL: &str = "OGEN_DATABASE_URL";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("batch '{batch_id}' is already {status}")]
    AlreadyTerminal {
        batch_id: String,
        status: BatchStatus,
    },
    #[error("invalid batch transition: {0}")]
    InvalidTransition(String),
    #[error("configuration '{0}' is still referenced by batches")]
    ConfigurationInUse(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn batch_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "batch",
            id: id.to_string(),
        }
    }

    pub fn configuration_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "configuration",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("json: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// CRUD for reusable order templates.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn create_configuration(
        &self,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError>;

    async fn get_configuration(&self, id: &str) -> Result<Option<ConfigurationRecord>, StoreError>;

    /// Newest first.
    async fn list_configurations(&self) -> Result<Vec<ConfigurationRecord>, StoreError>;

    async fn update_configuration(
        &self,
        id: &str,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError>;

    /// Fails with [`StoreError::ConfigurationInUse`] while any batch still
    /// references the configuration; callers unlink first.
    async fn delete_configuration(&self, id: &str) -> Result<(), StoreError>;
}

/// Batch records, keyed by batch id.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn create_batch(&self, batch: OrderBatch) -> Result<(), StoreError>;

    async fn get_batch(&self, batch_id: &str) -> Result<Option<OrderBatch>, StoreError>;

    /// Newest first.
    async fn list_batches(&self) -> Result<Vec<OrderBatch>, StoreError>;

    /// Move a `pending` batch to `processing` with progress 0. Only one run can
    /// claim a batch: a batch already `processing` gives
    /// [`StoreError::InvalidTransition`], a terminal one
    /// [`StoreError::AlreadyTerminal`].
    async fn claim_batch(&self, batch_id: &str) -> Result<(), StoreError>;

    /// Raise progress (never lowers it) and optionally move the status.
    /// Refused once the batch is terminal.
    async fn update_progress(
        &self,
        batch_id: &str,
        progress: u8,
        status: Option<BatchStatus>,
    ) -> Result<(), StoreError>;

    /// Append per-order results to the persisted list.
    async fn append_results(&self, batch_id: &str, results: &[OrderResult])
        -> Result<(), StoreError>;

    /// Write the terminal state exactly once: full result list, message,
    /// terminal status, progress 100, completion time. A pending cancel
    /// request becomes `Cancelled`.
    async fn finalize(
        &self,
        batch_id: &str,
        results: Vec<OrderResult>,
        message: Option<String>,
        status: BatchStatus,
    ) -> Result<OrderBatch, StoreError>;

    /// Record a cancel request. Idempotent while the batch is live.
    async fn request_cancel(&self, batch_id: &str) -> Result<OrderBatch, StoreError>;

    /// Returns `false` if no record existed.
    async fn delete_batch(&self, batch_id: &str) -> Result<bool, StoreError>;

    /// Clear `configuration_id` on every batch referencing it. Returns the count.
    async fn unlink_configuration(&self, configuration_id: &str) -> Result<u64, StoreError>;
}

pub(crate) fn already_claimed(batch_id: &str, status: BatchStatus) -> StoreError {
    StoreError::InvalidTransition(format!(
        "batch '{batch_id}' is {status}; only a pending batch can be started"
    ))
}

pub(crate) fn check_terminal_status(status: BatchStatus) -> Result<(), StoreError> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition(format!(
            "finalize requires a terminal status, got {status}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Postgres plumbing
// ---------------------------------------------------------------------------

/// Connect to Postgres using OGEN_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_batches_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='order_batches'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_batches_table: exists,
    })
}
