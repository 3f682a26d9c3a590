//! Batch creation orchestrator.
//!
//! One run per batch. Orders are issued in waves of bounded width; every wave
//! is a barrier. Between waves the orchestrator re-reads the batch record (to
//! pick up cancel requests), appends the wave's results, raises progress and
//! optionally sleeps. Per-order remote failures become failure entries and
//! never abort the run; only storage-level errors do.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use ogen_config::{DelayPolicy, Settings};
use ogen_db::{BatchStore, StoreError};
use ogen_reconcile::{reconcile, Reconciliation};
use ogen_remote::RemoteOrderService;
use ogen_schemas::{BatchStatus, CreatedOrder, FailedOrder, OrderConfiguration, OrderResult};
use serde::Serialize;

use crate::cache::ProductCache;
use crate::location::LocationChain;
use crate::template::{OrderTemplate, TemplateError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that abort a run. The batch is finalized `failed` with the message.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("batch '{0}' disappeared during the run")]
    BatchVanished(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        batch_id: String,
        progress: u8,
        attempted: u32,
        succeeded: u32,
        failed: u32,
    },
    Finished {
        batch_id: String,
        status: BatchStatus,
        message: Option<String>,
    },
}

/// Receives progress events. Publishing must not block.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn publish(&self, _event: ProgressEvent) {}
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRunSummary {
    pub batch_id: String,
    pub status: BatchStatus,
    pub message: Option<String>,
    pub requested: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub had_errors: bool,
    pub cancelled: bool,
    pub results: Vec<OrderResult>,
}

/// `round(attempted / requested * 100)` in integer arithmetic, capped at 100.
pub fn progress_percent(attempted: u32, requested: u32) -> u8 {
    if requested == 0 {
        return 100;
    }
    let pct = (u64::from(attempted) * 200 + u64::from(requested)) / (2 * u64::from(requested));
    pct.min(100) as u8
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct BatchOrchestrator {
    remote: Arc<dyn RemoteOrderService>,
    batches: Arc<dyn BatchStore>,
    cache: Arc<ProductCache>,
    settings: Arc<Settings>,
    locations: LocationChain,
    events: Arc<dyn ProgressSink>,
}

impl BatchOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteOrderService>,
        batches: Arc<dyn BatchStore>,
        cache: Arc<ProductCache>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            remote,
            batches,
            cache,
            settings,
            locations: LocationChain::default(),
            events: Arc::new(NoopProgressSink),
        }
    }

    pub fn with_progress_sink(mut self, events: Arc<dyn ProgressSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_location_chain(mut self, locations: LocationChain) -> Self {
        self.locations = locations;
        self
    }

    /// Wave width and inter-wave delay for a configuration.
    pub fn wave_plan(&self, config: &OrderConfiguration) -> (usize, Duration) {
        let delay_secs = config
            .order_delay_secs
            .min(self.settings.limits.max_order_delay_secs);
        let delay = Duration::from_secs(u64::from(delay_secs));
        let width = match self.settings.creation.delay_policy {
            DelayPolicy::Sequential if !delay.is_zero() => 1,
            _ => self.settings.creation.wave_width.max(1),
        };
        (width, delay)
    }

    /// Drive one batch to a terminal state.
    ///
    /// The batch record must exist and be `pending`; a batch another run has
    /// already claimed is refused untouched. On a later orchestrator error the
    /// batch is finalized `failed` with the error text, keeping whatever
    /// results were produced, and the error is returned.
    pub async fn run_batch(
        &self,
        config: &OrderConfiguration,
        batch_id: &str,
    ) -> Result<BatchRunSummary, OrchestratorError> {
        self.batches.claim_batch(batch_id).await?;

        let mut results: Vec<OrderResult> = Vec::new();
        match self.run_waves(config, batch_id, &mut results).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                let msg = e.to_string();
                tracing::error!(batch_id, error = %msg, "batch run aborted");
                match self
                    .batches
                    .finalize(batch_id, results, Some(msg.clone()), BatchStatus::Failed)
                    .await
                {
                    Ok(_) => self.events.publish(ProgressEvent::Finished {
                        batch_id: batch_id.to_string(),
                        status: BatchStatus::Failed,
                        message: Some(msg),
                    }),
                    Err(fe) => {
                        tracing::warn!(batch_id, error = %fe, "could not mark aborted batch failed")
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_waves(
        &self,
        config: &OrderConfiguration,
        batch_id: &str,
        results: &mut Vec<OrderResult>,
    ) -> Result<BatchRunSummary, OrchestratorError> {
        let requested = self.settings.limits.clamp_order_count(config.order_count);
        let (width, delay) = self.wave_plan(config);

        let cleared = self.cache.clear_misses().await;
        if cleared > 0 {
            tracing::debug!(batch_id, cleared, "cleared cached sku misses");
        }
        let template = OrderTemplate::build(config, batch_id, &self.settings, &self.cache).await?;

        tracing::info!(
            batch_id,
            requested,
            width,
            delay_secs = delay.as_secs(),
            unresolved = template.unresolved.len(),
            "batch run started"
        );

        let mut attempted: u32 = 0;
        let mut succeeded: u32 = 0;
        let mut cancelled = false;
        let mut wave_no: u32 = 0;

        while attempted < requested {
            let batch = self
                .batches
                .get_batch(batch_id)
                .await?
                .ok_or_else(|| OrchestratorError::BatchVanished(batch_id.to_string()))?;
            if batch.is_cancel_requested() {
                tracing::info!(batch_id, attempted, "cancel requested; no further waves");
                cancelled = true;
                break;
            }

            wave_no += 1;
            let end = attempted.saturating_add(width as u32).min(requested);
            let wave: Vec<OrderResult> = join_all(
                (attempted + 1..=end).map(|idx| self.create_one(&template, batch_id, idx)),
            )
            .await;

            let wave_ok = wave.iter().filter(|r| r.is_success()).count() as u32;
            self.batches.append_results(batch_id, &wave).await?;
            results.extend(wave);
            succeeded += wave_ok;
            attempted = end;

            let progress = progress_percent(attempted, requested);
            self.batches.update_progress(batch_id, progress, None).await?;
            self.events.publish(ProgressEvent::Progress {
                batch_id: batch_id.to_string(),
                progress,
                attempted,
                succeeded,
                failed: attempted - succeeded,
            });
            tracing::info!(
                batch_id,
                wave = wave_no,
                attempted,
                succeeded,
                progress,
                "wave complete"
            );

            if attempted < requested && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let failed = results.len() as u32 - succeeded;
        let Reconciliation { status, message } = reconcile(requested, succeeded, failed, cancelled);
        self.batches
            .finalize(batch_id, results.clone(), message.clone(), status)
            .await?;
        self.events.publish(ProgressEvent::Finished {
            batch_id: batch_id.to_string(),
            status,
            message: message.clone(),
        });
        tracing::info!(batch_id, %status, succeeded, failed, cancelled, "batch finalized");

        Ok(BatchRunSummary {
            batch_id: batch_id.to_string(),
            status,
            message,
            requested,
            succeeded,
            failed,
            had_errors: failed > 0,
            cancelled,
            results: std::mem::take(results),
        })
    }

    async fn create_one(&self, template: &OrderTemplate, batch_id: &str, idx: u32) -> OrderResult {
        let payload = template.payload_for(idx);
        match self.remote.create_order(&payload).await {
            Ok(order) => {
                let location_warning = match &template.location_id {
                    Some(loc) => self.locations.assign(self.remote.as_ref(), &order.id, loc).await,
                    None => None,
                };
                OrderResult::Created(CreatedOrder {
                    order_index: idx,
                    remote_id: order.id,
                    order_number: order.order_number,
                    total_price: order.total_price,
                    tags: order.tags,
                    financial_status: order.financial_status,
                    fulfillment_status: order.fulfillment_status,
                    created_at: order.created_at,
                    location_warning,
                })
            }
            Err(e) => {
                tracing::warn!(batch_id, order_index = idx, error = %e, "order create failed");
                OrderResult::Failed(FailedOrder::new(idx, e.to_string()))
            }
        }
    }
}
