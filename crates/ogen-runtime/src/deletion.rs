//! Bulk batch deletion.
//!
//! Batches are processed one after another. With `purge_remote`, each batch's
//! created orders are deleted remotely in small waves with a pause between
//! waves; every order's outcome is isolated. The local record is removed last.
//! Batches that have not reached a terminal status are refused.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use ogen_config::DeletionSettings;
use ogen_db::BatchStore;
use ogen_remote::RemoteOrderService;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDeletionOutcome {
    pub batch_id: String,
    pub success: bool,
    pub remote_deleted: u32,
    pub remote_failed: u32,
    pub local_deleted: bool,
    pub message: Option<String>,
}

impl BatchDeletionOutcome {
    fn failed(batch_id: &str, message: String) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            success: false,
            remote_deleted: 0,
            remote_failed: 0,
            local_deleted: false,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub succeeded: u32,
    pub failed: u32,
    pub per_batch: Vec<BatchDeletionOutcome>,
}

pub struct BulkDeletionOrchestrator {
    remote: Arc<dyn RemoteOrderService>,
    batches: Arc<dyn BatchStore>,
    settings: DeletionSettings,
}

impl BulkDeletionOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteOrderService>,
        batches: Arc<dyn BatchStore>,
        settings: DeletionSettings,
    ) -> Self {
        Self {
            remote,
            batches,
            settings,
        }
    }

    /// Never fails as a whole; every problem is recorded per batch.
    pub async fn delete_batches(&self, batch_ids: &[String], purge_remote: bool) -> DeletionReport {
        let mut report = DeletionReport::default();
        for id in batch_ids {
            let outcome = self.delete_one_batch(id, purge_remote).await;
            if outcome.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.per_batch.push(outcome);
        }
        tracing::info!(
            requested = batch_ids.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            purge_remote,
            "bulk delete finished"
        );
        report
    }

    async fn delete_one_batch(&self, batch_id: &str, purge_remote: bool) -> BatchDeletionOutcome {
        let batch = match self.batches.get_batch(batch_id).await {
            Ok(Some(b)) => b,
            Ok(None) => return BatchDeletionOutcome::failed(batch_id, "batch not found".into()),
            Err(e) => return BatchDeletionOutcome::failed(batch_id, e.to_string()),
        };
        // A live run may still be creating orders the purge would never see.
        if !batch.status.is_terminal() {
            tracing::warn!(batch_id, status = %batch.status, "refusing to delete a running batch");
            return BatchDeletionOutcome::failed(
                batch_id,
                "batch is still running; cancel it first".into(),
            );
        }

        let (mut remote_deleted, mut remote_failed) = (0u32, 0u32);
        if purge_remote {
            let ids: Vec<&str> = batch.created_orders().map(|o| o.remote_id.as_str()).collect();
            let width = self.settings.wave_width.max(1);
            let pause = Duration::from_millis(self.settings.wave_delay_ms);
            let waves: Vec<&[&str]> = ids.chunks(width).collect();
            for (i, wave) in waves.iter().enumerate() {
                let outcomes = join_all(wave.iter().map(|id| self.delete_remote(batch_id, id))).await;
                for ok in outcomes {
                    if ok {
                        remote_deleted += 1;
                    } else {
                        remote_failed += 1;
                    }
                }
                if i + 1 < waves.len() && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
        }

        let (local_deleted, success, message) = match self.batches.delete_batch(batch_id).await {
            Ok(true) => {
                let msg = (remote_failed > 0)
                    .then(|| format!("{remote_failed} remote orders could not be deleted"));
                (true, true, msg)
            }
            Ok(false) => (false, false, Some("batch not found".to_string())),
            Err(e) => {
                tracing::warn!(batch_id, remote_deleted, error = %e, "local delete failed after remote purge");
                (
                    false,
                    false,
                    Some(format!(
                        "local delete failed after deleting {remote_deleted} remote orders: {e}"
                    )),
                )
            }
        };

        BatchDeletionOutcome {
            batch_id: batch_id.to_string(),
            success,
            remote_deleted,
            remote_failed,
            local_deleted,
            message,
        }
    }

    /// `true` when the order is gone remotely (deleted now or before).
    async fn delete_remote(&self, batch_id: &str, remote_id: &str) -> bool {
        if remote_id.trim().is_empty() {
            tracing::warn!(batch_id, "created order without remote id; skipping");
            return false;
        }
        match self.remote.delete_order(remote_id).await {
            Ok(outcome) if outcome.success => true,
            Ok(outcome) => {
                tracing::warn!(batch_id, remote_id, message = %outcome.message, "remote delete refused");
                false
            }
            Err(e) => {
                tracing::warn!(batch_id, remote_id, error = %e, "remote delete failed");
                false
            }
        }
    }
}
