use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ogen_schemas::{
    BatchStatus, CancelSignal, ConfigurationRecord, OrderBatch, OrderConfiguration, OrderResult,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{already_claimed, check_terminal_status, BatchStore, ConfigurationStore, StoreError};

/// Process-local store. Each method holds the write lock for the duration of
/// its merge, which gives the same per-call atomicity as a single SQL UPDATE.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    configurations: RwLock<HashMap<String, ConfigurationRecord>>,
    batches: RwLock<HashMap<String, OrderBatch>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryStore {
    async fn create_configuration(
        &self,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError> {
        let now = Utc::now();
        let rec = ConfigurationRecord {
            id: Uuid::new_v4().to_string(),
            configuration,
            created_at: now,
            updated_at: now,
        };
        self.configurations
            .write()
            .await
            .insert(rec.id.clone(), rec.clone());
        Ok(rec)
    }

    async fn get_configuration(&self, id: &str) -> Result<Option<ConfigurationRecord>, StoreError> {
        Ok(self.configurations.read().await.get(id).cloned())
    }

    async fn list_configurations(&self) -> Result<Vec<ConfigurationRecord>, StoreError> {
        let mut out: Vec<ConfigurationRecord> =
            self.configurations.read().await.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_configuration(
        &self,
        id: &str,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError> {
        let mut map = self.configurations.write().await;
        let rec = map
            .get_mut(id)
            .ok_or_else(|| StoreError::configuration_not_found(id))?;
        rec.configuration = configuration;
        rec.updated_at = Utc::now();
        Ok(rec.clone())
    }

    async fn delete_configuration(&self, id: &str) -> Result<(), StoreError> {
        let in_use = self
            .batches
            .read()
            .await
            .values()
            .any(|b| b.configuration_id.as_deref() == Some(id));
        if in_use {
            return Err(StoreError::ConfigurationInUse(id.to_string()));
        }
        match self.configurations.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::configuration_not_found(id)),
        }
    }
}

#[async_trait]
impl BatchStore for InMemoryStore {
    async fn create_batch(&self, batch: OrderBatch) -> Result<(), StoreError> {
        let mut map = self.batches.write().await;
        if map.contains_key(&batch.batch_id) {
            return Err(StoreError::AlreadyExists {
                kind: "batch",
                id: batch.batch_id,
            });
        }
        map.insert(batch.batch_id.clone(), batch);
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<OrderBatch>, StoreError> {
        Ok(self.batches.read().await.get(batch_id).cloned())
    }

    async fn list_batches(&self) -> Result<Vec<OrderBatch>, StoreError> {
        let mut out: Vec<OrderBatch> = self.batches.read().await.values().cloned().collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.batch_id.cmp(&b.batch_id))
        });
        Ok(out)
    }

    async fn claim_batch(&self, batch_id: &str) -> Result<(), StoreError> {
        let mut map = self.batches.write().await;
        let b = live_batch_mut(&mut map, batch_id)?;
        if b.status != BatchStatus::Pending {
            return Err(already_claimed(batch_id, b.status));
        }
        b.status = BatchStatus::Processing;
        b.progress = 0;
        Ok(())
    }

    async fn update_progress(
        &self,
        batch_id: &str,
        progress: u8,
        status: Option<BatchStatus>,
    ) -> Result<(), StoreError> {
        if let Some(s) = status.filter(BatchStatus::is_terminal) {
            return Err(StoreError::InvalidTransition(format!(
                "update_progress cannot set terminal status {s}; use finalize"
            )));
        }
        let mut map = self.batches.write().await;
        let b = live_batch_mut(&mut map, batch_id)?;
        b.progress = b.progress.max(progress.min(100));
        if let Some(s) = status {
            b.status = s;
        }
        Ok(())
    }

    async fn append_results(
        &self,
        batch_id: &str,
        results: &[OrderResult],
    ) -> Result<(), StoreError> {
        let mut map = self.batches.write().await;
        let b = live_batch_mut(&mut map, batch_id)?;
        b.results.extend_from_slice(results);
        Ok(())
    }

    async fn finalize(
        &self,
        batch_id: &str,
        results: Vec<OrderResult>,
        message: Option<String>,
        status: BatchStatus,
    ) -> Result<OrderBatch, StoreError> {
        check_terminal_status(status)?;
        let mut map = self.batches.write().await;
        let b = live_batch_mut(&mut map, batch_id)?;
        b.results = results;
        b.error_message = message;
        b.status = status;
        b.progress = 100;
        b.completed_at = Some(Utc::now());
        if b.cancel_signal == CancelSignal::CancelRequested {
            b.cancel_signal = CancelSignal::Cancelled;
        }
        Ok(b.clone())
    }

    async fn request_cancel(&self, batch_id: &str) -> Result<OrderBatch, StoreError> {
        let mut map = self.batches.write().await;
        let b = live_batch_mut(&mut map, batch_id)?;
        b.cancel_signal = CancelSignal::CancelRequested;
        Ok(b.clone())
    }

    async fn delete_batch(&self, batch_id: &str) -> Result<bool, StoreError> {
        Ok(self.batches.write().await.remove(batch_id).is_some())
    }

    async fn unlink_configuration(&self, configuration_id: &str) -> Result<u64, StoreError> {
        let mut n = 0;
        for b in self.batches.write().await.values_mut() {
            if b.configuration_id.as_deref() == Some(configuration_id) {
                b.configuration_id = None;
                n += 1;
            }
        }
        Ok(n)
    }
}

/// Look up a batch that may still be mutated.
fn live_batch_mut<'a>(
    map: &'a mut HashMap<String, OrderBatch>,
    batch_id: &str,
) -> Result<&'a mut OrderBatch, StoreError> {
    let b = map
        .get_mut(batch_id)
        .ok_or_else(|| StoreError::batch_not_found(batch_id))?;
    if b.status.is_terminal() {
        return Err(StoreError::AlreadyTerminal {
            batch_id: batch_id.to_string(),
            status: b.status,
        });
    }
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogen_schemas::{CustomerInfo, FailedOrder, LineItem};

    fn config() -> OrderConfiguration {
        OrderConfiguration {
            name: "cfg".to_string(),
            warehouse: "WH".to_string(),
            shipping_address: "home".to_string(),
            line_items: vec![LineItem::new("SKU", 1)],
            customer: CustomerInfo {
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: "a@b.co".to_string(),
            },
            custom_tags: vec![],
            order_count: 2,
            order_delay_secs: 0,
            randomize_data: false,
            notes: None,
        }
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 10))
            .await
            .unwrap();
        s.update_progress("b", 40, Some(BatchStatus::Processing))
            .await
            .unwrap();
        s.update_progress("b", 20, None).await.unwrap();
        let b = s.get_batch("b").await.unwrap().unwrap();
        assert_eq!(b.progress, 40);
        assert_eq!(b.status, BatchStatus::Processing);
    }

    #[tokio::test]
    async fn only_a_pending_batch_can_be_claimed() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 10))
            .await
            .unwrap();
        s.claim_batch("b").await.unwrap();
        let b = s.get_batch("b").await.unwrap().unwrap();
        assert_eq!(b.status, BatchStatus::Processing);
        assert_eq!(b.progress, 0);

        let again = s.claim_batch("b").await;
        assert!(matches!(again, Err(StoreError::InvalidTransition(_))));

        s.finalize("b", vec![], None, BatchStatus::Completed)
            .await
            .unwrap();
        let done = s.claim_batch("b").await;
        assert!(matches!(done, Err(StoreError::AlreadyTerminal { .. })));
        assert!(s.claim_batch("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn progress_write_keeps_cancel_request() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 10))
            .await
            .unwrap();
        s.request_cancel("b").await.unwrap();
        s.update_progress("b", 50, Some(BatchStatus::Processing))
            .await
            .unwrap();
        let b = s.get_batch("b").await.unwrap().unwrap();
        assert_eq!(b.cancel_signal, CancelSignal::CancelRequested);
    }

    #[tokio::test]
    async fn finalize_is_exactly_once() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 1))
            .await
            .unwrap();
        let fin = s
            .finalize(
                "b",
                vec![OrderResult::Failed(FailedOrder::new(1, "x"))],
                Some("All orders failed to create".to_string()),
                BatchStatus::Failed,
            )
            .await
            .unwrap();
        assert_eq!(fin.progress, 100);
        assert!(fin.completed_at.is_some());

        let again = s.finalize("b", vec![], None, BatchStatus::Completed).await;
        assert!(matches!(again, Err(StoreError::AlreadyTerminal { .. })));
        let cancel = s.request_cancel("b").await;
        assert!(matches!(cancel, Err(StoreError::AlreadyTerminal { .. })));
    }

    #[tokio::test]
    async fn finalize_rejects_non_terminal_status() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 1))
            .await
            .unwrap();
        let r = s.finalize("b", vec![], None, BatchStatus::Processing).await;
        assert!(matches!(r, Err(StoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn finalize_marks_requested_cancel_as_cancelled() {
        let s = InMemoryStore::new();
        s.create_batch(OrderBatch::new_pending("b", None, 1))
            .await
            .unwrap();
        s.request_cancel("b").await.unwrap();
        let fin = s
            .finalize(
                "b",
                vec![],
                Some("Cancelled by user".to_string()),
                BatchStatus::Failed,
            )
            .await
            .unwrap();
        assert_eq!(fin.cancel_signal, CancelSignal::Cancelled);
    }

    #[tokio::test]
    async fn missing_batch_is_not_found() {
        let s = InMemoryStore::new();
        let r = s.update_progress("nope", 10, None).await;
        assert!(matches!(r, Err(ref e) if e.is_not_found()));
        assert!(!s.delete_batch("nope").await.unwrap());
    }

    #[tokio::test]
    async fn configuration_delete_requires_unlink() {
        let s = InMemoryStore::new();
        let rec = s.create_configuration(config()).await.unwrap();
        s.create_batch(OrderBatch::new_pending("b", Some(rec.id.clone()), 2))
            .await
            .unwrap();

        let blocked = s.delete_configuration(&rec.id).await;
        assert!(matches!(blocked, Err(StoreError::ConfigurationInUse(_))));

        assert_eq!(s.unlink_configuration(&rec.id).await.unwrap(), 1);
        s.delete_configuration(&rec.id).await.unwrap();

        let b = s.get_batch("b").await.unwrap().unwrap();
        assert_eq!(b.configuration_id, None, "batch survives, only unlinked");
    }

    #[tokio::test]
    async fn update_configuration_bumps_updated_at() {
        let s = InMemoryStore::new();
        let rec = s.create_configuration(config()).await.unwrap();
        let mut changed = config();
        changed.order_count = 9;
        let updated = s.update_configuration(&rec.id, changed).await.unwrap();
        assert_eq!(updated.configuration.order_count, 9);
        assert!(updated.updated_at >= rec.updated_at);
        assert!(s
            .update_configuration("missing", config())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
