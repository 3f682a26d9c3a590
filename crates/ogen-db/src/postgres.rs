use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ogen_schemas::{
    BatchStatus, CancelSignal, ConfigurationRecord, OrderBatch, OrderConfiguration, OrderResult,
};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{already_claimed, check_terminal_status, BatchStore, ConfigurationStore, StoreError};

const BATCH_COLUMNS: &str = "batch_id, configuration_id, order_count, status, progress, results, \
                             error_message, cancel_signal, created_at, completed_at";

const TERMINAL_STATUSES: &str = "('completed','failed','partial')";

/// Postgres-backed store. Each mutation is one UPDATE guarded by
/// `status not in (terminal)`, so concurrent writers merge at column level.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Distinguish "missing" from "terminal" after a guarded UPDATE touched no row.
    async fn explain_untouched(&self, batch_id: &str) -> StoreError {
        match self.get_batch(batch_id).await {
            Ok(Some(b)) => StoreError::AlreadyTerminal {
                batch_id: batch_id.to_string(),
                status: b.status,
            },
            Ok(None) => StoreError::batch_not_found(batch_id),
            Err(e) => e,
        }
    }
}

fn decode_configuration(row: &PgRow) -> Result<ConfigurationRecord, StoreError> {
    let body: Value = row.try_get("body")?;
    Ok(ConfigurationRecord {
        id: row.try_get("id")?,
        configuration: serde_json::from_value(body)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_batch(row: &PgRow) -> Result<OrderBatch, StoreError> {
    let status_s: String = row.try_get("status")?;
    let status = BatchStatus::parse(&status_s)
        .ok_or_else(|| StoreError::Backend(format!("invalid batch status: {status_s}")))?;
    let cancel_s: String = row.try_get("cancel_signal")?;
    let cancel_signal = CancelSignal::parse(&cancel_s)
        .ok_or_else(|| StoreError::Backend(format!("invalid cancel signal: {cancel_s}")))?;
    let order_count: i32 = row.try_get("order_count")?;
    let progress: i16 = row.try_get("progress")?;
    let results: Value = row.try_get("results")?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at")?;

    Ok(OrderBatch {
        batch_id: row.try_get("batch_id")?,
        configuration_id: row.try_get("configuration_id")?,
        order_count: u32::try_from(order_count)
            .map_err(|_| StoreError::Backend(format!("negative order_count {order_count}")))?,
        status,
        progress: progress.clamp(0, 100) as u8,
        results: serde_json::from_value(results)?,
        error_message: row.try_get("error_message")?,
        cancel_signal,
        created_at: row.try_get("created_at")?,
        completed_at,
    })
}

#[async_trait]
impl ConfigurationStore for PgStore {
    async fn create_configuration(
        &self,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_value(&configuration)?;
        let row = sqlx::query(
            r#"
            insert into order_configurations (id, name, body)
            values ($1, $2, $3)
            returning id, body, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&configuration.name)
        .bind(&body)
        .fetch_one(&self.pool)
        .await?;
        decode_configuration(&row)
    }

    async fn get_configuration(&self, id: &str) -> Result<Option<ConfigurationRecord>, StoreError> {
        let row = sqlx::query(
            "select id, body, created_at, updated_at from order_configurations where id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode_configuration).transpose()
    }

    async fn list_configurations(&self) -> Result<Vec<ConfigurationRecord>, StoreError> {
        let rows = sqlx::query(
            "select id, body, created_at, updated_at from order_configurations \
             order by created_at desc, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_configuration).collect()
    }

    async fn update_configuration(
        &self,
        id: &str,
        configuration: OrderConfiguration,
    ) -> Result<ConfigurationRecord, StoreError> {
        let body = serde_json::to_value(&configuration)?;
        let row = sqlx::query(
            r#"
            update order_configurations
            set name = $2, body = $3, updated_at = now()
            where id = $1
            returning id, body, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&configuration.name)
        .bind(&body)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => decode_configuration(&r),
            None => Err(StoreError::configuration_not_found(id)),
        }
    }

    async fn delete_configuration(&self, id: &str) -> Result<(), StoreError> {
        let (refs,): (i64,) = sqlx::query_as(
            "select count(*)::bigint from order_batches where configuration_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        if refs > 0 {
            return Err(StoreError::ConfigurationInUse(id.to_string()));
        }

        let res = sqlx::query("delete from order_configurations where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::configuration_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl BatchStore for PgStore {
    async fn create_batch(&self, batch: OrderBatch) -> Result<(), StoreError> {
        let results = serde_json::to_value(&batch.results)?;
        let res = sqlx::query(
            r#"
            insert into order_batches (
              batch_id, configuration_id, order_count, status, progress, results,
              error_message, cancel_signal, created_at, completed_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            on conflict (batch_id) do nothing
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.configuration_id)
        .bind(batch.order_count as i32)
        .bind(batch.status.as_str())
        .bind(batch.progress as i16)
        .bind(&results)
        .bind(&batch.error_message)
        .bind(batch.cancel_signal.as_str())
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                kind: "batch",
                id: batch.batch_id,
            });
        }
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<OrderBatch>, StoreError> {
        let sql = format!("select {BATCH_COLUMNS} from order_batches where batch_id = $1");
        let row = sqlx::query(&sql)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_batch).transpose()
    }

    async fn list_batches(&self) -> Result<Vec<OrderBatch>, StoreError> {
        let sql =
            format!("select {BATCH_COLUMNS} from order_batches order by created_at desc, batch_id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_batch).collect()
    }

    async fn claim_batch(&self, batch_id: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update order_batches
            set status = 'processing', progress = 0
            where batch_id = $1 and status = 'pending'
            "#,
        )
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(match self.get_batch(batch_id).await? {
                Some(b) if !b.status.is_terminal() => already_claimed(batch_id, b.status),
                _ => self.explain_untouched(batch_id).await,
            });
        }
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
        let sql = format!(
            r#"
            update order_batches
            set progress = greatest(progress, $2),
                status = coalesce($3, status)
            where batch_id = $1 and status not in {TERMINAL_STATUSES}
            "#
        );
        let res = sqlx::query(&sql)
            .bind(batch_id)
            .bind(progress.min(100) as i16)
            .bind(status.map(|s| s.as_str()))
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(self.explain_untouched(batch_id).await);
        }
        Ok(())
    }

    async fn append_results(
        &self,
        batch_id: &str,
        results: &[OrderResult],
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_value(results)?;
        let sql = format!(
            r#"
            update order_batches
            set results = results || $2::jsonb
            where batch_id = $1 and status not in {TERMINAL_STATUSES}
            "#
        );
        let res = sqlx::query(&sql)
            .bind(batch_id)
            .bind(&payload)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(self.explain_untouched(batch_id).await);
        }
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
        let payload = serde_json::to_value(&results)?;
        let sql = format!(
            r#"
            update order_batches
            set results = $2,
                error_message = $3,
                status = $4,
                progress = 100,
                completed_at = now(),
                cancel_signal = case when cancel_signal = 'cancel_requested'
                                     then 'cancelled' else cancel_signal end
            where batch_id = $1 and status not in {TERMINAL_STATUSES}
            returning {BATCH_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(batch_id)
            .bind(&payload)
            .bind(&message)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => decode_batch(&r),
            None => Err(self.explain_untouched(batch_id).await),
        }
    }

    async fn request_cancel(&self, batch_id: &str) -> Result<OrderBatch, StoreError> {
        let sql = format!(
            r#"
            update order_batches
            set cancel_signal = 'cancel_requested'
            where batch_id = $1 and status not in {TERMINAL_STATUSES}
            returning {BATCH_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => decode_batch(&r),
            None => Err(self.explain_untouched(batch_id).await),
        }
    }

    async fn delete_batch(&self, batch_id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("delete from order_batches where batch_id = $1")
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn unlink_configuration(&self, configuration_id: &str) -> Result<u64, StoreError> {
        let res = sqlx::query(
            "update order_batches set configuration_id = null where configuration_id = $1",
        )
        .bind(configuration_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
