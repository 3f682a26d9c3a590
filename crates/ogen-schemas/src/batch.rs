use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BatchStatus
// ---------------------------------------------------------------------------

/// Persisted batch status. Kept to five values; cancellation is tracked in
/// [`CancelSignal`] rather than by overloading `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchStatus::Pending),
            "processing" => Some(BatchStatus::Processing),
            "completed" => Some(BatchStatus::Completed),
            "failed" => Some(BatchStatus::Failed),
            "partial" => Some(BatchStatus::Partial),
            _ => None,
        }
    }

    /// Completed, failed and partial batches never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Partial
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CancelSignal
// ---------------------------------------------------------------------------

/// Out-of-band cancellation state stored alongside the status.
///
/// `Active -> CancelRequested` is written by the cancel request;
/// `CancelRequested -> Cancelled` is written by the orchestrator when it
/// finalizes after observing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelSignal {
    #[default]
    Active,
    CancelRequested,
    Cancelled,
}

impl CancelSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelSignal::Active => "active",
            CancelSignal::CancelRequested => "cancel_requested",
            CancelSignal::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CancelSignal::Active),
            "cancel_requested" => Some(CancelSignal::CancelRequested),
            "cancelled" => Some(CancelSignal::Cancelled),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-order results
// ---------------------------------------------------------------------------

/// A successfully created remote order, echoed back into the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order_index: u32,
    pub remote_id: String,
    pub order_number: String,
    pub total_price: String,
    pub tags: String,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Set when the order exists but could not be moved to the warehouse location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_warning: Option<String>,
}

/// A failed create attempt. `error` is always `true` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOrder {
    pub error: bool,
    pub order_index: u32,
    pub message: String,
}

impl FailedOrder {
    pub fn new<S: Into<String>>(order_index: u32, message: S) -> Self {
        Self {
            error: true,
            order_index,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderResult {
    Failed(FailedOrder),
    Created(CreatedOrder),
}

impl OrderResult {
    pub fn order_index(&self) -> u32 {
        match self {
            OrderResult::Created(c) => c.order_index,
            OrderResult::Failed(f) => f.order_index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OrderResult::Created(_))
    }

    pub fn as_created(&self) -> Option<&CreatedOrder> {
        match self {
            OrderResult::Created(c) => Some(c),
            OrderResult::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderBatch
// ---------------------------------------------------------------------------

/// One "create N orders" invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch {
    pub batch_id: String,
    pub configuration_id: Option<String>,
    pub order_count: u32,
    pub status: BatchStatus,
    /// 0..=100
    pub progress: u8,
    pub results: Vec<OrderResult>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub cancel_signal: CancelSignal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderBatch {
    pub fn new_pending<S: Into<String>>(
        batch_id: S,
        configuration_id: Option<String>,
        order_count: u32,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            configuration_id,
            order_count,
            status: BatchStatus::Pending,
            progress: 0,
            results: Vec::new(),
            error_message: None,
            cancel_signal: CancelSignal::Active,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }

    pub fn created_orders(&self) -> impl Iterator<Item = &CreatedOrder> {
        self.results.iter().filter_map(OrderResult::as_created)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_signal == CancelSignal::CancelRequested
    }
}

/// Externally visible batch identifier: `batch_<unix millis>_<8 hex>`.
pub fn new_batch_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("batch_{}_{}", Utc::now().timestamp_millis(), &simple[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            BatchStatus::Pending,
            BatchStatus::Processing,
            BatchStatus::Completed,
            BatchStatus::Failed,
            BatchStatus::Partial,
        ] {
            assert_eq!(BatchStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(BatchStatus::parse("cancelled"), None);
    }

    #[test]
    fn only_final_states_are_terminal() {
        assert!(!BatchStatus::Pending.is_terminal());
        assert!(!BatchStatus::Processing.is_terminal());
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Partial.is_terminal());
    }

    #[test]
    fn failed_result_serializes_with_error_flag() {
        let r = OrderResult::Failed(FailedOrder::new(7, "boom"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["error"], true);
        assert_eq!(v["order_index"], 7);
        assert_eq!(v["message"], "boom");
    }

    #[test]
    fn untagged_results_decode_to_the_right_variant() {
        let failed: OrderResult =
            serde_json::from_str(r#"{"error":true,"order_index":3,"message":"x"}"#).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.order_index(), 3);

        let created: OrderResult = serde_json::from_str(
            r##"{"order_index":1,"remote_id":"55","order_number":"#1001","total_price":"9.99","tags":"qa"}"##,
        )
        .unwrap();
        assert!(created.is_success());
        assert_eq!(created.as_created().unwrap().remote_id, "55");
    }

    #[test]
    fn counts_split_success_and_failure() {
        let mut b = OrderBatch::new_pending("b1", None, 3);
        b.results.push(OrderResult::Failed(FailedOrder::new(2, "nope")));
        b.results.push(OrderResult::Created(CreatedOrder {
            order_index: 1,
            remote_id: "1".to_string(),
            order_number: "#1".to_string(),
            total_price: "1.00".to_string(),
            tags: String::new(),
            financial_status: None,
            fulfillment_status: None,
            created_at: None,
            location_warning: None,
        }));
        assert_eq!(b.succeeded_count(), 1);
        assert_eq!(b.failed_count(), 1);
        assert_eq!(b.created_orders().count(), 1);
    }

    #[test]
    fn batch_ids_are_unique_and_prefixed() {
        let a = new_batch_id();
        let b = new_batch_id();
        assert!(a.starts_with("batch_"));
        assert_ne!(a, b);
    }
}
