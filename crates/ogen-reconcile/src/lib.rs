//! ogen-reconcile
//!
//! Final-status classification for a batch run.
//!
//! Deterministic, pure logic. No IO. The orchestrator feeds in its counters
//! once the last wave has settled and persists whatever comes out.

use ogen_schemas::BatchStatus;
use serde::{Deserialize, Serialize};

pub const CANCELLED_MESSAGE: &str = "Cancelled by user";
pub const ALL_FAILED_MESSAGE: &str = "All orders failed to create";

/// Terminal status plus the user-facing message stored in `error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub status: BatchStatus,
    pub message: Option<String>,
}

impl Reconciliation {
    fn completed() -> Self {
        Self {
            status: BatchStatus::Completed,
            message: None,
        }
    }

    fn with(status: BatchStatus, message: String) -> Self {
        Self {
            status,
            message: Some(message),
        }
    }
}

/// Classify a finished run.
///
/// `requested` is the clamped order count. `succeeded` and `failed` count the
/// result entries actually recorded; under cancellation their sum may be lower
/// than `requested`.
///
/// Every input maps to one of `completed`, `partial` or `failed`; the result
/// depends on nothing but the arguments.
pub fn reconcile(requested: u32, succeeded: u32, failed: u32, cancelled: bool) -> Reconciliation {
    let all_created = succeeded >= requested && failed == 0;

    if all_created {
        // A cancel that arrived after the last wave changes nothing.
        return Reconciliation::completed();
    }

    match (cancelled, succeeded) {
        (true, 0) => Reconciliation::with(BatchStatus::Failed, CANCELLED_MESSAGE.to_string()),
        (true, x) => Reconciliation::with(
            BatchStatus::Partial,
            format!("{CANCELLED_MESSAGE} - {x} of {requested} orders created"),
        ),
        (false, 0) => Reconciliation::with(BatchStatus::Failed, ALL_FAILED_MESSAGE.to_string()),
        (false, x) => Reconciliation::with(
            BatchStatus::Partial,
            format!("{x} of {requested} orders created successfully"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(status: BatchStatus, message: Option<&str>) -> Reconciliation {
        Reconciliation {
            status,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn cancelled_with_nothing_created_fails() {
        assert_eq!(
            reconcile(10, 0, 0, true),
            r(BatchStatus::Failed, Some("Cancelled by user"))
        );
    }

    #[test]
    fn cancelled_with_some_created_is_partial() {
        assert_eq!(
            reconcile(10, 4, 0, true),
            r(
                BatchStatus::Partial,
                Some("Cancelled by user - 4 of 10 orders created")
            )
        );
        assert_eq!(
            reconcile(10, 4, 2, true).status,
            BatchStatus::Partial,
            "failures do not change the cancelled classification"
        );
    }

    #[test]
    fn everything_created_completes() {
        assert_eq!(reconcile(10, 10, 0, false), r(BatchStatus::Completed, None));
    }

    #[test]
    fn everything_failed_fails() {
        assert_eq!(
            reconcile(10, 0, 10, false),
            r(BatchStatus::Failed, Some("All orders failed to create"))
        );
    }

    #[test]
    fn some_failed_is_partial() {
        assert_eq!(
            reconcile(10, 9, 1, false),
            r(
                BatchStatus::Partial,
                Some("9 of 10 orders created successfully")
            )
        );
    }

    #[test]
    fn late_cancel_after_full_success_completes() {
        assert_eq!(reconcile(5, 5, 0, true), r(BatchStatus::Completed, None));
    }

    #[test]
    fn early_stop_without_failures() {
        assert_eq!(
            reconcile(10, 3, 0, false),
            r(
                BatchStatus::Partial,
                Some("3 of 10 orders created successfully")
            )
        );
        assert_eq!(
            reconcile(10, 0, 0, false),
            r(BatchStatus::Failed, Some("All orders failed to create"))
        );
    }
}
