//! ogen-runtime
//!
//! The batch engine: turns one order configuration into N remote create
//! calls, and a set of batch ids back into remote delete calls.
//!
//! Layout:
//! - [`cache`]: SKU -> variant memoization with per-key single-flight
//! - [`template`]: per-batch order template and per-order payloads
//! - [`location`]: ordered warehouse assignment strategies
//! - [`orchestrator`]: wave-based creation with cancellation and progress
//! - [`deletion`]: wave-based remote purge plus local record removal
//! - [`export`]: CSV rendering of batch results
//! - [`wiring`]: settings and remote client construction for binaries
//!
//! Everything remote goes through `ogen_remote::RemoteOrderService` and
//! everything persistent through `ogen_db::BatchStore`.

pub mod cache;
pub mod deletion;
pub mod export;
pub mod location;
pub mod orchestrator;
pub mod template;
pub mod wiring;

#[cfg(test)]
mod test_support;

pub use cache::ProductCache;
pub use deletion::{BatchDeletionOutcome, BulkDeletionOrchestrator, DeletionReport};
pub use export::results_to_csv;
pub use location::{
    AlreadyAtLocation, LocationChain, LocationError, LocationStrategy, MoveFulfillmentOrders,
};
pub use orchestrator::{
    BatchOrchestrator, BatchRunSummary, NoopProgressSink, OrchestratorError, ProgressEvent,
    ProgressSink,
};
pub use template::OrderTemplate;
