//! Shared runtime state for ogen-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Stores, the remote
//! client and both orchestrators are built once here and shared.

use std::sync::Arc;
use std::time::Duration;

use ogen_config::Settings;
use ogen_db::{BatchStore, ConfigurationStore, InMemoryStore};
use ogen_remote::RemoteOrderService;
use ogen_runtime::{
    BatchOrchestrator, BulkDeletionOrchestrator, ProductCache, ProgressEvent, ProgressSink,
};
use ogen_schemas::BatchStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    BatchProgress {
        batch_id: String,
        progress: u8,
        attempted: u32,
        succeeded: u32,
        failed: u32,
    },
    BatchFinished {
        batch_id: String,
        status: BatchStatus,
        message: Option<String>,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::BatchProgress { .. } => "batch_progress",
            BusMsg::BatchFinished { .. } => "batch_finished",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

impl From<ProgressEvent> for BusMsg {
    fn from(e: ProgressEvent) -> Self {
        match e {
            ProgressEvent::Progress {
                batch_id,
                progress,
                attempted,
                succeeded,
                failed,
            } => BusMsg::BatchProgress {
                batch_id,
                progress,
                attempted,
                succeeded,
                failed,
            },
            ProgressEvent::Finished {
                batch_id,
                status,
                message,
            } => BusMsg::BatchFinished {
                batch_id,
                status,
                message,
            },
        }
    }
}

/// Forwards orchestrator events onto the bus. Send errors (no subscribers)
/// are ignored.
pub struct BusSink(pub broadcast::Sender<BusMsg>);

impl ProgressSink for BusSink {
    fn publish(&self, event: ProgressEvent) {
        let _ = self.0.send(event.into());
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub settings: Arc<Settings>,
    pub configurations: Arc<dyn ConfigurationStore>,
    pub batches: Arc<dyn BatchStore>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub deleter: Arc<BulkDeletionOrchestrator>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        configurations: Arc<dyn ConfigurationStore>,
        batches: Arc<dyn BatchStore>,
        remote: Arc<dyn RemoteOrderService>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let settings = Arc::new(settings);
        let cache = Arc::new(ProductCache::new(remote.clone()));

        let orchestrator = BatchOrchestrator::new(
            remote.clone(),
            batches.clone(),
            cache,
            settings.clone(),
        )
        .with_progress_sink(Arc::new(BusSink(bus.clone())));
        let deleter =
            BulkDeletionOrchestrator::new(remote, batches.clone(), settings.deletion.clone());

        Self {
            bus,
            build: BuildInfo {
                service: "ogen-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            settings,
            configurations,
            batches,
            orchestrator: Arc::new(orchestrator),
            deleter: Arc::new(deleter),
        }
    }

    /// Both stores backed by one process-local [`InMemoryStore`].
    pub fn in_memory(settings: Settings, remote: Arc<dyn RemoteOrderService>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(settings, store.clone(), store, remote)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
