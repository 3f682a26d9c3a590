//! ogen-daemon entry point.
//!
//! Sets up tracing, resolves settings and the remote client (fail-closed),
//! picks a store backend, wires middleware and starts the HTTP server. Route
//! handlers live in `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ogen_daemon::{routes, state};
use ogen_db::{BatchStore, ConfigurationStore, InMemoryStore, PgStore};
use ogen_runtime::wiring;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_DAEMON_ADDR: &str = "OGEN_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = wiring::settings_from_env().context("load settings")?;
    let remote = wiring::remote_from_settings(&settings).context("remote order service")?;
    let (configurations, batches) = stores_from_env().await?;

    let shared = Arc::new(state::AppState::new(
        settings,
        configurations,
        batches,
        remote,
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("ogen-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

type Stores = (Arc<dyn ConfigurationStore>, Arc<dyn BatchStore>);

/// Postgres when `OGEN_DATABASE_URL` is set (migrations applied), else
/// process-local memory.
async fn stores_from_env() -> anyhow::Result<Stores> {
    if std::env::var(ogen_db::ENV_DB_URL).is_ok() {
        let pool = ogen_db::connect_from_env().await?;
        ogen_db::migrate(&pool).await?;
        info!("using postgres stores");
        let store = Arc::new(PgStore::new(pool));
        Ok((store.clone(), store))
    } else {
        warn!(
            "{} not set; batches and configurations live in memory only",
            ogen_db::ENV_DB_URL
        );
        let store = Arc::new(InMemoryStore::new());
        Ok((store.clone(), store))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
