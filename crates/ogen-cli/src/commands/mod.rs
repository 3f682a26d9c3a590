//! Command handler modules for ogen-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod batch;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use ogen_config::{report_unused_keys, Settings, UnusedKeyPolicy};
use ogen_db::{BatchStore, ConfigurationStore, InMemoryStore, PgStore};
use ogen_schemas::OrderConfiguration;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load settings from explicit layers, or from `OGEN_CONFIG` when none are given.
/// Unused keys are reported on stderr and do not fail the command.
pub fn load_settings(config_paths: &[String]) -> Result<Settings> {
    if config_paths.is_empty() {
        return ogen_runtime::wiring::settings_from_env();
    }
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = ogen_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }
    loaded.settings()
}

/// Parse an order configuration template, stripping a UTF-8 BOM if present.
pub fn load_template(path: &str) -> Result<OrderConfiguration> {
    let bytes = fs::read(path).with_context(|| format!("read template failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("template must be UTF-8 text")?;
    serde_yaml::from_str(raw).with_context(|| format!("template is not a valid configuration: {}", path))
}

pub struct Stores {
    pub configurations: Arc<dyn ConfigurationStore>,
    pub batches: Arc<dyn BatchStore>,
}

/// Postgres stores; the commands that read existing batches need a shared database.
pub async fn pg_stores() -> Result<Stores> {
    let pool = ogen_db::connect_from_env().await?;
    let store = Arc::new(PgStore::new(pool));
    Ok(Stores {
        configurations: store.clone(),
        batches: store,
    })
}

/// Postgres when `OGEN_DATABASE_URL` is set (migrated), else in-memory.
pub async fn stores_from_env() -> Result<Stores> {
    if std::env::var(ogen_db::ENV_DB_URL).is_ok() {
        let pool = ogen_db::connect_from_env().await?;
        ogen_db::migrate(&pool).await?;
        let store = Arc::new(PgStore::new(pool));
        return Ok(Stores {
            configurations: store.clone(),
            batches: store,
        });
    }
    eprintln!(
        "WARN: {} not set; batch record is kept in memory for this run only",
        ogen_db::ENV_DB_URL
    );
    let store = Arc::new(InMemoryStore::new());
    Ok(Stores {
        configurations: store.clone(),
        batches: store,
    })
}
