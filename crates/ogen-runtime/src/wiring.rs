//! Startup wiring shared by the daemon and the CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ogen_config::{resolve_secrets, report_unused_keys, Settings, UnusedKeyPolicy};
use ogen_remote::{AdminApiClient, RemoteOrderService};

/// Settings from `OGEN_CONFIG` (defaults when unset). Unused keys are logged.
pub fn settings_from_env() -> Result<Settings> {
    match ogen_config::load_from_env()? {
        Some(loaded) => {
            let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
            for ptr in &report.unused_leaf_pointers {
                tracing::warn!(pointer = %ptr, "config key is not used");
            }
            tracing::info!(config_hash = %loaded.config_hash, "settings loaded");
            loaded.settings()
        }
        None => {
            tracing::info!("OGEN_CONFIG not set; using default settings");
            Ok(Settings::default())
        }
    }
}

/// Admin API client from `remote.*` settings and the token env var.
pub fn remote_from_settings(settings: &Settings) -> Result<Arc<dyn RemoteOrderService>> {
    let shop = settings
        .remote
        .shop_domain
        .as_deref()
        .context("CONFIG_INVALID: remote.shop_domain is required")?;
    let secrets = resolve_secrets(settings);
    let token = secrets.require_shop_token()?.to_string();
    let client = AdminApiClient::new(
        shop,
        &settings.remote.api_version,
        token,
        Duration::from_secs(settings.remote.timeout_secs),
    )
    .context("build admin api client")?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_requires_shop_domain() {
        let err = remote_from_settings(&Settings::default())
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("remote.shop_domain"), "{err}");
    }

    #[test]
    fn remote_requires_token_env() {
        let mut s = Settings::default();
        s.remote.shop_domain = Some("qa.example.com".to_string());
        s.remote.token_env = "OGEN_TEST_TOKEN_THAT_IS_NEVER_SET".to_string();
        let err = remote_from_settings(&s).err().unwrap().to_string();
        assert!(err.contains("OGEN_TEST_TOKEN_THAT_IS_NEVER_SET"), "{err}");
    }
}
