//! ogen-config
//!
//! Layered YAML settings for the order generator.
//!
//! - Layers merge in order: earlier docs are base, later docs override.
//! - The merged document is canonicalized and hashed (SHA-256) so a batch run
//!   can be tied to the exact settings it used.
//! - Secret-looking literals are refused; secrets are referenced by env var
//!   NAME and resolved once at startup (see [`secrets`]).

pub mod consumption;
pub mod secrets;

use anyhow::{bail, Context, Result};
use ogen_schemas::{Address, ConfigLimits};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;

pub use consumption::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};
pub use secrets::{resolve_secrets, ResolvedSecrets};

/// Known secret-like prefixes. A leaf string starting with any of these aborts
/// loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "shpat_",     // Admin API access token
    "shpca_",     // custom app token
    "shppa_",     // private app token
    "shpss_",     // shared secret
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

/// How `order_delay_secs` is applied once waves run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayPolicy {
    /// Sleep between waves; waves keep their configured width.
    #[default]
    PerWave,
    /// A non-zero delay forces wave width 1, making the delay per-order.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationSettings {
    #[serde(default = "default_creation_width")]
    pub wave_width: usize,
    #[serde(default)]
    pub delay_policy: DelayPolicy,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            wave_width: default_creation_width(),
            delay_policy: DelayPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSettings {
    #[serde(default = "default_deletion_width")]
    pub wave_width: usize,
    #[serde(default = "default_deletion_delay_ms")]
    pub wave_delay_ms: u64,
}

impl Default for DeletionSettings {
    fn default() -> Self {
        Self {
            wave_width: default_deletion_width(),
            wave_delay_ms: default_deletion_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// e.g. `qa-store.myshopify.com`; `None` leaves the remote unconfigured.
    #[serde(default)]
    pub shop_domain: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// NAME of the env var holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            shop_domain: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            token_env: default_token_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub location_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Fully-typed settings deserialized from the merged YAML layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub limits: ConfigLimits,
    #[serde(default)]
    pub creation: CreationSettings,
    #[serde(default)]
    pub deletion: DeletionSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
    /// Warehouse code -> remote location.
    #[serde(default)]
    pub warehouses: BTreeMap<String, Warehouse>,
    /// Shipping address key -> address.
    #[serde(default)]
    pub addresses: BTreeMap<String, Address>,
}

fn default_creation_width() -> usize {
    10
}

fn default_deletion_width() -> usize {
    5
}

fn default_deletion_delay_ms() -> u64 {
    500
}

fn default_api_version() -> String {
    "2024-01".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_token_env() -> String {
    "OGEN_SHOP_TOKEN".to_string()
}

impl Settings {
    /// Deserialize and sanity-check settings from a merged config document.
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let mut s: Settings =
            serde_json::from_value(v.clone()).context("settings deserialize failed")?;
        if s.creation.wave_width == 0 {
            bail!("CONFIG_INVALID: creation.wave_width must be >= 1");
        }
        if s.deletion.wave_width == 0 {
            bail!("CONFIG_INVALID: deletion.wave_width must be >= 1");
        }
        // Deletion waves never run wider than creation waves.
        s.deletion.wave_width = s.deletion.wave_width.min(s.creation.wave_width);
        if s.limits.max_order_count == 0 {
            bail!("CONFIG_INVALID: limits.max_order_count must be >= 1");
        }
        Ok(s)
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn settings(&self) -> Result<Settings> {
        Settings::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

pub const ENV_CONFIG: &str = "OGEN_CONFIG";

/// Load the layers named in `OGEN_CONFIG`. `Ok(None)` when the variable is
/// unset or lists no paths.
pub fn load_from_env() -> Result<Option<LoadedConfig>> {
    let Ok(raw) = std::env::var(ENV_CONFIG) else {
        return Ok(None);
    };
    let layers = split_layer_list(&raw);
    if layers.is_empty() {
        return Ok(None);
    }
    let refs: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml(&refs).map(Some)
}

/// Split a comma-separated layer list (as given in `OGEN_CONFIG`).
pub fn split_layer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is a BTreeMap without `preserve_order`, so key order is sorted.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    consumption::collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
        let s = loaded.settings().unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.creation.wave_width, 10);
        assert_eq!(s.deletion.wave_width, 5);
        assert_eq!(s.limits.max_order_count, 30_000);
        assert_eq!(s.remote.token_env, "OGEN_SHOP_TOKEN");
    }

    #[test]
    fn later_layer_overrides_earlier() {
        let base = "creation:\n  wave_width: 10\ndeletion:\n  wave_delay_ms: 250\n";
        let overlay = "creation:\n  wave_width: 4\n  delay_policy: sequential\n";
        let s = load_layered_yaml_from_strings(&[base, overlay])
            .unwrap()
            .settings()
            .unwrap();
        assert_eq!(s.creation.wave_width, 4);
        assert_eq!(s.creation.delay_policy, DelayPolicy::Sequential);
        assert_eq!(s.deletion.wave_delay_ms, 250);
        // default deletion width (5) capped by the narrower creation width
        assert_eq!(s.deletion.wave_width, 4);
    }

    #[test]
    fn zero_width_rejected() {
        let loaded = load_layered_yaml_from_strings(&["creation:\n  wave_width: 0\n"]).unwrap();
        let err = loaded.settings().unwrap_err().to_string();
        assert!(err.contains("creation.wave_width"), "{err}");
    }

    #[test]
    fn deletion_width_capped_at_creation_width() {
        let explicit = load_layered_yaml_from_strings(&[
            "creation:\n  wave_width: 3\ndeletion:\n  wave_width: 5\n",
        ])
        .unwrap()
        .settings()
        .unwrap();
        assert_eq!(explicit.deletion.wave_width, 3);

        let narrow_creation_only =
            load_layered_yaml_from_strings(&["creation:\n  wave_width: 2\n"])
                .unwrap()
                .settings()
                .unwrap();
        assert_eq!(narrow_creation_only.creation.wave_width, 2);
        assert_eq!(narrow_creation_only.deletion.wave_width, 2);

        let wide = load_layered_yaml_from_strings(&["creation:\n  wave_width: 20\n"])
            .unwrap()
            .settings()
            .unwrap();
        assert_eq!(wide.deletion.wave_width, 5);
    }

    #[test]
    fn address_book_and_warehouses_parse() {
        let yaml = r#"
warehouses:
  WH-EAST:
    location_id: "gid-1"
addresses:
  nyc:
    address1: "1 Main St"
    city: "New York"
    country: "US"
    zip: "10001"
"#;
        let s = load_layered_yaml_from_strings(&[yaml])
            .unwrap()
            .settings()
            .unwrap();
        assert_eq!(s.warehouses["WH-EAST"].location_id, "gid-1");
        assert_eq!(s.addresses["nyc"].city, "New York");
    }

    #[test]
    fn layer_list_split_trims_and_skips_blanks() {
        assert_eq!(
            split_layer_list(" base.yaml, ,local.yaml "),
            vec!["base.yaml".to_string(), "local.yaml".to_string()]
        );
    }
}
