//! Config hash stability.
//!
//! GREEN when:
//! - identical inputs produce identical hashes,
//! - key order inside a layer does not change the hash,
//! - a changed value changes the hash,
//! - file-based loading matches string-based loading.

use std::io::Write;

use ogen_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
creation:
  wave_width: 10
  delay_policy: per_wave
deletion:
  wave_width: 5
  wave_delay_ms: 500
remote:
  shop_domain: "qa-store.myshopify.com"
  token_env: "OGEN_SHOP_TOKEN"
"#;

const BASE_YAML_REORDERED: &str = r#"
remote:
  token_env: "OGEN_SHOP_TOKEN"
  shop_domain: "qa-store.myshopify.com"
deletion:
  wave_delay_ms: 500
  wave_width: 5
creation:
  delay_policy: per_wave
  wave_width: 10
"#;

const OVERLAY_YAML: &str = r#"
creation:
  wave_width: 4
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordered keys must canonicalize to the same hash"
    );
}

#[test]
fn overlay_changes_hash_and_value() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    let settings = merged.settings().unwrap();
    assert_eq!(settings.creation.wave_width, 4);
    assert_eq!(settings.deletion.wave_width, 4, "capped by creation width");
    assert_eq!(merged.config_hash.len(), 64, "sha256 hex");
}

#[test]
fn file_loading_matches_string_loading() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let overlay_path = dir.path().join("overlay.yaml");
    std::fs::File::create(&base_path)
        .unwrap()
        .write_all(BASE_YAML.as_bytes())
        .unwrap();
    std::fs::File::create(&overlay_path)
        .unwrap()
        .write_all(OVERLAY_YAML.as_bytes())
        .unwrap();

    let from_files = load_layered_yaml(&[
        base_path.to_str().unwrap(),
        overlay_path.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_an_error_naming_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/definitely/not/here.yaml"), "{err}");
}
