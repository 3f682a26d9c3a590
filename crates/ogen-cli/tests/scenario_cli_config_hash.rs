use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p.to_string_lossy().to_string()
}

#[test]
fn config_hash_is_stable_across_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.yaml", "creation:\n  wave_width: 4\nlimits:\n  max_order_count: 100\n");
    let b = write(&dir, "b.yaml", "limits:\n  max_order_count: 100\ncreation:\n  wave_width: 4\n");

    let out_a = Command::cargo_bin("ogen")
        .unwrap()
        .args(["config-hash", &a])
        .output()
        .unwrap();
    let out_b = Command::cargo_bin("ogen")
        .unwrap()
        .args(["config-hash", &b])
        .output()
        .unwrap();
    assert!(out_a.status.success());
    assert!(out_b.status.success());

    let first_line = |o: &std::process::Output| {
        String::from_utf8_lossy(&o.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    };
    let ha = first_line(&out_a);
    assert!(ha.starts_with("config_hash="), "{ha}");
    assert_eq!(ha.len(), "config_hash=".len() + 64);
    assert_eq!(ha, first_line(&out_b));
}

#[test]
fn later_layer_overrides_earlier() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "creation:\n  wave_width: 10\n");
    let local = write(&dir, "local.yaml", "creation:\n  wave_width: 3\n");

    Command::cargo_bin("ogen")
        .unwrap()
        .args(["config-hash", &base, &local])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"wave_width\":3"));
}

#[test]
fn secret_literal_in_config_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(
        &dir,
        "bad.yaml",
        "remote:\n  shop_domain: qa.example.com\n  token_env: shpat_0123456789abcdef\n",
    );

    Command::cargo_bin("ogen")
        .unwrap()
        .args(["config-hash", &bad])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));
}
