//! Exit-code and output contract of the `qrtrust` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn qrtrust(cache_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qrtrust").unwrap();
    cmd.env("QRTRUST_CACHE_PATH", cache_dir.path().join("trust-cache.db"))
        .env_remove("QRTRUST_CONFIG")
        .env_remove("QRTRUST_REGISTRY_URL")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_thumbprint_normalizes_standard_base64() {
    let dir = tempfile::tempdir().unwrap();
    qrtrust(&dir)
        .args(["thumbprint", "ab+c/d=="])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""normalized": "ab-c_d""#))
        .stdout(predicate::str::contains("standard-to-url-safe"));
}

#[test]
fn test_thumbprint_of_certificate_file() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = concat!(env!("CARGO_MANIFEST_DIR"), "/../qrtrust-core/tests/fixtures");
    let expected = std::fs::read_to_string(format!("{fixtures}/issuer.thumbprint")).unwrap();
    let expected = expected.trim().trim_end_matches('=').replace('+', "-").replace('/', "_");

    qrtrust(&dir)
        .args(["thumbprint", "--cert", &format!("{fixtures}/issuer.cert.pem")])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_undecodable_credential_exits_unverified() {
    let dir = tempfile::tempdir().unwrap();
    qrtrust(&dir)
        .args(["--registry-url", "http://127.0.0.1:9", "verify", "HC1:!!not-base45!!"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("base45-decode"));
}

#[test]
fn test_invalid_registry_url_exits_config_error() {
    let dir = tempfile::tempdir().unwrap();
    qrtrust(&dir)
        .args(["--registry-url", "ftp://registry.example", "cache", "stats"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_cache_stats_on_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    qrtrust(&dir)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""total": 0"#))
        .stdout(predicate::str::contains(r#""hitRate": 0"#));
}

#[test]
fn test_unreadable_cache_path_exits_cache_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    qrtrust(&dir)
        .args(["--cache-path"])
        .arg(blocker.join("trust-cache.db"))
        .args(["cache", "stats"])
        .assert()
        .code(3);
}
