use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn shield(store: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("storage-shield").unwrap();
    cmd.arg("--store").arg(store);
    cmd
}

fn import_transfer_policy(store: &Path) {
    shield(store)
        .args(["policy", "import"])
        .arg(fixture("transfer_policy.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported policy 0xa9059cbb"));
}

#[test]
fn test_analyze_lists_jump_destinations() {
    let store = TempDir::new().unwrap();
    let output = shield(store.path())
        .args(["--json", "analyze", "0x5b605b5b"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code_size"], 4);
    assert_eq!(json["instructions"], 3);
    assert_eq!(json["jump_destinations"], serde_json::json!([0, 3]));
}

#[test]
fn test_analyze_rejects_bad_hex() {
    let store = TempDir::new().unwrap();
    shield(store.path())
        .args(["analyze", "0x5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid code hex"));
}

#[test]
fn test_policy_import_list_show() {
    let store = TempDir::new().unwrap();
    import_transfer_policy(store.path());
    assert!(store.path().join("policies/a9/a9059cbb.json").exists());

    let output = shield(store.path())
        .args(["--json", "policy", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["selector"], "a9059cbb");
    assert_eq!(json[0]["shield"], 3);
    assert_eq!(json[0]["allow"], 1);

    shield(store.path())
        .args(["policy", "show", "0xa9059cbb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowances"))
        .stdout(predicate::str::contains("mapping depth 1"));
}

#[test]
fn test_policy_validate_rejects_overflowing_packed_field() {
    let store = TempDir::new().unwrap();
    let path = store.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{ "selector": "0x01020304",
             "shield": [ { "name": "flags", "slot": "0x0", "kind": "packed", "offset": 30, "width": 4 } ] }"#,
    )
    .unwrap();

    shield(store.path())
        .args(["policy", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("flags"));

    shield(store.path())
        .args(["policy", "validate"])
        .arg(fixture("transfer_policy.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_policy_show_missing_selector_fails() {
    let store = TempDir::new().unwrap();
    shield(store.path())
        .args(["policy", "show", "0xdeadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No policy stored"));
}

#[test]
fn test_replay_reports_denied_write() {
    let store = TempDir::new().unwrap();
    import_transfer_policy(store.path());

    let output = shield(store.path())
        .args(["--json", "replay"])
        .arg(fixture("transfer_scenario.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["protected"], true);
    assert_eq!(report["steps_executed"], 4);
    assert_eq!(report["halt"]["step"], 4);
    assert_eq!(report["halt"]["reason"], "write_denied");
    assert_eq!(report["writes_committed"], 0);
    assert_eq!(report["gas_remaining"], 79000);
}

#[test]
fn test_replay_strict_fails_on_halt() {
    let store = TempDir::new().unwrap();
    import_transfer_policy(store.path());

    shield(store.path())
        .args(["replay", "--strict"])
        .arg(fixture("transfer_scenario.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Call halted at step 4"))
        .stderr(predicate::str::contains("WRITE_DENIED"));
}
