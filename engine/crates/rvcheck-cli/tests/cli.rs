use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("tests")
        .join("data")
        .join("cluster")
}

fn rvcheck(args: &[&str]) -> Output {
    let binary_path = PathBuf::from(env!("CARGO_BIN_EXE_rvcheck-cli"));
    assert!(
        binary_path.exists(),
        "expected rvcheck-cli binary at {}",
        binary_path.display()
    );

    Command::new(binary_path)
        .arg("--no-color")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke rvcheck-cli binary")
}

#[test]
fn check_reports_inconsistent_entities_as_text() {
    let root = fixture_root();
    let output = rvcheck(&["check", "--log-dir", root.to_str().unwrap(), "--entity-name", "web-1"]);

    assert!(
        output.status.success(),
        "binary failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 out of 2 entities have problems"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("default/web-1: consumer-watch-handler/scheduler"), "{stdout}");
    assert!(stdout.contains("missing: 22"), "{stdout}");
    assert!(stdout.contains("1 malformed trace record(s) skipped"), "{stdout}");
    assert!(stdout.contains("api-server:cacher/terminate x1"), "{stdout}");
}

#[test]
fn check_emits_json_and_fails_on_request() {
    let root = fixture_root();
    let output = rvcheck(&[
        "check",
        "--log-dir",
        root.to_str().unwrap(),
        "--format",
        "json",
        "--fail-on-inconsistent",
    ]);

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report");
    assert_eq!(report["entitiesExamined"], 2);
    assert_eq!(report["inconsistentCount"], 1);
    assert_eq!(report["baseline"], "storage-transform-cur");
    assert_eq!(report["inconsistent"][0]["entity"]["name"], "web-1");
    assert_eq!(
        report["inconsistent"][0]["diverging"][0],
        "consumer-watch-handler/scheduler"
    );
    assert_eq!(report["ingest"]["malformedRecords"], 1);
}

#[test]
fn check_logs_its_outcome_at_info_level() {
    let root = fixture_root();
    let output = rvcheck(&["check", "--log-dir", root.to_str().unwrap(), "--log-level", "info"]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("check finished"), "unexpected stderr: {stderr}");
}

#[test]
fn check_accepts_legacy_baseline_alias() {
    let root = fixture_root();
    let output = rvcheck(&[
        "check",
        "--log-dir",
        root.to_str().unwrap(),
        "--baseline",
        "outapiserver",
        "--format",
        "json",
    ]);

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report");
    assert_eq!(report["baseline"], "dispatch-event");
}

#[test]
fn missing_log_dir_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere");
    let output = rvcheck(&["check", "--log-dir", missing.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nowhere"), "unexpected stderr: {stderr}");
}

#[test]
fn invalid_config_file_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("rvcheck.toml");
    std::fs::write(&config, "baseline = \"apiserver\"\n").unwrap();

    let output = rvcheck(&[
        "check",
        "--log-dir",
        fixture_root().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "{stderr}");
}

#[test]
fn checkpoints_lists_the_legend() {
    let output = rvcheck(&["checkpoints"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("storage-transform-cur (alias etcd)"), "{stdout}");
    assert!(stdout.contains("cacher/add/case3"), "{stdout}");
    assert!(stdout.contains("consumer-watch-handler/controller-manager"), "{stdout}");
}
