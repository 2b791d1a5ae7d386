// Integration test for the shipped run configuration
use rvcheck::{Checkpoint, RunConfig};
use std::path::PathBuf;

fn shipped_config_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("..");
    path.push("config");
    path.push("rvcheck.toml");
    path
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = shipped_config_path();
    println!("Loading configuration from: {:?}", path);

    let config = RunConfig::load_from_path(&path)
        .expect("Should load config/rvcheck.toml");

    assert_eq!(config, RunConfig::default(), "Shipped file documents the defaults");
    assert_eq!(config.baseline, Checkpoint::StorageTransformCur);
    assert_eq!(config.entry_checkpoint, Checkpoint::CacheProcessEvent);
    assert_eq!(config.ignored_checkpoints, vec![Checkpoint::StorageTransformOld]);
}

#[test]
fn test_missing_config_file_is_unreadable() {
    let path = shipped_config_path().with_file_name("absent.toml");

    let err = RunConfig::load_from_path(&path).expect_err("Missing file must not load");
    assert!(matches!(err, rvcheck::Error::ConfigUnreadable { .. }));
    assert!(err.to_string().contains("absent.toml"), "{err}");
}

#[test]
fn test_legacy_aliases_are_accepted() {
    let config = RunConfig::load_from_str(
        r#"
        baseline = "ETCD"
        ignored_checkpoints = ["outapiserver", "storage-transform-old"]
        "#,
    )
    .expect("Legacy aliases should resolve");

    assert_eq!(config.baseline, Checkpoint::StorageTransformCur);
    assert!(!config.candidates().contains(&Checkpoint::DispatchEvent));
}
