use std::fs;
use std::path::PathBuf;

use dstrack_core::config::{TrackingConfig, ENV_CONFIG, ENV_EXPERIMENT};
use tempfile::tempdir;

#[test]
fn explicit_file_wins_over_env_config() {
    let dir = tempdir().expect("tempdir");
    let explicit = dir.path().join("explicit.toml");
    let other = dir.path().join("other.toml");
    fs::write(&explicit, "experiment = \"from-explicit\"\n").expect("write");
    fs::write(&other, "experiment = \"from-env-file\"\n").expect("write");
    let other_str = other.display().to_string();
    let config = TrackingConfig::discover_with(Some(&explicit), |key| {
        (key == ENV_CONFIG).then(|| other_str.clone())
    })
    .expect("discover");
    assert_eq!(config.experiment, "from-explicit");
}

#[test]
fn env_config_file_then_env_override() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dstrack.toml");
    fs::write(
        &path,
        "tracking_dir = \"store\"\nexperiment = \"file\"\n[logging]\nlevel = \"debug\"\n",
    )
    .expect("write");
    let path_str = path.display().to_string();
    let config = TrackingConfig::discover_with(None, |key| match key {
        ENV_CONFIG => Some(path_str.clone()),
        ENV_EXPERIMENT => Some("env".into()),
        _ => None,
    })
    .expect("discover");
    assert_eq!(config.tracking_dir, PathBuf::from("store"));
    assert_eq!(config.experiment, "env");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn missing_explicit_file_is_config_error() {
    let dir = tempdir().expect("tempdir");
    let err = TrackingConfig::discover_with(Some(&dir.path().join("nope.toml")), |_| None)
        .expect_err("missing file");
    assert_eq!(err.code(), "config.read");
    assert!(err.info().context.contains_key("path"));
}
