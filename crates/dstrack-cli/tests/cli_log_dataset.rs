use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use dstrack_store::{RunQuery, RunStatus, TrackingStore};
use serde_json::Value;
use tempfile::TempDir;

const IRIS: &str = "sepal_length,sepal_width,species\n5.1,3.5,setosa\n4.9,3.0,setosa\n6.3,3.3,virginica\n";

fn dstrack(work: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dstrack"))
        .current_dir(work)
        .env_remove("DSTRACK_CONFIG")
        .env_remove("DSTRACK_TRACKING_DIR")
        .env_remove("DSTRACK_EXPERIMENT")
        .env_remove("DSTRACK_LOG")
        .env("USER", "tester")
        .args(args)
        .output()
        .expect("run dstrack")
}

fn setup() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("iris.csv"), IRIS).expect("write csv");
    let store = dir.path().join("store").display().to_string();
    (dir, store)
}

#[test]
fn log_dataset_prints_run_id_and_records_run() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--lakefs-commit",
            "abc123",
            "--lakefs-commit-url",
            "lakefs://repo/abc123/iris.csv",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let run_id = String::from_utf8(output.stdout).expect("utf8").trim().to_string();
    assert_eq!(run_id.len(), 32);

    let store = TrackingStore::open(&store).expect("open store");
    let listing = RunQuery::default()
        .execute(store.connection())
        .expect("query");
    assert_eq!(listing.len(), 1);
    let run = &listing.runs[0];
    assert_eq!(run.run_id.as_str(), run_id);
    assert_eq!(run.status, RunStatus::Finished);

    let artifacts = store.list_artifacts(&run.run_id, None).expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].path, "datasets/iris.csv");
    assert_eq!(artifacts[0].size, IRIS.len() as u64);
}

#[test]
fn json_summary_reports_dataset_and_tags() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--run-name",
            "nightly",
            "--json",
        ],
    );
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["run_name"], "nightly");
    assert_eq!(value["status"], "FINISHED");
    assert_eq!(value["dataset"]["num_rows"], 3);
    assert_eq!(value["dataset"]["num_elements"], 9);
    assert_eq!(value["dataset"]["source_type"], "local");
    assert_eq!(value["dataset"]["digest"].as_str().map(str::len), Some(8));
    assert_eq!(value["input"]["tags"]["dstrack.data.context"], "training");

    let run_id = value["run_id"].as_str().expect("run id");
    let show = dstrack(dir.path(), &["--tracking-dir", &store, "show", "--run-id", run_id]);
    assert!(show.status.success());
    let view: Value = serde_json::from_slice(&show.stdout).expect("json");
    assert_eq!(view["tags"]["dstrack.runName"], "nightly");
    assert_eq!(view["tags"]["dstrack.source.name"], "dstrack-cli");
}

#[test]
fn underscore_aliases_are_accepted() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data_file",
            "iris.csv",
            "--lakefs_commit",
            "abc123",
            "--lakefs_commit_url",
            "https://lakefs.example.com/repositories/r/commits/abc123",
            "--json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["dataset"]["source_type"], "http");
    assert_eq!(
        value["dataset"]["source"],
        "https://lakefs.example.com/repositories/r/commits/abc123"
    );
}

#[test]
fn missing_data_file_flag_is_usage_error() {
    let (dir, store) = setup();
    let output = dstrack(dir.path(), &["--tracking-dir", &store, "log-dataset"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!Path::new(&store).exists(), "no store should be created");
}

#[test]
fn unreadable_csv_creates_no_run() {
    let (dir, store) = setup();
    fs::write(dir.path().join("ragged.csv"), "a,b\n1,2\n3,4,5\n").expect("write csv");
    let output = dstrack(
        dir.path(),
        &["--tracking-dir", &store, "log-dataset", "--data-file", "ragged.csv"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("data.csv_ragged"), "stderr: {stderr}");

    let missing = dstrack(
        dir.path(),
        &["--tracking-dir", &store, "log-dataset", "--data-file", "nope.csv"],
    );
    assert!(!missing.status.success());
    assert!(!Path::new(&store).exists(), "failed reads must not open the store");
}

fn show_tags(work: &Path, store: &str, run_id: &str) -> Value {
    let show = dstrack(work, &["--tracking-dir", store, "show", "--run-id", run_id]);
    assert!(show.status.success(), "stderr: {}", String::from_utf8_lossy(&show.stderr));
    let view: Value = serde_json::from_slice(&show.stdout).expect("json");
    view["tags"].clone()
}

#[test]
fn lakefs_commit_and_user_are_tagged() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--lakefs-commit",
            "abc123",
            "--lakefs-commit-url",
            "lakefs://repo/abc123/iris.csv",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let run_id = String::from_utf8(output.stdout).expect("utf8").trim().to_string();
    let tags = show_tags(dir.path(), &store, &run_id);
    assert_eq!(tags["lakefs.commit"], "abc123");
    assert_eq!(tags["lakefs.commit_url"], "lakefs://repo/abc123/iris.csv");
    assert_eq!(tags["dstrack.user"], "tester");
}

#[test]
fn blank_lakefs_commit_adds_no_tag() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--lakefs-commit",
            "",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let run_id = String::from_utf8(output.stdout).expect("utf8").trim().to_string();
    let tags = show_tags(dir.path(), &store, &run_id);
    assert!(tags.get("lakefs.commit").is_none(), "tags: {tags}");
    assert!(tags.get("lakefs.commit_url").is_none(), "tags: {tags}");
}

#[test]
fn empty_context_is_rejected_before_any_run() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--context",
            "",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config.context"), "stderr: {stderr}");
    assert!(!Path::new(&store).exists(), "no store should be created");
}

#[test]
fn escaping_artifact_path_is_rejected_before_any_run() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--artifact-path",
            "../x",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config.artifact_path"), "stderr: {stderr}");
    assert!(!Path::new(&store).exists(), "no store should be created");
}

#[test]
fn custom_context_and_artifact_path_are_used() {
    let (dir, store) = setup();
    let output = dstrack(
        dir.path(),
        &[
            "--tracking-dir",
            &store,
            "log-dataset",
            "--data-file",
            "iris.csv",
            "--context",
            "evaluation",
            "--artifact-path",
            "raw/v1",
            "--json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["input"]["tags"]["dstrack.data.context"], "evaluation");
    assert_eq!(value["artifact"]["path"], "raw/v1/iris.csv");
}
