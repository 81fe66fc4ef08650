use std::fs;
use std::path::Path;

use dstrack_core::ids::ExperimentId;
use dstrack_data::{Dataset, DEFAULT_DIGEST_ROWS};
use dstrack_store::{RunOptions, RunView, TrackingStore, TAG_INPUT_CONTEXT};
use tempfile::tempdir;

fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write csv");
    path
}

#[test]
fn dataset_and_raw_file_land_in_the_run() {
    let dir = tempdir().expect("tempdir");
    let data = write_csv(dir.path(), "iris.csv", "a,b\n1,x\n2,y\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let dataset = Dataset::from_csv(&data, None, DEFAULT_DIGEST_ROWS).expect("dataset");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let input = active.log_input(&dataset, "training").expect("input");
    assert_eq!(input.tags.get(TAG_INPUT_CONTEXT).map(String::as_str), Some("training"));
    let artifact = active.log_artifact(&data, Some("datasets")).expect("artifact");
    assert_eq!(artifact.path, "datasets/iris.csv");
    assert_eq!(artifact.size, 12);
    let run_id = active.run_id().clone();
    active.finish().expect("finish");

    let view = RunView::load(store.connection(), &run_id).expect("view");
    assert_eq!(view.inputs.len(), 1);
    let restored = view.inputs[0].dataset.to_dataset().expect("typed");
    assert_eq!(restored, dataset);
    assert_eq!(view.artifacts, vec![artifact.clone()]);

    let out = dir.path().join("out/iris.csv");
    store
        .fetch_artifact(&run_id, "datasets/iris.csv", &out)
        .expect("fetch");
    assert_eq!(fs::read(&out).expect("read"), fs::read(&data).expect("read"));
}

#[test]
fn repeated_input_is_recorded_once() {
    let dir = tempdir().expect("tempdir");
    let data = write_csv(dir.path(), "d.csv", "v\n1\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let dataset = Dataset::from_csv(&data, None, DEFAULT_DIGEST_ROWS).expect("dataset");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let first = active.log_input(&dataset, "training").expect("first");
    let second = active.log_input(&dataset, "training").expect("second");
    assert_eq!(first, second);
    let run_id = active.run_id().clone();
    active.finish().expect("finish");
    let view = RunView::load(store.connection(), &run_id).expect("view");
    assert_eq!(view.inputs.len(), 1);
}

#[test]
fn datasets_are_shared_across_runs_of_an_experiment() {
    let dir = tempdir().expect("tempdir");
    let data = write_csv(dir.path(), "d.csv", "v\n1\n2\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let dataset = Dataset::from_csv(&data, None, DEFAULT_DIGEST_ROWS).expect("dataset");
    let mut dataset_ids = Vec::new();
    for _ in 0..2 {
        let active = store
            .start_run(ExperimentId::DEFAULT, &RunOptions::default())
            .expect("start");
        dataset_ids.push(active.log_input(&dataset, "training").expect("input").dataset_id);
        active.finish().expect("finish");
    }
    assert_eq!(dataset_ids[0], dataset_ids[1]);
    let count: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM datasets", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

#[test]
fn relogging_an_artifact_path_replaces_it() {
    let dir = tempdir().expect("tempdir");
    let data = write_csv(dir.path(), "d.csv", "v\n1\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let first = active.log_artifact(&data, None).expect("first");
    fs::write(&data, "v\n2\n3\n").expect("rewrite");
    let second = active.log_artifact(&data, None).expect("second");
    assert_eq!(first.path, "d.csv");
    assert_ne!(first.sha256, second.sha256);
    let artifacts = store.list_artifacts(active.run_id(), None).expect("list");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].sha256, second.sha256);
    active.finish().expect("finish");
}

#[test]
fn identical_files_are_stored_once() {
    let dir = tempdir().expect("tempdir");
    let a = write_csv(dir.path(), "a.csv", "v\n1\n");
    let b = write_csv(dir.path(), "b.csv", "v\n1\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let ra = active.log_artifact(&a, Some("datasets")).expect("a");
    let rb = active.log_artifact(&b, Some("datasets")).expect("b");
    assert_eq!(ra.sha256, rb.sha256);
    assert_eq!(store.blobs().list().expect("list").len(), 1);
    let listed = store
        .list_artifacts(active.run_id(), Some("datasets"))
        .expect("list");
    let paths: Vec<_> = listed.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["datasets/a.csv", "datasets/b.csv"]);
    assert!(store
        .list_artifacts(active.run_id(), Some("data"))
        .expect("prefix")
        .is_empty());
    active.finish().expect("finish");
}

#[test]
fn bad_artifact_inputs() {
    let dir = tempdir().expect("tempdir");
    let data = write_csv(dir.path(), "d.csv", "v\n1\n");
    let store = TrackingStore::open(dir.path().join("store")).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let err = active.log_artifact(&data, Some("../escape")).expect_err("escape");
    assert_eq!(err.code(), "store.artifact_path");
    let err = active
        .log_artifact(&dir.path().join("absent.csv"), None)
        .expect_err("absent");
    assert_eq!(err.code(), "store.artifact_source");
    let err = store
        .fetch_artifact(active.run_id(), "nope.csv", &dir.path().join("x"))
        .expect_err("missing");
    assert_eq!(err.code(), "store.artifact_missing");
    active.finish().expect("finish");
}
