use dstrack_core::errors::TrackError;
use dstrack_core::ids::ExperimentId;
use dstrack_store::{RunOptions, RunStatus, TrackingStore, DEFAULT_EXPERIMENT_NAME, TAG_RUN_NAME};
use tempfile::tempdir;

#[test]
fn default_experiment_exists_and_lookup_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let default = store
        .get_experiment_by_name(DEFAULT_EXPERIMENT_NAME)
        .expect("query")
        .expect("default experiment");
    assert_eq!(default.experiment_id, ExperimentId::DEFAULT);
    let a = store.get_or_create_experiment("churn").expect("create");
    let b = store.get_or_create_experiment("churn").expect("lookup");
    assert_eq!(a, b);
    assert_eq!(a.experiment_id.as_raw(), 1);
    assert_eq!(store.list_experiments().expect("list").len(), 2);
}

#[test]
fn reopening_keeps_runs() {
    let dir = tempdir().expect("tempdir");
    let run_id = {
        let store = TrackingStore::open(dir.path()).expect("open");
        let active = store
            .start_run(ExperimentId::DEFAULT, &RunOptions::named("first"))
            .expect("start");
        active.finish().expect("finish").run_id
    };
    let store = TrackingStore::open(dir.path()).expect("reopen");
    let run = store.get_run(&run_id).expect("run");
    assert_eq!(run.run_name, "first");
    assert_eq!(run.status, RunStatus::Finished);
}

#[test]
fn finish_sets_end_time_once() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let run_id = active.run_id().clone();
    assert_eq!(active.record().status, RunStatus::Running);
    assert!(active.record().end_time.is_none());
    let finished = active.finish().expect("finish");
    assert_eq!(finished.status, RunStatus::Finished);
    let end_time = finished.end_time.expect("end time");
    assert!(end_time >= finished.start_time);

    let err = store
        .end_run(&run_id, RunStatus::Failed)
        .expect_err("terminal run");
    assert_eq!(err.code(), "store.run_transition");
    assert_eq!(store.get_run(&run_id).expect("run").end_time, Some(end_time));
}

#[test]
fn generated_run_name_is_tagged() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default().with_tag("team", "ml"))
        .expect("start");
    let run_id = active.run_id().clone();
    let name = active.record().run_name.clone();
    assert_eq!(name.split('-').count(), 3);
    active.finish().expect("finish");
    let view = dstrack_store::RunView::load(store.connection(), &run_id).expect("view");
    assert_eq!(view.tags.get(TAG_RUN_NAME), Some(&name));
    assert_eq!(view.tags.get("team").map(String::as_str), Some("ml"));
}

#[test]
fn dropped_guard_marks_run_failed() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let run_id = {
        let active = store
            .start_run(ExperimentId::DEFAULT, &RunOptions::default())
            .expect("start");
        active.run_id().clone()
    };
    let run = store.get_run(&run_id).expect("run");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.end_time.is_some());
}

#[test]
fn failed_finish_still_fails_the_run_on_drop() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    store
        .connection()
        .execute_batch(
            "CREATE TEMP TRIGGER block_finish BEFORE UPDATE OF status ON runs
             WHEN NEW.status = 'FINISHED'
             BEGIN SELECT RAISE(ABORT, 'finish blocked'); END;",
        )
        .expect("trigger");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let run_id = active.run_id().clone();
    let err = active.finish().expect_err("finish blocked");
    assert_eq!(err.code(), "store.update_run");
    let run = store.get_run(&run_id).expect("run");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.end_time.is_some());
}

#[test]
fn concurrent_experiment_creation_agrees_on_one_id() {
    let dir = tempdir().expect("tempdir");
    TrackingStore::open(dir.path()).expect("init");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let root = dir.path().to_path_buf();
            std::thread::spawn(move || {
                let store = TrackingStore::open(&root).expect("open");
                store
                    .get_or_create_experiment("shared")
                    .expect("create")
                    .experiment_id
            })
        })
        .collect();
    let ids: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    let store = TrackingStore::open(dir.path()).expect("reopen");
    assert_eq!(store.list_experiments().expect("list").len(), 2);
}

#[test]
fn with_run_fails_the_run_and_passes_the_error_through() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let mut seen = None;
    let result: Result<(_, ()), TrackError> =
        store.with_run(ExperimentId::DEFAULT, &RunOptions::default(), |run| {
            seen = Some(run.run_id().clone());
            Err(TrackError::Data(dstrack_core::ErrorInfo::new(
                "data.csv_parse",
                "boom",
            )))
        });
    assert_eq!(result.expect_err("body error").code(), "data.csv_parse");
    let run = store.get_run(&seen.expect("run id")).expect("run");
    assert_eq!(run.status, RunStatus::Failed);
}

#[test]
fn writes_into_finished_runs_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    let run_id = active.run_id().clone();
    active.kill().expect("kill");
    let err = store.set_tag(&run_id, "k", "v").expect_err("inactive");
    assert_eq!(err.code(), "store.run_inactive");
    assert!(matches!(err, TrackError::Lifecycle(_)));
}

#[test]
fn unknown_run_is_reported() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let missing = "0".repeat(32).parse().expect("id");
    assert_eq!(store.get_run(&missing).expect_err("missing").code(), "store.run_missing");
}

#[test]
fn invalid_tags_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = TrackingStore::open(dir.path()).expect("open");
    let active = store
        .start_run(ExperimentId::DEFAULT, &RunOptions::default())
        .expect("start");
    assert_eq!(active.set_tag("", "v").expect_err("empty").code(), "store.tag_invalid");
    assert_eq!(
        active.set_tag(&"k".repeat(251), "v").expect_err("long").code(),
        "store.tag_invalid"
    );
    active.finish().expect("finish");
}
