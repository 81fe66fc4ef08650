use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::ids::{generate_run_name, ExperimentId, RunId};
use dstrack_core::paths::{join_artifact_path, normalize_artifact_path};
use dstrack_core::time::now_millis;
use dstrack_data::Dataset;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::active::ActiveRun;
use crate::blobs::BlobStore;
use crate::lifecycle::RunStatus;
use crate::schema::{
    db_error, init_schema, insert_experiment, insert_input, insert_run, load_artifacts,
    load_experiment_by_name, load_experiments, load_run, update_run_status, upsert_artifact,
    upsert_dataset, upsert_tag, ArtifactRecord, ExperimentRecord, InputRecord, RunRecord,
};

pub const INDEX_FILE: &str = "tracking.db";
pub const OBJECTS_DIR: &str = "objects";

/// Run tag holding the run's display name.
pub const TAG_RUN_NAME: &str = "dstrack.runName";
/// Input tag recording why a dataset was used (`training`, `evaluation`, ...).
pub const TAG_INPUT_CONTEXT: &str = "dstrack.data.context";

/// How long a writer waits for another process holding the index lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_TAG_KEY: usize = 250;
const MAX_TAG_VALUE: usize = 8000;

/// Options for a new run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Display name; generated when absent.
    pub run_name: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl RunOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            run_name: Some(name.into()),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Local tracking store: a SQLite index plus a content-addressed object dir.
///
/// ```text
/// <root>/tracking.db
/// <root>/objects/<aa>/<rest of sha256>
/// ```
pub struct TrackingStore {
    root: PathBuf,
    conn: Connection,
    blobs: BlobStore,
}

impl TrackingStore {
    /// Opens the store at `root`, creating it on first use.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TrackError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| TrackError::io("store.root", &root, err))?;
        let index = root.join(INDEX_FILE);
        let conn = Connection::open(&index).map_err(|err| {
            TrackError::Store(
                ErrorInfo::new("store.open", err.to_string()).with_path(&index),
            )
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| db_error("store.open", err))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|err| db_error("store.open", err))?;
        init_schema(&conn, now_millis())?;
        let blobs = BlobStore::open(root.join(OBJECTS_DIR))?;
        debug!(root = %root.display(), "opened tracking store");
        Ok(Self { root, conn, blobs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>, TrackError> {
        load_experiment_by_name(&self.conn, name)
    }

    /// Looks an experiment up by name, creating it if needed.
    pub fn get_or_create_experiment(&self, name: &str) -> Result<ExperimentRecord, TrackError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackError::Store(ErrorInfo::new(
                "store.experiment_name",
                "experiment name may not be empty",
            )));
        }
        if let Some(existing) = load_experiment_by_name(&self.conn, name)? {
            return Ok(existing);
        }
        // A concurrent writer may insert the same name first; the insert is
        // then a no-op.
        let created = insert_experiment(&self.conn, name, now_millis())?;
        let experiment = load_experiment_by_name(&self.conn, name)?.ok_or_else(|| {
            TrackError::Store(
                ErrorInfo::new("store.lookup", "experiment missing after insert")
                    .with_context("name", name),
            )
        })?;
        if created {
            info!(experiment_id = %experiment.experiment_id, name, "created experiment");
        }
        Ok(experiment)
    }

    pub fn list_experiments(&self) -> Result<Vec<ExperimentRecord>, TrackError> {
        load_experiments(&self.conn)
    }

    /// Inserts a `RUNNING` run. Prefer [`TrackingStore::start_run`], which
    /// guarantees the run is ended.
    pub fn create_run(
        &self,
        experiment_id: ExperimentId,
        options: &RunOptions,
    ) -> Result<RunRecord, TrackError> {
        let mut rng = rand::thread_rng();
        let run_name = match options.run_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => generate_run_name(&mut rng),
        };
        let run = RunRecord {
            run_id: RunId::generate(&mut rng),
            experiment_id,
            run_name,
            status: RunStatus::Running,
            start_time: now_millis(),
            end_time: None,
        };
        for (key, value) in &options.tags {
            validate_tag(key, value)?;
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|err| db_error("store.transaction", err))?;
        insert_run(&tx, &run)?;
        upsert_tag(&tx, &run.run_id, TAG_RUN_NAME, &run.run_name)?;
        for (key, value) in &options.tags {
            upsert_tag(&tx, &run.run_id, key, value)?;
        }
        tx.commit().map_err(|err| db_error("store.commit", err))?;
        info!(run_id = %run.run_id, run_name = %run.run_name, %experiment_id, "started run");
        Ok(run)
    }

    /// Starts a run and returns a guard that ends it.
    pub fn start_run(
        &self,
        experiment_id: ExperimentId,
        options: &RunOptions,
    ) -> Result<ActiveRun<'_>, TrackError> {
        let run = self.create_run(experiment_id, options)?;
        Ok(ActiveRun::new(self, run))
    }

    /// Runs `body` inside a fresh run.
    ///
    /// The run ends `FINISHED` when `body` succeeds and `FAILED` when it
    /// returns an error, which is passed through unchanged.
    pub fn with_run<T, E, F>(
        &self,
        experiment_id: ExperimentId,
        options: &RunOptions,
        body: F,
    ) -> Result<(RunRecord, T), E>
    where
        E: From<TrackError>,
        F: FnOnce(&ActiveRun<'_>) -> Result<T, E>,
    {
        let active = self.start_run(experiment_id, options)?;
        match body(&active) {
            Ok(value) => {
                let record = active.finish()?;
                Ok((record, value))
            }
            Err(err) => {
                if let Err(end_err) = active.fail() {
                    tracing::warn!(error = %end_err, "failed to mark run as FAILED");
                }
                Err(err)
            }
        }
    }

    pub fn get_run(&self, run_id: &RunId) -> Result<RunRecord, TrackError> {
        load_run(&self.conn, run_id)?.ok_or_else(|| {
            TrackError::Store(
                ErrorInfo::new("store.run_missing", "run not found")
                    .with_context("run_id", run_id.as_str()),
            )
        })
    }

    fn require_active(&self, run_id: &RunId) -> Result<RunRecord, TrackError> {
        let run = self.get_run(run_id)?;
        if !run.status.accepts_writes() {
            return Err(TrackError::Lifecycle(
                ErrorInfo::new("store.run_inactive", format!("run is {}", run.status))
                    .with_context("run_id", run_id.as_str())
                    .with_context("status", run.status.as_str()),
            ));
        }
        Ok(run)
    }

    /// Moves a run to `status` and stamps `end_time` for terminal states.
    pub fn end_run(&self, run_id: &RunId, status: RunStatus) -> Result<RunRecord, TrackError> {
        let run = self.get_run(run_id)?;
        let next = run.status.transition(status)?;
        let end_time = next.is_terminal().then(now_millis);
        if !update_run_status(&self.conn, run_id, run.status, next, end_time)? {
            return Err(TrackError::Lifecycle(
                ErrorInfo::new("store.run_transition", "run status changed concurrently")
                    .with_context("run_id", run_id.as_str()),
            ));
        }
        info!(%run_id, status = %next, "run status changed");
        self.get_run(run_id)
    }

    pub fn set_tag(&self, run_id: &RunId, key: &str, value: &str) -> Result<(), TrackError> {
        validate_tag(key, value)?;
        self.require_active(run_id)?;
        upsert_tag(&self.conn, run_id, key, value)
    }

    /// Records `dataset` as an input of the run under `context`.
    ///
    /// The dataset row is shared by every run of the experiment with the same
    /// name and digest. Logging it twice into one run keeps the first input.
    pub fn log_input(
        &self,
        run_id: &RunId,
        dataset: &Dataset,
        context: &str,
    ) -> Result<InputRecord, TrackError> {
        let run = self.require_active(run_id)?;
        let mut tags = BTreeMap::new();
        if !context.trim().is_empty() {
            tags.insert(TAG_INPUT_CONTEXT.to_string(), context.trim().to_string());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|err| db_error("store.transaction", err))?;
        let dataset_id = upsert_dataset(&tx, run.experiment_id, dataset)?;
        let (input_id, created) = insert_input(&tx, dataset_id, run_id, &tags)?;
        tx.commit().map_err(|err| db_error("store.commit", err))?;
        if created {
            info!(%run_id, dataset = %dataset.name, digest = %dataset.digest, context, "logged input");
        } else {
            debug!(%run_id, dataset = %dataset.name, "input already logged");
        }
        let stored = crate::schema::load_inputs(&self.conn, run_id)?
            .into_iter()
            .find(|input| input.input_id == input_id);
        stored.ok_or_else(|| {
            TrackError::Store(ErrorInfo::new("store.lookup", "new input missing"))
        })
    }

    /// Stores `local_path` as `<artifact_dir>/<file name>` in the run.
    ///
    /// An existing artifact at the same path is replaced.
    pub fn log_artifact(
        &self,
        run_id: &RunId,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord, TrackError> {
        self.require_active(run_id)?;
        if !local_path.is_file() {
            return Err(TrackError::Store(
                ErrorInfo::new("store.artifact_source", "artifact source is not a file")
                    .with_path(local_path),
            ));
        }
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TrackError::Store(
                    ErrorInfo::new("store.artifact_source", "artifact source has no file name")
                        .with_path(local_path),
                )
            })?;
        let path = join_artifact_path(artifact_dir, &file_name)?;
        let blob = self.blobs.put_file(local_path)?;
        let record = ArtifactRecord {
            run_id: run_id.clone(),
            path,
            sha256: blob.sha256,
            size: blob.size,
            logged_at: now_millis(),
        };
        upsert_artifact(&self.conn, &record)?;
        info!(%run_id, path = %record.path, sha256 = %record.sha256, size = record.size, "logged artifact");
        Ok(record)
    }

    /// Artifacts of a run, sorted by path, optionally under `prefix`.
    pub fn list_artifacts(
        &self,
        run_id: &RunId,
        prefix: Option<&str>,
    ) -> Result<Vec<ArtifactRecord>, TrackError> {
        self.get_run(run_id)?;
        let mut artifacts = load_artifacts(&self.conn, run_id)?;
        if let Some(prefix) = prefix.filter(|p| !p.trim().is_empty()) {
            let prefix = normalize_artifact_path(prefix)?;
            artifacts.retain(|artifact| {
                artifact.path == prefix || artifact.path.starts_with(&format!("{prefix}/"))
            });
        }
        Ok(artifacts)
    }

    /// Copies one artifact to `dest` after verifying its bytes.
    pub fn fetch_artifact(
        &self,
        run_id: &RunId,
        path: &str,
        dest: &Path,
    ) -> Result<ArtifactRecord, TrackError> {
        let path = normalize_artifact_path(path)?;
        let artifact = load_artifacts(&self.conn, run_id)?
            .into_iter()
            .find(|artifact| artifact.path == path)
            .ok_or_else(|| {
                TrackError::Store(
                    ErrorInfo::new("store.artifact_missing", "artifact not found")
                        .with_context("run_id", run_id.as_str())
                        .with_context("path", path.clone()),
                )
            })?;
        self.blobs.copy_out(&artifact.sha256, dest)?;
        debug!(%run_id, path = %artifact.path, dest = %dest.display(), "fetched artifact");
        Ok(artifact)
    }
}

fn validate_tag(key: &str, value: &str) -> Result<(), TrackError> {
    let invalid = |message: &str| {
        TrackError::Store(ErrorInfo::new("store.tag_invalid", message.to_string()).with_context("key", key))
    };
    if key.trim().is_empty() {
        return Err(invalid("tag key may not be empty"));
    }
    if key.len() > MAX_TAG_KEY {
        return Err(invalid("tag key longer than 250 bytes"));
    }
    if value.len() > MAX_TAG_VALUE {
        return Err(invalid("tag value longer than 8000 bytes"));
    }
    Ok(())
}
