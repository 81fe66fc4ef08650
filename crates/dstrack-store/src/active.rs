use std::path::Path;

use dstrack_core::errors::TrackError;
use dstrack_core::ids::RunId;
use dstrack_data::Dataset;
use tracing::warn;

use crate::lifecycle::RunStatus;
use crate::schema::{ArtifactRecord, InputRecord, RunRecord};
use crate::store::TrackingStore;

/// Guard over a `RUNNING` run.
///
/// Call [`ActiveRun::finish`] on success. A guard dropped while the run is
/// still open marks it `FAILED`.
pub struct ActiveRun<'s> {
    store: &'s TrackingStore,
    run: RunRecord,
    open: bool,
}

impl<'s> ActiveRun<'s> {
    pub(crate) fn new(store: &'s TrackingStore, run: RunRecord) -> Self {
        Self {
            store,
            run,
            open: true,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run.run_id
    }

    /// The run as it was when it started.
    pub fn record(&self) -> &RunRecord {
        &self.run
    }

    pub fn set_tag(&self, key: &str, value: &str) -> Result<(), TrackError> {
        self.store.set_tag(&self.run.run_id, key, value)
    }

    pub fn log_input(&self, dataset: &Dataset, context: &str) -> Result<InputRecord, TrackError> {
        self.store.log_input(&self.run.run_id, dataset, context)
    }

    pub fn log_artifact(
        &self,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord, TrackError> {
        self.store
            .log_artifact(&self.run.run_id, local_path, artifact_dir)
    }

    pub fn finish(self) -> Result<RunRecord, TrackError> {
        self.end(RunStatus::Finished)
    }

    pub fn fail(self) -> Result<RunRecord, TrackError> {
        self.end(RunStatus::Failed)
    }

    pub fn kill(self) -> Result<RunRecord, TrackError> {
        self.end(RunStatus::Killed)
    }

    /// On error the guard stays open, so dropping it still fails the run.
    fn end(mut self, status: RunStatus) -> Result<RunRecord, TrackError> {
        let record = self.store.end_run(&self.run.run_id, status)?;
        self.open = false;
        Ok(record)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.store.end_run(&self.run.run_id, RunStatus::Failed) {
            Ok(_) => warn!(run_id = %self.run.run_id, "run dropped while active, marked FAILED"),
            Err(err) => warn!(run_id = %self.run.run_id, error = %err, "could not fail dropped run"),
        }
    }
}
