use std::collections::BTreeMap;

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::ids::{ExperimentId, RunId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::lifecycle::RunStatus;
use crate::schema::{
    db_error, load_artifacts, load_dataset, load_inputs, load_run, load_tags, run_from_row,
    ArtifactRecord, DatasetRecord, RunRecord, RUN_COLUMNS,
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunQuery {
    #[serde(default)]
    pub experiment_id: Option<ExperimentId>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    /// Only runs with an input dataset carrying this digest.
    #[serde(default)]
    pub dataset_digest: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Runs ordered by `(start_time, run_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunListing {
    pub runs: Vec<RunRecord>,
}

impl RunQuery {
    pub fn execute(&self, conn: &Connection) -> Result<RunListing, TrackError> {
        let mut sql = format!("SELECT {RUN_COLUMNS} FROM runs");
        let mut clauses = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();
        if let Some(experiment) = self.experiment_id {
            clauses.push("runs.experiment_id = ?");
            args.push(SqlValue::Integer(experiment.as_raw()));
        }
        if let Some(status) = self.status {
            clauses.push("runs.status = ?");
            args.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(digest) = &self.dataset_digest {
            clauses.push(
                "EXISTS (SELECT 1 FROM inputs JOIN datasets ON datasets.dataset_id = inputs.dataset_id
                 WHERE inputs.run_id = runs.run_id AND datasets.digest = ?)",
            );
            args.push(SqlValue::Text(digest.clone()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY runs.start_time, runs.run_id");
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|err| db_error("store.query", err))?;
        let rows = stmt
            .query_map(params_from_iter(args), run_from_row)
            .map_err(|err| db_error("store.query", err))?;
        let runs = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error("store.query", err))?;
        Ok(RunListing { runs })
    }
}

impl RunListing {
    pub fn ensure_deterministic(&self) -> Result<(), TrackError> {
        let keys: Vec<_> = self
            .runs
            .iter()
            .map(|run| (run.start_time, run.run_id.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        if keys != sorted {
            return Err(TrackError::Store(ErrorInfo::new(
                "store.ordering",
                "runs not ordered deterministically",
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputView {
    pub dataset: DatasetRecord,
    pub tags: BTreeMap<String, String>,
}

/// A run joined with its tags, inputs and artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunView {
    pub run: RunRecord,
    pub tags: BTreeMap<String, String>,
    pub inputs: Vec<InputView>,
    pub artifacts: Vec<ArtifactRecord>,
}

impl RunView {
    pub fn load(conn: &Connection, run_id: &RunId) -> Result<Self, TrackError> {
        let run = load_run(conn, run_id)?.ok_or_else(|| {
            TrackError::Store(
                ErrorInfo::new("store.run_missing", "run not found")
                    .with_context("run_id", run_id.as_str()),
            )
        })?;
        let mut inputs = Vec::new();
        for input in load_inputs(conn, run_id)? {
            inputs.push(InputView {
                dataset: load_dataset(conn, input.dataset_id)?,
                tags: input.tags,
            });
        }
        Ok(Self {
            tags: load_tags(conn, run_id)?,
            artifacts: load_artifacts(conn, run_id)?,
            inputs,
            run,
        })
    }
}
