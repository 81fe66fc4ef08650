use std::collections::BTreeMap;

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::ids::{ExperimentId, RunId};
use dstrack_data::{Dataset, DatasetProfile, DatasetSource, Schema};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::lifecycle::RunStatus;

pub const SCHEMA_VERSION: i64 = 1;
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub experiment_id: ExperimentId,
    pub name: String,
    pub creation_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub experiment_id: ExperimentId,
    pub run_name: String,
    pub status: RunStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub dataset_id: i64,
    pub experiment_id: ExperimentId,
    pub name: String,
    pub digest: String,
    pub source_type: String,
    pub source: String,
    pub schema: String,
    pub profile: String,
}

impl DatasetRecord {
    /// Rebuilds the typed dataset from its stored JSON columns.
    pub fn to_dataset(&self) -> Result<Dataset, TrackError> {
        let profile: DatasetProfile = serde_json::from_str(&self.profile)
            .map_err(|err| TrackError::Serde(ErrorInfo::new("store.dataset_profile", err.to_string())))?;
        Ok(Dataset {
            name: self.name.clone(),
            digest: self.digest.clone(),
            source: DatasetSource::from_parts(&self.source_type, &self.source)?,
            schema: Schema::from_json(&self.schema)?,
            profile,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub input_id: i64,
    pub dataset_id: i64,
    pub run_id: RunId,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub run_id: RunId,
    pub path: String,
    pub sha256: String,
    pub size: u64,
    pub logged_at: i64,
}

pub(crate) fn db_error(code: &str, err: rusqlite::Error) -> TrackError {
    TrackError::Store(ErrorInfo::new(code, err.to_string()))
}

pub fn init_schema(conn: &Connection, now: i64) -> Result<(), TrackError> {
    conn.execute_batch(
        "BEGIN IMMEDIATE;
        CREATE TABLE IF NOT EXISTS meta(version INTEGER NOT NULL);
        CREATE TABLE IF NOT EXISTS experiments(
            experiment_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            creation_time INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS runs(
            run_id TEXT PRIMARY KEY,
            experiment_id INTEGER NOT NULL,
            run_name TEXT NOT NULL,
            status TEXT NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            FOREIGN KEY(experiment_id) REFERENCES experiments(experiment_id)
        );
        CREATE INDEX IF NOT EXISTS runs_by_start ON runs(start_time, run_id);
        CREATE TABLE IF NOT EXISTS tags(
            run_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY(run_id, key),
            FOREIGN KEY(run_id) REFERENCES runs(run_id)
        );
        CREATE TABLE IF NOT EXISTS datasets(
            dataset_id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            digest TEXT NOT NULL,
            source_type TEXT NOT NULL,
            source TEXT NOT NULL,
            schema TEXT NOT NULL,
            profile TEXT NOT NULL,
            UNIQUE(experiment_id, name, digest),
            FOREIGN KEY(experiment_id) REFERENCES experiments(experiment_id)
        );
        CREATE TABLE IF NOT EXISTS inputs(
            input_id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL,
            run_id TEXT NOT NULL,
            UNIQUE(dataset_id, run_id),
            FOREIGN KEY(dataset_id) REFERENCES datasets(dataset_id),
            FOREIGN KEY(run_id) REFERENCES runs(run_id)
        );
        CREATE TABLE IF NOT EXISTS input_tags(
            input_id INTEGER NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY(input_id, key),
            FOREIGN KEY(input_id) REFERENCES inputs(input_id)
        );
        CREATE TABLE IF NOT EXISTS artifacts(
            run_id TEXT NOT NULL,
            path TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size INTEGER NOT NULL,
            logged_at INTEGER NOT NULL,
            PRIMARY KEY(run_id, path),
            FOREIGN KEY(run_id) REFERENCES runs(run_id)
        );
        COMMIT;",
    )
    .map_err(|err| db_error("store.schema", err))?;
    set_version(conn, SCHEMA_VERSION)?;
    conn.execute(
        "INSERT OR IGNORE INTO experiments(experiment_id, name, creation_time) VALUES (?, ?, ?)",
        params![ExperimentId::DEFAULT.as_raw(), DEFAULT_EXPERIMENT_NAME, now],
    )
    .map_err(|err| db_error("store.schema", err))?;
    Ok(())
}

fn set_version(conn: &Connection, version: i64) -> Result<(), TrackError> {
    let existing: Option<i64> = conn
        .query_row("SELECT version FROM meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| db_error("store.schema", err))?;
    match existing {
        Some(current) if current == version => Ok(()),
        Some(current) => Err(TrackError::Store(
            ErrorInfo::new(
                "store.schema_version",
                format!("tracking index schema {current} incompatible with expected {version}"),
            )
            .with_hint("open the store with a matching dstrack release"),
        )),
        None => {
            conn.execute("INSERT INTO meta(version) VALUES (?)", params![version])
                .map_err(|err| db_error("store.schema", err))?;
            Ok(())
        }
    }
}

/// Inserts the experiment unless the name is taken. Returns whether a row
/// was written.
pub fn insert_experiment(conn: &Connection, name: &str, now: i64) -> Result<bool, TrackError> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO experiments(name, creation_time) VALUES (?, ?)",
            params![name, now],
        )
        .map_err(|err| db_error("store.insert_experiment", err))?;
    Ok(changed == 1)
}

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<ExperimentRecord> {
    Ok(ExperimentRecord {
        experiment_id: ExperimentId::from_raw(row.get(0)?),
        name: row.get(1)?,
        creation_time: row.get(2)?,
    })
}

pub fn load_experiment_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<ExperimentRecord>, TrackError> {
    conn.query_row(
        "SELECT experiment_id, name, creation_time FROM experiments WHERE name = ?",
        [name],
        experiment_from_row,
    )
    .optional()
    .map_err(|err| db_error("store.query", err))
}

pub fn load_experiments(conn: &Connection) -> Result<Vec<ExperimentRecord>, TrackError> {
    let mut stmt = conn
        .prepare("SELECT experiment_id, name, creation_time FROM experiments ORDER BY experiment_id")
        .map_err(|err| db_error("store.query", err))?;
    let rows = stmt
        .query_map([], experiment_from_row)
        .map_err(|err| db_error("store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error("store.query", err))
}

pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<(), TrackError> {
    conn.execute(
        "INSERT INTO runs(run_id, experiment_id, run_name, status, start_time, end_time) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            run.run_id.as_str(),
            run.experiment_id.as_raw(),
            run.run_name,
            run.status.as_str(),
            run.start_time,
            run.end_time
        ],
    )
    .map_err(|err| db_error("store.insert_run", err))?;
    Ok(())
}

pub(crate) const RUN_COLUMNS: &str =
    "runs.run_id, runs.experiment_id, runs.run_name, runs.status, runs.start_time, runs.end_time";

pub(crate) fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let run_id: String = row.get(0)?;
    let status: String = row.get(3)?;
    let conversion = |idx: usize, err: TrackError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
    };
    Ok(RunRecord {
        run_id: run_id.parse().map_err(|err| conversion(0, err))?,
        experiment_id: ExperimentId::from_raw(row.get(1)?),
        run_name: row.get(2)?,
        status: status.parse().map_err(|err| conversion(3, err))?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
    })
}

pub fn load_run(conn: &Connection, run_id: &RunId) -> Result<Option<RunRecord>, TrackError> {
    conn.query_row(
        &format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?"),
        [run_id.as_str()],
        run_from_row,
    )
    .optional()
    .map_err(|err| db_error("store.query", err))
}

/// Moves a run to `status` only if it is still in `expected`.
pub fn update_run_status(
    conn: &Connection,
    run_id: &RunId,
    expected: RunStatus,
    status: RunStatus,
    end_time: Option<i64>,
) -> Result<bool, TrackError> {
    let changed = conn
        .execute(
            "UPDATE runs SET status = ?, end_time = COALESCE(end_time, ?) WHERE run_id = ? AND status = ?",
            params![status.as_str(), end_time, run_id.as_str(), expected.as_str()],
        )
        .map_err(|err| db_error("store.update_run", err))?;
    Ok(changed == 1)
}

pub fn upsert_tag(conn: &Connection, run_id: &RunId, key: &str, value: &str) -> Result<(), TrackError> {
    conn.execute(
        "INSERT INTO tags(run_id, key, value) VALUES (?, ?, ?)
         ON CONFLICT(run_id, key) DO UPDATE SET value = excluded.value",
        params![run_id.as_str(), key, value],
    )
    .map_err(|err| db_error("store.insert_tag", err))?;
    Ok(())
}

pub fn load_tags(conn: &Connection, run_id: &RunId) -> Result<BTreeMap<String, String>, TrackError> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM tags WHERE run_id = ? ORDER BY key")
        .map_err(|err| db_error("store.query", err))?;
    let rows = stmt
        .query_map([run_id.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|err| db_error("store.query", err))?;
    rows.collect::<Result<BTreeMap<_, _>, _>>()
        .map_err(|err| db_error("store.query", err))
}

/// Returns the id of the `(experiment, name, digest)` dataset, inserting it
/// when it is new.
pub fn upsert_dataset(
    conn: &Connection,
    experiment_id: ExperimentId,
    dataset: &Dataset,
) -> Result<i64, TrackError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT dataset_id FROM datasets WHERE experiment_id = ? AND name = ? AND digest = ?",
            params![experiment_id.as_raw(), dataset.name, dataset.digest],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_error("store.query", err))?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO datasets(experiment_id, name, digest, source_type, source, schema, profile)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            experiment_id.as_raw(),
            dataset.name,
            dataset.digest,
            dataset.source.source_type(),
            dataset.source.to_json()?,
            dataset.schema.to_json()?,
            dataset.profile_json()?,
        ],
    )
    .map_err(|err| db_error("store.insert_dataset", err))?;
    Ok(conn.last_insert_rowid())
}

pub fn load_dataset(conn: &Connection, dataset_id: i64) -> Result<DatasetRecord, TrackError> {
    conn.query_row(
        "SELECT dataset_id, experiment_id, name, digest, source_type, source, schema, profile
         FROM datasets WHERE dataset_id = ?",
        [dataset_id],
        |row| {
            Ok(DatasetRecord {
                dataset_id: row.get(0)?,
                experiment_id: ExperimentId::from_raw(row.get(1)?),
                name: row.get(2)?,
                digest: row.get(3)?,
                source_type: row.get(4)?,
                source: row.get(5)?,
                schema: row.get(6)?,
                profile: row.get(7)?,
            })
        },
    )
    .map_err(|err| db_error("store.query", err))
}

/// Links a dataset to a run. Returns `(input_id, created)`.
pub fn insert_input(
    conn: &Connection,
    dataset_id: i64,
    run_id: &RunId,
    tags: &BTreeMap<String, String>,
) -> Result<(i64, bool), TrackError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT input_id FROM inputs WHERE dataset_id = ? AND run_id = ?",
            params![dataset_id, run_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_error("store.query", err))?;
    if let Some(id) = existing {
        return Ok((id, false));
    }
    conn.execute(
        "INSERT INTO inputs(dataset_id, run_id) VALUES (?, ?)",
        params![dataset_id, run_id.as_str()],
    )
    .map_err(|err| db_error("store.insert_input", err))?;
    let input_id = conn.last_insert_rowid();
    for (key, value) in tags {
        conn.execute(
            "INSERT INTO input_tags(input_id, key, value) VALUES (?, ?, ?)",
            params![input_id, key, value],
        )
        .map_err(|err| db_error("store.insert_input", err))?;
    }
    Ok((input_id, true))
}

pub fn load_inputs(conn: &Connection, run_id: &RunId) -> Result<Vec<InputRecord>, TrackError> {
    let mut stmt = conn
        .prepare("SELECT input_id, dataset_id FROM inputs WHERE run_id = ? ORDER BY input_id")
        .map_err(|err| db_error("store.query", err))?;
    let rows = stmt
        .query_map([run_id.as_str()], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|err| db_error("store.query", err))?;
    let pairs = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error("store.query", err))?;
    let mut tag_stmt = conn
        .prepare("SELECT key, value FROM input_tags WHERE input_id = ? ORDER BY key")
        .map_err(|err| db_error("store.query", err))?;
    let mut inputs = Vec::with_capacity(pairs.len());
    for (input_id, dataset_id) in pairs {
        let tags = tag_stmt
            .query_map([input_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|err| db_error("store.query", err))?
            .collect::<Result<BTreeMap<String, String>, _>>()
            .map_err(|err| db_error("store.query", err))?;
        inputs.push(InputRecord {
            input_id,
            dataset_id,
            run_id: run_id.clone(),
            tags,
        });
    }
    Ok(inputs)
}

pub fn upsert_artifact(conn: &Connection, artifact: &ArtifactRecord) -> Result<(), TrackError> {
    conn.execute(
        "INSERT INTO artifacts(run_id, path, sha256, size, logged_at) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(run_id, path) DO UPDATE SET
            sha256 = excluded.sha256, size = excluded.size, logged_at = excluded.logged_at",
        params![
            artifact.run_id.as_str(),
            artifact.path,
            artifact.sha256,
            artifact.size as i64,
            artifact.logged_at
        ],
    )
    .map_err(|err| db_error("store.insert_artifact", err))?;
    Ok(())
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    let run_id: String = row.get(0)?;
    let size: i64 = row.get(3)?;
    Ok(ArtifactRecord {
        run_id: run_id.parse().map_err(|err: TrackError| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
        })?,
        path: row.get(1)?,
        sha256: row.get(2)?,
        size: size.max(0) as u64,
        logged_at: row.get(4)?,
    })
}

pub fn load_artifacts(conn: &Connection, run_id: &RunId) -> Result<Vec<ArtifactRecord>, TrackError> {
    let mut stmt = conn
        .prepare(
            "SELECT run_id, path, sha256, size, logged_at FROM artifacts WHERE run_id = ? ORDER BY path",
        )
        .map_err(|err| db_error("store.query", err))?;
    let rows = stmt
        .query_map([run_id.as_str()], artifact_from_row)
        .map_err(|err| db_error("store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error("store.query", err))
}

/// Every distinct blob address referenced by any run.
pub fn referenced_blobs(conn: &Connection) -> Result<Vec<String>, TrackError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT sha256 FROM artifacts ORDER BY sha256")
        .map_err(|err| db_error("store.query", err))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|err| db_error("store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error("store.query", err))
}
