use std::fs;
use std::path::Path;

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::serde::to_canonical_json_bytes;
use serde::{Deserialize, Serialize};

use crate::query::{RunQuery, RunView};
use crate::schema::{ExperimentRecord, SCHEMA_VERSION};
use crate::store::TrackingStore;

/// Full dump of the metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub schema_version: i64,
    pub experiments: Vec<ExperimentRecord>,
    pub runs: Vec<RunView>,
}

impl ExportDocument {
    pub fn collect(store: &TrackingStore) -> Result<Self, TrackError> {
        let listing = RunQuery::default().execute(store.connection())?;
        let mut runs = Vec::with_capacity(listing.runs.len());
        for run in &listing.runs {
            runs.push(RunView::load(store.connection(), &run.run_id)?);
        }
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            experiments: store.list_experiments()?,
            runs,
        })
    }
}

fn export_error(code: &str, err: impl ToString, out_path: &Path) -> TrackError {
    TrackError::Serde(ErrorInfo::new(code, err.to_string()).with_path(out_path))
}

pub fn export_json(store: &TrackingStore, out_path: &Path) -> Result<(), TrackError> {
    let document = ExportDocument::collect(store)?;
    let bytes = to_canonical_json_bytes(&document)?;
    fs::write(out_path, bytes).map_err(|err| export_error("store.export", err, out_path))
}

pub fn export_csv(store: &TrackingStore, out_path: &Path) -> Result<(), TrackError> {
    let document = ExportDocument::collect(store)?;
    let mut wtr =
        csv::Writer::from_path(out_path).map_err(|err| export_error("store.export", err, out_path))?;
    wtr.write_record([
        "run_id",
        "experiment_id",
        "run_name",
        "status",
        "start_time",
        "end_time",
        "datasets",
        "artifacts",
    ])
    .map_err(|err| export_error("store.export", err, out_path))?;
    for view in &document.runs {
        let datasets = view
            .inputs
            .iter()
            .map(|input| format!("{}@{}", input.dataset.name, input.dataset.digest))
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            view.run.run_id.to_string(),
            view.run.experiment_id.to_string(),
            view.run.run_name.clone(),
            view.run.status.to_string(),
            view.run.start_time.to_string(),
            view.run.end_time.map(|t| t.to_string()).unwrap_or_default(),
            datasets,
            view.artifacts.len().to_string(),
        ])
        .map_err(|err| export_error("store.export", err, out_path))?;
    }
    wtr.flush()
        .map_err(|err| export_error("store.export", err, out_path))
}

/// Picks the format from the extension: `.csv` or JSON for anything else.
pub fn export_to_path(store: &TrackingStore, out_path: &Path) -> Result<(), TrackError> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| TrackError::io("store.export", parent, err))?;
    }
    match out_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => export_csv(store, out_path),
        _ => export_json(store, out_path),
    }
}
