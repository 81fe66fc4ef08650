use std::path::Path;

use dstrack_core::errors::TrackError;
use dstrack_core::serde::to_canonical_json_string;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digest::compute_digest_with_limit;
use crate::frame::{read_csv, Frame};
use crate::schema::Schema;
use crate::source::DatasetSource;

pub const DEFAULT_DATASET_NAME: &str = "dataset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub num_rows: u64,
    pub num_elements: u64,
}

/// A fingerprinted reference to tabular data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub digest: String,
    pub source: DatasetSource,
    pub schema: Schema,
    pub profile: DatasetProfile,
}

impl Dataset {
    pub fn from_frame(frame: &Frame, source: DatasetSource, name: &str) -> Self {
        Self::from_frame_with_limit(frame, source, name, crate::digest::DEFAULT_DIGEST_ROWS)
    }

    pub fn from_frame_with_limit(
        frame: &Frame,
        source: DatasetSource,
        name: &str,
        digest_max_rows: usize,
    ) -> Self {
        let name = if name.trim().is_empty() {
            DEFAULT_DATASET_NAME.to_string()
        } else {
            name.to_string()
        };
        let digest = compute_digest_with_limit(frame, digest_max_rows);
        debug!(%name, %digest, rows = frame.num_rows(), "built dataset");
        Self {
            name,
            digest,
            source,
            schema: Schema::infer(frame),
            profile: DatasetProfile {
                num_rows: frame.num_rows() as u64,
                num_elements: frame.num_elements() as u64,
            },
        }
    }

    /// Reads `path` and wraps it as a dataset named after the file.
    ///
    /// The source is `source_url` when given, else the file itself.
    pub fn from_csv(
        path: &Path,
        source_url: Option<&str>,
        digest_max_rows: usize,
    ) -> Result<Self, TrackError> {
        let frame = read_csv(path)?;
        let source = DatasetSource::resolve(source_url, path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_frame_with_limit(
            &frame,
            source,
            &name,
            digest_max_rows,
        ))
    }

    pub fn profile_json(&self) -> Result<String, TrackError> {
        to_canonical_json_string(&self.profile)
    }
}
