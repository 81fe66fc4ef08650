//! Local experiment tracking: runs, dataset inputs and content-addressed artifacts.

pub mod active;
pub mod blobs;
pub mod export;
pub mod lifecycle;
pub mod query;
pub mod schema;
pub mod store;
pub mod verify;

pub use active::ActiveRun;
pub use blobs::{BlobRef, BlobStore};
pub use export::{export_csv, export_json, export_to_path, ExportDocument};
pub use lifecycle::RunStatus;
pub use query::{InputView, RunListing, RunQuery, RunView};
pub use schema::{
    ArtifactRecord, DatasetRecord, ExperimentRecord, InputRecord, RunRecord,
    DEFAULT_EXPERIMENT_NAME, SCHEMA_VERSION,
};
pub use store::{RunOptions, TrackingStore, TAG_INPUT_CONTEXT, TAG_RUN_NAME};
pub use verify::{prune_orphans, verify_store, VerifyReport};
