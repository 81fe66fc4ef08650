#![doc = "Core error, hashing, identifier and configuration types shared by the dstrack crates."]

pub mod config;
pub mod errors;
pub mod hash;
pub mod ids;
pub mod paths;
pub mod serde;
pub mod time;

pub use config::{DatasetConfig, LoggingConfig, TrackingConfig};
pub use errors::{ErrorInfo, TrackError};
pub use hash::{is_sha256_hex, sha256_hex, stable_hash_string};
pub use ids::{generate_run_name, ExperimentId, RunId};
pub use paths::{join_artifact_path, normalize_artifact_path};
pub use self::serde::{from_json_slice, from_json_str, to_canonical_json_bytes, to_canonical_json_string};
pub use time::{format_millis, now_millis};
