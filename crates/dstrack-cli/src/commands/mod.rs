use std::error::Error;

use dstrack_core::config::TrackingConfig;
use dstrack_core::ids::RunId;
use dstrack_core::serde::to_canonical_json_string;
use dstrack_store::TrackingStore;
use serde::Serialize;

pub mod artifacts;
pub mod experiments;
pub mod export;
pub mod fetch;
pub mod log_dataset;
pub mod runs;
pub mod show;
pub mod verify;
pub mod version;

pub(crate) fn open_store(config: &TrackingConfig) -> Result<TrackingStore, Box<dyn Error>> {
    Ok(TrackingStore::open(&config.tracking_dir)?)
}

pub(crate) fn parse_run_id(raw: &str) -> Result<RunId, Box<dyn Error>> {
    Ok(raw.trim().parse::<RunId>()?)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", to_canonical_json_string(value)?);
    Ok(())
}
