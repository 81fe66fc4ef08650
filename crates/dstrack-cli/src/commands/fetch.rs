use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use dstrack_core::config::TrackingConfig;

use super::{open_store, parse_run_id};

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[arg(long)]
    pub run_id: String,
    /// Artifact path inside the run, e.g. `datasets/iris.csv`.
    #[arg(long)]
    pub path: String,
    /// Destination file.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &FetchArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let run_id = parse_run_id(&args.run_id)?;
    let store = open_store(config)?;
    let artifact = store.fetch_artifact(&run_id, &args.path, &args.out)?;
    println!(
        "fetched {} ({} bytes) to {}",
        artifact.path,
        artifact.size,
        args.out.display()
    );
    Ok(())
}
