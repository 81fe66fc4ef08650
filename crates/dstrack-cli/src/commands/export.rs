use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use dstrack_core::config::TrackingConfig;
use dstrack_store::export_to_path;

use super::open_store;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output path; `.csv` writes one row per run, anything else canonical JSON.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &ExportArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    export_to_path(&store, &args.out)?;
    println!("export written to {}", args.out.display());
    Ok(())
}
