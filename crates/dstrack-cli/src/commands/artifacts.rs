use std::error::Error;

use clap::Args;
use dstrack_core::config::TrackingConfig;

use super::{open_store, parse_run_id, print_json};

#[derive(Args, Debug)]
pub struct ArtifactsArgs {
    #[arg(long)]
    pub run_id: String,
    /// Only artifacts at or under this path.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Emit JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &ArtifactsArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let run_id = parse_run_id(&args.run_id)?;
    let store = open_store(config)?;
    let artifacts = store.list_artifacts(&run_id, args.prefix.as_deref())?;
    if args.json {
        return print_json(&artifacts);
    }
    for artifact in &artifacts {
        println!("{}\t{}\t{}", artifact.size, artifact.sha256, artifact.path);
    }
    Ok(())
}
