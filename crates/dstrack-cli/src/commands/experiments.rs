use std::error::Error;

use clap::Args;
use dstrack_core::config::TrackingConfig;

use super::{open_store, print_json};

#[derive(Args, Debug)]
pub struct ExperimentsArgs {
    /// Emit JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &ExperimentsArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let experiments = store.list_experiments()?;
    if args.json {
        return print_json(&experiments);
    }
    for experiment in &experiments {
        println!("{}\t{}", experiment.experiment_id, experiment.name);
    }
    Ok(())
}
