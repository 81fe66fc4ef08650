use std::error::Error;

use clap::Args;
use dstrack_core::config::TrackingConfig;
use dstrack_core::time::format_millis;
use dstrack_store::{RunQuery, RunStatus};

use super::{open_store, print_json};

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Only runs of this experiment (by name).
    #[arg(long)]
    pub experiment: Option<String>,
    /// Only runs in this status (RUNNING, FINISHED, FAILED, KILLED, SCHEDULED).
    #[arg(long)]
    pub status: Option<String>,
    /// Only runs that logged a dataset with this digest.
    #[arg(long)]
    pub dataset_digest: Option<String>,
    /// Maximum number of runs to print.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Emit JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &RunsArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let experiment_id = match &args.experiment {
        Some(name) => match store.get_experiment_by_name(name)? {
            Some(experiment) => Some(experiment.experiment_id),
            None => return Err(format!("experiment `{name}` does not exist").into()),
        },
        None => None,
    };
    let status = args
        .status
        .as_deref()
        .map(str::parse::<RunStatus>)
        .transpose()?;
    let query = RunQuery {
        experiment_id,
        status,
        dataset_digest: args.dataset_digest.clone(),
        limit: args.limit,
    };
    let listing = query.execute(store.connection())?;
    if args.json {
        return print_json(&listing);
    }
    for run in &listing.runs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            run.run_id,
            run.experiment_id,
            run.status,
            format_millis(run.start_time),
            run.run_name
        );
    }
    Ok(())
}
