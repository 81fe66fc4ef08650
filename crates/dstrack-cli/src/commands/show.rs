use std::error::Error;

use clap::Args;
use dstrack_core::config::TrackingConfig;
use dstrack_store::RunView;

use super::{open_store, parse_run_id, print_json};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Run to display.
    #[arg(long)]
    pub run_id: String,
}

pub fn run(args: &ShowArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let run_id = parse_run_id(&args.run_id)?;
    let store = open_store(config)?;
    let view = RunView::load(store.connection(), &run_id)?;
    print_json(&view)
}
