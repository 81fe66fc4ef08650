use std::error::Error;

use clap::Args;
use dstrack_core::config::TrackingConfig;
use dstrack_store::{prune_orphans, verify_store};

use super::{open_store, print_json};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Delete objects that no artifact references.
    #[arg(long)]
    pub prune: bool,
}

pub fn run(args: &VerifyArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let report = verify_store(&store)?;
    print_json(&report)?;
    if args.prune && !report.orphaned.is_empty() {
        let removed = prune_orphans(&store, &report)?;
        eprintln!("pruned {removed} orphaned objects");
    }
    if !report.is_clean() {
        return Err("store verification failed".into());
    }
    Ok(())
}
