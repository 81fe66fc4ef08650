use std::error::Error;

use clap::Args;
use dstrack_store::SCHEMA_VERSION;
use serde::Serialize;

use super::print_json;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Emit extended metadata including git and index schema information.
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: String,
    git_commit: String,
    index_schema: i64,
}

pub fn run(args: &VersionArgs) -> Result<(), Box<dyn Error>> {
    if !args.long {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    print_json(&VersionInfo {
        version: env!("CARGO_PKG_VERSION").into(),
        git_commit: git_commit(),
        index_schema: SCHEMA_VERSION,
    })
}

/// Commit baked in at build time through `DSTRACK_GIT_COMMIT`.
fn git_commit() -> String {
    option_env!("DSTRACK_GIT_COMMIT")
        .filter(|commit| !commit.trim().is_empty())
        .unwrap_or("unknown")
        .to_string()
}
