use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use commands::{
    artifacts::{self, ArtifactsArgs},
    experiments::{self, ExperimentsArgs},
    export::{self, ExportArgs},
    fetch::{self, FetchArgs},
    log_dataset::{self, LogDatasetArgs},
    runs::{self, RunsArgs},
    show::{self, ShowArgs},
    verify::{self, VerifyArgs},
    version::{self, VersionArgs},
};
use dstrack_core::config::TrackingConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "dstrack",
    about = "Log CSV datasets and their raw files into a local experiment-tracking store"
)]
struct Cli {
    /// Tracking store directory; overrides the config file and DSTRACK_TRACKING_DIR.
    #[arg(long, global = true)]
    tracking_dir: Option<PathBuf>,
    /// TOML configuration file; defaults to $DSTRACK_CONFIG or ./dstrack.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a CSV file and log it as a dataset input plus a raw artifact in a new run.
    LogDataset(LogDatasetArgs),
    /// List runs.
    Runs(RunsArgs),
    /// Show one run with its tags, inputs and artifacts.
    Show(ShowArgs),
    /// List the artifacts of a run.
    Artifacts(ArtifactsArgs),
    /// Copy an artifact out of the store.
    Fetch(FetchArgs),
    /// Export the tracking index as JSON or CSV.
    Export(ExportArgs),
    /// List experiments.
    Experiments(ExperimentsArgs),
    /// Re-hash stored artifacts and report missing, corrupt or orphaned objects.
    Verify(VerifyArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if let Command::Version(args) = &cli.command {
        return version::run(args);
    }
    let mut config = TrackingConfig::discover(cli.config.as_deref())?;
    if let Some(dir) = &cli.tracking_dir {
        config.tracking_dir = dir.clone();
        config.validate()?;
    }
    init_tracing(&log_directive(&cli, &config));
    match &cli.command {
        Command::LogDataset(args) => log_dataset::run(args, &config),
        Command::Runs(args) => runs::run(args, &config),
        Command::Show(args) => show::run(args, &config),
        Command::Artifacts(args) => artifacts::run(args, &config),
        Command::Fetch(args) => fetch::run(args, &config),
        Command::Export(args) => export::run(args, &config),
        Command::Experiments(args) => experiments::run(args, &config),
        Command::Verify(args) => verify::run(args, &config),
        Command::Version(args) => version::run(args),
    }
}

fn log_directive(cli: &Cli, config: &TrackingConfig) -> String {
    if cli.quiet {
        return "error".into();
    }
    match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".into(),
        _ => "trace".into(),
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
