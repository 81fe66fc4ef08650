use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use dstrack_core::config::TrackingConfig;
use dstrack_core::errors::TrackError;
use dstrack_data::Dataset;
use dstrack_store::{ArtifactRecord, InputRecord, RunOptions, RunStatus};
use serde::Serialize;
use tracing::info;

use super::{open_store, print_json};

pub const TAG_USER: &str = "dstrack.user";
pub const TAG_SOURCE_NAME: &str = "dstrack.source.name";
pub const TAG_LAKEFS_COMMIT: &str = "lakefs.commit";
pub const TAG_LAKEFS_COMMIT_URL: &str = "lakefs.commit_url";

#[derive(Args, Debug)]
pub struct LogDatasetArgs {
    /// CSV file to read and log.
    #[arg(long = "data-file", alias = "data_file")]
    pub data_file: PathBuf,
    /// lakeFS commit id the file was read from; recorded as a run tag.
    #[arg(long = "lakefs-commit", alias = "lakefs_commit")]
    pub lakefs_commit: Option<String>,
    /// lakeFS commit URL; becomes the dataset source when given.
    #[arg(long = "lakefs-commit-url", alias = "lakefs_commit_url")]
    pub lakefs_commit_url: Option<String>,
    /// Experiment to log into; created if missing.
    #[arg(long)]
    pub experiment: Option<String>,
    /// Run name; generated when omitted.
    #[arg(long)]
    pub run_name: Option<String>,
    /// Input context recorded with the dataset.
    #[arg(long)]
    pub context: Option<String>,
    /// Artifact directory the raw file is stored under.
    #[arg(long)]
    pub artifact_path: Option<String>,
    /// Print a JSON summary instead of the bare run id.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct LogSummary {
    run_id: String,
    run_name: String,
    experiment_id: i64,
    status: RunStatus,
    dataset: DatasetSummary,
    input: InputRecord,
    artifact: ArtifactRecord,
}

#[derive(Debug, Serialize)]
struct DatasetSummary {
    name: String,
    digest: String,
    source_type: &'static str,
    source: String,
    num_rows: u64,
    num_elements: u64,
}

pub fn run(args: &LogDatasetArgs, config: &TrackingConfig) -> Result<(), Box<dyn Error>> {
    let config = effective_config(args, config)?;
    // The file is parsed before a run exists, so a bad CSV leaves no run behind.
    let dataset = Dataset::from_csv(
        &args.data_file,
        args.lakefs_commit_url.as_deref(),
        config.dataset.digest_max_rows,
    )?;
    let store = open_store(&config)?;
    let experiment = store.get_or_create_experiment(&config.experiment)?;
    let context = config.dataset.context.as_str();
    let artifact_dir = config.dataset.artifact_path.as_str();

    let (run, (input, artifact)) = store.with_run(
        experiment.experiment_id,
        &run_options(args),
        |active| -> Result<(InputRecord, ArtifactRecord), TrackError> {
            let input = active.log_input(&dataset, context)?;
            let artifact = active.log_artifact(&args.data_file, Some(artifact_dir))?;
            Ok((input, artifact))
        },
    )?;
    info!(run_id = %run.run_id, experiment = %experiment.name, "dataset logged");

    if args.json {
        print_json(&LogSummary {
            run_id: run.run_id.to_string(),
            run_name: run.run_name.clone(),
            experiment_id: run.experiment_id.as_raw(),
            status: run.status,
            dataset: DatasetSummary {
                name: dataset.name.clone(),
                digest: dataset.digest.clone(),
                source_type: dataset.source.source_type(),
                source: dataset.source.location().to_string(),
                num_rows: dataset.profile.num_rows,
                num_elements: dataset.profile.num_elements,
            },
            input,
            artifact,
        })?;
    } else {
        println!("{}", run.run_id);
    }
    Ok(())
}

/// Folds the command line overrides into `config` and validates the result.
fn effective_config(
    args: &LogDatasetArgs,
    config: &TrackingConfig,
) -> Result<TrackingConfig, TrackError> {
    let mut config = config.clone();
    if let Some(experiment) = &args.experiment {
        config.experiment = experiment.clone();
    }
    if let Some(context) = &args.context {
        config.dataset.context = context.clone();
    }
    if let Some(artifact_path) = &args.artifact_path {
        config.dataset.artifact_path = artifact_path.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run_options(args: &LogDatasetArgs) -> RunOptions {
    let mut options = RunOptions {
        run_name: args.run_name.clone(),
        ..RunOptions::default()
    }
    .with_tag(TAG_SOURCE_NAME, env!("CARGO_PKG_NAME"))
    .with_tag(TAG_USER, current_user());
    if let Some(commit) = args.lakefs_commit.as_deref().filter(|c| !c.trim().is_empty()) {
        options = options.with_tag(TAG_LAKEFS_COMMIT, commit.trim());
    }
    if let Some(url) = args.lakefs_commit_url.as_deref().filter(|u| !u.trim().is_empty()) {
        options = options.with_tag(TAG_LAKEFS_COMMIT_URL, url.trim());
    }
    options
}

fn current_user() -> String {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".into())
}
