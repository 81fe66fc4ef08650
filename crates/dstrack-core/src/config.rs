//! TOML configuration with environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TrackError};
use crate::paths::normalize_artifact_path;

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "DSTRACK_CONFIG";
/// Environment override for [`TrackingConfig::tracking_dir`].
pub const ENV_TRACKING_DIR: &str = "DSTRACK_TRACKING_DIR";
/// Environment override for [`TrackingConfig::experiment`].
pub const ENV_EXPERIMENT: &str = "DSTRACK_EXPERIMENT";
/// Environment override for [`LoggingConfig::level`].
pub const ENV_LOG: &str = "DSTRACK_LOG";
/// File picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "dstrack.toml";

/// Top level configuration for the tracking client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Directory holding the metadata index and the blob store.
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
    /// Experiment new runs are attached to.
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Dataset logging behaviour.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Diagnostics output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("dstrack-runs")
}

fn default_experiment() -> String {
    "Default".into()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_dir: default_tracking_dir(),
            experiment: default_experiment(),
            dataset: DatasetConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings applied when a dataset is logged into a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Number of leading rows folded into the dataset digest.
    #[serde(default = "default_digest_max_rows")]
    pub digest_max_rows: usize,
    /// Input context tag recorded with each dataset.
    #[serde(default = "default_context")]
    pub context: String,
    /// Artifact directory the raw data file is copied under.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
}

fn default_digest_max_rows() -> usize {
    10_000
}

fn default_context() -> String {
    "training".into()
}

fn default_artifact_path() -> String {
    "datasets".into()
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            digest_max_rows: default_digest_max_rows(),
            context: default_context(),
            artifact_path: default_artifact_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `dstrack_store=debug`.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl TrackingConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TrackError> {
        toml::from_str(text)
            .map_err(|err| TrackError::Config(ErrorInfo::new("config.parse", err.to_string())))
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let text = fs::read_to_string(path).map_err(|err| {
            TrackError::Config(ErrorInfo::new("config.read", err.to_string()).with_path(path))
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            TrackError::Config(info) => TrackError::Config(info.with_path(path)),
            other => other,
        })
    }

    /// Resolves the configuration file to use.
    ///
    /// Lookup order: `explicit`, `$DSTRACK_CONFIG`, `./dstrack.toml` when it
    /// exists, then built-in defaults. Environment overrides are applied on
    /// top and the result is validated.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, TrackError> {
        Self::discover_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`TrackingConfig::discover`] with an injectable environment.
    pub fn discover_with<F>(explicit: Option<&Path>, env: F) -> Result<Self, TrackError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match env(ENV_CONFIG).filter(|value| !value.is_empty()) {
                Some(path) => Self::load(Path::new(&path))?,
                None => {
                    let local = Path::new(DEFAULT_CONFIG_FILE);
                    if local.is_file() {
                        Self::load(local)?
                    } else {
                        Self::default()
                    }
                }
            },
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Applies `DSTRACK_*` overrides; empty values are ignored.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        if let Some(dir) = lookup(ENV_TRACKING_DIR) {
            self.tracking_dir = PathBuf::from(dir);
        }
        if let Some(experiment) = lookup(ENV_EXPERIMENT) {
            self.experiment = experiment;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        if self.tracking_dir.as_os_str().is_empty() {
            return Err(TrackError::Config(ErrorInfo::new(
                "config.tracking_dir",
                "tracking_dir may not be empty",
            )));
        }
        if self.experiment.trim().is_empty() {
            return Err(TrackError::Config(ErrorInfo::new(
                "config.experiment",
                "experiment name may not be empty",
            )));
        }
        if self.dataset.digest_max_rows == 0 {
            return Err(TrackError::Config(
                ErrorInfo::new("config.digest_max_rows", "digest_max_rows must be positive")
                    .with_hint("the default is 10000"),
            ));
        }
        if self.dataset.context.trim().is_empty() {
            return Err(TrackError::Config(ErrorInfo::new(
                "config.context",
                "dataset context may not be empty",
            )));
        }
        normalize_artifact_path(&self.dataset.artifact_path).map_err(|err| {
            TrackError::Config(
                ErrorInfo::new("config.artifact_path", err.info().message.clone())
                    .with_context("artifact_path", self.dataset.artifact_path.clone()),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrackingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dataset.digest_max_rows, 10_000);
        assert_eq!(config.dataset.context, "training");
        assert_eq!(config.dataset.artifact_path, "datasets");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TrackingConfig::from_toml_str(
            r#"
            tracking_dir = "/tmp/runs"
            [dataset]
            context = "eval"
            "#,
        )
        .unwrap();
        assert_eq!(config.tracking_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.experiment, "Default");
        assert_eq!(config.dataset.context, "eval");
        assert_eq!(config.dataset.artifact_path, "datasets");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = TrackingConfig::from_toml_str("trackin_dir = \"x\"").unwrap_err();
        assert_eq!(err.code(), "config.parse");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = TrackingConfig::default();
        config.apply_env(|key| match key {
            ENV_TRACKING_DIR => Some("/srv/track".into()),
            ENV_EXPERIMENT => Some("churn".into()),
            ENV_LOG => Some("".into()),
            _ => None,
        });
        assert_eq!(config.tracking_dir, PathBuf::from("/srv/track"));
        assert_eq!(config.experiment, "churn");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_digest_rows_is_invalid() {
        let mut config = TrackingConfig::default();
        config.dataset.digest_max_rows = 0;
        assert_eq!(config.validate().unwrap_err().code(), "config.digest_max_rows");
    }

    #[test]
    fn escaping_artifact_path_is_invalid() {
        let mut config = TrackingConfig::default();
        config.dataset.artifact_path = "../outside".into();
        assert_eq!(config.validate().unwrap_err().code(), "config.artifact_path");
    }
}
