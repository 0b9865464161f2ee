//! Evaluation run configuration
//!
//! Loaded from YAML or TOML (by file extension), then overridden from
//! `EVALGRID_*` environment variables and validated before any work starts.

mod resources;


pub use resources::{RemoteConfig, ResourceConfig};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::cv::CrossValidationScheme;
use crate::error::{EvalError, EvalResult};
use crate::store::{StoreBackendKind, StoreConfig};
use crate::task::{FeatureNames, RetryPolicy};

/// Get the default root under which run workspaces are created
pub fn default_workspace_root() -> PathBuf {
    ProjectDirs::from("com", "evalgrid", "evalgrid")
        .map(|dirs| dirs.data_dir().join("workspaces"))
        .unwrap_or_else(|| PathBuf::from("evalgrid-workspace"))
}

fn default_run_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_group_key() -> String {
    "group".to_string()
}

fn default_target_name() -> String {
    "target".to_string()
}

fn default_identity_column() -> String {
    "id".to_string()
}

fn default_prediction_column() -> String {
    "prediction".to_string()
}

fn default_predictions_dirname() -> String {
    "predictions".to_string()
}

fn default_window() -> usize {
    1
}

/// Cross-validation settings shared by all groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    #[serde(default = "default_scheme")]
    pub scheme: CrossValidationScheme,

    #[serde(default = "default_window")]
    pub train_window: usize,

    #[serde(default = "default_window")]
    pub test_window: usize,

    /// Numeric or datetime column rows are ordered by; storage order if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
}

fn default_scheme() -> CrossValidationScheme {
    CrossValidationScheme::RollingWindow
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            train_window: default_window(),
            test_window: default_window(),
            orderby: None,
        }
    }
}

/// Full configuration of an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Identity of the run; its workspace is `<workspace_root>/<run_id>`
    #[serde(default = "default_run_id")]
    pub run_id: String,

    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Column the dataset is partitioned by
    #[serde(default = "default_group_key")]
    pub group_key: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cross_validation: CrossValidationConfig,

    #[serde(default = "default_target_name")]
    pub target_name: String,

    #[serde(default = "default_identity_column")]
    pub identity_column: String,

    #[serde(default = "default_prediction_column")]
    pub prediction_column: String,

    #[serde(default)]
    pub feature_names: FeatureNames,

    #[serde(default)]
    pub hyperparameters: Value,

    #[serde(default)]
    pub estimator: Value,

    #[serde(default)]
    pub user_configs: Value,

    /// Record each task's predictions as an artifact
    #[serde(default)]
    pub return_predictions: bool,

    #[serde(default = "default_predictions_dirname")]
    pub predictions_dirname: String,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub resources: ResourceConfig,

    /// Stop after the store is built and provisioned
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            run_id: default_run_id(),
            workspace_root: default_workspace_root(),
            group_key: default_group_key(),
            store: StoreConfig::default(),
            cross_validation: CrossValidationConfig::default(),
            target_name: default_target_name(),
            identity_column: default_identity_column(),
            prediction_column: default_prediction_column(),
            feature_names: FeatureNames::default(),
            hyperparameters: Value::Null,
            estimator: Value::Null,
            user_configs: Value::Null,
            return_predictions: false,
            predictions_dirname: default_predictions_dirname(),
            retry: RetryPolicy::default(),
            resources: ResourceConfig::default(),
            debug_mode: false,
        }
    }
}

impl EvaluationConfig {
    /// Load a configuration file and apply environment overrides
    pub async fn load(path: &Path) -> EvalResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EvalError::configuration(path.display().to_string(), e.to_string()))?;
        let mut config = Self::parse(&content, path)?;
        config.merge_env_vars();
        debug!("Loaded configuration for run {} from {}", config.run_id, path.display());
        Ok(config)
    }

    /// Parse configuration text; the format follows the file extension
    pub fn parse(content: &str, path: &Path) -> EvalResult<Self> {
        let field = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                toml::from_str(content).map_err(|e| EvalError::configuration(field, e.to_string()))
            }
            Some("json") => serde_json::from_str(content)
                .map_err(|e| EvalError::configuration(field, e.to_string())),
            _ => serde_yaml::from_str(content)
                .map_err(|e| EvalError::configuration(field, e.to_string())),
        }
    }

    pub fn merge_env_vars(&mut self) {
        if let Ok(root) = std::env::var("EVALGRID_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }

        if let Ok(run_id) = std::env::var("EVALGRID_RUN_ID") {
            self.run_id = run_id;
        }

        if let Ok(workers) = std::env::var("EVALGRID_LOCAL_WORKERS") {
            if let Ok(value) = workers.parse::<usize>() {
                self.resources.local_workers = value;
                self.resources.auto = false;
            }
        }
    }

    /// Workspace directory of this run
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_root.join(&self.run_id)
    }

    /// Check the configuration, reporting the first problem found
    pub fn validate(&self) -> EvalResult<()> {
        check_name("run_id", &self.run_id)?;
        check_name("store.dirname", &self.store.dirname)?;
        check_name("predictions_dirname", &self.predictions_dirname)?;

        for (field, value) in [
            ("group_key", &self.group_key),
            ("target_name", &self.target_name),
            ("identity_column", &self.identity_column),
            ("prediction_column", &self.prediction_column),
        ] {
            if value.trim().is_empty() {
                return Err(EvalError::configuration(field, "must not be empty"));
            }
        }
        if self.identity_column == self.prediction_column {
            return Err(EvalError::configuration(
                "prediction_column",
                format!(
                    "must differ from identity_column '{}'",
                    self.identity_column
                ),
            ));
        }

        if self.cross_validation.train_window == 0 {
            return Err(EvalError::configuration(
                "cross_validation.train_window",
                "must be at least 1",
            ));
        }
        if self.cross_validation.test_window == 0 {
            return Err(EvalError::configuration(
                "cross_validation.test_window",
                "must be at least 1",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(EvalError::configuration(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(EvalError::configuration(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        if self.resources.resolved_local_workers() == 0 {
            return Err(EvalError::configuration(
                "resources.local_workers",
                "must be at least 1 (or set resources.auto)",
            ));
        }
        if let Some(remote) = &self.resources.remote {
            if remote.nodes == 0 {
                return Err(EvalError::configuration(
                    "resources.remote.nodes",
                    "must be at least 1 when remote workers are configured",
                ));
            }
            if remote.workers_per_node == 0 {
                return Err(EvalError::configuration(
                    "resources.remote.workers_per_node",
                    "must be at least 1",
                ));
            }
            if remote.shared_dir.is_none() {
                return Err(EvalError::configuration(
                    "resources.remote.shared_dir",
                    "required to provision the store on remote nodes",
                ));
            }
            if self.store.backend == StoreBackendKind::Memory {
                return Err(EvalError::configuration(
                    "store.backend",
                    "the memory backend cannot be provisioned to remote nodes",
                ));
            }
        }

        Ok(())
    }
}

/// Names used as single path components
fn check_name(field: &str, value: &str) -> EvalResult<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(EvalError::configuration(
            field,
            format!("'{}' is not a valid directory name", value),
        ));
    }
    Ok(())
}
