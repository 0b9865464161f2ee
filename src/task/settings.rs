//! Read-only task configuration shared by every task of a run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::pipeline::Pipeline;
use super::retry::RetryPolicy;
use crate::config::{CrossValidationConfig, EvaluationConfig};
use crate::error::{EvalError, EvalResult};

/// Feature columns, either shared by all groups or listed per group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureNames {
    Shared(Vec<String>),
    PerGroup(BTreeMap<String, Vec<String>>),
}

impl Default for FeatureNames {
    fn default() -> Self {
        Self::Shared(Vec::new())
    }
}

impl FeatureNames {
    /// Features of one group; `None` when nothing is configured for it
    pub fn for_group(&self, group_key: &str) -> Option<&[String]> {
        let names = match self {
            Self::Shared(names) => names.as_slice(),
            Self::PerGroup(groups) => groups.get(group_key)?.as_slice(),
        };
        (!names.is_empty()).then_some(names)
    }

    /// Sorted union of features over every group
    pub fn all(&self) -> Vec<String> {
        let set: BTreeSet<&String> = match self {
            Self::Shared(names) => names.iter().collect(),
            Self::PerGroup(groups) => groups.values().flatten().collect(),
        };
        set.into_iter().cloned().collect()
    }
}

/// Plain data describing how every task runs
///
/// Holds no handles, so it can be serialized and shipped to any node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    pub store_dirname: String,
    pub predictions_dirname: String,
    pub hyperparameters: Value,
    pub estimator: Value,
    pub user_configs: Value,
    pub feature_names: FeatureNames,
    pub target_name: String,
    pub identity_column: String,
    pub prediction_column: String,
    pub cross_validation: CrossValidationConfig,
    pub return_predictions: bool,
    pub retry: RetryPolicy,
}

impl TaskSettings {
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            store_dirname: config.store.dirname.clone(),
            predictions_dirname: config.predictions_dirname.clone(),
            hyperparameters: config.hyperparameters.clone(),
            estimator: config.estimator.clone(),
            user_configs: config.user_configs.clone(),
            feature_names: config.feature_names.clone(),
            target_name: config.target_name.clone(),
            identity_column: config.identity_column.clone(),
            prediction_column: config.prediction_column.clone(),
            cross_validation: config.cross_validation.clone(),
            return_predictions: config.return_predictions,
            retry: config.retry.clone(),
        }
    }

    /// Features of a group, or a terminal error when none are configured
    pub fn feature_names_for(&self, group_key: &str) -> EvalResult<&[String]> {
        self.feature_names
            .for_group(group_key)
            .ok_or_else(|| EvalError::MissingFeatureNames {
                group_key: group_key.to_string(),
            })
    }

    pub fn all_feature_names(&self) -> Vec<String> {
        self.feature_names.all()
    }
}

/// Settings plus the pipeline implementation, shared read-only by tasks
pub struct TaskManager<P: Pipeline> {
    pub settings: Arc<TaskSettings>,
    pub pipeline: Arc<P>,
}

impl<P: Pipeline> TaskManager<P> {
    pub fn new(settings: TaskSettings, pipeline: Arc<P>) -> Self {
        Self {
            settings: Arc::new(settings),
            pipeline,
        }
    }
}

impl<P: Pipeline> Clone for TaskManager<P> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}
