use std::path::PathBuf;
use thiserror::Error;

use crate::cv::{SchemeError, SplitIndexError};
use crate::store::StorageError;
use crate::table::TableError;
use crate::task::{StateError, TaskId, TaskStage};

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Whether a failed attempt is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// May succeed on another attempt (I/O, user stage failures)
    Transient,
    /// Will fail the same way every time
    Terminal,
}

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Configuration error in '{field}': {reason}")]
    Configuration { field: String, reason: String },

    #[error("Workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid cross-validation scheme for group '{group_key}': {source}")]
    Scheme {
        group_key: String,
        #[source]
        source: SchemeError,
    },

    #[error("Group '{group_key}': {source}")]
    SplitIndex {
        group_key: String,
        #[source]
        source: SplitIndexError,
    },

    #[error("Pipeline stage {stage} failed: {source:#}")]
    Pipeline {
        stage: TaskStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Pipeline stage {stage} panicked: {message}")]
    StagePanic { stage: TaskStage, message: String },

    #[error("Malformed predictions: {0}")]
    PredictionFormat(String),

    #[error("No feature names configured for group '{group_key}'")]
    MissingFeatureNames { group_key: String },

    #[error("Failed to persist predictions to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task {task} failed after {attempts} attempt(s): {source}")]
    TerminalTask {
        task: TaskId,
        attempts: u32,
        #[source]
        source: Box<EvalError>,
    },

    #[error("Executor error: {0}")]
    Executor(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error for the retry policy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Storage(e) if e.is_retryable() => FailureKind::Transient,
            Self::Pipeline { .. }
            | Self::StagePanic { .. }
            | Self::Persistence { .. }
            | Self::Io(_) => FailureKind::Transient,
            _ => FailureKind::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.failure_kind() == FailureKind::Transient
    }
}
