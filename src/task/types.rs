//! Task identities and results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::state_machine::TaskStage;

/// Identity of one unit of work: a group and a split within it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub group_key: String,
    pub split_index: usize,
}

impl TaskId {
    pub fn new(group_key: impl Into<String>, split_index: usize) -> Self {
        Self {
            group_key: group_key.into(),
            split_index,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group_key, self.split_index)
    }
}

/// What a successful task reports
///
/// Holds only values derived from the inputs, so two runs of the same task
/// compare equal regardless of how many attempts each needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub group_key: String,
    pub split_index: usize,
    pub evaluation_result: Value,
    /// Rows in the prediction table
    pub prediction_count: usize,
}

impl ResultRecord {
    pub fn task_id(&self) -> TaskId {
        TaskId::new(self.group_key.clone(), self.split_index)
    }
}

/// A successful task with its attempt bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTask {
    pub record: ResultRecord,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Wall time across all attempts
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Per-stage timings of the successful attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stage_timings: Vec<StageTiming>,
    /// Where the predictions were recorded, when they were
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_artifact: Option<PathBuf>,
}

/// Time spent in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: TaskStage,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// A task that exhausted its attempts or hit a terminal error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: TaskId,
    pub attempts: u32,
    /// Stage the last attempt failed in
    pub stage: TaskStage,
    pub error: String,
}

/// Final outcome of one task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(CompletedTask),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Completed(done) => done.record.task_id(),
            Self::Failed(failure) => failure.task.clone(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed(done) => done.attempts,
            Self::Failed(failure) => failure.attempts,
        }
    }
}
