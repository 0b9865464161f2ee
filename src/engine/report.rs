//! Evaluation results gathered from the task queue

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::error::{EvalError, EvalResult};
use crate::task::{CompletedTask, ResultRecord, TaskFailure, TaskOutcome};

/// A group left out because its rows cannot satisfy the windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub group_key: String,
    pub reason: String,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    /// Successful tasks, in completion order
    pub completed: Vec<CompletedTask>,
    pub failed: Vec<TaskFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_groups: Vec<SkippedGroup>,
    /// Jobs whose worker died before reporting an outcome
    pub lost: usize,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    pub average_attempts: f64,
}

impl EvaluationReport {
    /// Split task outcomes into completed and failed
    pub fn from_outcomes(
        run_id: impl Into<String>,
        outcomes: Vec<TaskOutcome>,
        skipped_groups: Vec<SkippedGroup>,
        lost: usize,
        total_duration: Duration,
    ) -> Self {
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut attempts = 0u32;

        for outcome in outcomes {
            attempts += outcome.attempts();
            match outcome {
                TaskOutcome::Completed(done) => completed.push(done),
                TaskOutcome::Failed(failure) => failed.push(failure),
            }
        }

        let total = completed.len() + failed.len();
        let average_attempts = if total > 0 {
            f64::from(attempts) / total as f64
        } else {
            0.0
        };

        Self {
            run_id: run_id.into(),
            completed,
            failed,
            skipped_groups,
            lost,
            total_duration,
            average_attempts,
        }
    }

    /// Result records ordered by (group key, split index)
    pub fn sorted_records(&self) -> Vec<&ResultRecord> {
        let mut records: Vec<&ResultRecord> = self.completed.iter().map(|c| &c.record).collect();
        records.sort_by(|a, b| {
            a.group_key
                .cmp(&b.group_key)
                .then(a.split_index.cmp(&b.split_index))
        });
        records
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.lost == 0
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} completed, {} failed, {} lost in {:.1}s",
            self.completed.len(),
            self.failed.len(),
            self.lost,
            self.total_duration.as_secs_f64()
        );
        if !self.skipped_groups.is_empty() {
            line.push_str(&format!(" ({} group(s) skipped)", self.skipped_groups.len()));
        }
        line
    }

    /// Write the report as pretty JSON
    pub async fn save(&self, path: &Path) -> EvalResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .map_err(|source| EvalError::Workspace {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Saved evaluation report to {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> EvalResult<Self> {
        let json = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}
