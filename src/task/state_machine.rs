//! Pure task lifecycle state machine
//!
//! One attempt of a task walks the pipeline stages strictly in order:
//!
//! ```text
//! Reading -> PreprocessTrain -> Fit -> PreprocessTest -> Predict -> Evaluate
//!                                                                     |
//!                                     RecordPredictions <- Succeeded -+- Skipped -> Done
//!                                             |
//!                                             +-> Done
//! ```
//!
//! `Failed` is reachable from every non-terminal stage. `Done` and `Failed`
//! accept no further events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::TaskId;

/// Error type for stage transitions
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid transition from {from} with {event:?}")]
    InvalidTransition { from: TaskStage, event: TaskEvent },
}

/// Stage of one task attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Reading,
    PreprocessTrain,
    Fit,
    PreprocessTest,
    Predict,
    Evaluate,
    RecordPredictions,
    Done,
    Failed,
}

impl TaskStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reading => "reading",
            Self::PreprocessTrain => "preprocess_train",
            Self::Fit => "fit",
            Self::PreprocessTest => "preprocess_test",
            Self::Predict => "predict",
            Self::Evaluate => "evaluate",
            Self::RecordPredictions => "record_predictions",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// Stage finished; move to the next one
    Succeeded,
    /// Evaluation finished and predictions are not recorded
    PredictionsSkipped,
    /// Stage failed
    Failed,
}

/// Apply an event to the current stage
pub fn apply_transition(stage: TaskStage, event: TaskEvent) -> Result<TaskStage, StateError> {
    use TaskEvent as E;
    use TaskStage as S;

    match (stage, event) {
        (S::Reading, E::Succeeded) => Ok(S::PreprocessTrain),
        (S::PreprocessTrain, E::Succeeded) => Ok(S::Fit),
        (S::Fit, E::Succeeded) => Ok(S::PreprocessTest),
        (S::PreprocessTest, E::Succeeded) => Ok(S::Predict),
        (S::Predict, E::Succeeded) => Ok(S::Evaluate),
        (S::Evaluate, E::Succeeded) => Ok(S::RecordPredictions),
        (S::Evaluate, E::PredictionsSkipped) => Ok(S::Done),
        (S::RecordPredictions, E::Succeeded) => Ok(S::Done),
        (stage, E::Failed) if !stage.is_terminal() => Ok(S::Failed),
        (from, event) => Err(StateError::InvalidTransition { from, event }),
    }
}

/// Tracks one attempt through its stages, timing each one
#[derive(Debug)]
pub struct TaskLifecycle {
    task: TaskId,
    attempt: u32,
    stage: TaskStage,
    stage_started: Instant,
    durations: Vec<(TaskStage, Duration)>,
}

impl TaskLifecycle {
    pub fn new(task: TaskId, attempt: u32) -> Self {
        debug!(
            group_key = %task.group_key,
            split_index = task.split_index,
            attempt,
            stage = %TaskStage::Reading,
            "Stage started"
        );
        Self {
            task,
            attempt,
            stage: TaskStage::Reading,
            stage_started: Instant::now(),
            durations: Vec::new(),
        }
    }

    pub fn stage(&self) -> TaskStage {
        self.stage
    }

    /// Time spent in each finished stage, in order
    pub fn durations(&self) -> &[(TaskStage, Duration)] {
        &self.durations
    }

    /// Leave the current stage
    pub fn advance(&mut self, event: TaskEvent) -> Result<TaskStage, StateError> {
        let next = apply_transition(self.stage, event)?;
        let elapsed = self.stage_started.elapsed();
        self.durations.push((self.stage, elapsed));
        debug!(
            group_key = %self.task.group_key,
            split_index = self.task.split_index,
            attempt = self.attempt,
            stage = %self.stage,
            next = %next,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
        self.stage = next;
        self.stage_started = Instant::now();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_with_predictions() {
        let mut stage = TaskStage::Reading;
        let mut seen = vec![stage];
        while stage != TaskStage::Done {
            stage = apply_transition(stage, TaskEvent::Succeeded).unwrap();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen[6], TaskStage::RecordPredictions);
    }

    #[test]
    fn test_skip_predictions_only_after_evaluate() {
        assert_eq!(
            apply_transition(TaskStage::Evaluate, TaskEvent::PredictionsSkipped).unwrap(),
            TaskStage::Done
        );
        assert!(apply_transition(TaskStage::Fit, TaskEvent::PredictionsSkipped).is_err());
    }

    #[test]
    fn test_failed_from_any_running_stage() {
        for stage in [
            TaskStage::Reading,
            TaskStage::Fit,
            TaskStage::Predict,
            TaskStage::RecordPredictions,
        ] {
            assert_eq!(
                apply_transition(stage, TaskEvent::Failed).unwrap(),
                TaskStage::Failed
            );
        }
    }

    #[test]
    fn test_terminal_stages_reject_events() {
        assert!(apply_transition(TaskStage::Done, TaskEvent::Failed).is_err());
        assert!(apply_transition(TaskStage::Failed, TaskEvent::Succeeded).is_err());
    }

    #[test]
    fn test_lifecycle_records_durations() {
        let mut lifecycle = TaskLifecycle::new(TaskId::new("A", 1), 1);
        lifecycle.advance(TaskEvent::Succeeded).unwrap();
        lifecycle.advance(TaskEvent::Failed).unwrap();
        assert_eq!(lifecycle.stage(), TaskStage::Failed);
        let stages: Vec<_> = lifecycle.durations().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![TaskStage::Reading, TaskStage::PreprocessTrain]);
    }
}
