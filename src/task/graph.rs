//! Per-task execution: read, run the pipeline, optionally record predictions
//!
//! One attempt is atomic. Nothing survives between attempts: every attempt
//! opens its own store handle, recomputes its split and rebuilds all
//! intermediate tables.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

use super::pipeline::Pipeline;
use super::predictions::record_predictions;
use super::retry::{execute_with_retry, Retryable};
use super::settings::TaskManager;
use super::state_machine::{TaskEvent, TaskLifecycle, TaskStage};
use super::types::{CompletedTask, ResultRecord, StageTiming, TaskFailure, TaskId, TaskOutcome};
use crate::cv::CrossValidationSplitter;
use crate::error::{EvalError, FailureKind};
use crate::queue::NodeContext;
use crate::store::StoreProvider;
use crate::table::Table;

/// A failed attempt and the stage it failed in
#[derive(Debug)]
pub struct StageFailure {
    pub stage: TaskStage,
    pub error: EvalError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (during {})", self.error, self.stage)
    }
}

impl Retryable for StageFailure {
    fn failure_kind(&self) -> FailureKind {
        self.error.failure_kind()
    }
}

/// Output of one successful attempt
struct AttemptOutput {
    record: ResultRecord,
    artifact: Option<PathBuf>,
    timings: Vec<StageTiming>,
}

/// Output of the pipeline stages of one attempt
struct StageOutput {
    prediction_count: usize,
    evaluation: serde_json::Value,
    predictions: Table,
}

/// Runs (group, split) tasks with retry
pub struct TaskGraph<P: Pipeline> {
    manager: TaskManager<P>,
    stores: Arc<dyn StoreProvider>,
}

impl<P: Pipeline> TaskGraph<P> {
    pub fn new(manager: TaskManager<P>, stores: Arc<dyn StoreProvider>) -> Self {
        Self { manager, stores }
    }

    pub fn manager(&self) -> &TaskManager<P> {
        &self.manager
    }

    /// Run one task to its final outcome on `node`
    ///
    /// Never returns an error: exhausted or terminal failures come back as
    /// [`TaskOutcome::Failed`] so sibling tasks are unaffected.
    pub async fn run(&self, node: &NodeContext, task: TaskId) -> TaskOutcome {
        let span = info_span!(
            "task",
            group_key = %task.group_key,
            split_index = task.split_index,
            node = %node.node_id
        );
        async {
            let started = Instant::now();
            let policy = &self.manager.settings.retry;
            let task_ref = &task;
            let (result, attempts) = execute_with_retry(policy, task_ref, move |attempt| {
                self.attempt(node, task_ref, attempt)
            })
            .await;

            match result {
                Ok(output) => {
                    info!(
                        "Task {} completed in {:?} after {} attempt(s)",
                        task,
                        started.elapsed(),
                        attempts
                    );
                    TaskOutcome::Completed(CompletedTask {
                        record: output.record,
                        attempts,
                        duration: started.elapsed(),
                        stage_timings: output.timings,
                        prediction_artifact: output.artifact,
                    })
                }
                Err(failure) => {
                    let stage = failure.stage;
                    let err = EvalError::TerminalTask {
                        task: task.clone(),
                        attempts,
                        source: Box::new(failure.error),
                    };
                    error!("{} (stage {})", err, stage);
                    TaskOutcome::Failed(TaskFailure {
                        task: task.clone(),
                        attempts,
                        stage,
                        error: err.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(
        &self,
        node: &NodeContext,
        task: &TaskId,
        attempt: u32,
    ) -> Result<AttemptOutput, StageFailure> {
        let settings = Arc::clone(&self.manager.settings);
        let mut lifecycle = TaskLifecycle::new(task.clone(), attempt);

        // Reading
        let (train, test) = match self.read_split(node, task).await {
            Ok(tables) => tables,
            Err(error) => return Err(fail(&mut lifecycle, error)),
        };
        if let Err(e) = lifecycle.advance(TaskEvent::Succeeded) {
            return Err(fail(&mut lifecycle, e.into()));
        }

        // Pipeline stages run on a blocking thread; the lifecycle travels along
        let pipeline = Arc::clone(&self.manager.pipeline);
        let stage_settings = Arc::clone(&settings);
        let group_key = task.group_key.clone();
        let raw_test = test.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = run_stages(
                &mut lifecycle,
                pipeline.as_ref(),
                &stage_settings,
                &group_key,
                &train,
                &raw_test,
            );
            (lifecycle, result)
        })
        .await;
        let (mut lifecycle, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                return Err(StageFailure {
                    stage: TaskStage::PreprocessTrain,
                    error: EvalError::Executor(format!("stage thread failed: {}", e)),
                })
            }
        };
        let output = result?;

        let mut artifact = None;
        if settings.return_predictions {
            let dir = node.local_dir.join(&settings.predictions_dirname);
            match record_predictions(
                &dir,
                task,
                &test,
                &output.predictions,
                &settings.identity_column,
                &settings.prediction_column,
            )
            .await
            {
                Ok(written) => artifact = Some(written.path),
                Err(error) => return Err(fail(&mut lifecycle, error)),
            }
            if let Err(e) = lifecycle.advance(TaskEvent::Succeeded) {
                return Err(fail(&mut lifecycle, e.into()));
            }
        }

        let timings = lifecycle
            .durations()
            .iter()
            .map(|(stage, duration)| StageTiming {
                stage: *stage,
                duration: *duration,
            })
            .collect();

        Ok(AttemptOutput {
            record: ResultRecord {
                group_key: task.group_key.clone(),
                split_index: task.split_index,
                evaluation_result: output.evaluation,
                prediction_count: output.prediction_count,
            },
            artifact,
            timings,
        })
    }

    /// Open a fresh store handle and read the task's train and test rows
    async fn read_split(&self, node: &NodeContext, task: &TaskId) -> Result<(Table, Table), EvalError> {
        let cv = &self.manager.settings.cross_validation;
        let store = self.stores.open(node).await?;
        let ordering = store.read_ordering(&task.group_key).await?;
        let splitter =
            CrossValidationSplitter::new(cv.scheme, cv.train_window, cv.test_window, &ordering)
                .map_err(|source| EvalError::Scheme {
                    group_key: task.group_key.clone(),
                    source,
                })?;
        let split = splitter
            .nth_split(task.split_index)
            .map_err(|source| EvalError::SplitIndex {
                group_key: task.group_key.clone(),
                source,
            })?;

        let train = store.read(&task.group_key, &split.train).await?;
        let test = store.read(&task.group_key, &split.test).await?;
        Ok((train, test))
    }
}

/// Run the five pipeline operations in order
fn run_stages<P: Pipeline>(
    lifecycle: &mut TaskLifecycle,
    pipeline: &P,
    settings: &super::settings::TaskSettings,
    group_key: &str,
    train: &Table,
    test: &Table,
) -> Result<StageOutput, StageFailure> {
    let features = match settings.feature_names_for(group_key) {
        Ok(features) => features,
        Err(error) => return Err(fail(lifecycle, error)),
    };
    let target = settings.target_name.as_str();

    let prepared_train = run_stage(lifecycle, TaskEvent::Succeeded, || {
        pipeline.preprocess_train_data(train, &settings.user_configs)
    })?;
    let model = run_stage(lifecycle, TaskEvent::Succeeded, || {
        pipeline.model_fit(
            &prepared_train,
            &settings.hyperparameters,
            &settings.estimator,
            features,
            target,
        )
    })?;
    let prepared_test = run_stage(lifecycle, TaskEvent::Succeeded, || {
        pipeline.preprocess_test_data(test, &prepared_train, &settings.user_configs)
    })?;
    let predictions = run_stage(lifecycle, TaskEvent::Succeeded, || {
        pipeline.model_predict(&prepared_test, &model, features, target)
    })?;
    let after_evaluate = if settings.return_predictions {
        TaskEvent::Succeeded
    } else {
        TaskEvent::PredictionsSkipped
    };
    let evaluation = run_stage(lifecycle, after_evaluate, || {
        pipeline.evaluate_prediction(&prepared_test, &predictions)
    })?;

    Ok(StageOutput {
        prediction_count: predictions.num_rows(),
        evaluation,
        predictions,
    })
}

/// Run one user operation, turning errors and panics into stage failures
fn run_stage<T>(
    lifecycle: &mut TaskLifecycle,
    on_success: TaskEvent,
    operation: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, StageFailure> {
    let stage = lifecycle.stage();
    let result = match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(EvalError::Pipeline { stage, source }),
        Err(payload) => Err(EvalError::StagePanic {
            stage,
            message: panic_message(payload.as_ref()),
        }),
    };
    match result {
        Ok(value) => match lifecycle.advance(on_success) {
            Ok(_) => Ok(value),
            Err(e) => Err(fail(lifecycle, e.into())),
        },
        Err(error) => Err(fail(lifecycle, error)),
    }
}

/// Move the lifecycle to `Failed`, keeping the stage the error happened in
fn fail(lifecycle: &mut TaskLifecycle, error: EvalError) -> StageFailure {
    let stage = lifecycle.stage();
    let _ = lifecycle.advance(TaskEvent::Failed);
    StageFailure { stage, error }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
