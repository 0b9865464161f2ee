//! Task execution: one (group, split) evaluated through the user pipeline
//!
//! A task reads its split from the store, threads the tables through the
//! five pipeline operations and optionally records its predictions. Each
//! attempt is atomic and retried according to [`RetryPolicy`].

pub mod graph;
pub mod pipeline;
pub mod predictions;
pub mod retry;
pub mod settings;
pub mod state_machine;
pub mod types;


pub use graph::{StageFailure, TaskGraph};
pub use pipeline::Pipeline;
pub use predictions::{read_prediction_artifact, record_predictions, PredictionArtifact};
pub use retry::{execute_with_retry, RetryPolicy};
pub use settings::{FeatureNames, TaskManager, TaskSettings};
pub use state_machine::{apply_transition, StateError, TaskEvent, TaskLifecycle, TaskStage};
pub use types::{CompletedTask, ResultRecord, StageTiming, TaskFailure, TaskId, TaskOutcome};
