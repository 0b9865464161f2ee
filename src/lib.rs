//! # evalgrid
//!
//! Cross-validated evaluation of a user-supplied model pipeline over a
//! dataset partitioned by a group key, run as one task per (group, split)
//! on a pool of worker nodes.
//!
//! ## Modules
//!
//! - `table` - In-memory columnar tables exchanged with pipeline stages
//! - `store` - Grouped columnar store with file and memory backends
//! - `cv` - Rolling and expanding window cross-validation splits
//! - `task` - Per-task execution through the five pipeline operations, with retry
//! - `queue` - Worker pool and non-blocking task queue
//! - `engine` - Coordinator that builds, provisions, submits and reports
//! - `config` - Run configuration loaded from YAML or TOML
//! - `cli` - Command-line interface of the `evalgrid` binary
//!
//! ```no_run
//! # async fn example<P: evalgrid::task::Pipeline>(pipeline: P, data: evalgrid::table::Table)
//! # -> evalgrid::error::EvalResult<()> {
//! use evalgrid::config::EvaluationConfig;
//! use evalgrid::engine::EvaluationEngine;
//!
//! let config = EvaluationConfig::load("run.yaml".as_ref()).await?;
//! let mut engine = EvaluationEngine::new(config, pipeline)?;
//! engine.run_evaluation(&data).await?;
//! let report = engine.get_evaluation_results().await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod cv;
pub mod engine;
pub mod error;
pub mod queue;
pub mod store;
pub mod table;
pub mod task;

pub use config::EvaluationConfig;
pub use engine::{EvaluationEngine, EvaluationReport};
pub use error::{EvalError, EvalResult};
pub use task::Pipeline;
