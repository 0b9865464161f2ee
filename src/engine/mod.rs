//! Coordinator of an evaluation run
//!
//! Builds the store once, provisions it to every node, submits one task
//! per (group, split) and gathers the outcomes into an
//! [`EvaluationReport`].

pub mod report;
pub mod workspace;

pub use report::{EvaluationReport, SkippedGroup};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EvaluationConfig;
use crate::cv::CrossValidationSplitter;
use crate::error::{EvalError, EvalResult};
use crate::queue::{Executor, TaskQueue, WorkerPool};
use crate::store::{
    create_backend, DirectoryTransport, FileStoreProvider, GroupedColumnStore,
    SharedStoreProvider, StoreBackendKind, StoreBuilder, StoreProvider, StoreTransport,
};
use crate::table::Table;
use crate::task::{Pipeline, TaskGraph, TaskId, TaskManager, TaskOutcome, TaskSettings};

/// What `run_evaluation` submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub tasks: usize,
    pub groups: usize,
    pub skipped_groups: usize,
}

/// Runs cross-validated evaluations of one pipeline
pub struct EvaluationEngine<P: Pipeline> {
    config: EvaluationConfig,
    manager: TaskManager<P>,
    pool: Option<WorkerPool>,
    queue: TaskQueue<TaskOutcome>,
    skipped: Vec<SkippedGroup>,
    started: Option<Instant>,
}

impl<P: Pipeline> EvaluationEngine<P> {
    /// Validate the configuration; nothing touches disk yet
    pub fn new(config: EvaluationConfig, pipeline: P) -> EvalResult<Self> {
        config.validate()?;
        let manager = TaskManager::new(TaskSettings::from_config(&config), Arc::new(pipeline));
        Ok(Self {
            config,
            manager,
            pool: None,
            queue: TaskQueue::new(),
            skipped: Vec::new(),
            started: None,
        })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.config.workspace_dir()
    }

    /// Build and provision the store for `data`, then submit every task
    ///
    /// Returns once tasks are submitted; collect them with
    /// [`get_evaluation_results`](Self::get_evaluation_results). Running
    /// again starts over with a fresh workspace and worker pool; tasks of
    /// a previous run that were never collected are awaited and discarded
    /// first.
    pub async fn run_evaluation(&mut self, data: &Table) -> EvalResult<Submission> {
        let started = Instant::now();
        self.discard_uncollected().await;
        self.started = Some(started);
        self.queue = TaskQueue::new();
        self.skipped.clear();

        if let Some(previous) = self.pool.take() {
            debug!("Restarting worker pool");
            previous.shutdown();
        }

        let workspace = self.config.workspace_dir();
        info!("Starting evaluation run {}", self.config.run_id);
        if workspace::recreate(&workspace).await? {
            info!("Replaced the workspace of a previous run");
        }

        let pool = WorkerPool::start(&self.config.resources, &workspace).await?;

        let store = self.build_store(&pool, data).await?;
        self.provision(&pool, &store).await?;

        if self.config.debug_mode {
            info!("Debug mode: store built and provisioned, no tasks submitted");
            self.pool = Some(pool);
            return Ok(Submission::default());
        }

        if let Some(link) = pool.dashboard_link() {
            info!("Progress dashboard: {}", link);
        }

        let stores: Arc<dyn StoreProvider> = match self.config.store.backend {
            StoreBackendKind::File => Arc::new(FileStoreProvider::new(&self.config.store.dirname)),
            StoreBackendKind::Memory => Arc::new(SharedStoreProvider::new(store.clone())),
        };
        let graph = Arc::new(TaskGraph::new(self.manager.clone(), stores));

        let cv = &self.config.cross_validation;
        let mut submission = Submission::default();
        for group_key in store.group_keys() {
            let ordering = store.read_ordering(group_key).await?;
            let splitter = match CrossValidationSplitter::new(
                cv.scheme,
                cv.train_window,
                cv.test_window,
                &ordering,
            ) {
                Ok(splitter) => splitter,
                Err(e) => {
                    warn!("Skipping group '{}': {}", group_key, e);
                    self.skipped.push(SkippedGroup {
                        group_key: group_key.clone(),
                        reason: e.to_string(),
                    });
                    submission.skipped_groups += 1;
                    continue;
                }
            };

            for split_index in 0..splitter.n_splits() {
                let graph = Arc::clone(&graph);
                let task = TaskId::new(group_key.clone(), split_index);
                self.queue
                    .put_task(&pool, move |node| async move { graph.run(&node, task).await })?;
                submission.tasks += 1;
            }
            submission.groups += 1;
        }

        info!(
            "Submitted {} tasks across {} groups in {:?}",
            submission.tasks,
            submission.groups,
            started.elapsed()
        );
        self.pool = Some(pool);
        Ok(submission)
    }

    /// Wait for every submitted task and assemble the report
    ///
    /// The report is also written to `<workspace>/report.json`.
    pub async fn get_evaluation_results(&mut self) -> EvalResult<EvaluationReport> {
        let summary = self.queue.join().await;
        let outcomes = self.queue.get_results().await;
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();

        let report = EvaluationReport::from_outcomes(
            self.config.run_id.clone(),
            outcomes,
            self.skipped.clone(),
            summary.lost,
            elapsed,
        );
        report
            .save(&self.config.workspace_dir().join("report.json"))
            .await?;
        info!("Evaluation run {}: {}", self.config.run_id, report.summary());
        Ok(report)
    }

    /// Wait out tasks of a previous run that nobody collected
    ///
    /// They must finish before the workspace they write into is deleted.
    async fn discard_uncollected(&mut self) {
        let outstanding = self.queue.outstanding();
        if outstanding == 0 {
            return;
        }
        warn!(
            "Previous run was not collected; waiting for {} task(s) before restarting",
            outstanding
        );
        let summary = self.queue.join().await;
        let discarded = self.queue.get_results().await.len();
        warn!(
            "Discarded {} uncollected result(s) of the previous run ({} lost)",
            discarded, summary.lost
        );
    }

    /// Build the store on the coordinator's node
    async fn build_store(&self, pool: &WorkerPool, data: &Table) -> EvalResult<GroupedColumnStore> {
        let backend = create_backend(&self.config.store, pool.local_node()).await?;
        let store = StoreBuilder::new(backend)
            .numeric_dtype(self.config.store.numeric_dtype)
            .build(
                data,
                &self.config.group_key,
                self.config.cross_validation.orderby.as_deref(),
            )
            .await?;
        debug!("Store built on {}", pool.local_node().node_id);
        Ok(store)
    }

    /// Copy the built store to every remote node
    async fn provision(&self, pool: &WorkerPool, store: &GroupedColumnStore) -> EvalResult<()> {
        let remote_nodes = pool.remote_nodes().len();
        let Some(remote) = &self.config.resources.remote else {
            return Ok(());
        };
        if remote_nodes == 0 {
            return Ok(());
        }
        let shared_dir = remote.shared_dir.clone().ok_or_else(|| {
            EvalError::configuration("resources.remote.shared_dir", "must be set")
        })?;
        let root = store.root().ok_or_else(|| {
            EvalError::configuration("store.backend", "remote nodes need a file store")
        })?;

        let transport = Arc::new(DirectoryTransport::new(shared_dir));
        let job_id = self.config.run_id.clone();
        transport.push(root, &job_id).await?;

        let dirname = self.config.store.dirname.clone();
        pool.submit_per_node(move |node| {
            let transport = Arc::clone(&transport);
            let job_id = job_id.clone();
            let dest = node.local_dir.join(&dirname);
            async move {
                if node.is_remote() {
                    transport.pull(&job_id, &dest).await?;
                }
                Ok::<(), EvalError>(())
            }
        })
        .await?;

        info!("Provisioned store to {} remote node(s)", remote_nodes);
        Ok(())
    }
}
