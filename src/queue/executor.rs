//! Worker pool execution
//!
//! A [`WorkerPool`] is a set of nodes, each with its own directory and a
//! fixed number of task slots. Remote nodes here are process-local
//! stand-ins with isolated directories; a cluster backend implements
//! [`Executor`] the same way.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{NodeContext, NodeKind};
use crate::config::ResourceConfig;
use crate::error::{EvalError, EvalResult};

/// Runs jobs on worker nodes
#[async_trait]
pub trait Executor: Send + Sync {
    /// Every node of the pool
    fn nodes(&self) -> Vec<NodeContext>;

    /// Schedule `job` on some node; never blocks
    ///
    /// Fails once the executor has been shut down.
    fn submit<T, F, Fut>(&self, job: F) -> EvalResult<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(NodeContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static;

    /// Run `setup` exactly once on every node and wait for all of them
    ///
    /// Returns the first failure after every node has finished.
    async fn submit_per_node<F, Fut>(&self, setup: F) -> EvalResult<()>
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EvalResult<()>> + Send + 'static;

    /// Progress dashboard of the pool, when it has one
    fn dashboard_link(&self) -> Option<String> {
        None
    }
}

struct WorkerNode {
    context: NodeContext,
    slots: Arc<Semaphore>,
    workers: usize,
}

/// Local node plus optional remote nodes, assigned round-robin
pub struct WorkerPool {
    nodes: Vec<WorkerNode>,
    next: AtomicUsize,
    accepting: AtomicBool,
    dashboard: Option<String>,
}

impl WorkerPool {
    /// Start a pool for a run workspace
    ///
    /// The local node works in `workspace` itself; remote node `i` gets
    /// `workspace/nodes/remote-<i>`.
    pub async fn start(resources: &ResourceConfig, workspace: &Path) -> EvalResult<Self> {
        let mut nodes = vec![WorkerNode::new(
            NodeContext::new("local-0", NodeKind::Local, workspace),
            resources.resolved_local_workers(),
        )];

        if let Some(remote) = &resources.remote {
            for i in 0..remote.nodes {
                let dir = workspace.join("nodes").join(format!("remote-{}", i));
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|source| EvalError::Workspace {
                        path: dir.clone(),
                        source,
                    })?;
                nodes.push(WorkerNode::new(
                    NodeContext::new(format!("remote-{}", i), NodeKind::Remote, dir),
                    remote.workers_per_node,
                ));
            }
        }

        let pool = Self {
            nodes,
            next: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            dashboard: resources.dashboard_url.clone(),
        };
        info!(
            "Started worker pool: {} node(s), {} worker slot(s)",
            pool.nodes.len(),
            pool.total_workers()
        );
        Ok(pool)
    }

    /// Single local node pool, mostly for tests
    pub fn local(dir: impl AsRef<Path>, workers: usize) -> Self {
        Self {
            nodes: vec![WorkerNode::new(
                NodeContext::new("local-0", NodeKind::Local, dir.as_ref()),
                workers,
            )],
            next: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            dashboard: None,
        }
    }

    pub fn total_workers(&self) -> usize {
        self.nodes.iter().map(|n| n.workers).sum()
    }

    /// The coordinator's own node
    pub fn local_node(&self) -> &NodeContext {
        &self.nodes[0].context
    }

    pub fn remote_nodes(&self) -> Vec<NodeContext> {
        self.nodes
            .iter()
            .filter(|n| n.context.is_remote())
            .map(|n| n.context.clone())
            .collect()
    }

    /// Stop accepting work
    ///
    /// Jobs already accepted keep their place behind the node's slots.
    pub fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Worker pool shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    fn ensure_accepting(&self) -> EvalResult<()> {
        if self.is_shut_down() {
            return Err(EvalError::Executor(
                "worker pool is shut down and accepts no new jobs".to_string(),
            ));
        }
        Ok(())
    }

    fn pick(&self) -> &WorkerNode {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        &self.nodes[index]
    }
}

impl WorkerNode {
    fn new(context: NodeContext, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            context,
            slots: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    fn spawn<T, Fut>(&self, job: impl FnOnce(NodeContext) -> Fut + Send + 'static) -> JoinHandle<T>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let context = self.context.clone();
        tokio::spawn(async move {
            // slots are never closed, so acquiring only waits
            let _permit = slots.acquire_owned().await;
            job(context).await
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl Executor for WorkerPool {
    fn nodes(&self) -> Vec<NodeContext> {
        self.nodes.iter().map(|n| n.context.clone()).collect()
    }

    fn submit<T, F, Fut>(&self, job: F) -> EvalResult<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(NodeContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.ensure_accepting()?;
        Ok(self.pick().spawn(job))
    }

    async fn submit_per_node<F, Fut>(&self, setup: F) -> EvalResult<()>
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EvalResult<()>> + Send + 'static,
    {
        self.ensure_accepting()?;
        let setup = Arc::new(setup);
        let mut pending: FuturesUnordered<_> = self
            .nodes
            .iter()
            .map(|node| {
                let setup = Arc::clone(&setup);
                let node_id = node.context.node_id.clone();
                let handle = node.spawn(move |context| async move { setup(context).await });
                async move { (node_id, handle.await) }
            })
            .collect();

        let mut first_error = None;
        while let Some((node_id, joined)) = pending.next().await {
            let result = joined
                .map_err(|e| EvalError::Executor(format!("setup on {} failed: {}", node_id, e)))
                .and_then(|r| r);
            match result {
                Ok(()) => debug!("Node {} setup complete", node_id),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn dashboard_link(&self) -> Option<String> {
        self.dashboard.clone()
    }
}
