//! Non-blocking task submission with completion-ordered results

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Executor, NodeContext};
use crate::error::EvalResult;

/// Counts after [`TaskQueue::join`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub completed: usize,
    /// Jobs whose worker died before producing a result
    pub lost: usize,
}

/// Snapshot of a queue's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProgress {
    pub submitted: usize,
    pub completed: usize,
}

impl QueueProgress {
    pub fn pending(&self) -> usize {
        self.submitted.saturating_sub(self.completed)
    }
}

/// Queue of jobs running on an [`Executor`]
///
/// Results are collected in the order jobs finish, not the order they
/// were put.
pub struct TaskQueue<T> {
    handles: Vec<JoinHandle<()>>,
    results: Arc<Mutex<Vec<T>>>,
    submitted: usize,
    completed: Arc<AtomicUsize>,
}

impl<T: Send + 'static> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            results: Arc::new(Mutex::new(Vec::new())),
            submitted: 0,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Submit a job without waiting for it
    pub fn put_task<E, F, Fut>(&mut self, executor: &E, job: F) -> EvalResult<()>
    where
        E: Executor,
        F: FnOnce(NodeContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let results = Arc::clone(&self.results);
        let completed = Arc::clone(&self.completed);
        let handle = executor.submit(move |node| async move {
            let value = job(node).await;
            results.lock().await.push(value);
            completed.fetch_add(1, Ordering::SeqCst);
        })?;
        self.handles.push(handle);
        self.submitted += 1;
        debug!("Queued task {}", self.submitted);
        Ok(())
    }

    /// Jobs submitted but not yet collected by [`join`](Self::join)
    pub fn outstanding(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every submitted job
    pub async fn join(&mut self) -> QueueSummary {
        let mut pending: FuturesUnordered<_> = self.handles.drain(..).collect();
        let mut summary = QueueSummary::default();

        while let Some(joined) = pending.next().await {
            match joined {
                Ok(()) => summary.completed += 1,
                Err(e) => {
                    error!("Worker task lost: {}", e);
                    summary.lost += 1;
                }
            }
        }

        info!(
            "Task queue drained: {} completed, {} lost",
            summary.completed, summary.lost
        );
        summary
    }

    /// Take the results collected so far, in completion order
    pub async fn get_results(&self) -> Vec<T> {
        std::mem::take(&mut *self.results.lock().await)
    }

    pub fn progress(&self) -> QueueProgress {
        QueueProgress {
            submitted: self.submitted,
            completed: self.completed.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::WorkerPool;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::local(dir.path(), 3);
        let mut queue = TaskQueue::new();

        for (value, delay) in [(1, 60u64), (2, 5), (3, 30)] {
            queue.put_task(&pool, move |_| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                value
            })
            .unwrap();
        }

        let summary = queue.join().await;
        assert_eq!(summary, QueueSummary { completed: 3, lost: 0 });
        assert_eq!(queue.get_results().await, vec![2, 3, 1]);
        assert!(queue.get_results().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_job_is_counted_lost() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::local(dir.path(), 2);
        let mut queue = TaskQueue::new();

        queue.put_task(&pool, |_| async { 1 }).unwrap();
        queue
            .put_task(&pool, |_| async {
                if true {
                    panic!("worker died");
                }
                2
            })
            .unwrap();

        let summary = queue.join().await;
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.lost, 1);
        assert_eq!(queue.get_results().await, vec![1]);
        assert_eq!(queue.progress().pending(), 1);
    }

    #[tokio::test]
    async fn test_progress_counts() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::local(dir.path(), 1);
        let mut queue: TaskQueue<usize> = TaskQueue::new();
        assert_eq!(queue.progress(), QueueProgress::default());

        for i in 0..4 {
            queue.put_task(&pool, move |_| async move { i }).unwrap();
        }
        assert_eq!(queue.progress().submitted, 4);
        assert_eq!(queue.outstanding(), 4);
        queue.join().await;
        assert_eq!(queue.outstanding(), 0);
        assert_eq!(
            queue.progress(),
            QueueProgress {
                submitted: 4,
                completed: 4
            }
        );
    }

    #[tokio::test]
    async fn test_put_task_on_shut_down_pool_fails() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::local(dir.path(), 1);
        let mut queue: TaskQueue<usize> = TaskQueue::new();
        pool.shutdown();

        assert!(queue.put_task(&pool, |_| async { 1 }).is_err());
        assert_eq!(queue.progress().submitted, 0);
        assert_eq!(queue.outstanding(), 0);
    }
}
