//! Dispatching tasks to worker nodes and collecting their results

pub mod executor;
pub mod task_queue;

pub use executor::{Executor, WorkerPool};
pub use task_queue::{QueueProgress, QueueSummary, TaskQueue};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a node runs relative to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Local,
    Remote,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Identity and local directory of the node a job runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContext {
    pub node_id: String,
    pub kind: NodeKind,
    /// Node-private directory holding its store copy and artifacts
    pub local_dir: PathBuf,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>, kind: NodeKind, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            local_dir: local_dir.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.kind == NodeKind::Remote
    }
}
