//! Worker pool sizing

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use sysinfo::System;
use tracing::debug;

/// Worker resources of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Concurrent tasks on the local node
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,

    /// Size `local_workers` from the physical core count
    #[serde(default)]
    pub auto: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,

    /// Progress dashboard of the underlying cluster, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

/// Remote worker nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub nodes: usize,

    #[serde(default = "default_workers_per_node")]
    pub workers_per_node: usize,

    /// Directory reachable from every node, used to provision the store
    #[serde(default)]
    pub shared_dir: Option<PathBuf>,
}

fn default_local_workers() -> usize {
    1
}

fn default_workers_per_node() -> usize {
    1
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            local_workers: default_local_workers(),
            auto: false,
            remote: None,
            dashboard_url: None,
        }
    }
}

impl ResourceConfig {
    /// Local worker count after auto-sizing
    pub fn resolved_local_workers(&self) -> usize {
        if !self.auto {
            return self.local_workers;
        }
        let cores = System::physical_core_count()
            .or_else(|| std::thread::available_parallelism().ok().map(|p| p.get()))
            .unwrap_or(1);
        debug!("Auto-sized local workers to {} physical cores", cores);
        cores.max(1)
    }

    pub fn remote_nodes(&self) -> usize {
        self.remote.as_ref().map(|r| r.nodes).unwrap_or(0)
    }

    /// Total concurrent task slots across all nodes
    pub fn total_workers(&self) -> usize {
        self.resolved_local_workers()
            + self
                .remote
                .as_ref()
                .map(|r| r.nodes * r.workers_per_node)
                .unwrap_or(0)
    }
}
