//! Store providers handing out per-attempt store handles

use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use super::backends::{FileBackend, MemoryBackend};
use super::config::{StoreBackendKind, StoreConfig};
use super::error::StorageResult;
use super::grouped::GroupedColumnStore;
use super::traits::{ArrayBackend, StoreProvider};
use crate::queue::NodeContext;

/// Create a fresh, empty backend for building a store
///
/// File stores live at `<local_dir>/<dirname>`.
pub async fn create_backend(
    config: &StoreConfig,
    node: &NodeContext,
) -> StorageResult<Arc<dyn ArrayBackend>> {
    match config.backend {
        StoreBackendKind::File => {
            let backend = FileBackend::create(node.local_dir.join(&config.dirname)).await?;
            Ok(Arc::new(backend))
        }
        StoreBackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}

/// Re-opens the file store under each node's local directory
#[derive(Debug, Clone)]
pub struct FileStoreProvider {
    dirname: String,
}

impl FileStoreProvider {
    pub fn new(dirname: impl Into<String>) -> Self {
        Self {
            dirname: dirname.into(),
        }
    }
}

#[async_trait]
impl StoreProvider for FileStoreProvider {
    async fn open(&self, node: &NodeContext) -> StorageResult<GroupedColumnStore> {
        let root = node.local_dir.join(&self.dirname);
        trace!("Opening store at {} on {}", root.display(), node.node_id);
        let backend = FileBackend::open(root).await?;
        GroupedColumnStore::open(Arc::new(backend)).await
    }
}

/// Hands out one shared store handle, for single-process runs
#[derive(Debug, Clone)]
pub struct SharedStoreProvider {
    store: GroupedColumnStore,
}

impl SharedStoreProvider {
    pub fn new(store: GroupedColumnStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreProvider for SharedStoreProvider {
    async fn open(&self, _node: &NodeContext) -> StorageResult<GroupedColumnStore> {
        Ok(self.store.clone())
    }
}
