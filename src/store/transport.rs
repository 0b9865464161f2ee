//! Moving a built store to worker nodes

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::error::{StorageError, StorageResult};

/// Uploads a store once and downloads it on each node
#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// Publish the store at `store_root` under `job_id`
    async fn push(&self, store_root: &Path, job_id: &str) -> StorageResult<()>;

    /// Fetch the store published under `job_id` into `dest`, returning its root
    async fn pull(&self, job_id: &str, dest: &Path) -> StorageResult<PathBuf>;
}

/// Transport over a directory every node can reach (NFS-style mount)
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    shared_dir: PathBuf,
}

impl DirectoryTransport {
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
        }
    }

    /// Location of a published store
    pub fn published_path(&self, job_id: &str) -> PathBuf {
        self.shared_dir.join(job_id)
    }
}

#[async_trait]
impl StoreTransport for DirectoryTransport {
    async fn push(&self, store_root: &Path, job_id: &str) -> StorageResult<()> {
        let src = store_root.to_path_buf();
        let dest = self.published_path(job_id);
        let files = tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
            .await
            .map_err(|e| StorageError::unavailable(format!("push task failed: {}", e)))??;
        debug!("Pushed {} files for {}", files, job_id);
        Ok(())
    }

    async fn pull(&self, job_id: &str, dest: &Path) -> StorageResult<PathBuf> {
        let src = self.published_path(job_id);
        let target = dest.to_path_buf();
        let files = tokio::task::spawn_blocking(move || copy_tree(&src, &target))
            .await
            .map_err(|e| StorageError::unavailable(format!("pull task failed: {}", e)))??;
        debug!("Pulled {} files for {} into {}", files, job_id, dest.display());
        Ok(dest.to_path_buf())
    }
}

/// Copy a directory tree verbatim, replacing anything already at `dest`
fn copy_tree(src: &Path, dest: &Path) -> StorageResult<usize> {
    if !src.is_dir() {
        return Err(StorageError::not_found(format!(
            "store directory {}",
            src.display()
        )));
    }
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| StorageError::io(dest.display(), e))?;
    }

    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| StorageError::io(src.display(), e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(StorageError::invalid_input)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| StorageError::io(target.display(), e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| StorageError::io(target.display(), e))?;
            files += 1;
        }
    }
    Ok(files)
}
