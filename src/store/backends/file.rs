//! Flat file backend: one file per array plus `metadata.json`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::trace;

use crate::store::{
    error::{StorageError, StorageResult},
    traits::ArrayBackend,
    types::{ArrayDescriptor, StoreMetadata},
};

/// File name of the root metadata object
pub const METADATA_FILE: &str = "metadata.json";

/// File-based array backend rooted at a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open an existing store directory
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let meta = fs::metadata(&root)
            .await
            .map_err(|e| StorageError::io(root.display(), e))?;
        if !meta.is_dir() {
            return Err(StorageError::not_found(format!(
                "store directory {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Create (or reuse) a store directory for writing
    pub async fn create(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::io(root.display(), e))?;
        Ok(Self { root })
    }

    fn path(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    /// Open an array file and check its size against the descriptor
    async fn open_array(&self, descriptor: &ArrayDescriptor) -> StorageResult<fs::File> {
        let path = self.path(&descriptor.location);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::io(&descriptor.location, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(&descriptor.location, e))?
            .len();
        if len != descriptor.byte_len() as u64 {
            return Err(StorageError::corruption(
                &descriptor.location,
                format!(
                    "file holds {} bytes, shape {:?} of {:?} needs {}",
                    len,
                    descriptor.shape,
                    descriptor.element_type,
                    descriptor.byte_len()
                ),
            ));
        }
        Ok(file)
    }
}

/// Group sorted positions into runs of consecutive rows
///
/// Returns `(first_row, run_len, output_slots)`; duplicate positions share
/// a run but keep every output slot.
fn coalesce_runs(positions: &[usize]) -> Vec<(usize, usize, Vec<(usize, usize)>)> {
    let mut order: Vec<(usize, usize)> = positions
        .iter()
        .enumerate()
        .map(|(slot, &row)| (row, slot))
        .collect();
    order.sort_unstable();

    let mut runs: Vec<(usize, usize, Vec<(usize, usize)>)> = Vec::new();
    for (row, slot) in order {
        match runs.last_mut() {
            Some((start, len, slots)) if row < *start + *len => {
                slots.push((row - *start, slot));
            }
            Some((start, len, slots)) if row == *start + *len => {
                *len += 1;
                slots.push((row - *start, slot));
            }
            _ => runs.push((row, 1, vec![(0, slot)])),
        }
    }
    runs
}

#[async_trait]
impl ArrayBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn load_metadata(&self) -> StorageResult<StoreMetadata> {
        let path = self.path(METADATA_FILE);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::io(path.display(), e))?;
        let metadata: StoreMetadata = serde_json::from_str(&content)?;
        metadata.check_version()?;
        Ok(metadata)
    }

    async fn save_metadata(&self, metadata: &StoreMetadata) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(metadata)?;
        self.write_array(METADATA_FILE, content.as_bytes()).await
    }

    async fn write_array(&self, location: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent.display(), e))?;
        }
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| StorageError::io(location, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::io(location, e))?;
        file.flush().await.map_err(|e| StorageError::io(location, e))?;
        trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn read_rows(
        &self,
        descriptor: &ArrayDescriptor,
        positions: &[usize],
    ) -> StorageResult<Vec<u8>> {
        let row_bytes = descriptor.row_bytes();
        let mut out = vec![0u8; positions.len() * row_bytes];
        if row_bytes == 0 || positions.is_empty() {
            return Ok(out);
        }

        let mut file = self.open_array(descriptor).await?;
        let mut buffer = Vec::new();
        for (start, len, slots) in coalesce_runs(positions) {
            buffer.resize(len * row_bytes, 0);
            file.seek(SeekFrom::Start((start * row_bytes) as u64))
                .await
                .map_err(|e| StorageError::io(&descriptor.location, e))?;
            file.read_exact(&mut buffer)
                .await
                .map_err(|e| StorageError::io(&descriptor.location, e))?;
            for (offset, slot) in slots {
                let src = &buffer[offset * row_bytes..(offset + 1) * row_bytes];
                out[slot * row_bytes..(slot + 1) * row_bytes].copy_from_slice(src);
            }
        }
        Ok(out)
    }

    async fn read_all(&self, descriptor: &ArrayDescriptor) -> StorageResult<Vec<u8>> {
        let mut file = self.open_array(descriptor).await?;
        let mut bytes = Vec::with_capacity(descriptor.byte_len());
        file.read_to_end(&mut bytes)
            .await
            .map_err(|e| StorageError::io(&descriptor.location, e))?;
        Ok(bytes)
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::codec;
    use crate::store::types::ElementType;
    use tempfile::TempDir;

    fn descriptor(rows: usize) -> ArrayDescriptor {
        ArrayDescriptor {
            location: "groups/g00000/c000.bin".into(),
            element_type: ElementType::Int64,
            shape: vec![rows],
        }
    }

    #[test]
    fn test_coalesce_runs_merges_neighbours() {
        let runs = coalesce_runs(&[5, 1, 2, 3, 9, 2]);
        let spans: Vec<_> = runs.iter().map(|(s, l, _)| (*s, *l)).collect();
        assert_eq!(spans, vec![(1, 3), (5, 1), (9, 1)]);
        // duplicate row 2 keeps both output slots
        assert_eq!(runs[0].2.iter().filter(|(off, _)| *off == 1).count(), 2);
    }

    #[tokio::test]
    async fn test_read_rows_in_requested_order() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::create(dir.path()).await.unwrap();
        let values: Vec<i64> = (0..10).map(|v| v * 100).collect();
        let desc = descriptor(10);
        backend
            .write_array(&desc.location, &codec::encode_i64(&values))
            .await
            .unwrap();

        let bytes = backend.read_rows(&desc, &[7, 0, 1, 7]).await.unwrap();
        let read = codec::decode_i64(&bytes, "t").unwrap();
        assert_eq!(read, vec![700, 0, 100, 700]);
    }

    #[tokio::test]
    async fn test_size_mismatch_is_corruption() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::create(dir.path()).await.unwrap();
        let desc = descriptor(10);
        backend
            .write_array(&desc.location, &codec::encode_i64(&[1, 2, 3]))
            .await
            .unwrap();

        let err = backend.read_rows(&desc, &[0]).await.unwrap_err();
        assert!(matches!(err, StorageError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_missing_array_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::create(dir.path()).await.unwrap();
        let err = backend.read_all(&descriptor(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_open_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = FileBackend::open(dir.path().join("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
