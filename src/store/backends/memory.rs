//! In-memory array backend for tests and single-process runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{
    error::{StorageError, StorageResult},
    traits::ArrayBackend,
    types::{ArrayDescriptor, StoreMetadata},
};

/// In-memory array backend
///
/// Clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    arrays: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    metadata: Arc<RwLock<Option<StoreMetadata>>>,
}

impl MemoryBackend {
    /// Create an empty memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored arrays
    pub async fn array_count(&self) -> usize {
        self.arrays.read().await.len()
    }

    /// Overwrite raw bytes of an array (used to simulate corruption in tests)
    pub async fn replace_bytes(&self, location: &str, bytes: Vec<u8>) {
        self.arrays.write().await.insert(location.to_string(), bytes);
    }

    async fn checked_bytes<F, T>(&self, descriptor: &ArrayDescriptor, f: F) -> StorageResult<T>
    where
        F: FnOnce(&[u8]) -> T,
    {
        let arrays = self.arrays.read().await;
        let bytes = arrays
            .get(&descriptor.location)
            .ok_or_else(|| StorageError::not_found(&descriptor.location))?;
        if bytes.len() != descriptor.byte_len() {
            return Err(StorageError::corruption(
                &descriptor.location,
                format!(
                    "buffer holds {} bytes, descriptor needs {}",
                    bytes.len(),
                    descriptor.byte_len()
                ),
            ));
        }
        Ok(f(bytes))
    }
}

#[async_trait]
impl ArrayBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn load_metadata(&self) -> StorageResult<StoreMetadata> {
        self.metadata
            .read()
            .await
            .clone()
            .ok_or_else(|| StorageError::not_found("metadata"))
    }

    async fn save_metadata(&self, metadata: &StoreMetadata) -> StorageResult<()> {
        *self.metadata.write().await = Some(metadata.clone());
        Ok(())
    }

    async fn write_array(&self, location: &str, bytes: &[u8]) -> StorageResult<()> {
        self.arrays
            .write()
            .await
            .insert(location.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_rows(
        &self,
        descriptor: &ArrayDescriptor,
        positions: &[usize],
    ) -> StorageResult<Vec<u8>> {
        let row_bytes = descriptor.row_bytes();
        self.checked_bytes(descriptor, |bytes| {
            let mut out = Vec::with_capacity(positions.len() * row_bytes);
            for &row in positions {
                out.extend_from_slice(&bytes[row * row_bytes..(row + 1) * row_bytes]);
            }
            out
        })
        .await
    }

    async fn read_all(&self, descriptor: &ArrayDescriptor) -> StorageResult<Vec<u8>> {
        self.checked_bytes(descriptor, <[u8]>::to_vec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::codec;
    use crate::store::types::ElementType;

    #[tokio::test]
    async fn test_clones_share_buffers() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.write_array("a", &[1, 2, 3]).await.unwrap();
        assert_eq!(clone.array_count().await, 1);
    }

    #[tokio::test]
    async fn test_read_rows_and_missing_metadata() {
        let backend = MemoryBackend::new();
        let desc = ArrayDescriptor {
            location: "x".into(),
            element_type: ElementType::Float64,
            shape: vec![3],
        };
        backend
            .write_array("x", &codec::encode_f64(&[1.0, 2.0, 3.0]))
            .await
            .unwrap();

        let bytes = backend.read_rows(&desc, &[2, 0]).await.unwrap();
        let values = codec::decode_floats(&bytes, ElementType::Float64, "x").unwrap();
        assert_eq!(values, vec![3.0, 1.0]);
        assert!(backend.load_metadata().await.unwrap_err().is_not_found());
    }
}
