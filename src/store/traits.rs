//! Core trait definitions for the grouped store

use async_trait::async_trait;
use std::path::Path;

use super::error::StorageResult;
use super::grouped::GroupedColumnStore;
use super::types::{ArrayDescriptor, StoreMetadata};
use crate::queue::NodeContext;

/// Raw array persistence underneath [`GroupedColumnStore`]
///
/// Backends only move bytes; encoding, layout and validation of decoded
/// values live in the store itself.
#[async_trait]
pub trait ArrayBackend: Send + Sync {
    /// Short backend name for logs ("file", "memory")
    fn kind(&self) -> &'static str;

    /// Load the root metadata object
    async fn load_metadata(&self) -> StorageResult<StoreMetadata>;

    /// Persist the root metadata object
    async fn save_metadata(&self, metadata: &StoreMetadata) -> StorageResult<()>;

    /// Write a whole array at `location`, replacing any previous content
    async fn write_array(&self, location: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Read the rows at `positions`, concatenated in the order given
    ///
    /// Positions must already be validated against `descriptor`. The
    /// backend checks that the stored byte size matches the descriptor.
    async fn read_rows(
        &self,
        descriptor: &ArrayDescriptor,
        positions: &[usize],
    ) -> StorageResult<Vec<u8>>;

    /// Read every row of an array
    async fn read_all(&self, descriptor: &ArrayDescriptor) -> StorageResult<Vec<u8>>;

    /// Filesystem root, when the backend has one
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Opens a store handle for a task attempt on a given node
///
/// File providers re-open the store (and re-read metadata) on every call
/// so a retried attempt never reuses a previous attempt's handle.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn open(&self, node: &NodeContext) -> StorageResult<GroupedColumnStore>;
}
