//! Read side of the grouped column store

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use super::codec;
use super::error::{StorageError, StorageResult};
use super::traits::ArrayBackend;
use super::types::{
    ArrayDescriptor, ElementType, GroupMetadata, StoreMetadata, NUMERIC_ARRAY, ORDERBY_ARRAY,
};
use crate::cv::OrderingArray;
use crate::table::{Column, Table};

/// Handle to a built store
///
/// Cheap to clone; metadata is loaded once per handle and shared.
#[derive(Clone)]
pub struct GroupedColumnStore {
    backend: Arc<dyn ArrayBackend>,
    metadata: Arc<StoreMetadata>,
}

impl fmt::Debug for GroupedColumnStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedColumnStore")
            .field("backend", &self.backend.kind())
            .field("groups", &self.metadata.group_keys.len())
            .finish()
    }
}

impl GroupedColumnStore {
    /// Open a store by loading its metadata from `backend`
    pub async fn open(backend: Arc<dyn ArrayBackend>) -> StorageResult<Self> {
        let metadata = backend.load_metadata().await?;
        metadata.check_version()?;
        debug!(
            "Opened {} store with {} groups",
            backend.kind(),
            metadata.group_keys.len()
        );
        Ok(Self {
            backend,
            metadata: Arc::new(metadata),
        })
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Group keys in sorted order
    pub fn group_keys(&self) -> &[String] {
        &self.metadata.group_keys
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Filesystem root of a file-backed store
    pub fn root(&self) -> Option<&Path> {
        self.backend.root()
    }

    pub fn row_count(&self, group_key: &str) -> StorageResult<usize> {
        Ok(self.metadata.group(group_key)?.row_count)
    }

    /// Read the rows at `positions` of one group, in the order given
    ///
    /// Columns come back numeric first (block order), then datetime, then
    /// text. Repeated positions are allowed.
    pub async fn read(&self, group_key: &str, positions: &[usize]) -> StorageResult<Table> {
        let group = self.metadata.group(group_key)?;
        if let Some(&position) = positions.iter().find(|&&p| p >= group.row_count) {
            return Err(StorageError::Range {
                location: format!("group '{}'", group_key),
                position,
                rows: group.row_count,
            });
        }
        trace!("Reading {} rows of group {}", positions.len(), group_key);

        let mut columns = Vec::with_capacity(group.column_names().len());

        if !group.numeric_keys.is_empty() {
            let desc = checked_array(group, group_key, NUMERIC_ARRAY, group.numeric_keys.len())?;
            if !desc.element_type.is_float() {
                return Err(role_mismatch(desc, "float"));
            }
            let bytes = self.backend.read_rows(desc, positions).await?;
            let values = codec::decode_numeric_block(
                &bytes,
                group.numeric_keys.len(),
                desc.element_type,
                &desc.location,
            )?;
            for (name, values) in group.numeric_keys.iter().zip(values) {
                columns.push(Column::numeric(name.clone(), values));
            }
        }

        for name in &group.missing_keys.datetime_types {
            let desc = checked_array(group, group_key, name, 1)?;
            if desc.element_type != ElementType::Int64 {
                return Err(role_mismatch(desc, "int64 timestamps"));
            }
            let bytes = self.backend.read_rows(desc, positions).await?;
            columns.push(Column::datetime(
                name.clone(),
                codec::decode_timestamps(&bytes, &desc.location)?,
            ));
        }

        for name in &group.missing_keys.str_types {
            let desc = checked_array(group, group_key, name, 1)?;
            let ElementType::FixedBytes { width } = desc.element_type else {
                return Err(role_mismatch(desc, "fixed-width text"));
            };
            let bytes = self.backend.read_rows(desc, positions).await?;
            columns.push(Column::text(
                name.clone(),
                codec::decode_text(&bytes, width, &desc.location)?,
            ));
        }

        Table::new(columns).map_err(|e| StorageError::corruption(group_key, e))
    }

    /// Read every row of one group in storage order
    pub async fn read_group(&self, group_key: &str) -> StorageResult<Table> {
        let rows = self.row_count(group_key)?;
        let positions: Vec<usize> = (0..rows).collect();
        self.read(group_key, &positions).await
    }

    /// Read the ordering values of one group
    pub async fn read_ordering(&self, group_key: &str) -> StorageResult<OrderingArray> {
        let group = self.metadata.group(group_key)?;
        let desc = checked_array(group, group_key, ORDERBY_ARRAY, 1)?;
        let bytes = self.backend.read_all(desc).await?;
        match desc.element_type {
            ElementType::Float64 => Ok(OrderingArray::Float64(codec::decode_floats(
                &bytes,
                ElementType::Float64,
                &desc.location,
            )?)),
            ElementType::Int64 => Ok(OrderingArray::Int64(codec::decode_i64(
                &bytes,
                &desc.location,
            )?)),
            _ => Err(role_mismatch(desc, "float64 or int64 ordering")),
        }
    }
}

/// Look up an array and check its shape against the group's row count
fn checked_array<'a>(
    group: &'a GroupMetadata,
    group_key: &str,
    name: &str,
    row_len: usize,
) -> StorageResult<&'a ArrayDescriptor> {
    let desc = group.array(group_key, name)?;
    if desc.rows() != group.row_count || desc.row_len() != row_len {
        return Err(StorageError::corruption(
            &desc.location,
            format!(
                "shape {:?} does not match {} rows of {} values",
                desc.shape, group.row_count, row_len
            ),
        ));
    }
    Ok(desc)
}

fn role_mismatch(desc: &ArrayDescriptor, expected: &str) -> StorageError {
    StorageError::corruption(
        &desc.location,
        format!("expected {}, found {:?}", expected, desc.element_type),
    )
}
