//! Write side of the grouped column store

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::codec;
use super::config::NumericDtype;
use super::error::{StorageError, StorageResult};
use super::grouped::GroupedColumnStore;
use super::traits::ArrayBackend;
use super::types::{
    ArrayDescriptor, ElementType, GroupMetadata, MissingKeys, StoreMetadata, NUMERIC_ARRAY,
    ORDERBY_ARRAY,
};
use crate::table::{ColumnData, Table};

/// Builds a grouped store from an in-memory table
pub struct StoreBuilder {
    backend: Arc<dyn ArrayBackend>,
    numeric_dtype: NumericDtype,
}

impl StoreBuilder {
    pub fn new(backend: Arc<dyn ArrayBackend>) -> Self {
        Self {
            backend,
            numeric_dtype: NumericDtype::default(),
        }
    }

    /// Element type used for the packed numeric block
    pub fn numeric_dtype(mut self, dtype: NumericDtype) -> Self {
        self.numeric_dtype = dtype;
        self
    }

    /// Partition `table` by `group_key_column` and write every group
    ///
    /// `orderby` names the numeric or datetime column the splitter sorts
    /// on; without it rows are ordered by storage position. Metadata is
    /// written last, so a partially built store cannot be opened.
    pub async fn build(
        &self,
        table: &Table,
        group_key_column: &str,
        orderby: Option<&str>,
    ) -> StorageResult<GroupedColumnStore> {
        validate_columns(table, group_key_column, orderby)?;

        let groups = table
            .partition_by(group_key_column)
            .map_err(StorageError::invalid_input)?;

        let root_location = self
            .backend
            .root()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.backend.kind().to_string());
        let mut metadata = StoreMetadata::new(root_location);

        for (index, (group_key, group)) in groups.into_iter().enumerate() {
            let group_meta = self.write_group(index, &group, orderby).await?;
            debug!(
                "Wrote group {} ({} rows, {} arrays)",
                group_key,
                group_meta.row_count,
                group_meta.arrays.len()
            );
            metadata.group_keys.push(group_key.clone());
            metadata.groups.insert(group_key, group_meta);
        }

        self.backend.save_metadata(&metadata).await?;
        info!(
            "Built {} store with {} groups from {} rows",
            self.backend.kind(),
            metadata.group_keys.len(),
            table.num_rows()
        );

        GroupedColumnStore::open(Arc::clone(&self.backend)).await
    }

    async fn write_group(
        &self,
        index: usize,
        group: &Table,
        orderby: Option<&str>,
    ) -> StorageResult<GroupMetadata> {
        let dir = format!("groups/g{:05}", index);
        let rows = group.num_rows();
        let mut arrays = BTreeMap::new();
        let mut numeric_keys = Vec::new();
        let mut numeric_values: Vec<&[f64]> = Vec::new();
        let mut missing_keys = MissingKeys::default();

        let mut other = 0usize;
        for column in group.columns() {
            match &column.data {
                ColumnData::Numeric(values) => {
                    numeric_keys.push(column.name.clone());
                    numeric_values.push(values);
                }
                ColumnData::Datetime(values) => {
                    let location = format!("{}/c{:03}.bin", dir, other);
                    other += 1;
                    let bytes = codec::encode_timestamps(&column.name, values)?;
                    self.backend.write_array(&location, &bytes).await?;
                    arrays.insert(
                        column.name.clone(),
                        descriptor(location, ElementType::Int64, vec![rows]),
                    );
                    missing_keys.datetime_types.push(column.name.clone());
                }
                ColumnData::Text(values) => {
                    let location = format!("{}/c{:03}.bin", dir, other);
                    other += 1;
                    let (bytes, width) = codec::encode_text(&column.name, values)?;
                    self.backend.write_array(&location, &bytes).await?;
                    arrays.insert(
                        column.name.clone(),
                        descriptor(location, ElementType::FixedBytes { width }, vec![rows]),
                    );
                    missing_keys.str_types.push(column.name.clone());
                }
            }
        }

        if !numeric_keys.is_empty() {
            let element_type = self.numeric_dtype.element_type();
            let location = format!("{}/numeric.bin", dir);
            let bytes = codec::encode_numeric_block(&numeric_values, rows, element_type)?;
            self.backend.write_array(&location, &bytes).await?;
            arrays.insert(
                NUMERIC_ARRAY.to_string(),
                descriptor(location, element_type, vec![rows, numeric_keys.len()]),
            );
        }

        let location = format!("{}/orderby.bin", dir);
        let (element_type, bytes) = match orderby.and_then(|name| group.column(name)) {
            Some(column) => match &column.data {
                ColumnData::Numeric(values) => (ElementType::Float64, codec::encode_f64(values)),
                ColumnData::Datetime(values) => (
                    ElementType::Int64,
                    codec::encode_timestamps(&column.name, values)?,
                ),
                ColumnData::Text(_) => {
                    return Err(StorageError::invalid_input(format!(
                        "order-by column '{}' must be numeric or datetime",
                        column.name
                    )))
                }
            },
            None => {
                let index: Vec<i64> = (0..rows as i64).collect();
                (ElementType::Int64, codec::encode_i64(&index))
            }
        };
        self.backend.write_array(&location, &bytes).await?;
        arrays.insert(
            ORDERBY_ARRAY.to_string(),
            descriptor(location, element_type, vec![rows]),
        );

        Ok(GroupMetadata {
            row_count: rows,
            numeric_keys,
            missing_keys,
            orderby_key: orderby.map(str::to_string),
            arrays,
        })
    }
}

fn descriptor(location: String, element_type: ElementType, shape: Vec<usize>) -> ArrayDescriptor {
    ArrayDescriptor {
        location,
        element_type,
        shape,
    }
}

fn validate_columns(
    table: &Table,
    group_key_column: &str,
    orderby: Option<&str>,
) -> StorageResult<()> {
    if let Some(reserved) = table
        .column_names()
        .into_iter()
        .find(|name| *name == NUMERIC_ARRAY || *name == ORDERBY_ARRAY)
    {
        return Err(StorageError::invalid_input(format!(
            "column name '{}' is reserved by the store layout",
            reserved
        )));
    }
    if table.column(group_key_column).is_none() {
        return Err(StorageError::invalid_input(format!(
            "group key column '{}' not found",
            group_key_column
        )));
    }
    if let Some(name) = orderby {
        match table.column(name).map(|c| &c.data) {
            None => {
                return Err(StorageError::invalid_input(format!(
                    "order-by column '{}' not found",
                    name
                )))
            }
            Some(ColumnData::Text(_)) => {
                return Err(StorageError::invalid_input(format!(
                    "order-by column '{}' must be numeric or datetime",
                    name
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}
