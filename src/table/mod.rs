//! In-memory columnar tables
//!
//! `Table` is the unit of data exchanged between the grouped store and the
//! user pipeline stages. Columns are typed as numeric (`f64`), datetime
//! (`DateTime<Utc>`) or text, which is exactly the split the store layout
//! needs: numeric columns are packed into one block, the others are kept
//! one array per column.

pub mod csv;
mod join;

pub use join::{count_unmatched, inner_join_on};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Errors raised while building or transforming tables
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{column}' is {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Row position {position} out of range for table with {rows} rows")]
    RowOutOfRange { position: usize, rows: usize },

    #[error("CSV error: {0}")]
    Csv(String),
}

/// Typed storage for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Datetime(Vec<DateTime<Utc>>),
    Text(Vec<String>),
}

impl ColumnData {
    /// Number of rows held by the column
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Datetime(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the column type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::Datetime(_) => "datetime",
            Self::Text(_) => "text",
        }
    }

    /// Select rows by position; callers validate positions beforehand
    fn take_unchecked(&self, positions: &[usize]) -> Self {
        match self {
            Self::Numeric(values) => Self::Numeric(positions.iter().map(|&p| values[p]).collect()),
            Self::Datetime(values) => {
                Self::Datetime(positions.iter().map(|&p| values[p]).collect())
            }
            Self::Text(values) => {
                Self::Text(positions.iter().map(|&p| values[p].clone()).collect())
            }
        }
    }

    /// Render a single cell as a partition key
    fn key_at(&self, row: usize) -> String {
        match self {
            Self::Numeric(values) => values[row].to_string(),
            Self::Datetime(values) => values[row].to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Text(values) => values[row].clone(),
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn datetime(name: impl Into<String>, values: Vec<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Datetime(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered collection of equally long, uniquely named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, validating column names and lengths
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        let mut table = Self::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Number of rows (zero for a table without columns)
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Borrow a numeric column by name
    pub fn numeric(&self, name: &str) -> TableResult<&[f64]> {
        let column = self
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        match &column.data {
            ColumnData::Numeric(values) => Ok(values),
            other => Err(TableError::TypeMismatch {
                column: name.to_string(),
                expected: "numeric",
                actual: other.type_name(),
            }),
        }
    }

    /// Append a column, enforcing unique names and equal row counts
    pub fn push_column(&mut self, column: Column) -> TableResult<()> {
        if self.column(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if let Some(first) = self.columns.first() {
            let actual = column.len();
            if first.len() != actual {
                return Err(TableError::LengthMismatch {
                    column: column.name,
                    expected: first.len(),
                    actual,
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    /// Select rows in the given order; repeated positions are allowed
    pub fn take(&self, positions: &[usize]) -> TableResult<Table> {
        let rows = self.num_rows();
        if let Some(&position) = positions.iter().find(|&&p| p >= rows) {
            return Err(TableError::RowOutOfRange { position, rows });
        }
        Ok(Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take_unchecked(positions),
                })
                .collect(),
        })
    }

    /// Reorder columns to match `names`; every name must exist
    pub fn select_columns(&self, names: &[&str]) -> TableResult<Table> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(*name) {
                return Err(TableError::DuplicateColumn(name.to_string()));
            }
            let column = self
                .column(name)
                .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
            columns.push(column.clone());
        }
        Ok(Table { columns })
    }

    /// Partition rows by the values of `key_column`
    ///
    /// Groups come back sorted by key; rows keep their input order within
    /// each group.
    pub fn partition_by(&self, key_column: &str) -> TableResult<BTreeMap<String, Table>> {
        let key = self
            .column(key_column)
            .ok_or_else(|| TableError::MissingColumn(key_column.to_string()))?;

        let mut positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for row in 0..self.num_rows() {
            positions.entry(key.data.key_at(row)).or_default().push(row);
        }

        positions
            .into_iter()
            .map(|(group, rows)| Ok((group, self.take(&rows)?)))
            .collect()
    }
}
