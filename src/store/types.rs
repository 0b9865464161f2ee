//! Metadata types describing the grouped store layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{StorageError, StorageResult};

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Array name of the packed numeric block
pub const NUMERIC_ARRAY: &str = "__numeric__";

/// Array name of the per-group ordering values
pub const ORDERBY_ARRAY: &str = "__orderby__";

/// Element encoding of a raw array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementType {
    Float64,
    Float32,
    /// Signed 64-bit integers; datetimes are nanoseconds since the Unix epoch
    Int64,
    /// Zero-padded UTF-8 text of a fixed byte width
    FixedBytes { width: usize },
}

impl ElementType {
    /// Size of one element in bytes
    pub fn width(&self) -> usize {
        match self {
            Self::Float64 | Self::Int64 => 8,
            Self::Float32 => 4,
            Self::FixedBytes { width } => *width,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float64 | Self::Float32)
    }
}

/// Location, encoding and shape of one raw array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    /// Location relative to the store root
    pub location: String,
    pub element_type: ElementType,
    /// `[rows]` for one-dimensional arrays, `[rows, columns]` for blocks
    pub shape: Vec<usize>,
}

impl ArrayDescriptor {
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per row
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Bytes per row
    pub fn row_bytes(&self) -> usize {
        self.row_len() * self.element_type.width()
    }

    /// Expected total size in bytes
    pub fn byte_len(&self) -> usize {
        self.rows() * self.row_bytes()
    }

    /// Check every position against the row count
    pub fn check_positions(&self, positions: &[usize]) -> StorageResult<()> {
        let rows = self.rows();
        match positions.iter().find(|&&p| p >= rows) {
            Some(&position) => Err(StorageError::Range {
                location: self.location.clone(),
                position,
                rows,
            }),
            None => Ok(()),
        }
    }
}

/// Non-numeric columns pulled out of the numeric block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingKeys {
    pub datetime_types: Vec<String>,
    pub str_types: Vec<String>,
}

/// Layout of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub row_count: usize,
    /// Numeric columns in block order
    pub numeric_keys: Vec<String>,
    pub missing_keys: MissingKeys,
    /// Column the ordering array was derived from; `None` means storage order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby_key: Option<String>,
    pub arrays: BTreeMap<String, ArrayDescriptor>,
}

impl GroupMetadata {
    /// Look up an array descriptor by name
    pub fn array(&self, group_key: &str, name: &str) -> StorageResult<&ArrayDescriptor> {
        self.arrays
            .get(name)
            .ok_or_else(|| StorageError::not_found(format!("array '{}' in group '{}'", name, group_key)))
    }

    /// All column names in read order: numeric, datetime, text
    pub fn column_names(&self) -> Vec<&str> {
        self.numeric_keys
            .iter()
            .chain(&self.missing_keys.datetime_types)
            .chain(&self.missing_keys.str_types)
            .map(String::as_str)
            .collect()
    }
}

/// Root metadata object of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub format_version: u32,
    /// Where the store was built; informational, locations are relative
    pub root_location: String,
    /// Group keys in sorted order
    pub group_keys: Vec<String>,
    pub groups: BTreeMap<String, GroupMetadata>,
}

impl StoreMetadata {
    pub fn new(root_location: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            root_location: root_location.into(),
            group_keys: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Look up a group by key
    pub fn group(&self, group_key: &str) -> StorageResult<&GroupMetadata> {
        self.groups
            .get(group_key)
            .ok_or_else(|| StorageError::not_found(format!("group '{}'", group_key)))
    }

    /// Reject metadata written by an incompatible version
    pub fn check_version(&self) -> StorageResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(StorageError::corruption(
                "metadata",
                format!(
                    "unsupported format version {} (expected {})",
                    self.format_version, FORMAT_VERSION
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> ArrayDescriptor {
        ArrayDescriptor {
            location: "groups/g00000/numeric.bin".into(),
            element_type: ElementType::Float64,
            shape: vec![10, 3],
        }
    }

    #[test]
    fn test_descriptor_sizes() {
        let desc = block();
        assert_eq!(desc.rows(), 10);
        assert_eq!(desc.row_len(), 3);
        assert_eq!(desc.row_bytes(), 24);
        assert_eq!(desc.byte_len(), 240);

        let column = ArrayDescriptor {
            location: "c".into(),
            element_type: ElementType::FixedBytes { width: 5 },
            shape: vec![4],
        };
        assert_eq!(column.row_len(), 1);
        assert_eq!(column.byte_len(), 20);
    }

    #[test]
    fn test_check_positions_reports_first_offender() {
        let err = block().check_positions(&[1, 12, 11]).unwrap_err();
        assert!(matches!(err, StorageError::Range { position: 12, rows: 10, .. }));
        assert!(block().check_positions(&[0, 9]).is_ok());
    }

    #[test]
    fn test_element_type_serialization() {
        let json = serde_json::to_string(&ElementType::FixedBytes { width: 7 }).unwrap();
        assert_eq!(json, r#"{"kind":"fixed_bytes","width":7}"#);
        let back: ElementType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ElementType::FixedBytes { width: 7 });
    }

    #[test]
    fn test_missing_group_is_not_found() {
        let meta = StoreMetadata::new("/tmp/store");
        assert!(meta.group("A").unwrap_err().is_not_found());
    }
}
