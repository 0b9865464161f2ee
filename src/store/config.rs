//! Store configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::StorageError;
use super::types::ElementType;

/// Store backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// One file per array under a store directory (default)
    #[default]
    File,
    /// Process-local buffers (for testing and single-node runs)
    Memory,
}

/// Element type of the packed numeric block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericDtype {
    #[default]
    Float64,
    Float32,
}

impl NumericDtype {
    pub fn element_type(self) -> ElementType {
        match self {
            Self::Float64 => ElementType::Float64,
            Self::Float32 => ElementType::Float32,
        }
    }
}

impl fmt::Display for NumericDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float64 => write!(f, "float64"),
            Self::Float32 => write!(f, "float32"),
        }
    }
}

impl FromStr for NumericDtype {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float64" | "f64" => Ok(Self::Float64),
            "float32" | "f32" => Ok(Self::Float32),
            other => Err(StorageError::invalid_input(format!(
                "unknown numeric dtype '{}'",
                other
            ))),
        }
    }
}

/// Store settings of an evaluation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,

    #[serde(default)]
    pub numeric_dtype: NumericDtype,

    /// Directory name of the store inside a node's local directory
    #[serde(default = "default_dirname")]
    pub dirname: String,
}

fn default_dirname() -> String {
    "store".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            numeric_dtype: NumericDtype::default(),
            dirname: default_dirname(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: StoreConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.dirname, "store");
    }

    #[test]
    fn test_dtype_parsing() {
        assert_eq!("Float32".parse::<NumericDtype>().unwrap(), NumericDtype::Float32);
        assert!("int8".parse::<NumericDtype>().is_err());
        assert_eq!(NumericDtype::Float32.element_type(), ElementType::Float32);
    }
}
