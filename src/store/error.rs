//! Error types for the grouped column store

use std::fmt;
use thiserror::Error;

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Store error types
///
/// None of these are retried by the store itself; callers decide through
/// [`StorageError::is_retryable`].
#[derive(Error, Debug)]
pub enum StorageError {
    /// A file, group or array referenced by the metadata does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A row position or shape is outside the stored bounds
    #[error("Position {position} out of range for {location} ({rows} rows)")]
    Range {
        location: String,
        position: usize,
        rows: usize,
    },

    /// Metadata and raw array disagree, or bytes cannot be decoded
    #[error("Corrupt array {location}: {reason}")]
    Corruption { location: String, reason: String },

    /// Data handed to the writer cannot be represented in the layout
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed
    #[error("I/O error on {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Metadata serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend cannot serve this request
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found<E: fmt::Display>(item: E) -> Self {
        Self::NotFound(item.to_string())
    }

    /// Create a corruption error
    pub fn corruption<L: fmt::Display, R: fmt::Display>(location: L, reason: R) -> Self {
        Self::Corruption {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<E: fmt::Display>(msg: E) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create an unavailable error
    pub fn unavailable<E: fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Wrap an I/O error, mapping `NotFound` to [`StorageError::NotFound`]
    pub fn io<L: fmt::Display>(location: L, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(location.to_string())
        } else {
            Self::Io {
                location: location.to_string(),
                source,
            }
        }
    }

    /// Check if this is a retryable error
    ///
    /// Missing files count as retryable: on a freshly provisioned node the
    /// store may still be settling.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::NotFound(_) | Self::Unavailable(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
