//! Error types for the region catalog
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The variants follow the catalog's failure taxonomy:
//!
//! - **not-found**: `NotFound`, `TableNotFound`
//! - **malformed input**: `MalformedRowKey`, `MalformedColumn`, `MalformedAncestry`
//! - **unsupported operation**: `DoNotRetry`
//! - **commit/transport failure**: `CommitFailed`, `Transport`
//!
//! Idempotent no-ops are never errors.

use std::io;
use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Error types for the region catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// I/O error (config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A targeted row or region has no matching data
    #[error("Not found: {0}")]
    NotFound(String),

    /// No catalog row exists for the table at or before the search key
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A row key could not be parsed as a region name
    #[error("Malformed row key {key}: {reason}")]
    MalformedRowKey {
        /// Printable rendering of the offending key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// A column value could not be decoded
    #[error("Malformed column {column}: {reason}")]
    MalformedColumn {
        /// `family:qualifier` of the offending column
        column: String,
        /// What was wrong with it
        reason: String,
    },

    /// A parent-chain blob could not be decoded
    #[error("Malformed ancestry: {0}")]
    MalformedAncestry(String),

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Programming error that must not be retried
    #[error("Do not retry: {0}")]
    DoNotRetry(String),

    /// Atomic multi-row commit failed; nothing was applied
    #[error("Multi-row commit anchored at {anchor} failed: {source}")]
    CommitFailed {
        /// Printable rendering of the anchor row
        anchor: String,
        /// Underlying failure
        #[source]
        source: Box<CatalogError>,
    },

    /// Lower-level store or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Build a `MalformedColumn` error
    pub fn malformed_column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::MalformedColumn {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Build a `MalformedRowKey` error for the given raw key
    pub fn malformed_row_key(key: &[u8], reason: impl Into<String>) -> Self {
        CatalogError::MalformedRowKey {
            key: crate::bytes::to_string_binary(key),
            reason: reason.into(),
        }
    }

    /// Wrap any failure of an atomic commit into the single commit category
    pub fn commit_failed(anchor: &[u8], source: CatalogError) -> Self {
        CatalogError::CommitFailed {
            anchor: crate::bytes::to_string_binary(anchor),
            source: Box::new(source),
        }
    }

    /// Whether a caller may reasonably retry the failed operation
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Io(_) | CatalogError::Transport(_) => true,
            CatalogError::CommitFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether this error reports missing data
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound(_) | CatalogError::TableNotFound(_)
        )
    }
}

impl From<bincode::Error> for CatalogError {
    fn from(e: bincode::Error) -> Self {
        CatalogError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = CatalogError::NotFound("row t,a,1".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Not found"));
        assert!(msg.contains("t,a,1"));
    }

    #[test]
    fn test_error_display_malformed_row_key() {
        let err = CatalogError::malformed_row_key(b"t\xff", "no delimiter");
        let msg = err.to_string();
        assert!(msg.contains("Malformed row key"));
        assert!(msg.contains("t\\xFF"));
        assert!(msg.contains("no delimiter"));
    }

    #[test]
    fn test_commit_failed_wraps_source() {
        let err = CatalogError::commit_failed(b"t,,1.abc.,", CatalogError::Transport("reset".into()));
        let msg = err.to_string();
        assert!(msg.contains("t,,1.abc.,"));
        assert!(msg.contains("reset"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_do_not_retry_is_not_retryable() {
        let err = CatalogError::DoNotRetry("unsupported mutation".into());
        assert!(!err.is_retryable());
        let wrapped = CatalogError::commit_failed(b"row", err);
        assert!(!wrapped.is_retryable());
    }

    #[test]
    fn test_is_not_found() {
        assert!(CatalogError::TableNotFound("t".into()).is_not_found());
        assert!(CatalogError::NotFound("t".into()).is_not_found());
        assert!(!CatalogError::InvalidArgument("t".into()).is_not_found());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: CatalogError = io_err.into();
        assert!(matches!(err, CatalogError::Io(_)));
    }

    #[test]
    fn test_error_from_bincode() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let result: CatalogResult<String> =
            bincode::deserialize(&invalid_data).map_err(|e| e.into());
        assert!(matches!(result, Err(CatalogError::Serialization(_))));
    }
}
