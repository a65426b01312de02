//! # Error Types
//!
//! Structured error types for kfss_core. Every variant carries enough context
//! for the caller to tell the user which field, record or file was involved.
//!
//! ## Example
//!
//! ```rust
//! use kfss_core::errors::{CalcError, CalcResult};
//!
//! fn validate_length(hood_length_m: f64) -> CalcResult<()> {
//!     if hood_length_m <= 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "hood_length_m",
//!             hood_length_m.to_string(),
//!             "Hood length must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for kfss_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// One offending field found while validating an estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldIssue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Structured error type for estimator, store and report operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// One or more required inputs are missing or invalid. Nothing was committed.
    #[error("Validation failed: {}", join_issues(.issues))]
    Validation { issues: Vec<FieldIssue> },

    /// A single input value is invalid (out of range, unparsable, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// No calculation with this id is held in the history
    #[error("Calculation not found: {id}")]
    RecordNotFound { id: u64 },

    /// Appliance id is neither in the catalog nor a known custom appliance
    #[error("Appliance not found: {id}")]
    ApplianceNotFound { id: String },

    /// Persisted data could not be read back
    #[error("Could not read persisted '{key}': {reason}")]
    PersistenceRead { key: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// Data directory is locked by another process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON/TOML serialization or deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CalcError {
    /// Create a Validation error from collected field issues
    pub fn validation(issues: Vec<FieldIssue>) -> Self {
        CalcError::Validation { issues }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a RecordNotFound error
    pub fn record_not_found(id: u64) -> Self {
        CalcError::RecordNotFound { id }
    }

    /// Create an ApplianceNotFound error
    pub fn appliance_not_found(id: impl Into<String>) -> Self {
        CalcError::ApplianceNotFound { id: id.into() }
    }

    /// Create a PersistenceRead error
    pub fn persistence_read(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::PersistenceRead {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Names of the fields rejected by a Validation or InvalidInput error
    pub fn fields(&self) -> Vec<&str> {
        match self {
            CalcError::Validation { issues } => issues.iter().map(|i| i.field.as_str()).collect(),
            CalcError::InvalidInput { field, .. } => vec![field.as_str()],
            _ => Vec::new(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CalcError::FileLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::Validation { .. } => "VALIDATION_ERROR",
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::RecordNotFound { .. } => "NOT_FOUND",
            CalcError::ApplianceNotFound { .. } => "APPLIANCE_NOT_FOUND",
            CalcError::PersistenceRead { .. } => "PERSISTENCE_READ_ERROR",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(e: serde_json::Error) -> Self {
        CalcError::SerializationError {
            reason: e.to_string(),
        }
    }
}
