//! Core error types for scrapbook-core.
//!
//! This module defines the error hierarchy using thiserror. The gateway maps
//! each variant onto an HTTP-like status code; storage failures propagate to
//! the caller of the operation that triggered them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for scrapbook-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bad input from a caller (400).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown route or a missing document that was expected to exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A known route was called with the wrong method (405).
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Malformed request body (400).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Notification delivery failed. Logged by the notifier, never surfaced
    /// to API callers.
    #[error("Transport error for '{endpoint}': {message}")]
    Transport { endpoint: String, message: String },

    /// Settings-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document or attachment store failure.
    #[error("Storage error for '{id}': {source}")]
    Storage {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    /// Wrap an IO error raised while touching the document `id`.
    ///
    /// `NotFound` IO errors become [`CoreError::NotFound`] so that a missing
    /// document surfaces as a 404 rather than an internal fault.
    pub fn storage(id: impl Into<String>, source: std::io::Error) -> Self {
        let id = id.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            CoreError::NotFound(id)
        } else {
            CoreError::Storage { id, source }
        }
    }
}

/// Settings-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load settings
    #[error("Failed to load settings from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save settings
    #[error("Failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown settings key
    #[error("Unknown settings key: {0}")]
    UnknownKey(String),

    /// No usable data directory
    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Question title missing or whitespace-only
    #[error("Question title must not be empty")]
    EmptyTitle,

    /// Title the document format cannot represent
    #[error("Invalid question title '{title}': {message}")]
    InvalidTitle { title: String, message: String },

    /// Title already present in the Active or Pending section
    #[error("A question titled '{0}' is already queued")]
    DuplicateTitle(String),

    /// Document identifier escaping the vault
    #[error("Invalid document path '{0}'")]
    InvalidPath(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = CoreError::storage(
            "questions.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, CoreError::NotFound(id) if id == "questions.md"));
    }

    #[test]
    fn other_io_failures_stay_storage_errors() {
        let err = CoreError::storage(
            "questions.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, CoreError::Storage { .. }));
        assert!(err.to_string().contains("questions.md"));
    }
}
