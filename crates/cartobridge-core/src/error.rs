//! Error types for the cartobridge map bridge.
//!
//! Every error is serializable so it can be forwarded to the host as the
//! `error` member of a reply envelope. The wire-level codes returned by
//! [`BridgeError::code`] are stable strings the host can match on.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias using BridgeError as the error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Stable wire code: a plugin panicked while handling the command.
pub const CODE_PLUGIN_PANIC: &str = "plugin_panic";
/// Stable wire code: the reply slot was dropped without an answer.
pub const CODE_REPLY_DROPPED: &str = "reply_dropped";
/// Stable wire code: the map backend reported a failure.
pub const CODE_MAP_ERROR: &str = "map_error";
/// Stable wire code: the request is understood but not supported here.
pub const CODE_UNSUPPORTED: &str = "unsupported";
/// Stable wire code: the envelope or its arguments could not be understood.
pub const CODE_BAD_REQUEST: &str = "bad_request";

/// Top-level error type for all bridge operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or missing command arguments
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    /// Failures reported by the map backend
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The addressed map instance does not exist
    #[error("Unknown map instance {0}")]
    UnknownMap(i64),
}

impl BridgeError {
    /// Wire-level code used when the error is forwarded to the host.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Map(MapError::Unsupported { .. }) => CODE_UNSUPPORTED,
            BridgeError::Map(_) => CODE_MAP_ERROR,
            BridgeError::Argument(_) | BridgeError::UnknownMap(_) => CODE_BAD_REQUEST,
            BridgeError::Config(_) | BridgeError::Io(_) => CODE_MAP_ERROR,
        }
    }
}

/// Errors raised while decoding command arguments.
///
/// The dispatcher treats most of these permissively (the command is ignored
/// and answered with null), but the typed form keeps the reason loggable.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq)]
pub enum ArgumentError {
    /// A required argument is absent
    #[error("Missing argument '{name}'")]
    Missing { name: String },

    /// An argument has the wrong JSON type
    #[error("Argument '{name}' has wrong type, expected {expected}")]
    WrongType { name: String, expected: String },

    /// An argument has an unusable value
    #[error("Invalid value for argument '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

impl ArgumentError {
    /// Creates a missing argument error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    /// Creates a wrong type error.
    pub fn wrong_type(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::WrongType {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by a map backend.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq)]
pub enum MapError {
    /// No style is loaded yet
    #[error("Style is not loaded")]
    StyleNotLoaded,

    /// A source id is already taken
    #[error("Source '{id}' already exists")]
    SourceExists { id: String },

    /// A layer id is already taken
    #[error("Layer '{id}' already exists")]
    LayerExists { id: String },

    /// A layer references a source that is not in the style
    #[error("Layer '{layer}' references missing source '{source_id}'")]
    MissingSource { layer: String, source_id: String },

    /// The backend does not support the operation
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    /// A backend operation failed
    #[error("Backend operation '{operation}' failed: {reason}")]
    Backend { operation: String, reason: String },
}

impl MapError {
    /// Creates an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates a backend failure error.
    pub fn backend(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// A plugin named in the configuration is not known
    #[error("Unknown plugin '{name}'")]
    UnknownPlugin { name: String },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a validation failed error.
    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}

/// Wrapper for I/O errors to make them serializable.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("I/O error: {kind}: {message}")]
pub struct IoError {
    pub kind: String,
    pub message: String,
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        Self {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for BridgeError {
    fn from(err: io::Error) -> Self {
        BridgeError::Io(err.into())
    }
}
