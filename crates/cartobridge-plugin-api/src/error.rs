use cartobridge_core::error::{ArgumentError, MapError};
use cartobridge_core::MapId;
use thiserror::Error;

/// Plugin system error types
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("No plugins registered for {0}")]
    UnknownInstance(MapId),

    #[error("Invalid options for plugin '{plugin}': {reason}")]
    InvalidOptions { plugin: String, reason: String },

    #[error("Failed to build plugin '{plugin}': {reason}")]
    BuildFailed { plugin: String, reason: String },

    #[error("Plugin '{plugin}' panicked during {phase}")]
    Panicked { plugin: String, phase: &'static str },

    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Map error: {0}")]
    Map(#[from] MapError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl PluginError {
    pub fn invalid_options(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    pub fn build_failed(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BuildFailed {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
