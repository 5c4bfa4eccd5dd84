// ABOUTME: Defines all error types for the undertow library using thiserror.
// ABOUTME: Each fallible concern has its own error enum, unified under UndertowError.

use std::path::PathBuf;

/// Top-level error type for the undertow library.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Cancelled: {0}")]
    Cancelled(#[from] Cancelled),
}

/// Errors from loading the plugin configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the flat-file state store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State file not initialized at {0}")]
    NotInitialized(PathBuf),
}

/// Error returned when a queued admission is abandoned before it is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;
