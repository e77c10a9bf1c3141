//! Error types for the statuswatch service

/// Errors that can occur in the statuswatch service
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Reload dispatch failed: {0}")]
    Reload(String),
}

/// Result type alias for statuswatch operations
pub type Result<T> = std::result::Result<T, WatchError>;
