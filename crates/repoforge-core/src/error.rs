//! Error types for repoforge

use thiserror::Error;

/// Core error type for generation operations
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Template '{template}' failed to compile: {message}")]
    Compile { template: String, message: String },

    #[error("Template '{template}' failed to render: {message}")]
    Render { template: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl ForgeError {
    /// True for errors that abort the whole run rather than a single table.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ForgeError::Query(_))
    }
}

/// Result type alias for repoforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;
