//! Error types for voxstream.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    // Lifecycle errors
    #[error("Client already started")]
    AlreadyStarted,

    #[error("Client not started")]
    NotStarted,

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Transport errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // Sink errors
    #[error("Output sink closed: {message}")]
    SinkClosed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxError>;
