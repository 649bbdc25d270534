//! Error types for jira-prompts.

use thiserror::Error;

/// Main error type for jira-prompts operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request arguments are missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Prompt name or issue key does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials were rejected by the tracker
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network or remote-service failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote record is missing an attribute the pipeline relies on
    #[error("Schema error: {0}")]
    Schema(String),

    /// Operation invoked on a record in the wrong state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map an HTTP error status from the tracker to an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Auth(format!("HTTP {}: {}", status, message)),
            404 => Error::NotFound(message),
            _ => Error::Transport(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Auth(_) => "auth",
            Error::Transport(_) => "transport",
            Error::Schema(_) => "schema",
            Error::Precondition(_) => "precondition",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Other(_) => "other",
        }
    }
}

/// Result type alias for jira-prompts operations.
pub type Result<T> = std::result::Result<T, Error>;
