//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The merged sources could not be extracted into the schema.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// Two webhook rules share an identifier.
    #[error("Duplicate webhook identifier: {0}")]
    DuplicateWebhookId(String),

    /// Two user pattern rules share an identifier.
    #[error("Duplicate parser identifier: {0}")]
    DuplicateParserId(String),

    /// A user pattern rule does not compile.
    #[error("Invalid pattern in parser '{id}': {reason}")]
    InvalidPattern { id: String, reason: String },

    /// Invalid URL format. The URL itself is never included.
    #[error("Invalid URL in {field}: {reason}")]
    InvalidUrl { field: String, reason: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
