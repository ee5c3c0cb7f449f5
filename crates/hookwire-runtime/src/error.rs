//! Runtime error types.

use hookwire_core::TransportError;
use hookwire_framework::RegistryError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured rule could not be registered.
    #[error("Failed to register rule: {0}")]
    Registry(#[from] RegistryError),

    /// The webhook transport could not be created.
    #[error("Failed to create webhook transport: {0}")]
    Transport(#[from] TransportError),

    /// No transport was supplied and the built-in HTTP client is disabled.
    #[error("No webhook transport: enable the http-client feature or supply one")]
    NoTransport,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
