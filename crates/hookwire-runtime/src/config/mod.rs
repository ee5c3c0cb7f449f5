//! Configuration for the Hookwire runtime.
//!
//! Configuration is layered with figment (see [`ConfigLoader`]) and checked
//! with [`validate_config`] before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, LEGACY_URL_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    HookwireConfig, LegacyConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RouterConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
