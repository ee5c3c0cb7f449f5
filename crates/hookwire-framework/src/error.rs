//! Error types for the Hookwire framework.

use thiserror::Error;

/// Errors raised while loading a pattern rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    /// The rule's regex does not compile.
    #[error("pattern rule '{id}' has an invalid regex: {reason}")]
    InvalidPattern {
        /// Rule identifier.
        id: String,
        /// Compiler message.
        reason: String,
    },

    /// A field refers to a capture group the regex does not have.
    #[error(
        "pattern rule '{id}' maps field '{field}' to group {group}, but the pattern has only {available} group(s)"
    )]
    FieldOutOfRange {
        /// Rule identifier.
        id: String,
        /// Offending field name.
        field: String,
        /// Capture group the field maps to.
        group: usize,
        /// Number of capture groups in the pattern.
        available: usize,
    },

    /// A rule with the same identifier is already loaded.
    #[error("pattern rule '{0}' is already registered")]
    DuplicateId(String),
}

/// Errors raised by [`RuleRegistry`](crate::RuleRegistry) mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No built-in template has the given identifier.
    #[error("unknown service template: {0}")]
    UnknownTemplate(String),

    /// A webhook with the same identifier is already registered.
    #[error("webhook '{0}' is already registered")]
    DuplicateWebhook(String),

    /// A pattern rule could not be loaded.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Result type for rule loading.
pub type RuleResult<T> = Result<T, RuleError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
