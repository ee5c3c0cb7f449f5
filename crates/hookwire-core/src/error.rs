//! Error types for the Hookwire core layer.
//!
//! Rule and registry errors live in `hookwire-framework`; configuration
//! errors live in `hookwire-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors produced by a single webhook request.
///
/// The dispatcher never returns these to the router directly; they are folded
/// into a [`WebhookResult`](crate::WebhookResult). The legacy trigger does
/// return them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request was cancelled because it exceeded the configured timeout.
    #[error("Webhook request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that was exceeded.
        timeout_ms: u64,
    },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase, empty when unknown.
        reason: String,
    },

    /// The request could not be sent or its response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The target URL could not be parsed.
    #[error("invalid webhook URL: {reason}")]
    InvalidUrl {
        /// Why the URL was rejected.
        reason: String,
    },
}

impl TransportError {
    /// Returns true if this error is a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// =============================================================================
// Chat Errors
// =============================================================================

/// Errors returned by a [`ChatSender`](crate::ChatSender).
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// The message could not be delivered to the room.
    #[error("failed to send message to room '{room_id}': {reason}")]
    SendFailed {
        /// Target room.
        room_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// The chat client has no live session.
    #[error("chat client is not connected")]
    NotConnected,
}

impl ChatError {
    /// Creates a send failure for the given room.
    pub fn send_failed(room_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            room_id: room_id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for chat send operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_is_distinguishable() {
        let err = TransportError::Timeout { timeout_ms: 100 };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Webhook request timed out after 100ms");

        let err = TransportError::Status {
            status: 502,
            reason: "Bad Gateway".into(),
        };
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }
}
