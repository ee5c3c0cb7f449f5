//! The outbound webhook collaborator.
//!
//! `hookwire-transport` provides the HTTP implementation; the router only
//! sees this trait, which keeps it testable without a network.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::payload::{WebhookPayload, WebhookResult};

/// Delivers payloads to webhook endpoints.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POSTs `payload` to `url` under the configured retry policy.
    ///
    /// Never fails: every error is captured in the returned result.
    async fn trigger(&self, url: &str, payload: &WebhookPayload) -> WebhookResult;

    /// Calls the legacy task endpoint with `taskName` / `taskDescription`
    /// query parameters. Single attempt, no response body.
    async fn trigger_legacy(
        &self,
        url: &str,
        task_name: &str,
        task_description: &str,
    ) -> TransportResult<()>;
}

/// A shared transport trait object.
pub type BoxedTransport = Arc<dyn WebhookTransport>;
