//! # Hookwire Transport
//!
//! Outbound HTTP delivery for Hookwire webhooks.
//!
//! This crate implements [`WebhookTransport`](hookwire_core::WebhookTransport)
//! on top of `reqwest`. The framework layer only sees the trait, so tests
//! and embedders can substitute their own transport.
//!
//! ## Features
//!
//! - `http-client` (default): the [`WebhookClient`] implementation
//!
//! ## Delivery Semantics
//!
//! | Call | Method | Attempts | Body |
//! |------|--------|----------|------|
//! | `trigger` | POST | `retry_attempts` with linear backoff | JSON payload |
//! | `trigger_legacy` | GET | 1 | `taskName` / `taskDescription` query |
//!
//! Every attempt is bounded by `webhook_timeout_ms`, covering both the
//! request and reading the response body. URLs are always passed through
//! [`sanitize_url`] before they reach a log line.
//!
//! ```rust,ignore
//! use hookwire_core::SharedSettings;
//! use hookwire_transport::WebhookClient;
//!
//! let client = WebhookClient::new(SharedSettings::default())?;
//! let result = client.trigger(&url, &payload).await;
//! ```

#[cfg(feature = "http-client")]
pub mod http;
pub mod sanitize;

#[cfg(feature = "http-client")]
pub use http::{USER_AGENT, WebhookClient};
pub use sanitize::sanitize_url;
