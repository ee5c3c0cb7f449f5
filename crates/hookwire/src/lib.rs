//! # Hookwire
//!
//! Turns chat messages into webhook calls.
//!
//! ## Overview
//!
//! A chat message is tested against a set of regex pattern rules. Each match
//! yields a service tag and named fields; the webhook configured for that
//! service (room-scoped first, then global) receives a JSON payload, and the
//! outcome is reported back to the room. A legacy path turns
//! `Task:` / `Description:` messages into a single GET request.
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ Event pump │──▶│ MessageRouter│──▶│ PatternMatcher│   │ WebhookClient│──▶ HTTP
//! │ (per room) │   │              │──▶│ RuleRegistry  │──▶│ (retries)    │
//! └────────────┘   └──────┬───────┘   └───────────────┘   └──────────────┘
//!                         └──▶ ChatSender (replies)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookwire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HookwireRuntime::builder().build()?;
//!     runtime.registry().add_from_template(
//!         "gmail-sender",
//!         "https://hook.eu1.make.com/abc123",
//!         "@me:example.org",
//!         None,
//!     )?;
//!
//!     let (events, inbox) = runtime.event_channel();
//!     start_chat_sync(events);
//!     runtime.run(chat_sender(), inbox).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client` (default): the reqwest-based webhook transport

pub use hookwire_core as core;
pub use hookwire_framework as framework;
pub use hookwire_runtime as runtime;
pub use hookwire_transport as transport;

/// Commonly used types.
///
/// ```rust,ignore
/// use hookwire::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hookwire_runtime::{HookwireConfig, HookwireRuntime, PumpStats};

    // Data model
    pub use hookwire_core::{
        InboundEvent, PatternRule, ServiceTag, Settings, SharedSettings, TriggerKind,
        WebhookPayload, WebhookResult, WebhookRule,
    };

    // Collaborator traits for custom chat clients and transports
    pub use hookwire_core::{ChatSender, WebhookTransport};

    // Matching and routing
    pub use hookwire_framework::{
        MessageRouter, PatternMatcher, RouteOutcome, RuleRegistry, ServiceTemplate,
        builtin_templates,
    };

    #[cfg(feature = "http-client")]
    pub use hookwire_transport::WebhookClient;
    pub use hookwire_transport::sanitize_url;
}
