//! # Hookwire Framework
//!
//! The message-to-webhook pipeline.
//!
//! This layer provides:
//! - [`PatternMatcher`]: compiled regex rules that extract named fields
//! - [`parse_task_and_description`]: the legacy `Task:` / `Description:` extractor
//! - Built-in pattern rules and [`ServiceTemplate`]s for common services
//! - [`RuleRegistry`]: the webhook and pattern rule collections
//! - [`MessageRouter`]: the per-message orchestrator, usable as a
//!   `tower::Service<InboundEvent>`
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hookwire_framework::{MessageRouter, RuleRegistry};
//!
//! let registry = Arc::new(RuleRegistry::with_defaults());
//! registry.add_from_template("gmail-sender", "https://hook.example.com/abc", "@me:example.org", None)?;
//!
//! let router = MessageRouter::builder(registry, settings, transport, chat).build();
//! let outcome = router.route(event).await;
//! ```

pub mod builtin;
pub mod error;
pub mod legacy;
pub mod matcher;
pub mod registry;
pub mod router;
pub mod template;

pub use builtin::default_pattern_rules;
pub use error::{RegistryError, RegistryResult, RuleError, RuleResult};
pub use legacy::parse_task_and_description;
pub use matcher::{CompiledRule, PatternMatcher, RuleMatch, RuleTest, test_rule, validate_pattern};
pub use registry::RuleRegistry;
pub use router::{
    DEFAULT_CATCH_UP_WINDOW, DispatchSummary, IgnoreReason, MessageRouter, RouteOutcome,
    RouterBuilder,
};
pub use template::{ServiceTemplate, WebhookTemplate, builtin_templates};
