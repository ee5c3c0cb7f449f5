//! # Hookwire Core
//!
//! The data model shared by every Hookwire layer.
//!
//! This crate holds no I/O. It defines:
//! - **Rules**: [`PatternRule`] (regex + ordered field names) and
//!   [`WebhookRule`] (target URL bound to a [`ServiceTag`] and optional room)
//! - **Payloads**: [`WebhookPayload`] sent to webhooks, [`WebhookResult`] returned
//!   by the dispatcher, [`ParsedTask`] from the legacy extractor
//! - **Settings**: the process-wide [`Settings`] record behind [`SharedSettings`]
//! - **Events**: [`InboundEvent`] as delivered by the chat sync collaborator
//! - **Collaborators**: the [`WebhookTransport`] and [`ChatSender`] traits that
//!   the router talks to
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐     ┌────────┐     ┌─────────┐     ┌──────────────────┐
//! │ InboundEvent │────▶│ Router │────▶│ Matcher │────▶│ WebhookTransport │
//! └──────────────┘     └────────┘     └─────────┘     └──────────────────┘
//!                          │
//!                          └──────────▶ ChatSender (confirmation / error reply)
//! ```

pub mod chat;
pub mod error;
pub mod event;
pub mod payload;
pub mod rule;
pub mod settings;
pub mod transport;

pub use chat::{BoxedChatSender, ChatSender};
pub use error::{ChatError, ChatResult, TransportError, TransportResult};
pub use event::InboundEvent;
pub use payload::{ParsedTask, WebhookPayload, WebhookResult};
pub use rule::{PatternRule, ServiceTag, TriggerKind, WebhookRule};
pub use settings::{Settings, SharedSettings};
pub use transport::{BoxedTransport, WebhookTransport};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_matches_clock() {
        let before = time::OffsetDateTime::now_utc().unix_timestamp() * 1000;
        let now = now_millis();
        assert!(now >= before);
        assert!(now - before < 60_000);
    }
}
