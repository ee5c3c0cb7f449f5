//! Process-wide automation settings.
//!
//! Every component takes a [`Settings`] snapshot at the start of an operation,
//! so a change made through [`SharedSettings`] applies to the next message and
//! never to one already in flight.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default prefix of every automation reply. Messages starting with it are
/// never processed, which prevents reply loops.
pub const DEFAULT_REPLY_PREFIX: &str = "🤖 Make Automation: ";

/// Automation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch for all automation.
    pub global_enabled: bool,
    /// Post a confirmation reply after a successful dispatch.
    pub default_bot_reply: bool,
    /// Prefix of every automation reply.
    pub bot_reply_prefix: String,
    /// Post a reply when a dispatch fails.
    pub error_notifications: bool,
    /// Per-attempt request timeout in milliseconds.
    pub webhook_timeout_ms: u64,
    /// Number of attempts per dispatch.
    pub retry_attempts: u32,
    /// Base delay between attempts in milliseconds (multiplied by the attempt number).
    pub retry_delay_ms: u64,
    /// Log each webhook call at info level.
    pub log_webhook_calls: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_enabled: true,
            default_bot_reply: true,
            bot_reply_prefix: DEFAULT_REPLY_PREFIX.to_string(),
            error_notifications: true,
            webhook_timeout_ms: 5000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            log_webhook_calls: true,
        }
    }
}

impl Settings {
    /// Per-attempt timeout.
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }

    /// Effective attempt count; a configured zero still makes one attempt.
    pub fn attempts(&self) -> u32 {
        self.retry_attempts.max(1)
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Returns true if `body` was produced by the automation itself.
    pub fn is_bot_reply(&self, body: &str) -> bool {
        !self.bot_reply_prefix.is_empty() && body.starts_with(&self.bot_reply_prefix)
    }

    /// Formats an automation reply.
    pub fn reply(&self, text: &str) -> String {
        format!("{}{}", self.bot_reply_prefix, text)
    }
}

/// Cheaply clonable handle to the process-wide [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    /// Wraps the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    /// Returns whether automation is globally enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.read().global_enabled
    }

    /// Flips the global enable flag and returns the new value.
    pub fn toggle_enabled(&self) -> bool {
        let mut settings = self.inner.write();
        settings.global_enabled = !settings.global_enabled;
        settings.global_enabled
    }

    /// Applies an in-place update.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        f(&mut *self.inner.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.global_enabled);
        assert_eq!(s.webhook_timeout(), Duration::from_millis(5000));
        assert_eq!(s.attempts(), 3);
        assert_eq!(s.bot_reply_prefix, DEFAULT_REPLY_PREFIX);
    }

    #[test]
    fn test_linear_backoff() {
        let s = Settings {
            retry_delay_ms: 250,
            ..Default::default()
        };
        assert_eq!(s.backoff(1), Duration::from_millis(250));
        assert_eq!(s.backoff(2), Duration::from_millis(500));
        assert_eq!(s.backoff(3), Duration::from_millis(750));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let s = Settings {
            retry_attempts: 0,
            ..Default::default()
        };
        assert_eq!(s.attempts(), 1);
    }

    #[test]
    fn test_toggle_is_visible_to_clones() {
        let shared = SharedSettings::default();
        let other = shared.clone();
        let snapshot = shared.snapshot();

        assert!(!shared.toggle_enabled());
        assert!(!other.is_enabled());
        // Snapshots taken earlier are unaffected.
        assert!(snapshot.global_enabled);

        assert!(other.toggle_enabled());
        assert!(shared.is_enabled());
    }

    #[test]
    fn test_bot_reply_detection() {
        let s = Settings::default();
        assert!(s.is_bot_reply(&s.reply("done")));
        assert!(!s.is_bot_reply("Task: x"));
    }
}
