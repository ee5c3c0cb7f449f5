//! Pattern and webhook rule definitions.
//!
//! A [`PatternRule`] describes how to recognise an automatable message and
//! which capture groups become named fields. A [`WebhookRule`] binds a
//! [`ServiceTag`] (and optionally a room) to an external webhook URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The external automation category a rule or payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceTag {
    Trello,
    Gmail,
    GoogleSheets,
    Slack,
    Calendar,
    Custom,
}

impl ServiceTag {
    /// All service tags in declaration order.
    pub const ALL: [ServiceTag; 6] = [
        Self::Trello,
        Self::Gmail,
        Self::GoogleSheets,
        Self::Slack,
        Self::Calendar,
        Self::Custom,
    ];

    /// Returns the wire name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trello => "trello",
            Self::Gmail => "gmail",
            Self::GoogleSheets => "google-sheets",
            Self::Slack => "slack",
            Self::Calendar => "calendar",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown service tag: {s}"))
    }
}

/// How a webhook rule is meant to be triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Regex pattern matching on message text.
    #[default]
    Pattern,
    /// Slash command or bot mention.
    Command,
    /// Reaction with a specific emoji.
    Reaction,
    /// Manual trigger from a user interface.
    Manual,
}

// =============================================================================
// PatternRule
// =============================================================================

/// A regex rule that extracts named fields from a message.
///
/// Field `fields[i]` is filled from capture group `i + 1`. The mapping is
/// checked against the compiled regex when the rule is loaded, so a rule that
/// names more fields than its pattern has groups is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub service: ServiceTag,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl PatternRule {
    /// Creates an enabled rule with no extracted fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
        service: ServiceTag,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pattern: pattern.into(),
            fields: Vec::new(),
            service,
            enabled: true,
        }
    }

    /// Sets the ordered output field names.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the rule participates in matching.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Iterates over `(field name, capture group index)` pairs.
    pub fn field_groups(&self) -> impl Iterator<Item = (&str, usize)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i + 1))
    }
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// WebhookRule
// =============================================================================

/// A configured external automation target.
///
/// A rule with no `room_id` is global and applies to every room. The trigger
/// bookkeeping (`trigger_count`, `last_triggered`) is updated in place by the
/// registry after each successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRule {
    pub id: String,
    pub name: String,
    pub url: String,
    pub service: ServiceTag,
    #[serde(default)]
    pub trigger: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_triggered: Option<OffsetDateTime>,
    #[serde(default)]
    pub trigger_count: u64,
}

impl WebhookRule {
    /// Creates an enabled, global, manually-triggered rule stamped with the
    /// current time.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        service: ServiceTag,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            service,
            trigger: TriggerKind::Manual,
            pattern: None,
            command: None,
            enabled: true,
            room_id: None,
            created_by: created_by.into(),
            created_at: OffsetDateTime::now_utc(),
            last_triggered: None,
            trigger_count: 0,
        }
    }

    /// Restricts the rule to a single room.
    pub fn in_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Sets the trigger kind.
    pub fn trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = trigger;
        self
    }

    /// Sets the originating pattern string.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets whether the rule can be selected.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns true if the rule is bound to a specific room.
    pub fn is_room_scoped(&self) -> bool {
        self.room_id.is_some()
    }

    /// Returns true if the rule applies to messages in `room_id`.
    pub fn is_in_scope(&self, room_id: &str) -> bool {
        self.room_id.as_deref().is_none_or(|scope| scope == room_id)
    }

    /// Records one successful dispatch at `at`.
    pub fn record_trigger(&mut self, at: OffsetDateTime) {
        self.trigger_count += 1;
        self.last_triggered = Some(at);
    }
}
