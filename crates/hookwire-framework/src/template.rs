//! Built-in service templates.
//!
//! A template bundles a default pattern rule with a webhook skeleton so a
//! user only has to supply the webhook URL (and optionally a room).

use std::collections::HashSet;
use std::sync::LazyLock;

use hookwire_core::{PatternRule, ServiceTag, TriggerKind, WebhookRule};
use serde::Serialize;
use time::OffsetDateTime;

use crate::builtin::{
    CALENDAR_EVENT_PATTERN, EXPENSE_PATTERN, MAKE_COMMAND_PATTERN, SLACK_POST_PATTERN,
    gmail_send_rule, trello_task_rule,
};
use crate::matcher::validate_pattern;

/// The parts of a [`WebhookRule`] a template fixes in advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookTemplate {
    pub name: String,
    pub service: ServiceTag,
    pub trigger: TriggerKind,
    pub pattern: Option<String>,
    pub enabled: bool,
}

/// A ready-made integration for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTemplate {
    pub id: String,
    pub name: String,
    pub service: ServiceTag,
    pub description: String,
    pub icon: Option<String>,
    pub default_parser: PatternRule,
    pub webhook_template: WebhookTemplate,
    pub sample_message: String,
    pub expected_output: String,
}

impl ServiceTemplate {
    /// Builds a webhook rule from this template.
    ///
    /// The id is the template id followed by the creation time in
    /// milliseconds.
    pub fn instantiate(
        &self,
        url: impl Into<String>,
        created_by: impl Into<String>,
        room_id: Option<String>,
        now: OffsetDateTime,
    ) -> WebhookRule {
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        WebhookRule {
            id: format!("{}-{}", self.id, millis),
            name: self.webhook_template.name.clone(),
            url: url.into(),
            service: self.webhook_template.service,
            trigger: self.webhook_template.trigger,
            pattern: self.webhook_template.pattern.clone(),
            command: None,
            enabled: self.webhook_template.enabled,
            room_id,
            created_by: created_by.into(),
            created_at: now,
            last_triggered: None,
            trigger_count: 0,
        }
    }

    /// Checks that the template is complete and its default parser compiles.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.id.is_empty() {
            errors.push("Template ID is required".to_string());
        }
        if self.name.is_empty() {
            errors.push("Template name is required".to_string());
        }
        if self.default_parser.id.is_empty() {
            errors.push("Default parser is required".to_string());
        }
        if let Err(e) = validate_pattern(&self.default_parser.pattern) {
            errors.push(format!("Invalid regex pattern in default parser: {e}"));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

static BUILTIN_TEMPLATES: LazyLock<Vec<ServiceTemplate>> = LazyLock::new(build_templates);

/// All built-in templates in display order.
pub fn builtin_templates() -> &'static [ServiceTemplate] {
    &BUILTIN_TEMPLATES
}

/// Looks up a built-in template by id.
pub fn template_by_id(id: &str) -> Option<&'static ServiceTemplate> {
    BUILTIN_TEMPLATES.iter().find(|t| t.id == id)
}

/// Returns the first built-in template for `service`.
pub fn template_by_service(service: ServiceTag) -> Option<&'static ServiceTemplate> {
    BUILTIN_TEMPLATES.iter().find(|t| t.service == service)
}

/// Returns every built-in template for `service`.
pub fn templates_by_service(service: ServiceTag) -> Vec<&'static ServiceTemplate> {
    BUILTIN_TEMPLATES
        .iter()
        .filter(|t| t.service == service)
        .collect()
}

/// Services covered by at least one template, in first-seen order.
pub fn available_services() -> Vec<ServiceTag> {
    let mut seen = HashSet::new();
    BUILTIN_TEMPLATES
        .iter()
        .map(|t| t.service)
        .filter(|s| seen.insert(*s))
        .collect()
}

struct TemplateDef {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    parser: PatternRule,
    sample: &'static str,
    expected: &'static str,
}

fn template(def: TemplateDef) -> ServiceTemplate {
    let service = def.parser.service;
    ServiceTemplate {
        id: def.id.to_string(),
        name: def.name.to_string(),
        service,
        description: def.description.to_string(),
        icon: Some(def.icon.to_string()),
        webhook_template: WebhookTemplate {
            name: def.name.to_string(),
            service,
            trigger: TriggerKind::Pattern,
            pattern: Some(def.parser.pattern.clone()),
            enabled: true,
        },
        default_parser: def.parser,
        sample_message: def.sample.to_string(),
        expected_output: def.expected.to_string(),
    }
}

fn build_templates() -> Vec<ServiceTemplate> {
    vec![
        template(TemplateDef {
            id: "trello-task-creator",
            name: "Trello Task Creator",
            description: "Create Trello cards from chat messages using Task: and Description: format",
            icon: "📋",
            parser: trello_task_rule(),
            sample: "Task: Fix login bug\nDescription: Users are unable to authenticate with their credentials",
            expected: "Creates a new Trello card with title \"Fix login bug\" and description \"Users are unable to authenticate with their credentials\"",
        }),
        template(TemplateDef {
            id: "gmail-sender",
            name: "Gmail Sender",
            description: "Send emails via Gmail using @make gmail commands",
            icon: "📧",
            parser: gmail_send_rule(),
            sample: "@make gmail to:team@company.com subject:Meeting Notes body:Here are the notes from today's meeting...",
            expected: "Sends an email to team@company.com with the specified subject and body",
        }),
        template(TemplateDef {
            id: "sheets-expense-tracker",
            name: "Expense Tracker",
            description: "Track expenses by adding rows to Google Sheets",
            icon: "📊",
            parser: PatternRule::new(
                "sheets-expense",
                "Expense Parser",
                EXPENSE_PATTERN,
                ServiceTag::GoogleSheets,
            )
            .with_fields(["amount", "description"]),
            sample: "#expense $45.60 lunch with client",
            expected: "Adds a new row to your expense tracking spreadsheet with the amount and description",
        }),
        template(TemplateDef {
            id: "slack-crosspost",
            name: "Slack Cross-poster",
            description: "Cross-post messages to Slack channels",
            icon: "💬",
            parser: PatternRule::new(
                "slack-post",
                "Slack Post Parser",
                SLACK_POST_PATTERN,
                ServiceTag::Slack,
            )
            .with_fields(["channel", "message"]),
            sample: "@slack #general Check out this awesome feature we just shipped!",
            expected: "Posts the message to the specified Slack channel",
        }),
        template(TemplateDef {
            id: "calendar-event-creator",
            name: "Calendar Event Creator",
            description: "Create calendar events from chat messages",
            icon: "📅",
            parser: PatternRule::new(
                "calendar-event",
                "Calendar Event Parser",
                CALENDAR_EVENT_PATTERN,
                ServiceTag::Calendar,
            )
            .with_fields(["title", "time", "date"]),
            sample: "@calendar Team standup at 9:00AM on 2024-01-15",
            expected: "Creates a calendar event \"Team standup\" at 9:00 AM on January 15, 2024",
        }),
        template(TemplateDef {
            id: "custom-webhook",
            name: "Custom Webhook",
            description: "Generic webhook for custom Make.com scenarios",
            icon: "🔧",
            parser: PatternRule::new(
                "custom-parser",
                "Custom Parser",
                MAKE_COMMAND_PATTERN,
                ServiceTag::Custom,
            )
            .with_fields(["action", "data"]),
            sample: "@make deploy production branch main",
            expected: "Triggers your custom Make.com scenario with the extracted data",
        }),
    ]
}
