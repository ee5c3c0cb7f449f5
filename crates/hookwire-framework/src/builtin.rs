//! Built-in pattern rules.

use hookwire_core::{PatternRule, ServiceTag};

pub(crate) const TRELLO_TASK_PATTERN: &str =
    r"(?:^|\n)Task:\s*(.+)(?:\n.*?)?(?:^|\n)Description:\s*(.+)";
pub(crate) const GMAIL_SEND_PATTERN: &str =
    r"@make\s+gmail\s+to:([\w@.-]+)\s+subject:(.+?)(?:\s+body:(.+))?$";
pub(crate) const EXPENSE_PATTERN: &str = r"#expense\s+\$([\d.]+)\s+(.+)";
pub(crate) const SLACK_POST_PATTERN: &str = r"@slack\s+(#\w+)\s+(.+)";
pub(crate) const CALENDAR_EVENT_PATTERN: &str =
    r"@calendar\s+(.+)\s+at\s+(\d{1,2}:\d{2}(?:AM|PM)?)\s+on\s+(\d{4}-\d{2}-\d{2})";
pub(crate) const MAKE_COMMAND_PATTERN: &str = r"@make\s+(\w+)\s+(.+)";

/// The rules every registry starts with, in registration order.
pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        trello_task_rule(),
        PatternRule::new(
            "trello-simple-task",
            "Simple Trello Task",
            r"^Task:\s*(.+)$",
            ServiceTag::Trello,
        )
        .with_fields(["taskName"]),
        gmail_send_rule(),
        PatternRule::new(
            "sheets-add-row",
            "Google Sheets Add Row",
            EXPENSE_PATTERN,
            ServiceTag::GoogleSheets,
        )
        .with_fields(["amount", "description"]),
        PatternRule::new(
            "make-command",
            "Generic Make Command",
            MAKE_COMMAND_PATTERN,
            ServiceTag::Custom,
        )
        .with_fields(["service", "parameters"]),
    ]
}

pub(crate) fn trello_task_rule() -> PatternRule {
    PatternRule::new(
        "trello-task",
        "Trello Task Parser",
        TRELLO_TASK_PATTERN,
        ServiceTag::Trello,
    )
    .with_fields(["taskName", "taskDescription"])
}

pub(crate) fn gmail_send_rule() -> PatternRule {
    PatternRule::new(
        "gmail-send",
        "Gmail Send Parser",
        GMAIL_SEND_PATTERN,
        ServiceTag::Gmail,
    )
    .with_fields(["to", "subject", "body"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::CompiledRule;

    #[test]
    fn test_defaults_compile() {
        for rule in default_pattern_rules() {
            let id = rule.id.clone();
            assert!(CompiledRule::compile(rule).is_ok(), "rule {id} should compile");
        }
    }
}
