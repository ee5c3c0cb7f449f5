//! Legacy `Task:` / `Description:` extraction.
//!
//! This predates the general [`PatternMatcher`](crate::PatternMatcher) and is
//! kept with its own minimal contract: each marker is searched for
//! independently on its own line, and a field is `None` when its marker line
//! is missing or carries no text.

use std::sync::LazyLock;

use hookwire_core::ParsedTask;
use regex::Regex;

static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^Task:\s*(.*)$").expect("task marker regex is valid"));

static DESCRIPTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^Description:\s*(.*)$").expect("description marker regex is valid")
});

/// Extracts a task name and description from `text`.
///
/// ```rust,ignore
/// let task = parse_task_and_description("Task: Fix bug\nDescription: users cannot log in");
/// assert_eq!(task.task_name.as_deref(), Some("Fix bug"));
/// ```
pub fn parse_task_and_description(text: &str) -> ParsedTask {
    ParsedTask {
        task_name: marker_value(&TASK_LINE, text),
        task_description: marker_value(&DESCRIPTION_LINE, text),
    }
}

fn marker_value(marker: &Regex, text: &str) -> Option<String> {
    marker
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
