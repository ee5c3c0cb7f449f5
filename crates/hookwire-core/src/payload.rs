//! Payloads exchanged with webhook endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rule::ServiceTag;

/// The JSON body POSTed to a webhook.
///
/// Built fresh for every dispatch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub service: ServiceTag,
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    pub message_id: String,
    /// Dispatch time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub original_message: String,
    pub extracted_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl WebhookPayload {
    /// Creates a payload with no extracted data.
    pub fn new(
        service: ServiceTag,
        room_id: impl Into<String>,
        sender: impl Into<String>,
        message_id: impl Into<String>,
        original_message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            room_id: room_id.into(),
            room_name: None,
            sender: sender.into(),
            sender_display_name: None,
            message_id: message_id.into(),
            timestamp: crate::now_millis(),
            original_message: original_message.into(),
            extracted_data: Map::new(),
            metadata: None,
        }
    }

    /// Sets the extracted fields from string pairs.
    pub fn with_fields<'a, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        self.extracted_data = fields
            .into_iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self
    }

    /// Sets the optional room and sender names.
    pub fn with_names(
        mut self,
        room_name: Option<String>,
        sender_display_name: Option<String>,
    ) -> Self {
        self.room_name = room_name;
        self.sender_display_name = sender_display_name;
        self
    }

    /// Sets free-form metadata about the dispatch.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Overrides the dispatch timestamp.
    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = timestamp_ms;
        self
    }
}

/// The uniform outcome of a webhook dispatch.
///
/// Returned by value and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResult {
    /// A successful dispatch with the endpoint's optional message and body.
    pub fn ok(message: Option<String>, data: Value) -> Self {
        Self {
            success: true,
            message,
            data: Some(data),
            error: None,
        }
    }

    /// A failed dispatch.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Task name and description extracted by the legacy `Task:` / `Description:`
/// parser. A field is `None` when its marker line is absent or blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTask {
    pub task_name: Option<String>,
    pub task_description: Option<String>,
}

impl ParsedTask {
    /// Returns both fields when both are present.
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (&self.task_name, &self.task_description) {
            (Some(name), Some(description)) => Some((name.as_str(), description.as_str())),
            _ => None,
        }
    }

    /// Returns true when neither marker was found.
    pub fn is_empty(&self) -> bool {
        self.task_name.is_none() && self.task_description.is_none()
    }
}
