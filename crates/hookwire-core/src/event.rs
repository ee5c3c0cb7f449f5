//! Inbound chat events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type names treated as chat messages.
pub const MESSAGE_EVENT_TYPES: [&str; 2] = ["message", "m.room.message"];

/// A timeline event delivered by the chat sync collaborator.
///
/// `body` is kept as raw JSON because the protocol does not guarantee a
/// string; only non-empty string bodies are processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default)]
    pub body: Value,
    pub timestamp_ms: i64,
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

fn default_event_type() -> String {
    MESSAGE_EVENT_TYPES[0].to_string()
}

impl InboundEvent {
    /// Creates a text message event.
    pub fn message(
        event_id: impl Into<String>,
        room_id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            room_id: room_id.into(),
            sender: sender.into(),
            sender_display_name: None,
            room_name: None,
            body: Value::String(body.into()),
            timestamp_ms,
            event_type: default_event_type(),
        }
    }

    /// Sets the human-readable room and sender names.
    pub fn with_names(
        mut self,
        room_name: impl Into<String>,
        sender_display_name: impl Into<String>,
    ) -> Self {
        self.room_name = Some(room_name.into());
        self.sender_display_name = Some(sender_display_name.into());
        self
    }

    /// Returns true if this event is a chat message.
    pub fn is_message(&self) -> bool {
        MESSAGE_EVENT_TYPES.contains(&self.event_type.as_str())
    }

    /// Returns the body if it is a non-empty string.
    pub fn text_body(&self) -> Option<&str> {
        self.body.as_str().filter(|body| !body.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_body() {
        let event = InboundEvent::message("$1", "!r:x", "@a:x", "hello", 0);
        assert_eq!(event.text_body(), Some("hello"));
        assert!(event.is_message());

        let empty = InboundEvent::message("$2", "!r:x", "@a:x", "", 0);
        assert_eq!(empty.text_body(), None);
    }

    #[test]
    fn test_non_text_body_from_json() {
        let event: InboundEvent = serde_json::from_value(json!({
            "eventId": "$3",
            "roomId": "!r:x",
            "sender": "@a:x",
            "body": { "url": "mxc://image" },
            "timestampMs": 5,
            "eventType": "m.room.message",
            "roomName": "Ops",
        }))
        .unwrap();
        assert!(event.is_message());
        assert_eq!(event.room_name.as_deref(), Some("Ops"));
        assert_eq!(event.sender_display_name, None);
        assert_eq!(event.text_body(), None);

        let reaction = InboundEvent {
            event_type: "m.reaction".into(),
            ..event
        };
        assert!(!reaction.is_message());
    }
}
