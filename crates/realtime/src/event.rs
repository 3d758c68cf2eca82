//! Events delivered over the push channel.

use crm_api::{Message, SentMessage};
use serde_json::Value;
use tracing::{debug, warn};

/// Event name for a newly stored message.
pub const NEW_MESSAGE: &str = "new_message";
/// Event name for a partner starting to type.
pub const TYPING: &str = "typing";
/// Event name for a partner stopping typing.
pub const STOP_TYPING: &str = "stop_typing";

/// A raw named event as received from the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Event name, without any leading namespace dot.
    pub name: String,
    /// Decoded JSON payload.
    pub data: Value,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        let name: String = name.into();
        Self {
            name: name.trim_start_matches('.').to_string(),
            data,
        }
    }

    /// Build an event from SSE text, unwrapping payloads that were
    /// JSON-encoded twice.
    pub fn from_text(name: &str, raw: &str) -> Self {
        let data = match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(inner)) => {
                serde_json::from_str(&inner).unwrap_or(Value::String(inner))
            }
            Ok(value) => value,
            Err(_) => Value::String(raw.to_string()),
        };
        Self::new(name, data)
    }
}

/// The messaging events this subsystem understands.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// `new_message` with `{ message }`.
    NewMessage(Message),
    /// `typing` with `{ senderId }`.
    Typing { sender_id: String },
    /// `stop_typing` with `{ senderId }`.
    StopTyping { sender_id: String },
}

impl PushEvent {
    /// Decode a raw channel event.
    ///
    /// Returns `None` for unknown event names and malformed payloads.
    pub fn decode(event: &ChannelEvent) -> Option<Self> {
        match event.name.as_str() {
            NEW_MESSAGE => match serde_json::from_value::<SentMessage>(event.data.clone()) {
                Ok(sent) => Some(PushEvent::NewMessage(sent.into_message())),
                Err(e) => {
                    warn!("Failed to parse {} payload: {}", NEW_MESSAGE, e);
                    debug!("Raw data: {}", event.data);
                    None
                }
            },
            TYPING => sender_id(&event.data).map(|sender_id| PushEvent::Typing { sender_id }),
            STOP_TYPING => {
                sender_id(&event.data).map(|sender_id| PushEvent::StopTyping { sender_id })
            }
            other => {
                debug!("Ignoring channel event type: {}", other);
                None
            }
        }
    }
}

fn sender_id(data: &Value) -> Option<String> {
    match data.get("senderId") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => {
            warn!("Typing event without senderId: {}", data);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_new_message() {
        let event = ChannelEvent::new(
            "new_message",
            json!({"message": {
                "id": 5, "senderId": "a1", "receiverId": "c1",
                "content": "Offer accepted", "createdAt": "2024-05-02T09:30:00Z"
            }}),
        );
        match PushEvent::decode(&event) {
            Some(PushEvent::NewMessage(message)) => {
                assert_eq!(message.id, "5");
                assert_eq!(message.content, "Offer accepted");
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_typing_numeric_sender() {
        let event = ChannelEvent::new("typing", json!({"senderId": 17}));
        assert_eq!(
            PushEvent::decode(&event),
            Some(PushEvent::Typing {
                sender_id: "17".to_string()
            })
        );
    }

    #[test]
    fn test_decode_namespaced_stop_typing() {
        let event = ChannelEvent::new(".stop_typing", json!({"senderId": "a1"}));
        assert_eq!(event.name, "stop_typing");
        assert_eq!(
            PushEvent::decode(&event),
            Some(PushEvent::StopTyping {
                sender_id: "a1".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_and_malformed_events() {
        assert_eq!(
            PushEvent::decode(&ChannelEvent::new("lead_updated", json!({}))),
            None
        );
        assert_eq!(
            PushEvent::decode(&ChannelEvent::new("typing", json!({}))),
            None
        );
        assert_eq!(
            PushEvent::decode(&ChannelEvent::new("new_message", json!({"message": 1}))),
            None
        );
    }

    #[test]
    fn test_from_text_double_encoded() {
        let event = ChannelEvent::from_text("typing", r#""{\"senderId\":\"a1\"}""#);
        assert_eq!(event.data, json!({"senderId": "a1"}));

        let plain = ChannelEvent::from_text("typing", r#"{"senderId":"a1"}"#);
        assert_eq!(plain.data, json!({"senderId": "a1"}));

        let text = ChannelEvent::from_text("ping", "not json");
        assert_eq!(text.data, Value::String("not json".to_string()));
    }
}
