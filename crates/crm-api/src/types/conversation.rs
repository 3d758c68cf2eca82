//! Conversation summaries shown in the directory pane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{id, Counterpart, Message, Role};

/// Preview of the most recent message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// One row of the conversation directory, keyed by `partner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// The other identity in the conversation.
    #[serde(deserialize_with = "id::deserialize")]
    pub partner_id: String,

    /// Display name of the partner.
    #[serde(default)]
    pub partner_name: String,

    /// Role of the partner.
    pub partner_type: Role,

    /// Most recent message, if any exists.
    #[serde(default)]
    pub last_message: Option<LastMessage>,

    /// Inbound messages not yet read.
    #[serde(default)]
    pub unread_count: u32,

    /// Synthesized locally, never returned by the server.
    #[serde(skip)]
    pub placeholder: bool,
}

impl ConversationSummary {
    /// A summary synthesized for a known counterpart before any message exists.
    pub fn placeholder(counterpart: &Counterpart) -> Self {
        Self {
            partner_id: counterpart.id.clone(),
            partner_name: counterpart.name.clone(),
            partner_type: counterpart.role,
            last_message: None,
            unread_count: 0,
            placeholder: true,
        }
    }
}

/// Conversation list payload: a bare array or `{ "conversations": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConversationList {
    Bare(Vec<ConversationSummary>),
    Wrapped {
        conversations: Vec<ConversationSummary>,
    },
}

impl ConversationList {
    pub fn into_summaries(self) -> Vec<ConversationSummary> {
        match self {
            ConversationList::Bare(summaries) => summaries,
            ConversationList::Wrapped { conversations } => conversations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_parse() {
        let json = r#"{
            "partnerId": 12,
            "partnerName": "Dana Broker",
            "partnerType": "agent",
            "lastMessage": {"content": "See you at the viewing", "createdAt": "2024-03-01T10:15:00Z"},
            "unreadCount": 3
        }"#;
        let summary: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.partner_id, "12");
        assert_eq!(summary.partner_type, Role::Agent);
        assert_eq!(summary.unread_count, 3);
        assert_eq!(
            summary.last_message.as_ref().map(|m| m.content.as_str()),
            Some("See you at the viewing")
        );
    }

    #[test]
    fn test_summary_null_last_message() {
        let json = r#"{"partnerId":"c1","partnerName":"Sam","partnerType":"client","lastMessage":null,"unreadCount":0}"#;
        let summary: ConversationSummary = serde_json::from_str(json).unwrap();
        assert!(summary.last_message.is_none());
        assert!(!summary.placeholder);
    }

    #[test]
    fn test_placeholder() {
        let counterpart = Counterpart::new("a9", "Assigned Agent", Role::Agent);
        let summary = ConversationSummary::placeholder(&counterpart);
        assert_eq!(summary.partner_id, "a9");
        assert_eq!(summary.unread_count, 0);
        assert!(summary.last_message.is_none());
        assert!(summary.placeholder);
    }
}
