//! Messages and the request bodies that create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{id, Identity};

/// A single message between two identities. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id.
    #[serde(deserialize_with = "id::deserialize")]
    pub id: String,

    /// Author of the message.
    #[serde(deserialize_with = "id::deserialize")]
    pub sender_id: String,

    /// Recipient of the message.
    #[serde(deserialize_with = "id::deserialize")]
    pub receiver_id: String,

    /// Text body.
    pub content: String,

    /// Server timestamp, the ordering key.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether `identity` wrote this message.
    pub fn is_from(&self, identity: &Identity) -> bool {
        self.sender_id == identity.id
    }

    /// The other side of the conversation as seen by `me`.
    pub fn partner_of(&self, me: &str) -> &str {
        if self.sender_id == me {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// History payload: either a bare array or `{ "messages": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageHistory {
    Bare(Vec<Message>),
    Wrapped { messages: Vec<Message> },
}

impl MessageHistory {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            MessageHistory::Bare(messages) => messages,
            MessageHistory::Wrapped { messages } => messages,
        }
    }
}

/// Send response: either the message itself or `{ "message": {...} }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SentMessage {
    Wrapped { message: Message },
    Bare(Message),
}

impl SentMessage {
    pub fn into_message(self) -> Message {
        match self {
            SentMessage::Wrapped { message } => message,
            SentMessage::Bare(message) => message,
        }
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub receiver_id: String,
    pub content: String,
}

impl SendMessageParams {
    pub fn new(receiver_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /presence/typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingParams {
    pub receiver_id: String,
    pub is_typing: bool,
}
