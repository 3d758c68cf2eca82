//! Builders for test data.

use chrono::{DateTime, TimeZone, Utc};
use crm_api::{ConversationSummary, LastMessage, Message, Role};

/// A message stamped at a fixed instant.
pub fn message(id: &str, sender: &str, receiver: &str, content: &str) -> Message {
    message_at(id, sender, receiver, content, fixed_time(0))
}

/// A message stamped at `created_at`.
pub fn message_at(
    id: &str,
    sender: &str,
    receiver: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Message {
    Message {
        id: id.to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        content: content.to_string(),
        created_at,
    }
}

/// A summary with an optional last message preview.
pub fn summary(
    partner_id: &str,
    partner_name: &str,
    role: Role,
    last: Option<&str>,
    unread_count: u32,
) -> ConversationSummary {
    ConversationSummary {
        partner_id: partner_id.to_string(),
        partner_name: partner_name.to_string(),
        partner_type: role,
        last_message: last.map(|content| LastMessage {
            content: content.to_string(),
            created_at: fixed_time(0),
        }),
        unread_count,
        placeholder: false,
    }
}

fn fixed_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_640_000 + offset_secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
