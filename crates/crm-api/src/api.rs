//! The REST boundary as a trait, so stores can run against mocks.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{ConversationSummary, Message};

/// Operations the messaging layer consumes from the CRM API.
///
/// Every call carries the bearer credential of the signed-in identity.
/// This trait is object-safe and is usually shared as `Arc<dyn MessagingApi>`.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// `GET /conversations`, in server order.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError>;

    /// `GET /conversations/{partner_id}`, in server order.
    async fn conversation_history(&self, partner_id: &str) -> Result<Vec<Message>, ApiError>;

    /// `POST /messages`. Returns the stored message with its authoritative
    /// id and timestamp.
    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message, ApiError>;

    /// `POST /conversations/{partner_id}/read`.
    async fn mark_read(&self, partner_id: &str) -> Result<(), ApiError>;

    /// `POST /presence/typing`.
    async fn send_typing(&self, receiver_id: &str, is_typing: bool) -> Result<(), ApiError>;
}
