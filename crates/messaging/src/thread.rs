//! Conversation thread store: the live message log with one partner.
//!
//! Messages are kept in append order. The store never re-sorts or
//! de-duplicates: a message the transport redelivers shows up twice.

use std::sync::Arc;

use crm_api::{ApiError, Message, MessagingApi};
use tracing::{debug, info, warn};

use crate::error::MessagingError;

/// A validated send waiting for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub partner_id: String,
    pub content: String,
}

impl PendingSend {
    /// Perform the network call. Owns everything it needs, so it can run
    /// while the store keeps receiving events.
    pub async fn dispatch(self, api: Arc<dyn MessagingApi>) -> (Self, Result<Message, ApiError>) {
        let result = api.send_message(&self.partner_id, &self.content).await;
        (self, result)
    }
}

/// Message history with the open partner.
pub struct ConversationThread {
    api: Arc<dyn MessagingApi>,
    partner_id: Option<String>,
    messages: Vec<Message>,
    read_acknowledged: bool,
}

impl ConversationThread {
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self {
            api,
            partner_id: None,
            messages: Vec::new(),
            read_acknowledged: false,
        }
    }

    /// Open the thread with `partner_id`: fetch history, then mark it read.
    ///
    /// Any previous thread is discarded first. A failed history fetch leaves
    /// the thread open and empty so the open can be retried; a failed read
    /// receipt is logged and ignored. Returns the number of messages loaded.
    pub async fn open(&mut self, partner_id: &str) -> Result<usize, MessagingError> {
        self.partner_id = Some(partner_id.to_string());
        self.messages.clear();
        self.read_acknowledged = false;

        let history = self.api.conversation_history(partner_id).await?;
        info!("Opened thread with {} ({} messages)", partner_id, history.len());
        self.messages = history;

        match self.api.mark_read(partner_id).await {
            Ok(()) => self.read_acknowledged = true,
            Err(e) => warn!("Failed to mark {} as read: {}", partner_id, e),
        }
        Ok(self.messages.len())
    }

    /// Discard the thread.
    pub fn close(&mut self) {
        if let Some(partner) = self.partner_id.take() {
            debug!("Closed thread with {}", partner);
        }
        self.messages.clear();
        self.read_acknowledged = false;
    }

    /// Add one message at the tail.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Whether an inbound push belongs in this thread.
    pub fn accepts_inbound(&self, message: &Message) -> bool {
        self.partner_id.as_deref() == Some(message.sender_id.as_str())
    }

    /// Append `message` if it comes from the open partner.
    pub fn receive(&mut self, message: &Message) -> bool {
        if !self.accepts_inbound(message) {
            return false;
        }
        self.append(message.clone());
        true
    }

    /// Validate `content` for sending to the open partner.
    pub fn prepare_send(&self, content: &str) -> Result<PendingSend, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::EmptyContent);
        }
        let partner_id = self
            .partner_id
            .clone()
            .ok_or(MessagingError::NoActiveThread)?;

        Ok(PendingSend {
            partner_id,
            content: content.to_string(),
        })
    }

    /// Apply the server's answer to a send.
    ///
    /// The stored message is appended only if its thread is still open.
    pub fn finish_send(
        &mut self,
        pending: &PendingSend,
        result: Result<Message, ApiError>,
    ) -> Result<Message, MessagingError> {
        let message = result.map_err(|e| {
            warn!("Send to {} failed: {}", pending.partner_id, e);
            MessagingError::Api(e)
        })?;

        if self.partner_id.as_deref() == Some(pending.partner_id.as_str()) {
            self.append(message.clone());
        } else {
            debug!("Thread changed before send {} completed", message.id);
        }
        Ok(message)
    }

    /// Send `content` to the open partner and append the stored message.
    ///
    /// Nothing is appended until the server answers.
    pub async fn send(&mut self, content: &str) -> Result<Message, MessagingError> {
        let pending = self.prepare_send(content)?;
        let (pending, result) = pending.dispatch(self.api.clone()).await;
        self.finish_send(&pending, result)
    }

    pub fn partner_id(&self) -> Option<&str> {
        self.partner_id.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.partner_id.is_some()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether the read receipt for the current open succeeded.
    pub fn read_acknowledged(&self) -> bool {
        self.read_acknowledged
    }
}
