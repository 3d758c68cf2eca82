//! In-memory implementation of the CRM messaging API.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use crm_api::{ApiError, ConversationSummary, LastMessage, Message, MessagingApi, Role};
use tokio::sync::watch;

/// API operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    History,
    Send,
    MarkRead,
    Typing,
}

/// A recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListConversations,
    History(String),
    Send { receiver_id: String, content: String },
    MarkRead(String),
    Typing { receiver_id: String, is_typing: bool },
}

#[derive(Default)]
struct MockState {
    conversations: Vec<ConversationSummary>,
    histories: HashMap<String, Vec<Message>>,
    calls: Vec<ApiCall>,
    failing: HashSet<Operation>,
    next_id: u64,
}

/// An in-memory CRM API acting as the server for one signed-in identity.
pub struct MockApi {
    me: String,
    state: Mutex<MockState>,
    history_gate: watch::Sender<bool>,
    send_gate: watch::Sender<bool>,
}

impl MockApi {
    /// Create an API for the identity `me` with no conversations.
    pub fn new(me: impl Into<String>) -> Self {
        let (history_gate, _) = watch::channel(true);
        let (send_gate, _) = watch::channel(true);
        Self {
            me: me.into(),
            state: Mutex::new(MockState::default()),
            history_gate,
            send_gate,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, call: ApiCall, op: Operation) -> Result<(), ApiError> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing.contains(&op) {
            return Err(ApiError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Replace the conversation directory.
    pub fn set_conversations(&self, conversations: Vec<ConversationSummary>) {
        self.state().conversations = conversations;
    }

    /// Replace the history with `partner_id`.
    pub fn set_history(&self, partner_id: &str, messages: Vec<Message>) {
        self.state()
            .histories
            .insert(partner_id.to_string(), messages);
    }

    /// Simulate the server storing an inbound message from `message.sender_id`.
    pub fn receive(&self, message: &Message) {
        let mut state = self.state();
        state
            .histories
            .entry(message.sender_id.clone())
            .or_default()
            .push(message.clone());

        let preview = LastMessage::from(message);
        match state
            .conversations
            .iter_mut()
            .find(|s| s.partner_id == message.sender_id)
        {
            Some(summary) => {
                summary.unread_count += 1;
                summary.last_message = Some(preview);
            }
            None => state.conversations.push(ConversationSummary {
                partner_id: message.sender_id.clone(),
                partner_name: message.sender_id.clone(),
                partner_type: Role::Client,
                last_message: Some(preview),
                unread_count: 1,
                placeholder: false,
            }),
        }
    }

    /// Current server-side directory.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state().conversations.clone()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make `op` fail (or succeed again) until changed.
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Stall history fetches until [`MockApi::release_history`].
    pub fn hold_history(&self) {
        self.history_gate.send_replace(false);
    }

    /// Let stalled history fetches complete.
    pub fn release_history(&self) {
        self.history_gate.send_replace(true);
    }

    /// Stall sends after they are recorded, until [`MockApi::release_sends`].
    pub fn hold_sends(&self) {
        self.send_gate.send_replace(false);
    }

    pub fn release_sends(&self) {
        self.send_gate.send_replace(true);
    }
}

#[async_trait]
impl MessagingApi for MockApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        self.record(ApiCall::ListConversations, Operation::List)?;
        Ok(self.state().conversations.clone())
    }

    async fn conversation_history(&self, partner_id: &str) -> Result<Vec<Message>, ApiError> {
        self.record(ApiCall::History(partner_id.to_string()), Operation::History)?;

        let mut gate = self.history_gate.subscribe();
        // The sender lives in self, so the gate cannot close while awaited.
        let _ = gate.wait_for(|open| *open).await;

        Ok(self
            .state()
            .histories
            .get(partner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message, ApiError> {
        self.record(
            ApiCall::Send {
                receiver_id: receiver_id.to_string(),
                content: content.to_string(),
            },
            Operation::Send,
        )?;

        let mut gate = self.send_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let mut state = self.state();
        state.next_id += 1;
        let message = Message {
            id: format!("srv-{}", state.next_id),
            sender_id: self.me.clone(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        state
            .histories
            .entry(receiver_id.to_string())
            .or_default()
            .push(message.clone());
        if let Some(summary) = state
            .conversations
            .iter_mut()
            .find(|s| s.partner_id == receiver_id)
        {
            summary.last_message = Some(LastMessage::from(&message));
        }
        Ok(message)
    }

    async fn mark_read(&self, partner_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::MarkRead(partner_id.to_string()), Operation::MarkRead)?;
        if let Some(summary) = self
            .state()
            .conversations
            .iter_mut()
            .find(|s| s.partner_id == partner_id)
        {
            summary.unread_count = 0;
        }
        Ok(())
    }

    async fn send_typing(&self, receiver_id: &str, is_typing: bool) -> Result<(), ApiError> {
        self.record(
            ApiCall::Typing {
                receiver_id: receiver_id.to_string(),
                is_typing,
            },
            Operation::Typing,
        )
    }
}
