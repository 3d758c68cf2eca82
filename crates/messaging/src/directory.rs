//! Conversation directory: the signed-in identity's conversation summaries.

use std::sync::Arc;

use crm_api::{ConversationSummary, Counterpart, LastMessage, Message, MessagingApi};
use tracing::{debug, info, warn};

use crate::error::MessagingError;

/// What the directory pane should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryStatus {
    /// Nothing fetched yet.
    Loading,
    /// Fetched, zero conversations. Not an error.
    Empty,
    /// At least one summary.
    Ready,
}

/// Summaries in server order, keyed by partner id.
pub struct ConversationDirectory {
    api: Arc<dyn MessagingApi>,
    summaries: Vec<ConversationSummary>,
    loaded: bool,
}

impl ConversationDirectory {
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self {
            api,
            summaries: Vec::new(),
            loaded: false,
        }
    }

    /// Fetch the full list, keeping server order.
    ///
    /// On failure the previous list is kept.
    pub async fn list(&mut self) -> Result<&[ConversationSummary], MessagingError> {
        let summaries = self.api.list_conversations().await?;
        debug!("Directory loaded {} conversations", summaries.len());
        self.summaries = summaries;
        self.loaded = true;
        Ok(&self.summaries)
    }

    /// Re-fetch after an inbound `new_message`.
    ///
    /// The open conversation keeps a zero badge locally. Returns whether the
    /// refresh succeeded.
    pub async fn refresh_on_new_message(
        &mut self,
        message: &Message,
        open_partner: Option<&str>,
    ) -> bool {
        debug!("Refreshing directory after message {}", message.id);
        if let Err(e) = self.list().await {
            warn!("Directory refresh failed: {}", e);
            return false;
        }
        if let Some(partner) = open_partner {
            self.mark_opened_locally(partner);
        }
        true
    }

    /// Add a placeholder for `counterpart` when the fetched list is empty.
    ///
    /// Returns the placeholder if one was synthesized.
    pub fn bootstrap_from_assignment(
        &mut self,
        counterpart: Option<&Counterpart>,
    ) -> Option<&ConversationSummary> {
        let counterpart = counterpart?;
        if !self.loaded || !self.summaries.is_empty() {
            return None;
        }

        info!("Synthesizing conversation with assigned {}", counterpart.id);
        self.summaries
            .push(ConversationSummary::placeholder(counterpart));
        self.summaries.last()
    }

    /// Zero the unread badge of `partner_id` ahead of the server round-trip.
    pub fn mark_opened_locally(&mut self, partner_id: &str) -> bool {
        match self.summaries.iter_mut().find(|s| s.partner_id == partner_id) {
            Some(summary) => {
                summary.unread_count = 0;
                true
            }
            None => false,
        }
    }

    /// Update the preview after a successful send.
    pub fn record_outbound(&mut self, message: &Message) {
        if let Some(summary) = self
            .summaries
            .iter_mut()
            .find(|s| s.partner_id == message.receiver_id)
        {
            summary.last_message = Some(LastMessage::from(message));
        }
    }

    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    pub fn get(&self, partner_id: &str) -> Option<&ConversationSummary> {
        self.summaries.iter().find(|s| s.partner_id == partner_id)
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn status(&self) -> DirectoryStatus {
        match (self.loaded, self.summaries.is_empty()) {
            (false, true) => DirectoryStatus::Loading,
            (_, true) => DirectoryStatus::Empty,
            (_, false) => DirectoryStatus::Ready,
        }
    }

    /// Sum of unread badges.
    pub fn total_unread(&self) -> u32 {
        self.summaries.iter().map(|s| s.unread_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_api::Role;
    use mock_api::{message, summary, ApiCall, MockApi, Operation};

    fn directory(api: &Arc<MockApi>) -> ConversationDirectory {
        ConversationDirectory::new(api.clone())
    }

    #[tokio::test]
    async fn test_list_keeps_server_order() {
        let api = Arc::new(MockApi::new("a1"));
        api.set_conversations(vec![
            summary("c3", "Cleo", Role::Client, Some("ok"), 0),
            summary("c1", "Ana", Role::Client, Some("hi"), 2),
        ]);
        let mut dir = directory(&api);
        assert_eq!(dir.status(), DirectoryStatus::Loading);

        dir.list().await.unwrap();
        let ids: Vec<_> = dir.summaries().iter().map(|s| s.partner_id.clone()).collect();
        assert_eq!(ids, vec!["c3", "c1"]);
        assert_eq!(dir.status(), DirectoryStatus::Ready);
        assert_eq!(dir.total_unread(), 2);
    }

    #[tokio::test]
    async fn test_empty_list_is_distinct_state() {
        let api = Arc::new(MockApi::new("a1"));
        let mut dir = directory(&api);
        dir.list().await.unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.status(), DirectoryStatus::Empty);
    }

    #[tokio::test]
    async fn test_failed_list_keeps_previous() {
        let api = Arc::new(MockApi::new("a1"));
        api.set_conversations(vec![summary("c1", "Ana", Role::Client, None, 1)]);
        let mut dir = directory(&api);
        dir.list().await.unwrap();

        api.set_failing(Operation::List, true);
        assert!(dir.list().await.is_err());
        assert_eq!(dir.summaries().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_synthesizes_single_placeholder() {
        let api = Arc::new(MockApi::new("c1"));
        let mut dir = directory(&api);
        let agent = Counterpart::new("a9", "Assigned Agent", Role::Agent);

        // Not before the list is known.
        assert!(dir.bootstrap_from_assignment(Some(&agent)).is_none());

        dir.list().await.unwrap();
        let placeholder = dir.bootstrap_from_assignment(Some(&agent)).cloned().unwrap();
        assert_eq!(placeholder.partner_id, "a9");
        assert_eq!(placeholder.unread_count, 0);
        assert!(placeholder.last_message.is_none());

        // Only once.
        assert!(dir.bootstrap_from_assignment(Some(&agent)).is_none());
        assert_eq!(dir.summaries().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_when_conversations_exist() {
        let api = Arc::new(MockApi::new("c1"));
        api.set_conversations(vec![summary("a2", "Other", Role::Agent, Some("hey"), 0)]);
        let mut dir = directory(&api);
        dir.list().await.unwrap();

        let agent = Counterpart::new("a9", "Assigned Agent", Role::Agent);
        assert!(dir.bootstrap_from_assignment(Some(&agent)).is_none());
        assert!(dir.bootstrap_from_assignment(None).is_none());
        assert_eq!(dir.summaries().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_refetches_and_keeps_open_badge_zero() {
        let api = Arc::new(MockApi::new("a1"));
        api.set_conversations(vec![
            summary("c1", "Ana", Role::Client, None, 0),
            summary("c2", "Ben", Role::Client, None, 0),
        ]);
        let mut dir = directory(&api);
        dir.list().await.unwrap();
        api.clear_calls();

        let from_open = message("m1", "c1", "a1", "still there?");
        let from_closed = message("m2", "c2", "a1", "quick question");
        api.receive(&from_open);
        api.receive(&from_closed);

        assert!(dir.refresh_on_new_message(&from_closed, Some("c1")).await);
        assert_eq!(api.calls(), vec![ApiCall::ListConversations]);
        assert_eq!(dir.get("c2").unwrap().unread_count, 1);
        assert_eq!(dir.get("c1").unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_mark_opened_locally_and_outbound_preview() {
        let api = Arc::new(MockApi::new("a1"));
        api.set_conversations(vec![summary("c1", "Ana", Role::Client, Some("old"), 4)]);
        let mut dir = directory(&api);
        dir.list().await.unwrap();

        assert!(dir.mark_opened_locally("c1"));
        assert!(!dir.mark_opened_locally("nobody"));
        assert_eq!(dir.get("c1").unwrap().unread_count, 0);

        dir.record_outbound(&message("m9", "a1", "c1", "new"));
        assert_eq!(
            dir.get("c1").unwrap().last_message.as_ref().unwrap().content,
            "new"
        );
    }
}
