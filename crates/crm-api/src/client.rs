//! CRM REST API HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::MessagingApi;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{
    ConversationList, ConversationSummary, Message, MessageHistory, SendMessageParams,
    SentMessage, TypingParams,
};

/// Client for the CRM messaging endpoints.
#[derive(Clone)]
pub struct CrmClient {
    http: Client,
    config: ApiConfig,
}

impl CrmClient {
    /// Build a client for the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        if config.credential.trim().is_empty() {
            return Err(ApiError::Config("credential must not be empty".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.credential)
            .header("Accept", "application/json")
    }

    async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R, ApiError> {
        debug!("GET {}", url);
        let response = self.authorized(self.http.get(url)).send().await?;
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        debug!("POST {}", url);
        let mut request = self.authorized(self.http.post(url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessagingApi for CrmClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        let list: ConversationList = self.get_json(&self.config.conversations_url()).await?;
        Ok(list.into_summaries())
    }

    async fn conversation_history(&self, partner_id: &str) -> Result<Vec<Message>, ApiError> {
        let history: MessageHistory = self
            .get_json(&self.config.conversation_url(partner_id))
            .await?;
        Ok(history.into_messages())
    }

    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message, ApiError> {
        let params = SendMessageParams::new(receiver_id, content);
        let response = self.post(&self.config.messages_url(), Some(&params)).await?;
        let bytes = response.bytes().await?;
        let sent: SentMessage = serde_json::from_slice(&bytes)?;
        Ok(sent.into_message())
    }

    async fn mark_read(&self, partner_id: &str) -> Result<(), ApiError> {
        // Any 2xx counts; the body is not inspected.
        self.post::<()>(&self.config.read_url(partner_id), None)
            .await?;
        Ok(())
    }

    async fn send_typing(&self, receiver_id: &str, is_typing: bool) -> Result<(), ApiError> {
        let params = TypingParams {
            receiver_id: receiver_id.to_string(),
            is_typing,
        };
        self.post(&self.config.typing_url(), Some(&params)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for CrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmClient")
            .field("config", &self.config)
            .finish()
    }
}
