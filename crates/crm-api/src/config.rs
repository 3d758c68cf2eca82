//! Configuration types for the CRM REST client.

use std::env;

/// Configuration for talking to the CRM REST API.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL of the API (e.g., "https://crm.example.com/api").
    pub base_url: String,
    /// Bearer credential issued by the authentication collaborator.
    pub credential: String,
}

impl ApiConfig {
    /// Create a new configuration with the given base URL and credential.
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.into(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CRM_API_URL` | API base URL | `http://127.0.0.1:8000/api` |
    /// | `CRM_TOKEN` | Bearer credential | (required) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var("CRM_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000/api".to_string());
        let credential = env::var("CRM_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self::new(base_url, credential))
    }

    /// `GET` endpoint for the conversation directory.
    pub fn conversations_url(&self) -> String {
        format!("{}/conversations", self.base_url)
    }

    /// `GET` endpoint for the history with one partner.
    pub fn conversation_url(&self, partner_id: &str) -> String {
        format!(
            "{}/conversations/{}",
            self.base_url,
            urlencoding::encode(partner_id)
        )
    }

    /// `POST` endpoint marking a partner's messages as read.
    pub fn read_url(&self, partner_id: &str) -> String {
        format!("{}/read", self.conversation_url(partner_id))
    }

    /// `POST` endpoint for sending a message.
    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }

    /// `POST` endpoint for typing signals.
    pub fn typing_url(&self) -> String {
        format!("{}/presence/typing", self.base_url)
    }

    /// Endpoint the realtime transport uses to authorize private channels.
    pub fn channel_auth_url(&self) -> String {
        format!("{}/broadcasting/auth", self.base_url)
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CRM_TOKEN environment variable is required")]
    MissingToken,
}
