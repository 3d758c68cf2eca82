//! Configuration types for the realtime channel.

use std::env;

/// Deployment configuration for the push channel.
///
/// A missing `key` is a fatal local configuration error: the connector
/// refuses to subscribe and never retries.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Application key of the push service.
    pub key: Option<String>,
    /// SSE endpoint serving channel events.
    pub events_url: String,
    /// Endpoint that signs private channel subscriptions.
    pub auth_url: String,
}

impl ChannelConfig {
    /// Create a configuration with every field set.
    pub fn new(
        key: impl Into<String>,
        events_url: impl Into<String>,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            events_url: events_url.into(),
            auth_url: auth_url.into(),
        }
    }

    /// A configuration without a channel key.
    pub fn unconfigured(events_url: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            key: None,
            events_url: events_url.into(),
            auth_url: auth_url.into(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CRM_CHANNEL_KEY` | Push application key | (none, channel disabled) |
    /// | `CRM_CHANNEL_URL` | SSE events endpoint | `{api_base}/realtime/events` |
    /// | `CRM_CHANNEL_AUTH_URL` | Channel auth endpoint | `{api_base}/broadcasting/auth` |
    pub fn from_env(api: &crm_api::ApiConfig) -> Self {
        let key = env::var("CRM_CHANNEL_KEY").ok();
        let events_url = env::var("CRM_CHANNEL_URL")
            .unwrap_or_else(|_| format!("{}/realtime/events", api.base_url));
        let auth_url =
            env::var("CRM_CHANNEL_AUTH_URL").unwrap_or_else(|_| api.channel_auth_url());

        Self {
            key,
            events_url,
            auth_url,
        }
    }

    /// The configured key, if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Whether a subscription may be attempted at all.
    pub fn is_configured(&self) -> bool {
        self.key().is_some()
    }
}

/// Deterministic private channel name for an identity.
pub fn private_channel_name(identity_id: &str) -> String {
    format!("private-user.{}", identity_id)
}
