//! Server-Sent Events (SSE) transport for private channels.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Error as SseError, Event, EventSource, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::event::ChannelEvent;
use crate::transport::{ChannelTransport, EventStream, TransportEvent};

/// Request body for the channel auth endpoint.
#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    channel_name: &'a str,
}

/// Signed authorization for one private channel.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: String,
}

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failed attempts (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }

    /// Check if we should retry after the given number of failed attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Channel transport over SSE, authorized through the CRM auth endpoint.
///
/// The transport owns reconnection: every attempt, first or not, asks the
/// auth endpoint for a fresh signature before opening the stream. Only a
/// refusal from the auth endpoint is reported as [`TransportEvent::Rejected`];
/// a 401 on the event stream itself just means the signature went stale.
#[derive(Debug, Clone)]
pub struct SseTransport {
    http: Client,
    sse: Client,
    config: ChannelConfig,
    reconnect: ReconnectConfig,
}

impl SseTransport {
    /// Create a transport with the default reconnection policy.
    pub fn new(config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::with_reconnect(config, ReconnectConfig::default())
    }

    /// Create a transport with a custom reconnection policy.
    pub fn with_reconnect(
        config: ChannelConfig,
        reconnect: ReconnectConfig,
    ) -> Result<Self, ChannelError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        // Long-lived stream: no request timeout.
        let sse = Client::builder()
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            sse,
            config,
            reconnect,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Ask the auth endpoint to sign `channel` for `credential`.
    async fn authorize(&self, channel: &str, credential: &str) -> Result<String, ChannelError> {
        debug!("Authorizing channel {} at {}", channel, self.config.auth_url);

        let response = self
            .http
            .post(&self.config.auth_url)
            .bearer_auth(credential)
            .json(&AuthRequest {
                channel_name: channel,
            })
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Unauthorized(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(auth.auth)
    }

    /// Authorize `channel` and open one event source for it.
    async fn open(&self, channel: &str, credential: &str) -> Result<EventSource, ChannelError> {
        let key = self
            .config
            .key()
            .ok_or_else(|| ChannelError::Config("channel key is not configured".to_string()))?;

        let signature = self.authorize(channel, credential).await?;

        info!("Creating SSE connection to {} for {}", self.config.events_url, channel);
        let mut event_source = self
            .sse
            .get(&self.config.events_url)
            .query(&[("channel", channel), ("key", key)])
            .bearer_auth(credential)
            .header("X-Channel-Auth", signature)
            .eventsource()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        // Reconnects go through `open` again so they are re-authorized.
        event_source.set_retry_policy(Box::new(Never));
        Ok(event_source)
    }
}

#[async_trait]
impl ChannelTransport for SseTransport {
    async fn subscribe(
        &self,
        channel: &str,
        credential: &str,
    ) -> Result<EventStream, ChannelError> {
        let source = self.open(channel, credential).await?;

        let stream = SseSubscription {
            transport: self.clone(),
            channel: channel.to_string(),
            credential: credential.to_string(),
            source: Some(source),
            attempts: 0,
            finished: false,
        };
        Ok(Box::pin(futures::stream::unfold(stream, |mut stream| async move {
            let event = stream.next_event().await?;
            Some((event, stream))
        })))
    }
}

/// One subscription, reopened and re-authorized after every failure.
struct SseSubscription {
    transport: SseTransport,
    channel: String,
    credential: String,
    source: Option<EventSource>,
    /// Consecutive attempts that did not reach `Open`.
    attempts: u32,
    finished: bool,
}

impl SseSubscription {
    fn discard_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }

    async fn reopen(&mut self) -> Result<(), TransportEvent> {
        let delay = self.transport.reconnect.delay_for_attempt(self.attempts);
        self.attempts += 1;
        tokio::time::sleep(delay).await;

        info!("Reconnecting to {} (attempt {})", self.channel, self.attempts);
        match self.transport.open(&self.channel, &self.credential).await {
            Ok(source) => {
                self.source = Some(source);
                Ok(())
            }
            Err(ChannelError::Unauthorized(reason)) => {
                error!("Channel {} authorization refused: {}", self.channel, reason);
                self.finished = true;
                Err(TransportEvent::Rejected(reason))
            }
            Err(e) => {
                warn!("Reconnect to {} failed: {}", self.channel, e);
                Err(TransportEvent::Error(e.to_string()))
            }
        }
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            if self.finished {
                return None;
            }
            if self.source.is_none() {
                if !self.transport.reconnect.should_retry(self.attempts) {
                    info!("Giving up on {} after {} attempts", self.channel, self.attempts);
                    return None;
                }
                if let Err(event) = self.reopen().await {
                    return Some(event);
                }
            }
            let Some(source) = self.source.as_mut() else {
                continue;
            };

            match source.next().await {
                Some(Ok(Event::Open)) => {
                    debug!("SSE connection opened");
                    self.attempts = 0;
                    return Some(TransportEvent::Open);
                }
                Some(Ok(Event::Message(msg))) => {
                    debug!("Received SSE event: {}", msg.event);
                    return Some(TransportEvent::Event(ChannelEvent::from_text(
                        &msg.event, &msg.data,
                    )));
                }
                Some(Err(SseError::StreamEnded)) | None => {
                    warn!("SSE stream for {} ended, reconnecting", self.channel);
                    self.discard_source();
                    return Some(TransportEvent::Dropped);
                }
                Some(Err(SseError::InvalidStatusCode(status, _)))
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
                {
                    warn!("SSE signature for {} refused ({}), re-authorizing", self.channel, status);
                    self.discard_source();
                    return Some(TransportEvent::Error(format!("HTTP {}", status)));
                }
                Some(Err(e)) => {
                    error!("SSE error: {}", e);
                    self.discard_source();
                    return Some(TransportEvent::Error(e.to_string()));
                }
            }
        }
    }
}
