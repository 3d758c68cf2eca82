//! Realtime push channel for CRM messaging.
//!
//! This crate owns the authenticated, per-identity event channel:
//!
//! - [`ChannelHandle`] connects one private channel per signed-in identity
//!   and publishes its [`ConnectionState`]
//! - [`ChannelHandle::bind`] registers event handlers scoped to a [`Binding`]
//! - [`PushEvent`] decodes `new_message`, `typing` and `stop_typing`
//! - [`SseTransport`] is the default transport, re-authorized on every reconnect
//!
//! # Example
//!
//! ```no_run
//! use crm_api::Identity;
//! use realtime::{handler, ChannelConfig, ChannelHandle, PushEvent};
//!
//! # async fn example() -> Result<(), realtime::ChannelError> {
//! let config = ChannelConfig::new(
//!     "app-key",
//!     "https://crm.example.com/api/realtime/events",
//!     "https://crm.example.com/api/broadcasting/auth",
//! );
//! let channel = ChannelHandle::sse(config)?;
//!
//! let _binding = channel.bind(
//!     realtime::NEW_MESSAGE,
//!     handler(|event| {
//!         if let Some(PushEvent::NewMessage(message)) = PushEvent::decode(event) {
//!             println!("{}: {}", message.sender_id, message.content);
//!         }
//!     }),
//! );
//!
//! channel.connect("token", &Identity::agent("7")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod event;
pub mod sse;
pub mod state;
pub mod subscription;
pub mod transport;

pub use config::{private_channel_name, ChannelConfig};
pub use connector::ChannelHandle;
pub use error::ChannelError;
pub use event::{ChannelEvent, PushEvent, NEW_MESSAGE, STOP_TYPING, TYPING};
pub use sse::{ReconnectConfig, SseTransport};
pub use state::{ConnectionPhase, ConnectionState};
pub use subscription::{handler, Binding, Handler};
pub use transport::{ChannelTransport, EventStream, TransportEvent};
