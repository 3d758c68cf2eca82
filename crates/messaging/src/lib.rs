//! Conversation directory, live threads and typing presence for the CRM
//! messaging surfaces.
//!
//! A [`MessagingSurface`] combines:
//!
//! - a [`ConversationDirectory`] refreshed on every inbound message
//! - a [`ConversationThread`] holding the open partner's history
//! - a [`PresenceSignaler`] with a self-expiring "partner is typing" flag
//!
//! All of them share one [`realtime::ChannelHandle`] created at session start.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crm_api::{ApiConfig, CrmClient, Identity};
//! use messaging::{MessagingSurface, SurfaceConfig};
//! use realtime::{ChannelConfig, ChannelHandle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api_config = ApiConfig::new("https://crm.example.com/api", "token");
//! let channel = ChannelHandle::sse(ChannelConfig::from_env(&api_config))?;
//! let api = Arc::new(CrmClient::new(api_config)?);
//!
//! let mut surface = MessagingSurface::new(SurfaceConfig::agent(), api, channel.clone());
//! channel.connect("token", &Identity::agent("7")).await?;
//! surface.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod presence;
pub mod surface;
pub mod thread;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, SessionConfig};
pub use directory::{ConversationDirectory, DirectoryStatus};
pub use error::MessagingError;
pub use presence::{PresenceSignaler, TYPING_TIMEOUT};
pub use surface::{
    BootstrapPolicy, Chrome, Layout, MessagingSurface, Pane, SurfaceCommand, SurfaceConfig,
    SurfaceView, NARROW_VIEWPORT_WIDTH,
};
pub use thread::{ConversationThread, PendingSend};
