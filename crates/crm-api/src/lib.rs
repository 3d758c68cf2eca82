//! CRM messaging REST client.
//!
//! This crate provides the data model and a Rust client for the messaging
//! endpoints of the brokerage CRM API. It supports:
//!
//! - Listing conversation summaries for the signed-in identity
//! - Fetching message history with one partner
//! - Sending messages and read receipts
//! - Sending typing presence signals
//!
//! # Example
//!
//! ```no_run
//! use crm_api::{ApiConfig, CrmClient, MessagingApi};
//!
//! # async fn example() -> Result<(), crm_api::ApiError> {
//! let client = CrmClient::new(ApiConfig::new("https://crm.example.com/api", "token"))?;
//!
//! for summary in client.list_conversations().await? {
//!     println!("{} ({} unread)", summary.partner_name, summary.unread_count);
//! }
//!
//! let sent = client.send_message("agent-7", "Hello!").await?;
//! println!("Sent message {} at {}", sent.id, sent.created_at);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use api::MessagingApi;
pub use client::CrmClient;
pub use config::{ApiConfig, ConfigError};
pub use error::ApiError;
pub use types::*;

/// Re-exported so implementors of [`MessagingApi`] need no direct dependency.
pub use async_trait::async_trait;
