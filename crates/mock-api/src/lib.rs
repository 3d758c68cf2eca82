//! Test doubles for the CRM messaging layer.
//!
//! - [`MockApi`] - in-memory [`MessagingApi`](crm_api::MessagingApi) that
//!   records every call and can be told to fail or stall
//! - [`ScriptedTransport`] - push transport whose events are emitted by the test
//!
//! # Example
//!
//! ```rust
//! use crm_api::MessagingApi;
//! use mock_api::{message, ApiCall, MockApi};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let api = MockApi::new("client-1");
//!     api.set_history("agent-1", vec![message("1", "agent-1", "client-1", "Welcome!")]);
//!
//!     let history = api.conversation_history("agent-1").await.unwrap();
//!     assert_eq!(history.len(), 1);
//!     assert_eq!(api.calls(), vec![ApiCall::History("agent-1".to_string())]);
//! }
//! ```

mod api;
mod fixtures;
mod transport;

pub use api::{ApiCall, MockApi, Operation};
pub use fixtures::{message, message_at, summary};
pub use transport::{ScriptedTransport, SubscribeAttempt};
