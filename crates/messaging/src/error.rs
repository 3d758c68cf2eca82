//! Error types for the messaging layer.

use crm_api::ApiError;
use realtime::ChannelError;
use thiserror::Error;

/// Errors surfaced by the directory, thread store and surfaces.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// REST call failed. Prior state is left intact; the action can be retried.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Channel precondition failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Message content is empty after trimming.
    #[error("message content is empty")]
    EmptyContent,

    /// No conversation is open.
    #[error("no conversation is open")]
    NoActiveThread,

    /// A send is already in flight.
    #[error("a send is already in progress")]
    SendInProgress,
}

impl MessagingError {
    /// Validation failures never reached the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MessagingError::EmptyContent
                | MessagingError::NoActiveThread
                | MessagingError::SendInProgress
        )
    }
}
