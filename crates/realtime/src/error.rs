//! Error types for the realtime channel.

use thiserror::Error;

/// Errors raised while establishing the push channel.
///
/// Only precondition failures reach callers of `connect`; transport and
/// authorization failures are recorded in the connection state instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel configuration is missing. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// No bearer credential was supplied.
    #[error("missing credential")]
    MissingCredential,

    /// No identity id was supplied.
    #[error("missing identity")]
    MissingIdentity,

    /// The auth endpoint refused the private channel.
    #[error("channel authorization rejected: {0}")]
    Unauthorized(String),

    /// The transport failed to open the stream.
    #[error("transport error: {0}")]
    Transport(String),
}
