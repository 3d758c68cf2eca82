//! Transport seam between the connector and the push service.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::error::ChannelError;
use crate::event::ChannelEvent;

/// What a live subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The stream is (re)established.
    Open,
    /// A named event arrived.
    Event(ChannelEvent),
    /// Network loss; the transport reconnects on its own.
    Dropped,
    /// Transport failure; the transport reconnects on its own.
    Error(String),
    /// The server refused the subscription. Terminal.
    Rejected(String),
}

/// Stream of transport events for one subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// A push service able to open authorized private channels.
///
/// Implementations authorize `channel` with `credential` on every call and
/// own their reconnection policy.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn subscribe(&self, channel: &str, credential: &str)
        -> Result<EventStream, ChannelError>;
}
