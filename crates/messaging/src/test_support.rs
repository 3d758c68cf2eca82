//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use crm_api::Identity;
use mock_api::ScriptedTransport;
use realtime::{ChannelConfig, ChannelHandle};

pub(crate) fn channel_config() -> ChannelConfig {
    ChannelConfig::new("app-key", "http://localhost/events", "http://localhost/auth")
}

/// A configured channel that was never connected.
pub(crate) fn idle_channel() -> ChannelHandle {
    ChannelHandle::new(channel_config(), Arc::new(ScriptedTransport::new()))
}

/// A channel connected for `identity_id` over a scripted transport.
pub(crate) async fn connected_channel(identity_id: &str) -> (ChannelHandle, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new());
    let channel = ChannelHandle::new(channel_config(), transport.clone());
    channel
        .connect("token", &Identity::client(identity_id))
        .await
        .unwrap();

    let mut state = channel.watch_state();
    tokio::time::timeout(Duration::from_secs(2), state.wait_for(|s| s.is_connected()))
        .await
        .unwrap()
        .unwrap();
    (channel, transport)
}
