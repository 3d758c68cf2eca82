//! Channel connector behaviour against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use crm_api::Identity;
use mock_api::ScriptedTransport;
use realtime::{
    handler, ChannelConfig, ChannelError, ChannelEvent, ChannelHandle, ConnectionPhase,
    ConnectionState, NEW_MESSAGE, TYPING,
};
use serde_json::json;
use tokio::sync::mpsc;

fn configured() -> ChannelConfig {
    ChannelConfig::new("app-key", "http://localhost/events", "http://localhost/auth")
}

fn handle_with(transport: &Arc<ScriptedTransport>) -> ChannelHandle {
    ChannelHandle::new(configured(), transport.clone())
}

async fn wait_until(channel: &ChannelHandle, f: impl Fn(&ConnectionState) -> bool) {
    let mut rx = channel.watch_state();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| f(s)))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

fn recorder() -> (realtime::Handler, mpsc::UnboundedReceiver<ChannelEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let h = handler(move |event| {
        let _ = tx.send(event.clone());
    });
    (h, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("handler dropped")
}

mod config_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_fatal_and_never_subscribes() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = ChannelConfig::unconfigured("http://localhost/events", "http://localhost/auth");
        let channel = ChannelHandle::new(config, transport.clone());

        let err = channel
            .connect("token", &Identity::agent("42"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Config(_)));
        assert!(transport.attempts().is_empty());

        let state = channel.state();
        assert!(!state.is_connected());
        assert_eq!(state.phase, ConnectionPhase::Error);
        assert!(state
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("configuration error")));

        // Sticky: no retry on later calls either.
        let again = channel.connect("token", &Identity::agent("42")).await;
        assert!(matches!(again, Err(ChannelError::Config(_))));
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_or_identity_fails_fast() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        assert_eq!(
            channel.connect("", &Identity::client("1")).await,
            Err(ChannelError::MissingCredential)
        );
        assert_eq!(
            channel.connect("token", &Identity::client(" ")).await,
            Err(ChannelError::MissingIdentity)
        );
        assert!(transport.attempts().is_empty());
        assert_eq!(channel.state(), ConnectionState::default());
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_subscribes_private_channel() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        channel.connect("token-a", &Identity::agent("42")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].channel, "private-user.42");
        assert_eq!(attempts[0].credential, "token-a");
        assert_eq!(channel.channel_name().as_deref(), Some("private-user.42"));
        assert_eq!(channel.identity(), Some(Identity::agent("42")));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_per_identity() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);
        let me = Identity::client("7");

        channel.connect("token", &me).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;
        channel.connect("token", &me).await.unwrap();

        assert_eq!(transport.attempts().len(), 1);
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn test_new_identity_replaces_subscription() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        channel.connect("token", &Identity::client("1")).await.unwrap();
        channel.connect("token", &Identity::client("2")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        let channels: Vec<_> = transport.attempts().into_iter().map(|a| a.channel).collect();
        assert_eq!(channels, vec!["private-user.1", "private-user.2"]);
        assert_eq!(channel.channel_name().as_deref(), Some("private-user.2"));
    }

    #[tokio::test]
    async fn test_phase_transitions() {
        let transport = Arc::new(ScriptedTransport::manual_open());
        let channel = handle_with(&transport);

        channel.connect("token", &Identity::agent("9")).await.unwrap();
        assert_eq!(channel.state().phase, ConnectionPhase::Connecting);

        assert!(transport.open());
        wait_until(&channel, |s| s.phase == ConnectionPhase::Connected).await;

        assert!(transport.drop_connection());
        wait_until(&channel, |s| s.phase == ConnectionPhase::Disconnected).await;

        // The transport reconnects on its own.
        assert!(transport.open());
        wait_until(&channel, |s| s.phase == ConnectionPhase::Connected).await;
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_then_reopen_recovers() {
        let transport = Arc::new(ScriptedTransport::manual_open());
        let channel = handle_with(&transport);
        let (h, mut rx) = recorder();
        let _binding = channel.bind(TYPING, h);

        channel.connect("token", &Identity::agent("9")).await.unwrap();
        assert!(transport.open());
        wait_until(&channel, |s| s.is_connected()).await;

        assert!(transport.emit(realtime::TransportEvent::Error("HTTP 401".to_string())));
        wait_until(&channel, |s| s.phase == ConnectionPhase::Error).await;
        let state = channel.state();
        assert_eq!(state.last_error.as_deref(), Some("HTTP 401"));
        assert!(!channel.is_connected());
        assert!(channel.identity().is_some());

        // Same credential, no new subscribe call.
        assert!(transport.open());
        wait_until(&channel, |s| s.is_connected()).await;
        transport.push(TYPING, json!({"senderId": "c1"}));
        assert_eq!(next_event(&mut rx).await.data, json!({"senderId": "c1"}));
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_reported_in_state() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail_with("connection refused");
        let channel = handle_with(&transport);

        // Not thrown into caller code.
        channel.connect("token", &Identity::agent("9")).await.unwrap();

        let state = channel.state();
        assert_eq!(state.phase, ConnectionPhase::Error);
        assert!(state
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_stream_end_disconnects() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        channel.connect("token", &Identity::agent("9")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        transport.close();
        wait_until(&channel, |s| s.phase == ConnectionPhase::Disconnected).await;
        assert!(channel.channel_name().is_none());
    }

    #[tokio::test]
    async fn test_teardown_releases_subscription() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        channel.connect("token", &Identity::agent("9")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        channel.teardown();
        assert_eq!(channel.state(), ConnectionState::default());
        assert!(channel.identity().is_none());

        // Events from the released stream are ignored.
        transport.drop_connection();
        transport.open();
        tokio::task::yield_now().await;
        assert_eq!(channel.state(), ConnectionState::default());
    }
}

mod authorization_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_subscription_is_terminal_for_credential() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reject_with("HTTP 403");
        let channel = handle_with(&transport);
        let me = Identity::client("5");

        channel.connect("stale", &me).await.unwrap();
        let state = channel.state();
        assert!(!state.is_connected());
        assert!(state
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("rejected")));

        transport.accept();
        channel.connect("stale", &me).await.unwrap();
        assert_eq!(transport.attempts().len(), 1);

        channel.connect("fresh", &me).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;
        assert_eq!(transport.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_from_live_stream() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);

        channel.connect("token", &Identity::client("5")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        transport.emit(realtime::TransportEvent::Rejected("HTTP 401".to_string()));
        wait_until(&channel, |s| s.phase == ConnectionPhase::Error).await;
        assert!(channel.identity().is_none());
    }
}

mod binding_tests {
    use super::*;

    #[tokio::test]
    async fn test_binding_before_connect_takes_effect_on_connect() {
        let transport = Arc::new(ScriptedTransport::manual_open());
        let channel = handle_with(&transport);
        let (h, mut rx) = recorder();

        let binding = channel.bind(TYPING, h);
        assert!(!binding.is_active());

        channel.connect("token", &Identity::agent("3")).await.unwrap();
        assert!(!binding.is_active());

        transport.open();
        wait_until(&channel, |s| s.is_connected()).await;
        assert!(binding.is_active());

        transport.push("typing", json!({"senderId": "c1"}));
        let event = next_event(&mut rx).await;
        assert_eq!(event.name, "typing");
        assert_eq!(event.data["senderId"], "c1");

        channel.teardown();
        assert!(!binding.is_active());
    }

    #[tokio::test]
    async fn test_only_matching_event_is_delivered() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);
        let (h, mut rx) = recorder();
        let _binding = channel.bind(NEW_MESSAGE, h);

        channel.connect("token", &Identity::agent("3")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        transport.push("typing", json!({"senderId": "c1"}));
        transport.push("new_message", json!({"message": null}));

        let event = next_event(&mut rx).await;
        assert_eq!(event.name, "new_message");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropping_binding_stops_delivery() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);
        let (h, mut rx) = recorder();
        let (second, mut second_rx) = recorder();
        let binding = channel.bind(TYPING, h);
        let _second = channel.bind(TYPING, second);

        channel.connect("token", &Identity::agent("3")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        binding.unbind();
        assert_eq!(channel.binding_count(), 1);

        transport.push("typing", json!({"senderId": "c1"}));
        next_event(&mut second_rx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_same_handler_bound_twice_delivers_once() {
        let transport = Arc::new(ScriptedTransport::new());
        let channel = handle_with(&transport);
        let (h, mut rx) = recorder();
        let first = channel.bind(TYPING, h.clone());
        let second = channel.bind(TYPING, h);
        assert_eq!(channel.binding_count(), 1);

        channel.connect("token", &Identity::agent("3")).await.unwrap();
        wait_until(&channel, |s| s.is_connected()).await;

        transport.push("typing", json!({"senderId": "c1"}));
        transport.push("stop_typing", json!({"senderId": "c1"}));
        next_event(&mut rx).await;
        assert!(rx.try_recv().is_err());

        drop(first);
        assert!(second.is_active());
        drop(second);
        assert_eq!(channel.binding_count(), 0);
    }
}
