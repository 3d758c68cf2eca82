//! Channel connector: one authenticated private channel per signed-in identity.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crm_api::Identity;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{private_channel_name, ChannelConfig};
use crate::error::ChannelError;
use crate::sse::SseTransport;
use crate::state::{ConnectionPhase, ConnectionState};
use crate::subscription::{Binding, BindingOwner, Handler, SubscriptionTable};
use crate::transport::{ChannelTransport, EventStream, TransportEvent};

/// The live subscription of one identity.
struct Session {
    identity: Identity,
    credential: String,
    channel: String,
    generation: u64,
    pump: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Shared {
    session: Option<Session>,
    table: SubscriptionTable,
    generation: u64,
    /// Set once a missing configuration has been reported.
    config_fault: Option<String>,
    /// Credential whose channel authorization was refused.
    rejected_credential: Option<String>,
}

impl Shared {
    fn live_channel(&self, state: &ConnectionState) -> Option<String> {
        if state.is_connected() {
            self.session.as_ref().map(|s| s.channel.clone())
        } else {
            None
        }
    }
}

struct Inner {
    config: ChannelConfig,
    transport: Arc<dyn ChannelTransport>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new state and re-evaluate every binding against it.
    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        let live = shared.live_channel(&state);
        shared.table.rebind(live.as_deref());
        debug!("Channel state -> {}", state.phase);
        self.state_tx.send_replace(state);
    }

    fn teardown_locked(&self, shared: &mut Shared) {
        shared.generation += 1;
        if let Some(session) = shared.session.take() {
            if let Some(pump) = session.pump {
                pump.abort();
            }
            info!("Unsubscribed from {}", session.channel);
        }
        self.set_state(shared, ConnectionState::default());
    }

    /// Apply one transport event. Returns false once the pump should stop.
    fn on_transport_event(&self, generation: u64, event: TransportEvent) -> bool {
        let mut shared = self.lock();
        let Some(channel) = shared
            .session
            .as_ref()
            .filter(|s| s.generation == generation)
            .map(|s| s.channel.clone())
        else {
            return false;
        };

        match event {
            TransportEvent::Open => {
                info!("Connected to {}", channel);
                self.set_state(&mut shared, ConnectionState::with_phase(ConnectionPhase::Connected));
            }
            TransportEvent::Event(event) => {
                if !self.state_tx.borrow().is_connected() {
                    debug!("Dropping {} received while not connected", event.name);
                    return true;
                }
                let handlers = shared.table.handlers_for(&channel, &event.name);
                drop(shared);
                if handlers.is_empty() {
                    debug!("No handler bound for {}", event.name);
                }
                for handler in handlers {
                    handler(&event);
                }
            }
            TransportEvent::Dropped => {
                warn!("Lost connection to {}", channel);
                self.set_state(&mut shared, ConnectionState::default());
            }
            TransportEvent::Error(reason) => {
                warn!("Channel {} transport error: {}", channel, reason);
                self.set_state(&mut shared, ConnectionState::failed(reason));
            }
            TransportEvent::Rejected(reason) => {
                error!("Channel {} rejected: {}", channel, reason);
                if let Some(session) = shared.session.take() {
                    shared.rejected_credential = Some(session.credential);
                }
                self.set_state(
                    &mut shared,
                    ConnectionState::failed(ChannelError::Unauthorized(reason).to_string()),
                );
                return false;
            }
        }
        true
    }

    fn on_stream_finished(&self, generation: u64) {
        let mut shared = self.lock();
        if shared
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            info!("Channel stream finished");
            shared.session = None;
            let last_error = self.state_tx.borrow().last_error.clone();
            self.set_state(
                &mut shared,
                ConnectionState {
                    phase: ConnectionPhase::Disconnected,
                    last_error,
                },
            );
        }
    }
}

impl BindingOwner for Inner {
    fn release(&self, id: u64) {
        self.lock().table.release(id);
    }

    fn is_bound(&self, id: u64) -> bool {
        self.lock().table.is_bound(id)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(pump) = shared.session.take().and_then(|s| s.pump) {
            pump.abort();
        }
    }
}

async fn pump(inner: Weak<Inner>, generation: u64, mut stream: EventStream) {
    while let Some(event) = stream.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.on_transport_event(generation, event) {
            return;
        }
    }
    if let Some(inner) = inner.upgrade() {
        inner.on_stream_finished(generation);
    }
}

/// Shared handle to the process-wide push channel.
///
/// Construct one at application start and pass clones to every component
/// that needs live events. Only this handle mutates connection state.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<Inner>,
}

impl ChannelHandle {
    /// Create a handle using the given transport.
    pub fn new(config: ChannelConfig, transport: Arc<dyn ChannelTransport>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                shared: Mutex::new(Shared::default()),
                state_tx,
            }),
        }
    }

    /// Create a handle backed by the SSE transport.
    pub fn sse(config: ChannelConfig) -> Result<Self, ChannelError> {
        let transport = SseTransport::new(config.clone())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Subscribe to the private channel of `identity`.
    ///
    /// No-op if a subscription for the same identity is already live.
    /// Fails fast, without any subscribe attempt, on a blank credential or
    /// identity and on missing channel configuration. Authorization and
    /// transport failures are reported through [`ChannelHandle::state`].
    pub async fn connect(&self, credential: &str, identity: &Identity) -> Result<(), ChannelError> {
        if credential.trim().is_empty() {
            return Err(ChannelError::MissingCredential);
        }
        if identity.id.trim().is_empty() {
            return Err(ChannelError::MissingIdentity);
        }

        let (channel, generation) = {
            let mut shared = self.inner.lock();

            if let Some(reason) = &shared.config_fault {
                return Err(ChannelError::Config(reason.clone()));
            }
            if !self.inner.config.is_configured() {
                let reason = "channel key is not configured".to_string();
                error!("Realtime channel disabled: {}", reason);
                shared.config_fault = Some(reason.clone());
                let err = ChannelError::Config(reason);
                self.inner
                    .set_state(&mut shared, ConnectionState::failed(err.to_string()));
                return Err(err);
            }

            if shared.rejected_credential.as_deref() == Some(credential) {
                debug!("Credential already rejected, not resubscribing");
                return Ok(());
            }

            let current = shared
                .session
                .as_ref()
                .map(|s| s.identity.id == identity.id && s.credential == credential);
            match current {
                Some(true) => {
                    debug!("Already subscribed for {}", identity.id);
                    return Ok(());
                }
                Some(false) => self.inner.teardown_locked(&mut shared),
                None => {}
            }

            shared.generation += 1;
            let generation = shared.generation;
            let channel = private_channel_name(&identity.id);
            shared.session = Some(Session {
                identity: identity.clone(),
                credential: credential.to_string(),
                channel: channel.clone(),
                generation,
                pump: None,
            });
            self.inner.set_state(
                &mut shared,
                ConnectionState::with_phase(ConnectionPhase::Connecting),
            );
            (channel, generation)
        };

        info!("Subscribing to {}", channel);
        let result = self.inner.transport.subscribe(&channel, credential).await;

        let mut shared = self.inner.lock();
        if shared.generation != generation {
            debug!("Subscription to {} superseded", channel);
            return Ok(());
        }

        match result {
            Ok(stream) => {
                let task = tokio::spawn(pump(Arc::downgrade(&self.inner), generation, stream));
                if let Some(session) = shared.session.as_mut() {
                    session.pump = Some(task);
                }
            }
            Err(ChannelError::Unauthorized(reason)) => {
                error!("Authorization for {} rejected: {}", channel, reason);
                shared.session = None;
                shared.rejected_credential = Some(credential.to_string());
                self.inner.set_state(
                    &mut shared,
                    ConnectionState::failed(ChannelError::Unauthorized(reason).to_string()),
                );
            }
            Err(e) => {
                warn!("Failed to subscribe to {}: {}", channel, e);
                shared.session = None;
                self.inner
                    .set_state(&mut shared, ConnectionState::failed(e.to_string()));
            }
        }
        Ok(())
    }

    /// Unsubscribe and release the connection.
    pub fn teardown(&self) {
        let mut shared = self.inner.lock();
        self.inner.teardown_locked(&mut shared);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Whether events are currently flowing.
    pub fn is_connected(&self) -> bool {
        self.inner.state_tx.borrow().is_connected()
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Identity of the current subscription.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().session.as_ref().map(|s| s.identity.clone())
    }

    /// Name of the current private channel.
    pub fn channel_name(&self) -> Option<String> {
        self.inner.lock().session.as_ref().map(|s| s.channel.clone())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Bind `handler` to `event` for as long as the returned guard lives.
    ///
    /// The handler receives events only while the channel is connected;
    /// binding before connect is allowed and takes effect on connect.
    pub fn bind(&self, event: &str, handler: Handler) -> Binding {
        let mut shared = self.inner.lock();
        let live = shared.live_channel(&self.inner.state_tx.borrow());
        let id = shared.table.register(event, handler, live.as_deref());
        drop(shared);

        let inner: Arc<dyn BindingOwner> = self.inner.clone();
        Binding::new(id, Arc::downgrade(&inner))
    }

    /// Number of registered handler slots.
    pub fn binding_count(&self) -> usize {
        self.inner.lock().table.len()
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}
