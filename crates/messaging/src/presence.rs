//! Ephemeral typing presence.
//!
//! Outbound, local typing intent becomes best-effort `POST /presence/typing`
//! calls. Inbound, `typing` / `stop_typing` events from the open thread's
//! partner drive a "partner is typing" flag that expires on its own after
//! [`TYPING_TIMEOUT`]. The flag is leveled: every `typing` event re-arms the
//! timer, `stop_typing` clears it at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crm_api::MessagingApi;
use realtime::ChannelHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long a `typing` signal keeps the flag set without a repeat.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Typing presence for the currently open thread.
pub struct PresenceSignaler {
    api: Arc<dyn MessagingApi>,
    channel: ChannelHandle,
    active_partner: Option<String>,
    typing: Arc<watch::Sender<bool>>,
    /// Bumped on every arm or clear; a timer only fires for its own epoch.
    epoch: Arc<AtomicU64>,
    expiry: Option<JoinHandle<()>>,
}

impl PresenceSignaler {
    pub fn new(api: Arc<dyn MessagingApi>, channel: ChannelHandle) -> Self {
        let (typing, _) = watch::channel(false);
        Self {
            api,
            channel,
            active_partner: None,
            typing: Arc::new(typing),
            epoch: Arc::new(AtomicU64::new(0)),
            expiry: None,
        }
    }

    /// Partner whose signals are currently tracked.
    pub fn active_partner(&self) -> Option<&str> {
        self.active_partner.as_deref()
    }

    /// Scope presence to `partner`. Switching partners clears the flag.
    pub fn set_active_partner(&mut self, partner: Option<&str>) {
        if self.active_partner.as_deref() != partner {
            self.clear();
            self.active_partner = partner.map(str::to_string);
        }
    }

    /// Tell the active partner we are typing.
    ///
    /// Returns false, without sending anything, when the channel is not live
    /// or no partner is active. Request failures are swallowed.
    pub async fn start_typing(&self) -> bool {
        self.signal(true).await
    }

    /// Tell the active partner we stopped typing.
    pub async fn stop_typing(&self) -> bool {
        self.signal(false).await
    }

    async fn signal(&self, is_typing: bool) -> bool {
        let Some(receiver) = self.active_partner.as_deref().filter(|p| !p.is_empty()) else {
            debug!("No active partner, typing signal not sent");
            return false;
        };
        if !self.channel.is_connected() {
            debug!("Channel not connected, typing signal not sent");
            return false;
        }

        match self.api.send_typing(receiver, is_typing).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Typing signal to {} failed: {}", receiver, e);
                false
            }
        }
    }

    fn is_active(&self, sender_id: &str) -> bool {
        self.active_partner.as_deref() == Some(sender_id)
    }

    /// Apply an inbound `typing` event. Returns whether it was applied.
    pub fn handle_typing(&mut self, sender_id: &str) -> bool {
        if !self.is_active(sender_id) {
            debug!("Ignoring typing from inactive partner {}", sender_id);
            return false;
        }

        let epoch = self.epoch.clone();
        let mut armed = 0;
        self.typing.send_if_modified(|flag| {
            armed = epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let changed = !*flag;
            *flag = true;
            changed
        });

        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }

        let typing = self.typing.clone();
        self.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(TYPING_TIMEOUT).await;
            typing.send_if_modified(|flag| {
                if epoch.load(Ordering::SeqCst) != armed || !*flag {
                    return false;
                }
                *flag = false;
                true
            });
        }));
        true
    }

    /// Apply an inbound `stop_typing` event. Returns whether it was applied.
    pub fn handle_stop_typing(&mut self, sender_id: &str) -> bool {
        if !self.is_active(sender_id) {
            debug!("Ignoring stop_typing from inactive partner {}", sender_id);
            return false;
        }
        self.clear();
        true
    }

    /// Whether the active partner is typing right now.
    pub fn is_partner_typing(&self) -> bool {
        *self.typing.borrow()
    }

    /// Receiver notified whenever the flag flips.
    pub fn watch_typing(&self) -> watch::Receiver<bool> {
        self.typing.subscribe()
    }

    fn clear(&mut self) {
        let epoch = &self.epoch;
        self.typing.send_if_modified(|flag| {
            epoch.fetch_add(1, Ordering::SeqCst);
            let changed = *flag;
            *flag = false;
            changed
        });
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}

impl Drop for PresenceSignaler {
    fn drop(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}
