//! Messaging surface: directory and thread wired to the live channel.
//!
//! The agent and client views are the same [`MessagingSurface`] with a
//! different [`SurfaceConfig`]. A surface owns its directory and thread
//! store; the channel handle is shared with the rest of the process.

use std::sync::Arc;

use crm_api::{ApiError, ConversationSummary, Counterpart, Message, MessagingApi};
use futures::future::{BoxFuture, OptionFuture};
use realtime::{
    handler, Binding, ChannelEvent, ChannelHandle, PushEvent, NEW_MESSAGE, STOP_TYPING, TYPING,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::directory::{ConversationDirectory, DirectoryStatus};
use crate::error::MessagingError;
use crate::presence::PresenceSignaler;
use crate::thread::{ConversationThread, PendingSend};

/// Viewports narrower than this show one pane at a time.
pub const NARROW_VIEWPORT_WIDTH: u32 = 768;

const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// What a surface does after its first directory load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapPolicy {
    /// Show the empty state and wait for the user.
    EmptyState,
    /// With no conversations yet, open one with the assigned counterpart.
    OpenAssigned(Counterpart),
}

/// Role-specific presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chrome {
    pub title: &'static str,
    pub empty_state: &'static str,
    /// Label directory rows with the partner's role.
    pub show_partner_role: bool,
}

impl Chrome {
    pub const AGENT: Chrome = Chrome {
        title: "Client conversations",
        empty_state: "No conversations yet",
        show_partner_role: true,
    };

    pub const CLIENT: Chrome = Chrome {
        title: "Messages",
        empty_state: "Your agent has not been assigned yet",
        show_partner_role: false,
    };
}

/// Differences between the agent and client surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub bootstrap: BootstrapPolicy,
    pub chrome: Chrome,
}

impl SurfaceConfig {
    /// Agent view: empty state, no default conversation.
    pub fn agent() -> Self {
        Self {
            bootstrap: BootstrapPolicy::EmptyState,
            chrome: Chrome::AGENT,
        }
    }

    /// Client view: opens the assigned agent's thread when nothing exists yet.
    pub fn client(assigned: Option<Counterpart>) -> Self {
        Self {
            bootstrap: assigned
                .map(BootstrapPolicy::OpenAssigned)
                .unwrap_or(BootstrapPolicy::EmptyState),
            chrome: Chrome::CLIENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Directory,
    Thread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Directory and thread side by side.
    Split,
    /// One pane, with a back affordance when it is the thread.
    Single(Pane),
}

impl Layout {
    pub fn shows_back(&self) -> bool {
        matches!(self, Layout::Single(Pane::Thread))
    }
}

/// User input driving [`MessagingSurface::run_with_shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    Open(String),
    Back,
    Draft(String),
    Send,
    Refresh,
    Resize(u32),
}

/// Render-ready snapshot of a surface.
#[derive(Debug, Clone)]
pub struct SurfaceView {
    pub title: &'static str,
    pub layout: Layout,
    pub directory: DirectoryStatus,
    pub summaries: Vec<ConversationSummary>,
    pub partner_id: Option<String>,
    pub messages: Vec<Message>,
    pub partner_typing: bool,
    pub can_send: bool,
    pub live: bool,
}

type SendFuture = BoxFuture<'static, (PendingSend, Result<Message, ApiError>)>;

/// Directory pane plus thread pane for one signed-in identity.
pub struct MessagingSurface {
    config: SurfaceConfig,
    api: Arc<dyn MessagingApi>,
    channel: ChannelHandle,
    directory: ConversationDirectory,
    thread: ConversationThread,
    presence: PresenceSignaler,
    draft: String,
    sending: bool,
    viewport_width: u32,
    /// Bumped whenever the open thread gains messages.
    scroll_generation: u64,
    events: mpsc::UnboundedReceiver<PushEvent>,
    _bindings: Vec<Binding>,
}

impl MessagingSurface {
    /// Build a surface and bind its channel events.
    ///
    /// Events are queued from the moment the channel goes live; they are
    /// applied by [`MessagingSurface::handle_event`] or the run loop.
    pub fn new(config: SurfaceConfig, api: Arc<dyn MessagingApi>, channel: ChannelHandle) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let forward = handler(move |event: &ChannelEvent| {
            if let Some(event) = PushEvent::decode(event) {
                let _ = tx.send(event);
            }
        });
        let bindings = [NEW_MESSAGE, TYPING, STOP_TYPING]
            .into_iter()
            .map(|name| channel.bind(name, forward.clone()))
            .collect();

        Self {
            config,
            directory: ConversationDirectory::new(api.clone()),
            thread: ConversationThread::new(api.clone()),
            presence: PresenceSignaler::new(api.clone(), channel.clone()),
            api,
            channel,
            draft: String::new(),
            sending: false,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            scroll_generation: 0,
            events,
            _bindings: bindings,
        }
    }

    /// Load the directory and apply the bootstrap policy.
    pub async fn start(&mut self) -> Result<(), MessagingError> {
        let count = self.directory.list().await?.len();
        info!("{}: {} conversations", self.config.chrome.title, count);

        if let BootstrapPolicy::OpenAssigned(counterpart) = &self.config.bootstrap {
            let placeholder = self
                .directory
                .bootstrap_from_assignment(Some(counterpart))
                .map(|s| s.partner_id.clone());
            if let Some(partner_id) = placeholder {
                self.open_conversation(&partner_id).await?;
            }
        }
        Ok(())
    }

    /// Put the assigned counterpart back after a refetch returned no rows.
    fn restore_assignment(&mut self) {
        if let BootstrapPolicy::OpenAssigned(counterpart) = &self.config.bootstrap {
            self.directory.bootstrap_from_assignment(Some(counterpart));
        }
    }

    /// Open the thread with `partner_id`, replacing the current one.
    pub async fn open_conversation(&mut self, partner_id: &str) -> Result<(), MessagingError> {
        if self.thread.partner_id().is_some_and(|p| p != partner_id) {
            self.discard_draft().await;
        }
        self.presence.set_active_partner(Some(partner_id));
        self.directory.mark_opened_locally(partner_id);

        let result = self.thread.open(partner_id).await;
        self.scroll_generation += 1;
        result.map(|_| ())
    }

    /// Leave the thread and return to the directory.
    pub async fn back(&mut self) {
        self.discard_draft().await;
        self.presence.set_active_partner(None);
        self.thread.close();
    }

    async fn discard_draft(&mut self) {
        if !self.draft.trim().is_empty() {
            self.presence.stop_typing().await;
        }
        self.draft.clear();
    }

    /// Replace the composer contents and signal typing accordingly.
    pub async fn set_draft(&mut self, text: impl Into<String>) {
        let had_content = !self.draft.trim().is_empty();
        self.draft = text.into();
        if !self.draft.trim().is_empty() {
            self.presence.start_typing().await;
        } else if had_content {
            self.presence.stop_typing().await;
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        !self.sending && self.thread.is_open() && !self.draft.trim().is_empty()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Validate the draft and mark a send as in flight.
    fn begin_send(&mut self) -> Result<PendingSend, MessagingError> {
        if self.sending {
            return Err(MessagingError::SendInProgress);
        }
        let pending = self.thread.prepare_send(&self.draft)?;
        self.sending = true;
        Ok(pending)
    }

    async fn complete_send(
        &mut self,
        pending: &PendingSend,
        result: Result<Message, ApiError>,
    ) -> Result<Message, MessagingError> {
        self.sending = false;
        let message = self.thread.finish_send(pending, result)?;

        self.directory.record_outbound(&message);
        if self.thread.partner_id() == Some(pending.partner_id.as_str()) {
            // Text typed while the send was in flight stays in the composer.
            if self.draft.trim() == pending.content {
                self.draft.clear();
                self.presence.stop_typing().await;
            }
            self.scroll_generation += 1;
        }
        Ok(message)
    }

    /// Send the draft to the open partner.
    ///
    /// On failure the draft is kept so the user can retry.
    pub async fn send_draft(&mut self) -> Result<Message, MessagingError> {
        let pending = self.begin_send()?;
        let (pending, result) = pending.dispatch(self.api.clone()).await;
        self.complete_send(&pending, result).await
    }

    /// Apply one push event.
    pub async fn handle_event(&mut self, event: PushEvent) {
        match event {
            PushEvent::NewMessage(message) => {
                if self.thread.receive(&message) {
                    self.scroll_generation += 1;
                }
                let refreshed = self
                    .directory
                    .refresh_on_new_message(&message, self.thread.partner_id())
                    .await;
                if refreshed {
                    self.restore_assignment();
                }
            }
            PushEvent::Typing { sender_id } => {
                self.presence.handle_typing(&sender_id);
            }
            PushEvent::StopTyping { sender_id } => {
                self.presence.handle_stop_typing(&sender_id);
            }
        }
    }

    /// Wait for the next push event bound by this surface.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.viewport_width = width;
    }

    pub fn layout(&self) -> Layout {
        if self.viewport_width >= NARROW_VIEWPORT_WIDTH {
            Layout::Split
        } else if self.thread.is_open() {
            Layout::Single(Pane::Thread)
        } else {
            Layout::Single(Pane::Directory)
        }
    }

    /// Changes whenever the thread pane should scroll to its newest message.
    pub fn scroll_generation(&self) -> u64 {
        self.scroll_generation
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn thread(&self) -> &ConversationThread {
        &self.thread
    }

    pub fn presence(&self) -> &PresenceSignaler {
        &self.presence
    }

    pub fn view(&self) -> SurfaceView {
        SurfaceView {
            title: self.config.chrome.title,
            layout: self.layout(),
            directory: self.directory.status(),
            summaries: self.directory.summaries().to_vec(),
            partner_id: self.thread.partner_id().map(str::to_string),
            messages: self.thread.messages().to_vec(),
            partner_typing: self.presence.is_partner_typing(),
            can_send: self.can_send(),
            live: self.channel.is_connected(),
        }
    }

    async fn apply(&mut self, command: SurfaceCommand, in_flight: &mut Option<SendFuture>) {
        let result = match command {
            SurfaceCommand::Open(partner_id) => self.open_conversation(&partner_id).await,
            SurfaceCommand::Back => {
                self.back().await;
                Ok(())
            }
            SurfaceCommand::Draft(text) => {
                self.set_draft(text).await;
                Ok(())
            }
            SurfaceCommand::Send => match self.begin_send() {
                Ok(pending) => {
                    *in_flight = Some(Box::pin(pending.dispatch(self.api.clone())));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            SurfaceCommand::Refresh => match self.directory.list().await {
                Ok(_) => {
                    self.restore_assignment();
                    Ok(())
                }
                Err(e) => Err(e),
            },
            SurfaceCommand::Resize(width) => {
                self.set_viewport_width(width);
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_validation() => debug!("Command rejected: {}", e),
            Err(e) => warn!("Command failed: {}", e),
        }
    }

    /// Drive the surface until `shutdown` resolves or `commands` closes.
    ///
    /// Push events keep being applied while a send is in flight. A send
    /// still pending on exit is abandoned and the composer re-enabled.
    pub async fn run_with_shutdown<S>(
        &mut self,
        commands: mpsc::Receiver<SurfaceCommand>,
        shutdown: S,
    ) -> Result<(), MessagingError>
    where
        S: std::future::Future<Output = ()> + Send,
    {
        let result = self.run_loop(commands, shutdown).await;
        if self.sending {
            warn!("Abandoning in-flight send");
            self.sending = false;
        }
        result
    }

    async fn run_loop<S>(
        &mut self,
        mut commands: mpsc::Receiver<SurfaceCommand>,
        shutdown: S,
    ) -> Result<(), MessagingError>
    where
        S: std::future::Future<Output = ()> + Send,
    {
        info!("Starting {} surface", self.config.chrome.title);
        let mut state = self.channel.watch_state();
        let mut in_flight: Option<SendFuture> = None;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received, closing {}", self.config.chrome.title);
                    self.discard_draft().await;
                    return Ok(());
                }

                Some((pending, result)) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    match self.complete_send(&pending, result).await {
                        Ok(message) => info!("Sent {} to {}", message.id, message.receiver_id),
                        Err(e) => warn!("Send to {} failed, draft kept: {}", pending.partner_id, e),
                    }
                }

                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }

                Ok(()) = state.changed() => {
                    let current = state.borrow_and_update().clone();
                    match (&current.last_error, current.is_connected()) {
                        (Some(reason), false) => warn!("Channel not live: {}", reason),
                        _ => debug!("Channel {}", current.phase),
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(command) => self.apply(command, &mut in_flight).await,
                        None => {
                            info!("Command stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
