//! Push transport driven by the test.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use realtime::{ChannelError, ChannelEvent, ChannelTransport, EventStream, TransportEvent};
use serde_json::Value;

/// One call to [`ChannelTransport::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAttempt {
    pub channel: String,
    pub credential: String,
}

struct Script {
    attempts: Vec<SubscribeAttempt>,
    reject: Option<String>,
    fail: Option<String>,
    auto_open: bool,
    sender: Option<UnboundedSender<TransportEvent>>,
}

/// A transport whose streams carry whatever the test emits.
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Transport that opens every stream immediately.
    pub fn new() -> Self {
        Self::with_auto_open(true)
    }

    /// Transport that waits for [`ScriptedTransport::open`].
    pub fn manual_open() -> Self {
        Self::with_auto_open(false)
    }

    fn with_auto_open(auto_open: bool) -> Self {
        Self {
            script: Mutex::new(Script {
                attempts: Vec::new(),
                reject: None,
                fail: None,
                auto_open,
                sender: None,
            }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Refuse channel authorization on the next subscribes.
    pub fn reject_with(&self, reason: &str) {
        self.script().reject = Some(reason.to_string());
    }

    /// Fail to open the transport on the next subscribes.
    pub fn fail_with(&self, reason: &str) {
        self.script().fail = Some(reason.to_string());
    }

    /// Accept subscribes again.
    pub fn accept(&self) {
        let mut script = self.script();
        script.reject = None;
        script.fail = None;
    }

    /// Every subscribe attempt so far.
    pub fn attempts(&self) -> Vec<SubscribeAttempt> {
        self.script().attempts.clone()
    }

    /// Send an event on the most recent stream.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match &self.script().sender {
            Some(sender) => sender.unbounded_send(event).is_ok(),
            None => false,
        }
    }

    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    pub fn push(&self, name: &str, data: Value) -> bool {
        self.emit(TransportEvent::Event(ChannelEvent::new(name, data)))
    }

    pub fn drop_connection(&self) -> bool {
        self.emit(TransportEvent::Dropped)
    }

    /// End the most recent stream.
    pub fn close(&self) {
        self.script().sender = None;
    }
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn subscribe(
        &self,
        channel: &str,
        credential: &str,
    ) -> Result<EventStream, ChannelError> {
        let mut script = self.script();
        script.attempts.push(SubscribeAttempt {
            channel: channel.to_string(),
            credential: credential.to_string(),
        });

        if let Some(reason) = &script.reject {
            return Err(ChannelError::Unauthorized(reason.clone()));
        }
        if let Some(reason) = &script.fail {
            return Err(ChannelError::Transport(reason.clone()));
        }

        let (sender, receiver) = unbounded();
        if script.auto_open {
            let _ = sender.unbounded_send(TransportEvent::Open);
        }
        script.sender = Some(sender);
        Ok(Box::pin(receiver))
    }
}
