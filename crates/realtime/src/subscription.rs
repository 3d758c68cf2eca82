//! Explicit event-name subscription table kept on the channel handle.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::event::ChannelEvent;

/// Callback invoked for every delivered event. Panics are not caught.
pub type Handler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&ChannelEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration {
    id: u64,
    event: String,
    handler: Handler,
    /// Number of live `Binding`s sharing this slot.
    refs: usize,
    /// Channel this registration is currently bound to.
    bound_to: Option<String>,
}

/// Registered handlers, bound to the live channel whenever one exists.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    next_id: u64,
    entries: Vec<Registration>,
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl SubscriptionTable {
    /// Register `handler` for `event`, returning the slot id.
    ///
    /// Registering the same `(event, handler)` pair again reuses its slot.
    pub(crate) fn register(&mut self, event: &str, handler: Handler, live: Option<&str>) -> u64 {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.event == event && same_handler(&e.handler, &handler))
        {
            entry.refs += 1;
            return entry.id;
        }

        self.next_id += 1;
        let id = self.next_id;
        if let Some(channel) = live {
            debug!("Binding {} on {}", event, channel);
        }
        self.entries.push(Registration {
            id,
            event: event.to_string(),
            handler,
            refs: 1,
            bound_to: live.map(str::to_string),
        });
        id
    }

    /// Drop one reference to a slot; the slot is removed with its last one.
    pub(crate) fn release(&mut self, id: u64) {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            let entry = &mut self.entries[pos];
            entry.refs -= 1;
            if entry.refs == 0 {
                let entry = self.entries.remove(pos);
                debug!("Unbinding {}", entry.event);
            }
        }
    }

    /// Re-evaluate every binding against the current live channel.
    pub(crate) fn rebind(&mut self, live: Option<&str>) {
        for entry in &mut self.entries {
            if entry.bound_to.as_deref() == live {
                continue;
            }
            match live {
                Some(channel) => debug!("Binding {} on {}", entry.event, channel),
                None => debug!("Unbinding {}", entry.event),
            }
            entry.bound_to = live.map(str::to_string);
        }
    }

    /// Handlers bound on `channel` for `event`.
    pub(crate) fn handlers_for(&self, channel: &str, event: &str) -> Vec<Handler> {
        self.entries
            .iter()
            .filter(|e| e.event == event && e.bound_to.as_deref() == Some(channel))
            .map(|e| e.handler.clone())
            .collect()
    }

    pub(crate) fn is_bound(&self, id: u64) -> bool {
        self.entries
            .iter()
            .any(|e| e.id == id && e.bound_to.is_some())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Owner side of the table, implemented by the channel handle.
pub(crate) trait BindingOwner: Send + Sync {
    fn release(&self, id: u64);
    fn is_bound(&self, id: u64) -> bool;
}

/// A registered handler. Dropping it unbinds the handler.
#[must_use = "dropping a Binding unbinds its handler"]
pub struct Binding {
    id: u64,
    owner: Weak<dyn BindingOwner>,
}

impl Binding {
    pub(crate) fn new(id: u64, owner: Weak<dyn BindingOwner>) -> Self {
        Self { id, owner }
    }

    /// Whether the handler is currently bound to a live channel.
    pub fn is_active(&self) -> bool {
        self.owner
            .upgrade()
            .map(|owner| owner.is_bound(self.id))
            .unwrap_or(false)
    }

    /// Release the binding explicitly.
    pub fn unbind(self) {}
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.release(self.id);
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
