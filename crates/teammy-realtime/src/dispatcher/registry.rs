//! Listener registry with isolated, snapshot-based dispatch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;
use tracing::{error, trace};

use crate::events::EventName;

/// Application callback for one event.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    id: u64,
    listener: Listener,
}

/// Listeners grouped by event, each set ordered by registration.
///
/// Dispatch runs on a snapshot taken under the lock, so listeners may
/// subscribe or unsubscribe from inside a callback. A panicking listener is
/// logged and does not prevent later listeners from running.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<EventName, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `listener` for `event`.
    ///
    /// Registering the same `Arc` twice for one event keeps a single entry;
    /// the returned handle then refers to the existing registration.
    pub fn subscribe(self: &Arc<Self>, event: EventName, listener: Listener) -> Unsubscribe {
        let mut listeners = self.lock();
        let entries = listeners.entry(event).or_default();

        let id = match entries
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.listener, &listener))
        {
            Some(existing) => existing.id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                entries.push(Entry { id, listener });
                id
            }
        };

        Unsubscribe {
            target: Some((Arc::downgrade(self), event, id)),
        }
    }

    /// Deliver `payload` to every listener of `event`. Returns how many
    /// listeners were called.
    pub fn dispatch(&self, event: EventName, payload: &Value) -> usize {
        let snapshot: Vec<Listener> = match self.lock().get(&event) {
            Some(entries) => entries.iter().map(|e| Arc::clone(&e.listener)).collect(),
            None => return 0,
        };

        trace!(event = %event, listeners = snapshot.len(), "Dispatching event");
        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                error!(event = %event, "Listener panicked");
            }
        }
        snapshot.len()
    }

    pub fn listener_count(&self, event: EventName) -> usize {
        self.lock().get(&event).map_or(0, Vec::len)
    }

    fn remove(&self, event: EventName, id: u64) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(&event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&event);
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventName, Vec<Entry>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Unsubscribe
// ---------------------------------------------------------------------------

/// Handle that removes one listener registration.
///
/// Dropping the handle leaves the listener registered.
#[must_use = "dropping the handle keeps the listener registered"]
pub struct Unsubscribe {
    target: Option<(Weak<ListenerRegistry>, EventName, u64)>,
}

impl Unsubscribe {
    /// A handle that does nothing, returned for unknown event names.
    pub fn noop() -> Self {
        Self { target: None }
    }

    /// Remove the registration. Calling it after the listener is already
    /// gone, or on a no-op handle, does nothing.
    pub fn unsubscribe(self) {
        if let Some((registry, event, id)) = self.target {
            if let Some(registry) = registry.upgrade() {
                registry.remove(event, id);
            }
        }
    }

    /// Whether this handle still refers to a live registration.
    pub fn is_active(&self) -> bool {
        match &self.target {
            Some((registry, event, id)) => registry.upgrade().is_some_and(|registry| {
                registry
                    .lock()
                    .get(event)
                    .is_some_and(|entries| entries.iter().any(|entry| entry.id == *id))
            }),
            None => false,
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some((_, event, id)) => write!(f, "Unsubscribe({event}#{id})"),
            None => f.write_str("Unsubscribe(noop)"),
        }
    }
}
