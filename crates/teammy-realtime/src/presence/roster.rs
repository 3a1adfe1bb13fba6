//! Presence map fed by a session client's presence events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use super::members::{group_members, MemberGroups};
use super::types::{PresenceMap, PresencePayload};
use crate::client::RealtimeSessionClient;
use crate::dispatcher::{Listener, Unsubscribe};
use crate::events::EventName;

/// Presence state owned by the UI layer, kept current by listening to
/// `PresenceChanged` and `SessionPresenceChanged`.
#[derive(Default)]
pub struct PresenceRoster {
    presence: Arc<Mutex<PresenceMap>>,
    subscriptions: Vec<Unsubscribe>,
}

impl PresenceRoster {
    /// A detached roster, updated only through [`apply`](Self::apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new roster to `client`'s presence events.
    pub fn attach(client: &RealtimeSessionClient) -> Self {
        let presence: Arc<Mutex<PresenceMap>> = Arc::default();
        let listener: Listener = {
            let presence = Arc::clone(&presence);
            Arc::new(move |payload: &Value| {
                apply_payload(&presence, payload);
            })
        };
        let subscriptions = [EventName::PresenceChanged, EventName::SessionPresenceChanged]
            .into_iter()
            .map(|event| client.subscribe(event, Arc::clone(&listener)))
            .collect();
        Self {
            presence,
            subscriptions,
        }
    }

    /// Apply one presence payload. Returns `false` if it could not be decoded.
    pub fn apply(&self, payload: &Value) -> bool {
        apply_payload(&self.presence, payload)
    }

    pub fn snapshot(&self) -> PresenceMap {
        lock(&self.presence).clone()
    }

    pub fn groups(&self, current_user_id: Option<&str>) -> MemberGroups {
        group_members(&lock(&self.presence), current_user_id)
    }

    /// Stop listening. The roster's state is dropped with it.
    pub fn detach(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn apply_payload(presence: &Mutex<PresenceMap>, payload: &Value) -> bool {
    match PresencePayload::from_value(payload) {
        Ok(decoded) => {
            let mut map = lock(presence);
            decoded.apply_to(&mut map);
            debug!(users = map.len(), "Presence updated");
            true
        }
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable presence payload");
            false
        }
    }
}

fn lock(presence: &Mutex<PresenceMap>) -> MutexGuard<'_, PresenceMap> {
    presence.lock().unwrap_or_else(PoisonError::into_inner)
}
