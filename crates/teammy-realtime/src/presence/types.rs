//! Presence payloads and the per-user presence map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[serde(alias = "Online", alias = "ONLINE")]
    Online,
    #[default]
    #[serde(alias = "Offline", alias = "OFFLINE")]
    Offline,
}

impl PresenceStatus {
    pub fn is_online(self) -> bool {
        self == PresenceStatus::Online
    }
}

/// Presence of one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub display_name: String,
}

/// `userId` → presence.
pub type PresenceMap = HashMap<String, PresenceEntry>;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One user's presence change as pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub status: PresenceStatus,
    #[serde(default, alias = "display_name")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub status: PresenceStatus,
    #[serde(default, alias = "display_name")]
    pub display_name: Option<String>,
}

/// Shapes a presence event payload may take.
///
/// Tried in order: a single update, an array of updates, then a snapshot
/// object keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PresencePayload {
    Update(PresenceUpdate),
    Batch(Vec<PresenceUpdate>),
    /// Full state; replaces everything previously known.
    Snapshot(HashMap<String, SnapshotEntry>),
}

impl PresencePayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Apply to `map`. A missing display name keeps the one already known.
    pub fn apply_to(self, map: &mut PresenceMap) {
        match self {
            PresencePayload::Update(update) => {
                upsert(map, update.user_id, update.status, update.display_name)
            }
            PresencePayload::Batch(updates) => {
                for update in updates {
                    upsert(map, update.user_id, update.status, update.display_name);
                }
            }
            PresencePayload::Snapshot(entries) => {
                let previous = std::mem::take(map);
                for (user_id, entry) in entries {
                    let display_name = entry
                        .display_name
                        .or_else(|| previous.get(&user_id).map(|p| p.display_name.clone()))
                        .unwrap_or_default();
                    map.insert(
                        user_id,
                        PresenceEntry {
                            status: entry.status,
                            display_name,
                        },
                    );
                }
            }
        }
    }
}

fn upsert(
    map: &mut PresenceMap,
    user_id: String,
    status: PresenceStatus,
    display_name: Option<String>,
) {
    let entry = map.entry(user_id).or_default();
    entry.status = status;
    if let Some(name) = display_name {
        entry.display_name = name;
    }
}
