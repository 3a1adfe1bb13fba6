//! Presence state for member-list displays.
//!
//! The session client only forwards presence events; the roster here keeps
//! the per-user map and `group_members` derives the online/offline lists.

mod members;
mod roster;
mod types;

pub use members::{group_members, Member, MemberGroups};
pub use roster::PresenceRoster;
pub use types::{
    PresenceEntry, PresenceMap, PresencePayload, PresenceStatus, PresenceUpdate, SnapshotEntry,
};
