//! Online/offline member grouping for member-list displays.

use std::cmp::Ordering;

use super::types::{PresenceMap, PresenceStatus};

/// One row of a member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    /// Falls back to the user id when no name is known.
    pub display_name: String,
    pub status: PresenceStatus,
    pub is_current_user: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberGroups {
    pub online: Vec<Member>,
    pub offline: Vec<Member>,
}

impl MemberGroups {
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    pub fn total(&self) -> usize {
        self.online.len() + self.offline.len()
    }
}

/// Split `presence` into online and offline members.
///
/// Within each group the current user comes first, then members by display
/// name (case-insensitive), then by user id.
pub fn group_members(presence: &PresenceMap, current_user_id: Option<&str>) -> MemberGroups {
    let mut groups = MemberGroups::default();

    for (user_id, entry) in presence {
        let display_name = if entry.display_name.trim().is_empty() {
            user_id.clone()
        } else {
            entry.display_name.clone()
        };
        let member = Member {
            user_id: user_id.clone(),
            display_name,
            status: entry.status,
            is_current_user: current_user_id == Some(user_id.as_str()),
        };
        if entry.status.is_online() {
            groups.online.push(member);
        } else {
            groups.offline.push(member);
        }
    }

    groups.online.sort_by(compare_members);
    groups.offline.sort_by(compare_members);
    groups
}

fn compare_members(a: &Member, b: &Member) -> Ordering {
    b.is_current_user
        .cmp(&a.is_current_user)
        .then_with(|| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        })
        .then_with(|| a.user_id.cmp(&b.user_id))
}
