//! Terminal output for hub events and the member list.

use serde_json::Value;
use teammy_realtime::presence::Member;
use teammy_realtime::{EventName, MemberGroups, RealtimeSessionClient, Unsubscribe};

/// Print every hub event as `[EventName] payload`.
pub fn print_events(client: &RealtimeSessionClient) -> Vec<Unsubscribe> {
    EventName::ALL
        .into_iter()
        .map(|event| {
            client.on_event(event, move |payload: &Value| {
                println!("[{event}] {payload}");
            })
        })
        .collect()
}

pub fn print_members(groups: &MemberGroups) {
    print!("{}", render_members(groups));
}

fn render_members(groups: &MemberGroups) -> String {
    let mut out = format!("Online ({}/{})\n", groups.online_count(), groups.total());
    for member in &groups.online {
        out.push_str(&format!("  {}\n", member_label(member)));
    }
    out.push_str(&format!("Offline ({})\n", groups.offline.len()));
    for member in &groups.offline {
        out.push_str(&format!("  {}\n", member_label(member)));
    }
    out
}

fn member_label(member: &Member) -> String {
    if member.is_current_user {
        format!("{} (you)", member.display_name)
    } else {
        member.display_name.clone()
    }
}
