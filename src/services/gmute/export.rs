use crate::constants::messages::GMUTE_LIST_HEADER;
use crate::db::models::GlobalMute;

/// Render the /gmutelist document. Users appear in the order given.
pub fn render_gmute_list(users: &[GlobalMute]) -> String {
    let mut out = format!("{}\n", GMUTE_LIST_HEADER);
    for user in users {
        out.push_str(&format!("[x] {} - {}\n", user.name, user.user_id));
        if let Some(reason) = user.reason() {
            out.push_str(&format!("Reason: {}\n", reason));
        }
    }
    out
}

pub fn stats_line(count: i64) -> String {
    format!("{} gmuted users.", count)
}

/// Summary shown by /gmuteinfo
pub fn user_info(record: Option<&GlobalMute>) -> String {
    match record {
        Some(user) if user.muted => {
            let mut text = "Globally muted: **Yes**".to_string();
            if let Some(reason) = user.reason() {
                text.push_str(&format!("\nReason: {}", reason));
            }
            text.push_str(&format!("\nTimes gmuted: {}", user.mute_count));
            text
        }
        Some(user) => format!("Globally muted: **No**\nTimes gmuted: {}", user.mute_count),
        None => "Globally muted: **No**".to_string(),
    }
}
