use serenity::all::User;

/// Longest name snapshot stored with a mute
pub const MAX_NAME_LEN: usize = 64;

/// Format a user mention
pub fn mention_user(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

/// Name recorded in the mute registry
pub fn display_name(user: &User) -> String {
    truncate(user.display_name(), MAX_NAME_LEN)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
