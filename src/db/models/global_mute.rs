use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GlobalMute {
    pub user_id: i64,
    /// Display name captured when the mute was issued
    pub name: String,
    pub reason: Option<String>,
    pub muted: bool,
    /// Number of times this user has been gmuted
    pub mute_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl GlobalMute {
    /// Reason with blank strings treated as absent
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|r| !r.trim().is_empty())
    }
}
