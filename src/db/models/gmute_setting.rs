use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct GmuteSetting {
    pub chat_id: i64,
    pub enforce: bool,
}
