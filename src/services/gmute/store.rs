use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::debug;

use crate::bot::error::Error;
use crate::db::models::GlobalMute;
use crate::db::queries::{global_mute, gmute_setting};

/// Persistence for the mute registry and the per-chat enforcement flag
#[async_trait]
pub trait GmuteStore: Send + Sync {
    /// The user's record, muted or not
    async fn get_record(&self, user_id: u64) -> Result<Option<GlobalMute>, Error>;

    async fn is_user_gmuted(&self, user_id: u64) -> Result<bool, Error>;

    async fn gmute_user(
        &self,
        user_id: u64,
        name: &str,
        reason: Option<&str>,
    ) -> Result<GlobalMute, Error>;

    /// Returns the reason that was replaced
    async fn update_gmute_reason(
        &self,
        user_id: u64,
        name: &str,
        reason: &str,
    ) -> Result<Option<String>, Error>;

    async fn ungmute_user(&self, user_id: u64) -> Result<bool, Error>;

    /// Put the registry back to `previous`, deleting the row if there was none
    async fn restore(&self, user_id: u64, previous: Option<&GlobalMute>) -> Result<(), Error>;

    async fn get_gmute_list(&self) -> Result<Vec<GlobalMute>, Error>;

    async fn num_gmuted_users(&self) -> Result<i64, Error>;

    async fn does_chat_gmute(&self, chat_id: u64) -> Result<bool, Error>;

    async fn set_chat_gmute(&self, chat_id: u64, enforce: bool) -> Result<(), Error>;

    async fn migrate_chat(&self, old_chat_id: u64, new_chat_id: u64) -> Result<bool, Error>;
}

/// Postgres-backed store with an in-memory cache of chat preferences
pub struct PgGmuteStore {
    pool: PgPool,
    /// chat_id -> enforce
    enforce_cache: DashMap<u64, bool>,
}

impl PgGmuteStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            enforce_cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl GmuteStore for PgGmuteStore {
    async fn get_record(&self, user_id: u64) -> Result<Option<GlobalMute>, Error> {
        Ok(global_mute::get(&self.pool, user_id as i64).await?)
    }

    async fn is_user_gmuted(&self, user_id: u64) -> Result<bool, Error> {
        Ok(global_mute::is_user_gmuted(&self.pool, user_id as i64).await?)
    }

    async fn gmute_user(
        &self,
        user_id: u64,
        name: &str,
        reason: Option<&str>,
    ) -> Result<GlobalMute, Error> {
        Ok(global_mute::gmute_user(&self.pool, user_id as i64, name, reason).await?)
    }

    async fn update_gmute_reason(
        &self,
        user_id: u64,
        name: &str,
        reason: &str,
    ) -> Result<Option<String>, Error> {
        Ok(global_mute::update_gmute_reason(&self.pool, user_id as i64, name, reason).await?)
    }

    async fn ungmute_user(&self, user_id: u64) -> Result<bool, Error> {
        Ok(global_mute::ungmute_user(&self.pool, user_id as i64).await?)
    }

    async fn restore(&self, user_id: u64, previous: Option<&GlobalMute>) -> Result<(), Error> {
        match previous {
            Some(record) => global_mute::restore(&self.pool, record).await?,
            None => {
                global_mute::delete(&self.pool, user_id as i64).await?;
            }
        }
        Ok(())
    }

    async fn get_gmute_list(&self) -> Result<Vec<GlobalMute>, Error> {
        Ok(global_mute::get_gmute_list(&self.pool).await?)
    }

    async fn num_gmuted_users(&self) -> Result<i64, Error> {
        Ok(global_mute::num_gmuted_users(&self.pool).await?)
    }

    async fn does_chat_gmute(&self, chat_id: u64) -> Result<bool, Error> {
        if let Some(enforce) = self.enforce_cache.get(&chat_id) {
            return Ok(*enforce);
        }

        let enforce = gmute_setting::does_chat_gmute(&self.pool, chat_id as i64).await?;
        self.enforce_cache.insert(chat_id, enforce);
        Ok(enforce)
    }

    async fn set_chat_gmute(&self, chat_id: u64, enforce: bool) -> Result<(), Error> {
        gmute_setting::set_enforce(&self.pool, chat_id as i64, enforce).await?;
        self.enforce_cache.insert(chat_id, enforce);
        debug!("Chat {} gmute enforcement set to {}", chat_id, enforce);
        Ok(())
    }

    async fn migrate_chat(&self, old_chat_id: u64, new_chat_id: u64) -> Result<bool, Error> {
        let moved =
            gmute_setting::migrate_chat(&self.pool, old_chat_id as i64, new_chat_id as i64).await?;
        self.enforce_cache.remove(&old_chat_id);
        self.enforce_cache.remove(&new_chat_id);
        Ok(moved)
    }
}
