use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Settings;
use crate::services::gmute::discord::DiscordGateway;
use crate::services::gmute::{Gmute, PgGmuteStore};

/// Shared data available to all commands and handlers
pub struct Data {
    pub settings: Settings,
    /// Mute registry and per-guild enforcement flags
    pub store: PgGmuteStore,
}

impl Data {
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        Self {
            settings,
            store: PgGmuteStore::new(pool),
        }
    }

    /// Wire the gmute service to a Discord gateway
    pub fn gmute<'a>(&'a self, gateway: &'a DiscordGateway) -> Gmute<'a> {
        Gmute::new(
            &self.store,
            gateway,
            gateway,
            gateway,
            &self.settings.operators,
            gateway.bot_id(),
        )
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("strict_gmute", &self.settings.strict_gmute)
            .field("operators", &self.settings.operators.broadcast_list().len())
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;
