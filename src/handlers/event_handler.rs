use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, FullEvent};
use tracing::{debug, error, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::handlers::enforcement;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Bot ready as {} in {} guilds",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }

        FullEvent::Message { new_message } => {
            if !data.settings.strict_gmute {
                return Ok(());
            }
            if let Err(e) = enforcement::handle_message(ctx, data, new_message).await {
                error!("Gmute enforcement error on message: {:?}", e);
            }
        }

        FullEvent::GuildMemberAddition { new_member } => {
            if !data.settings.strict_gmute {
                return Ok(());
            }
            if let Err(e) = enforcement::handle_member_join(ctx, data, new_member).await {
                error!("Gmute enforcement error on join: {:?}", e);
            }
        }

        FullEvent::GuildDelete { incomplete, .. } => {
            debug!("Guild {} removed", incomplete.id);
        }

        _ => {}
    }

    Ok(())
}
