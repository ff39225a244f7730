use std::sync::Arc;

use serenity::all::{Context, Member, Message};
use tracing::{debug, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::constants::messages::ENFORCED_ON_SIGHT;
use crate::services::gmute::discord::DiscordGateway;
use crate::services::gmute::Sighting;

/// What a guild message exposes to the enforcement hook
pub fn sighting_from_message(msg: &Message) -> Sighting {
    Sighting {
        author: Some(msg.author.id.get()),
        new_members: Vec::new(),
        replied_author: msg.referenced_message.as_ref().map(|m| m.author.id.get()),
    }
}

/// Mute on sight the author or the replied-to user of a guild message
pub async fn handle_message(ctx: &Context, data: &Arc<Data>, msg: &Message) -> Result<(), Error> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let gateway = DiscordGateway::new(ctx.clone());
    if msg.author.id.get() == gateway.bot_id() {
        return Ok(());
    }

    let sighting = sighting_from_message(msg);
    let enforced = data
        .gmute(&gateway)
        .enforce(guild_id.get(), &sighting)
        .await?;

    if enforced.iter().any(|e| e.announce) {
        msg.reply(&ctx.http, ENFORCED_ON_SIGHT).await?;
    }

    Ok(())
}

/// Mute a globally muted user as soon as they join
pub async fn handle_member_join(
    ctx: &Context,
    data: &Arc<Data>,
    member: &Member,
) -> Result<(), Error> {
    let sighting = Sighting {
        new_members: vec![member.user.id.get()],
        ..Default::default()
    };

    let gateway = DiscordGateway::new(ctx.clone());
    let enforced = data
        .gmute(&gateway)
        .enforce(member.guild_id.get(), &sighting)
        .await?;

    if enforced.is_empty() {
        debug!("No gmute to enforce for {} joining {}", member.user.id, member.guild_id);
    } else {
        info!(
            "Muted gmuted user {} on joining guild {}",
            member.user.id, member.guild_id
        );
    }

    Ok(())
}
