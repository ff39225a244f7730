use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::messages;
use crate::services::gmute::discord::DiscordGateway;

/// Interpret an on/off argument
pub fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.trim().to_lowercase().as_str() {
        "on" | "yes" => Some(true),
        "off" | "no" => Some(false),
        _ => None,
    }
}

/// Turn global mute enforcement on or off for this server
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn gmutestat(
    ctx: Context<'_>,
    #[description = "on/off or yes/no; leave empty to see the current setting"]
    setting: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;
    let chat_id = guild_id.get();

    let gateway = DiscordGateway::new(ctx.serenity_context().clone());
    let gmute = ctx.data().gmute(&gateway);

    let embed = match setting.as_deref().map(parse_toggle) {
        Some(Some(true)) => {
            gmute.set_chat_gmute(chat_id, true).await?;
            embeds::success_embed()
                .title("Gmutes Enabled")
                .description(messages::GMUTESTAT_ENABLED)
        }
        Some(Some(false)) => {
            gmute.set_chat_gmute(chat_id, false).await?;
            embeds::warning_embed()
                .title("Gmutes Disabled")
                .description(messages::GMUTESTAT_DISABLED)
        }
        Some(None) | None => {
            let current = gmute.does_chat_gmute(chat_id).await?;
            embeds::info_embed().description(messages::gmutestat_usage(current))
        }
    };

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}
