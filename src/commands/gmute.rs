use poise::serenity_prelude::{CreateAttachment, CreateEmbed, User};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::defaults::GMUTE_LIST_FILENAME;
use crate::constants::embeds;
use crate::constants::messages;
use crate::services::gmute::discord::DiscordGateway;
use crate::services::gmute::{FanOutReport, GmuteOutcome, Target, UngmuteOutcome};
use crate::utils::formatting::{display_name, mention_user};
use crate::utils::permissions::operator_check;

/// The explicit user argument, or else the author of the replied-to message
fn resolve_target(ctx: Context<'_>, user: Option<User>) -> Option<Target> {
    let replied = match ctx {
        poise::Context::Prefix(prefix) => prefix
            .msg
            .referenced_message
            .as_ref()
            .map(|m| m.author.clone()),
        _ => None,
    };

    user.or(replied)
        .map(|u| Target::new(u.id.get(), display_name(&u)))
}

fn author_target(ctx: Context<'_>) -> Target {
    let author = ctx.author();
    Target::new(author.id.get(), display_name(author))
}

fn report_lines(report: &FanOutReport) -> String {
    [
        embeds::field_line("Servers updated", &report.applied.to_string()),
        embeds::field_line("Servers skipped", &report.skipped.to_string()),
        embeds::field_line("Servers opted out", &report.opted_out.to_string()),
    ]
    .join("\n")
}

fn gmute_embed(outcome: &GmuteOutcome) -> CreateEmbed {
    match outcome {
        GmuteOutcome::Rejected(rejection) => embeds::error_embed().description(rejection.message()),
        GmuteOutcome::AlreadyMuted => {
            embeds::warning_embed().description(messages::ALREADY_MUTED_NO_REASON)
        }
        GmuteOutcome::ReasonUpdated { previous: Some(old) } => embeds::info_embed()
            .title("Reason Updated")
            .description(messages::reason_replaced(old)),
        GmuteOutcome::ReasonUpdated { previous: None } => embeds::info_embed()
            .title("Reason Updated")
            .description(messages::ALREADY_MUTED_REASON_ADDED),
        GmuteOutcome::Muted(report) => embeds::success_embed()
            .title("User Gmuted")
            .description(format!("{}\n\n{}", messages::GMUTE_DONE, report_lines(report))),
        GmuteOutcome::Aborted { error, report } => embeds::error_embed()
            .title("Gmute Failed")
            .description(format!(
                "{}\n\n{}",
                messages::gmute_failed(&error.message),
                report_lines(report)
            )),
    }
}

fn ungmute_embed(outcome: &UngmuteOutcome) -> CreateEmbed {
    match outcome {
        UngmuteOutcome::Rejected(rejection) => {
            embeds::error_embed().description(rejection.message())
        }
        UngmuteOutcome::Unmuted(report) => embeds::success_embed()
            .title("User Un-gmuted")
            .description(format!("{}\n\n{}", messages::UNGMUTE_DONE, report_lines(report))),
        UngmuteOutcome::Aborted { error, report } => embeds::error_embed()
            .title("Un-gmute Failed")
            .description(format!(
                "{}\n\n{}",
                messages::ungmute_failed(&error.message),
                report_lines(report)
            )),
    }
}

/// Mute a user in every server the bot moderates
#[poise::command(slash_command, prefix_command, check = "operator_check")]
pub async fn gmute(
    ctx: Context<'_>,
    #[description = "User to gmute (or reply to one of their messages)"] user: Option<User>,
    #[description = "Why they are being gmuted"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let target = resolve_target(ctx, user);
    let muter = author_target(ctx);

    // The fan-out touches every guild, so this can take a while
    ctx.defer().await?;

    let gateway = DiscordGateway::new(ctx.serenity_context().clone());
    let outcome = ctx
        .data()
        .gmute(&gateway)
        .gmute(&muter, target.as_ref(), reason.as_deref())
        .await?;

    ctx.send(poise::CreateReply::default().embed(gmute_embed(&outcome)))
        .await?;

    Ok(())
}

/// Lift a global mute
#[poise::command(slash_command, prefix_command, check = "operator_check")]
pub async fn ungmute(
    ctx: Context<'_>,
    #[description = "User to un-gmute (or reply to one of their messages)"] user: Option<User>,
) -> Result<(), Error> {
    let target = resolve_target(ctx, user);
    let muter = author_target(ctx);

    ctx.defer().await?;

    let gateway = DiscordGateway::new(ctx.serenity_context().clone());
    let outcome = ctx
        .data()
        .gmute(&gateway)
        .ungmute(&muter, target.as_ref())
        .await?;

    ctx.send(poise::CreateReply::default().embed(ungmute_embed(&outcome)))
        .await?;

    Ok(())
}

/// Download the list of globally muted users
#[poise::command(slash_command, prefix_command, check = "operator_check")]
pub async fn gmutelist(ctx: Context<'_>) -> Result<(), Error> {
    let gateway = DiscordGateway::new(ctx.serenity_context().clone());
    let gmute = ctx.data().gmute(&gateway);

    let Some(document) = gmute.export_list().await? else {
        let embed = embeds::info_embed().description(messages::EMPTY_GMUTE_LIST);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        return Ok(());
    };

    let caption = format!("{} {}", messages::GMUTE_LIST_CAPTION, gmute.stats().await?);
    let reply = poise::CreateReply::default()
        .content(caption)
        .attachment(CreateAttachment::bytes(document.into_bytes(), GMUTE_LIST_FILENAME));
    ctx.send(reply).await?;

    Ok(())
}

/// Show whether a user is globally muted
#[poise::command(slash_command, prefix_command, check = "operator_check")]
pub async fn gmuteinfo(
    ctx: Context<'_>,
    #[description = "User to look up"] user: User,
) -> Result<(), Error> {
    let gateway = DiscordGateway::new(ctx.serenity_context().clone());
    let info = ctx.data().gmute(&gateway).user_info(user.id.get()).await?;

    let embed = embeds::standard_embed()
        .title(format!("Gmute status for {}", display_name(&user)))
        .description(format!("{}\n{}", mention_user(user.id.get()), info));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
