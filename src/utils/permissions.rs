use serenity::all::{Context, GuildId, Permissions, UserId};

use crate::bot::data::Context as CommandContext;
use crate::bot::error::Error;

/// Check if a member has a specific permission (administrators have all of them)
#[allow(deprecated)]
pub async fn has_permission(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    permission: Permissions,
) -> bool {
    if let Ok(member) = guild_id.member(ctx, user_id).await {
        return member
            .permissions(ctx)
            .map(|p| p.administrator() || p.contains(permission))
            .unwrap_or(false);
    }
    false
}

/// Command check: only sudo and support users may run gmute commands
pub async fn operator_check(ctx: CommandContext<'_>) -> Result<bool, Error> {
    let user_id = ctx.author().id.get();
    if ctx.data().settings.operators.is_operator(user_id) {
        return Ok(true);
    }

    tracing::debug!(
        "User {} tried to run /{} without operator rights",
        user_id,
        ctx.command().name
    );
    Ok(false)
}
