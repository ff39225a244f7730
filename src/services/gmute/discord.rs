use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{Context, CreateMessage, EditMember, GuildId, Permissions, Timestamp, UserId};
use tracing::{debug, warn};

use crate::bot::error::Error;
use crate::constants::defaults::{format_duration, restriction_length};
use crate::services::gmute::api::{
    codes, Broadcaster, ChatDirectory, MemberStatus, ModerationApi, RemoteError,
};
use crate::utils::permissions;

/// Collaborators backed by the live Discord connection.
///
/// A restriction is a member timeout of the longest length Discord allows.
/// The enforcement hook reapplies it when an expired one is seen again.
#[derive(Clone)]
pub struct DiscordGateway {
    ctx: Context,
}

impl DiscordGateway {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn bot_id(&self) -> u64 {
        self.ctx.cache.current_user().id.get()
    }

    async fn edit_member(
        &self,
        chat_id: u64,
        user_id: u64,
        edit: EditMember<'_>,
    ) -> Result<(), RemoteError> {
        GuildId::new(chat_id)
            .edit_member(&self.ctx, UserId::new(user_id), edit)
            .await
            .map(|_| ())
            .map_err(RemoteError::from)
    }
}

fn restriction_deadline() -> Result<Timestamp, RemoteError> {
    let until = Utc::now().timestamp() + restriction_length().as_secs() as i64;
    Timestamp::from_unix_timestamp(until).map_err(|e| RemoteError::transport(e.to_string()))
}

#[async_trait]
impl ChatDirectory for DiscordGateway {
    async fn list_all_known_chats(&self) -> Result<Vec<u64>, Error> {
        let mut chats: Vec<u64> = self.ctx.cache.guilds().into_iter().map(|g| g.get()).collect();
        chats.sort_unstable();
        Ok(chats)
    }
}

#[async_trait]
impl ModerationApi for DiscordGateway {
    async fn restrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError> {
        let edit = EditMember::new().disable_communication_until_datetime(restriction_deadline()?);
        self.edit_member(chat_id, user_id, edit).await?;
        debug!(
            "Restricted user {} in guild {} for {}",
            user_id,
            chat_id,
            format_duration(restriction_length())
        );
        Ok(())
    }

    async fn unrestrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError> {
        let edit = EditMember::new().enable_communication();
        self.edit_member(chat_id, user_id, edit).await?;
        debug!("Unrestricted user {} in guild {}", user_id, chat_id);
        Ok(())
    }

    async fn get_member_status(
        &self,
        chat_id: u64,
        user_id: u64,
    ) -> Result<MemberStatus, RemoteError> {
        let guild_id = GuildId::new(chat_id);
        let member = match guild_id.member(&self.ctx, UserId::new(user_id)).await {
            Ok(member) => member,
            Err(e) => {
                let e = RemoteError::from(e);
                if e.code == Some(codes::UNKNOWN_MEMBER) {
                    return Ok(MemberStatus::Left);
                }
                return Err(e);
            }
        };

        let is_owner = self
            .ctx
            .cache
            .guild(guild_id)
            .map(|g| g.owner_id == member.user.id)
            .unwrap_or(false);
        if is_owner {
            return Ok(MemberStatus::Creator);
        }

        #[allow(deprecated)]
        let is_admin = member
            .permissions(&self.ctx)
            .map(|p| p.administrator())
            .unwrap_or(false);
        if is_admin {
            return Ok(MemberStatus::Administrator);
        }

        let restricted = member
            .communication_disabled_until
            .map(|until| until.unix_timestamp() > Utc::now().timestamp())
            .unwrap_or(false);

        Ok(if restricted {
            MemberStatus::Restricted
        } else {
            MemberStatus::Member
        })
    }

    async fn can_restrict(&self, chat_id: u64) -> bool {
        let bot_id = self.ctx.cache.current_user().id;
        permissions::has_permission(
            &self.ctx,
            GuildId::new(chat_id),
            bot_id,
            Permissions::MODERATE_MEMBERS,
        )
        .await
    }
}

#[async_trait]
impl Broadcaster for DiscordGateway {
    async fn notify(&self, user_ids: &[u64], text: &str) {
        for &user_id in user_ids {
            let message = CreateMessage::new().content(text);
            if let Err(e) = UserId::new(user_id).direct_message(&self.ctx, message).await {
                warn!("Failed to notify operator {}: {:?}", user_id, e);
            }
        }
    }
}
