use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serenity::http::HttpError;
use thiserror::Error;

use crate::bot::error::Error;

/// Discord JSON error codes returned by moderation endpoints
pub mod codes {
    pub const UNKNOWN_GUILD: isize = 10004;
    pub const UNKNOWN_MEMBER: isize = 10007;
    pub const UNKNOWN_USER: isize = 10013;
    pub const MISSING_ACCESS: isize = 50001;
    /// Also returned when the target is an administrator or the guild owner
    pub const MISSING_PERMISSIONS: isize = 50013;
}

/// Per-guild failures a gmute fan-out steps over
static GMUTE_ERRORS: Lazy<HashSet<isize>> = Lazy::new(|| {
    [
        codes::UNKNOWN_GUILD,
        codes::UNKNOWN_MEMBER,
        codes::UNKNOWN_USER,
        codes::MISSING_ACCESS,
        codes::MISSING_PERMISSIONS,
    ]
    .into_iter()
    .collect()
});

/// Per-guild failures an un-gmute fan-out steps over
static UNGMUTE_ERRORS: Lazy<HashSet<isize>> = Lazy::new(|| {
    [
        codes::UNKNOWN_GUILD,
        codes::UNKNOWN_MEMBER,
        codes::MISSING_ACCESS,
        codes::MISSING_PERMISSIONS,
    ]
    .into_iter()
    .collect()
});

/// A failed call to the remote moderation API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Discord JSON error code, absent for transport failures
    pub code: Option<isize>,
    pub message: String,
}

impl RemoteError {
    pub fn api(code: isize, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl From<serenity::Error> for RemoteError {
    fn from(err: serenity::Error) -> Self {
        match &err {
            serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
                RemoteError::api(response.error.code, response.error.message.clone())
            }
            _ => RemoteError::transport(err.to_string()),
        }
    }
}

/// Which fan-out a remote error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    Mute,
    Unmute,
}

impl FanOut {
    /// Expected errors are skipped; anything else aborts the fan-out
    pub fn is_expected(&self, error: &RemoteError) -> bool {
        let Some(code) = error.code else {
            return false;
        };
        match self {
            FanOut::Mute => GMUTE_ERRORS.contains(&code),
            FanOut::Unmute => UNGMUTE_ERRORS.contains(&code),
        }
    }
}

/// A user's standing in one chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
}

impl MemberStatus {
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

/// Every chat the bot knows about
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn list_all_known_chats(&self) -> Result<Vec<u64>, Error>;
}

/// Remote member moderation
#[async_trait]
pub trait ModerationApi: Send + Sync {
    async fn restrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError>;

    async fn unrestrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError>;

    async fn get_member_status(
        &self,
        chat_id: u64,
        user_id: u64,
    ) -> Result<MemberStatus, RemoteError>;

    /// Whether the bot itself may restrict members in this chat
    async fn can_restrict(&self, chat_id: u64) -> bool;
}

/// Notices to operators. Delivery failures are logged, never returned.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn notify(&self, user_ids: &[u64], text: &str);
}
