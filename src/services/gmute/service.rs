use tracing::{debug, error, info, warn};

use crate::bot::error::Error;
use crate::config::Operators;
use crate::constants::messages;
use crate::db::models::GlobalMute;
use crate::services::gmute::api::{
    Broadcaster, ChatDirectory, FanOut, MemberStatus, ModerationApi, RemoteError,
};
use crate::services::gmute::export;
use crate::services::gmute::store::GmuteStore;
use crate::utils::formatting::mention_user;

/// A user as named in a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user_id: u64,
    pub name: String,
}

impl Target {
    pub fn new(user_id: u64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }
}

/// Why a command was refused without touching any state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoTarget,
    SudoUser,
    SupportUser,
    OwnAccount,
    NotMuted,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NoTarget => messages::NO_TARGET,
            Rejection::SudoUser => messages::TARGET_IS_SUDO,
            Rejection::SupportUser => messages::TARGET_IS_SUPPORT,
            Rejection::OwnAccount => messages::TARGET_IS_SELF,
            Rejection::NotMuted => messages::TARGET_NOT_MUTED,
        }
    }
}

/// Per-chat tally of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Chats where the remote call went through
    pub applied: usize,
    /// Chats that failed with an expected error, or needed no call
    pub skipped: usize,
    /// Chats that have gmute enforcement turned off
    pub opted_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GmuteOutcome {
    Rejected(Rejection),
    /// Already muted and no new reason supplied
    AlreadyMuted,
    ReasonUpdated { previous: Option<String> },
    Muted(FanOutReport),
    /// An unexpected remote error stopped the fan-out and the registry was restored
    Aborted { error: RemoteError, report: FanOutReport },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UngmuteOutcome {
    Rejected(Rejection),
    Unmuted(FanOutReport),
    /// An unexpected remote error stopped the fan-out; the user stays gmuted
    Aborted { error: RemoteError, report: FanOutReport },
}

/// What the enforcement hook saw in a chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sighting {
    pub author: Option<u64>,
    pub new_members: Vec<u64>,
    pub replied_author: Option<u64>,
}

/// A restriction applied by the enforcement hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enforcement {
    pub user_id: u64,
    /// Whether the chat should be told about it
    pub announce: bool,
}

/// Global mute operations over the injected collaborators
pub struct Gmute<'a> {
    store: &'a dyn GmuteStore,
    directory: &'a dyn ChatDirectory,
    api: &'a dyn ModerationApi,
    broadcaster: &'a dyn Broadcaster,
    operators: &'a Operators,
    bot_id: u64,
}

impl<'a> Gmute<'a> {
    pub fn new(
        store: &'a dyn GmuteStore,
        directory: &'a dyn ChatDirectory,
        api: &'a dyn ModerationApi,
        broadcaster: &'a dyn Broadcaster,
        operators: &'a Operators,
        bot_id: u64,
    ) -> Self {
        Self {
            store,
            directory,
            api,
            broadcaster,
            operators,
            bot_id,
        }
    }

    fn validate_gmute_target(&self, target: &Target) -> Result<(), Rejection> {
        if self.operators.is_sudo(target.user_id) {
            return Err(Rejection::SudoUser);
        }
        if self.operators.is_support(target.user_id) {
            return Err(Rejection::SupportUser);
        }
        if target.user_id == self.bot_id {
            return Err(Rejection::OwnAccount);
        }
        Ok(())
    }

    /// Globally mute `target` in every enforcing chat
    pub async fn gmute(
        &self,
        muter: &Target,
        target: Option<&Target>,
        reason: Option<&str>,
    ) -> Result<GmuteOutcome, Error> {
        let Some(target) = target else {
            return Ok(GmuteOutcome::Rejected(Rejection::NoTarget));
        };
        if let Err(rejection) = self.validate_gmute_target(target) {
            return Ok(GmuteOutcome::Rejected(rejection));
        }
        let user_id = target.user_id;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        if self.store.is_user_gmuted(user_id).await? {
            let Some(reason) = reason else {
                return Ok(GmuteOutcome::AlreadyMuted);
            };
            let previous = self
                .store
                .update_gmute_reason(user_id, &target.name, reason)
                .await?;
            info!("Updated gmute reason for user {}", user_id);
            return Ok(GmuteOutcome::ReasonUpdated { previous });
        }

        let broadcast = self.operators.broadcast_list();
        self.broadcaster
            .notify(
                &broadcast,
                &format!(
                    "{} is gmuting user {} because:\n{}",
                    mention_user(muter.user_id),
                    mention_user(user_id),
                    reason.unwrap_or(messages::NO_REASON_GIVEN)
                ),
            )
            .await;

        let previous = self.store.get_record(user_id).await?;
        self.store.gmute_user(user_id, &target.name, reason).await?;

        let mut report = FanOutReport::default();
        match self.restrict_everywhere(user_id, &mut report).await {
            Ok(None) => {}
            Ok(Some(e)) => {
                self.abort_gmute(user_id, previous.as_ref(), &broadcast, &e.message)
                    .await?;
                return Ok(GmuteOutcome::Aborted { error: e, report });
            }
            Err(e) => {
                // Local failures mid fan-out roll back the same way remote ones do
                if let Err(restore_err) = self
                    .abort_gmute(user_id, previous.as_ref(), &broadcast, &e.to_string())
                    .await
                {
                    error!("Failed to restore gmute record of {}: {}", user_id, restore_err);
                }
                return Err(e);
            }
        }

        self.broadcaster
            .notify(&broadcast, messages::GMUTE_BROADCAST_DONE)
            .await;
        info!(
            "User {} gmuted by {} ({} chats applied, {} skipped, {} opted out)",
            user_id, muter.user_id, report.applied, report.skipped, report.opted_out
        );

        Ok(GmuteOutcome::Muted(report))
    }

    /// Restrict `user_id` in every enforcing chat. Returns the unexpected
    /// remote error that stopped the loop, if any.
    async fn restrict_everywhere(
        &self,
        user_id: u64,
        report: &mut FanOutReport,
    ) -> Result<Option<RemoteError>, Error> {
        for chat_id in self.directory.list_all_known_chats().await? {
            if !self.store.does_chat_gmute(chat_id).await? {
                report.opted_out += 1;
                continue;
            }

            match self.api.restrict_member(chat_id, user_id).await {
                Ok(()) => report.applied += 1,
                Err(e) if FanOut::Mute.is_expected(&e) => {
                    debug!("Skipping chat {} for gmute of {}: {}", chat_id, user_id, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Gmute of user {} aborted in chat {}: {}", user_id, chat_id, e);
                    return Ok(Some(e));
                }
            }
        }
        Ok(None)
    }

    async fn abort_gmute(
        &self,
        user_id: u64,
        previous: Option<&GlobalMute>,
        broadcast: &[u64],
        cause: &str,
    ) -> Result<(), Error> {
        self.broadcaster
            .notify(broadcast, &messages::gmute_failed(cause))
            .await;
        self.store.restore(user_id, previous).await
    }

    /// Lift a global mute in every enforcing chat
    pub async fn ungmute(
        &self,
        muter: &Target,
        target: Option<&Target>,
    ) -> Result<UngmuteOutcome, Error> {
        let Some(target) = target else {
            return Ok(UngmuteOutcome::Rejected(Rejection::NoTarget));
        };
        let user_id = target.user_id;

        if !self.store.is_user_gmuted(user_id).await? {
            return Ok(UngmuteOutcome::Rejected(Rejection::NotMuted));
        }

        let broadcast = self.operators.broadcast_list();
        self.broadcaster
            .notify(
                &broadcast,
                &format!(
                    "{} has ungmuted user {}",
                    mention_user(muter.user_id),
                    mention_user(user_id)
                ),
            )
            .await;

        let mut report = FanOutReport::default();
        for chat_id in self.directory.list_all_known_chats().await? {
            if !self.store.does_chat_gmute(chat_id).await? {
                report.opted_out += 1;
                continue;
            }

            match self.lift_restriction(chat_id, user_id).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(e) if FanOut::Unmute.is_expected(&e) => {
                    debug!("Skipping chat {} for un-gmute of {}: {}", chat_id, user_id, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Un-gmute of user {} aborted in chat {}: {}", user_id, chat_id, e);
                    self.broadcaster
                        .notify(&broadcast, &messages::ungmute_failed(&e.message))
                        .await;
                    return Ok(UngmuteOutcome::Aborted { error: e, report });
                }
            }
        }

        self.store.ungmute_user(user_id).await?;
        self.broadcaster
            .notify(&broadcast, messages::UNGMUTE_BROADCAST_DONE)
            .await;
        info!(
            "User {} un-gmuted by {} ({} chats applied, {} skipped, {} opted out)",
            user_id, muter.user_id, report.applied, report.skipped, report.opted_out
        );

        Ok(UngmuteOutcome::Unmuted(report))
    }

    /// Unrestrict only members that are currently restricted
    async fn lift_restriction(&self, chat_id: u64, user_id: u64) -> Result<bool, RemoteError> {
        let status = self.api.get_member_status(chat_id, user_id).await?;
        if status != MemberStatus::Restricted {
            return Ok(false);
        }
        self.api.unrestrict_member(chat_id, user_id).await?;
        Ok(true)
    }

    /// The /gmutelist document, or None when nobody is muted
    pub async fn export_list(&self) -> Result<Option<String>, Error> {
        let users = self.store.get_gmute_list().await?;
        if users.is_empty() {
            return Ok(None);
        }
        Ok(Some(export::render_gmute_list(&users)))
    }

    pub async fn stats(&self) -> Result<String, Error> {
        Ok(export::stats_line(self.store.num_gmuted_users().await?))
    }

    pub async fn user_info(&self, user_id: u64) -> Result<String, Error> {
        let record = self.store.get_record(user_id).await?;
        Ok(export::user_info(record.as_ref()))
    }

    pub async fn does_chat_gmute(&self, chat_id: u64) -> Result<bool, Error> {
        self.store.does_chat_gmute(chat_id).await
    }

    pub async fn set_chat_gmute(&self, chat_id: u64, enforce: bool) -> Result<(), Error> {
        self.store.set_chat_gmute(chat_id, enforce).await
    }

    pub async fn migrate_chat(&self, old_chat_id: u64, new_chat_id: u64) -> Result<bool, Error> {
        if old_chat_id == new_chat_id {
            return Ok(false);
        }
        let moved = self.store.migrate_chat(old_chat_id, new_chat_id).await?;
        if moved {
            info!("Migrated gmute setting from chat {} to {}", old_chat_id, new_chat_id);
        }
        Ok(moved)
    }

    /// Mute on sight any globally muted user in `sighting`
    pub async fn enforce(
        &self,
        chat_id: u64,
        sighting: &Sighting,
    ) -> Result<Vec<Enforcement>, Error> {
        // No remote call unless someone in the sighting is gmuted
        let author = self.gmuted(sighting.author).await?;
        let replied = self.gmuted(sighting.replied_author).await?;
        let mut new_members = Vec::new();
        for &member in &sighting.new_members {
            if self.store.is_user_gmuted(member).await? {
                new_members.push(member);
            }
        }

        if author.is_none() && replied.is_none() && new_members.is_empty() {
            return Ok(Vec::new());
        }
        if !self.store.does_chat_gmute(chat_id).await? || !self.api.can_restrict(chat_id).await {
            return Ok(Vec::new());
        }

        let mut enforced = Vec::new();

        if let Some(author) = author {
            if !self.is_chat_admin(chat_id, author).await
                && self.restrict_on_sight(chat_id, author).await?
            {
                enforced.push(Enforcement {
                    user_id: author,
                    announce: true,
                });
            }
        }

        for member in new_members {
            if self.restrict_on_sight(chat_id, member).await? {
                enforced.push(Enforcement {
                    user_id: member,
                    announce: true,
                });
            }
        }

        if let Some(replied) = replied {
            if !self.is_chat_admin(chat_id, replied).await
                && self.restrict_on_sight(chat_id, replied).await?
            {
                enforced.push(Enforcement {
                    user_id: replied,
                    announce: false,
                });
            }
        }

        Ok(enforced)
    }

    async fn gmuted(&self, user_id: Option<u64>) -> Result<Option<u64>, Error> {
        match user_id {
            Some(id) if self.store.is_user_gmuted(id).await? => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    async fn is_chat_admin(&self, chat_id: u64, user_id: u64) -> bool {
        matches!(
            self.api.get_member_status(chat_id, user_id).await,
            Ok(status) if status.is_admin()
        )
    }

    async fn restrict_on_sight(&self, chat_id: u64, user_id: u64) -> Result<bool, Error> {
        match self.api.restrict_member(chat_id, user_id).await {
            Ok(()) => {
                info!("Enforced gmute on user {} in chat {}", user_id, chat_id);
                Ok(true)
            }
            Err(e) if FanOut::Mute.is_expected(&e) => {
                debug!("Could not enforce gmute on {} in {}: {}", user_id, chat_id, e);
                Ok(false)
            }
            Err(e) => Err(Error::Remote(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::services::gmute::api::codes;

    const BOT: u64 = 1;
    const OWNER: u64 = 10;
    const SUDO: u64 = 11;
    const SUPPORT: u64 = 12;
    const SPAMMER: u64 = 500;

    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<BTreeMap<u64, GlobalMute>>,
        chats: Mutex<HashMap<u64, bool>>,
    }

    impl MemoryStore {
        fn record(&self, user_id: u64) -> Option<GlobalMute> {
            self.users.lock().unwrap().get(&user_id).cloned()
        }

        fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GmuteStore for MemoryStore {
        async fn get_record(&self, user_id: u64) -> Result<Option<GlobalMute>, Error> {
            Ok(self.record(user_id))
        }

        async fn is_user_gmuted(&self, user_id: u64) -> Result<bool, Error> {
            Ok(self.record(user_id).map(|u| u.muted).unwrap_or(false))
        }

        async fn gmute_user(
            &self,
            user_id: u64,
            name: &str,
            reason: Option<&str>,
        ) -> Result<GlobalMute, Error> {
            let mut users = self.users.lock().unwrap();
            let count = users.get(&user_id).map(|u| u.mute_count).unwrap_or(0);
            let record = GlobalMute {
                user_id: user_id as i64,
                name: name.to_string(),
                reason: reason.map(str::to_string),
                muted: true,
                mute_count: count + 1,
                updated_at: Utc::now(),
            };
            users.insert(user_id, record.clone());
            Ok(record)
        }

        async fn update_gmute_reason(
            &self,
            user_id: u64,
            name: &str,
            reason: &str,
        ) -> Result<Option<String>, Error> {
            let mut users = self.users.lock().unwrap();
            let Some(user) = users.get_mut(&user_id).filter(|u| u.muted) else {
                return Ok(None);
            };
            user.name = name.to_string();
            Ok(user.reason.replace(reason.to_string()))
        }

        async fn ungmute_user(&self, user_id: u64) -> Result<bool, Error> {
            let mut users = self.users.lock().unwrap();
            match users.get_mut(&user_id) {
                Some(user) if user.muted => {
                    user.muted = false;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn restore(&self, user_id: u64, previous: Option<&GlobalMute>) -> Result<(), Error> {
            let mut users = self.users.lock().unwrap();
            match previous {
                Some(record) => users.insert(user_id, record.clone()),
                None => users.remove(&user_id),
            };
            Ok(())
        }

        async fn get_gmute_list(&self) -> Result<Vec<GlobalMute>, Error> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .filter(|u| u.muted)
                .cloned()
                .collect())
        }

        async fn num_gmuted_users(&self) -> Result<i64, Error> {
            Ok(self.get_gmute_list().await?.len() as i64)
        }

        async fn does_chat_gmute(&self, chat_id: u64) -> Result<bool, Error> {
            Ok(self
                .chats
                .lock()
                .unwrap()
                .get(&chat_id)
                .copied()
                .unwrap_or(true))
        }

        async fn set_chat_gmute(&self, chat_id: u64, enforce: bool) -> Result<(), Error> {
            self.chats.lock().unwrap().insert(chat_id, enforce);
            Ok(())
        }

        async fn migrate_chat(&self, old_chat_id: u64, new_chat_id: u64) -> Result<bool, Error> {
            if old_chat_id == new_chat_id {
                return Ok(false);
            }
            let mut chats = self.chats.lock().unwrap();
            match chats.remove(&old_chat_id) {
                Some(enforce) => {
                    chats.insert(new_chat_id, enforce);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    /// A store whose chat preference lookup fails for one chat
    struct FlakyStore {
        inner: MemoryStore,
        broken_chat: u64,
    }

    #[async_trait]
    impl GmuteStore for FlakyStore {
        async fn get_record(&self, user_id: u64) -> Result<Option<GlobalMute>, Error> {
            self.inner.get_record(user_id).await
        }

        async fn is_user_gmuted(&self, user_id: u64) -> Result<bool, Error> {
            self.inner.is_user_gmuted(user_id).await
        }

        async fn gmute_user(
            &self,
            user_id: u64,
            name: &str,
            reason: Option<&str>,
        ) -> Result<GlobalMute, Error> {
            self.inner.gmute_user(user_id, name, reason).await
        }

        async fn update_gmute_reason(
            &self,
            user_id: u64,
            name: &str,
            reason: &str,
        ) -> Result<Option<String>, Error> {
            self.inner.update_gmute_reason(user_id, name, reason).await
        }

        async fn ungmute_user(&self, user_id: u64) -> Result<bool, Error> {
            self.inner.ungmute_user(user_id).await
        }

        async fn restore(&self, user_id: u64, previous: Option<&GlobalMute>) -> Result<(), Error> {
            self.inner.restore(user_id, previous).await
        }

        async fn get_gmute_list(&self) -> Result<Vec<GlobalMute>, Error> {
            self.inner.get_gmute_list().await
        }

        async fn num_gmuted_users(&self) -> Result<i64, Error> {
            self.inner.num_gmuted_users().await
        }

        async fn does_chat_gmute(&self, chat_id: u64) -> Result<bool, Error> {
            if chat_id == self.broken_chat {
                return Err(Error::custom("connection reset"));
            }
            self.inner.does_chat_gmute(chat_id).await
        }

        async fn set_chat_gmute(&self, chat_id: u64, enforce: bool) -> Result<(), Error> {
            self.inner.set_chat_gmute(chat_id, enforce).await
        }

        async fn migrate_chat(&self, old_chat_id: u64, new_chat_id: u64) -> Result<bool, Error> {
            self.inner.migrate_chat(old_chat_id, new_chat_id).await
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Restrict(u64, u64),
        Unrestrict(u64, u64),
        Status(u64, u64),
        Rights(u64),
    }

    #[derive(Default)]
    struct FakeApi {
        chats: Vec<u64>,
        calls: Mutex<Vec<Call>>,
        /// chat_id -> error returned by restrict/unrestrict
        failures: HashMap<u64, RemoteError>,
        /// (chat_id, user_id) -> status, default Restricted
        statuses: HashMap<(u64, u64), MemberStatus>,
        no_rights: Vec<u64>,
    }

    impl FakeApi {
        fn with_chats(chats: &[u64]) -> Self {
            Self {
                chats: chats.to_vec(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn restricted_chats(&self) -> Vec<u64> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Restrict(chat, _) => Some(chat),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatDirectory for FakeApi {
        async fn list_all_known_chats(&self) -> Result<Vec<u64>, Error> {
            Ok(self.chats.clone())
        }
    }

    #[async_trait]
    impl ModerationApi for FakeApi {
        async fn restrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(Call::Restrict(chat_id, user_id));
            match self.failures.get(&chat_id) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn unrestrict_member(&self, chat_id: u64, user_id: u64) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(Call::Unrestrict(chat_id, user_id));
            match self.failures.get(&chat_id) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn get_member_status(
            &self,
            chat_id: u64,
            user_id: u64,
        ) -> Result<MemberStatus, RemoteError> {
            self.calls.lock().unwrap().push(Call::Status(chat_id, user_id));
            Ok(self
                .statuses
                .get(&(chat_id, user_id))
                .copied()
                .unwrap_or(MemberStatus::Restricted))
        }

        async fn can_restrict(&self, chat_id: u64) -> bool {
            self.calls.lock().unwrap().push(Call::Rights(chat_id));
            !self.no_rights.contains(&chat_id)
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(Vec<u64>, String)>>,
    }

    impl Outbox {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Broadcaster for Outbox {
        async fn notify(&self, user_ids: &[u64], text: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((user_ids.to_vec(), text.to_string()));
        }
    }

    fn operators() -> Operators {
        Operators::new(Some(OWNER), vec![SUDO], vec![SUPPORT])
    }

    fn muter() -> Target {
        Target::new(SUDO, "mod")
    }

    fn spammer() -> Target {
        Target::new(SPAMMER, "spammer")
    }

    fn unexpected() -> RemoteError {
        RemoteError::api(50035, "Invalid Form Body")
    }

    #[tokio::test]
    async fn test_gmute_creates_single_record() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100, 200]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute
            .gmute(&muter(), Some(&spammer()), Some("spam links"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GmuteOutcome::Muted(FanOutReport {
                applied: 2,
                skipped: 0,
                opted_out: 0
            })
        );
        assert_eq!(store.len(), 1);
        let record = store.record(SPAMMER).unwrap();
        assert!(record.muted);
        assert_eq!(record.reason.as_deref(), Some("spam links"));
        assert_eq!(api.restricted_chats(), vec![100, 200]);

        let texts = outbox.texts();
        assert!(texts[0].contains("is gmuting user <@500>"));
        assert_eq!(texts.last().unwrap(), messages::GMUTE_BROADCAST_DONE);
    }

    #[tokio::test]
    async fn test_gmute_already_muted_updates_reason() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert_ok!(gmute.gmute(&muter(), Some(&spammer()), Some("first")).await);
        let calls_before = api.calls().len();

        let outcome = gmute
            .gmute(&muter(), Some(&spammer()), Some("second"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GmuteOutcome::ReasonUpdated {
                previous: Some("first".to_string())
            }
        );
        assert_eq!(store.record(SPAMMER).unwrap().reason.as_deref(), Some("second"));
        assert_eq!(api.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_gmute_already_muted_without_reason_is_noop() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert_ok!(gmute.gmute(&muter(), Some(&spammer()), Some("first")).await);
        let before = store.record(SPAMMER);

        let outcome = gmute.gmute(&muter(), Some(&spammer()), Some("  ")).await.unwrap();

        assert_eq!(outcome, GmuteOutcome::AlreadyMuted);
        assert_eq!(store.record(SPAMMER), before);
    }

    #[tokio::test]
    async fn test_gmute_rejects_privileged_targets() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let cases = [
            (Target::new(OWNER, "owner"), Rejection::SudoUser),
            (Target::new(SUDO, "sudo"), Rejection::SudoUser),
            (Target::new(SUPPORT, "support"), Rejection::SupportUser),
            (Target::new(BOT, "bot"), Rejection::OwnAccount),
        ];
        for (target, rejection) in cases {
            let outcome = gmute.gmute(&muter(), Some(&target), Some("x")).await.unwrap();
            assert_eq!(outcome, GmuteOutcome::Rejected(rejection));
        }

        let outcome = gmute.gmute(&muter(), None, Some("x")).await.unwrap();
        assert_eq!(outcome, GmuteOutcome::Rejected(Rejection::NoTarget));

        assert_eq!(store.len(), 0);
        assert!(api.calls().is_empty());
        assert!(outbox.texts().is_empty());
    }

    #[tokio::test]
    async fn test_gmute_skips_opted_out_and_expected_errors() {
        let store = MemoryStore::default();
        assert_ok!(store.set_chat_gmute(200, false).await);
        let mut api = FakeApi::with_chats(&[100, 200, 300, 400]);
        api.failures.insert(
            300,
            RemoteError::api(codes::MISSING_PERMISSIONS, "Missing Permissions"),
        );
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute.gmute(&muter(), Some(&spammer()), None).await.unwrap();

        assert_eq!(
            outcome,
            GmuteOutcome::Muted(FanOutReport {
                applied: 2,
                skipped: 1,
                opted_out: 1
            })
        );
        assert_eq!(api.restricted_chats(), vec![100, 300, 400]);
        assert!(outbox.texts()[0].ends_with(messages::NO_REASON_GIVEN));
    }

    #[tokio::test]
    async fn test_gmute_unexpected_error_aborts_and_removes_record() {
        let store = MemoryStore::default();
        let mut api = FakeApi::with_chats(&[100, 200, 300, 400]);
        api.failures.insert(200, unexpected());
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute.gmute(&muter(), Some(&spammer()), Some("x")).await.unwrap();

        match outcome {
            GmuteOutcome::Aborted { error, report } => {
                assert_eq!(error, unexpected());
                assert_eq!(report.applied, 1);
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(api.restricted_chats(), vec![100, 200]);
        assert!(store.record(SPAMMER).is_none());
        assert_eq!(
            outbox.texts().last().unwrap(),
            &messages::gmute_failed("Invalid Form Body")
        );
    }

    #[tokio::test]
    async fn test_gmute_abort_restores_previous_record() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();

        {
            let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);
            assert_ok!(gmute.gmute(&muter(), Some(&spammer()), Some("old")).await);
            assert_ok!(gmute.ungmute(&muter(), Some(&spammer())).await);
        }
        let cleared = store.record(SPAMMER).unwrap();

        let mut failing = FakeApi::with_chats(&[100]);
        failing.failures.insert(100, RemoteError::transport("timed out"));
        let gmute = Gmute::new(&store, &failing, &failing, &outbox, &ops, BOT);
        let outcome = gmute.gmute(&muter(), Some(&spammer()), Some("new")).await.unwrap();

        assert!(matches!(outcome, GmuteOutcome::Aborted { .. }));
        assert_eq!(store.record(SPAMMER), Some(cleared));
    }

    #[tokio::test]
    async fn test_gmute_store_failure_mid_fan_out_rolls_back() {
        let store = FlakyStore {
            inner: MemoryStore::default(),
            broken_chat: 200,
        };
        let api = FakeApi::with_chats(&[100, 200, 300]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert_err!(gmute.gmute(&muter(), Some(&spammer()), Some("x")).await);

        assert!(store.inner.record(SPAMMER).is_none());
        assert_eq!(api.restricted_chats(), vec![100]);
        assert_eq!(
            outbox.texts().last().unwrap(),
            &messages::gmute_failed("connection reset")
        );
    }

    #[tokio::test]
    async fn test_ungmute_rejects_unmuted_user() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute.ungmute(&muter(), Some(&spammer())).await.unwrap();

        assert_eq!(outcome, UngmuteOutcome::Rejected(Rejection::NotMuted));
        assert!(api.calls().is_empty());
        assert_eq!(store.len(), 0);

        let outcome = gmute.ungmute(&muter(), None).await.unwrap();
        assert_eq!(outcome, UngmuteOutcome::Rejected(Rejection::NoTarget));
    }

    #[tokio::test]
    async fn test_ungmute_only_unrestricts_restricted_members() {
        let store = MemoryStore::default();
        assert_ok!(store.gmute_user(SPAMMER, "spammer", None).await);
        let mut api = FakeApi::with_chats(&[100, 200]);
        api.statuses.insert((200, SPAMMER), MemberStatus::Member);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute.ungmute(&muter(), Some(&spammer())).await.unwrap();

        assert_eq!(
            outcome,
            UngmuteOutcome::Unmuted(FanOutReport {
                applied: 1,
                skipped: 1,
                opted_out: 0
            })
        );
        assert_eq!(
            api.calls(),
            vec![
                Call::Status(100, SPAMMER),
                Call::Unrestrict(100, SPAMMER),
                Call::Status(200, SPAMMER),
            ]
        );
        let record = store.record(SPAMMER).unwrap();
        assert!(!record.muted);
        assert_eq!(outbox.texts().last().unwrap(), messages::UNGMUTE_BROADCAST_DONE);
    }

    #[tokio::test]
    async fn test_ungmute_unexpected_error_keeps_user_muted() {
        let store = MemoryStore::default();
        assert_ok!(store.gmute_user(SPAMMER, "spammer", Some("x")).await);
        let mut api = FakeApi::with_chats(&[100, 200, 300]);
        api.failures.insert(200, unexpected());
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let outcome = gmute.ungmute(&muter(), Some(&spammer())).await.unwrap();

        assert!(matches!(outcome, UngmuteOutcome::Aborted { .. }));
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Status(300, _))));
        assert!(store.record(SPAMMER).unwrap().muted);
        assert_eq!(
            outbox.texts().last().unwrap(),
            &messages::ungmute_failed("Invalid Form Body")
        );
    }

    #[tokio::test]
    async fn test_chat_preferences() {
        let store = MemoryStore::default();
        let api = FakeApi::default();
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert!(gmute.does_chat_gmute(42).await.unwrap());
        assert_ok!(gmute.set_chat_gmute(42, false).await);
        assert!(!gmute.does_chat_gmute(42).await.unwrap());

        assert!(gmute.migrate_chat(42, 43).await.unwrap());
        assert!(!gmute.does_chat_gmute(43).await.unwrap());
        assert!(gmute.does_chat_gmute(42).await.unwrap());
        assert!(!gmute.migrate_chat(7, 8).await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_chat_to_same_id_keeps_preference() {
        let store = MemoryStore::default();
        let api = FakeApi::default();
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert_ok!(gmute.set_chat_gmute(42, false).await);
        assert!(!gmute.migrate_chat(42, 42).await.unwrap());
        assert!(!gmute.does_chat_gmute(42).await.unwrap());
        assert!(!store.migrate_chat(42, 42).await.unwrap());
        assert_eq!(store.chats.lock().unwrap().get(&42), Some(&false));
    }

    #[tokio::test]
    async fn test_export_list_and_stats() {
        let store = MemoryStore::default();
        let api = FakeApi::default();
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        assert_eq!(gmute.export_list().await.unwrap(), None);

        assert_ok!(store.gmute_user(30, "carol", None).await);
        assert_ok!(store.gmute_user(20, "bob", Some("flood")).await);
        assert_ok!(store.gmute_user(40, "dave", None).await);
        assert_ok!(store.ungmute_user(40).await);

        let doc = gmute.export_list().await.unwrap().unwrap();
        assert_eq!(
            doc,
            "Globally muted users.\n[x] bob - 20\nReason: flood\n[x] carol - 30\n"
        );
        assert_eq!(gmute.stats().await.unwrap(), "2 gmuted users.");
        assert!(gmute.user_info(20).await.unwrap().contains("Reason: flood"));
    }

    #[tokio::test]
    async fn test_enforce_on_sight() {
        let store = MemoryStore::default();
        assert_ok!(store.gmute_user(SPAMMER, "spammer", None).await);
        assert_ok!(store.gmute_user(501, "joiner", None).await);
        assert_ok!(store.gmute_user(502, "replied", None).await);
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let sighting = Sighting {
            author: Some(SPAMMER),
            new_members: vec![501, 999],
            replied_author: Some(502),
        };
        let enforced = gmute.enforce(100, &sighting).await.unwrap();

        assert_eq!(
            enforced,
            vec![
                Enforcement {
                    user_id: SPAMMER,
                    announce: true
                },
                Enforcement {
                    user_id: 501,
                    announce: true
                },
                Enforcement {
                    user_id: 502,
                    announce: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_enforce_spares_admins_and_respects_chat_settings() {
        let store = MemoryStore::default();
        assert_ok!(store.gmute_user(SPAMMER, "spammer", None).await);
        assert_ok!(store.set_chat_gmute(200, false).await);
        let mut api = FakeApi::with_chats(&[100, 200, 300]);
        api.statuses.insert((100, SPAMMER), MemberStatus::Administrator);
        api.no_rights.push(300);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let sighting = Sighting {
            author: Some(SPAMMER),
            ..Default::default()
        };
        for chat in [100, 200, 300] {
            assert!(gmute.enforce(chat, &sighting).await.unwrap().is_empty());
        }
        assert!(api.restricted_chats().is_empty());
    }

    #[tokio::test]
    async fn test_enforce_skips_remote_calls_for_ordinary_users() {
        let store = MemoryStore::default();
        let api = FakeApi::with_chats(&[100]);
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let sighting = Sighting {
            author: Some(SPAMMER),
            new_members: vec![501],
            replied_author: Some(502),
        };
        assert!(gmute.enforce(100, &sighting).await.unwrap().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_enforce_propagates_unexpected_error() {
        let store = MemoryStore::default();
        assert_ok!(store.gmute_user(SPAMMER, "spammer", None).await);
        let mut api = FakeApi::with_chats(&[100]);
        api.failures.insert(100, unexpected());
        let outbox = Outbox::default();
        let ops = operators();
        let gmute = Gmute::new(&store, &api, &api, &outbox, &ops, BOT);

        let sighting = Sighting {
            new_members: vec![SPAMMER],
            ..Default::default()
        };
        assert_err!(gmute.enforce(100, &sighting).await);
    }
}
