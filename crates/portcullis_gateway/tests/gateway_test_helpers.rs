//! Shared fixtures for gateway integration tests.
//!
//! `MockPlatform` models one guild in memory and records every mutation so
//! tests can assert on what the gateway did.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use portcullis_core::{
    BotMember, ChannelId, ChannelInfo, GateEmoji, GuildGatewayConfig, GuildId, GuildInfo,
    MemberInfo, MessageId, RoleId, RoleInfo, UserId,
};
use portcullis_database::MemoryGatewayStore;
use portcullis_error::{PlatformError, PlatformErrorKind, PortcullisResult};
use portcullis_gateway::{ActivationOutcome, GateEmojis, GatewayContext, activate};
use portcullis_interface::{ChatPlatform, GatewayStore, Notifier, PlatformResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

pub const GUILD: GuildId = GuildId(1);
pub const BOT: UserId = UserId(999);
pub const RULES: ChannelId = ChannelId(100);
pub const WELCOME: ChannelId = ChannelId(101);
pub const GOODBYE: ChannelId = ChannelId(102);
pub const BLOCKING: RoleId = RoleId(10);
pub const MEMBER_ROLE: RoleId = RoleId(11);
pub const EXCEPTION: RoleId = RoleId(12);

/// Seconds after a fixed epoch.
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn human(id: u64, joined: i64) -> MemberInfo {
    MemberInfo {
        user_id: UserId(id),
        name: format!("user{id}"),
        display_name: format!("User {id}"),
        bot: false,
        joined_at: Some(t(joined)),
        roles: Vec::new(),
    }
}

pub fn bot(id: u64, joined: i64) -> MemberInfo {
    MemberInfo {
        bot: true,
        ..human(id, joined)
    }
}

#[derive(Debug)]
pub struct MockGuild {
    pub bot: BotMember,
    pub name: String,
    pub roles: HashMap<RoleId, RoleInfo>,
    pub channels: HashMap<ChannelId, ChannelInfo>,
    pub members: BTreeMap<UserId, MemberInfo>,
    pub messages: HashSet<(ChannelId, MessageId)>,
    pub reactions: HashMap<(MessageId, GateEmoji), Vec<UserId>>,
    pub next_message: u64,
    pub sent: Vec<(ChannelId, String)>,
    pub grants: Vec<(UserId, Vec<RoleId>)>,
    pub revokes: Vec<(UserId, RoleId)>,
    pub kicked: Vec<UserId>,
    pub fail_kicks: bool,
    pub fail_role_edits: bool,
    /// Snapshots served by `member` instead of the live member, like a lagging cache.
    pub stale: HashMap<UserId, MemberInfo>,
}

impl Default for MockGuild {
    fn default() -> Self {
        let roles = [
            RoleInfo::new(BLOCKING, "Gated", 1),
            RoleInfo::new(MEMBER_ROLE, "Member", 2),
            RoleInfo::new(EXCEPTION, "Verified", 3),
        ]
        .into_iter()
        .map(|r| (*r.id(), r))
        .collect();
        let channels = [
            ChannelInfo {
                id: RULES,
                can_send: true,
                can_manage_messages: true,
            },
            ChannelInfo {
                id: WELCOME,
                can_send: true,
                can_manage_messages: false,
            },
            ChannelInfo {
                id: GOODBYE,
                can_send: true,
                can_manage_messages: false,
            },
        ]
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

        Self {
            bot: BotMember {
                user_id: BOT,
                top_role_position: 10,
                manage_roles: true,
                kick_members: true,
            },
            name: "Test Guild".into(),
            roles,
            channels,
            members: BTreeMap::new(),
            messages: HashSet::new(),
            reactions: HashMap::new(),
            next_message: 500,
            sent: Vec::new(),
            grants: Vec::new(),
            revokes: Vec::new(),
            kicked: Vec::new(),
            fail_kicks: false,
            fail_role_edits: false,
            stale: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockGuild>,
    stalled: Mutex<HashSet<UserId>>,
    released: tokio::sync::Notify,
}

fn not_found(what: impl Into<String>) -> PlatformError {
    PlatformError::new(PlatformErrorKind::NotFound(what.into()))
}

fn forbidden(what: impl Into<String>) -> PlatformError {
    PlatformError::new(PlatformErrorKind::Forbidden(what.into()))
}

impl MockPlatform {
    pub fn state(&self) -> MutexGuard<'_, MockGuild> {
        self.state.lock().unwrap()
    }

    pub fn add_member(&self, member: MemberInfo) {
        self.state().members.insert(member.user_id, member);
    }

    pub fn member_snapshot(&self, user: UserId) -> Option<MemberInfo> {
        self.state().members.get(&user).cloned()
    }

    pub fn holds(&self, user: UserId, role: RoleId) -> bool {
        self.member_snapshot(user).is_some_and(|m| m.has_role(role))
    }

    pub fn give_role(&self, user: UserId, role: RoleId) {
        if let Some(m) = self.state().members.get_mut(&user) {
            if !m.roles.contains(&role) {
                m.roles.push(role);
            }
        }
    }

    pub fn react(&self, message: MessageId, user: UserId, emoji: GateEmoji) {
        self.state()
            .reactions
            .entry((message, emoji))
            .or_default()
            .push(user);
    }

    pub fn reactors(&self, message: MessageId, emoji: GateEmoji) -> Vec<UserId> {
        self.state()
            .reactions
            .get(&(message, emoji))
            .cloned()
            .unwrap_or_default()
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.state()
            .sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Park role grants for `user` until [`MockPlatform::release`].
    pub fn stall_grants_for(&self, user: UserId) {
        self.stalled.lock().unwrap().insert(user);
    }

    pub fn release(&self) {
        self.stalled.lock().unwrap().clear();
        self.released.notify_waiters();
    }

    pub fn grants_of(&self, user: UserId, role: RoleId) -> usize {
        self.state()
            .grants
            .iter()
            .filter(|(u, roles)| *u == user && roles.contains(&role))
            .count()
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn guild_ids(&self) -> PlatformResult<Vec<GuildId>> {
        Ok(vec![GUILD])
    }

    async fn guild_info(&self, guild: GuildId) -> PlatformResult<GuildInfo> {
        let state = self.state();
        Ok(GuildInfo {
            id: guild,
            name: state.name.clone(),
            member_count: state.members.len() as u64,
            bot_count: state.members.values().filter(|m| m.bot).count() as u64,
        })
    }

    async fn bot_member(&self, _guild: GuildId) -> PlatformResult<BotMember> {
        Ok(self.state().bot)
    }

    async fn role(&self, _guild: GuildId, role: RoleId) -> PlatformResult<Option<RoleInfo>> {
        Ok(self.state().roles.get(&role).cloned())
    }

    async fn channel(
        &self,
        _guild: GuildId,
        channel: ChannelId,
    ) -> PlatformResult<Option<ChannelInfo>> {
        Ok(self.state().channels.get(&channel).copied())
    }

    async fn member(&self, _guild: GuildId, user: UserId) -> PlatformResult<Option<MemberInfo>> {
        if let Some(stale) = self.state().stale.get(&user) {
            return Ok(Some(stale.clone()));
        }
        Ok(self.member_snapshot(user))
    }

    async fn members(&self, _guild: GuildId) -> PlatformResult<Vec<MemberInfo>> {
        Ok(self.state().members.values().cloned().collect())
    }

    async fn message_exists(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> PlatformResult<bool> {
        Ok(self.state().messages.contains(&(channel, message)))
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId> {
        let mut state = self.state();
        if !state.channels.get(&channel).is_some_and(|c| c.can_send) {
            return Err(forbidden("send"));
        }
        state.next_message += 1;
        let id = MessageId(state.next_message);
        state.messages.insert((channel, id));
        state.sent.push((channel, content.to_string()));
        Ok(id)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        if self.state().messages.remove(&(channel, message)) {
            Ok(())
        } else {
            Err(not_found("message"))
        }
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<()> {
        self.react(message, BOT, emoji);
        Ok(())
    }

    async fn reaction_users(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<Vec<UserId>> {
        Ok(self.reactors(message, emoji))
    }

    async fn remove_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
        user: UserId,
    ) -> PlatformResult<()> {
        if let Some(users) = self.state().reactions.get_mut(&(message, emoji)) {
            users.retain(|u| *u != user);
        }
        Ok(())
    }

    async fn add_roles(
        &self,
        _guild: GuildId,
        user: UserId,
        roles: &[RoleId],
        _reason: &str,
    ) -> PlatformResult<()> {
        let released = self.released.notified();
        if self.stalled.lock().unwrap().contains(&user) {
            released.await;
        }
        let mut state = self.state();
        if state.fail_role_edits || !state.bot.manage_roles {
            return Err(forbidden("add roles"));
        }
        let member = state.members.get_mut(&user).ok_or_else(|| not_found("member"))?;
        for role in roles {
            if !member.roles.contains(role) {
                member.roles.push(*role);
            }
        }
        state.grants.push((user, roles.to_vec()));
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
        _reason: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        if state.fail_role_edits {
            return Err(forbidden("remove role"));
        }
        let member = state.members.get_mut(&user).ok_or_else(|| not_found("member"))?;
        member.roles.retain(|r| *r != role);
        state.revokes.push((user, role));
        Ok(())
    }

    async fn kick(&self, _guild: GuildId, user: UserId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state();
        if state.fail_kicks || !state.bot.kick_members {
            return Err(forbidden("kick"));
        }
        state.members.remove(&user).ok_or_else(|| not_found("member"))?;
        state.kicked.push(user);
        Ok(())
    }
}

/// Collects operator notices.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.notices().iter().any(|n| n.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _guild: GuildId, message: &str) -> PortcullisResult<()> {
        self.notices.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryGatewayStore>,
    pub platform: Arc<MockPlatform>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: GatewayContext,
}

impl Fixture {
    /// A guild with roles and channels in place but an unconfigured gate.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryGatewayStore::new());
        let platform = Arc::new(MockPlatform::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = GatewayContext::new(
            store.clone(),
            platform.clone(),
            notifier.clone(),
            GateEmojis::default(),
        );
        store.ensure_guild(GUILD).await.unwrap();
        Self {
            store,
            platform,
            notifier,
            ctx,
        }
    }

    /// Gate configured with every role and channel, not yet active.
    pub async fn configured() -> Self {
        let fixture = Self::new().await;
        let mut config = GuildGatewayConfig::new(GUILD);
        config.rules_channel_id = Some(RULES);
        config.blocking_role_id = Some(BLOCKING);
        config.member_role_ids = vec![MEMBER_ROLE];
        config.exception_role_ids = vec![EXCEPTION];
        config.welcome_channel_id = Some(WELCOME);
        config.goodbye_channel_id = Some(GOODBYE);
        fixture.store.save_config(&config).await.unwrap();
        fixture
    }

    /// Configured and activated. Returns the gate message id too.
    pub async fn active() -> (Self, MessageId) {
        let fixture = Self::configured().await;
        let outcome = activate(&fixture.ctx, GUILD).await.unwrap();
        let ActivationOutcome::Activated(message) = outcome else {
            panic!("activation refused: {outcome:?}");
        };
        (fixture, message)
    }

    pub async fn config(&self) -> GuildGatewayConfig {
        self.store.gateway_config(GUILD).await.unwrap().unwrap()
    }

    pub async fn is_entrant(&self, user: UserId) -> bool {
        self.store.entrant(GUILD, user).await.unwrap().is_some()
    }

    pub async fn is_accepted(&self, user: UserId) -> bool {
        self.store.is_accepted(GUILD, user).await.unwrap()
    }

    /// Entrant(u) holds exactly when u is gated and has not accepted.
    pub async fn assert_settled(&self) {
        let members: Vec<MemberInfo> = self.platform.state().members.values().cloned().collect();
        for member in members.iter().filter(|m| !m.bot) {
            let entrant = self.is_entrant(member.user_id).await;
            let accepted = self.is_accepted(member.user_id).await;
            assert!(!(entrant && accepted), "{} is both entrant and accepted", member.user_id);
            assert_eq!(
                entrant,
                member.has_role(BLOCKING) && !accepted,
                "settled-state invariant broken for {}",
                member.user_id
            );
        }
    }
}
