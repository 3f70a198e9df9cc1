//! Serenity implementation of [`ChatPlatform`].
//!
//! Guild structure (roles, channels, permissions) is read from the client
//! cache. Members, messages and reactions go through the HTTP client, so a
//! partially cached guild never hides a member from reconciliation.

use crate::conversions::{
    emoji_spec, found, member_info, platform_error, reaction_type, snowflake,
};
use async_trait::async_trait;
use portcullis_core::{
    BotMember, ChannelId, ChannelInfo, GateEmoji, GuildId, GuildInfo, MemberInfo, MessageId,
    RoleId, RoleInfo, UserId,
};
use portcullis_error::{PlatformError, PlatformErrorKind};
use portcullis_gateway::GateEmojis;
use portcullis_interface::{ChatPlatform, PlatformResult};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::ReactionType;
use serenity::model::guild::{Guild, Member};
use serenity::model::id as sid;
use std::sync::Arc;
use tracing::{debug, instrument};

const MEMBER_PAGE: u64 = 1000;
const REACTION_PAGE: u8 = 100;

/// Discord through serenity's cache and HTTP client.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    emojis: GateEmojis,
}

impl SerenityPlatform {
    /// Wrap a connected client's HTTP client and cache.
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, emojis: GateEmojis) -> Self {
        Self {
            http,
            cache,
            emojis,
        }
    }

    fn bot_id(&self) -> sid::UserId {
        self.cache.current_user().id
    }

    /// Run `f` against the cached guild without holding the cache across an
    /// await point.
    fn with_guild<T>(&self, guild: GuildId, f: impl FnOnce(&Guild) -> T) -> PlatformResult<T> {
        let id: sid::GuildId = snowflake(guild.get(), "guild")?;
        let cached = self
            .cache
            .guild(id)
            .ok_or_else(|| PlatformError::new(PlatformErrorKind::Uncached(guild.get())))?;
        Ok(f(&cached))
    }

    async fn fetch_member(&self, guild: sid::GuildId, user: sid::UserId) -> PlatformResult<Member> {
        let cached = self
            .cache
            .guild(guild)
            .and_then(|g| g.members.get(&user).cloned());
        if let Some(member) = cached {
            return Ok(member);
        }
        self.http
            .get_member(guild, user)
            .await
            .map_err(|e| platform_error("fetch member", e))
    }

    fn reaction(&self, emoji: GateEmoji) -> PlatformResult<ReactionType> {
        reaction_type(emoji_spec(&self.emojis, emoji))
    }
}

impl std::fmt::Debug for SerenityPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityPlatform")
            .field("emojis", &self.emojis)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn guild_ids(&self) -> PlatformResult<Vec<GuildId>> {
        Ok(self
            .cache
            .guilds()
            .into_iter()
            .map(|g| GuildId(g.get()))
            .collect())
    }

    async fn guild_info(&self, guild: GuildId) -> PlatformResult<GuildInfo> {
        self.with_guild(guild, |g| GuildInfo {
            id: guild,
            name: g.name.clone(),
            member_count: g.member_count,
            bot_count: g.members.values().filter(|m| m.user.bot).count() as u64,
        })
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn bot_member(&self, guild: GuildId) -> PlatformResult<BotMember> {
        let me = self.bot_id();
        let member = self.fetch_member(snowflake(guild.get(), "guild")?, me).await?;
        self.with_guild(guild, |g| {
            let permissions = g.member_permissions(&member);
            let top_role_position = member
                .roles
                .iter()
                .filter_map(|r| g.roles.get(r))
                .map(|r| r.position)
                .max()
                .unwrap_or(0);
            BotMember {
                user_id: UserId(me.get()),
                top_role_position,
                manage_roles: permissions.manage_roles(),
                kick_members: permissions.kick_members(),
            }
        })
    }

    async fn role(&self, guild: GuildId, role: RoleId) -> PlatformResult<Option<RoleInfo>> {
        let Some(id) = found(snowflake::<sid::RoleId>(role.get(), "role"))? else {
            return Ok(None);
        };
        self.with_guild(guild, |g| {
            g.roles
                .get(&id)
                .map(|r| RoleInfo::new(role, r.name.clone(), r.position))
        })
    }

    #[instrument(skip(self), fields(guild_id = %guild, channel_id = %channel))]
    async fn channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> PlatformResult<Option<ChannelInfo>> {
        let Some(id) = found(snowflake::<sid::ChannelId>(channel.get(), "channel"))? else {
            return Ok(None);
        };
        let bot = self
            .fetch_member(snowflake(guild.get(), "guild")?, self.bot_id())
            .await?;
        self.with_guild(guild, |g| {
            let ch = g.channels.get(&id)?;
            let permissions = g.user_permissions_in(ch, &bot);
            if !permissions.view_channel() {
                debug!("Channel hidden from the bot");
                return None;
            }
            Some(ChannelInfo {
                id: channel,
                can_send: permissions.send_messages(),
                can_manage_messages: permissions.manage_messages(),
            })
        })
    }

    async fn member(&self, guild: GuildId, user: UserId) -> PlatformResult<Option<MemberInfo>> {
        let Some(user) = found(snowflake::<sid::UserId>(user.get(), "user"))? else {
            return Ok(None);
        };
        let member = found(self.fetch_member(snowflake(guild.get(), "guild")?, user).await)?;
        Ok(member.as_ref().map(member_info))
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn members(&self, guild: GuildId) -> PlatformResult<Vec<MemberInfo>> {
        let id: sid::GuildId = snowflake(guild.get(), "guild")?;
        let mut members = Vec::new();
        let mut after = None;
        loop {
            let page = self
                .http
                .get_guild_members(id, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| platform_error("list members", e))?;
            let full = page.len() as u64 == MEMBER_PAGE;
            after = page.last().map(|m| m.user.id.get());
            members.extend(page.iter().map(member_info));
            if !full || after.is_none() {
                break;
            }
        }
        debug!(count = members.len(), "Listed members");
        Ok(members)
    }

    async fn message_exists(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> PlatformResult<bool> {
        let (Some(channel), Some(message)) = (
            found(snowflake::<sid::ChannelId>(channel.get(), "channel"))?,
            found(snowflake::<sid::MessageId>(message.get(), "message"))?,
        ) else {
            return Ok(false);
        };
        let fetched = self
            .http
            .get_message(channel, message)
            .await
            .map_err(|e| platform_error("fetch message", e));
        Ok(found(fetched)?.is_some())
    }

    #[instrument(skip(self, content), fields(channel_id = %channel))]
    async fn send_message(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId> {
        let id: sid::ChannelId = snowflake(channel.get(), "channel")?;
        let message = id
            .say(&self.http, content)
            .await
            .map_err(|e| platform_error("send message", e))?;
        Ok(MessageId(message.id.get()))
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        self.http
            .delete_message(
                snowflake(channel.get(), "channel")?,
                snowflake(message.get(), "message")?,
                None,
            )
            .await
            .map_err(|e| platform_error("delete message", e))
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<()> {
        let reaction = self.reaction(emoji)?;
        self.http
            .create_reaction(
                snowflake(channel.get(), "channel")?,
                snowflake(message.get(), "message")?,
                &reaction,
            )
            .await
            .map_err(|e| platform_error("add reaction", e))
    }

    #[instrument(skip(self), fields(channel_id = %channel, message_id = %message))]
    async fn reaction_users(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<Vec<UserId>> {
        let reaction = self.reaction(emoji)?;
        let channel: sid::ChannelId = snowflake(channel.get(), "channel")?;
        let message: sid::MessageId = snowflake(message.get(), "message")?;
        let mut users = Vec::new();
        let mut after = None;
        loop {
            let page = self
                .http
                .get_reaction_users(channel, message, &reaction, REACTION_PAGE, after)
                .await
                .map_err(|e| platform_error("list reactions", e))?;
            let full = page.len() == usize::from(REACTION_PAGE);
            after = page.last().map(|u| u.id.get());
            users.extend(page.iter().map(|u| UserId(u.id.get())));
            if !full || after.is_none() {
                break;
            }
        }
        Ok(users)
    }

    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
        user: UserId,
    ) -> PlatformResult<()> {
        let reaction = self.reaction(emoji)?;
        self.http
            .delete_reaction(
                snowflake(channel.get(), "channel")?,
                snowflake(message.get(), "message")?,
                snowflake(user.get(), "user")?,
                &reaction,
            )
            .await
            .map_err(|e| platform_error("remove reaction", e))
    }

    #[instrument(skip(self, roles), fields(guild_id = %guild, user_id = %user))]
    async fn add_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: &[RoleId],
        reason: &str,
    ) -> PlatformResult<()> {
        let guild: sid::GuildId = snowflake(guild.get(), "guild")?;
        let user: sid::UserId = snowflake(user.get(), "user")?;
        for role in roles {
            self.http
                .add_member_role(guild, user, snowflake(role.get(), "role")?, Some(reason))
                .await
                .map_err(|e| platform_error("add role", e))?;
        }
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> PlatformResult<()> {
        self.http
            .remove_member_role(
                snowflake(guild.get(), "guild")?,
                snowflake(user.get(), "user")?,
                snowflake(role.get(), "role")?,
                Some(reason),
            )
            .await
            .map_err(|e| platform_error("remove role", e))
    }

    #[instrument(skip(self, reason), fields(guild_id = %guild, user_id = %user))]
    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> PlatformResult<()> {
        self.http
            .kick_member(
                snowflake(guild.get(), "guild")?,
                snowflake(user.get(), "user")?,
                Some(reason),
            )
            .await
            .map_err(|e| platform_error("kick member", e))
    }
}
