//! Chat platform trait.

use async_trait::async_trait;
use portcullis_core::{
    BotMember, ChannelId, ChannelInfo, GateEmoji, GuildId, GuildInfo, MemberInfo, MessageId,
    RoleId, RoleInfo, UserId,
};
use portcullis_error::PlatformError;

/// Result type for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Live guild state and the mutations the gateway performs on it.
///
/// Lookups of objects that may legitimately be gone (roles, channels,
/// members) return `Ok(None)` instead of a not-found error. Mutations report
/// missing targets as [`PlatformErrorKind::NotFound`] and missing permissions
/// as [`PlatformErrorKind::Forbidden`].
///
/// [`PlatformErrorKind::NotFound`]: portcullis_error::PlatformErrorKind::NotFound
/// [`PlatformErrorKind::Forbidden`]: portcullis_error::PlatformErrorKind::Forbidden
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Guilds the bot is currently in.
    async fn guild_ids(&self) -> PlatformResult<Vec<GuildId>>;

    /// Name and member count of a guild.
    async fn guild_info(&self, guild: GuildId) -> PlatformResult<GuildInfo>;

    /// The bot's guild permissions and top role position.
    async fn bot_member(&self, guild: GuildId) -> PlatformResult<BotMember>;

    /// A role, or `None` if it does not exist.
    async fn role(&self, guild: GuildId, role: RoleId) -> PlatformResult<Option<RoleInfo>>;

    /// A channel with the bot's effective permissions in it, or `None` if it
    /// does not exist or the bot cannot see it.
    async fn channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> PlatformResult<Option<ChannelInfo>>;

    /// A member, or `None` if the user is not in the guild.
    async fn member(&self, guild: GuildId, user: UserId) -> PlatformResult<Option<MemberInfo>>;

    /// Every member of the guild.
    async fn members(&self, guild: GuildId) -> PlatformResult<Vec<MemberInfo>>;

    /// Whether a message still exists.
    async fn message_exists(&self, channel: ChannelId, message: MessageId)
    -> PlatformResult<bool>;

    /// Post a text message.
    async fn send_message(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId>;

    /// Delete a message.
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;

    /// Add the bot's own gate reaction to a message.
    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<()>;

    /// Every user who reacted with `emoji`, the bot included.
    async fn reaction_users(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
    ) -> PlatformResult<Vec<UserId>>;

    /// Remove one user's reaction.
    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: GateEmoji,
        user: UserId,
    ) -> PlatformResult<()>;

    /// Grant roles to a member.
    async fn add_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: &[RoleId],
        reason: &str,
    ) -> PlatformResult<()>;

    /// Revoke a role from a member.
    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> PlatformResult<()>;

    /// Kick a member.
    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> PlatformResult<()>;
}
