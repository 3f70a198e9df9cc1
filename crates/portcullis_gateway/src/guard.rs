//! Precondition checks that trip the gateway module when they fail.
//!
//! Every check returns `Ok(Some(resource))` when the precondition holds and
//! `Ok(None)` when it does not, in which case the trip has already run and
//! the caller must abort. `Err` is reserved for platform or persistence
//! failures that are not a verdict on the precondition itself.

use crate::context::{GatewayContext, GatewayResult};
use crate::trip;
use portcullis_core::{
    BotMember, ChannelId, GateMessage, GuildGatewayConfig, GuildId, MessageId, RoleId, RoleInfo,
};
use tracing::instrument;

/// Everything the gate needs, validated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    /// The bot's standing
    pub bot: BotMember,
    /// The live gate message
    pub message: GateMessage,
    /// The blocking role
    pub blocking_role: RoleId,
    /// Member roles, in configured order
    pub member_roles: Vec<RoleId>,
    /// Exception roles
    pub exception_roles: Vec<RoleId>,
}

/// Precondition checks for one guild.
pub struct Guard<'a> {
    ctx: &'a GatewayContext,
    guild: GuildId,
}

impl<'a> Guard<'a> {
    /// Checks for `guild`.
    pub fn new(ctx: &'a GatewayContext, guild: GuildId) -> Self {
        Self { ctx, guild }
    }

    async fn fail<T>(&self, reason: &str) -> GatewayResult<Option<T>> {
        trip::trip(self.ctx, self.guild, reason).await?;
        Ok(None)
    }

    /// The bot holds Manage Roles and Kick Members.
    #[instrument(skip(self), fields(guild_id = %self.guild))]
    pub async fn permissions(&self) -> GatewayResult<Option<BotMember>> {
        let bot = self.ctx.platform().bot_member(self.guild).await?;
        if !bot.manage_roles {
            return self
                .fail("the bot no longer has the Manage Roles permission")
                .await;
        }
        if !bot.kick_members {
            return self
                .fail("the bot no longer has the Kick Members permission")
                .await;
        }
        Ok(Some(bot))
    }

    /// The rules channel is reachable, the bot can manage messages there and
    /// the gate message still exists.
    #[instrument(skip(self), fields(guild_id = %self.guild))]
    pub async fn gate_message(
        &self,
        rules_channel: Option<ChannelId>,
        gate_message: Option<MessageId>,
    ) -> GatewayResult<Option<GateMessage>> {
        let channel = match rules_channel {
            Some(id) => self.ctx.platform().channel(self.guild, id).await?,
            None => None,
        };
        let Some(channel) = channel else {
            return self
                .fail("the rules channel no longer exists, or is unable to be accessed by the bot")
                .await;
        };

        let exists = match gate_message {
            Some(message) => self.ctx.platform().message_exists(channel.id, message).await?,
            None => false,
        };
        let (true, Some(message_id)) = (exists, gate_message) else {
            return self.fail("the gate message no longer exists").await;
        };

        if !channel.can_manage_messages {
            return self
                .fail("the bot does not have the Manage Messages permission in the rules channel")
                .await;
        }

        Ok(Some(GateMessage {
            channel_id: channel.id,
            message_id,
        }))
    }

    /// The blocking role exists and sits below the bot's top role.
    #[instrument(skip(self), fields(guild_id = %self.guild))]
    pub async fn blocking_role(&self, role: Option<RoleId>) -> GatewayResult<Option<RoleInfo>> {
        let found = match role {
            Some(id) => self.ctx.platform().role(self.guild, id).await?,
            None => None,
        };
        let Some(found) = found else {
            return self
                .fail("the blocking role no longer exists, or is unable to be accessed by the bot")
                .await;
        };

        let bot = self.ctx.platform().bot_member(self.guild).await?;
        if !bot.outranks(&found) {
            return self
                .fail("the blocking role is equal to or higher than the bot's top role in the role hierarchy")
                .await;
        }
        Ok(Some(found))
    }

    /// Every member role exists and sits below the bot's top role.
    #[instrument(skip(self, roles), fields(guild_id = %self.guild, count = roles.len()))]
    pub async fn member_roles(&self, roles: &[RoleId]) -> GatewayResult<Option<Vec<RoleInfo>>> {
        if roles.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let bot = self.ctx.platform().bot_member(self.guild).await?;
        let mut found = Vec::with_capacity(roles.len());
        for id in roles {
            let Some(role) = self.ctx.platform().role(self.guild, *id).await? else {
                return self
                    .fail("one or more member roles no longer exist, or are unable to be accessed by the bot")
                    .await;
            };
            if !bot.outranks(&role) {
                return self
                    .fail("one or more member roles are equal to or higher than the bot's top role in the role hierarchy")
                    .await;
            }
            found.push(role);
        }
        Ok(Some(found))
    }

    /// Every exception role exists.
    #[instrument(skip(self, roles), fields(guild_id = %self.guild, count = roles.len()))]
    pub async fn exception_roles(&self, roles: &[RoleId]) -> GatewayResult<Option<Vec<RoleInfo>>> {
        let mut found = Vec::with_capacity(roles.len());
        for id in roles {
            let Some(role) = self.ctx.platform().role(self.guild, *id).await? else {
                return self
                    .fail("one or more exception roles no longer exist, or are unable to be accessed by the bot")
                    .await;
            };
            found.push(role);
        }
        Ok(Some(found))
    }

    /// The welcome channel, if configured, accepts messages from the bot.
    ///
    /// The inner `None` means no welcome channel is configured.
    pub async fn welcome_channel(
        &self,
        channel: Option<ChannelId>,
    ) -> GatewayResult<Option<Option<ChannelId>>> {
        self.notice_channel(channel, "welcome").await
    }

    /// The goodbye channel, if configured, accepts messages from the bot.
    ///
    /// The inner `None` means no goodbye channel is configured.
    pub async fn goodbye_channel(
        &self,
        channel: Option<ChannelId>,
    ) -> GatewayResult<Option<Option<ChannelId>>> {
        self.notice_channel(channel, "goodbye").await
    }

    #[instrument(skip(self), fields(guild_id = %self.guild))]
    async fn notice_channel(
        &self,
        channel: Option<ChannelId>,
        which: &str,
    ) -> GatewayResult<Option<Option<ChannelId>>> {
        let Some(id) = channel else {
            return Ok(Some(None));
        };
        match self.ctx.platform().channel(self.guild, id).await? {
            None => {
                self.fail(&format!(
                    "the {which} channel no longer exists or is unable to be accessed by the bot"
                ))
                .await
            }
            Some(c) if !c.can_send => {
                self.fail(&format!(
                    "the bot does not have the Send Messages permission in the {which} channel"
                ))
                .await
            }
            Some(c) => Ok(Some(Some(c.id))),
        }
    }

    /// Run every check the gate depends on, in order, stopping at the first
    /// violation.
    pub async fn gate(&self, config: &GuildGatewayConfig) -> GatewayResult<Option<Gate>> {
        let Some(bot) = self.permissions().await? else {
            return Ok(None);
        };
        let Some(message) = self
            .gate_message(config.rules_channel_id, config.gate_message_id)
            .await?
        else {
            return Ok(None);
        };
        let Some(blocking) = self.blocking_role(config.blocking_role_id).await? else {
            return Ok(None);
        };
        let Some(member_roles) = self.member_roles(&config.member_role_ids).await? else {
            return Ok(None);
        };
        let Some(exception_roles) = self.exception_roles(&config.exception_role_ids).await? else {
            return Ok(None);
        };

        Ok(Some(Gate {
            bot,
            message,
            blocking_role: *blocking.id(),
            member_roles: member_roles.iter().map(|r| *r.id()).collect(),
            exception_roles: exception_roles.iter().map(|r| *r.id()).collect(),
        }))
    }
}
