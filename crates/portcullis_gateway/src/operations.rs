//! Operator commands that change the module lifecycle.

use crate::context::{GatewayContext, GatewayResult};
use crate::templates;
use crate::trip::teardown;
use portcullis_core::{GateEmoji, GuildId, MessageId, UserId};
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};

/// Result of `activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ActivationOutcome {
    /// The gate message was posted.
    #[display("The gateway module has been activated.")]
    Activated(MessageId),
    /// Nothing to do.
    #[display("The gateway module is already active.")]
    AlreadyActive,
    /// The bot lacks Manage Roles or Kick Members.
    #[display("The bot needs the Manage Roles and Kick Members permissions to activate the gateway module.")]
    MissingPermissions,
    /// No usable rules channel.
    #[display("The rules channel is not set, no longer exists, or the bot can not send and manage messages in it.")]
    RulesChannelUnavailable,
    /// No usable blocking role.
    #[display("The blocking role is not set, no longer exists, or is not below the bot's top role.")]
    BlockingRoleUnavailable,
}

/// Result of `deactivate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DeactivationOutcome {
    /// The module was shut down.
    #[display("The gateway module has been deactivated.")]
    Deactivated,
    /// Nothing to do.
    #[display("The gateway module is already inactive.")]
    AlreadyInactive,
}

/// Result of `checkaccepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedStatus {
    /// Whether one user is recorded as accepted.
    Member {
        /// User asked about
        user: UserId,
        /// Recorded as accepted
        accepted: bool,
    },
    /// Guild-wide totals.
    Counts {
        /// Accepted rows
        accepted: usize,
        /// Human members
        humans: u64,
    },
}

impl std::fmt::Display for AcceptedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member {
                user,
                accepted: true,
            } => write!(f, "{} has accepted the rules.", user.mention()),
            Self::Member {
                user,
                accepted: false,
            } => write!(f, "{} has not accepted the rules.", user.mention()),
            Self::Counts { accepted, humans } => write!(
                f,
                "{} out of {} members have accepted the rules.",
                templates::group_thousands(*accepted as u64),
                templates::group_thousands(*humans)
            ),
        }
    }
}

/// Post the gate message and start enforcing the gate.
///
/// Refusals leave the module untouched and do not trip.
#[instrument(skip(ctx), fields(guild_id = %guild))]
pub async fn activate(ctx: &GatewayContext, guild: GuildId) -> GatewayResult<ActivationOutcome> {
    let config = match ctx.store().gateway_config(guild).await? {
        Some(c) => c,
        None => {
            ctx.store().ensure_guild(guild).await?;
            portcullis_core::GuildGatewayConfig::new(guild)
        }
    };
    if config.active {
        return Ok(ActivationOutcome::AlreadyActive);
    }

    let platform = ctx.platform();
    let bot = platform.bot_member(guild).await?;
    if !bot.manage_roles || !bot.kick_members {
        return Ok(ActivationOutcome::MissingPermissions);
    }

    let rules = match config.rules_channel_id {
        Some(id) => platform.channel(guild, id).await?,
        None => None,
    };
    let Some(rules) = rules.filter(|c| c.can_send && c.can_manage_messages) else {
        return Ok(ActivationOutcome::RulesChannelUnavailable);
    };

    let blocking = match config.blocking_role_id {
        Some(id) => platform.role(guild, id).await?,
        None => None,
    };
    if !blocking.is_some_and(|r| bot.outranks(&r)) {
        return Ok(ActivationOutcome::BlockingRoleUnavailable);
    }

    let emojis = ctx.emojis();
    let text = templates::gate(config.gate_text.as_deref(), emojis.accept(), emojis.decline());
    let message = platform.send_message(rules.id, &text).await?;
    for emoji in GateEmoji::iter() {
        if let Err(e) = platform.add_reaction(rules.id, message, emoji).await {
            if let Err(cleanup) = platform.delete_message(rules.id, message).await {
                warn!(error = %cleanup, "Half-built gate message left behind");
            }
            return Err(e.into());
        }
    }

    ctx.store().set_activation(guild, Some(message)).await?;
    info!(message_id = %message, "Gateway module activated");
    let outcome = ActivationOutcome::Activated(message);
    ctx.notifier().notify(guild, &outcome.to_string()).await?;
    Ok(outcome)
}

/// Stop enforcing the gate and take the gate message down.
#[instrument(skip(ctx), fields(guild_id = %guild))]
pub async fn deactivate(
    ctx: &GatewayContext,
    guild: GuildId,
) -> GatewayResult<DeactivationOutcome> {
    let active = ctx
        .store()
        .gateway_config(guild)
        .await?
        .is_some_and(|c| c.active);
    if !active {
        return Ok(DeactivationOutcome::AlreadyInactive);
    }

    teardown(ctx, guild).await?;
    info!("Gateway module deactivated");
    let outcome = DeactivationOutcome::Deactivated;
    ctx.notifier().notify(guild, &outcome.to_string()).await?;
    Ok(outcome)
}

/// Whether `user` accepted the rules, or the guild-wide totals.
#[instrument(skip(ctx), fields(guild_id = %guild))]
pub async fn check_accepted(
    ctx: &GatewayContext,
    guild: GuildId,
    user: Option<UserId>,
) -> GatewayResult<AcceptedStatus> {
    if let Some(user) = user {
        let accepted = ctx.store().is_accepted(guild, user).await?;
        return Ok(AcceptedStatus::Member { user, accepted });
    }
    let accepted = ctx.store().accepted_users(guild).await?.len();
    let humans = ctx.platform().guild_info(guild).await?.human_count();
    Ok(AcceptedStatus::Counts { accepted, humans })
}

/// Forget every acceptance in the guild. Returns rows removed.
#[instrument(skip(ctx), fields(guild_id = %guild))]
pub async fn reset_accepted(ctx: &GatewayContext, guild: GuildId) -> GatewayResult<usize> {
    let removed = ctx.store().reset_accepted(guild).await?;
    info!(removed, "Accepted members reset");
    ctx.notifier()
        .notify(
            guild,
            &format!(
                "The accepted members list has been reset ({} removed).",
                templates::group_thousands(removed as u64)
            ),
        )
        .await?;
    Ok(removed)
}
