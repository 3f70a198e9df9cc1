//! Live membership events and the gate transitions they cause.

use crate::context::{GatewayContext, GatewayResult, tolerate};
use crate::guard::Guard;
use crate::reconcile::admit;
use crate::templates::{self, TemplateVars};
use chrono::Utc;
use portcullis_core::{
    ChannelId, Entrant, GateEmoji, GuildGatewayConfig, GuildId, MemberInfo, MessageId, RoleId,
    UserId,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// Something that happened in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
pub enum GuildEvent {
    /// A member joined.
    MemberJoined(MemberInfo),
    /// A member left, was kicked or was banned.
    MemberLeft(MemberInfo),
    /// A member gained roles. `member` is the state after the update.
    RolesAdded {
        /// Updated member
        member: MemberInfo,
        /// Roles gained by this update
        added: Vec<RoleId>,
    },
    /// A user reacted to a message.
    ReactionAdded {
        /// Channel of the message
        channel_id: ChannelId,
        /// Message reacted to
        message_id: MessageId,
        /// Reacting user
        user_id: UserId,
        /// Which gate emoji was used
        emoji: GateEmoji,
    },
    /// The bot was added to the guild.
    GuildJoined,
    /// The bot was removed from the guild.
    GuildLeft,
}

/// Apply one event to the gate.
#[instrument(skip(ctx, event), fields(guild_id = %guild, event = event.as_ref()))]
pub async fn handle(ctx: &GatewayContext, guild: GuildId, event: GuildEvent) -> GatewayResult<()> {
    match event {
        GuildEvent::MemberJoined(member) => member_joined(ctx, guild, member).await,
        GuildEvent::MemberLeft(member) => member_left(ctx, guild, member).await,
        GuildEvent::RolesAdded { member, added } => roles_added(ctx, guild, member, added).await,
        GuildEvent::ReactionAdded {
            channel_id,
            message_id,
            user_id,
            emoji,
        } => reaction_added(ctx, guild, channel_id, message_id, user_id, emoji).await,
        GuildEvent::GuildJoined => {
            info!("Joined guild");
            ctx.store().ensure_guild(guild).await
        }
        GuildEvent::GuildLeft => {
            info!("Left guild");
            ctx.store().remove_guild(guild).await
        }
    }
}

pub(crate) async fn active_config(
    ctx: &GatewayContext,
    guild: GuildId,
) -> GatewayResult<Option<GuildGatewayConfig>> {
    Ok(ctx
        .store()
        .gateway_config(guild)
        .await?
        .filter(|c| c.active))
}

async fn send_notice(
    ctx: &GatewayContext,
    guild: GuildId,
    channel: ChannelId,
    member: &MemberInfo,
    render: impl FnOnce(&TemplateVars<'_>) -> String,
) -> GatewayResult<()> {
    let info = ctx.platform().guild_info(guild).await?;
    let text = render(&TemplateVars::new(member, &info));
    tolerate(
        ctx.platform().send_message(channel, &text).await.map(|_| ()),
        "send member notice",
    )?;
    Ok(())
}

async fn member_joined(
    ctx: &GatewayContext,
    guild: GuildId,
    member: MemberInfo,
) -> GatewayResult<()> {
    let Some(config) = active_config(ctx, guild).await? else {
        debug!("Gateway inactive, join ignored");
        return Ok(());
    };
    let guard = Guard::new(ctx, guild);

    if member.bot {
        let Some(Some(channel)) = guard.welcome_channel(config.welcome_channel_id).await? else {
            return Ok(());
        };
        let custom = config.welcome_bot_text.as_deref();
        return send_notice(ctx, guild, channel, &member, |v| {
            templates::welcome_bot(custom, v)
        })
        .await;
    }

    if guard.permissions().await?.is_none() {
        return Ok(());
    }
    let Some(blocking) = guard.blocking_role(config.blocking_role_id).await? else {
        return Ok(());
    };

    let gated = tolerate(
        ctx.platform()
            .add_roles(
                guild,
                member.user_id,
                &[*blocking.id()],
                "Needed to enforce a decision on the server rules.",
            )
            .await,
        "grant blocking role",
    )?;
    if !gated {
        return Ok(());
    }

    let joined = member.joined_at.unwrap_or_else(Utc::now);
    let entrant = Entrant {
        guild_id: guild,
        user_id: member.user_id,
        timeout_at: joined + config.timeout(),
    };
    ctx.store().insert_entrant(&entrant).await?;
    info!(user_id = %member.user_id, timeout_at = %entrant.timeout_at, "Member gated");
    Ok(())
}

async fn member_left(ctx: &GatewayContext, guild: GuildId, member: MemberInfo) -> GatewayResult<()> {
    let user = member.user_id;
    let Some(config) = active_config(ctx, guild).await? else {
        ctx.store().delete_entrant(guild, user).await?;
        ctx.store().delete_accepted(guild, user).await?;
        debug!(user_id = %user, "Gateway inactive, rows cleared without notices");
        return Ok(());
    };
    let guard = Guard::new(ctx, guild);

    if member.bot {
        let Some(Some(channel)) = guard.goodbye_channel(config.goodbye_channel_id).await? else {
            return Ok(());
        };
        let custom = config.goodbye_bot_text.as_deref();
        return send_notice(ctx, guild, channel, &member, |v| {
            templates::goodbye_bot(custom, v)
        })
        .await;
    }

    let was_entrant = ctx.store().delete_entrant(guild, user).await?;
    ctx.store().delete_accepted(guild, user).await?;
    if was_entrant {
        info!(user_id = %user, "Entrant left before deciding");
    } else {
        let Some(channel) = guard.goodbye_channel(config.goodbye_channel_id).await? else {
            return Ok(());
        };
        if let Some(channel) = channel {
            let custom = config.goodbye_text.as_deref();
            send_notice(ctx, guild, channel, &member, |v| templates::goodbye(custom, v)).await?;
        }
    }

    let Some(gate) = guard
        .gate_message(config.rules_channel_id, config.gate_message_id)
        .await?
    else {
        return Ok(());
    };
    for emoji in GateEmoji::iter() {
        tolerate(
            ctx.platform()
                .remove_reaction(gate.channel_id, gate.message_id, emoji, user)
                .await,
            "remove departed member's reaction",
        )?;
    }
    Ok(())
}

async fn roles_added(
    ctx: &GatewayContext,
    guild: GuildId,
    member: MemberInfo,
    added: Vec<RoleId>,
) -> GatewayResult<()> {
    let Some(config) = active_config(ctx, guild).await? else {
        return Ok(());
    };
    if config.exception_role_ids.is_empty()
        || member.bot
        || !added.iter().any(|r| config.is_exception_role(*r))
    {
        return Ok(());
    }
    if !config
        .blocking_role_id
        .is_some_and(|blocking| member.has_role(blocking))
    {
        debug!(user_id = %member.user_id, "Exception role given to ungated member");
        return Ok(());
    }

    let guard = Guard::new(ctx, guild);
    if guard.permissions().await?.is_none() {
        return Ok(());
    }
    let Some(blocking) = guard.blocking_role(config.blocking_role_id).await? else {
        return Ok(());
    };
    let Some(member_roles) = guard.member_roles(&config.member_role_ids).await? else {
        return Ok(());
    };
    if guard
        .exception_roles(&config.exception_role_ids)
        .await?
        .is_none()
    {
        return Ok(());
    }

    let member_roles: Vec<RoleId> = member_roles.iter().map(|r| *r.id()).collect();
    let admitted = admit(
        ctx,
        guild,
        &member,
        &member_roles,
        *blocking.id(),
        "Member was given an exception role.",
    )
    .await?;
    if !admitted {
        warn!(user_id = %member.user_id, "Exception pass incomplete, entrant kept");
        return Ok(());
    }
    ctx.store().delete_entrant(guild, member.user_id).await?;
    info!(user_id = %member.user_id, "Member passed the gate by exception role");
    Ok(())
}

async fn reaction_added(
    ctx: &GatewayContext,
    guild: GuildId,
    channel: ChannelId,
    message: MessageId,
    user: UserId,
    emoji: GateEmoji,
) -> GatewayResult<()> {
    let Some(config) = active_config(ctx, guild).await? else {
        return Ok(());
    };
    if config.gate_message_id != Some(message) {
        return Ok(());
    }
    let Some(gate) = Guard::new(ctx, guild).gate(&config).await? else {
        return Ok(());
    };
    if gate.message.channel_id != channel {
        return Ok(());
    }
    let Some(member) = ctx.platform().member(guild, user).await? else {
        debug!(user_id = %user, "Reacting user is not a member");
        return Ok(());
    };
    if member.bot {
        return Ok(());
    }
    let gated = member.has_role(gate.blocking_role);

    match emoji {
        GateEmoji::Accept => {
            // The member snapshot may predate an earlier accept, so the
            // stored row decides whether this is the first one.
            if !ctx.store().accept(guild, user).await? {
                debug!(user_id = %user, "Member already accepted");
                return Ok(());
            }
            info!(user_id = %user, "Member accepted the rules");

            if gated {
                admit(
                    ctx,
                    guild,
                    &member,
                    &gate.member_roles,
                    gate.blocking_role,
                    "Member accepted the server rules.",
                )
                .await?;

                let guard = Guard::new(ctx, guild);
                if let Some(Some(channel)) = guard.welcome_channel(config.welcome_channel_id).await? {
                    let custom = config.welcome_text.as_deref();
                    send_notice(ctx, guild, channel, &member, |v| {
                        templates::welcome(custom, v)
                    })
                    .await?;
                }
            }
        }
        GateEmoji::Decline => {
            if gated {
                tolerate(
                    ctx.platform()
                        .kick(guild, user, "Member declined the server rules.")
                        .await,
                    "kick declined member",
                )?;
                info!(user_id = %user, "Member declined the rules");
            }
        }
    }
    Ok(())
}
