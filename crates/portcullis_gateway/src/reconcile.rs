//! Batch alignment of the stored gate state with the live guild.
//!
//! Each routine takes an active configuration snapshot and returns `None`
//! when a guard check tripped the module part way through.

use crate::context::{GatewayContext, GatewayResult, tolerate};
use crate::guard::Guard;
use chrono::{DateTime, Utc};
use portcullis_core::{GateEmoji, GuildGatewayConfig, GuildId, MemberInfo, RoleId, UserId};
use portcullis_interface::ReconciliationBatch;
use std::collections::HashSet;
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument};

/// Outcome of a members pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembersReport {
    /// Members let through because they accepted
    pub allowed: usize,
    /// Members kicked because they declined
    pub denied: usize,
    /// Members let through by an exception role
    pub excepted: usize,
    /// Stored users no longer in the guild
    pub departed: usize,
}

/// Outcome of a full resynchronisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EverythingReport {
    /// Members pass
    pub members: MembersReport,
    /// Members who had roles re-granted
    pub roles_granted: usize,
    /// Reactions removed
    pub reactions_removed: usize,
}

/// Grant missing member roles and lift the blocking role.
///
/// Both calls tolerate benign failures. Returns whether every call went
/// through.
pub(crate) async fn admit(
    ctx: &GatewayContext,
    guild: GuildId,
    member: &MemberInfo,
    member_roles: &[RoleId],
    blocking: RoleId,
    reason: &str,
) -> GatewayResult<bool> {
    let mut clean = true;

    let missing = member.missing_roles(member_roles);
    if !missing.is_empty() {
        clean &= tolerate(
            ctx.platform()
                .add_roles(guild, member.user_id, &missing, reason)
                .await,
            "grant member roles",
        )?;
    }
    if member.has_role(blocking) {
        clean &= tolerate(
            ctx.platform()
                .remove_role(guild, member.user_id, blocking, reason)
                .await,
            "remove blocking role",
        )?;
    }
    Ok(clean)
}

/// Settle gate decisions made while the bot was not watching.
///
/// Candidates are human members who joined after `watermark` or who are
/// still entrants. Their reactions on the gate message decide them; members
/// holding an exception role pass as well. Entrant and accepted rows of
/// users who left are dropped. All writes land in one batch.
#[instrument(skip(ctx, config), fields(guild_id = %config.guild_id))]
pub async fn members(
    ctx: &GatewayContext,
    config: &GuildGatewayConfig,
    watermark: DateTime<Utc>,
) -> GatewayResult<Option<MembersReport>> {
    let guild = config.guild_id;
    let Some(gate) = Guard::new(ctx, guild).gate(config).await? else {
        return Ok(None);
    };

    let members = ctx.platform().members(guild).await?;
    let entrants: HashSet<UserId> = ctx
        .store()
        .entrants(guild)
        .await?
        .into_iter()
        .map(|e| e.user_id)
        .collect();
    let accepted: HashSet<UserId> = ctx.store().accepted_users(guild).await?.into_iter().collect();

    let platform = ctx.platform();
    let (channel, message) = (gate.message.channel_id, gate.message.message_id);
    let accepts: HashSet<UserId> = platform
        .reaction_users(channel, message, GateEmoji::Accept)
        .await?
        .into_iter()
        .collect();
    let declines: HashSet<UserId> = platform
        .reaction_users(channel, message, GateEmoji::Decline)
        .await?
        .into_iter()
        .collect();

    let mut report = MembersReport::default();
    let mut batch = ReconciliationBatch::default();

    for member in members.iter().filter(|m| !m.bot) {
        let user = member.user_id;
        if !member.joined_after(watermark) && !entrants.contains(&user) {
            continue;
        }

        if accepts.contains(&user) {
            admit(
                ctx,
                guild,
                member,
                &gate.member_roles,
                gate.blocking_role,
                "Member accepted the server rules (performed during synchronisation).",
            )
            .await?;
            batch.delete_entrants.push(user);
            batch.insert_accepted.push(user);
            report.allowed += 1;
        } else if declines.contains(&user) {
            let kicked = tolerate(
                platform
                    .kick(
                        guild,
                        user,
                        "Member declined the server rules (performed during synchronisation).",
                    )
                    .await,
                "kick declined member",
            )?;
            // A member still holding the blocking role keeps the row for the sweeper.
            if kicked {
                batch.delete_entrants.push(user);
                report.denied += 1;
            }
        } else if member.has_any_role(&gate.exception_roles) {
            let admitted = admit(
                ctx,
                guild,
                member,
                &gate.member_roles,
                gate.blocking_role,
                "Member was given an exception role (performed during synchronisation).",
            )
            .await?;
            if admitted {
                batch.delete_entrants.push(user);
                report.excepted += 1;
            } else {
                debug!(user_id = %user, "Exception pass incomplete, entrant kept");
            }
        } else {
            debug!(user_id = %user, "Candidate undecided, left in place");
        }
    }

    let present: HashSet<UserId> = members.iter().map(|m| m.user_id).collect();
    let mut departed: Vec<UserId> = entrants
        .union(&accepted)
        .filter(|u| !present.contains(u))
        .copied()
        .collect();
    departed.sort();
    report.departed = departed.len();
    for user in departed {
        if entrants.contains(&user) {
            batch.delete_entrants.push(user);
        }
        if accepted.contains(&user) {
            batch.delete_accepted.push(user);
        }
    }

    if !batch.is_empty() {
        ctx.store().apply_reconciliation(guild, &batch).await?;
    }
    info!(
        allowed = report.allowed,
        denied = report.denied,
        excepted = report.excepted,
        departed = report.departed,
        "Members reconciled"
    );
    Ok(Some(report))
}

/// Re-grant member roles to every human member past the gate.
///
/// With `accepted_only`, only members recorded as accepted are considered.
/// Returns how many members were given roles.
#[instrument(skip(ctx, config), fields(guild_id = %config.guild_id))]
pub async fn roles(
    ctx: &GatewayContext,
    config: &GuildGatewayConfig,
    accepted_only: bool,
) -> GatewayResult<Option<usize>> {
    let guild = config.guild_id;
    let guard = Guard::new(ctx, guild);
    if guard.permissions().await?.is_none() {
        return Ok(None);
    }
    let Some(blocking) = guard.blocking_role(config.blocking_role_id).await? else {
        return Ok(None);
    };
    let Some(member_roles) = guard.member_roles(&config.member_role_ids).await? else {
        return Ok(None);
    };
    if member_roles.is_empty() {
        debug!("No member roles configured");
        return Ok(Some(0));
    }
    let member_roles: Vec<RoleId> = member_roles.iter().map(|r| *r.id()).collect();

    let accepted: Option<HashSet<UserId>> = if accepted_only {
        Some(ctx.store().accepted_users(guild).await?.into_iter().collect())
    } else {
        None
    };

    let mut granted = 0;
    for member in ctx.platform().members(guild).await? {
        if member.bot || member.has_role(*blocking.id()) {
            continue;
        }
        if accepted.as_ref().is_some_and(|a| !a.contains(&member.user_id)) {
            continue;
        }
        let missing = member.missing_roles(&member_roles);
        if missing.is_empty() {
            continue;
        }
        let done = tolerate(
            ctx.platform()
                .add_roles(
                    guild,
                    member.user_id,
                    &missing,
                    "Member roles restored during synchronisation.",
                )
                .await,
            "grant member roles",
        )?;
        if done {
            granted += 1;
        }
    }

    info!(granted, accepted_only, "Member roles reconciled");
    Ok(Some(granted))
}

/// Clear gate reactions that no longer mean anything.
///
/// Reactions of users who left are removed, as are decline reactions of
/// accepted members. Returns how many reactions were removed.
#[instrument(skip(ctx, config), fields(guild_id = %config.guild_id))]
pub async fn reactions(
    ctx: &GatewayContext,
    config: &GuildGatewayConfig,
) -> GatewayResult<Option<usize>> {
    let guild = config.guild_id;
    let guard = Guard::new(ctx, guild);
    let Some(bot) = guard.permissions().await? else {
        return Ok(None);
    };
    let Some(gate) = guard
        .gate_message(config.rules_channel_id, config.gate_message_id)
        .await?
    else {
        return Ok(None);
    };

    let present: HashSet<UserId> = ctx
        .platform()
        .members(guild)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    let accepted: HashSet<UserId> = ctx.store().accepted_users(guild).await?.into_iter().collect();

    let mut removed = 0;
    for emoji in GateEmoji::iter() {
        let users = ctx
            .platform()
            .reaction_users(gate.channel_id, gate.message_id, emoji)
            .await?;
        for user in users.into_iter().filter(|u| *u != bot.user_id) {
            let stale = !present.contains(&user)
                || (emoji == GateEmoji::Decline && accepted.contains(&user));
            if !stale {
                continue;
            }
            let done = tolerate(
                ctx.platform()
                    .remove_reaction(gate.channel_id, gate.message_id, emoji, user)
                    .await,
                "remove stale reaction",
            )?;
            if done {
                removed += 1;
            }
        }
    }

    info!(removed, "Gate reactions reconciled");
    Ok(Some(removed))
}

/// Members, roles and reactions passes in that order.
pub async fn everything(
    ctx: &GatewayContext,
    config: &GuildGatewayConfig,
    watermark: DateTime<Utc>,
    roles_accepted_only: bool,
) -> GatewayResult<Option<EverythingReport>> {
    let Some(members) = members(ctx, config, watermark).await? else {
        return Ok(None);
    };
    let Some(roles_granted) = roles(ctx, config, roles_accepted_only).await? else {
        return Ok(None);
    };
    let Some(reactions_removed) = reactions(ctx, config).await? else {
        return Ok(None);
    };
    Ok(Some(EverythingReport {
        members,
        roles_granted,
        reactions_removed,
    }))
}

/// Startup reconciliation for one active guild.
///
/// Runs the members pass, then gives every remaining entrant a fresh
/// decision window starting at `now`.
#[instrument(skip(ctx, config), fields(guild_id = %config.guild_id))]
pub async fn boot(
    ctx: &GatewayContext,
    config: &GuildGatewayConfig,
    watermark: DateTime<Utc>,
    now: DateTime<Utc>,
) -> GatewayResult<Option<MembersReport>> {
    let Some(report) = members(ctx, config, watermark).await? else {
        return Ok(None);
    };
    let reset = ctx
        .store()
        .reset_entrant_timeouts(config.guild_id, now + config.timeout())
        .await?;
    info!(reset, "Entrant deadlines restarted");
    Ok(Some(report))
}
