//! Removal of entrants whose decision window has closed.

use crate::context::{GatewayContext, GatewayResult};
use crate::guard::Guard;
use crate::reactor::active_config;
use chrono::{DateTime, Utc};
use portcullis_core::{Entrant, GuildId};
use tracing::{debug, info, instrument, warn};

/// Outcome of one sweep of one guild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Members kicked
    pub kicked: usize,
    /// Stale entrant rows removed without a kick
    pub cleared: usize,
    /// Kicks the platform refused
    pub failed: usize,
}

/// Kick `overdue` entrants of `guild` that are still gated at `now`.
///
/// Each entrant is re-read and the member re-fetched right before the kick,
/// so a decision made after the sweep was scheduled wins. Kicked entrants
/// keep their row until the resulting leave event removes it. One failed
/// kick does not stop the others but triggers a permissions check
/// afterwards.
#[instrument(skip(ctx, overdue), fields(guild_id = %guild, count = overdue.len()))]
pub async fn kick_overdue(
    ctx: &GatewayContext,
    guild: GuildId,
    overdue: Vec<Entrant>,
    now: DateTime<Utc>,
) -> GatewayResult<SweepReport> {
    let mut report = SweepReport::default();
    let Some(config) = active_config(ctx, guild).await? else {
        debug!("Gateway inactive, sweep skipped");
        return Ok(report);
    };
    let guard = Guard::new(ctx, guild);
    let Some(blocking) = guard.blocking_role(config.blocking_role_id).await? else {
        return Ok(report);
    };
    let blocking = *blocking.id();

    for scheduled in overdue {
        let user = scheduled.user_id;
        let Some(current) = ctx.store().entrant(guild, user).await? else {
            debug!(user_id = %user, "Entrant decided before the sweep reached it");
            continue;
        };
        if !current.is_overdue(now) {
            continue;
        }

        let member = ctx.platform().member(guild, user).await?;
        let Some(member) = member.filter(|m| m.has_role(blocking)) else {
            ctx.store().delete_entrant(guild, user).await?;
            report.cleared += 1;
            debug!(user_id = %user, "Stale entrant row removed");
            continue;
        };

        match ctx
            .platform()
            .kick(
                guild,
                member.user_id,
                "Member failed to accept the server rules before being timed out.",
            )
            .await
        {
            Ok(()) => {
                report.kicked += 1;
                info!(user_id = %user, "Timed out entrant kicked");
            }
            Err(e) => {
                report.failed += 1;
                warn!(user_id = %user, error = %e, "Kick of timed out entrant failed");
            }
        }
    }

    if report.failed > 0 {
        guard.permissions().await?;
    }
    Ok(report)
}
