//! Safety shutdown of the gateway module.

use crate::context::{GatewayContext, GatewayResult};
use crate::templates;
use portcullis_core::GuildId;
use tracing::{debug, info, instrument, warn};

/// Shut the gateway module down for `guild` and tell the operators why.
///
/// Must only run inside the guild's actor.
#[instrument(skip(ctx), fields(guild_id = %guild))]
pub async fn trip(ctx: &GatewayContext, guild: GuildId, reason: &str) -> GatewayResult<()> {
    warn!(reason, "Gateway module tripped");

    if teardown(ctx, guild).await? {
        ctx.notifier()
            .notify(guild, "The gate message was deleted.")
            .await?;
    }
    ctx.notifier()
        .notify(guild, &templates::trip(reason))
        .await
}

/// Delete the gate message if possible, then clear entrants and deactivate.
///
/// Returns whether the gate message was deleted.
pub(crate) async fn teardown(ctx: &GatewayContext, guild: GuildId) -> GatewayResult<bool> {
    let config = ctx.store().gateway_config(guild).await?;

    let mut deleted = false;
    if let Some((channel, message)) = config.and_then(|c| c.rules_channel_id.zip(c.gate_message_id))
    {
        match ctx.platform().delete_message(channel, message).await {
            Ok(()) => deleted = true,
            Err(e) if e.is_benign() => debug!(error = %e, "Gate message already unreachable"),
            Err(e) => warn!(error = %e, "Gate message not deleted"),
        }
    }

    let cleared = ctx.store().trip_reset(guild).await?;
    info!(cleared, deleted, "Gateway module torn down");
    Ok(deleted)
}
