//! Routing of events, sweeps and commands to guild actors.

use crate::actor::{GuildHandle, SyncOutcome, SyncScope};
use crate::context::{GatewayContext, GatewayResult};
use crate::reactor::GuildEvent;
use chrono::{DateTime, Utc};
use portcullis_core::{Entrant, GuildId};
use portcullis_error::{GatewayError, GatewayErrorKind};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[derive(Default)]
struct DispatchState {
    watermark: Option<DateTime<Utc>>,
    actors: HashMap<GuildId, GuildHandle>,
    buffered: Vec<(GuildId, GuildEvent)>,
}

impl DispatchState {
    fn handle(&mut self, ctx: &GatewayContext, capacity: usize, guild: GuildId) -> GuildHandle {
        if let Some(handle) = self.actors.get(&guild).filter(|h| !h.is_closed()) {
            return handle.clone();
        }
        debug!(guild_id = %guild, "Spawning guild actor");
        let handle = GuildHandle::spawn(ctx.clone(), guild, capacity);
        self.actors.insert(guild, handle.clone());
        handle
    }
}

/// Owns the guild actors.
///
/// Events that arrive before [`Dispatcher::boot`] are held back and replayed
/// after each active guild's boot reconciliation has been queued.
pub struct Dispatcher {
    ctx: GatewayContext,
    capacity: usize,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    /// A dispatcher whose actors queue up to `capacity` commands each.
    pub fn new(ctx: GatewayContext, capacity: usize) -> Self {
        Self {
            ctx,
            capacity,
            state: Mutex::new(DispatchState::default()),
        }
    }

    /// Shared collaborators.
    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    /// Watermark used at boot, once booted.
    pub async fn watermark(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.watermark
    }

    /// Synchronise stored guilds, queue boot reconciliation for every active
    /// guild, then replay held-back events.
    ///
    /// A second call is a no-op.
    #[instrument(skip(self))]
    pub async fn boot(&self, watermark: DateTime<Utc>, now: DateTime<Utc>) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        if state.watermark.is_some() {
            debug!("Already booted");
            return Ok(());
        }

        let present = self.ctx.platform().guild_ids().await?;
        self.ctx.store().sync_guilds(&present).await?;

        let active = self.ctx.store().active_guilds().await?;
        for config in &active {
            state
                .handle(&self.ctx, self.capacity, config.guild_id)
                .boot(watermark, now)
                .await?;
        }

        let buffered = std::mem::take(&mut state.buffered);
        let replayed = buffered.len();
        // Replayed under the lock so no live event overtakes a held one.
        for (guild, event) in buffered {
            let (handle, leaving) =
                Self::claim(&mut state, &self.ctx, self.capacity, guild, &event);
            Self::deliver(handle, event, leaving).await?;
        }

        state.watermark = Some(watermark);
        info!(
            guilds = present.len(),
            active = active.len(),
            replayed,
            "Gateway booted"
        );
        Ok(())
    }

    /// Look up the actor for an event, retiring it from the table when the
    /// event is the bot leaving the guild.
    fn claim(
        state: &mut DispatchState,
        ctx: &GatewayContext,
        capacity: usize,
        guild: GuildId,
        event: &GuildEvent,
    ) -> (GuildHandle, bool) {
        let handle = state.handle(ctx, capacity, guild);
        let leaving = matches!(event, GuildEvent::GuildLeft);
        if leaving {
            state.actors.remove(&guild);
        }
        (handle, leaving)
    }

    async fn deliver(handle: GuildHandle, event: GuildEvent, leaving: bool) -> GatewayResult<()> {
        handle.event(event).await?;
        if leaving {
            handle.shutdown().await?;
            debug!(guild_id = %handle.guild(), "Guild actor retired");
        }
        Ok(())
    }

    /// Hand an event to its guild's actor, or hold it until boot.
    ///
    /// The routing table is released before queueing, so a full queue only
    /// holds up its own guild.
    pub async fn dispatch(&self, guild: GuildId, event: GuildEvent) -> GatewayResult<()> {
        let (handle, leaving) = {
            let mut state = self.state.lock().await;
            if state.watermark.is_none() {
                debug!(guild_id = %guild, event = event.as_ref(), "Holding event until boot");
                state.buffered.push((guild, event));
                return Ok(());
            }
            Self::claim(&mut state, &self.ctx, self.capacity, guild, &event)
        };
        Self::deliver(handle, event, leaving).await
    }

    /// Queue every overdue entrant with its guild's actor.
    ///
    /// Returns how many entrants were queued.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> GatewayResult<usize> {
        if self.state.lock().await.watermark.is_none() {
            return Ok(0);
        }

        let mut by_guild: BTreeMap<GuildId, Vec<Entrant>> = BTreeMap::new();
        for entrant in self.ctx.store().overdue_entrants(now).await? {
            by_guild.entry(entrant.guild_id).or_default().push(entrant);
        }

        let handles: Vec<(GuildHandle, Vec<Entrant>)> = {
            let mut state = self.state.lock().await;
            by_guild
                .into_iter()
                .map(|(guild, entrants)| (state.handle(&self.ctx, self.capacity, guild), entrants))
                .collect()
        };

        let mut queued = 0;
        for (handle, entrants) in handles {
            queued += entrants.len();
            handle.timeout(entrants, now).await?;
        }
        if queued > 0 {
            debug!(queued, "Overdue entrants queued");
        }
        Ok(queued)
    }

    /// The actor for `guild`, for operator commands.
    pub async fn guild(&self, guild: GuildId) -> GatewayResult<GuildHandle> {
        let mut state = self.state.lock().await;
        if state.watermark.is_none() {
            return Err(GatewayError::new(GatewayErrorKind::NotBooted).into());
        }
        Ok(state.handle(&self.ctx, self.capacity, guild))
    }

    /// Run an on-demand reconciliation against the boot watermark.
    pub async fn synchronise(&self, guild: GuildId, scope: SyncScope) -> GatewayResult<SyncOutcome> {
        let watermark = self
            .watermark()
            .await
            .ok_or_else(|| GatewayError::new(GatewayErrorKind::NotBooted))?;
        self.guild(guild).await?.synchronise(scope, watermark).await
    }
}
