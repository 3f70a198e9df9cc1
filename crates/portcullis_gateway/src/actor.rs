//! Per-guild serialized executor.
//!
//! Every state-changing operation for a guild is a [`GuildCommand`] on that
//! guild's queue. The actor handles them one at a time, so a trip, a kick
//! and a reaction for the same guild never interleave.

use crate::context::{GatewayContext, GatewayResult};
use crate::operations::{self, AcceptedStatus, ActivationOutcome, DeactivationOutcome};
use crate::reactor::{self, GuildEvent, active_config};
use crate::reconcile::{self, EverythingReport, MembersReport};
use crate::settings::{self, Setting};
use crate::sweeper::{self, SweepReport};
use chrono::{DateTime, Utc};
use portcullis_core::{Entrant, GuildId, UserId};
use portcullis_error::{GatewayError, GatewayErrorKind};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument};

/// Which reconciliation to run on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Settle gate decisions
    Members,
    /// Re-grant member roles
    Roles {
        /// Only members recorded as accepted
        accepted_only: bool,
    },
    /// Clear stale reactions
    Reactions,
    /// All three, in order
    Everything {
        /// Roles pass only for accepted members
        roles_accepted_only: bool,
    },
}

/// What an on-demand reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    /// Members pass
    Members(MembersReport),
    /// Members given roles
    Roles(usize),
    /// Reactions removed
    Reactions(usize),
    /// Full pass
    Everything(EverythingReport),
}

/// Result of an on-demand reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran to completion.
    Completed(SyncReport),
    /// The module is not active.
    Inactive,
    /// A guard check tripped the module.
    Tripped,
}

type Reply<T> = oneshot::Sender<GatewayResult<T>>;

/// Messages handled by a guild actor.
#[derive(Debug)]
pub enum GuildCommand {
    /// A live event
    Event(GuildEvent),
    /// Startup reconciliation
    Boot {
        /// Last committed watermark
        watermark: DateTime<Utc>,
        /// Start of the fresh decision windows
        now: DateTime<Utc>,
    },
    /// Overdue entrants found by the sweeper
    Timeout {
        /// Entrants to consider
        entrants: Vec<Entrant>,
        /// Sweep time
        now: DateTime<Utc>,
    },
    /// Operator-requested reconciliation
    Synchronise {
        /// Which routines
        scope: SyncScope,
        /// Join time before which members are settled
        watermark: DateTime<Utc>,
        /// Where the outcome goes
        reply: Reply<SyncOutcome>,
    },
    /// Post the gate message
    Activate {
        /// Where the outcome goes
        reply: Reply<ActivationOutcome>,
    },
    /// Take the gate down
    Deactivate {
        /// Where the outcome goes
        reply: Reply<DeactivationOutcome>,
    },
    /// Change a setting
    ApplySetting {
        /// Which setting
        setting: Setting,
        /// Raw arguments
        values: Vec<String>,
        /// Where the confirmation goes
        reply: Reply<String>,
    },
    /// Forget every acceptance
    ResetAccepted {
        /// Where the removed count goes
        reply: Reply<usize>,
    },
    /// Query acceptance
    CheckAccepted {
        /// One user, or the whole guild
        user: Option<UserId>,
        /// Where the status goes
        reply: Reply<AcceptedStatus>,
    },
    /// Stop the actor
    Shutdown,
}

/// Owns one guild's queue.
pub struct GuildActor {
    ctx: GatewayContext,
    guild: GuildId,
    rx: mpsc::Receiver<GuildCommand>,
}

fn respond<T>(reply: Reply<T>, result: GatewayResult<T>) {
    if reply.send(result).is_err() {
        debug!("Requester went away before the reply");
    }
}

impl GuildActor {
    /// Creates a new actor.
    pub fn new(ctx: GatewayContext, guild: GuildId, rx: mpsc::Receiver<GuildCommand>) -> Self {
        Self { ctx, guild, rx }
    }

    /// Runs the actor loop until the queue closes or `Shutdown` arrives.
    #[instrument(skip(self), fields(guild_id = %self.guild))]
    pub async fn run(mut self) {
        debug!("Guild actor started");

        while let Some(command) = self.rx.recv().await {
            match command {
                GuildCommand::Event(event) => {
                    if let Err(e) = reactor::handle(&self.ctx, self.guild, event).await {
                        error!(error = ?e, "Event handling failed");
                    }
                }
                GuildCommand::Boot { watermark, now } => {
                    if let Err(e) = self.boot(watermark, now).await {
                        error!(error = ?e, "Boot reconciliation failed");
                    }
                }
                GuildCommand::Timeout { entrants, now } => {
                    match sweeper::kick_overdue(&self.ctx, self.guild, entrants, now).await {
                        Ok(SweepReport {
                            kicked,
                            cleared,
                            failed,
                        }) if kicked + cleared + failed > 0 => {
                            info!(kicked, cleared, failed, "Timeout sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = ?e, "Timeout sweep failed"),
                    }
                }
                GuildCommand::Synchronise {
                    scope,
                    watermark,
                    reply,
                } => respond(reply, self.synchronise(scope, watermark).await),
                GuildCommand::Activate { reply } => {
                    respond(reply, operations::activate(&self.ctx, self.guild).await)
                }
                GuildCommand::Deactivate { reply } => {
                    respond(reply, operations::deactivate(&self.ctx, self.guild).await)
                }
                GuildCommand::ApplySetting {
                    setting,
                    values,
                    reply,
                } => respond(
                    reply,
                    settings::apply_setting(&self.ctx, self.guild, setting, &values).await,
                ),
                GuildCommand::ResetAccepted { reply } => {
                    respond(reply, operations::reset_accepted(&self.ctx, self.guild).await)
                }
                GuildCommand::CheckAccepted { user, reply } => respond(
                    reply,
                    operations::check_accepted(&self.ctx, self.guild, user).await,
                ),
                GuildCommand::Shutdown => {
                    debug!("Guild actor shutting down");
                    break;
                }
            }
        }
    }

    async fn boot(&self, watermark: DateTime<Utc>, now: DateTime<Utc>) -> GatewayResult<()> {
        let Some(config) = active_config(&self.ctx, self.guild).await? else {
            debug!("Gateway inactive, boot reconciliation skipped");
            return Ok(());
        };
        reconcile::boot(&self.ctx, &config, watermark, now).await?;
        Ok(())
    }

    async fn synchronise(
        &self,
        scope: SyncScope,
        watermark: DateTime<Utc>,
    ) -> GatewayResult<SyncOutcome> {
        let Some(config) = active_config(&self.ctx, self.guild).await? else {
            return Ok(SyncOutcome::Inactive);
        };
        let ctx = &self.ctx;
        let report = match scope {
            SyncScope::Members => reconcile::members(ctx, &config, watermark)
                .await?
                .map(SyncReport::Members),
            SyncScope::Roles { accepted_only } => reconcile::roles(ctx, &config, accepted_only)
                .await?
                .map(SyncReport::Roles),
            SyncScope::Reactions => reconcile::reactions(ctx, &config)
                .await?
                .map(SyncReport::Reactions),
            SyncScope::Everything {
                roles_accepted_only,
            } => reconcile::everything(ctx, &config, watermark, roles_accepted_only)
                .await?
                .map(SyncReport::Everything),
        };
        Ok(report.map_or(SyncOutcome::Tripped, SyncOutcome::Completed))
    }
}

/// Sending side of a guild actor.
#[derive(Debug, Clone)]
pub struct GuildHandle {
    guild: GuildId,
    tx: mpsc::Sender<GuildCommand>,
}

impl GuildHandle {
    /// Spawn an actor for `guild` with a queue of `capacity` commands.
    pub fn spawn(ctx: GatewayContext, guild: GuildId, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let actor = GuildActor::new(ctx, guild, rx);
        tokio::spawn(async move {
            actor.run().await;
        });
        Self { guild, tx }
    }

    /// The guild this handle feeds.
    pub fn guild(&self) -> GuildId {
        self.guild
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a command without waiting for it to run.
    pub async fn send(&self, command: GuildCommand) -> GatewayResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| GatewayError::new(GatewayErrorKind::ActorStopped(self.guild.get())).into())
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> GuildCommand) -> GatewayResult<T> {
        let (reply, answer) = oneshot::channel();
        self.send(command(reply)).await?;
        answer
            .await
            .map_err(|_| GatewayError::new(GatewayErrorKind::NoReply(self.guild.get())))?
    }

    /// Queue a live event.
    pub async fn event(&self, event: GuildEvent) -> GatewayResult<()> {
        self.send(GuildCommand::Event(event)).await
    }

    /// Queue the startup reconciliation.
    pub async fn boot(&self, watermark: DateTime<Utc>, now: DateTime<Utc>) -> GatewayResult<()> {
        self.send(GuildCommand::Boot { watermark, now }).await
    }

    /// Queue overdue entrants for kicking.
    pub async fn timeout(&self, entrants: Vec<Entrant>, now: DateTime<Utc>) -> GatewayResult<()> {
        self.send(GuildCommand::Timeout { entrants, now }).await
    }

    /// Run a reconciliation and wait for the outcome.
    pub async fn synchronise(
        &self,
        scope: SyncScope,
        watermark: DateTime<Utc>,
    ) -> GatewayResult<SyncOutcome> {
        self.request(|reply| GuildCommand::Synchronise {
            scope,
            watermark,
            reply,
        })
        .await
    }

    /// Activate the module and wait for the outcome.
    pub async fn activate(&self) -> GatewayResult<ActivationOutcome> {
        self.request(|reply| GuildCommand::Activate { reply }).await
    }

    /// Deactivate the module and wait for the outcome.
    pub async fn deactivate(&self) -> GatewayResult<DeactivationOutcome> {
        self.request(|reply| GuildCommand::Deactivate { reply }).await
    }

    /// Change a setting and wait for the confirmation.
    pub async fn apply_setting(&self, setting: Setting, values: Vec<String>) -> GatewayResult<String> {
        self.request(|reply| GuildCommand::ApplySetting {
            setting,
            values,
            reply,
        })
        .await
    }

    /// Forget every acceptance and wait for the removed count.
    pub async fn reset_accepted(&self) -> GatewayResult<usize> {
        self.request(|reply| GuildCommand::ResetAccepted { reply }).await
    }

    /// Query acceptance.
    pub async fn check_accepted(&self, user: Option<UserId>) -> GatewayResult<AcceptedStatus> {
        self.request(|reply| GuildCommand::CheckAccepted { user, reply })
            .await
    }

    /// Ask the actor to stop after the queued commands.
    pub async fn shutdown(&self) -> GatewayResult<()> {
        self.send(GuildCommand::Shutdown).await
    }
}
