//! Repository trait for gateway persistence.
//!
//! Implementations can use PostgreSQL or in-memory structures. Every batch
//! method must be atomic: either all of its writes land or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{Entrant, GuildGatewayConfig, GuildId, MessageId, SystemConfig, UserId};
use portcullis_error::PortcullisResult;
use serde::{Deserialize, Serialize};

/// Writes produced by one members reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationBatch {
    /// Entrant rows to delete (reconciled or departed members)
    pub delete_entrants: Vec<UserId>,
    /// Accepted rows to delete (departed members)
    pub delete_accepted: Vec<UserId>,
    /// Accepted rows to insert, duplicates ignored
    pub insert_accepted: Vec<UserId>,
}

impl ReconciliationBatch {
    /// True when the pass found nothing to persist.
    pub fn is_empty(&self) -> bool {
        self.delete_entrants.is_empty()
            && self.delete_accepted.is_empty()
            && self.insert_accepted.is_empty()
    }
}

/// Persistence for the gateway module.
///
/// All methods are async to support pooled database drivers.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    // ------------------------------------------------------------------
    // Guild rows
    // ------------------------------------------------------------------

    /// Gateway configuration for a guild, if the guild is known.
    async fn gateway_config(&self, guild: GuildId) -> PortcullisResult<Option<GuildGatewayConfig>>;

    /// Every guild whose gateway module is active.
    async fn active_guilds(&self) -> PortcullisResult<Vec<GuildGatewayConfig>>;

    /// Create default rows for a guild; existing rows are left alone.
    async fn ensure_guild(&self, guild: GuildId) -> PortcullisResult<()>;

    /// Delete every row belonging to a guild.
    async fn remove_guild(&self, guild: GuildId) -> PortcullisResult<()>;

    /// Make the stored guild set equal to `present`.
    ///
    /// Missing guilds get default rows, guilds not in `present` are removed.
    async fn sync_guilds(&self, present: &[GuildId]) -> PortcullisResult<()>;

    /// Store a full gateway configuration record.
    async fn save_config(&self, config: &GuildGatewayConfig) -> PortcullisResult<()>;

    /// Record activation with its gate message, or deactivation with `None`.
    async fn set_activation(
        &self,
        guild: GuildId,
        gate_message: Option<MessageId>,
    ) -> PortcullisResult<()>;

    // ------------------------------------------------------------------
    // Entrants
    // ------------------------------------------------------------------

    /// The entrant row for a member, if any.
    async fn entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<Option<Entrant>>;

    /// Every entrant in a guild.
    async fn entrants(&self, guild: GuildId) -> PortcullisResult<Vec<Entrant>>;

    /// Insert an entrant, replacing the deadline if the row exists.
    async fn insert_entrant(&self, entrant: &Entrant) -> PortcullisResult<()>;

    /// Delete an entrant row. Returns whether a row existed.
    async fn delete_entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool>;

    /// Entrants across all guilds whose deadline is before `now`.
    async fn overdue_entrants(&self, now: DateTime<Utc>) -> PortcullisResult<Vec<Entrant>>;

    /// Move every entrant deadline in a guild to `at`. Returns rows touched.
    async fn reset_entrant_timeouts(
        &self,
        guild: GuildId,
        at: DateTime<Utc>,
    ) -> PortcullisResult<usize>;

    /// Delete all entrants and deactivate the module in one transaction.
    ///
    /// Returns the number of entrant rows removed.
    async fn trip_reset(&self, guild: GuildId) -> PortcullisResult<usize>;

    // ------------------------------------------------------------------
    // Accepted
    // ------------------------------------------------------------------

    /// Move a member from entrant to accepted in one transaction.
    ///
    /// Returns whether the accepted row is new. Accepting an already-accepted
    /// member is not an error and returns `false`.
    async fn accept(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool>;

    /// Delete an accepted row. Returns whether a row existed.
    async fn delete_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool>;

    /// Whether the member is recorded as accepted.
    async fn is_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool>;

    /// Every accepted member of a guild.
    async fn accepted_users(&self, guild: GuildId) -> PortcullisResult<Vec<UserId>>;

    /// Delete every accepted row of a guild. Returns rows removed.
    async fn reset_accepted(&self, guild: GuildId) -> PortcullisResult<usize>;

    /// Persist one reconciliation pass in a single transaction.
    async fn apply_reconciliation(
        &self,
        guild: GuildId,
        batch: &ReconciliationBatch,
    ) -> PortcullisResult<()>;

    // ------------------------------------------------------------------
    // Bot-wide and system settings
    // ------------------------------------------------------------------

    /// The reconciliation watermark, if one was ever recorded.
    async fn last_commit(&self) -> PortcullisResult<Option<DateTime<Utc>>>;

    /// Store the reconciliation watermark.
    async fn record_commit(&self, at: DateTime<Utc>) -> PortcullisResult<()>;

    /// System settings for a guild, defaults when no row exists.
    async fn system_config(&self, guild: GuildId) -> PortcullisResult<SystemConfig>;

    /// Store system settings for a guild.
    async fn save_system(&self, guild: GuildId, system: &SystemConfig) -> PortcullisResult<()>;
}
