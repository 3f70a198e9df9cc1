//! In-memory implementation of GatewayStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{Entrant, GuildGatewayConfig, GuildId, MessageId, SystemConfig, UserId};
use portcullis_error::PortcullisResult;
use portcullis_interface::{GatewayStore, ReconciliationBatch};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    gateways: HashMap<GuildId, GuildGatewayConfig>,
    systems: HashMap<GuildId, SystemConfig>,
    entrants: BTreeMap<(GuildId, UserId), Entrant>,
    accepted: BTreeSet<(GuildId, UserId)>,
    last_commit: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn remove_guild(&mut self, guild: GuildId) {
        self.gateways.remove(&guild);
        self.systems.remove(&guild);
        self.entrants.retain(|(g, _), _| *g != guild);
        self.accepted.retain(|(g, _)| *g != guild);
    }
}

/// Process-local [`GatewayStore`].
///
/// Every method takes one lock for its whole body, which gives the batch
/// methods the same all-or-nothing behaviour as a database transaction.
/// Used by tests and for running the bot without PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryGatewayStore {
    state: Mutex<MemoryState>,
}

impl MemoryGatewayStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GatewayStore for MemoryGatewayStore {
    async fn gateway_config(&self, guild: GuildId) -> PortcullisResult<Option<GuildGatewayConfig>> {
        Ok(self.state.lock().await.gateways.get(&guild).cloned())
    }

    async fn active_guilds(&self) -> PortcullisResult<Vec<GuildGatewayConfig>> {
        let state = self.state.lock().await;
        let mut active: Vec<_> = state.gateways.values().filter(|c| c.active).cloned().collect();
        active.sort_by_key(|c| c.guild_id);
        Ok(active)
    }

    async fn ensure_guild(&self, guild: GuildId) -> PortcullisResult<()> {
        let mut state = self.state.lock().await;
        state
            .gateways
            .entry(guild)
            .or_insert_with(|| GuildGatewayConfig::new(guild));
        state.systems.entry(guild).or_default();
        Ok(())
    }

    async fn remove_guild(&self, guild: GuildId) -> PortcullisResult<()> {
        self.state.lock().await.remove_guild(guild);
        Ok(())
    }

    async fn sync_guilds(&self, present: &[GuildId]) -> PortcullisResult<()> {
        let mut state = self.state.lock().await;
        for guild in present {
            state
                .gateways
                .entry(*guild)
                .or_insert_with(|| GuildGatewayConfig::new(*guild));
            state.systems.entry(*guild).or_default();
        }
        let stale: Vec<GuildId> = state
            .gateways
            .keys()
            .filter(|g| !present.contains(g))
            .copied()
            .collect();
        for guild in stale {
            state.remove_guild(guild);
        }
        Ok(())
    }

    async fn save_config(&self, config: &GuildGatewayConfig) -> PortcullisResult<()> {
        self.state
            .lock()
            .await
            .gateways
            .insert(config.guild_id, config.clone());
        Ok(())
    }

    async fn set_activation(
        &self,
        guild: GuildId,
        gate_message: Option<MessageId>,
    ) -> PortcullisResult<()> {
        if let Some(config) = self.state.lock().await.gateways.get_mut(&guild) {
            config.active = gate_message.is_some();
            config.gate_message_id = gate_message;
        }
        Ok(())
    }

    async fn entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<Option<Entrant>> {
        Ok(self.state.lock().await.entrants.get(&(guild, user)).cloned())
    }

    async fn entrants(&self, guild: GuildId) -> PortcullisResult<Vec<Entrant>> {
        let state = self.state.lock().await;
        Ok(state
            .entrants
            .values()
            .filter(|e| e.guild_id == guild)
            .cloned()
            .collect())
    }

    async fn insert_entrant(&self, entrant: &Entrant) -> PortcullisResult<()> {
        self.state
            .lock()
            .await
            .entrants
            .insert((entrant.guild_id, entrant.user_id), entrant.clone());
        Ok(())
    }

    async fn delete_entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .entrants
            .remove(&(guild, user))
            .is_some())
    }

    async fn overdue_entrants(&self, now: DateTime<Utc>) -> PortcullisResult<Vec<Entrant>> {
        let state = self.state.lock().await;
        let mut overdue: Vec<Entrant> = state
            .entrants
            .values()
            .filter(|e| e.timeout_at < now)
            .cloned()
            .collect();
        overdue.sort_by_key(|e| (e.guild_id, e.timeout_at));
        Ok(overdue)
    }

    async fn reset_entrant_timeouts(
        &self,
        guild: GuildId,
        at: DateTime<Utc>,
    ) -> PortcullisResult<usize> {
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for entrant in state.entrants.values_mut().filter(|e| e.guild_id == guild) {
            entrant.timeout_at = at;
            touched += 1;
        }
        Ok(touched)
    }

    async fn trip_reset(&self, guild: GuildId) -> PortcullisResult<usize> {
        let mut state = self.state.lock().await;
        let before = state.entrants.len();
        state.entrants.retain(|(g, _), _| *g != guild);
        let cleared = before - state.entrants.len();
        if let Some(config) = state.gateways.get_mut(&guild) {
            config.active = false;
            config.gate_message_id = None;
        }
        Ok(cleared)
    }

    async fn accept(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        let mut state = self.state.lock().await;
        state.entrants.remove(&(guild, user));
        Ok(state.accepted.insert((guild, user)))
    }

    async fn delete_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        Ok(self.state.lock().await.accepted.remove(&(guild, user)))
    }

    async fn is_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        Ok(self.state.lock().await.accepted.contains(&(guild, user)))
    }

    async fn accepted_users(&self, guild: GuildId) -> PortcullisResult<Vec<UserId>> {
        let state = self.state.lock().await;
        Ok(state
            .accepted
            .iter()
            .filter(|(g, _)| *g == guild)
            .map(|(_, u)| *u)
            .collect())
    }

    async fn reset_accepted(&self, guild: GuildId) -> PortcullisResult<usize> {
        let mut state = self.state.lock().await;
        let before = state.accepted.len();
        state.accepted.retain(|(g, _)| *g != guild);
        Ok(before - state.accepted.len())
    }

    async fn apply_reconciliation(
        &self,
        guild: GuildId,
        batch: &ReconciliationBatch,
    ) -> PortcullisResult<()> {
        let mut state = self.state.lock().await;
        for user in &batch.delete_entrants {
            state.entrants.remove(&(guild, *user));
        }
        for user in &batch.delete_accepted {
            state.accepted.remove(&(guild, *user));
        }
        for user in &batch.insert_accepted {
            state.accepted.insert((guild, *user));
        }
        Ok(())
    }

    async fn last_commit(&self) -> PortcullisResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.last_commit)
    }

    async fn record_commit(&self, at: DateTime<Utc>) -> PortcullisResult<()> {
        self.state.lock().await.last_commit = Some(at);
        Ok(())
    }

    async fn system_config(&self, guild: GuildId) -> PortcullisResult<SystemConfig> {
        Ok(self
            .state
            .lock()
            .await
            .systems
            .get(&guild)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_system(&self, guild: GuildId, system: &SystemConfig) -> PortcullisResult<()> {
        self.state
            .lock()
            .await
            .systems
            .insert(guild, system.clone());
        Ok(())
    }
}
