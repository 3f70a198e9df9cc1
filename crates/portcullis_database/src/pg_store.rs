//! PostgreSQL implementation of GatewayStore.

use crate::models::{AcceptedRow, BotRow, EntrantRow, GatewayRow, SystemRow};
use crate::schema::{accepted, bot, entrants, gateway, system};
use crate::{DatabaseResult, PgPool};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use portcullis_core::{Entrant, GuildGatewayConfig, GuildId, MessageId, SystemConfig, UserId};
use portcullis_error::{DatabaseError, DatabaseErrorKind, PortcullisResult};
use portcullis_interface::{GatewayStore, ReconciliationBatch};
use tracing::{debug, instrument};

/// Key of the reconciliation watermark in the `bot` table.
pub const LAST_COMMIT_KEY: &str = "last commit";

/// PostgreSQL implementation of [`GatewayStore`] using Diesel.
///
/// Diesel is synchronous, so every call checks a connection out of the r2d2
/// pool inside `spawn_blocking`.
///
/// # Example
/// ```no_run
/// use portcullis_database::{establish_pool, PgGatewayStore};
///
/// let pool = establish_pool("postgres://localhost/portcullis", 10)?;
/// let store = PgGatewayStore::new(pool);
/// # Ok::<(), portcullis_error::DatabaseError>(())
/// ```
#[derive(Clone)]
pub struct PgGatewayStore {
    pool: PgPool,
}

impl PgGatewayStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> PortcullisResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> DatabaseResult<T> {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Task(e.to_string())))?;
        Ok(result?)
    }
}

fn default_rows(guild: GuildId) -> (GatewayRow, SystemRow) {
    (
        GatewayRow::from(&GuildGatewayConfig::new(guild)),
        SystemRow::new(guild, &SystemConfig::default()),
    )
}

fn delete_guild_rows(conn: &mut PgConnection, guild: i64) -> DatabaseResult<()> {
    diesel::delete(entrants::table.filter(entrants::guild_id.eq(guild))).execute(conn)?;
    diesel::delete(accepted::table.filter(accepted::guild_id.eq(guild))).execute(conn)?;
    diesel::delete(gateway::table.find(guild)).execute(conn)?;
    diesel::delete(system::table.find(guild)).execute(conn)?;
    Ok(())
}

#[async_trait]
impl GatewayStore for PgGatewayStore {
    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn gateway_config(&self, guild: GuildId) -> PortcullisResult<Option<GuildGatewayConfig>> {
        self.run(move |conn| {
            let row = gateway::table
                .find(guild.to_db())
                .select(GatewayRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(GuildGatewayConfig::from))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn active_guilds(&self) -> PortcullisResult<Vec<GuildGatewayConfig>> {
        self.run(|conn| {
            let rows = gateway::table
                .filter(gateway::active.eq(true))
                .select(GatewayRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(GuildGatewayConfig::from).collect())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn ensure_guild(&self, guild: GuildId) -> PortcullisResult<()> {
        self.run(move |conn| {
            let (gateway_row, system_row) = default_rows(guild);
            conn.transaction::<_, DatabaseError, _>(|conn| {
                diesel::insert_into(gateway::table)
                    .values(&gateway_row)
                    .on_conflict(gateway::guild_id)
                    .do_nothing()
                    .execute(conn)?;
                diesel::insert_into(system::table)
                    .values(&system_row)
                    .on_conflict(system::guild_id)
                    .do_nothing()
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn remove_guild(&self, guild: GuildId) -> PortcullisResult<()> {
        self.run(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| delete_guild_rows(conn, guild.to_db()))
        })
        .await
    }

    #[instrument(skip(self, present), fields(guilds = present.len()))]
    async fn sync_guilds(&self, present: &[GuildId]) -> PortcullisResult<()> {
        let present = present.to_vec();
        self.run(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let (gateway_rows, system_rows): (Vec<_>, Vec<_>) =
                    present.iter().map(|g| default_rows(*g)).unzip();
                if !present.is_empty() {
                    diesel::insert_into(gateway::table)
                        .values(&gateway_rows)
                        .on_conflict(gateway::guild_id)
                        .do_nothing()
                        .execute(conn)?;
                    diesel::insert_into(system::table)
                        .values(&system_rows)
                        .on_conflict(system::guild_id)
                        .do_nothing()
                        .execute(conn)?;
                }

                let ids: Vec<i64> = present.iter().map(|g| g.to_db()).collect();
                let stale: Vec<i64> = gateway::table
                    .filter(gateway::guild_id.ne_all(ids))
                    .select(gateway::guild_id)
                    .load(conn)?;
                for guild in &stale {
                    delete_guild_rows(conn, *guild)?;
                }
                debug!(removed = stale.len(), "Synchronised guild rows");
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self, config), fields(guild_id = %config.guild_id))]
    async fn save_config(&self, config: &GuildGatewayConfig) -> PortcullisResult<()> {
        let row = GatewayRow::from(config);
        self.run(move |conn| {
            diesel::insert_into(gateway::table)
                .values(&row)
                .on_conflict(gateway::guild_id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn set_activation(
        &self,
        guild: GuildId,
        gate_message: Option<MessageId>,
    ) -> PortcullisResult<()> {
        self.run(move |conn| {
            diesel::update(gateway::table.find(guild.to_db()))
                .set((
                    gateway::active.eq(gate_message.is_some()),
                    gateway::gate_message_id.eq(gate_message.map(MessageId::to_db)),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild, user_id = %user))]
    async fn entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<Option<Entrant>> {
        self.run(move |conn| {
            let row = entrants::table
                .find((guild.to_db(), user.to_db()))
                .select(EntrantRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Entrant::from))
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn entrants(&self, guild: GuildId) -> PortcullisResult<Vec<Entrant>> {
        self.run(move |conn| {
            let rows = entrants::table
                .filter(entrants::guild_id.eq(guild.to_db()))
                .select(EntrantRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Entrant::from).collect())
        })
        .await
    }

    #[instrument(skip(self, entrant), fields(guild_id = %entrant.guild_id, user_id = %entrant.user_id))]
    async fn insert_entrant(&self, entrant: &Entrant) -> PortcullisResult<()> {
        let row = EntrantRow::from(entrant);
        self.run(move |conn| {
            diesel::insert_into(entrants::table)
                .values(&row)
                .on_conflict((entrants::guild_id, entrants::user_id))
                .do_update()
                .set(entrants::timeout_at.eq(row.timeout_at))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild, user_id = %user))]
    async fn delete_entrant(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        self.run(move |conn| {
            let deleted = diesel::delete(entrants::table.find((guild.to_db(), user.to_db())))
                .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn overdue_entrants(&self, now: DateTime<Utc>) -> PortcullisResult<Vec<Entrant>> {
        self.run(move |conn| {
            let rows = entrants::table
                .filter(entrants::timeout_at.lt(now))
                .order((entrants::guild_id, entrants::timeout_at))
                .select(EntrantRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Entrant::from).collect())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn reset_entrant_timeouts(
        &self,
        guild: GuildId,
        at: DateTime<Utc>,
    ) -> PortcullisResult<usize> {
        self.run(move |conn| {
            let updated = diesel::update(entrants::table.filter(entrants::guild_id.eq(guild.to_db())))
                .set(entrants::timeout_at.eq(at))
                .execute(conn)?;
            Ok(updated)
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn trip_reset(&self, guild: GuildId) -> PortcullisResult<usize> {
        self.run(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let cleared =
                    diesel::delete(entrants::table.filter(entrants::guild_id.eq(guild.to_db())))
                        .execute(conn)?;
                diesel::update(gateway::table.find(guild.to_db()))
                    .set((
                        gateway::active.eq(false),
                        gateway::gate_message_id.eq(None::<i64>),
                    ))
                    .execute(conn)?;
                Ok(cleared)
            })
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild, user_id = %user))]
    async fn accept(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        self.run(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                diesel::delete(entrants::table.find((guild.to_db(), user.to_db())))
                    .execute(conn)?;
                let inserted = diesel::insert_into(accepted::table)
                    .values(&AcceptedRow::new(guild, user))
                    .on_conflict_do_nothing()
                    .execute(conn)?;
                Ok(inserted > 0)
            })
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild, user_id = %user))]
    async fn delete_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        self.run(move |conn| {
            let deleted = diesel::delete(accepted::table.find((guild.to_db(), user.to_db())))
                .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild, user_id = %user))]
    async fn is_accepted(&self, guild: GuildId, user: UserId) -> PortcullisResult<bool> {
        self.run(move |conn| {
            let found = accepted::table
                .find((guild.to_db(), user.to_db()))
                .select(AcceptedRow::as_select())
                .first(conn)
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn accepted_users(&self, guild: GuildId) -> PortcullisResult<Vec<UserId>> {
        self.run(move |conn| {
            let ids: Vec<i64> = accepted::table
                .filter(accepted::guild_id.eq(guild.to_db()))
                .select(accepted::user_id)
                .load(conn)?;
            Ok(ids.into_iter().map(UserId::from_db).collect())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn reset_accepted(&self, guild: GuildId) -> PortcullisResult<usize> {
        self.run(move |conn| {
            let deleted = diesel::delete(accepted::table.filter(accepted::guild_id.eq(guild.to_db())))
                .execute(conn)?;
            Ok(deleted)
        })
        .await
    }

    #[instrument(
        skip(self, batch),
        fields(
            guild_id = %guild,
            delete_entrants = batch.delete_entrants.len(),
            delete_accepted = batch.delete_accepted.len(),
            insert_accepted = batch.insert_accepted.len(),
        )
    )]
    async fn apply_reconciliation(
        &self,
        guild: GuildId,
        batch: &ReconciliationBatch,
    ) -> PortcullisResult<()> {
        let batch = batch.clone();
        self.run(move |conn| {
            let g = guild.to_db();
            let to_i64 = |users: &[UserId]| users.iter().map(|u| u.to_db()).collect::<Vec<_>>();
            let delete_entrants = to_i64(&batch.delete_entrants);
            let delete_accepted = to_i64(&batch.delete_accepted);
            let insert_accepted: Vec<AcceptedRow> = batch
                .insert_accepted
                .iter()
                .map(|u| AcceptedRow::new(guild, *u))
                .collect();

            conn.transaction::<_, DatabaseError, _>(|conn| {
                diesel::delete(
                    entrants::table
                        .filter(entrants::guild_id.eq(g))
                        .filter(entrants::user_id.eq_any(&delete_entrants)),
                )
                .execute(conn)?;
                diesel::delete(
                    accepted::table
                        .filter(accepted::guild_id.eq(g))
                        .filter(accepted::user_id.eq_any(&delete_accepted)),
                )
                .execute(conn)?;
                if !insert_accepted.is_empty() {
                    diesel::insert_into(accepted::table)
                        .values(&insert_accepted)
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn last_commit(&self) -> PortcullisResult<Option<DateTime<Utc>>> {
        self.run(|conn| {
            let value: Option<String> = bot::table
                .find(LAST_COMMIT_KEY)
                .select(bot::value)
                .first(conn)
                .optional()?;
            value
                .map(|v| {
                    DateTime::parse_from_rfc3339(&v)
                        .map(|t| t.with_timezone(&Utc))
                        .map_err(|e| {
                            DatabaseError::new(DatabaseErrorKind::Corrupt {
                                table: "bot",
                                message: format!("{LAST_COMMIT_KEY}: {e}"),
                            })
                        })
                })
                .transpose()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn record_commit(&self, at: DateTime<Utc>) -> PortcullisResult<()> {
        let row = BotRow {
            key: LAST_COMMIT_KEY.to_string(),
            value: at.to_rfc3339(),
        };
        self.run(move |conn| {
            diesel::insert_into(bot::table)
                .values(&row)
                .on_conflict(bot::key)
                .do_update()
                .set(bot::value.eq(&row.value))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(guild_id = %guild))]
    async fn system_config(&self, guild: GuildId) -> PortcullisResult<SystemConfig> {
        self.run(move |conn| {
            let row = system::table
                .find(guild.to_db())
                .select(SystemRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(SystemConfig::from).unwrap_or_default())
        })
        .await
    }

    #[instrument(skip(self, system_config), fields(guild_id = %guild))]
    async fn save_system(
        &self,
        guild: GuildId,
        system_config: &SystemConfig,
    ) -> PortcullisResult<()> {
        let row = SystemRow::new(guild, system_config);
        self.run(move |conn| {
            diesel::insert_into(system::table)
                .values(&row)
                .on_conflict(system::guild_id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}
