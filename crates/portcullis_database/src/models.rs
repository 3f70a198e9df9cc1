//! Row types and conversions to domain records.

use crate::schema::{accepted, bot, entrants, gateway, system};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use portcullis_core::{
    ChannelId, Entrant, GuildGatewayConfig, GuildId, MessageId, RoleId, SystemConfig, UserId,
};

/// Row of the `gateway` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = gateway)]
#[diesel(primary_key(guild_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GatewayRow {
    pub guild_id: i64,
    pub active: bool,
    pub rules_channel_id: Option<i64>,
    pub gate_message_id: Option<i64>,
    pub blocking_role_id: Option<i64>,
    pub member_role_ids: Vec<i64>,
    pub exception_role_ids: Vec<i64>,
    pub welcome_channel_id: Option<i64>,
    pub goodbye_channel_id: Option<i64>,
    pub timeout_seconds: i32,
    pub gate_text: Option<String>,
    pub welcome_text: Option<String>,
    pub goodbye_text: Option<String>,
    pub welcome_bot_text: Option<String>,
    pub goodbye_bot_text: Option<String>,
}

impl From<&GuildGatewayConfig> for GatewayRow {
    fn from(config: &GuildGatewayConfig) -> Self {
        Self {
            guild_id: config.guild_id.to_db(),
            active: config.active,
            rules_channel_id: config.rules_channel_id.map(ChannelId::to_db),
            gate_message_id: config.gate_message_id.map(MessageId::to_db),
            blocking_role_id: config.blocking_role_id.map(RoleId::to_db),
            member_role_ids: config.member_role_ids.iter().map(|r| r.to_db()).collect(),
            exception_role_ids: config.exception_role_ids.iter().map(|r| r.to_db()).collect(),
            welcome_channel_id: config.welcome_channel_id.map(ChannelId::to_db),
            goodbye_channel_id: config.goodbye_channel_id.map(ChannelId::to_db),
            timeout_seconds: config.timeout_seconds,
            gate_text: config.gate_text.clone(),
            welcome_text: config.welcome_text.clone(),
            goodbye_text: config.goodbye_text.clone(),
            welcome_bot_text: config.welcome_bot_text.clone(),
            goodbye_bot_text: config.goodbye_bot_text.clone(),
        }
    }
}

impl From<GatewayRow> for GuildGatewayConfig {
    fn from(row: GatewayRow) -> Self {
        Self {
            guild_id: GuildId::from_db(row.guild_id),
            active: row.active,
            rules_channel_id: row.rules_channel_id.map(ChannelId::from_db),
            gate_message_id: row.gate_message_id.map(MessageId::from_db),
            blocking_role_id: row.blocking_role_id.map(RoleId::from_db),
            member_role_ids: row.member_role_ids.into_iter().map(RoleId::from_db).collect(),
            exception_role_ids: row
                .exception_role_ids
                .into_iter()
                .map(RoleId::from_db)
                .collect(),
            welcome_channel_id: row.welcome_channel_id.map(ChannelId::from_db),
            goodbye_channel_id: row.goodbye_channel_id.map(ChannelId::from_db),
            timeout_seconds: row.timeout_seconds,
            gate_text: row.gate_text,
            welcome_text: row.welcome_text,
            goodbye_text: row.goodbye_text,
            welcome_bot_text: row.welcome_bot_text,
            goodbye_bot_text: row.goodbye_bot_text,
        }
    }
}

/// Row of the `entrants` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = entrants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EntrantRow {
    pub guild_id: i64,
    pub user_id: i64,
    pub timeout_at: DateTime<Utc>,
}

impl From<&Entrant> for EntrantRow {
    fn from(entrant: &Entrant) -> Self {
        Self {
            guild_id: entrant.guild_id.to_db(),
            user_id: entrant.user_id.to_db(),
            timeout_at: entrant.timeout_at,
        }
    }
}

impl From<EntrantRow> for Entrant {
    fn from(row: EntrantRow) -> Self {
        Self {
            guild_id: GuildId::from_db(row.guild_id),
            user_id: UserId::from_db(row.user_id),
            timeout_at: row.timeout_at,
        }
    }
}

/// Row of the `accepted` table.
#[derive(Debug, Clone, Copy, Queryable, Selectable, Insertable)]
#[diesel(table_name = accepted)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AcceptedRow {
    pub guild_id: i64,
    pub user_id: i64,
}

impl AcceptedRow {
    pub fn new(guild: GuildId, user: UserId) -> Self {
        Self {
            guild_id: guild.to_db(),
            user_id: user.to_db(),
        }
    }
}

/// Row of the `bot` key/value table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = bot)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BotRow {
    pub key: String,
    pub value: String,
}

/// Row of the `system` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = system)]
#[diesel(primary_key(guild_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SystemRow {
    pub guild_id: i64,
    pub prefix: Option<String>,
    pub log_channel_id: Option<i64>,
}

impl SystemRow {
    pub fn new(guild: GuildId, system: &SystemConfig) -> Self {
        Self {
            guild_id: guild.to_db(),
            prefix: system.prefix.clone(),
            log_channel_id: system.log_channel_id.map(ChannelId::to_db),
        }
    }
}

impl From<SystemRow> for SystemConfig {
    fn from(row: SystemRow) -> Self {
        Self {
            prefix: row.prefix,
            log_channel_id: row.log_channel_id.map(ChannelId::from_db),
        }
    }
}
