//! Gateway module records.

use crate::{ChannelId, GuildId, MessageId, RoleId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds a new member has to react before being kicked, unless configured.
pub const DEFAULT_TIMEOUT_SECS: i32 = 300;

/// Maximum number of member roles a guild may configure.
pub const MAX_MEMBER_ROLES: usize = 3;

/// Maximum number of exception roles a guild may configure.
pub const MAX_EXCEPTION_ROLES: usize = 3;

/// The two reactions carried by the gate message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum GateEmoji {
    /// The member accepts the rules.
    Accept,
    /// The member declines the rules and is removed.
    Decline,
}

/// Gateway module configuration for one guild.
///
/// `rules_channel_id` and `blocking_role_id` are optional only because the
/// row exists before the guild has configured them. The guard treats a
/// missing value the same as a deleted channel or role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildGatewayConfig {
    /// Owning guild
    pub guild_id: GuildId,
    /// Whether the gate is enforced
    pub active: bool,
    /// Channel holding the rules and the gate message
    pub rules_channel_id: Option<ChannelId>,
    /// The gate message, present while active
    pub gate_message_id: Option<MessageId>,
    /// Role granted on join and removed on acceptance
    pub blocking_role_id: Option<RoleId>,
    /// Roles granted on acceptance, in configured order
    pub member_role_ids: Vec<RoleId>,
    /// Roles that pass the gate when granted externally
    pub exception_role_ids: Vec<RoleId>,
    /// Where welcome notices go
    pub welcome_channel_id: Option<ChannelId>,
    /// Where goodbye notices go
    pub goodbye_channel_id: Option<ChannelId>,
    /// Seconds a new member has to decide
    pub timeout_seconds: i32,
    /// Gate message text override
    pub gate_text: Option<String>,
    /// Welcome notice override
    pub welcome_text: Option<String>,
    /// Goodbye notice override
    pub goodbye_text: Option<String>,
    /// Bot welcome notice override
    pub welcome_bot_text: Option<String>,
    /// Bot goodbye notice override
    pub goodbye_bot_text: Option<String>,
}

impl GuildGatewayConfig {
    /// An inactive, unconfigured record, as created when the bot joins a guild.
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            active: false,
            rules_channel_id: None,
            gate_message_id: None,
            blocking_role_id: None,
            member_role_ids: Vec::new(),
            exception_role_ids: Vec::new(),
            welcome_channel_id: None,
            goodbye_channel_id: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            gate_text: None,
            welcome_text: None,
            goodbye_text: None,
            welcome_bot_text: None,
            goodbye_bot_text: None,
        }
    }

    /// Decision window granted to a new entrant.
    pub fn timeout(&self) -> Duration {
        Duration::seconds(i64::from(self.timeout_seconds.max(1)))
    }

    /// Whether `role` is one of the configured exception roles.
    pub fn is_exception_role(&self, role: RoleId) -> bool {
        self.exception_role_ids.contains(&role)
    }
}

/// A member currently held at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    /// Guild the member is waiting in
    pub guild_id: GuildId,
    /// The waiting member
    pub user_id: UserId,
    /// When the member is kicked if still undecided
    pub timeout_at: DateTime<Utc>,
}

impl Entrant {
    /// Whether the decision window has closed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.timeout_at
    }
}

/// Guild-wide bot settings outside the gateway module.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Command prefix override
    pub prefix: Option<String>,
    /// Where operator notices go
    pub log_channel_id: Option<ChannelId>,
}
