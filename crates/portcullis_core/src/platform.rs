//! Snapshots of platform state, as seen by the gateway.
//!
//! The platform implementation builds these from its cache or from REST
//! responses. They are plain values so the gateway never holds a cache
//! reference across an await point.

use crate::{ChannelId, GuildId, MessageId, RoleId, UserId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A guild member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// The member's user id
    pub user_id: UserId,
    /// Account username
    pub name: String,
    /// Nickname if set, otherwise the global display name
    pub display_name: String,
    /// Whether the account is a bot
    pub bot: bool,
    /// When the member joined this guild
    pub joined_at: Option<DateTime<Utc>>,
    /// Roles currently held
    pub roles: Vec<RoleId>,
}

impl MemberInfo {
    /// Whether the member currently holds `role`.
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Whether the member holds any of `roles`.
    pub fn has_any_role(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// Roles from `wanted` the member does not hold yet, in order.
    pub fn missing_roles(&self, wanted: &[RoleId]) -> Vec<RoleId> {
        wanted
            .iter()
            .copied()
            .filter(|r| !self.has_role(*r))
            .collect()
    }

    /// Whether the member joined strictly after `watermark`.
    ///
    /// A member with an unknown join time is treated as a new arrival.
    pub fn joined_after(&self, watermark: DateTime<Utc>) -> bool {
        self.joined_at.is_none_or(|at| at > watermark)
    }
}

/// A role and its place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RoleInfo {
    id: RoleId,
    name: String,
    position: u16,
}

impl RoleInfo {
    /// Create a role snapshot.
    pub fn new(id: RoleId, name: impl Into<String>, position: u16) -> Self {
        Self {
            id,
            name: name.into(),
            position,
        }
    }
}

/// A channel with the bot's effective permissions in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel id
    pub id: ChannelId,
    /// Bot can send messages here
    pub can_send: bool,
    /// Bot can delete others' messages and reactions here
    pub can_manage_messages: bool,
}

/// The bot's own standing in a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMember {
    /// The bot's user id
    pub user_id: UserId,
    /// Position of the bot's highest role (0 when it holds none)
    pub top_role_position: u16,
    /// Guild-level Manage Roles
    pub manage_roles: bool,
    /// Guild-level Kick Members
    pub kick_members: bool,
}

impl BotMember {
    /// Whether the bot can assign or remove `role`.
    pub fn outranks(&self, role: &RoleInfo) -> bool {
        *role.position() < self.top_role_position
    }
}

/// Guild facts used to render notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    /// Guild id
    pub id: GuildId,
    /// Guild name
    pub name: String,
    /// Total members, bots included
    pub member_count: u64,
    /// Members that are bots
    pub bot_count: u64,
}

impl GuildInfo {
    /// Members that are not bots.
    pub fn human_count(&self) -> u64 {
        self.member_count.saturating_sub(self.bot_count)
    }
}

/// A validated gate message location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateMessage {
    /// Rules channel
    pub channel_id: ChannelId,
    /// The message itself
    pub message_id: MessageId,
}
