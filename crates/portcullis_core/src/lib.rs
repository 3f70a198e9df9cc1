//! Core data structures for Portcullis.
//!
//! This crate provides the types shared by every layer of the bot:
//! - Snowflake identifiers (`GuildId`, `UserId`, `RoleId`, ...)
//! - Gateway module records (`GuildGatewayConfig`, `Entrant`, `SystemConfig`)
//! - Platform snapshots consumed by the gateway (`MemberInfo`, `RoleInfo`, ...)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod gateway;
mod ids;
mod platform;

pub use gateway::{
    DEFAULT_TIMEOUT_SECS, Entrant, GateEmoji, GuildGatewayConfig, MAX_EXCEPTION_ROLES,
    MAX_MEMBER_ROLES, SystemConfig,
};
pub use ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
pub use platform::{BotMember, ChannelInfo, GateMessage, GuildInfo, MemberInfo, RoleInfo};
