//! Discord integration for Portcullis.
//!
//! This crate connects the gateway core to Discord through serenity:
//!
//! - **platform**: [`SerenityPlatform`], the `ChatPlatform` over the client
//!   cache and HTTP API
//! - **handler**: [`PortcullisHandler`], translating gateway events into
//!   dispatcher calls and running operator commands
//! - **commands**: prefix command parsing, cooldowns and replies
//! - **client**: [`PortcullisBot`], client construction and lifecycle

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod commands;
mod conversions;
mod handler;
mod platform;

pub use client::PortcullisBot;
pub use commands::{Command, Cooldown, Cooldowns, execute, sync_reply};
pub use conversions::{gate_emoji, member_info, platform_error, reaction_type};
pub use handler::PortcullisHandler;
pub use platform::SerenityPlatform;
