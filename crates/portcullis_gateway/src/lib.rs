//! Rules-acceptance gate for Portcullis.
//!
//! New members are held behind a blocking role until they accept or decline
//! the rules by reacting to the gate message. This crate provides:
//! - **Guard**: precondition checks that trip the module when unmet
//! - **Reactor**: join, leave, role and reaction transitions
//! - **Reconciliation**: batch alignment of stored and live state
//! - **Sweeper**: kicks entrants whose decision window closed
//! - **Dispatcher**: one serialized actor per guild, fed by all of the above
//!
//! Platform and persistence access go through the traits in
//! `portcullis_interface`, bundled in a [`GatewayContext`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actor;
mod config;
mod context;
mod dispatcher;
mod guard;
mod notify;
mod operations;
mod reactor;
mod reconcile;
mod scheduler;
mod settings;
mod sweeper;
mod trip;

pub mod templates;

pub use actor::{GuildActor, GuildCommand, GuildHandle, SyncOutcome, SyncReport, SyncScope};
pub use config::{CommandSettings, DatabaseSettings, EmojiSpec, GatewaySettings, PortcullisConfig};
pub use context::{GateEmojis, GatewayContext, GatewayResult};
pub use dispatcher::Dispatcher;
pub use guard::{Gate, Guard};
pub use notify::LogChannelNotifier;
pub use operations::{
    AcceptedStatus, ActivationOutcome, DeactivationOutcome, activate, check_accepted, deactivate,
    reset_accepted,
};
pub use reactor::{GuildEvent, handle as handle_event};
pub use reconcile::{EverythingReport, MembersReport, boot, everything, members, reactions, roles};
pub use scheduler::{spawn_commit_scheduler, spawn_sweep_scheduler};
pub use settings::{
    GatewayAttribute, MAX_BOT_TEXT_CHARS, MAX_GATE_TEXT_CHARS, MAX_NOTICE_TEXT_CHARS,
    MAX_PREFIX_CHARS, MAX_TIMEOUT_MINUTES, Module, Setting, SystemAttribute, apply_setting,
    parse_channel, parse_role, parse_timeout, parse_user,
};
pub use sweeper::{SweepReport, kick_overdue};
pub use trip::trip;
