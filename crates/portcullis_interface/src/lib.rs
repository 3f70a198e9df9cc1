//! Trait definitions for Portcullis.
//!
//! The gateway core talks to the outside world only through the traits in
//! this crate:
//! - [`GatewayStore`] persists gateway configuration, entrants and acceptances.
//! - [`ChatPlatform`] reads and mutates live guild state.
//! - [`Notifier`] delivers operator notices.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod notifier;
mod platform;
mod store;

pub use notifier::Notifier;
pub use platform::{ChatPlatform, PlatformResult};
pub use store::{GatewayStore, ReconciliationBatch};
