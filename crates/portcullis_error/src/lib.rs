//! Error types for Portcullis.
//!
//! This crate provides the foundation error types used throughout the Portcullis workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use portcullis_error::{PlatformError, PlatformErrorKind, PortcullisResult};
//!
//! fn fetch_gate_message() -> PortcullisResult<u64> {
//!     Err(PlatformError::new(PlatformErrorKind::NotFound("message 42".into())))?
//! }
//!
//! assert!(fetch_gate_message().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod config;
mod database;
mod error;
mod gateway;
mod platform;
mod setting;

pub use command::{CommandError, CommandErrorKind};
pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{PortcullisError, PortcullisErrorKind, PortcullisResult};
pub use gateway::{GatewayError, GatewayErrorKind};
pub use platform::{PlatformError, PlatformErrorKind};
pub use setting::{SettingError, SettingErrorKind};
