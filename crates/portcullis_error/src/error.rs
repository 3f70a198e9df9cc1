//! Top-level error wrapper types.

use crate::{CommandError, ConfigError, DatabaseError, GatewayError, PlatformError, SettingError};

/// Every error a Portcullis operation can produce.
///
/// # Examples
///
/// ```
/// use portcullis_error::{PortcullisError, ConfigError};
///
/// let err: PortcullisError = ConfigError::new("missing token").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum PortcullisErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Persistence error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Guild actor error
    #[from(GatewayError)]
    Gateway(GatewayError),
    /// Chat platform error
    #[from(PlatformError)]
    Platform(PlatformError),
    /// Rejected settings change
    #[from(SettingError)]
    Setting(SettingError),
    /// Refused operator command
    #[from(CommandError)]
    Command(CommandError),
}

/// Portcullis error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Portcullis Error: {}", _0)]
pub struct PortcullisError(Box<PortcullisErrorKind>);

impl PortcullisError {
    /// Create a new error from a kind.
    pub fn new(kind: PortcullisErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PortcullisErrorKind {
        &self.0
    }

    /// The platform error inside, if that is what this is.
    pub fn as_platform(&self) -> Option<&PlatformError> {
        match self.kind() {
            PortcullisErrorKind::Platform(e) => Some(e),
            _ => None,
        }
    }

    /// The command refusal inside, if that is what this is.
    pub fn as_command(&self) -> Option<&CommandError> {
        match self.kind() {
            PortcullisErrorKind::Command(e) => Some(e),
            _ => None,
        }
    }

    /// The settings rejection inside, if that is what this is.
    pub fn as_setting(&self) -> Option<&SettingError> {
        match self.kind() {
            PortcullisErrorKind::Setting(e) => Some(e),
            _ => None,
        }
    }
}

impl<T> From<T> for PortcullisError
where
    T: Into<PortcullisErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Portcullis operations.
pub type PortcullisResult<T> = std::result::Result<T, PortcullisError>;
