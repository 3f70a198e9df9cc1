//! Settings registry error types.

/// Reasons a guild setting change is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SettingErrorKind {
    /// Unknown module or attribute name.
    #[display("Unknown setting: {}", _0)]
    Unknown(String),
    /// Value could not be parsed for this attribute.
    #[display("Invalid value for {}: {}", setting, reason)]
    InvalidValue {
        /// Setting being changed
        setting: String,
        /// Why the value was rejected
        reason: String,
    },
    /// Setting cannot change while the gateway module is active.
    #[display("{} can not be changed while the gateway module is active", _0)]
    ModuleActive(String),
    /// A prerequisite setting is missing.
    #[display("{} must be set before {}", prerequisite, setting)]
    MissingPrerequisite {
        /// Setting being changed
        setting: String,
        /// Setting that must exist first
        prerequisite: String,
    },
}

/// Settings error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Setting Error: {} at line {} in {}", kind, line, file)]
pub struct SettingError {
    /// The kind of error that occurred
    pub kind: SettingErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SettingError {
    /// Create a new SettingError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SettingErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for an [`SettingErrorKind::InvalidValue`].
    #[track_caller]
    pub fn invalid(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(SettingErrorKind::InvalidValue {
            setting: setting.into(),
            reason: reason.into(),
        })
    }
}
