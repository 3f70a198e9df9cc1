//! Chat platform error types.
//!
//! Platform calls distinguish "not found" and "forbidden" from other
//! failures, because the gateway tolerates those locally instead of failing
//! the whole operation.

/// Chat platform error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PlatformErrorKind {
    /// The referenced object (message, member, role, channel) does not exist.
    #[display("Not found: {}", _0)]
    NotFound(String),
    /// The bot lacks the permission needed for the call.
    #[display("Forbidden: {}", _0)]
    Forbidden(String),
    /// Any other request failure.
    #[display("Request failed: {}", _0)]
    Request(String),
    /// The gateway connection could not be built or was lost.
    #[display("Connection failed: {}", _0)]
    ConnectionFailed(String),
    /// The guild is not present in the client cache.
    #[display("Guild {} not cached", _0)]
    Uncached(u64),
}

/// Chat platform error with source location tracking.
///
/// # Examples
///
/// ```
/// use portcullis_error::{PlatformError, PlatformErrorKind};
///
/// let err = PlatformError::new(PlatformErrorKind::Forbidden("kick".into()));
/// assert!(err.is_benign());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Platform Error: {} at line {} in {}", kind, line, file)]
pub struct PlatformError {
    /// The kind of error that occurred
    pub kind: PlatformErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PlatformError {
    /// Create a new PlatformError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PlatformErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True if the platform reported the object missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, PlatformErrorKind::NotFound(_))
    }

    /// True if the platform refused the call for lack of permission.
    pub fn is_forbidden(&self) -> bool {
        matches!(self.kind, PlatformErrorKind::Forbidden(_))
    }

    /// Not-found and forbidden usually mean a benign race (the member already
    /// left, the message is already gone) and are tolerated by callers.
    pub fn is_benign(&self) -> bool {
        self.is_not_found() || self.is_forbidden()
    }
}
