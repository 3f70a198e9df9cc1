//! Gateway runtime error types.

/// Failures of the per-guild actor machinery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GatewayErrorKind {
    /// The guild's actor has stopped and no longer accepts commands.
    #[display("Actor for guild {} has stopped", _0)]
    ActorStopped(u64),
    /// The actor dropped a command without replying.
    #[display("Actor for guild {} dropped the reply", _0)]
    NoReply(u64),
    /// The dispatcher has not finished booting.
    #[display("Gateway is still booting")]
    NotBooted,
}

/// Gateway runtime error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Gateway Error: {} at line {} in {}", kind, line, file)]
pub struct GatewayError {
    /// The kind of error that occurred
    pub kind: GatewayErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GatewayError {
    /// Create a new GatewayError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GatewayErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
