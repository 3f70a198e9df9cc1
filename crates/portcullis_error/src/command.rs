//! Operator command error types.

/// Reasons an operator command is refused before it reaches the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CommandErrorKind {
    /// No command by that name.
    #[display("Unknown command: {}", _0)]
    UnknownCommand(String),
    /// A required argument was not given.
    #[display("`{}` needs a {} argument", command, argument)]
    MissingArgument {
        /// Command name
        command: String,
        /// Argument name
        argument: String,
    },
    /// An argument could not be understood.
    #[display("Invalid {} for `{}`: {}", argument, command, reason)]
    InvalidArgument {
        /// Command name
        command: String,
        /// Argument name
        argument: String,
        /// Why it was rejected
        reason: String,
    },
    /// The invoking member lacks the permission the command needs.
    #[display("You need the {} permission to use this command", _0)]
    MissingPermission(String),
    /// The command is cooling down in this guild.
    #[display("`{}` is on cooldown, try again in {}s", command, retry_after_secs)]
    Cooldown {
        /// Command name
        command: String,
        /// Seconds until it may run again
        retry_after_secs: u64,
    },
}

/// Command error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Command Error: {} at line {} in {}", kind, line, file)]
pub struct CommandError {
    /// The kind of error that occurred
    pub kind: CommandErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CommandError {
    /// Create a new CommandError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CommandErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
