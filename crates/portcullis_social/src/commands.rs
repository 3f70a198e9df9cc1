//! Prefix commands for guild operators.
//!
//! # Supported Commands
//!
//! - `activate gateway` / `deactivate gateway`
//! - `synchronise members|roles [all]|reactions|everything [all]`
//! - `checkaccepted [user]`
//! - `resetaccepted`
//! - `config <module> <attribute> [value]`
//!
//! Parsing is pure so it can be tested without a connection. Per-guild
//! cooldowns use `governor` keyed limiters with a burst of one.

use governor::clock::Clock;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use portcullis_core::GuildId;
use portcullis_error::{CommandError, CommandErrorKind, PortcullisResult};
use portcullis_gateway::{
    CommandSettings, Dispatcher, GatewayResult, Module, Setting, SyncOutcome, SyncReport,
    SyncScope, parse_user,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Post the gate message
    Activate,
    /// Take the gate down
    Deactivate,
    /// Run a reconciliation routine
    Synchronise(SyncScope),
    /// Query acceptance for one user or the guild
    CheckAccepted(Option<portcullis_core::UserId>),
    /// Forget every acceptance
    ResetAccepted,
    /// Change a setting
    Config {
        /// Which setting
        setting: Setting,
        /// Raw values, empty to reset
        values: Vec<String>,
    },
}

/// Commands with a per-guild cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Cooldown {
    /// `synchronise members`
    #[strum(serialize = "synchronise members")]
    Members,
    /// `synchronise roles`
    #[strum(serialize = "synchronise roles")]
    Roles,
    /// `synchronise reactions`
    #[strum(serialize = "synchronise reactions")]
    Reactions,
    /// `synchronise everything`
    #[strum(serialize = "synchronise everything")]
    Everything,
    /// `resetaccepted`
    #[strum(serialize = "resetaccepted")]
    Reset,
}

impl Command {
    /// Parse a message. Returns `None` when it is not addressed to us.
    pub fn parse(content: &str, prefix: &str) -> Option<PortcullisResult<Self>> {
        let body = content.strip_prefix(prefix)?;
        let (name, rest) = split_word(body);
        let parsed = match name.to_ascii_lowercase().as_str() {
            "activate" | "enable" => module_argument("activate", rest).map(|_| Self::Activate),
            "deactivate" | "disable" => {
                module_argument("deactivate", rest).map(|_| Self::Deactivate)
            }
            "synchronise" | "synchronize" | "sync" => synchronise(rest).map(Self::Synchronise),
            "checkaccepted" | "ca" => check_accepted(rest).map(Self::CheckAccepted),
            "resetaccepted" => Ok(Self::ResetAccepted),
            "config" | "set" => return Some(config(rest)),
            _ => return None,
        };
        Some(parsed.map_err(Into::into))
    }

    /// Whether the invoking member needs Manage Guild.
    pub fn needs_manage_guild(&self) -> bool {
        !matches!(self, Self::CheckAccepted(_))
    }

    /// The cooldown this command is subject to, if any.
    pub fn cooldown(&self) -> Option<Cooldown> {
        match self {
            Self::Synchronise(SyncScope::Members) => Some(Cooldown::Members),
            Self::Synchronise(SyncScope::Roles { .. }) => Some(Cooldown::Roles),
            Self::Synchronise(SyncScope::Reactions) => Some(Cooldown::Reactions),
            Self::Synchronise(SyncScope::Everything { .. }) => Some(Cooldown::Everything),
            Self::ResetAccepted => Some(Cooldown::Reset),
            _ => None,
        }
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

#[track_caller]
fn missing(command: &str, argument: &str) -> CommandError {
    CommandError::new(CommandErrorKind::MissingArgument {
        command: command.to_string(),
        argument: argument.to_string(),
    })
}

#[track_caller]
fn invalid(command: &str, argument: &str, reason: impl Into<String>) -> CommandError {
    CommandError::new(CommandErrorKind::InvalidArgument {
        command: command.to_string(),
        argument: argument.to_string(),
        reason: reason.into(),
    })
}

fn module_argument(command: &str, rest: &str) -> Result<(), CommandError> {
    let (module, _) = split_word(rest);
    if module.is_empty() {
        return Err(missing(command, "module"));
    }
    match module.parse::<Module>() {
        Ok(Module::Gateway) => Ok(()),
        Ok(Module::System) => Err(invalid(
            command,
            "module",
            "the system module is always active",
        )),
        Err(_) => Err(invalid(command, "module", format!("no module named {module}"))),
    }
}

/// `true` means accepted members only, which is the default.
fn accepted_only(command: &str, word: &str) -> Result<bool, CommandError> {
    match word.to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "accepted" => Ok(true),
        "false" | "no" | "off" | "all" | "everyone" => Ok(false),
        other => Err(invalid(
            command,
            "scope",
            format!("expected `accepted` or `all`, got {other}"),
        )),
    }
}

fn synchronise(rest: &str) -> Result<SyncScope, CommandError> {
    let (routine, rest) = split_word(rest);
    let (flag, _) = split_word(rest);
    match routine.to_ascii_lowercase().as_str() {
        "" => Err(missing("synchronise", "routine")),
        "members" => Ok(SyncScope::Members),
        "roles" => Ok(SyncScope::Roles {
            accepted_only: accepted_only("synchronise roles", flag)?,
        }),
        "reactions" => Ok(SyncScope::Reactions),
        "everything" | "full" | "all" => Ok(SyncScope::Everything {
            roles_accepted_only: accepted_only("synchronise everything", flag)?,
        }),
        other => Err(CommandError::new(CommandErrorKind::UnknownCommand(format!(
            "synchronise {other}"
        )))),
    }
}

fn check_accepted(rest: &str) -> Result<Option<portcullis_core::UserId>, CommandError> {
    let (target, _) = split_word(rest);
    if target.is_empty() {
        return Ok(None);
    }
    parse_user(target)
        .map(Some)
        .ok_or_else(|| invalid("checkaccepted", "user", format!("{target} is not a user")))
}

fn config(rest: &str) -> PortcullisResult<Command> {
    let (module, rest) = split_word(rest);
    let (attribute, rest) = split_word(rest);
    if module.is_empty() {
        return Err(missing("config", "module").into());
    }
    if attribute.is_empty() {
        return Err(missing("config", "attribute").into());
    }
    let setting = Setting::parse(module, attribute)?;
    let rest = rest.trim();
    let values = if rest.is_empty() {
        Vec::new()
    } else if setting.takes_text() {
        vec![rest.to_string()]
    } else {
        rest.split_whitespace().map(str::to_string).collect()
    };
    Ok(Command::Config { setting, values })
}

/// Per-guild cooldown limiters, one per [`Cooldown`].
pub struct Cooldowns {
    limiters: HashMap<Cooldown, DefaultKeyedRateLimiter<GuildId>>,
}

impl Cooldowns {
    /// Build limiters from the configured periods. A zero period disables
    /// that cooldown.
    pub fn new(settings: &CommandSettings) -> Self {
        let periods = [
            (Cooldown::Members, settings.members_cooldown_secs),
            (Cooldown::Roles, settings.roles_cooldown_secs),
            (Cooldown::Reactions, settings.reactions_cooldown_secs),
            (Cooldown::Everything, settings.everything_cooldown_secs),
            (Cooldown::Reset, settings.reset_cooldown_secs),
        ];
        let limiters = periods
            .into_iter()
            .filter_map(|(cooldown, secs)| {
                Quota::with_period(Duration::from_secs(secs))
                    .map(|quota| (cooldown, RateLimiter::keyed(quota)))
            })
            .collect();
        Self { limiters }
    }

    /// Take the guild's slot for `cooldown`, or report how long to wait.
    pub fn check(&self, cooldown: Cooldown, guild: GuildId) -> Result<(), CommandError> {
        let Some(limiter) = self.limiters.get(&cooldown) else {
            return Ok(());
        };
        limiter.check_key(&guild).map_err(|not_until| {
            let wait = not_until.wait_time_from(limiter.clock().now());
            CommandError::new(CommandErrorKind::Cooldown {
                command: cooldown.to_string(),
                retry_after_secs: wait.as_secs().max(1),
            })
        })
    }
}

impl std::fmt::Debug for Cooldowns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cooldowns")
            .field("enabled", &self.limiters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Operator-facing text for a reconciliation outcome.
pub fn sync_reply(outcome: SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Inactive => "The gateway module is not active.".to_string(),
        SyncOutcome::Tripped => {
            "The gateway module was tripped while synchronising. Check the log channel for the reason."
                .to_string()
        }
        SyncOutcome::Completed(SyncReport::Members(report)) => format!(
            "Server members synchronised. {} allowed, {} denied, {} excepted, {} departed.",
            report.allowed, report.denied, report.excepted, report.departed
        ),
        SyncOutcome::Completed(SyncReport::Roles(granted)) => {
            format!("Member roles synchronised. {granted} members were given roles.")
        }
        SyncOutcome::Completed(SyncReport::Reactions(removed)) => {
            format!("Gate message reactions synchronised. {removed} reactions were removed.")
        }
        SyncOutcome::Completed(SyncReport::Everything(_)) => {
            "Gateway module fully synchronised.".to_string()
        }
    }
}

/// Run a command against the guild's actor and render the reply.
#[instrument(skip(dispatcher), fields(guild_id = %guild))]
pub async fn execute(
    dispatcher: &Dispatcher,
    guild: GuildId,
    command: Command,
) -> GatewayResult<String> {
    debug!(?command, "Executing command");
    let reply = match command {
        Command::Synchronise(scope) => sync_reply(dispatcher.synchronise(guild, scope).await?),
        Command::Activate => dispatcher.guild(guild).await?.activate().await?.to_string(),
        Command::Deactivate => dispatcher.guild(guild).await?.deactivate().await?.to_string(),
        Command::CheckAccepted(user) => dispatcher
            .guild(guild)
            .await?
            .check_accepted(user)
            .await?
            .to_string(),
        Command::ResetAccepted => {
            let removed = dispatcher.guild(guild).await?.reset_accepted().await?;
            format!("Acceptance records for this server have been reset ({removed} removed).")
        }
        Command::Config { setting, values } => {
            dispatcher
                .guild(guild)
                .await?
                .apply_setting(setting, values)
                .await?
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::UserId;
    use portcullis_error::{PortcullisErrorKind, SettingErrorKind};
    use portcullis_gateway::{GatewayAttribute, MembersReport, SystemAttribute};

    fn parse(content: &str) -> PortcullisResult<Command> {
        Command::parse(content, "+").expect("addressed to the bot")
    }

    fn command_error(err: &portcullis_error::PortcullisError) -> &CommandErrorKind {
        match err.kind() {
            PortcullisErrorKind::Command(e) => &e.kind,
            other => panic!("expected a command error, got {other}"),
        }
    }

    fn settings() -> CommandSettings {
        CommandSettings {
            default_prefix: "+".into(),
            members_cooldown_secs: 3600,
            roles_cooldown_secs: 3600,
            reactions_cooldown_secs: 86_400,
            everything_cooldown_secs: 86_400,
            reset_cooldown_secs: 0,
        }
    }

    #[test]
    fn messages_without_prefix_or_known_name_are_ignored() {
        assert!(Command::parse("activate gateway", "+").is_none());
        assert!(Command::parse("+help", "+").is_none());
        assert!(Command::parse("!!activate gateway", "!!").is_some());
    }

    #[test]
    fn lifecycle_commands_need_the_gateway_module() {
        assert_eq!(parse("+activate gateway").unwrap(), Command::Activate);
        assert_eq!(parse("+DISABLE Gateway").unwrap(), Command::Deactivate);

        let err = parse("+activate").unwrap_err();
        assert!(matches!(
            command_error(&err),
            CommandErrorKind::MissingArgument { .. }
        ));
        assert!(parse("+activate system").is_err());
        assert!(parse("+activate warn").is_err());
    }

    #[test]
    fn synchronise_routines_and_scopes() {
        assert_eq!(
            parse("+sync members").unwrap(),
            Command::Synchronise(SyncScope::Members)
        );
        assert_eq!(
            parse("+synchronise roles").unwrap(),
            Command::Synchronise(SyncScope::Roles {
                accepted_only: true
            })
        );
        assert_eq!(
            parse("+synchronize roles all").unwrap(),
            Command::Synchronise(SyncScope::Roles {
                accepted_only: false
            })
        );
        assert_eq!(
            parse("+sync full false").unwrap(),
            Command::Synchronise(SyncScope::Everything {
                roles_accepted_only: false
            })
        );

        let err = parse("+sync bans").unwrap_err();
        assert!(matches!(
            command_error(&err),
            CommandErrorKind::UnknownCommand(name) if name == "synchronise bans"
        ));
        assert!(parse("+sync roles maybe").is_err());
    }

    #[test]
    fn checkaccepted_takes_mentions_or_ids() {
        assert_eq!(parse("+ca").unwrap(), Command::CheckAccepted(None));
        assert_eq!(
            parse("+checkaccepted <@!42>").unwrap(),
            Command::CheckAccepted(Some(UserId(42)))
        );
        assert_eq!(
            parse("+ca 42").unwrap(),
            Command::CheckAccepted(Some(UserId(42)))
        );
        assert!(parse("+ca someone").is_err());
        assert!(!parse("+ca").unwrap().needs_manage_guild());
        assert!(parse("+resetaccepted").unwrap().needs_manage_guild());
    }

    #[test]
    fn config_splits_values_except_for_text() {
        assert_eq!(
            parse("+config gateway memberroles <@&1>  <@&2>").unwrap(),
            Command::Config {
                setting: Setting::Gateway(GatewayAttribute::MemberRoles),
                values: vec!["<@&1>".into(), "<@&2>".into()],
            }
        );
        assert_eq!(
            parse("+set gateway welcometext Hi  {membermention}!\nRead the rules.").unwrap(),
            Command::Config {
                setting: Setting::Gateway(GatewayAttribute::WelcomeText),
                values: vec!["Hi  {membermention}!\nRead the rules.".into()],
            }
        );
        assert_eq!(
            parse("+config system prefix").unwrap(),
            Command::Config {
                setting: Setting::System(SystemAttribute::Prefix),
                values: vec![],
            }
        );

        let err = parse("+config gateway colour red").unwrap_err();
        assert!(matches!(
            &err.as_setting().unwrap().kind,
            SettingErrorKind::Unknown(_)
        ));
        assert!(parse("+config gateway").is_err());
    }

    #[test]
    fn cooldowns_are_per_guild_and_per_command() {
        let cooldowns = Cooldowns::new(&settings());

        assert!(cooldowns.check(Cooldown::Members, GuildId(1)).is_ok());
        let err = cooldowns.check(Cooldown::Members, GuildId(1)).unwrap_err();
        match err.kind {
            CommandErrorKind::Cooldown {
                command,
                retry_after_secs,
            } => {
                assert_eq!(command, "synchronise members");
                assert!(retry_after_secs > 3000 && retry_after_secs <= 3600);
            }
            other => panic!("unexpected {other}"),
        }

        assert!(cooldowns.check(Cooldown::Members, GuildId(2)).is_ok());
        assert!(cooldowns.check(Cooldown::Roles, GuildId(1)).is_ok());
    }

    #[test]
    fn zero_period_disables_cooldown() {
        let cooldowns = Cooldowns::new(&settings());
        for _ in 0..3 {
            assert!(cooldowns.check(Cooldown::Reset, GuildId(1)).is_ok());
        }
        assert_eq!(
            parse("+resetaccepted").unwrap().cooldown(),
            Some(Cooldown::Reset)
        );
        assert_eq!(parse("+activate gateway").unwrap().cooldown(), None);
    }

    #[test]
    fn sync_replies_name_the_routine() {
        let members = sync_reply(SyncOutcome::Completed(SyncReport::Members(MembersReport {
            allowed: 2,
            denied: 1,
            excepted: 0,
            departed: 3,
        })));
        assert_eq!(
            members,
            "Server members synchronised. 2 allowed, 1 denied, 0 excepted, 3 departed."
        );
        assert!(sync_reply(SyncOutcome::Tripped).contains("tripped"));
        assert_eq!(
            sync_reply(SyncOutcome::Inactive),
            "The gateway module is not active."
        );
    }
}
