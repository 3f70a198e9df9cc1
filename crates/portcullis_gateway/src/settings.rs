//! Per-guild settings registry.
//!
//! A setting is a `(module, attribute)` pair such as `gateway timeout`.
//! Only pairs that exist can be constructed, so every change is validated
//! against a known attribute before anything is written.

use crate::context::{GatewayContext, GatewayResult};
use crate::templates;
use portcullis_core::{
    ChannelId, DEFAULT_TIMEOUT_SECS, GuildGatewayConfig, GuildId, MAX_EXCEPTION_ROLES,
    MAX_MEMBER_ROLES, RoleId, UserId,
};
use portcullis_error::{SettingError, SettingErrorKind};
use strum::IntoEnumIterator;
use tracing::{info, instrument};

/// Maximum length of a command prefix.
pub const MAX_PREFIX_CHARS: usize = 5;
/// Maximum length of the gate message text.
pub const MAX_GATE_TEXT_CHARS: usize = 250;
/// Maximum length of the welcome and goodbye texts.
pub const MAX_NOTICE_TEXT_CHARS: usize = 1000;
/// Maximum length of the bot welcome and goodbye texts.
pub const MAX_BOT_TEXT_CHARS: usize = 500;
/// Longest decision window, in minutes.
pub const MAX_TIMEOUT_MINUTES: u32 = 60;

/// Settings groups.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Module {
    /// Bot-wide guild settings
    System,
    /// The rules gate
    Gateway,
}

/// Attributes of the `system` module.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SystemAttribute {
    /// Command prefix
    Prefix,
    /// Operator log channel
    LogChannel,
}

/// Attributes of the `gateway` module.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GatewayAttribute {
    /// Channel holding the gate message
    RulesChannel,
    /// Role held while undecided
    BlockingRole,
    /// Roles granted on acceptance
    MemberRoles,
    /// Roles that pass the gate
    ExceptionRoles,
    /// Welcome notice channel
    WelcomeChannel,
    /// Goodbye notice channel
    GoodbyeChannel,
    /// Decision window in minutes
    Timeout,
    /// Gate message text
    GateText,
    /// Welcome notice text
    WelcomeText,
    /// Goodbye notice text
    GoodbyeText,
    /// Bot welcome notice text
    WelcomeBotText,
    /// Bot goodbye notice text
    GoodbyeBotText,
}

/// A settable `(module, attribute)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// A `system` attribute
    System(SystemAttribute),
    /// A `gateway` attribute
    Gateway(GatewayAttribute),
}

impl Setting {
    /// Look up a setting by its module and attribute names.
    pub fn parse(module: &str, attribute: &str) -> Result<Self, SettingError> {
        let unknown = || SettingError::new(SettingErrorKind::Unknown(format!("{module} {attribute}")));
        let module: Module = module.parse().map_err(|_| unknown())?;
        match module {
            Module::System => attribute.parse().map(Self::System).map_err(|_| unknown()),
            Module::Gateway => attribute.parse().map(Self::Gateway).map_err(|_| unknown()),
        }
    }

    /// Every setting, grouped by module.
    pub fn all() -> impl Iterator<Item = Setting> {
        SystemAttribute::iter()
            .map(Self::System)
            .chain(GatewayAttribute::iter().map(Self::Gateway))
    }

    /// Whether the value is free text, kept as typed instead of split into
    /// words.
    pub fn takes_text(&self) -> bool {
        matches!(
            self,
            Self::Gateway(
                GatewayAttribute::GateText
                    | GatewayAttribute::WelcomeText
                    | GatewayAttribute::GoodbyeText
                    | GatewayAttribute::WelcomeBotText
                    | GatewayAttribute::GoodbyeBotText
            )
        )
    }

    /// The module this setting belongs to.
    pub fn module(&self) -> Module {
        match self {
            Self::System(_) => Module::System,
            Self::Gateway(_) => Module::Gateway,
        }
    }
}

impl std::fmt::Display for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System(a) => write!(f, "system {a}"),
            Self::Gateway(a) => write!(f, "gateway {a}"),
        }
    }
}

fn snowflake(value: &str, open: &[&str]) -> Option<u64> {
    let value = value.trim();
    let inner = open
        .iter()
        .find_map(|prefix| value.strip_prefix(prefix)?.strip_suffix('>'))
        .unwrap_or(value);
    inner.parse().ok().filter(|id| *id != 0)
}

/// `<#id>` or a bare id.
pub fn parse_channel(value: &str) -> Option<ChannelId> {
    snowflake(value, &["<#"]).map(ChannelId)
}

/// `<@&id>` or a bare id.
pub fn parse_role(value: &str) -> Option<RoleId> {
    snowflake(value, &["<@&"]).map(RoleId)
}

/// `<@id>`, `<@!id>` or a bare id.
pub fn parse_user(value: &str) -> Option<UserId> {
    snowflake(value, &["<@!", "<@"]).map(UserId)
}

fn join(values: &[String]) -> String {
    values.join(" ").trim().to_string()
}

fn single<T>(
    setting: Setting,
    values: &[String],
    parse: impl Fn(&str) -> Option<T>,
    what: &str,
) -> Result<T, SettingError> {
    match values {
        [one] => parse(one.as_str()).ok_or_else(|| SettingError::invalid(setting.to_string(), format!("not a {what}"))),
        [] => Err(SettingError::invalid(setting.to_string(), format!("a {what} is required"))),
        _ => Err(SettingError::invalid(setting.to_string(), format!("exactly one {what} is expected"))),
    }
}

fn roles(setting: Setting, values: &[String], max: usize) -> Result<Vec<RoleId>, SettingError> {
    let mut out: Vec<RoleId> = Vec::with_capacity(values.len());
    for value in values {
        let role = parse_role(value)
            .ok_or_else(|| SettingError::invalid(setting.to_string(), format!("{value} is not a role")))?;
        if !out.contains(&role) {
            out.push(role);
        }
    }
    if out.len() > max {
        return Err(SettingError::invalid(
            setting.to_string(),
            format!("at most {max} roles can be set"),
        ));
    }
    Ok(out)
}

/// Parse a timeout given in minutes into seconds.
pub fn parse_timeout(setting: Setting, value: &str) -> Result<i32, SettingError> {
    let minutes: u32 = value
        .trim()
        .parse()
        .map_err(|_| SettingError::invalid(setting.to_string(), "the timeout must be a whole number of minutes"))?;
    if !(1..=MAX_TIMEOUT_MINUTES).contains(&minutes) {
        return Err(SettingError::invalid(
            setting.to_string(),
            format!("the timeout must be between 1 and {MAX_TIMEOUT_MINUTES} minutes"),
        ));
    }
    Ok(minutes as i32 * 60)
}

/// Validate a free-text attribute. Empty text means "reset".
pub fn parse_text(
    setting: Setting,
    value: String,
    max: usize,
    templated: bool,
) -> Result<Option<String>, SettingError> {
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > max {
        return Err(SettingError::invalid(
            setting.to_string(),
            format!("the text can be at most {max} characters"),
        ));
    }
    if templated {
        templates::validate(&value).map_err(|reason| SettingError::invalid(setting.to_string(), reason))?;
    }
    Ok(Some(value))
}

/// Validate and store one setting change. Returns the confirmation shown to
/// the operator, which is also sent to the log channel.
#[instrument(skip(ctx, values), fields(guild_id = %guild, setting = %setting))]
pub async fn apply_setting(
    ctx: &GatewayContext,
    guild: GuildId,
    setting: Setting,
    values: &[String],
) -> GatewayResult<String> {
    let confirmation = match setting {
        Setting::System(attribute) => apply_system(ctx, guild, setting, attribute, values).await?,
        Setting::Gateway(attribute) => apply_gateway(ctx, guild, setting, attribute, values).await?,
    };
    info!(confirmation = %confirmation, "Setting changed");
    ctx.notifier().notify(guild, &confirmation).await?;
    Ok(confirmation)
}

async fn apply_system(
    ctx: &GatewayContext,
    guild: GuildId,
    setting: Setting,
    attribute: SystemAttribute,
    values: &[String],
) -> GatewayResult<String> {
    let mut system = ctx.store().system_config(guild).await?;
    let confirmation = match attribute {
        SystemAttribute::Prefix => {
            let prefix = join(values);
            if prefix.is_empty() {
                system.prefix = None;
                "The command prefix has been reset.".to_string()
            } else if prefix.chars().count() > MAX_PREFIX_CHARS {
                return Err(SettingError::invalid(
                    setting.to_string(),
                    format!("the prefix can be at most {MAX_PREFIX_CHARS} characters"),
                )
                .into());
            } else {
                let text = format!("The command prefix has been set to `{prefix}`.");
                system.prefix = Some(prefix);
                text
            }
        }
        SystemAttribute::LogChannel => {
            if values.is_empty() {
                system.log_channel_id = None;
                "The log channel has been reset.".to_string()
            } else {
                let id = single(setting, values, parse_channel, "channel")?;
                sendable_channel(ctx, guild, setting, id, false).await?;
                system.log_channel_id = Some(id);
                format!("The log channel has been set to {}.", id.mention())
            }
        }
    };
    ctx.store().save_system(guild, &system).await?;
    Ok(confirmation)
}

async fn sendable_channel(
    ctx: &GatewayContext,
    guild: GuildId,
    setting: Setting,
    id: ChannelId,
    manage: bool,
) -> GatewayResult<()> {
    let channel = ctx.platform().channel(guild, id).await?;
    let usable = channel.is_some_and(|c| c.can_send && (!manage || c.can_manage_messages));
    if usable {
        return Ok(());
    }
    let reason = if manage {
        "the channel does not exist, or the bot can not send and manage messages in it"
    } else {
        "the channel does not exist, or the bot can not send messages in it"
    };
    Err(SettingError::invalid(setting.to_string(), reason).into())
}

async fn gateway_config(ctx: &GatewayContext, guild: GuildId) -> GatewayResult<GuildGatewayConfig> {
    match ctx.store().gateway_config(guild).await? {
        Some(config) => Ok(config),
        None => {
            ctx.store().ensure_guild(guild).await?;
            Ok(GuildGatewayConfig::new(guild))
        }
    }
}

fn mentions<T: Copy>(ids: &[T], mention: impl Fn(T) -> String) -> String {
    ids.iter().map(|id| mention(*id)).collect::<Vec<_>>().join(", ")
}

async fn apply_gateway(
    ctx: &GatewayContext,
    guild: GuildId,
    setting: Setting,
    attribute: GatewayAttribute,
    values: &[String],
) -> GatewayResult<String> {
    use GatewayAttribute as A;

    let mut config = gateway_config(ctx, guild).await?;
    let invalid = |reason: &str| SettingError::invalid(setting.to_string(), reason);
    let prerequisite = |prerequisite: &str| {
        SettingError::new(SettingErrorKind::MissingPrerequisite {
            setting: setting.to_string(),
            prerequisite: prerequisite.to_string(),
        })
    };

    let confirmation = match attribute {
        A::RulesChannel => {
            if config.active {
                return Err(SettingError::new(SettingErrorKind::ModuleActive(setting.to_string())).into());
            }
            let id = single(setting, values, parse_channel, "channel")?;
            if Some(id) == config.welcome_channel_id || Some(id) == config.goodbye_channel_id {
                return Err(invalid("the rules channel must differ from the welcome and goodbye channels").into());
            }
            sendable_channel(ctx, guild, setting, id, true).await?;
            config.rules_channel_id = Some(id);
            format!("The rules channel has been set to {}.", id.mention())
        }
        A::BlockingRole => {
            if config.active {
                return Err(SettingError::new(SettingErrorKind::ModuleActive(setting.to_string())).into());
            }
            let id = single(setting, values, parse_role, "role")?;
            if config.member_role_ids.contains(&id) || config.exception_role_ids.contains(&id) {
                return Err(invalid("the blocking role can not also be a member or exception role").into());
            }
            let role = ctx.platform().role(guild, id).await?;
            let bot = ctx.platform().bot_member(guild).await?;
            match role {
                None => return Err(invalid("the role does not exist").into()),
                Some(r) if !bot.outranks(&r) => {
                    return Err(invalid("the role must be below the bot's top role").into());
                }
                Some(_) => {}
            }
            config.blocking_role_id = Some(id);
            format!("The blocking role has been set to {}.", id.mention())
        }
        A::MemberRoles | A::ExceptionRoles => {
            let member = attribute == A::MemberRoles;
            let Some(blocking) = config.blocking_role_id else {
                return Err(prerequisite("gateway blockingrole").into());
            };
            let max = if member { MAX_MEMBER_ROLES } else { MAX_EXCEPTION_ROLES };
            let ids = roles(setting, values, max)?;
            if ids.contains(&blocking) {
                return Err(invalid("the blocking role can not be one of these roles").into());
            }
            let bot = ctx.platform().bot_member(guild).await?;
            for id in &ids {
                match ctx.platform().role(guild, *id).await? {
                    None => return Err(invalid(&format!("{} does not exist", id.mention())).into()),
                    Some(r) if member && !bot.outranks(&r) => {
                        return Err(invalid(&format!("{} must be below the bot's top role", id.mention())).into());
                    }
                    Some(_) => {}
                }
            }
            let label = if member { "member" } else { "exception" };
            let text = if ids.is_empty() {
                format!("The {label} roles have been reset.")
            } else {
                format!("The {label} roles have been set to {}.", mentions(&ids, RoleId::mention))
            };
            if member {
                config.member_role_ids = ids;
            } else {
                config.exception_role_ids = ids;
            }
            text
        }
        A::WelcomeChannel | A::GoodbyeChannel => {
            let welcome = attribute == A::WelcomeChannel;
            let label = if welcome { "welcome" } else { "goodbye" };
            let id = if values.is_empty() {
                None
            } else {
                let Some(rules) = config.rules_channel_id else {
                    return Err(prerequisite("gateway ruleschannel").into());
                };
                let id = single(setting, values, parse_channel, "channel")?;
                if id == rules {
                    return Err(invalid(&format!("the {label} channel must differ from the rules channel")).into());
                }
                sendable_channel(ctx, guild, setting, id, false).await?;
                Some(id)
            };
            if welcome {
                config.welcome_channel_id = id;
            } else {
                config.goodbye_channel_id = id;
            }
            match id {
                Some(id) => format!("The {label} channel has been set to {}.", id.mention()),
                None => format!("The {label} channel has been reset."),
            }
        }
        A::Timeout => {
            let value = join(values);
            if value.is_empty() {
                config.timeout_seconds = DEFAULT_TIMEOUT_SECS;
                "The timeout has been reset.".to_string()
            } else {
                config.timeout_seconds = parse_timeout(setting, &value)?;
                format!(
                    "The timeout has been set to {} minutes.",
                    config.timeout_seconds / 60
                )
            }
        }
        A::GateText | A::WelcomeText | A::GoodbyeText | A::WelcomeBotText | A::GoodbyeBotText => {
            let (slot, max, templated, label) = match attribute {
                A::GateText => (&mut config.gate_text, MAX_GATE_TEXT_CHARS, false, "gate"),
                A::WelcomeText => (&mut config.welcome_text, MAX_NOTICE_TEXT_CHARS, true, "welcome"),
                A::GoodbyeText => (&mut config.goodbye_text, MAX_NOTICE_TEXT_CHARS, true, "goodbye"),
                A::WelcomeBotText => (&mut config.welcome_bot_text, MAX_BOT_TEXT_CHARS, true, "bot welcome"),
                _ => (&mut config.goodbye_bot_text, MAX_BOT_TEXT_CHARS, true, "bot goodbye"),
            };
            *slot = parse_text(setting, join(values), max, templated)?;
            if slot.is_some() {
                format!("The {label} text has been updated.")
            } else {
                format!("The {label} text has been reset.")
            }
        }
    };

    ctx.store().save_config(&config).await?;
    Ok(confirmation)
}
