//! Process configuration.
//!
//! Sources, later overriding earlier:
//! - Bundled defaults (include_str! from portcullis.toml)
//! - `~/.config/portcullis/portcullis.toml`
//! - `./portcullis.toml`
//! - `PORTCULLIS__SECTION__KEY` environment variables

use config::{Config, Environment, File, FileFormat};
use portcullis_error::{ConfigError, PortcullisError, PortcullisResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../portcullis.toml");

/// An emoji as configured: either a unicode character or a custom guild
/// emoji written `name:id` (or `a:name:id` when animated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmojiSpec {
    /// A unicode emoji.
    Unicode(String),
    /// A custom emoji uploaded to a guild.
    Custom {
        /// Emoji name
        name: String,
        /// Emoji snowflake
        id: u64,
        /// Whether the emoji is animated
        animated: bool,
    },
}

impl EmojiSpec {
    /// Text that renders the emoji inside a message.
    pub fn mention(&self) -> String {
        match self {
            Self::Unicode(s) => s.clone(),
            Self::Custom {
                name,
                id,
                animated: false,
            } => format!("<:{name}:{id}>"),
            Self::Custom {
                name,
                id,
                animated: true,
            } => format!("<a:{name}:{id}>"),
        }
    }
}

impl std::str::FromStr for EmojiSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::new("emoji must not be empty"));
        }
        let parts: Vec<&str> = s.split(':').collect();
        let (animated, name, id) = match parts.as_slice() {
            [_] => return Ok(Self::Unicode(s.to_string())),
            [name, id] => (false, *name, *id),
            ["a", name, id] => (true, *name, *id),
            _ => return Err(ConfigError::new(format!("invalid emoji: {s}"))),
        };
        let id = id
            .parse::<u64>()
            .map_err(|e| ConfigError::new(format!("invalid emoji id in {s}: {e}")))?;
        if id == 0 {
            return Err(ConfigError::new(format!("invalid emoji id in {s}: zero")));
        }
        Ok(Self::Custom {
            name: name.to_string(),
            id,
            animated,
        })
    }
}

impl TryFrom<String> for EmojiSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmojiSpec> for String {
    fn from(spec: EmojiSpec) -> Self {
        match spec {
            EmojiSpec::Unicode(s) => s,
            EmojiSpec::Custom {
                name,
                id,
                animated: false,
            } => format!("{name}:{id}"),
            EmojiSpec::Custom {
                name,
                id,
                animated: true,
            } => format!("a:{name}:{id}"),
        }
    }
}

/// `[gateway]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Seconds between timeout sweeps
    pub sweep_interval_secs: u64,
    /// Seconds between watermark commits
    pub commit_interval_secs: u64,
    /// Reaction that accepts the rules
    pub accept_emoji: EmojiSpec,
    /// Reaction that declines the rules
    pub decline_emoji: EmojiSpec,
    /// Bounded queue length of each guild actor
    pub queue_capacity: usize,
}

impl GatewaySettings {
    /// Sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Watermark commit period.
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs.max(1))
    }
}

/// `[commands]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSettings {
    /// Prefix used by guilds that have not set one
    pub default_prefix: String,
    /// Per-guild cooldown of `synchronise members`
    pub members_cooldown_secs: u64,
    /// Per-guild cooldown of `synchronise roles`
    pub roles_cooldown_secs: u64,
    /// Per-guild cooldown of `synchronise reactions`
    pub reactions_cooldown_secs: u64,
    /// Per-guild cooldown of `synchronise everything`
    pub everything_cooldown_secs: u64,
    /// Per-guild cooldown of `resetaccepted`
    pub reset_cooldown_secs: u64,
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Maximum pooled connections
    pub pool_size: u32,
}

/// Top-level Portcullis configuration.
///
/// # Example
///
/// ```no_run
/// use portcullis_gateway::PortcullisConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PortcullisConfig::load()?;
/// println!("sweeping every {:?}", config.gateway.sweep_interval());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortcullisConfig {
    /// Gate runtime settings
    pub gateway: GatewaySettings,
    /// Operator command settings
    pub commands: CommandSettings,
    /// Persistence settings
    pub database: DatabaseSettings,
}

impl PortcullisConfig {
    /// Load configuration with precedence: environment > current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> PortcullisResult<Self> {
        debug!("Loading configuration");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/portcullis/portcullis.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("portcullis").required(false))
            .add_source(Environment::with_prefix("PORTCULLIS").separator("__"));

        Self::finish(builder)
    }

    /// Load bundled defaults overlaid with one specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> PortcullisResult<Self> {
        debug!("Loading configuration from file");

        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));
        Self::finish(builder)
    }

    /// Bundled defaults only.
    pub fn bundled() -> PortcullisResult<Self> {
        Self::finish(Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> PortcullisResult<Self> {
        builder
            .build()
            .map_err(|e| {
                PortcullisError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                PortcullisError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }
}
