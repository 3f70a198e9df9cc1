//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Portcullis - holds new Discord members behind a rules gate
#[derive(Parser, Debug)]
#[command(name = "portcullis")]
#[command(about = "Holds new Discord members behind a rules gate", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file overlaid on the bundled defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to Discord and run the gateway
    Run {
        /// Discord bot token
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        token: String,

        /// PostgreSQL connection string
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,

        /// Keep all state in memory instead of PostgreSQL
        #[arg(long, conflicts_with = "database_url")]
        memory_store: bool,
    },

    /// Apply pending database migrations and exit
    Migrate {
        /// PostgreSQL connection string
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_token_and_database() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "run",
            "--token",
            "abc",
            "--database-url",
            "postgres://localhost/portcullis",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                token,
                database_url,
                memory_store,
            } => {
                assert_eq!(token, "abc");
                assert_eq!(
                    database_url.as_deref(),
                    Some("postgres://localhost/portcullis")
                );
                assert!(!memory_store);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "migrate",
            "--database-url",
            "postgres://db",
            "--log-format",
            "json",
            "--config",
            "bot.toml",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
        assert!(matches!(cli.command, Commands::Migrate { .. }));
    }

    #[test]
    fn memory_store_conflicts_with_database_url() {
        let result = Cli::try_parse_from([
            "portcullis",
            "run",
            "--token",
            "abc",
            "--memory-store",
            "--database-url",
            "postgres://db",
        ]);
        assert!(result.is_err());
    }
}
