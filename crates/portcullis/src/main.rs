//! Portcullis binary.
//!
//! - `run` connects to Discord and serves the gateway
//! - `migrate` applies database migrations

use clap::Parser;

mod cli;
mod run;
mod telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands};

    // Secrets may live in a .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init_telemetry(cli.log_format);

    match cli.command {
        Commands::Run {
            token,
            database_url,
            memory_store,
        } => {
            run::run_bot(
                cli.config.as_deref(),
                &token,
                database_url.as_deref(),
                memory_store,
            )
            .await?;
        }

        Commands::Migrate { database_url } => {
            run::migrate(cli.config.as_deref(), &database_url)?;
        }
    }

    Ok(())
}
