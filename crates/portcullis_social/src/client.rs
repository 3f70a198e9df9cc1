//! Discord client setup and lifecycle management.

use crate::handler::PortcullisHandler;
use portcullis_error::{PlatformError, PlatformErrorKind, PortcullisResult};
use portcullis_gateway::PortcullisConfig;
use portcullis_interface::GatewayStore;
use serenity::Client;
use serenity::gateway::ShardManager;
use std::sync::Arc;
use tracing::{info, instrument};

/// The Portcullis Discord client.
///
/// # Example
/// ```no_run
/// use portcullis_database::MemoryGatewayStore;
/// use portcullis_gateway::PortcullisConfig;
/// use portcullis_social::PortcullisBot;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let token = std::env::var("DISCORD_TOKEN")?;
///     let config = PortcullisConfig::load()?;
///     let store = Arc::new(MemoryGatewayStore::new());
///
///     let mut bot = PortcullisBot::new(&token, store, &config).await?;
///     bot.start().await?;
///     Ok(())
/// }
/// ```
pub struct PortcullisBot {
    client: Client,
}

impl PortcullisBot {
    /// Build the serenity client with the Portcullis handler.
    ///
    /// # Errors
    /// Returns an error if the client fails to initialize.
    #[instrument(skip(token, store, config), fields(token_len = token.len()))]
    pub async fn new(
        token: &str,
        store: Arc<dyn GatewayStore>,
        config: &PortcullisConfig,
    ) -> PortcullisResult<Self> {
        info!("Initializing Portcullis Discord bot");

        let handler = PortcullisHandler::new(store, config);
        let intents = PortcullisHandler::intents();

        info!("Building Serenity client with intents: {:?}", intents);

        let client = Client::builder(token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| {
                PlatformError::new(PlatformErrorKind::ConnectionFailed(format!(
                    "Failed to build client: {}",
                    e
                )))
            })?;

        info!("Serenity client built successfully");

        Ok(Self { client })
    }

    /// Handle for shutting the shards down from another task.
    pub fn shard_manager(&self) -> Arc<ShardManager> {
        self.client.shard_manager.clone()
    }

    /// Run the bot until every shard stops.
    ///
    /// # Errors
    /// Returns an error if the client fails to start or encounters a fatal error.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> PortcullisResult<()> {
        info!("Starting Discord bot");

        self.client.start().await.map_err(|e| {
            PlatformError::new(PlatformErrorKind::ConnectionFailed(format!(
                "Client error: {}",
                e
            )))
        })?;

        Ok(())
    }
}
