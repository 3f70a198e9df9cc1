//! Operator notices delivered to the guild log channel.

use async_trait::async_trait;
use portcullis_core::GuildId;
use portcullis_error::PortcullisResult;
use portcullis_interface::{ChatPlatform, GatewayStore, Notifier};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Sends operator notices to the guild's configured log channel.
///
/// Guilds without a log channel only get a `warn!` line. A failed send is
/// logged and dropped.
pub struct LogChannelNotifier {
    store: Arc<dyn GatewayStore>,
    platform: Arc<dyn ChatPlatform>,
}

impl LogChannelNotifier {
    /// Create a notifier over the given store and platform.
    pub fn new(store: Arc<dyn GatewayStore>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { store, platform }
    }
}

#[async_trait]
impl Notifier for LogChannelNotifier {
    #[instrument(skip(self, message), fields(guild_id = %guild))]
    async fn notify(&self, guild: GuildId, message: &str) -> PortcullisResult<()> {
        let Some(channel) = self.store.system_config(guild).await?.log_channel_id else {
            warn!(notice = message, "No log channel configured, notice dropped");
            return Ok(());
        };

        match self.platform.send_message(channel, message).await {
            Ok(_) => debug!(channel_id = %channel, "Notice delivered"),
            Err(e) => warn!(channel_id = %channel, error = %e, notice = message, "Notice not delivered"),
        }
        Ok(())
    }
}
