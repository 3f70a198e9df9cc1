//! Operator notification seam.

use async_trait::async_trait;
use portcullis_core::GuildId;
use portcullis_error::PortcullisResult;

/// Delivers operator notices for a guild.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to the guild's operators.
    ///
    /// A guild without a notice destination is not an error.
    async fn notify(&self, guild: GuildId, message: &str) -> PortcullisResult<()>;
}
