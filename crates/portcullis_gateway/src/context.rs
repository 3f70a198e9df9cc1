//! Collaborators shared by every gateway component.

use crate::config::EmojiSpec;
use derive_getters::Getters;
use portcullis_error::{PlatformError, PortcullisResult};
use portcullis_interface::{ChatPlatform, GatewayStore, Notifier};
use std::sync::Arc;
use tracing::warn;

/// Result type for gateway operations.
pub type GatewayResult<T> = PortcullisResult<T>;

/// How the accept and decline emojis are written in messages.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct GateEmojis {
    accept: EmojiSpec,
    decline: EmojiSpec,
}

impl GateEmojis {
    /// Pair of gate emojis.
    pub fn new(accept: EmojiSpec, decline: EmojiSpec) -> Self {
        Self { accept, decline }
    }
}

impl Default for GateEmojis {
    fn default() -> Self {
        Self::new(
            EmojiSpec::Unicode("✅".to_string()),
            EmojiSpec::Unicode("❌".to_string()),
        )
    }
}

/// Store, platform and notifier handed to each component.
#[derive(Clone, Getters)]
pub struct GatewayContext {
    store: Arc<dyn GatewayStore>,
    platform: Arc<dyn ChatPlatform>,
    notifier: Arc<dyn Notifier>,
    emojis: GateEmojis,
}

impl GatewayContext {
    /// Bundle the collaborators.
    pub fn new(
        store: Arc<dyn GatewayStore>,
        platform: Arc<dyn ChatPlatform>,
        notifier: Arc<dyn Notifier>,
        emojis: GateEmojis,
    ) -> Self {
        Self {
            store,
            platform,
            notifier,
            emojis,
        }
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("emojis", &self.emojis)
            .finish_non_exhaustive()
    }
}

/// Swallow benign platform failures on per-member calls.
///
/// Returns `Ok(true)` when the call succeeded, `Ok(false)` when it failed
/// with not-found or forbidden, and the error otherwise.
pub(crate) fn tolerate(result: Result<(), PlatformError>, action: &str) -> GatewayResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_benign() => {
            warn!(action, error = %e, "Platform call failed, continuing");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
