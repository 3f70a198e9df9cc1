//! Periodic jobs.

use crate::dispatcher::Dispatcher;
use chrono::Utc;
use portcullis_interface::GatewayStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error};

/// Spawn the timeout sweep.
///
/// Every tick queues the overdue entrants of every guild with their actor.
pub fn spawn_sweep_scheduler(dispatcher: Arc<Dispatcher>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = dispatcher.sweep(Utc::now()).await {
                error!(error = ?e, "Timeout sweep failed");
            }
        }
    })
}

/// Spawn the watermark commit job.
///
/// The first tick fires immediately, so the caller must read the previous
/// watermark before spawning this.
pub fn spawn_commit_scheduler(store: Arc<dyn GatewayStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let now = Utc::now();
            match store.record_commit(now).await {
                Ok(()) => debug!(at = %now, "Watermark committed"),
                Err(e) => error!(error = ?e, "Watermark commit failed"),
            }
        }
    })
}
