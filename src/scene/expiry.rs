//! Periodic expiry sweep.

use super::manager::SceneManager;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn the sweep task. It ticks every `sweep_interval` until `cancel`
/// fires; a sweep already in progress finishes before the task exits.
pub fn spawn_expiry_sweep(manager: Arc<SceneManager>, cancel: CancellationToken) -> JoinHandle<()> {
    let period = manager.settings().sweep_interval;
    tokio::spawn(async move {
        debug!(interval_secs = period.as_secs(), "Expiry sweep started");
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Some(stopped) = manager.sweep_expired().await
                && !stopped.is_empty()
            {
                info!(scenes = stopped.len(), "Expiry sweep tore down scenes");
            }
        }
        debug!("Expiry sweep stopped");
    })
}
