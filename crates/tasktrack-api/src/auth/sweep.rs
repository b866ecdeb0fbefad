// Expiry sweeper: periodically deletes refresh tokens past their expiry
// Decision: Best-effort; a failed sweep is logged and retried on the next tick

use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::session::SessionService;

/// Run a single sweep, returning the number of removed records
pub async fn sweep_once(sessions: &SessionService) -> u64 {
    match sessions.sweep_expired().await {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(removed, "swept expired refresh tokens");
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "refresh token sweep failed");
            0
        }
    }
}

/// Spawn the background sweeper. The first sweep runs immediately.
pub fn spawn_sweeper(sessions: Arc<SessionService>, interval: Duration) -> JoinHandle<()> {
    tracing::info!(interval_secs = interval.as_secs(), "starting refresh token sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep_once(&sessions).await;
        }
    })
}
