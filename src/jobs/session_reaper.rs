use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::auth::SessionService;

/// Deletes expired sessions every `interval`. Runs until the task is dropped.
pub async fn run(sessions: SessionService, interval: Duration) -> Result<()> {
    info!(interval_seconds = interval.as_secs(), "session reaper started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sessions.prune_expired().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "pruned expired sessions"),
            Err(err) => warn!(error = ?err, "failed to prune expired sessions"),
        }
    }
}
