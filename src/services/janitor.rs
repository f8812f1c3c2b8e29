//! Background task deleting rooms nobody touched for a while.

use std::time::{Duration, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Purge idle rooms every `purge_interval` for as long as the process runs.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().purge_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        purge_once(&state, state.config().room_ttl()).await;
    }
}

/// Delete rooms last updated more than `ttl` ago, returning how many were removed.
pub async fn purge_once(state: &SharedState, ttl: Duration) -> usize {
    let Some(store) = state.room_store().await else {
        debug!("skipping room purge in degraded mode");
        return 0;
    };

    let cutoff = SystemTime::now()
        .checked_sub(ttl)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    match store.purge_stale(cutoff).await {
        Ok(0) => 0,
        Ok(count) => {
            info!(count, ttl_secs = ttl.as_secs(), "purged idle rooms");
            count
        }
        Err(err) => {
            warn!(error = %err, "failed to purge idle rooms");
            0
        }
    }
}
