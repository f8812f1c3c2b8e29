use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the service status while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.room_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded().await, state.catalog().themes().len())
}
