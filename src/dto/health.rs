use serde::Serialize;
use utoipa::ToSchema;

/// Overall service state reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A room store is installed.
    Ok,
    /// No room store is installed.
    Degraded,
}

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether rooms can be served.
    pub status: HealthStatus,
    /// Number of themes available for draws.
    pub themes: usize,
}

impl HealthResponse {
    /// Response for the given degraded flag and catalog size.
    pub fn new(degraded: bool, themes: usize) -> Self {
        let status = if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self { status, themes }
    }
}
