use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::room::ThemeSnapshot, services::room_service, state::SharedState};

/// Routes exposing the theme catalog.
pub fn router() -> Router<SharedState> {
    Router::new().route("/themes", get(list_themes))
}

/// List the themes a round can be played with.
#[utoipa::path(
    get,
    path = "/themes",
    tag = "themes",
    responses((status = 200, description = "Theme catalog", body = [ThemeSnapshot]))
)]
pub async fn list_themes(State(state): State<SharedState>) -> Json<Vec<ThemeSnapshot>> {
    Json(room_service::list_themes(&state))
}
