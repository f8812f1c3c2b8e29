use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::room::EventsQuery,
    error::AppError,
    services::{room_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "sse",
    params(
        ("id" = String, Path, description = "Room code"),
        EventsQuery
    ),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found")
    )
)]
/// Stream changes of one room: raw snapshots, or the view of `username` when given.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = room_service::subscribe(&state, &id).await?;
    let username = query
        .username
        .map(|username| username.trim().to_string())
        .filter(|username| !username.is_empty());
    info!(room_id = %id, username = ?username, "new room SSE connection");
    Ok(sse_service::to_sse_stream(subscription, username))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{id}/events", get(room_stream))
}
