use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::room::{
        ChangeThemeRequest, CreateRoomRequest, JoinRoomRequest, RoomSnapshot, UserSnapshot,
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes operating on room documents.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{id}", get(find_room))
        .route("/rooms/{id}/users", post(join_room))
        .route("/rooms/{id}/users/{username}", delete(remove_user))
        .route("/rooms/{id}/draw", post(draw_new_game))
        .route("/rooms/{id}/theme", put(change_theme))
}

/// Open a room hosted by the given user.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSnapshot),
        (status = 400, description = "Invalid username"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomSnapshot>), AppError> {
    let room = room_service::create_room(&state, &payload.username).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Fetch a room document.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room document", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn find_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::find_room(&state, &id).await?;
    Ok(Json(room))
}

/// Enter a room, receiving a number nobody else holds.
#[utoipa::path(
    post,
    path = "/rooms/{id}/users",
    tag = "rooms",
    params(("id" = String, Path, description = "Room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 201, description = "User added", body = UserSnapshot),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Username taken or room full")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<(StatusCode, Json<UserSnapshot>), AppError> {
    let user = room_service::join_room(&state, &id, &payload.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Leave a room, or remove someone else from it.
#[utoipa::path(
    delete,
    path = "/rooms/{id}/users/{username}",
    tag = "rooms",
    params(
        ("id" = String, Path, description = "Room code"),
        ("username" = String, Path, description = "Exact username to remove")
    ),
    responses(
        (status = 204, description = "User removed"),
        (status = 404, description = "Room or user not found")
    )
)]
pub async fn remove_user(
    State(state): State<SharedState>,
    Path((id, username)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    room_service::remove_user(&state, &id, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start a new round with a random theme.
#[utoipa::path(
    post,
    path = "/rooms/{id}/draw",
    tag = "rooms",
    params(("id" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Round started", body = RoomSnapshot),
        (status = 404, description = "Room not found"),
        (status = 409, description = "No themes available")
    )
)]
pub async fn draw_new_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::draw_new_game(&state, &id).await?;
    Ok(Json(room))
}

/// Start a new round with the chosen theme.
#[utoipa::path(
    put,
    path = "/rooms/{id}/theme",
    tag = "rooms",
    params(("id" = String, Path, description = "Room code")),
    request_body = ChangeThemeRequest,
    responses(
        (status = 200, description = "Round started", body = RoomSnapshot),
        (status = 400, description = "Unknown theme"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn change_theme(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<ChangeThemeRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::change_theme(&state, &id, payload.theme_id).await?;
    Ok(Json(room))
}
