use crate::{
    dto::room::{RoomSnapshot, ThemeSnapshot, UserSnapshot},
    error::ServiceError,
    services::room_client::RoomSubscription,
    state::SharedState,
};

/// List every theme of the catalog.
pub fn list_themes(state: &SharedState) -> Vec<ThemeSnapshot> {
    state
        .catalog()
        .themes()
        .iter()
        .map(ThemeSnapshot::from)
        .collect()
}

/// Open a room hosted by `host`.
pub async fn create_room(state: &SharedState, host: &str) -> Result<RoomSnapshot, ServiceError> {
    let room = state.room_client().await?.create_room(host).await?;
    Ok(room.into())
}

/// Fetch a room, [`ServiceError::NotFound`] when missing.
pub async fn find_room(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    let room = state.room_client().await?.find_room(room_id).await?;
    Ok(room.into())
}

/// Add `username` to a room with a fresh number.
pub async fn join_room(
    state: &SharedState,
    room_id: &str,
    username: &str,
) -> Result<UserSnapshot, ServiceError> {
    let user = state
        .room_client()
        .await?
        .join_room(room_id, username)
        .await?;
    Ok(UserSnapshot::from(&user))
}

/// Remove the participant named `username`; used both for leaving and for kicks.
pub async fn remove_user(
    state: &SharedState,
    room_id: &str,
    username: &str,
) -> Result<(), ServiceError> {
    state
        .room_client()
        .await?
        .leave_room(room_id, username)
        .await?
        .map(|_| ())
        .ok_or_else(|| {
            ServiceError::NotFound(format!("user `{username}` not in room `{room_id}`"))
        })
}

/// Start a round with a random catalog theme.
pub async fn draw_new_game(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomSnapshot, ServiceError> {
    let room = state.room_client().await?.draw_new_game(room_id).await?;
    Ok(room.into())
}

/// Start a round with the catalog theme `theme_id`.
pub async fn change_theme(
    state: &SharedState,
    room_id: &str,
    theme_id: u32,
) -> Result<RoomSnapshot, ServiceError> {
    let room = state
        .room_client()
        .await?
        .change_theme_by_id(room_id, theme_id)
        .await?;
    Ok(room.into())
}

/// Open a live feed on an existing room.
pub async fn subscribe(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomSubscription, ServiceError> {
    let client = state.room_client().await?;
    // Fail fast instead of streaming a lone `room.closed`.
    client.find_room(room_id).await?;
    client.subscribe(room_id).await
}
