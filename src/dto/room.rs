use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{RoomEntity, ThemeEntity, UserEntity},
    dto::{format_system_time, validation::validate_username},
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Username of the host.
    #[validate(custom(function = validate_username))]
    pub username: String,
}

/// Payload used to enter an existing room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Username to enter with.
    #[validate(custom(function = validate_username))]
    pub username: String,
}

/// Payload used to start a round with a chosen theme.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThemeRequest {
    /// Catalog id of the chosen theme.
    #[validate(range(min = 1))]
    pub theme_id: u32,
}

/// Query string accepted by the room event stream.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// When set, the stream carries the view of this participant instead of raw snapshots.
    pub username: Option<String>,
}

/// Theme as exposed over the wire.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThemeSnapshot {
    /// Catalog id.
    pub id: u32,
    /// Prompt of the round.
    #[serde(rename = "descricao")]
    pub description: String,
    /// Meaning of the lowest number.
    #[serde(rename = "valor_minimo")]
    pub min_value: i64,
    /// Meaning of the highest number.
    #[serde(rename = "valor_maximo")]
    pub max_value: i64,
}

impl From<&ThemeEntity> for ThemeSnapshot {
    fn from(theme: &ThemeEntity) -> Self {
        Self {
            id: theme.id,
            description: theme.description.clone(),
            min_value: theme.min_value,
            max_value: theme.max_value,
        }
    }
}

/// Participant with the secret number of the current round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSnapshot {
    /// Display name.
    pub username: String,
    /// Secret number in `1..=100`.
    pub number: u8,
}

impl From<&UserEntity> for UserSnapshot {
    fn from(user: &UserEntity) -> Self {
        Self {
            username: user.username.clone(),
            number: user.number,
        }
    }
}

/// Full room document.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room code.
    pub id: String,
    /// Username of the creator.
    pub host: String,
    /// Participants in join order.
    pub users: Vec<UserSnapshot>,
    /// Theme of the current round.
    pub current_theme: Option<ThemeSnapshot>,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl From<&RoomEntity> for RoomSnapshot {
    fn from(room: &RoomEntity) -> Self {
        Self {
            id: room.id.clone(),
            host: room.host.clone(),
            users: room.users.iter().map(UserSnapshot::from).collect(),
            current_theme: room.current_theme.as_ref().map(ThemeSnapshot::from),
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

impl From<RoomEntity> for RoomSnapshot {
    fn from(room: RoomEntity) -> Self {
        Self::from(&room)
    }
}
