//! Everything a participant sees, derived from the latest room document alone.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::{
    models::{RoomEntity, ThemeEntity},
    room_store::RoomChange,
};

/// Why a participant got sent back to the entry screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Eviction {
    /// The participant is no longer listed in the room.
    RemovedFromRoom,
    /// The room document no longer exists.
    RoomClosed,
}

impl Eviction {
    /// Text shown to the evicted participant.
    pub fn message(&self) -> &'static str {
        match self {
            Eviction::RemovedFromRoom => "you were removed from the room",
            Eviction::RoomClosed => "the room no longer exists",
        }
    }
}

/// One line of the participant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    /// Display name.
    pub username: String,
    /// Crown badge.
    pub is_host: bool,
    /// The viewer may kick this participant.
    pub kickable: bool,
}

/// Theme block shown once a round started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThemeView {
    /// Catalog id.
    pub id: u32,
    /// Prompt of the round.
    pub description: String,
    /// Meaning of the lowest number.
    pub min_value: i64,
    /// Meaning of the highest number.
    pub max_value: i64,
}

impl From<&ThemeEntity> for ThemeView {
    fn from(theme: &ThemeEntity) -> Self {
        Self {
            id: theme.id,
            description: theme.description.clone(),
            min_value: theme.min_value,
            max_value: theme.max_value,
        }
    }
}

/// Screen state of a participant inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    /// Code of the room.
    pub room_id: String,
    /// The viewer.
    pub username: String,
    /// The viewer's secret number.
    pub number: u8,
    /// Whether the viewer hosts the room.
    pub is_host: bool,
    /// Participants sorted by username.
    pub users: Vec<UserRow>,
    /// Current round, absent before the first draw.
    pub theme: Option<ThemeView>,
}

impl RoomView {
    /// Reduce a room document to what `me` sees.
    pub fn derive(room: &RoomEntity, me: &str) -> Result<Self, Eviction> {
        let current = room.user(me).ok_or(Eviction::RemovedFromRoom)?;
        let viewer_is_host = room.host == me;

        let mut users = room
            .users
            .iter()
            .map(|user| UserRow {
                username: user.username.clone(),
                is_host: user.username == room.host,
                kickable: viewer_is_host && user.username != me,
            })
            .collect::<Vec<_>>();
        users.sort_by(|a, b| {
            a.username
                .to_lowercase()
                .cmp(&b.username.to_lowercase())
                .then_with(|| a.username.cmp(&b.username))
        });

        Ok(Self {
            room_id: room.id.clone(),
            username: current.username.clone(),
            number: current.number,
            is_host: viewer_is_host,
            users,
            theme: room.current_theme.as_ref().map(ThemeView::from),
        })
    }

    /// Reduce a change observed on the room feed.
    pub fn from_change(change: &RoomChange, me: &str) -> Result<Self, Eviction> {
        match change {
            RoomChange::Updated(room) => Self::derive(room, me),
            RoomChange::Removed => Err(Eviction::RoomClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::UserEntity;

    fn room() -> RoomEntity {
        let mut room = RoomEntity::new(
            "ABC123".into(),
            UserEntity {
                username: "bruna".into(),
                number: 12,
            },
        );
        room.users.push(UserEntity {
            username: "Ana".into(),
            number: 77,
        });
        room.users.push(UserEntity {
            username: "Caio".into(),
            number: 3,
        });
        room
    }

    #[test]
    fn host_view_sorts_users_and_flags_kickable_rows() {
        let view = RoomView::derive(&room(), "bruna").unwrap();
        assert!(view.is_host);
        assert_eq!(view.number, 12);
        assert_eq!(
            view.users,
            vec![
                UserRow {
                    username: "Ana".into(),
                    is_host: false,
                    kickable: true,
                },
                UserRow {
                    username: "bruna".into(),
                    is_host: true,
                    kickable: false,
                },
                UserRow {
                    username: "Caio".into(),
                    is_host: false,
                    kickable: true,
                },
            ]
        );
        assert_eq!(view.theme, None);
    }

    #[test]
    fn participant_view_has_no_kickable_rows() {
        let view = RoomView::derive(&room(), "Caio").unwrap();
        assert!(!view.is_host);
        assert_eq!(view.number, 3);
        assert!(view.users.iter().all(|row| !row.kickable));
        assert!(view.users.iter().any(|row| row.is_host && row.username == "bruna"));
    }

    #[test]
    fn theme_is_exposed_once_drawn() {
        let mut room = room();
        room.current_theme = Some(ThemeEntity {
            id: 4,
            description: "Coisas que dão medo".into(),
            min_value: 1,
            max_value: 100,
        });

        let view = RoomView::derive(&room, "Ana").unwrap();
        let theme = view.theme.unwrap();
        assert_eq!(theme.description, "Coisas que dão medo");
        assert_eq!((theme.min_value, theme.max_value), (1, 100));
    }

    #[test]
    fn view_serializes_with_camel_case_fields() {
        let mut room = room();
        room.current_theme = Some(ThemeEntity {
            id: 4,
            description: "Coisas que dão medo".into(),
            min_value: 1,
            max_value: 100,
        });

        let json = serde_json::to_value(RoomView::derive(&room, "bruna").unwrap()).unwrap();
        assert_eq!(json["roomId"], "ABC123");
        assert_eq!(json["isHost"], true);
        assert_eq!(json["users"][1]["isHost"], true);
        assert_eq!(json["theme"]["minValue"], 1);
        assert_eq!(json["theme"]["maxValue"], 100);
        assert!(json.get("is_host").is_none());
    }

    #[test]
    fn missing_viewer_is_evicted() {
        assert_eq!(
            RoomView::derive(&room(), "Zeca"),
            Err(Eviction::RemovedFromRoom)
        );
        // Lookup is exact, matching the username the viewer joined with.
        assert_eq!(
            RoomView::derive(&room(), "ana"),
            Err(Eviction::RemovedFromRoom)
        );
        assert_eq!(
            RoomView::from_change(&RoomChange::Removed, "Ana"),
            Err(Eviction::RoomClosed)
        );
    }
}
