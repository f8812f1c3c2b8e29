use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Lowest number a user can be assigned.
pub const MIN_NUMBER: u8 = 1;
/// Highest number a user can be assigned; also the room capacity.
pub const MAX_NUMBER: u8 = 100;

/// Theme drawn for a round: a prompt together with its guessing range.
///
/// Field names on the wire follow the static catalog (`descricao`, `valor_minimo`,
/// `valor_maximo`) so catalog entries can be stored in rooms verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeEntity {
    /// Stable identifier inside the catalog.
    pub id: u32,
    /// Prompt shown to the players.
    #[serde(rename = "descricao")]
    pub description: String,
    /// Lower bound of the guessing range.
    #[serde(rename = "valor_minimo")]
    pub min_value: i64,
    /// Upper bound of the guessing range.
    #[serde(rename = "valor_maximo")]
    pub max_value: i64,
}

/// Participant of a room together with the number drawn for the current round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserEntity {
    /// Display name, unique inside the room regardless of letter casing.
    pub username: String,
    /// Secret number in `MIN_NUMBER..=MAX_NUMBER`, unique inside the room.
    pub number: u8,
}

impl UserEntity {
    /// Whether `candidate` names this user, ignoring letter casing.
    pub fn has_username_ignoring_case(&self, candidate: &str) -> bool {
        self.username.to_lowercase() == candidate.to_lowercase()
    }
}

/// Room document shared by every participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntity {
    /// Short opaque room code.
    pub id: String,
    /// Username of the creator. Never reassigned.
    pub host: String,
    /// Participants in join order.
    pub users: Vec<UserEntity>,
    /// Theme of the current round, absent until the first draw.
    pub current_theme: Option<ThemeEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time any field of the room was written.
    pub updated_at: SystemTime,
}

impl RoomEntity {
    /// Fresh room holding only its host.
    pub fn new(id: String, host: UserEntity) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            host: host.username.clone(),
            users: vec![host],
            current_theme: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a user by exact username.
    pub fn user(&self, username: &str) -> Option<&UserEntity> {
        self.users.iter().find(|user| user.username == username)
    }

    /// Whether a user with the same username (ignoring case) is already present.
    pub fn has_username(&self, candidate: &str) -> bool {
        self.users
            .iter()
            .any(|user| user.has_username_ignoring_case(candidate))
    }

    /// Numbers currently assigned to users.
    pub fn used_numbers(&self) -> Vec<u8> {
        self.users.iter().map(|user| user.number).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_uses_catalog_field_names() {
        let theme: ThemeEntity = serde_json::from_str(
            r#"{"id": 3, "descricao": "Tamanho de animais", "valor_minimo": 1, "valor_maximo": 100}"#,
        )
        .unwrap();
        assert_eq!(theme.description, "Tamanho de animais");
        assert_eq!(theme.min_value, 1);
        assert_eq!(theme.max_value, 100);

        let json = serde_json::to_value(&theme).unwrap();
        assert_eq!(json["descricao"], "Tamanho de animais");
    }

    #[test]
    fn username_lookup_ignores_case() {
        let room = RoomEntity::new(
            "ABC123".into(),
            UserEntity {
                username: "Ana".into(),
                number: 7,
            },
        );
        assert!(room.has_username("ana"));
        assert!(room.has_username("ANA"));
        assert!(!room.has_username("Bob"));
        assert!(room.user("ana").is_none());
        assert_eq!(room.host, "Ana");
        assert!(room.current_theme.is_none());
    }
}
