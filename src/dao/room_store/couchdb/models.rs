use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::dao::models::{RoomEntity, ThemeEntity, UserEntity};

/// Id prefix shared by every room document.
pub const ROOM_PREFIX: &str = "room::";
/// Highest code point, closing `_all_docs` key ranges.
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body of a `_changes` long-poll response.
#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Minimal response returned by document writes and deletions.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

/// Room document as stored in CouchDB: the room fields next to `_id` and `_rev`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomBody,
}

/// Room fields in the shared document shape, timestamps as RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBody {
    pub id: String,
    pub host: String,
    pub users: Vec<UserEntity>,
    pub current_theme: Option<ThemeEntity>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RoomBody {
    /// Whether the room was last written before `cutoff`.
    pub fn is_stale(&self, cutoff: SystemTime) -> bool {
        self.updated_at < OffsetDateTime::from(cutoff)
    }
}

impl From<(RoomEntity, Option<String>)> for CouchRoomDocument {
    fn from((room, rev): (RoomEntity, Option<String>)) -> Self {
        Self {
            id: room_doc_id(&room.id),
            rev,
            room: RoomBody {
                id: room.id,
                host: room.host,
                users: room.users,
                current_theme: room.current_theme,
                created_at: OffsetDateTime::from(room.created_at),
                updated_at: OffsetDateTime::from(room.updated_at),
            },
        }
    }
}

impl From<CouchRoomDocument> for RoomEntity {
    fn from(doc: CouchRoomDocument) -> Self {
        RoomEntity {
            id: doc.room.id,
            host: doc.room.host,
            users: doc.room.users,
            current_theme: doc.room.current_theme,
            created_at: SystemTime::from(doc.room.created_at),
            updated_at: SystemTime::from(doc.room.updated_at),
        }
    }
}

/// Document id of the room `code`.
pub fn room_doc_id(code: &str) -> String {
    format!("{}{}", ROOM_PREFIX, code)
}

#[cfg(test)]
mod tests {
    use time::format_description::well_known::Rfc3339;

    use super::*;

    #[test]
    fn document_round_trips_room_fields() {
        let room = RoomEntity::new(
            "K3X9QZ".into(),
            UserEntity {
                username: "Ana".into(),
                number: 42,
            },
        );
        let doc = CouchRoomDocument::from((room.clone(), Some("1-abc".into())));
        assert_eq!(doc.id, "room::K3X9QZ");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "room::K3X9QZ");
        assert_eq!(json["_rev"], "1-abc");
        assert_eq!(json["id"], "K3X9QZ");
        assert_eq!(json["host"], "Ana");
        assert!(json["currentTheme"].is_null());
        assert!(json.get("code").is_none());
        assert!(json.get("current_theme").is_none());

        let created = json["createdAt"].as_str().unwrap();
        assert!(OffsetDateTime::parse(created, &Rfc3339).is_ok(), "{created}");
        assert!(json["updatedAt"].is_string());

        let parsed: CouchRoomDocument = serde_json::from_value(json).unwrap();
        assert_eq!(RoomEntity::from(parsed), room);
    }

    #[test]
    fn documents_written_by_other_clients_are_readable() {
        let json = serde_json::json!({
            "_id": "room::ABC123",
            "_rev": "3-def",
            "id": "ABC123",
            "host": "Ana",
            "users": [{"username": "Ana", "number": 7}],
            "currentTheme": {
                "id": 2,
                "descricao": "Popularidade de comidas",
                "valor_minimo": 1,
                "valor_maximo": 100
            },
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:30:00.5Z"
        });

        let doc: CouchRoomDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.rev.as_deref(), Some("3-def"));
        assert!(doc.room.is_stale(SystemTime::now()));

        let room = RoomEntity::from(doc);
        assert_eq!(room.id, "ABC123");
        assert_eq!(room.current_theme.map(|theme| theme.id), Some(2));
        let elapsed = room.updated_at.duration_since(room.created_at).unwrap();
        assert_eq!(elapsed.as_millis(), 30 * 60 * 1000 + 500);
    }

    #[test]
    fn new_documents_omit_revision() {
        let room = RoomEntity::new(
            "AAAAAA".into(),
            UserEntity {
                username: "Bob".into(),
                number: 1,
            },
        );
        let json = serde_json::to_value(CouchRoomDocument::from((room, None))).unwrap();
        assert!(json.get("_rev").is_none());
    }
}
