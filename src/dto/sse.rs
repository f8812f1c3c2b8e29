use serde::Serialize;
use utoipa::ToSchema;

use crate::session::view::Eviction;

/// Full room snapshot, sent to anonymous subscribers.
pub const ROOM_UPDATED: &str = "room.updated";
/// The room document was deleted; the stream ends afterwards.
pub const ROOM_CLOSED: &str = "room.closed";
/// View of the subscribed participant.
pub const ROOM_VIEW: &str = "room.view";
/// The subscribed participant left the room; the stream ends afterwards.
pub const SESSION_EVICTED: &str = "session.evicted";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Event name, one of the constants of this module.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload of [`ROOM_CLOSED`].
pub struct RoomClosedEvent {
    /// Code of the closed room.
    pub room_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Payload of [`SESSION_EVICTED`].
pub struct SessionEvictedEvent {
    /// Machine-readable cause.
    pub reason: Eviction,
    /// Human-readable explanation.
    pub message: String,
}

impl From<Eviction> for SessionEvictedEvent {
    fn from(reason: Eviction) -> Self {
        Self {
            reason,
            message: reason.message().to_string(),
        }
    }
}
