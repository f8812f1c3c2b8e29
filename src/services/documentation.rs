use utoipa::OpenApi;

/// Aggregated OpenAPI specification for Arranjo Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::themes::list_themes,
        crate::routes::rooms::create_room,
        crate::routes::rooms::find_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::remove_user,
        crate::routes::rooms::draw_new_game,
        crate::routes::rooms::change_theme,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::ChangeThemeRequest,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::UserSnapshot,
            crate::dto::room::ThemeSnapshot,
            crate::dto::sse::RoomClosedEvent,
            crate::dto::sse::SessionEvictedEvent,
            crate::session::view::RoomView,
            crate::session::view::UserRow,
            crate::session::view::ThemeView,
            crate::session::view::Eviction,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "themes", description = "Theme catalog"),
        (name = "rooms", description = "Room document operations"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_routes() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;
        for path in [
            "/healthcheck",
            "/themes",
            "/rooms",
            "/rooms/{id}",
            "/rooms/{id}/users",
            "/rooms/{id}/users/{username}",
            "/rooms/{id}/draw",
            "/rooms/{id}/theme",
            "/rooms/{id}/events",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
