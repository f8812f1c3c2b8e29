/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Periodic removal of idle rooms.
pub mod janitor;
/// Number and room code generation.
pub mod numbers;
/// Room operations over the document store.
pub mod room_client;
/// Room operations bound to the shared application state.
pub mod room_service;
/// Server-Sent Events forwarding of room feeds.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
