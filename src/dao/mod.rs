/// Room, user and theme documents.
pub mod models;
/// Room document store abstraction and its backends.
pub mod room_store;
/// Storage abstraction layer errors.
pub mod storage;
