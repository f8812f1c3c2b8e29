/// CouchDB backend: one document per room, keyed `room::<code>`.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process backend.
pub mod memory;

use std::time::SystemTime;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::models::{RoomEntity, ThemeEntity, UserEntity};
use crate::dao::storage::StorageResult;

/// Change observed on a watched room document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomChange {
    /// Latest known content of the room.
    Updated(RoomEntity),
    /// The room document does not exist (anymore).
    Removed,
}

/// Live feed of a room document.
///
/// The feed always yields the current state first. Rapid successive writes may be
/// coalesced so only the latest state is observed. After [`RoomChange::Removed`] the
/// feed ends.
pub type RoomWatch = BoxStream<'static, RoomChange>;

/// Abstraction over the document store holding room documents.
///
/// Field updates fail with [`crate::dao::storage::StorageError::MissingRoom`] when the
/// room document does not exist.
pub trait RoomStore: Send + Sync {
    /// Write a whole room document, replacing any document with the same id.
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Read a room document, `None` when it does not exist.
    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Append `user` to the user list unless an identical record is already present.
    fn add_user(&self, id: String, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove every record equal to `user` from the user list.
    fn remove_user(&self, id: String, user: UserEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Overwrite both the current theme and the user list in a single write.
    fn update_round(
        &self,
        id: String,
        theme: ThemeEntity,
        users: Vec<UserEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a room document and end its feeds. Returns whether a document was removed.
    ///
    /// This is the removal primitive of the store: [`RoomStore::purge_stale`] goes through
    /// the same path, only guarded by the staleness check.
    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every room last updated before `cutoff`, returning how many were removed.
    ///
    /// A room written concurrently with its removal is kept.
    fn purge_stale(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<usize>>;
    /// Open a live feed on a room document, see [`RoomWatch`].
    fn watch_room(&self, id: String) -> BoxFuture<'static, StorageResult<RoomWatch>>;
    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
