//! In-process room store keeping every room behind a `watch` channel.
//!
//! Each room lives in the channel's current value, so field updates are atomic
//! read-modify-write operations and watchers naturally observe the latest state only.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt, Stream, StreamExt,
    future::{BoxFuture, ready},
    stream,
};
use tokio::sync::watch;

use crate::dao::{
    models::{RoomEntity, ThemeEntity, UserEntity},
    room_store::{RoomChange, RoomStore, RoomWatch},
    storage::{StorageError, StorageResult},
};

type RoomSlot = watch::Sender<Option<RoomEntity>>;

/// Room store backed by process memory. Rooms vanish when the process exits.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<String, RoomSlot>>,
}

impl MemoryRoomStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` to the stored room, touching its `updated_at` timestamp.
    fn modify(&self, id: &str, update: impl FnOnce(&mut RoomEntity)) -> StorageResult<()> {
        let slot = self
            .rooms
            .get(id)
            .ok_or_else(|| StorageError::missing_room(id))?;

        let updated = slot.send_if_modified(|current| match current {
            Some(room) => {
                update(room);
                room.updated_at = SystemTime::now();
                true
            }
            None => false,
        });

        if updated {
            Ok(())
        } else {
            Err(StorageError::missing_room(id))
        }
    }

    /// Drop a room unless `keep` holds for its content, ending every feed on it.
    fn remove_unless(&self, id: &str, keep: impl Fn(&RoomEntity) -> bool) -> bool {
        self.rooms
            .remove_if(id, |_, slot| !slot.borrow().as_ref().is_some_and(&keep))
            .map(|(_, slot)| slot.send_replace(None))
            .is_some()
    }
}

/// Turn a room channel into a feed that ends once the room disappears.
fn room_feed(
    mut receiver: watch::Receiver<Option<RoomEntity>>,
) -> impl Stream<Item = RoomChange> + Send + 'static {
    async_stream::stream! {
        loop {
            let current = receiver.borrow_and_update().clone();
            match current {
                Some(room) => yield RoomChange::Updated(room),
                None => {
                    yield RoomChange::Removed;
                    break;
                }
            }

            if receiver.changed().await.is_err() {
                yield RoomChange::Removed;
                break;
            }
        }
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        match self.rooms.entry(room.id.clone()) {
            Entry::Occupied(slot) => {
                slot.get().send_replace(Some(room));
            }
            Entry::Vacant(slot) => {
                let (sender, _receiver) = watch::channel(Some(room));
                slot.insert(sender);
            }
        }
        ready(Ok(())).boxed()
    }

    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let room = match self.rooms.get(&id) {
            Some(slot) => {
                let room = slot.borrow().clone();
                room
            }
            None => None,
        };
        ready(Ok(room)).boxed()
    }

    fn add_user(&self, id: String, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.modify(&id, |room| {
            if !room.users.contains(&user) {
                room.users.push(user);
            }
        });
        ready(result).boxed()
    }

    fn remove_user(
        &self,
        id: String,
        user: UserEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.modify(&id, |room| room.users.retain(|existing| existing != &user));
        ready(result).boxed()
    }

    fn update_round(
        &self,
        id: String,
        theme: ThemeEntity,
        users: Vec<UserEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.modify(&id, |room| {
            room.current_theme = Some(theme);
            room.users = users;
        });
        ready(result).boxed()
    }

    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.remove_unless(&id, |_| false);
        ready(Ok(removed)).boxed()
    }

    fn purge_stale(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<usize>> {
        let ids = self
            .rooms
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        let purged = ids
            .iter()
            .filter(|id| self.remove_unless(id, |room| room.updated_at >= cutoff))
            .count();
        ready(Ok(purged)).boxed()
    }

    fn watch_room(&self, id: String) -> BoxFuture<'static, StorageResult<RoomWatch>> {
        let feed: RoomWatch = match self.rooms.get(&id) {
            Some(slot) => room_feed(slot.subscribe()).boxed(),
            None => stream::once(ready(RoomChange::Removed)).boxed(),
        };
        ready(Ok(feed)).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(())).boxed()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn user(username: &str, number: u8) -> UserEntity {
        UserEntity {
            username: username.into(),
            number,
        }
    }

    fn theme() -> ThemeEntity {
        ThemeEntity {
            id: 1,
            description: "Velocidade de veículos".into(),
            min_value: 1,
            max_value: 100,
        }
    }

    async fn store_with_room() -> MemoryRoomStore {
        let store = MemoryRoomStore::new();
        store
            .create_room(RoomEntity::new("ROOM01".into(), user("Ana", 10)))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_then_find_returns_room() {
        let store = store_with_room().await;
        let room = store.find_room("ROOM01".into()).await.unwrap().unwrap();
        assert_eq!(room.host, "Ana");
        assert_eq!(room.users, vec![user("Ana", 10)]);
        assert!(store.find_room("NOPE".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_user_does_not_duplicate_identical_records() {
        let store = store_with_room().await;
        store.add_user("ROOM01".into(), user("Bob", 20)).await.unwrap();
        store.add_user("ROOM01".into(), user("Bob", 20)).await.unwrap();

        let room = store.find_room("ROOM01".into()).await.unwrap().unwrap();
        assert_eq!(room.users, vec![user("Ana", 10), user("Bob", 20)]);
    }

    #[tokio::test]
    async fn remove_user_only_matches_exact_record() {
        let store = store_with_room().await;
        store.add_user("ROOM01".into(), user("Bob", 20)).await.unwrap();

        store
            .remove_user("ROOM01".into(), user("Bob", 21))
            .await
            .unwrap();
        let room = store.find_room("ROOM01".into()).await.unwrap().unwrap();
        assert_eq!(room.users.len(), 2);

        store
            .remove_user("ROOM01".into(), user("Bob", 20))
            .await
            .unwrap();
        let room = store.find_room("ROOM01".into()).await.unwrap().unwrap();
        assert_eq!(room.users, vec![user("Ana", 10)]);
    }

    #[tokio::test]
    async fn updates_on_missing_room_fail() {
        let store = MemoryRoomStore::new();
        let err = store
            .update_round("GHOST1".into(), theme(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingRoom { room_id } if room_id == "GHOST1"));

        let err = store
            .add_user("GHOST1".into(), user("Ana", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingRoom { .. }));
    }

    #[tokio::test]
    async fn update_round_overwrites_theme_and_users() {
        let store = store_with_room().await;
        store
            .update_round("ROOM01".into(), theme(), vec![user("Ana", 55)])
            .await
            .unwrap();

        let room = store.find_room("ROOM01".into()).await.unwrap().unwrap();
        assert_eq!(room.current_theme, Some(theme()));
        assert_eq!(room.users, vec![user("Ana", 55)]);
        assert!(room.updated_at >= room.created_at);
    }

    #[tokio::test]
    async fn watch_yields_current_state_then_changes_then_removal() {
        let store = store_with_room().await;
        let mut feed = store.watch_room("ROOM01".into()).await.unwrap();

        match feed.next().await {
            Some(RoomChange::Updated(room)) => assert_eq!(room.users.len(), 1),
            other => panic!("expected initial snapshot, got {other:?}"),
        }

        store.add_user("ROOM01".into(), user("Bob", 20)).await.unwrap();
        match feed.next().await {
            Some(RoomChange::Updated(room)) => assert_eq!(room.users.len(), 2),
            other => panic!("expected updated snapshot, got {other:?}"),
        }

        assert!(store.delete_room("ROOM01".into()).await.unwrap());
        assert_eq!(feed.next().await, Some(RoomChange::Removed));
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn watch_coalesces_rapid_writes() {
        let store = store_with_room().await;
        let mut feed = store.watch_room("ROOM01".into()).await.unwrap();
        feed.next().await;

        store.add_user("ROOM01".into(), user("Bob", 20)).await.unwrap();
        store.add_user("ROOM01".into(), user("Cid", 30)).await.unwrap();

        match feed.next().await {
            Some(RoomChange::Updated(room)) => assert_eq!(room.users.len(), 3),
            other => panic!("expected latest snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn watching_missing_room_reports_removal() {
        let store = MemoryRoomStore::new();
        let mut feed = store.watch_room("GHOST1".into()).await.unwrap();
        assert_eq!(feed.next().await, Some(RoomChange::Removed));
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn purge_stale_removes_only_old_rooms() {
        let store = store_with_room().await;
        let cutoff = SystemTime::now() + Duration::from_secs(1);
        store
            .create_room(RoomEntity::new("ROOM02".into(), user("Bob", 3)))
            .await
            .unwrap();

        assert_eq!(
            store
                .purge_stale(SystemTime::UNIX_EPOCH)
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.purge_stale(cutoff).await.unwrap(), 2);
        assert!(store.find_room("ROOM01".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_closes_feeds_of_stale_rooms_only() {
        let store = store_with_room().await;
        let cutoff = SystemTime::now() + Duration::from_secs(1);
        let mut stale_feed = store.watch_room("ROOM01".into()).await.unwrap();
        stale_feed.next().await;

        let mut fresh = RoomEntity::new("ROOM02".into(), user("Bob", 3));
        fresh.updated_at = cutoff + Duration::from_secs(60);
        store.create_room(fresh).await.unwrap();

        assert_eq!(store.purge_stale(cutoff).await.unwrap(), 1);
        assert_eq!(stale_feed.next().await, Some(RoomChange::Removed));
        assert_eq!(stale_feed.next().await, None);
        assert!(store.find_room("ROOM02".into()).await.unwrap().is_some());

        // The purged room is gone, so deleting it again removes nothing.
        assert!(!store.delete_room("ROOM01".into()).await.unwrap());
        assert!(store.delete_room("ROOM02".into()).await.unwrap());
    }
}
