//! Room operations layered over a [`RoomStore`].
//!
//! Join checks run against a snapshot read just before the atomic append, and rounds
//! overwrite the whole user list, so concurrent writers follow the store's
//! last-write-wins semantics.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::Stream;
use tracing::{debug, info};

use crate::{
    catalog::ThemeCatalog,
    dao::{
        models::{RoomEntity, ThemeEntity, UserEntity},
        room_store::{RoomChange, RoomStore, RoomWatch},
    },
    error::ServiceError,
    services::numbers,
};

/// Client-side handle on the room document store.
#[derive(Clone)]
pub struct RoomClient {
    store: Arc<dyn RoomStore>,
    catalog: Arc<ThemeCatalog>,
}

impl RoomClient {
    /// Client over `store`, drawing themes from `catalog`.
    pub fn new(store: Arc<dyn RoomStore>, catalog: Arc<ThemeCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Themes available for rounds.
    pub fn catalog(&self) -> &ThemeCatalog {
        &self.catalog
    }

    /// Create a room hosted by `host_username` and persist it.
    pub async fn create_room(&self, host_username: &str) -> Result<RoomEntity, ServiceError> {
        let username = normalize_username(host_username)?;
        let (code, number) = {
            let mut rng = rand::rng();
            let code = numbers::room_code(&mut rng);
            let number = numbers::unique_number(&[], &mut rng);
            (code, number)
        };
        let number = number.ok_or_else(|| {
            ServiceError::InvalidState("no number available for the host".into())
        })?;

        let room = RoomEntity::new(code, UserEntity { username, number });
        self.store.create_room(room.clone()).await?;
        info!(room_id = %room.id, host = %room.host, "room created");
        Ok(room)
    }

    /// Fetch a room, failing with [`ServiceError::NotFound`] when it does not exist.
    pub async fn find_room(&self, room_id: &str) -> Result<RoomEntity, ServiceError> {
        self.store
            .find_room(room_id.to_string())
            .await?
            .ok_or_else(|| room_not_found(room_id))
    }

    /// Add `username` to the room with a number nobody else holds.
    pub async fn join_room(
        &self,
        room_id: &str,
        username: &str,
    ) -> Result<UserEntity, ServiceError> {
        let username = normalize_username(username)?;
        let room = self.find_room(room_id).await?;

        if room.has_username(&username) {
            return Err(ServiceError::Conflict(format!(
                "username `{username}` is already taken in room `{room_id}`"
            )));
        }

        if room.users.len() >= numbers::ROOM_CAPACITY {
            return Err(room_full(room_id));
        }
        let number = numbers::unique_number(&room.used_numbers(), &mut rand::rng())
            .ok_or_else(|| room_full(room_id))?;

        let user = UserEntity { username, number };
        self.store
            .add_user(room_id.to_string(), user.clone())
            .await?;
        info!(room_id, username = %user.username, "user joined room");
        Ok(user)
    }

    /// Remove exactly `user` (username and number) from the room.
    pub async fn kick_user(&self, room_id: &str, user: &UserEntity) -> Result<(), ServiceError> {
        self.store
            .remove_user(room_id.to_string(), user.clone())
            .await?;
        info!(room_id, username = %user.username, "user removed from room");
        Ok(())
    }

    /// Remove the record named `username`, if present. Returns the removed record.
    pub async fn leave_room(
        &self,
        room_id: &str,
        username: &str,
    ) -> Result<Option<UserEntity>, ServiceError> {
        let room = self.find_room(room_id).await?;
        let Some(user) = room.user(username).cloned() else {
            debug!(room_id, username, "user already gone from room");
            return Ok(None);
        };

        self.kick_user(room_id, &user).await?;
        Ok(Some(user))
    }

    /// Start a new round with a theme drawn at random from the catalog.
    pub async fn draw_new_game(&self, room_id: &str) -> Result<RoomEntity, ServiceError> {
        let theme = self
            .catalog
            .pick(&mut rand::rng())
            .cloned()
            .ok_or_else(|| ServiceError::InvalidState("no themes available".into()))?;
        self.start_round(room_id, theme).await
    }

    /// Start a new round with an explicitly chosen theme.
    pub async fn change_theme(
        &self,
        room_id: &str,
        theme: ThemeEntity,
    ) -> Result<RoomEntity, ServiceError> {
        self.start_round(room_id, theme).await
    }

    /// Same as [`RoomClient::change_theme`] with a theme looked up in the catalog.
    pub async fn change_theme_by_id(
        &self,
        room_id: &str,
        theme_id: u32,
    ) -> Result<RoomEntity, ServiceError> {
        let theme = self
            .catalog
            .find(theme_id)
            .cloned()
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown theme `{theme_id}`")))?;
        self.start_round(room_id, theme).await
    }

    async fn start_round(
        &self,
        room_id: &str,
        theme: ThemeEntity,
    ) -> Result<RoomEntity, ServiceError> {
        let mut room = self.find_room(room_id).await?;
        let users = numbers::reassign_numbers(&room.users, &mut rand::rng()).ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "room `{room_id}` has more users than available numbers"
            ))
        })?;

        self.store
            .update_round(room_id.to_string(), theme.clone(), users.clone())
            .await?;
        info!(room_id, theme_id = theme.id, users = users.len(), "new round started");

        room.current_theme = Some(theme);
        room.users = users;
        Ok(room)
    }

    /// Open a live feed on the room document.
    pub async fn subscribe(&self, room_id: &str) -> Result<RoomSubscription, ServiceError> {
        let feed = self.store.watch_room(room_id.to_string()).await?;
        debug!(room_id, "room subscription opened");
        Ok(RoomSubscription {
            room_id: room_id.to_string(),
            feed,
        })
    }
}

/// Live stream of changes for one room. Dropping or cancelling it stops the feed.
pub struct RoomSubscription {
    room_id: String,
    feed: RoomWatch,
}

impl RoomSubscription {
    /// Room being followed.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Stop listening to the room.
    pub fn cancel(self) {
        debug!(room_id = %self.room_id, "room subscription cancelled");
    }
}

impl Stream for RoomSubscription {
    type Item = RoomChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.feed.as_mut().poll_next(cx)
    }
}

fn normalize_username(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "username must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

fn room_full(room_id: &str) -> ServiceError {
    ServiceError::CapacityExceeded(format!("room `{room_id}` is full"))
}

fn room_not_found(room_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("room `{room_id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use futures::StreamExt;

    use super::*;
    use crate::dao::room_store::memory::MemoryRoomStore;

    fn theme(id: u32, description: &str) -> ThemeEntity {
        ThemeEntity {
            id,
            description: description.into(),
            min_value: 1,
            max_value: 100,
        }
    }

    fn catalog() -> ThemeCatalog {
        ThemeCatalog::new(vec![
            theme(1, "Tamanho de animais"),
            theme(2, "Popularidade de comidas"),
            theme(3, "Medo de situações"),
        ])
    }

    fn client_with(store: MemoryRoomStore, catalog: ThemeCatalog) -> RoomClient {
        RoomClient::new(Arc::new(store), Arc::new(catalog))
    }

    fn client() -> RoomClient {
        client_with(MemoryRoomStore::new(), catalog())
    }

    fn assert_numbers_form_a_set(room: &RoomEntity) {
        let numbers = room.used_numbers();
        let distinct = numbers.iter().collect::<HashSet<_>>();
        assert_eq!(distinct.len(), numbers.len(), "duplicate numbers in {numbers:?}");
        assert!(numbers.iter().all(|number| (1..=100).contains(number)));
        assert!(numbers.len() <= 100);
    }

    #[tokio::test]
    async fn create_room_holds_only_the_host() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();

        assert_eq!(room.host, "Ana");
        assert_eq!(room.users.len(), 1);
        assert_eq!(room.users[0].username, "Ana");
        assert!((1..=100).contains(&room.users[0].number));
        assert!(room.current_theme.is_none());

        let stored = client.find_room(&room.id).await.unwrap();
        assert_eq!(stored, room);
    }

    #[tokio::test]
    async fn create_room_trims_and_rejects_blank_names() {
        let client = client();
        let room = client.create_room("  Ana ").await.unwrap();
        assert_eq!(room.host, "Ana");

        let err = client.create_room("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn join_adds_user_with_distinct_number() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();

        let bob = client.join_room(&room.id, "Bob").await.unwrap();
        let room = client.find_room(&room.id).await.unwrap();

        assert_eq!(room.users.len(), 2);
        assert!(room.users.contains(&bob));
        assert_numbers_form_a_set(&room);
    }

    #[tokio::test]
    async fn join_rejects_case_insensitive_duplicates() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();
        client.join_room(&room.id, "Bob").await.unwrap();

        for candidate in ["ana", "ANA", "aNa", "bob"] {
            let err = client.join_room(&room.id, candidate).await.unwrap_err();
            assert!(
                matches!(err, ServiceError::Conflict(_)),
                "{candidate} should conflict"
            );
        }
        assert_eq!(client.find_room(&room.id).await.unwrap().users.len(), 2);
    }

    #[tokio::test]
    async fn join_unknown_room_is_not_found() {
        let client = client();
        let err = client.join_room("NOPE00", "Bob").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_fails_once_room_is_full() {
        let client = client();
        let room = client.create_room("player-0").await.unwrap();
        for index in 1..100 {
            client
                .join_room(&room.id, &format!("player-{index}"))
                .await
                .unwrap();
        }

        let full = client.find_room(&room.id).await.unwrap();
        assert_eq!(full.users.len(), 100);
        assert_numbers_form_a_set(&full);

        let err = client.join_room(&room.id, "late").await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));
    }

    #[tokio::test]
    async fn join_counts_members_not_distinct_numbers() {
        let store = MemoryRoomStore::new();
        let client = client_with(store.clone(), catalog());
        let room = client.create_room("player-0").await.unwrap();
        let host_number = room.users[0].number;

        // 99 more members reusing the host number: 100 records, 1 distinct number.
        for index in 1..100 {
            store
                .add_user(
                    room.id.clone(),
                    UserEntity {
                        username: format!("player-{index}"),
                        number: host_number,
                    },
                )
                .await
                .unwrap();
        }

        let err = client.join_room(&room.id, "late").await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));
        assert_eq!(client.find_room(&room.id).await.unwrap().users.len(), 100);
    }

    #[tokio::test]
    async fn draw_assigns_theme_from_catalog_and_fresh_numbers() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();
        client.join_room(&room.id, "Bob").await.unwrap();

        let drawn = client.draw_new_game(&room.id).await.unwrap();
        let stored = client.find_room(&room.id).await.unwrap();
        assert_eq!(drawn.users, stored.users);
        assert_eq!(drawn.current_theme, stored.current_theme);

        let theme = stored.current_theme.clone().unwrap();
        assert!(client.catalog().themes().contains(&theme));
        assert_eq!(
            stored
                .users
                .iter()
                .map(|user| user.username.as_str())
                .collect::<Vec<_>>(),
            vec!["Ana", "Bob"]
        );
        assert_numbers_form_a_set(&stored);
    }

    #[tokio::test]
    async fn draw_with_empty_catalog_is_rejected() {
        let client = client_with(MemoryRoomStore::new(), ThemeCatalog::default());
        let room = client.create_room("Ana").await.unwrap();

        let err = client.draw_new_game(&room.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(
            client
                .find_room(&room.id)
                .await
                .unwrap()
                .current_theme
                .is_none()
        );
    }

    #[tokio::test]
    async fn change_theme_uses_the_chosen_theme() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();
        client.join_room(&room.id, "Bob").await.unwrap();
        client.join_room(&room.id, "Cid").await.unwrap();

        let chosen = theme(2, "Popularidade de comidas");
        let updated = client.change_theme(&room.id, chosen.clone()).await.unwrap();
        assert_eq!(updated.current_theme, Some(chosen));
        assert_eq!(updated.users.len(), 3);
        assert_numbers_form_a_set(&updated);

        let err = client.change_theme_by_id(&room.id, 99).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn kick_removes_exactly_one_record() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();
        let bob = client.join_room(&room.id, "Bob").await.unwrap();
        let cid = client.join_room(&room.id, "Cid").await.unwrap();
        let before = client.find_room(&room.id).await.unwrap();

        client.kick_user(&room.id, &bob).await.unwrap();

        let after = client.find_room(&room.id).await.unwrap();
        assert_eq!(after.users.len(), 2);
        assert!(!after.users.contains(&bob));
        assert!(after.users.contains(&cid));
        assert_eq!(after.user("Ana"), before.user("Ana"));
    }

    #[tokio::test]
    async fn host_leaving_keeps_host_field() {
        let client = client();
        let room = client.create_room("Ana").await.unwrap();
        client.join_room(&room.id, "Bob").await.unwrap();

        let removed = client.leave_room(&room.id, "Ana").await.unwrap();
        assert_eq!(removed.map(|user| user.username), Some("Ana".to_string()));
        assert_eq!(client.leave_room(&room.id, "Ana").await.unwrap(), None);

        let room = client.find_room(&room.id).await.unwrap();
        assert_eq!(room.host, "Ana");
        assert_eq!(room.users.len(), 1);
    }

    #[tokio::test]
    async fn subscription_reports_remote_changes() {
        let store = MemoryRoomStore::new();
        let client = client_with(store.clone(), catalog());
        let room = client.create_room("Ana").await.unwrap();

        let mut subscription = client.subscribe(&room.id).await.unwrap();
        assert_eq!(subscription.room_id(), room.id);
        assert!(matches!(
            subscription.next().await,
            Some(RoomChange::Updated(_))
        ));

        client.join_room(&room.id, "Bob").await.unwrap();
        match subscription.next().await {
            Some(RoomChange::Updated(room)) => assert_eq!(room.users.len(), 2),
            other => panic!("expected update, got {other:?}"),
        }

        store.delete_room(room.id.clone()).await.unwrap();
        assert_eq!(subscription.next().await, Some(RoomChange::Removed));
        subscription.cancel();
    }
}
