//! Participant-side session controller.
//!
//! A [`RoomSession`] owns everything a client tracks while playing: the remembered
//! room/username pair, the live room subscription and the theme staged for
//! confirmation. Its lifetime follows the room: entering a room opens the
//! subscription, logging out (or being evicted) tears it down.

/// Share links carrying the room code.
pub mod link;
/// Remembered room and username.
pub mod storage;
/// Participant view reducer.
pub mod view;

use futures::StreamExt;
use reqwest::Url;
use tracing::{info, warn};

use crate::{
    dao::models::{RoomEntity, ThemeEntity, UserEntity},
    error::ServiceError,
    services::room_client::{RoomClient, RoomSubscription},
};

use self::{
    storage::{SessionStorage, StoredSession, clear_session, load_session, save_session},
    view::{Eviction, RoomView},
};

/// Screen a client lands on when (re)opening the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// No room in the link: show the game selection / room creation screen.
    SelectGame,
    /// The linked room does not exist.
    RoomNotFound(String),
    /// The remembered session matched the linked room and was resumed.
    Resumed(String),
    /// The linked room exists but the client still has to pick a username.
    JoinRequired(String),
}

/// Outcome of waiting on the room feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The room changed and the participant is still in it.
    View(RoomView),
    /// The session has been logged out.
    Evicted(Eviction),
}

struct ActiveRoom {
    room_id: String,
    username: String,
    subscription: RoomSubscription,
    last_view: Option<RoomView>,
}

/// Application state of one participant.
pub struct RoomSession {
    client: RoomClient,
    storage: Box<dyn SessionStorage>,
    active: Option<ActiveRoom>,
    selected_theme: Option<ThemeEntity>,
}

impl RoomSession {
    /// Session over `client`, remembering the current room in `storage`.
    pub fn new(client: RoomClient, storage: impl SessionStorage + 'static) -> Self {
        Self {
            client,
            storage: Box::new(storage),
            active: None,
            selected_theme: None,
        }
    }

    /// Room the session is in, if any.
    pub fn room_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.room_id.as_str())
    }

    /// Username the session entered the current room with.
    pub fn username(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.username.as_str())
    }

    /// Most recent view produced by [`RoomSession::next_update`].
    pub fn current_view(&self) -> Option<&RoomView> {
        self.active.as_ref().and_then(|active| active.last_view.as_ref())
    }

    /// Backing session storage.
    pub fn storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    /// Themes the host can pick from.
    pub fn themes(&self) -> &[ThemeEntity] {
        self.client.catalog().themes()
    }

    /// Decide where to land given the room code carried by the page link.
    pub async fn resume(&mut self, linked_room: Option<&str>) -> Result<Entry, ServiceError> {
        let Some(room_id) = linked_room else {
            return Ok(Entry::SelectGame);
        };

        match self.client.find_room(room_id).await {
            Ok(_) => {}
            Err(ServiceError::NotFound(_)) => return Ok(Entry::RoomNotFound(room_id.to_string())),
            Err(err) => return Err(err),
        }

        match load_session(self.storage.as_ref()) {
            Some(StoredSession {
                room_id: stored_room,
                username,
            }) if stored_room == room_id => {
                self.enter(room_id, &username).await?;
                info!(room_id, username = %username, "session resumed");
                Ok(Entry::Resumed(room_id.to_string()))
            }
            _ => Ok(Entry::JoinRequired(room_id.to_string())),
        }
    }

    /// Create a room hosted by `username` and enter it.
    pub async fn create_room(&mut self, username: &str) -> Result<RoomEntity, ServiceError> {
        let room = self.client.create_room(username).await?;
        self.enter(&room.id, &room.host).await?;
        Ok(room)
    }

    /// Join an existing room and enter it.
    pub async fn join_room(
        &mut self,
        room_id: &str,
        username: &str,
    ) -> Result<UserEntity, ServiceError> {
        let user = self.client.join_room(room_id, username).await?;
        self.enter(room_id, &user.username).await?;
        Ok(user)
    }

    async fn enter(&mut self, room_id: &str, username: &str) -> Result<(), ServiceError> {
        if let Some(previous) = self.active.take() {
            previous.subscription.cancel();
        }

        let subscription = self.client.subscribe(room_id).await?;
        save_session(self.storage.as_mut(), room_id, username)?;
        self.active = Some(ActiveRoom {
            room_id: room_id.to_string(),
            username: username.to_string(),
            subscription,
            last_view: None,
        });
        Ok(())
    }

    /// Wait for the next room change and reduce it.
    ///
    /// Returns `None` when not in a room. Evictions log the session out before they
    /// are reported.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let active = self.active.as_mut()?;
        let outcome = match active.subscription.next().await {
            Some(change) => RoomView::from_change(&change, &active.username),
            None => Err(Eviction::RoomClosed),
        };

        match outcome {
            Ok(view) => {
                active.last_view = Some(view.clone());
                Some(SessionUpdate::View(view))
            }
            Err(eviction) => {
                warn!(reason = eviction.message(), "leaving room");
                if let Err(err) = self.logout().await {
                    warn!(error = %err, "failed to clean up session after eviction");
                }
                Some(SessionUpdate::Evicted(eviction))
            }
        }
    }

    /// Leave the remembered room, stop listening and forget the session.
    ///
    /// Local state is always cleared; the returned error only reports a failed
    /// removal from the room document.
    pub async fn logout(&mut self) -> Result<(), ServiceError> {
        let remote = match load_session(self.storage.as_ref()) {
            Some(stored) => match self.client.leave_room(&stored.room_id, &stored.username).await
            {
                Ok(_) | Err(ServiceError::NotFound(_)) => Ok(()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        };

        if let Some(active) = self.active.take() {
            active.subscription.cancel();
        }
        self.selected_theme = None;
        clear_session(self.storage.as_mut())?;
        info!("logged out");

        remote
    }

    /// Stage a catalog theme for confirmation.
    pub fn select_theme(&mut self, theme_id: u32) -> Result<&ThemeEntity, ServiceError> {
        let theme = self
            .client
            .catalog()
            .find(theme_id)
            .cloned()
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown theme `{theme_id}`")))?;
        Ok(self.selected_theme.insert(theme))
    }

    /// Theme staged by [`RoomSession::select_theme`].
    pub fn selected_theme(&self) -> Option<&ThemeEntity> {
        self.selected_theme.as_ref()
    }

    /// Drop the staged theme.
    pub fn cancel_theme_change(&mut self) {
        self.selected_theme = None;
    }

    /// Start a new round with the staged theme. Host only.
    pub async fn confirm_theme_change(&mut self) -> Result<RoomEntity, ServiceError> {
        let theme = self
            .selected_theme
            .clone()
            .ok_or_else(|| ServiceError::InvalidState("no theme selected".into()))?;
        let room = self.hosted_room().await?;
        let updated = self.client.change_theme(&room.id, theme).await?;
        self.selected_theme = None;
        Ok(updated)
    }

    /// Start a new round with a random theme. Host only.
    pub async fn draw_new_game(&self) -> Result<RoomEntity, ServiceError> {
        let room = self.hosted_room().await?;
        self.client.draw_new_game(&room.id).await
    }

    /// Remove another participant from the room. Host only.
    pub async fn kick(&self, username: &str) -> Result<(), ServiceError> {
        let room = self.hosted_room().await?;
        if username == room.host {
            return Err(ServiceError::InvalidInput(
                "the host cannot remove themselves".into(),
            ));
        }

        let user = room
            .user(username)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("user `{username}` not in room")))?;
        self.client.kick_user(&room.id, &user).await
    }

    /// Invitation link for the current room.
    pub fn share_link(&self, base: &Url) -> Option<Url> {
        self.room_id().map(|room_id| link::share_link(base, room_id))
    }

    async fn hosted_room(&self) -> Result<RoomEntity, ServiceError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("not in a room".into()))?;
        let room = self.client.find_room(&active.room_id).await?;
        if room.host != active.username {
            return Err(ServiceError::Unauthorized(
                "only the host can do this".into(),
            ));
        }
        Ok(room)
    }
}
