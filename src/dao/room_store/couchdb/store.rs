use std::{sync::Arc, time::Duration, time::SystemTime};

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, json};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::dao::{
    models::{RoomEntity, ThemeEntity, UserEntity},
    room_store::{RoomChange, RoomStore, RoomWatch},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchRoomDocument, END_SUFFIX, ROOM_PREFIX,
        WriteResponse, room_doc_id,
    },
};

const MAX_CONFLICT_RETRIES: u32 = 5;
const CHANGES_TIMEOUT_MS: u64 = 30_000;
const FEED_INITIAL_DELAY: Duration = Duration::from_millis(500);
const FEED_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    update_seq: Value,
}

/// Result of a conditional document write.
enum WriteOutcome {
    Done,
    Conflict,
}

/// Room store persisting one CouchDB document per room.
///
/// CouchDB has no array operators, so user additions/removals and round updates are
/// read-modify-write cycles guarded by the document revision and retried on conflict.
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    database_url: Url,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let database_url = database_url(&config.base_url, &config.database)?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            database_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    /// URL of `segment` under the database, escaped as a single path segment.
    fn endpoint(&self, segment: &str) -> CouchResult<Url> {
        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|()| CouchDaoError::CannotBeABase {
                url: self.database_url.to_string(),
            })?
            .push(segment);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, segment: &str) -> CouchResult<RequestBuilder> {
        let url = self.endpoint(segment)?;
        Ok(self.authorize(self.client.request(method, url)))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url.clone();

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn database_info(&self) -> CouchResult<DatabaseInfo> {
        let path = self.database.to_string();
        let response = self
            .authorize(self.client.get(self.database_url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path,
                status: response.status(),
            });
        }

        response
            .json::<DatabaseInfo>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse { path, source })
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)?
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<WriteOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)?
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(WriteOutcome::Conflict),
            status if status.is_success() => Ok(WriteOutcome::Done),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<WriteOutcome> {
        let response = self
            .request(Method::DELETE, doc_id)?
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::NOT_FOUND => Ok(WriteOutcome::Conflict),
            status if status.is_success() => {
                let written = response.json::<WriteResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                debug!(doc_id, rev = %written.rev, "deleted room document");
                Ok(WriteOutcome::Done)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)?
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id,
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Write the whole room, adopting the current revision so the write replaces it.
    async fn replace_room(&self, room: RoomEntity) -> CouchResult<()> {
        let doc_id = room_doc_id(&room.id);
        for _ in 0..MAX_CONFLICT_RETRIES {
            let rev = self
                .get_document::<CouchRoomDocument>(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchRoomDocument::from((room.clone(), rev));
            match self.put_document(&doc_id, &doc).await? {
                WriteOutcome::Done => return Ok(()),
                WriteOutcome::Conflict => debug!(doc_id, "revision conflict while creating room; retrying"),
            }
        }

        Err(CouchDaoError::RevisionConflict {
            doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    /// Read-modify-write a room document, retrying when another writer got in first.
    async fn update_room<F>(&self, code: &str, update: F) -> CouchResult<()>
    where
        F: Fn(&mut RoomEntity),
    {
        let doc_id = room_doc_id(code);
        for _ in 0..MAX_CONFLICT_RETRIES {
            let Some(doc) = self.get_document::<CouchRoomDocument>(&doc_id).await? else {
                return Err(CouchDaoError::MissingDocument {
                    doc_id,
                    room_id: code.to_string(),
                });
            };

            let rev = doc.rev.clone();
            let mut room = RoomEntity::from(doc);
            update(&mut room);
            room.updated_at = SystemTime::now();

            let doc = CouchRoomDocument::from((room, rev));
            match self.put_document(&doc_id, &doc).await? {
                WriteOutcome::Done => return Ok(()),
                WriteOutcome::Conflict => debug!(doc_id, "revision conflict while updating room; retrying"),
            }
        }

        Err(CouchDaoError::RevisionConflict {
            doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    /// Delete a room document, returning whether it was removed.
    ///
    /// With `stale_before`, rooms written at or after that instant are kept. The check
    /// runs again after every revision conflict.
    async fn remove_room(&self, code: &str, stale_before: Option<SystemTime>) -> CouchResult<bool> {
        let doc_id = room_doc_id(code);
        for _ in 0..MAX_CONFLICT_RETRIES {
            let Some(doc) = self.get_document::<CouchRoomDocument>(&doc_id).await? else {
                return Ok(false);
            };
            if stale_before.is_some_and(|cutoff| !doc.room.is_stale(cutoff)) {
                return Ok(false);
            }
            let Some(rev) = doc.rev else {
                return Ok(false);
            };
            match self.delete_document(&doc_id, &rev).await? {
                WriteOutcome::Done => return Ok(true),
                WriteOutcome::Conflict => debug!(doc_id, "revision conflict while deleting room; retrying"),
            }
        }

        Err(CouchDaoError::RevisionConflict {
            doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    /// Long-poll the changes feed for a single document.
    async fn poll_changes(&self, doc_id: &str, since: &Value) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let query = [
            ("feed", "longpoll".to_string()),
            ("filter", "_doc_ids".to_string()),
            ("include_docs", "true".to_string()),
            ("timeout", CHANGES_TIMEOUT_MS.to_string()),
            ("since", seq_param(since)),
        ];

        let response = self
            .request(Method::POST, CHANGES)?
            .query(&query)
            .json(&json!({ "doc_ids": [doc_id] }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }

    /// Follow a room document: current state first, then every change from the feed.
    async fn follow_room(&self, code: String) -> CouchResult<RoomWatch> {
        let doc_id = room_doc_id(&code);
        let since = self.database_info().await?.update_seq;
        let initial = self.get_document::<CouchRoomDocument>(&doc_id).await?;
        let store = self.clone();

        let feed = async_stream::stream! {
            if let Some(doc) = initial {
                yield RoomChange::Updated(doc.into());

                let mut since = since;
                let mut delay = FEED_INITIAL_DELAY;
                loop {
                    match store.poll_changes(&doc_id, &since).await {
                        Ok(changes) => {
                            delay = FEED_INITIAL_DELAY;
                            since = changes.last_seq;
                            // Only the latest revision in a batch matters.
                            let Some(row) = changes.results.into_iter().rfind(|row| row.id == doc_id) else {
                                continue;
                            };
                            if row.deleted {
                                yield RoomChange::Removed;
                                break;
                            }
                            match row.doc.map(from_value::<CouchRoomDocument>) {
                                Some(Ok(doc)) => yield RoomChange::Updated(doc.into()),
                                Some(Err(err)) => {
                                    warn!(doc_id, error = %err, "skipping undecodable room revision")
                                }
                                None => {}
                            }
                        }
                        Err(err) => {
                            warn!(doc_id, error = %err, "room changes feed failed; retrying");
                            sleep(delay).await;
                            delay = (delay * 2).min(FEED_MAX_DELAY);
                        }
                    }
                }
            } else {
                yield RoomChange::Removed;
            }
        };

        Ok(feed.boxed())
    }
}

/// Database URL built from the configured base, which may carry a path prefix.
fn database_url(base_url: &str, database: &str) -> CouchResult<Url> {
    let mut url = Url::parse(base_url).map_err(|source| CouchDaoError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;
    url.path_segments_mut()
        .map_err(|()| CouchDaoError::CannotBeABase {
            url: base_url.to_string(),
        })?
        .pop_if_empty()
        .push(database);
    Ok(url)
}

/// Render a CouchDB sequence (string since 2.x, integer before) as a query value.
fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

impl RoomStore for CouchRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&id);
            let maybe_doc = store.get_document::<CouchRoomDocument>(&doc_id).await?;
            Ok(maybe_doc.map(Into::into))
        })
    }

    fn add_user(&self, id: String, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room(&id, |room| {
                    if !room.users.contains(&user) {
                        room.users.push(user.clone());
                    }
                })
                .await
                .map_err(Into::into)
        })
    }

    fn remove_user(
        &self,
        id: String,
        user: UserEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room(&id, |room| room.users.retain(|existing| existing != &user))
                .await
                .map_err(Into::into)
        })
    }

    fn update_round(
        &self,
        id: String,
        theme: ThemeEntity,
        users: Vec<UserEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room(&id, |room| {
                    room.current_theme = Some(theme.clone());
                    room.users = users.clone();
                })
                .await
                .map_err(Into::into)
        })
    }

    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove_room(&id, None).await.map_err(Into::into) })
    }

    fn purge_stale(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchRoomDocument>(ROOM_PREFIX)
                .await?;

            let mut purged = 0;
            for doc in docs.into_iter().filter(|doc| doc.room.is_stale(cutoff)) {
                match store.remove_room(&doc.room.id, Some(cutoff)).await {
                    Ok(true) => purged += 1,
                    Ok(false) => {}
                    Err(CouchDaoError::RevisionConflict { doc_id, .. }) => {
                        warn!(doc_id, "room kept changing during purge; skipping");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(purged)
        })
    }

    fn watch_room(&self, id: String) -> BoxFuture<'static, StorageResult<RoomWatch>> {
        let store = self.clone();
        Box::pin(async move { store.follow_room(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.database_info().await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
