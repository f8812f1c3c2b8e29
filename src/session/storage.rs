//! Session-scoped key/value storage remembering which room a client is in.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

/// Key holding the room the client is currently in.
pub const CURRENT_ROOM_ID: &str = "currentRoomId";
/// Key holding the username the client joined with.
pub const CURRENT_USERNAME: &str = "currentUsername";

/// Failures raised by persistent session storage backends.
#[derive(Debug, Error)]
pub enum SessionStorageError {
    /// Reading or writing the session file failed.
    #[error("failed to access session file `{path}`")]
    Io {
        /// Session file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The session file holds something other than a JSON object of strings.
    #[error("session file `{path}` is not valid JSON")]
    Decode {
        /// Session file.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The entries could not be serialized for writing.
    #[error("failed to encode session file `{path}`")]
    Encode {
        /// Session file.
        path: PathBuf,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key/value store mirroring a browser's session storage.
pub trait SessionStorage: Send {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStorageError>;
    /// Forget `key`. Missing keys are not an error.
    fn remove(&mut self, key: &str) -> Result<(), SessionStorageError>;
}

/// Room and username remembered for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Value of [`CURRENT_ROOM_ID`].
    pub room_id: String,
    /// Value of [`CURRENT_USERNAME`].
    pub username: String,
}

/// Read the stored session when both entries are present.
pub fn load_session(storage: &dyn SessionStorage) -> Option<StoredSession> {
    Some(StoredSession {
        room_id: storage.get(CURRENT_ROOM_ID)?,
        username: storage.get(CURRENT_USERNAME)?,
    })
}

/// Remember `room_id` and `username`.
pub fn save_session(
    storage: &mut dyn SessionStorage,
    room_id: &str,
    username: &str,
) -> Result<(), SessionStorageError> {
    storage.set(CURRENT_ROOM_ID, room_id)?;
    storage.set(CURRENT_USERNAME, username)
}

/// Forget both session entries.
pub fn clear_session(storage: &mut dyn SessionStorage) -> Result<(), SessionStorageError> {
    storage.remove(CURRENT_ROOM_ID)?;
    storage.remove(CURRENT_USERNAME)
}

/// Session storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: HashMap<String, String>,
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionStorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Session storage persisted as a flat JSON object so a restarted client can resume.
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileSessionStorage {
    /// Open the session file, starting empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionStorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                SessionStorageError::Decode {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(SessionStorageError::Io { path, source }),
        };

        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), SessionStorageError> {
        let contents = encode_entries(&self.path, &self.entries)?;
        fs::write(&self.path, contents).map_err(|source| SessionStorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn encode_entries(path: &Path, entries: &impl Serialize) -> Result<String, SessionStorageError> {
    serde_json::to_string_pretty(entries).map_err(|source| SessionStorageError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionStorageError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
