//! Application-level configuration loading: theme source, store backend and room expiry.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::catalog::ThemeSource;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARRANJO_BACK_CONFIG_PATH";
const THEMES_SOURCE_ENV: &str = "THEMES_SOURCE";
const ROOM_STORE_ENV: &str = "ROOM_STORE";

const DEFAULT_THEMES_SOURCE: &str = "themes.json";
const DEFAULT_ROOM_TTL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 10 * 60;

/// Room document store backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Rooms live in process memory.
    Memory,
    /// Rooms live in CouchDB.
    Couch,
}

impl StoreKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(StoreKind::Memory),
            "couch" | "couchdb" => Some(StoreKind::Couch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    themes_source: ThemeSource,
    store: StoreKind,
    room_ttl: Duration,
    purge_interval: Duration,
}

impl AppConfig {
    /// Load the configuration from disk and apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        store = ?app_config.store,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(raw) = non_empty_env(THEMES_SOURCE_ENV) {
            self.themes_source = ThemeSource::parse(&raw);
        }

        if let Some(raw) = non_empty_env(ROOM_STORE_ENV) {
            match StoreKind::parse(&raw) {
                Some(kind) => self.store = kind,
                None => warn!(
                    value = %raw,
                    "unknown {ROOM_STORE_ENV} value; keeping {:?}",
                    self.store
                ),
            }
        }

        self
    }

    /// Where the theme catalog is loaded from.
    pub fn themes_source(&self) -> &ThemeSource {
        &self.themes_source
    }

    /// Selected room store backend.
    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Rooms idle for longer than this are purged.
    pub fn room_ttl(&self) -> Duration {
        self.room_ttl
    }

    /// Period of the idle room purge.
    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            themes_source: ThemeSource::parse(DEFAULT_THEMES_SOURCE),
            store: StoreKind::Memory,
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    themes_source: Option<String>,
    store: Option<StoreKind>,
    room_ttl_secs: Option<u64>,
    purge_interval_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            themes_source: value
                .themes_source
                .as_deref()
                .map(ThemeSource::parse)
                .unwrap_or(defaults.themes_source),
            store: value.store.unwrap_or(defaults.store),
            room_ttl: value
                .room_ttl_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.room_ttl),
            purge_interval: value
                .purge_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.purge_interval),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_fills_missing_keys_with_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "store": "couch" }"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.store(), StoreKind::Couch);
        assert_eq!(
            config.themes_source(),
            &ThemeSource::File(PathBuf::from("themes.json"))
        );
        assert_eq!(config.room_ttl(), Duration::from_secs(DEFAULT_ROOM_TTL_SECS));
    }

    #[test]
    fn raw_config_reads_every_key() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "themes_source": "https://themes.example/temas.json",
                "store": "memory",
                "room_ttl_secs": 120,
                "purge_interval_secs": 0
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert!(matches!(config.themes_source(), ThemeSource::Url(_)));
        assert_eq!(config.store(), StoreKind::Memory);
        assert_eq!(config.room_ttl(), Duration::from_secs(120));
        // Zero would spin the janitor.
        assert_eq!(
            config.purge_interval(),
            Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS)
        );
    }

    #[test]
    fn unknown_store_kind_is_rejected() {
        assert!(serde_json::from_str::<RawConfig>(r#"{ "store": "redis" }"#).is_err());
        assert_eq!(StoreKind::parse(" CouchDB "), Some(StoreKind::Couch));
        assert_eq!(StoreKind::parse("redis"), None);
    }
}
