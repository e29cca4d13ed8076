//! SQLite-backed key-value store for user state and weather snapshots.
//!
//! String keys map to JSON-serialized values. Each operation is atomic at
//! single-key granularity; writes are a full read-modify-write of the key's
//! value under one lock, so concurrent writers get last-write-wins. A missing
//! key yields the documented default and malformed stored content is treated
//! as absent, so first runs and corrupt state never crash the caller.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::types::{
    CityId, ExportedData, FavoriteCity, LastLocation, SettingsUpdate, UserSettings,
    WeatherSnapshot,
};

const KEY_FAVORITES: &str = "weatherwise.favorites";
const KEY_WEATHER_CACHE: &str = "weatherwise.weather-cache";
const KEY_SETTINGS: &str = "weatherwise.settings";
const KEY_LAST_LOCATION: &str = "weatherwise.last-location";
const KEY_INSTALL_PROMPT: &str = "weatherwise.install-prompt-dismissed";

/// Externally supplied state that failed to parse. Nothing was applied.
#[derive(Debug, Error)]
#[error("invalid exported data: {0}")]
pub struct ImportError(String);

/// Durable key-value store for all locally owned entities.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // --- raw key-value plumbing -------------------------------------------

    fn read_raw(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write_raw(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_raw(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Read and decode a key while holding the lock. Missing keys and
    /// malformed stored content both come back as `None` (the latter with a
    /// logged diagnostic).
    fn read_json<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> Option<T> {
        let raw = match Self::read_raw(conn, key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding malformed stored value for {}: {}", key, e);
                None
            }
        }
    }

    /// Encode and write a key while holding the lock. Failures are absorbed
    /// with a logged diagnostic.
    fn write_json<T: serde::Serialize>(conn: &Connection, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = Self::write_raw(conn, key, &raw) {
            tracing::warn!("Failed to write {}: {}", key, e);
        }
    }

    // --- weather snapshots ------------------------------------------------

    /// The stored snapshot for a city, regardless of age. Freshness gating is
    /// the caller's decision, not the store's.
    pub fn snapshot(&self, city: &str) -> Option<WeatherSnapshot> {
        let conn = self.conn.lock();
        let cache: HashMap<String, WeatherSnapshot> =
            Self::read_json(&conn, KEY_WEATHER_CACHE).unwrap_or_default();
        cache.get(&city.to_lowercase()).cloned()
    }

    /// Store a snapshot, superseding any prior snapshot for the same key.
    ///
    /// The read-modify-write of the cache map happens under one lock, so it
    /// is atomic relative to other writers of this key.
    pub fn store_snapshot(&self, snapshot: WeatherSnapshot) {
        let conn = self.conn.lock();
        let mut cache: HashMap<String, WeatherSnapshot> =
            Self::read_json(&conn, KEY_WEATHER_CACHE).unwrap_or_default();
        cache.insert(snapshot.key(), snapshot);
        Self::write_json(&conn, KEY_WEATHER_CACHE, &cache);
    }

    /// Drop all cached snapshots.
    pub fn clear_weather_cache(&self) {
        let conn = self.conn.lock();
        if let Err(e) = Self::delete_raw(&conn, KEY_WEATHER_CACHE) {
            tracing::warn!("Failed to clear weather cache: {}", e);
        }
    }

    // --- favorites --------------------------------------------------------

    /// All favorite cities. Empty on first run or on read failure.
    pub fn favorites(&self) -> Vec<FavoriteCity> {
        let conn = self.conn.lock();
        Self::read_json(&conn, KEY_FAVORITES).unwrap_or_default()
    }

    /// Add a favorite. No-op if a favorite with the same identity exists.
    pub fn add_favorite(&self, city: FavoriteCity) {
        let conn = self.conn.lock();
        let mut favorites: Vec<FavoriteCity> =
            Self::read_json(&conn, KEY_FAVORITES).unwrap_or_default();

        if favorites.iter().any(|fav| fav.id == city.id) {
            return;
        }

        favorites.push(FavoriteCity { last_updated: Utc::now(), ..city });
        Self::write_json(&conn, KEY_FAVORITES, &favorites);
    }

    /// Remove a favorite by identity. Removing a non-existent identity is a
    /// no-op.
    pub fn remove_favorite(&self, id: &CityId) {
        let conn = self.conn.lock();
        let mut favorites: Vec<FavoriteCity> =
            Self::read_json(&conn, KEY_FAVORITES).unwrap_or_default();
        favorites.retain(|fav| &fav.id != id);
        Self::write_json(&conn, KEY_FAVORITES, &favorites);
    }

    pub fn is_favorite(&self, id: &CityId) -> bool {
        self.favorites().iter().any(|fav| &fav.id == id)
    }

    // --- settings ---------------------------------------------------------

    /// Current user settings, or the defaults on first run.
    pub fn settings(&self) -> UserSettings {
        let conn = self.conn.lock();
        Self::read_json(&conn, KEY_SETTINGS).unwrap_or_default()
    }

    /// Merge a partial update into the stored settings.
    pub fn update_settings(&self, update: SettingsUpdate) {
        let conn = self.conn.lock();
        let mut settings: UserSettings = Self::read_json(&conn, KEY_SETTINGS).unwrap_or_default();
        settings.apply(update);
        Self::write_json(&conn, KEY_SETTINGS, &settings);
    }

    // --- last location ----------------------------------------------------

    pub fn last_location(&self) -> Option<LastLocation> {
        let conn = self.conn.lock();
        Self::read_json(&conn, KEY_LAST_LOCATION)
    }

    /// Overwrite the last-known location wholesale.
    pub fn set_last_location(&self, location: LastLocation) {
        let conn = self.conn.lock();
        Self::write_json(&conn, KEY_LAST_LOCATION, &location);
    }

    // --- install prompt ---------------------------------------------------

    pub fn dismiss_install_prompt(&self) {
        self.dismiss_install_prompt_at(Utc::now());
    }

    pub fn dismiss_install_prompt_at(&self, now: DateTime<Utc>) {
        let conn = self.conn.lock();
        Self::write_json(&conn, KEY_INSTALL_PROMPT, &now);
    }

    /// Whether the install prompt may be shown.
    ///
    /// Eligible immediately if never dismissed. After a dismissal the prompt
    /// becomes eligible only once strictly more than `cooldown` has elapsed:
    /// at exactly the cooldown boundary it is still suppressed.
    pub fn install_prompt_eligible(&self, cooldown: Duration) -> bool {
        self.install_prompt_eligible_at(cooldown, Utc::now())
    }

    pub fn install_prompt_eligible_at(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        let conn = self.conn.lock();
        match Self::read_json::<DateTime<Utc>>(&conn, KEY_INSTALL_PROMPT) {
            Some(dismissed_at) => now - dismissed_at > cooldown,
            None => true,
        }
    }

    // --- export / import --------------------------------------------------

    /// Snapshot the user-owned state (favorites, settings, last location)
    /// into an export document.
    pub fn export_data(&self) -> ExportedData {
        let conn = self.conn.lock();
        ExportedData {
            favorites: Self::read_json(&conn, KEY_FAVORITES).unwrap_or_default(),
            settings: Self::read_json(&conn, KEY_SETTINGS).unwrap_or_default(),
            last_location: Self::read_json(&conn, KEY_LAST_LOCATION),
            exported_at: Utc::now(),
        }
    }

    /// Replace user-owned state from an exported document.
    ///
    /// All-or-nothing: if the document fails to parse, nothing is applied.
    pub fn import_data(&self, json: &str) -> Result<(), ImportError> {
        let data: ExportedData =
            serde_json::from_str(json).map_err(|e| ImportError(e.to_string()))?;

        let conn = self.conn.lock();
        Self::write_json(&conn, KEY_FAVORITES, &data.favorites);
        Self::write_json(&conn, KEY_SETTINGS, &data.settings);
        match &data.last_location {
            Some(location) => Self::write_json(&conn, KEY_LAST_LOCATION, location),
            None => {
                if let Err(e) = Self::delete_raw(&conn, KEY_LAST_LOCATION) {
                    tracing::warn!("Failed to clear last location: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Remove every stored entity.
    pub fn clear_all(&self) {
        let conn = self.conn.lock();
        for key in [
            KEY_FAVORITES,
            KEY_WEATHER_CACHE,
            KEY_SETTINGS,
            KEY_LAST_LOCATION,
            KEY_INSTALL_PROMPT,
        ] {
            if let Err(e) = Self::delete_raw(&conn, key) {
                tracing::warn!("Failed to clear {}: {}", key, e);
            }
        }
    }

    #[cfg(test)]
    fn write_garbage(&self, key: &str) {
        let conn = self.conn.lock();
        #[allow(clippy::unwrap_used)]
        Self::write_raw(&conn, key, "{not json").unwrap();
    }
}
