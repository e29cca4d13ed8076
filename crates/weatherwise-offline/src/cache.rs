//! Durable response cache keyed by exact request URL.
//!
//! Responses live in a SQLite table tagged with the cache generation that
//! stored them. Routing policy per request:
//! - provider API requests: network first; successful responses are copied
//!   into the current generation before being returned, and on network
//!   failure the best cached match is served instead.
//! - static assets: cache first; the network is only consulted on a miss,
//!   and miss responses are not written back.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("failed to fetch {0}")]
    Fetch(String),

    #[error("cache error: {0}")]
    Cache(String),
}

/// A response as stored in (or served from) the cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Generation-tagged response cache.
pub struct ResourceCache {
    conn: Mutex<Connection>,
    client: reqwest::Client,
    generation: String,
    provider_hosts: Vec<String>,
}

impl ResourceCache {
    /// Open (or create) the cache at the given path.
    pub fn new<P: AsRef<Path>>(
        path: P,
        generation: &str,
        provider_hosts: Vec<String>,
    ) -> Result<Self, OfflineError> {
        let conn = Connection::open(path).map_err(|e| OfflineError::Cache(e.to_string()))?;
        Self::with_connection(conn, generation, provider_hosts)
    }

    /// Create an in-memory cache (for testing).
    pub fn in_memory(
        generation: &str,
        provider_hosts: Vec<String>,
    ) -> Result<Self, OfflineError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OfflineError::Cache(e.to_string()))?;
        Self::with_connection(conn, generation, provider_hosts)
    }

    fn with_connection(
        conn: Connection,
        generation: &str,
        provider_hosts: Vec<String>,
    ) -> Result<Self, OfflineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| OfflineError::Fetch(e.to_string()))?;

        let cache = Self {
            conn: Mutex::new(conn),
            client,
            generation: generation.to_string(),
            provider_hosts,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<(), OfflineError> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS responses (
                    generation TEXT NOT NULL,
                    url TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    content_type TEXT,
                    body BLOB NOT NULL,
                    stored_at INTEGER NOT NULL,
                    PRIMARY KEY (generation, url)
                );
                "#,
            )
            .map_err(|e| OfflineError::Cache(e.to_string()))
    }

    /// The generation this cache writes to.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Precache a fixed set of static assets into the current generation.
    ///
    /// Mirrors the install phase: the first asset that cannot be fetched
    /// aborts the whole install.
    pub async fn install(&self, assets: &[String]) -> Result<(), OfflineError> {
        for asset in assets {
            let response = self.fetch_live(asset).await?;
            self.store_response(&response);
        }
        tracing::info!(count = assets.len(), "Precached app shell assets");
        Ok(())
    }

    /// Route a request per the offline policy.
    pub async fn fetch(&self, url: &str) -> Result<CachedResponse, OfflineError> {
        if self.is_provider_request(url) {
            match self.fetch_live(url).await {
                Ok(response) => {
                    self.store_response(&response);
                    Ok(response)
                }
                Err(err) => match self.cached(url) {
                    Some(hit) => {
                        tracing::info!(url, "Serving provider response from offline cache");
                        Ok(hit)
                    }
                    None => Err(err),
                },
            }
        } else {
            match self.cached(url) {
                Some(hit) => Ok(hit),
                None => self.fetch_live(url).await,
            }
        }
    }

    /// Purge every generation except the current one.
    ///
    /// Returns the purged generation names. Simple epoch eviction: no LRU,
    /// no size bound.
    pub fn activate(&self) -> Result<Vec<String>, OfflineError> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT DISTINCT generation FROM responses WHERE generation != ?1")
            .map_err(|e| OfflineError::Cache(e.to_string()))?;
        let old: Vec<String> = stmt
            .query_map(params![self.generation], |row| row.get(0))
            .map_err(|e| OfflineError::Cache(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OfflineError::Cache(e.to_string()))?;

        conn.execute("DELETE FROM responses WHERE generation != ?1", params![self.generation])
            .map_err(|e| OfflineError::Cache(e.to_string()))?;

        Ok(old)
    }

    /// All generations currently present in the store.
    pub fn generations(&self) -> Result<Vec<String>, OfflineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT generation FROM responses ORDER BY generation")
            .map_err(|e| OfflineError::Cache(e.to_string()))?;
        let generations = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| OfflineError::Cache(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OfflineError::Cache(e.to_string()))?;
        Ok(generations)
    }

    fn is_provider_request(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.provider_hosts
            .iter()
            .any(|provider| host == provider || host.ends_with(&format!(".{}", provider)))
    }

    /// Perform the live request. Any HTTP status is a success at this layer
    /// (the policy mirrors the platform fetch contract); only transport
    /// failures count as errors.
    async fn fetch_live(&self, url: &str) -> Result<CachedResponse, OfflineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OfflineError::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| OfflineError::Fetch(format!("{}: {}", url, e)))?
            .to_vec();

        Ok(CachedResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
            stored_at: Utc::now(),
        })
    }

    /// Copy a response into the current generation. Write failures are
    /// absorbed with a diagnostic; a failed cache write must not fail the
    /// live response.
    fn store_response(&self, response: &CachedResponse) {
        let conn = self.conn.lock();
        let result = conn.execute(
            r#"
            INSERT OR REPLACE INTO responses
            (generation, url, status, content_type, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                self.generation,
                response.url,
                response.status,
                response.content_type,
                response.body,
                Utc::now().timestamp_millis(),
            ],
        );
        if let Err(e) = result {
            tracing::warn!("Failed to cache response for {}: {}", response.url, e);
        }
    }

    /// Best cached match for a URL: the current generation's entry if it has
    /// one, otherwise the most recently stored entry from any generation.
    fn cached(&self, url: &str) -> Option<CachedResponse> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                r#"
                SELECT url, status, content_type, body, stored_at
                FROM responses
                WHERE url = ?1
                ORDER BY (generation = ?2) DESC, stored_at DESC
                LIMIT 1
                "#,
                params![url, self.generation],
                |row| {
                    let stored_ms: i64 = row.get(4)?;
                    Ok(CachedResponse {
                        url: row.get(0)?,
                        status: row.get(1)?,
                        content_type: row.get(2)?,
                        body: row.get(3)?,
                        stored_at: DateTime::from_timestamp_millis(stored_ms).unwrap_or_default(),
                    })
                },
            )
            .optional();

        match result {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Failed to read cached response for {}: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_cache(generation: &str) -> ResourceCache {
        // The mock server binds to 127.0.0.1; treating it as the provider
        // domain exercises the network-first branch
        ResourceCache::in_memory(generation, vec!["127.0.0.1".to_string()]).unwrap()
    }

    fn asset_cache(generation: &str) -> ResourceCache {
        ResourceCache::in_memory(generation, vec!["api.example.com".to_string()]).unwrap()
    }

    async fn weather_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "London", "temp": 15.0})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_provider_request_network_first_then_cached() {
        let server = weather_server().await;
        let url = format!("{}/weather", server.uri());

        let cache = provider_cache("weatherwise-v1");
        let live = cache.fetch(&url).await.unwrap();
        assert_eq!(live.status, 200);

        // Network goes away; the cached copy serves the request
        drop(server);
        let offline = cache.fetch(&url).await.unwrap();
        assert_eq!(offline.body, live.body);
    }

    #[tokio::test]
    async fn test_provider_request_no_cache_propagates_failure() {
        let server = weather_server().await;
        let url = format!("{}/weather", server.uri());
        drop(server);

        let cache = provider_cache("weatherwise-v1");
        let err = cache.fetch(&url).await.unwrap_err();
        assert!(matches!(err, OfflineError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_static_asset_served_cache_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;
        let url = format!("{}/app.css", server.uri());

        let cache = asset_cache("weatherwise-v1");
        cache.install(&[url.clone()]).await.unwrap();

        // Cached copy answers even with the network gone
        drop(server);
        let hit = cache.fetch(&url).await.unwrap();
        assert_eq!(hit.body, b"body{}");
    }

    #[tokio::test]
    async fn test_static_asset_miss_falls_through_to_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        let url = format!("{}/logo.png", server.uri());

        let cache = asset_cache("weatherwise-v1");
        let live = cache.fetch(&url).await.unwrap();
        assert_eq!(live.body, vec![1u8, 2, 3]);

        // Fall-through responses are not written back to the cache
        drop(server);
        assert!(cache.fetch(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_install_aborts_on_first_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        let good = format!("{}/ok.css", server.uri());
        let bad = "http://127.0.0.1:1/missing.css".to_string();

        let cache = asset_cache("weatherwise-v1");
        assert!(cache.install(&[bad, good]).await.is_err());
    }

    #[tokio::test]
    async fn test_activation_purges_old_generations() {
        let server = weather_server().await;
        let url = format!("{}/weather", server.uri());

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("offline.db");

        // v1 stores a response, then a v2 deployment arrives
        let v1 = ResourceCache::new(&db, "weatherwise-v1", vec!["127.0.0.1".to_string()]).unwrap();
        v1.fetch(&url).await.unwrap();
        drop(v1);

        let v2 = ResourceCache::new(&db, "weatherwise-v2", vec!["127.0.0.1".to_string()]).unwrap();
        v2.fetch(&url).await.unwrap();
        assert_eq!(
            v2.generations().unwrap(),
            vec!["weatherwise-v1".to_string(), "weatherwise-v2".to_string()]
        );

        let purged = v2.activate().unwrap();
        assert_eq!(purged, vec!["weatherwise-v1".to_string()]);
        assert_eq!(v2.generations().unwrap(), vec!["weatherwise-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_old_generation_still_serves_before_activation() {
        let server = weather_server().await;
        let url = format!("{}/weather", server.uri());

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("offline.db");

        let v1 = ResourceCache::new(&db, "weatherwise-v1", vec!["127.0.0.1".to_string()]).unwrap();
        v1.fetch(&url).await.unwrap();
        drop(v1);
        drop(server);

        // v2 has not cached anything yet; the v1 entry is the best match
        let v2 = ResourceCache::new(&db, "weatherwise-v2", vec!["127.0.0.1".to_string()]).unwrap();
        assert!(v2.fetch(&url).await.is_ok());
    }

    #[test]
    fn test_provider_host_matching() {
        let cache = ResourceCache::in_memory(
            "weatherwise-v1",
            vec!["openweathermap.org".to_string()],
        )
        .unwrap();

        assert!(cache.is_provider_request("https://api.openweathermap.org/data/2.5/weather?q=london"));
        assert!(cache.is_provider_request("https://openweathermap.org/img/wn/10d@2x.png"));
        assert!(!cache.is_provider_request("https://fonts.googleapis.com/css2?family=Inter"));
        assert!(!cache.is_provider_request("not a url"));
    }
}
