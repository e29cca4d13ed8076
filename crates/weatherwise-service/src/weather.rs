//! Freshness-checked read-through cache over the provider client.
//!
//! Weather requests are network-first: the live fetch always runs, and the
//! stored snapshot exists purely as a fallback. A snapshot may stand in for a
//! failed fetch only while it is inside the freshness window; an older one is
//! treated as absent and the original failure propagates.

use std::sync::Arc;

use chrono::{Duration, Utc};

use weatherwise_provider::{AirQuality, FetchError, Forecast, GeoMatch, IconSize, WeatherClient};
use weatherwise_store::{LocalStore, WeatherSnapshot};

pub struct WeatherService {
    client: WeatherClient,
    store: Arc<LocalStore>,
    freshness_window: Duration,
}

impl WeatherService {
    pub fn new(client: WeatherClient, store: Arc<LocalStore>, freshness_window: Duration) -> Self {
        Self {
            client,
            store,
            freshness_window,
        }
    }

    /// Current conditions for a city.
    ///
    /// On success the new snapshot unconditionally supersedes any stored one
    /// for the key, even if the previous snapshot was still fresh. On failure
    /// a stored snapshot inside the freshness window is returned instead;
    /// otherwise the failure propagates.
    pub async fn current(&self, city: &str) -> Result<WeatherSnapshot, FetchError> {
        match self.client.current_by_city(city).await {
            Ok(current) => {
                let snapshot = WeatherSnapshot::new(city, current);
                self.store.store_snapshot(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => self.fallback(city, err),
        }
    }

    /// Current conditions by coordinates.
    ///
    /// The snapshot is stored under the provider's resolved city name. When a
    /// `fallback_key` is given (the city the caller believes it is asking
    /// about), a failed fetch falls back to that key's snapshot.
    pub async fn current_by_coords(
        &self,
        lat: f64,
        lon: f64,
        fallback_key: Option<&str>,
    ) -> Result<WeatherSnapshot, FetchError> {
        match self.client.current_by_coords(lat, lon).await {
            Ok(current) => {
                let snapshot = WeatherSnapshot::new(current.name.clone(), current);
                self.store.store_snapshot(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => match fallback_key {
                Some(key) => self.fallback(key, err),
                None => Err(err),
            },
        }
    }

    /// Multi-day forecast for a city.
    ///
    /// A successful fetch is folded into the city's stored snapshot so it can
    /// serve later fallbacks. A forecast is only cached alongside an existing
    /// current-conditions snapshot.
    pub async fn forecast(&self, city: &str) -> Result<Forecast, FetchError> {
        match self.client.forecast_by_city(city).await {
            Ok(forecast) => {
                if let Some(mut snapshot) = self.store.snapshot(city) {
                    snapshot.forecast = Some(forecast.clone());
                    self.store.store_snapshot(snapshot);
                }
                Ok(forecast)
            }
            Err(err) => match self.store.snapshot(city) {
                Some(snapshot) if self.is_fresh(&snapshot) => snapshot.forecast.ok_or(err),
                _ => Err(err),
            },
        }
    }

    /// Search candidate cities. Pass-through: autocomplete results are not
    /// snapshot material.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<GeoMatch>, FetchError> {
        self.client.search_cities(query).await
    }

    /// Air quality by coordinates. Pass-through.
    pub async fn air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality, FetchError> {
        self.client.air_quality(lat, lon).await
    }

    /// URL of the provider's icon asset for an icon code.
    pub fn icon_url(&self, icon_code: &str, size: IconSize) -> String {
        self.client.icon_url(icon_code, size)
    }

    fn fallback(&self, city: &str, err: FetchError) -> Result<WeatherSnapshot, FetchError> {
        match self.store.snapshot(city) {
            Some(snapshot) if self.is_fresh(&snapshot) => {
                tracing::info!(city, "Serving cached snapshot after failed fetch");
                Ok(snapshot)
            }
            _ => Err(err),
        }
    }

    /// The one freshness check: strictly younger than the window. A snapshot
    /// at exactly the window age is already stale.
    fn is_fresh(&self, snapshot: &WeatherSnapshot) -> bool {
        Utc::now() - snapshot.captured_at < self.freshness_window
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use weatherwise_core::ProviderConfig;
    use weatherwise_provider::CurrentConditions;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body(name: &str, temp: f64) -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": temp, "feels_like": temp - 1.0, "temp_min": temp - 2.0,
                     "temp_max": temp + 2.0, "pressure": 1012, "humidity": 60},
            "wind": {"speed": 2.5, "deg": 180},
            "clouds": {"all": 0},
            "dt": 1700000000,
            "sys": {"country": "GB", "sunrise": 1699970000, "sunset": 1700003000},
            "timezone": 0,
            "id": 2643743,
            "name": name
        })
    }

    fn forecast_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "list": [{
                "dt": 1700000000,
                "main": {"temp": 9.0, "feels_like": 7.5, "temp_min": 8.0, "temp_max": 9.5,
                         "pressure": 1018, "humidity": 75},
                "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
                "clouds": {"all": 80},
                "wind": {"speed": 4.0, "deg": 200},
                "pop": 0.6,
                "dt_txt": "2023-11-14 22:00:00"
            }],
            "city": {
                "id": 2643743, "name": name,
                "coord": {"lat": 51.5085, "lon": -0.1257},
                "country": "GB", "timezone": 0,
                "sunrise": 1699970000, "sunset": 1700003000
            }
        })
    }

    fn service(base: &str, store: Arc<LocalStore>) -> WeatherService {
        let client = WeatherClient::new(&ProviderConfig {
            api_key: "test_key".to_string(),
            api_base_url: base.to_string(),
            geo_base_url: base.to_string(),
            icon_base_url: "https://openweathermap.org/img/wn".to_string(),
        })
        .unwrap();
        WeatherService::new(client, store, Duration::minutes(30))
    }

    fn aged_snapshot(city: &str, minutes_old: i64) -> WeatherSnapshot {
        let current: CurrentConditions =
            serde_json::from_value(current_body(city, 11.0)).unwrap();
        let mut snapshot = WeatherSnapshot::new(city, current);
        snapshot.captured_at = Utc::now() - Duration::minutes(minutes_old);
        snapshot
    }

    #[tokio::test]
    async fn test_success_persists_snapshot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 15.0)))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        let service = service(&mock_server.uri(), store.clone());

        let snapshot = service.current("London").await.unwrap();
        assert_eq!(snapshot.city, "London");
        assert!(store.snapshot("london").is_some());
    }

    #[tokio::test]
    async fn test_failure_right_after_success_serves_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 15.0)))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        let service = service(&mock_server.uri(), store.clone());
        service.current("London").await.unwrap();

        // Provider goes down; a zero-age cache must satisfy the fallback
        mock_server.reset().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let snapshot = service.current("London").await.unwrap();
        assert!((snapshot.current.main.temp - 15.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_serves_failed_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        store.store_snapshot(aged_snapshot("London", 10));

        let service = service(&mock_server.uri(), store);
        let snapshot = service.current("london").await.unwrap();
        assert_eq!(snapshot.city, "London");
    }

    #[tokio::test]
    async fn test_stale_snapshot_does_not_mask_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        store.store_snapshot(aged_snapshot("London", 40));

        let service = service(&mock_server.uri(), store);
        // Stale-but-present is treated as absent: the failure propagates
        assert!(service.current("london").await.is_err());
    }

    #[tokio::test]
    async fn test_no_snapshot_propagates_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        let service = service(&mock_server.uri(), store);

        assert!(service.current("paris").await.is_err());
    }

    #[tokio::test]
    async fn test_success_overwrites_even_fresh_snapshot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 20.0)))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        store.store_snapshot(aged_snapshot("London", 5));

        let service = service(&mock_server.uri(), store.clone());
        service.current("London").await.unwrap();

        // Every successful fetch supersedes the stored snapshot, fresh or
        // not. A late-completing fetch therefore also wins; in-flight
        // requests are not generation-tagged.
        let stored = store.snapshot("london").unwrap();
        assert!((stored.current.main.temp - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_current_by_coords_stores_under_resolved_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "51.5085"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 13.0)))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        let service = service(&mock_server.uri(), store.clone());

        service.current_by_coords(51.5085, -0.1257, None).await.unwrap();
        assert!(store.snapshot("london").is_some());
    }

    #[tokio::test]
    async fn test_current_by_coords_falls_back_to_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        store.store_snapshot(aged_snapshot("London", 10));

        let service = service(&mock_server.uri(), store);
        let snapshot = service
            .current_by_coords(51.5085, -0.1257, Some("london"))
            .await
            .unwrap();
        assert_eq!(snapshot.city, "London");
    }

    #[tokio::test]
    async fn test_forecast_cached_into_snapshot_and_served_on_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 15.0)))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("London")))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        let service = service(&mock_server.uri(), store.clone());

        service.current("London").await.unwrap();
        service.forecast("London").await.unwrap();
        assert!(store.snapshot("london").unwrap().forecast.is_some());

        mock_server.reset().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let forecast = service.forecast("London").await.unwrap();
        assert_eq!(forecast.city.name, "London");
    }

    #[tokio::test]
    async fn test_forecast_failure_without_cached_forecast_propagates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = Arc::new(LocalStore::in_memory().unwrap());
        // Fresh snapshot, but it carries no forecast payload
        store.store_snapshot(aged_snapshot("London", 10));

        let service = service(&mock_server.uri(), store);
        assert!(service.forecast("london").await.is_err());
    }
}
