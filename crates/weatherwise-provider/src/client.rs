//! OpenWeatherMap API client.

use std::time::Duration;

use tracing::instrument;
use weatherwise_core::ProviderConfig;

use crate::error::FetchError;
use crate::types::{AirQuality, CurrentConditions, Forecast, GeoMatch};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Icon asset size token accepted by the provider's image endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconSize {
    #[default]
    TwoX,
    FourX,
}

impl IconSize {
    fn token(self) -> &'static str {
        match self {
            Self::TwoX => "2x",
            Self::FourX => "4x",
        }
    }
}

/// Client for the OpenWeatherMap current-weather, forecast, geocoding and
/// air-quality endpoints.
///
/// Every operation either returns a fully-typed record or fails with
/// [`FetchError`]. There is no retry logic and no rate limiting.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    api_base_url: String,
    geo_base_url: String,
    icon_base_url: String,
}

impl WeatherClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::new("http client", e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.clone(),
            geo_base_url: config.geo_base_url.clone(),
            icon_base_url: config.icon_base_url.clone(),
        })
    }

    /// Get current weather by city name.
    #[instrument(skip(self), level = "info")]
    pub async fn current_by_city(&self, city: &str) -> Result<CurrentConditions, FetchError> {
        let url = format!(
            "{}/weather?q={}&appid={}&units=metric",
            self.api_base_url,
            urlencoding::encode(city),
            self.api_key,
        );
        self.get_json(&url, &format!("weather for {}", city)).await
    }

    /// Get current weather by coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn current_by_coords(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<CurrentConditions, FetchError> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.api_base_url, lat, lon, self.api_key,
        );
        self.get_json(&url, "weather by coordinates").await
    }

    /// Get the 5-day / 3-hour forecast by city name.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast_by_city(&self, city: &str) -> Result<Forecast, FetchError> {
        let url = format!(
            "{}/forecast?q={}&appid={}&units=metric",
            self.api_base_url,
            urlencoding::encode(city),
            self.api_key,
        );
        self.get_json(&url, &format!("forecast for {}", city)).await
    }

    /// Get the 5-day / 3-hour forecast by coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast_by_coords(&self, lat: f64, lon: f64) -> Result<Forecast, FetchError> {
        let url = format!(
            "{}/forecast?lat={}&lon={}&appid={}&units=metric",
            self.api_base_url, lat, lon, self.api_key,
        );
        self.get_json(&url, "forecast by coordinates").await
    }

    /// Search candidate cities for a free-text query (autocomplete).
    #[instrument(skip(self), level = "info")]
    pub async fn search_cities(&self, query: &str) -> Result<Vec<GeoMatch>, FetchError> {
        let url = format!(
            "{}/direct?q={}&limit=5&appid={}",
            self.geo_base_url,
            urlencoding::encode(query),
            self.api_key,
        );
        self.get_json(&url, "city search").await
    }

    /// Get air quality by coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality, FetchError> {
        let url = format!(
            "{}/air_pollution?lat={}&lon={}&appid={}",
            self.api_base_url, lat, lon, self.api_key,
        );
        self.get_json(&url, "air quality").await
    }

    /// URL of the provider's icon asset for an icon code.
    pub fn icon_url(&self, icon_code: &str, size: IconSize) -> String {
        format!("{}/{}@{}.png", self.icon_base_url, icon_code, size.token())
    }

    /// Perform a GET and decode the JSON body.
    ///
    /// All failure modes map to the same [`FetchError`] kind.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(context, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(context, format!("provider returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::new(context, format!("undecodable payload: {}", e)))
    }
}
