//! Top-level assembly: configuration, store, provider client and services
//! are constructed here and passed down explicitly. No module-level state.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use weatherwise_core::{AppError, Config, ConfigError};
use weatherwise_offline::ResourceCache;
use weatherwise_provider::{DeviceLocator, SystemLocationSource, WeatherClient};
use weatherwise_service::WeatherService;
use weatherwise_store::LocalStore;

/// Cache generation identifier for the current deployment. Activation
/// purges every other generation by comparing against this name.
const CACHE_GENERATION: &str = "weatherwise-v1";

pub struct App {
    config: Config,
    store: Arc<LocalStore>,
    service: WeatherService,
    locator: DeviceLocator<SystemLocationSource>,
}

impl App {
    pub fn new() -> Result<Self, AppError> {
        let config = Config::load().map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }
        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        std::fs::create_dir_all(&config.data_dir)?;

        let store = Arc::new(
            LocalStore::new(config.data_dir.join("store.db"))
                .map_err(|e| ConfigError::Invalid(format!("cannot open local store: {}", e)))?,
        );

        let client = WeatherClient::new(&config.provider)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let service = WeatherService::new(
            client,
            store.clone(),
            Duration::minutes(i64::from(config.weather.freshness_minutes)),
        );

        let locator = DeviceLocator::new(
            SystemLocationSource,
            StdDuration::from_secs(u64::from(config.weather.location_timeout_secs)),
        );

        Ok(Self {
            config,
            store,
            service,
            locator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn service(&self) -> &WeatherService {
        &self.service
    }

    pub fn locator(&self) -> &DeviceLocator<SystemLocationSource> {
        &self.locator
    }

    /// Days before a dismissed tip becomes eligible again.
    pub fn tip_cooldown(&self) -> Duration {
        Duration::days(i64::from(self.config.weather.install_prompt_cooldown_days))
    }

    /// Open the offline response cache for this deployment's generation.
    ///
    /// Provider hosts are taken from the configured endpoints so the
    /// network-first routing follows whatever the config points at.
    pub fn offline_cache(&self) -> Result<ResourceCache, AppError> {
        let mut provider_hosts: Vec<String> = Vec::new();
        for endpoint in [
            &self.config.provider.api_base_url,
            &self.config.provider.geo_base_url,
            &self.config.provider.icon_base_url,
        ] {
            if let Some(host) = url::Url::parse(endpoint).ok().and_then(|u| u.host_str().map(str::to_string)) {
                if !provider_hosts.contains(&host) {
                    provider_hosts.push(host);
                }
            }
        }

        ResourceCache::new(
            self.config.data_dir.join("offline.db"),
            CACHE_GENERATION,
            provider_hosts,
        )
        .map_err(|e| ConfigError::Invalid(format!("cannot open offline cache: {}", e)).into())
    }
}
