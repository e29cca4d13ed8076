use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Directory for local databases (key-value store, offline cache)
    pub data_dir: PathBuf,

    /// Weather provider endpoints and credentials
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Freshness and timing knobs
    #[serde(default)]
    pub weather: WeatherTuning,
}

/// OpenWeatherMap endpoints and API credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key, passed as a query parameter on every request.
    /// Can also be supplied via the OPENWEATHER_API_KEY environment variable.
    pub api_key: String,

    /// Base URL for weather/forecast/air-pollution endpoints
    pub api_base_url: String,

    /// Base URL for the geocoding (city search) endpoint
    pub geo_base_url: String,

    /// Base URL for weather icon assets
    pub icon_base_url: String,
}

impl ProviderConfig {
    /// Check if an API key is configured (not the placeholder)
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENWEATHER_API_KEY")
                .unwrap_or_else(|_| "YOUR_OPENWEATHER_API_KEY".to_string()),
            api_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            geo_base_url: "https://api.openweathermap.org/geo/1.0".to_string(),
            icon_base_url: "https://openweathermap.org/img/wn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherTuning {
    /// Maximum snapshot age usable as a fallback when a live fetch fails
    pub freshness_minutes: u32,

    /// Device location request timeout in seconds
    pub location_timeout_secs: u32,

    /// Days before a dismissed install prompt becomes eligible again
    pub install_prompt_cooldown_days: u32,
}

impl Default for WeatherTuning {
    fn default() -> Self {
        Self {
            freshness_minutes: 30,
            location_timeout_secs: 5,
            install_prompt_cooldown_days: 7,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weatherwise");
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weatherwise");

        Self {
            config_dir,
            data_dir,
            provider: ProviderConfig::default(),
            weather: WeatherTuning::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.api_base_url, "provider.api_base_url", &mut result);
        self.validate_url(&self.provider.geo_base_url, "provider.geo_base_url", &mut result);
        self.validate_url(
            &self.provider.icon_base_url,
            "provider.icon_base_url",
            &mut result,
        );

        if !self.provider.is_configured() {
            result.add_warning(
                "provider.api_key",
                "OpenWeatherMap API key not configured - weather requests will be rejected",
            );
        }

        if self.weather.freshness_minutes == 0 {
            result.add_warning(
                "weather.freshness_minutes",
                "Cached snapshots will never be served as a fallback (0 minutes)",
            );
        } else if self.weather.freshness_minutes > 1440 {
            result.add_warning(
                "weather.freshness_minutes",
                "Fallback window is more than 24 hours; data may be very stale",
            );
        }

        if self.weather.location_timeout_secs == 0 {
            result.add_error(
                "weather.location_timeout_secs",
                "Location timeout must be greater than 0",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to its default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherwise");

        Ok(config_dir.join("config.toml"))
    }
}
