use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weatherwise_provider::{CurrentConditions, Forecast};

/// A captured weather result paired with its capture time.
///
/// Immutable once stored; the next successful fetch for the same city key
/// supersedes it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Display-cased city name as requested by the user
    pub city: String,
    pub current: CurrentConditions,
    #[serde(default)]
    pub forecast: Option<Forecast>,
    pub captured_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn new(city: impl Into<String>, current: CurrentConditions) -> Self {
        Self {
            city: city.into(),
            current,
            forecast: None,
            captured_at: Utc::now(),
        }
    }

    /// Lookup key for this snapshot: the city name, lowercased.
    pub fn key(&self) -> String {
        self.city.to_lowercase()
    }
}

/// Identity of a city: coordinates rounded to the provider's precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    /// Provider coordinates carry four decimal places of precision.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self(format!("{:.4},{:.4}", lat, lon))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A city pinned by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteCity {
    pub id: CityId,
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub last_updated: DateTime<Utc>,
}

impl FavoriteCity {
    pub fn new(name: impl Into<String>, country: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: CityId::new(lat, lon),
            name: name.into(),
            country: country.into(),
            lat,
            lon,
            last_updated: Utc::now(),
        }
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a Celsius reading into this unit.
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Per-installation user settings. Singleton; partial updates merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub dark_mode: bool,
    pub temperature_unit: TemperatureUnit,
    pub language: String,
    pub notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            temperature_unit: TemperatureUnit::Celsius,
            language: "en".to_string(),
            notifications: true,
        }
    }
}

/// Partial settings update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub dark_mode: Option<bool>,
    pub temperature_unit: Option<TemperatureUnit>,
    pub language: Option<String>,
    pub notifications: Option<bool>,
}

impl UserSettings {
    /// Merge a partial update into this record.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(dark_mode) = update.dark_mode {
            self.dark_mode = dark_mode;
        }
        if let Some(unit) = update.temperature_unit {
            self.temperature_unit = unit;
        }
        if let Some(language) = update.language {
            self.language = language;
        }
        if let Some(notifications) = update.notifications {
            self.notifications = notifications;
        }
    }
}

/// Most recent successfully resolved location. Singleton; overwritten
/// wholesale on every change, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    pub lat: f64,
    pub lon: f64,
    pub city: String,
}

/// Exported user state. Import is all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedData {
    pub favorites: Vec<FavoriteCity>,
    pub settings: UserSettings,
    #[serde(default)]
    pub last_location: Option<LastLocation>,
    pub exported_at: DateTime<Utc>,
}
