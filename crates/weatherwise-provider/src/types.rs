use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weather condition categories mapped from OpenWeatherMap condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl Condition {
    /// Convert an OpenWeatherMap condition id to a Condition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: u16) -> Self {
        match id {
            200..=232 => Self::Thunderstorm,
            300..=321 => Self::Drizzle,
            500 | 501 | 520 | 521 => Self::Rain,
            502..=504 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            600..=602 | 620..=622 => Self::Snow,
            611..=616 => Self::Sleet,
            701..=762 => Self::Fog, // Mist, smoke, haze, dust, fog, ash
            771 | 781 => Self::Thunderstorm, // Squall, tornado
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    /// Terminal-friendly emoji for the condition
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Clear => "☀️",
            Self::PartlyCloudy => "🌤️",
            Self::Cloudy => "☁️",
            Self::Fog => "🌫️",
            Self::Drizzle => "🌦️",
            Self::Rain | Self::HeavyRain => "🌧️",
            Self::Snow | Self::Sleet => "❄️",
            Self::Thunderstorm => "⛈️",
        }
    }

    /// Whether this condition involves precipitation falling as rain
    pub fn is_rainy(&self) -> bool {
        matches!(self, Self::Drizzle | Self::Rain | Self::HeavyRain | Self::Thunderstorm)
    }
}

/// Geographic coordinate pair as returned by the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// One entry of the provider's `weather` array: a tagged condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionTag {
    pub id: u16,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl ConditionTag {
    pub fn condition(&self) -> Condition {
        Condition::from_owm_id(self.id)
    }
}

/// Thermodynamic readings shared by current conditions and forecast entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermodynamics {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: u32,
    pub humidity: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<u16>,
    #[serde(default)]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clouds {
    /// Cloudiness percentage
    pub all: u8,
}

/// Sunrise/sunset block of a current-conditions response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunTimes {
    #[serde(default)]
    pub country: Option<String>,
    pub sunrise: i64,
    pub sunset: i64,
}

/// Current conditions for one location (provider `/weather` response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub coord: Coord,
    pub weather: Vec<ConditionTag>,
    pub main: Thermodynamics,
    #[serde(default)]
    pub visibility: Option<u32>,
    pub wind: Wind,
    pub clouds: Clouds,
    /// Observation time, Unix UTC seconds
    pub dt: i64,
    pub sys: SunTimes,
    /// Shift from UTC in seconds
    pub timezone: i32,
    pub id: i64,
    pub name: String,
}

impl CurrentConditions {
    /// Primary condition category (the provider lists the dominant one first)
    pub fn condition(&self) -> Condition {
        self.weather.first().map(ConditionTag::condition).unwrap_or_default()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.dt, 0).unwrap_or_default()
    }
}

/// One 3-hour step of the forecast list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Forecast time, Unix UTC seconds
    pub dt: i64,
    pub main: Thermodynamics,
    pub weather: Vec<ConditionTag>,
    pub clouds: Clouds,
    pub wind: Wind,
    #[serde(default)]
    pub visibility: Option<u32>,
    /// Probability of precipitation, 0.0..=1.0
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub rain: Option<Precipitation>,
    #[serde(default)]
    pub snow: Option<Precipitation>,
    pub dt_txt: String,
}

impl ForecastEntry {
    pub fn condition(&self) -> Condition {
        self.weather.first().map(ConditionTag::condition).unwrap_or_default()
    }

    pub fn forecast_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.dt, 0).unwrap_or_default()
    }
}

/// Accumulated precipitation over the 3-hour window, millimetres
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "3h", default)]
    pub three_hour: Option<f64>,
}

/// City block of a forecast response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastCity {
    pub id: i64,
    pub name: String,
    pub coord: Coord,
    #[serde(default)]
    pub country: Option<String>,
    pub timezone: i32,
    pub sunrise: i64,
    pub sunset: i64,
}

/// Multi-day forecast in 3-hour steps (provider `/forecast` response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub list: Vec<ForecastEntry>,
    pub city: ForecastCity,
}

/// Geocoding match for a free-text city query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoMatch {
    /// Display label, e.g. "Portland, Oregon, US"
    pub fn label(&self) -> String {
        match &self.state {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}

/// Air quality index bucket reported by the provider, 1 (good) to 5 (very poor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityIndex {
    pub aqi: u8,
}

/// Pollutant concentrations, μg/m³
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pollutants {
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityEntry {
    pub main: AirQualityIndex,
    pub components: Pollutants,
    pub dt: i64,
}

/// Air quality for one coordinate (provider `/air_pollution` response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQuality {
    pub coord: Coord,
    pub list: Vec<AirQualityEntry>,
}

impl AirQuality {
    /// The current AQI bucket, if the provider returned any reading
    pub fn current_aqi(&self) -> Option<u8> {
        self.list.first().map(|e| e.main.aqi)
    }
}
