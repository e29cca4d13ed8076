//! Derived summaries: narrative advice, clothing hints, air-quality levels
//! and daily/hourly aggregation of the 3-hour forecast list.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use weatherwise_provider::{Condition, CurrentConditions, Forecast, ForecastEntry};

/// Narrative guidance for the current conditions.
///
/// Joins one line per applicable observation: temperature band, feels-like
/// delta, condition, humidity and wind.
pub fn weather_advice(current: &CurrentConditions) -> String {
    let temp = current.main.temp;
    let feels_like = current.main.feels_like;
    let condition = current.condition();
    let humidity = current.main.humidity;
    let wind_speed = current.wind.speed;

    let mut advice: Vec<String> = Vec::new();

    advice.push(
        if temp <= 0.0 {
            "Bundle up, it is freezing outside."
        } else if temp <= 10.0 {
            "Wear a warm jacket and layers."
        } else if temp <= 20.0 {
            "A light jacket or sweater should be enough."
        } else if temp <= 30.0 {
            "Comfortable weather for light clothing."
        } else {
            "Stay cool and pick light, breathable fabrics."
        }
        .to_string(),
    );

    // The causal wording follows only the sign of the feels-like delta
    let delta = temp - feels_like;
    if delta.abs() > 5.0 {
        if feels_like > temp {
            advice.push(format!(
                "It feels about {:.0}° warmer than the reading due to humidity.",
                delta.abs()
            ));
        } else {
            advice.push(format!(
                "Wind chill makes it feel about {:.0}° cooler than the reading.",
                delta.abs()
            ));
        }
    }

    match condition {
        Condition::Drizzle | Condition::Rain | Condition::HeavyRain => {
            advice.push("Take an umbrella.".to_string());
        }
        Condition::Snow | Condition::Sleet => {
            advice.push("Watch out for slippery conditions.".to_string());
        }
        Condition::Thunderstorm => {
            advice.push("Stay indoors if possible and avoid outdoor activities.".to_string());
        }
        Condition::Clear if temp > 25.0 => {
            advice.push("Apply sunscreen before going out.".to_string());
        }
        _ => {}
    }

    if humidity > 80 {
        advice.push("High humidity, stay hydrated and take it easy outdoors.".to_string());
    } else if humidity < 30 {
        advice.push("Low humidity, drink plenty of water.".to_string());
    }

    if wind_speed > 20.0 {
        advice.push("Very windy, secure loose items.".to_string());
    } else if wind_speed > 10.0 {
        advice.push("Breezy conditions out there.".to_string());
    }

    advice.join(" ")
}

/// What to wear for a given temperature and condition.
pub fn clothing_recommendation(temp: f64, condition: Condition) -> String {
    let mut clothing = if temp <= 0.0 {
        "Heavy winter coat, thermal layers, warm boots, gloves and a hat"
    } else if temp <= 10.0 {
        "Warm jacket, sweater, long pants and closed shoes"
    } else if temp <= 20.0 {
        "Light jacket or cardigan"
    } else if temp <= 30.0 {
        "T-shirt, light pants or shorts"
    } else {
        "Light, breathable clothing, shorts and sandals"
    }
    .to_string();

    if condition.is_rainy() {
        clothing.push_str(", plus a waterproof jacket and umbrella");
    }
    if matches!(condition, Condition::Snow | Condition::Sleet) {
        clothing.push_str(", plus waterproof boots");
    }

    clothing
}

/// Provider AQI buckets 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AirQualityLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AirQualityLevel {
    /// Map the provider's index to a level. Out-of-range readings are
    /// unknown, not coerced.
    pub fn from_aqi(aqi: u8) -> Option<Self> {
        match aqi {
            1 => Some(Self::Good),
            2 => Some(Self::Fair),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::VeryPoor),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Good => "Air quality is satisfactory",
            Self::Fair => "Air quality is acceptable",
            Self::Moderate => "Some health concerns for sensitive people",
            Self::Poor => "Unhealthy, limit time outdoors",
            Self::VeryPoor => "Health alert, avoid outdoor exertion",
        }
    }
}

/// One aggregated forecast day.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub condition: Condition,
    /// Mean humidity over the day's entries, rounded
    pub humidity: u8,
    /// Mean wind speed over the day's entries
    pub wind_speed: f64,
}

/// Aggregate the 3-hour forecast list into at most 7 daily summaries.
///
/// Days are split on the city's local date. The day's condition is the most
/// frequent one among its entries (first seen wins ties).
pub fn daily_forecast(forecast: &Forecast) -> Vec<DailySummary> {
    let tz_shift = i64::from(forecast.city.timezone);

    let mut days: Vec<(NaiveDate, Vec<&ForecastEntry>)> = Vec::new();
    for entry in &forecast.list {
        let local = DateTime::from_timestamp(entry.dt + tz_shift, 0).unwrap_or_default();
        let date = local.date_naive();
        match days.last_mut() {
            Some((last_date, entries)) if *last_date == date => entries.push(entry),
            _ => days.push((date, vec![entry])),
        }
    }

    days.into_iter()
        .take(7)
        .map(|(date, entries)| {
            let temp_min = entries.iter().map(|e| e.main.temp).fold(f64::INFINITY, f64::min);
            let temp_max =
                entries.iter().map(|e| e.main.temp).fold(f64::NEG_INFINITY, f64::max);

            let mut counts: Vec<(Condition, usize)> = Vec::new();
            for entry in &entries {
                let condition = entry.condition();
                match counts.iter_mut().find(|(c, _)| *c == condition) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((condition, 1)),
                }
            }
            let condition = counts
                .iter()
                .max_by_key(|(_, n)| *n)
                .map(|(c, _)| *c)
                .unwrap_or_default();

            let count = entries.len() as f64;
            let humidity = entries.iter().map(|e| f64::from(e.main.humidity)).sum::<f64>() / count;
            let wind_speed = entries.iter().map(|e| e.wind.speed).sum::<f64>() / count;

            DailySummary {
                date,
                temp_min,
                temp_max,
                condition,
                humidity: humidity.round() as u8,
                wind_speed,
            }
        })
        .collect()
}

/// The forecast entries covering the next `hours` hours (3-hour steps,
/// rounded up).
pub fn hourly_forecast(forecast: &Forecast, hours: u32) -> &[ForecastEntry] {
    let steps = (hours.div_ceil(3)) as usize;
    let end = steps.min(forecast.list.len());
    &forecast.list[..end]
}

/// Whether the observation was taken outside daylight hours.
pub fn is_night(current: &CurrentConditions) -> bool {
    current.dt < current.sys.sunrise || current.dt > current.sys.sunset
}

const STORY_OPENERS: [&str; 3] = [
    "In the heart of {city}, {description} paints the sky while the temperature settles at {temp}°C.",
    "{city} wakes to {description}, with the air carrying a steady {temp}°C.",
    "{city} sits under {description} today as thermometers hover around {temp}°C.",
];

/// A short narrative for the current conditions.
///
/// The opener is chosen by observation time, so the same reading always
/// produces the same story.
pub fn weather_story(current: &CurrentConditions) -> String {
    let description = current
        .weather
        .first()
        .map(|tag| tag.description.clone())
        .unwrap_or_else(|| current.condition().description().to_lowercase());

    let opener = STORY_OPENERS[(current.dt.unsigned_abs() as usize) % STORY_OPENERS.len()]
        .replace("{city}", &current.name)
        .replace("{description}", &description)
        .replace("{temp}", &format!("{:.0}", current.main.temp));

    let temp = current.main.temp;
    let feels_like = current.main.feels_like;

    if (temp - feels_like).abs() > 3.0 {
        format!(
            "{} It feels more like {:.0}°C in the open air.",
            opener, feels_like
        )
    } else if current.wind.speed > 5.0 {
        format!(
            "{} Winds at {:.0} m/s keep the air moving.",
            opener,
            current.wind.speed
        )
    } else {
        format!("{} The air is still and calm.", opener)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn conditions(
        temp: f64,
        feels_like: f64,
        condition_id: u16,
        humidity: u8,
        wind_speed: f64,
    ) -> CurrentConditions {
        serde_json::from_value(serde_json::json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": condition_id, "main": "x", "description": "light rain", "icon": "10d"}],
            "main": {"temp": temp, "feels_like": feels_like, "temp_min": temp, "temp_max": temp,
                     "pressure": 1012, "humidity": humidity},
            "wind": {"speed": wind_speed, "deg": 180},
            "clouds": {"all": 40},
            "dt": 1700000000,
            "sys": {"country": "GB", "sunrise": 1699970000, "sunset": 1700003000},
            "timezone": 0,
            "id": 2643743,
            "name": "London"
        }))
        .unwrap()
    }

    fn forecast_with_entries(entries: serde_json::Value) -> Forecast {
        serde_json::from_value(serde_json::json!({
            "list": entries,
            "city": {
                "id": 2643743, "name": "London",
                "coord": {"lat": 51.5085, "lon": -0.1257},
                "country": "GB", "timezone": 0,
                "sunrise": 1699970000, "sunset": 1700003000
            }
        }))
        .unwrap()
    }

    fn entry(dt: i64, temp: f64, condition_id: u16, humidity: u8, wind: f64) -> serde_json::Value {
        serde_json::json!({
            "dt": dt,
            "main": {"temp": temp, "feels_like": temp, "temp_min": temp, "temp_max": temp,
                     "pressure": 1012, "humidity": humidity},
            "weather": [{"id": condition_id, "main": "x", "description": "d", "icon": "01d"}],
            "clouds": {"all": 10},
            "wind": {"speed": wind, "deg": 100},
            "pop": 0.0,
            "dt_txt": "t"
        })
    }

    #[test]
    fn test_advice_freezing() {
        let advice = weather_advice(&conditions(-3.0, -3.0, 800, 50, 2.0));
        assert!(advice.contains("freezing"));
    }

    #[test]
    fn test_advice_feels_like_delta_over_five() {
        let advice = weather_advice(&conditions(30.0, 37.0, 800, 50, 2.0));
        assert!(advice.contains("warmer"));

        let advice = weather_advice(&conditions(5.0, -2.0, 800, 50, 2.0));
        assert!(advice.contains("cooler"));
    }

    #[test]
    fn test_advice_small_delta_no_feels_like_line() {
        let advice = weather_advice(&conditions(20.0, 22.0, 800, 50, 2.0));
        assert!(!advice.contains("warmer"));
        assert!(!advice.contains("cooler"));
    }

    #[test]
    fn test_advice_rain_umbrella() {
        let advice = weather_advice(&conditions(12.0, 12.0, 500, 70, 3.0));
        assert!(advice.contains("umbrella"));
    }

    #[test]
    fn test_advice_humidity_and_wind_thresholds() {
        let advice = weather_advice(&conditions(22.0, 22.0, 800, 85, 25.0));
        assert!(advice.contains("humidity"));
        assert!(advice.contains("windy"));

        let advice = weather_advice(&conditions(22.0, 22.0, 800, 20, 12.0));
        assert!(advice.contains("water"));
        assert!(advice.contains("Breezy"));
    }

    #[test]
    fn test_clothing_rain_addendum() {
        let clothing = clothing_recommendation(15.0, Condition::Rain);
        assert!(clothing.contains("umbrella"));

        let clothing = clothing_recommendation(15.0, Condition::Clear);
        assert!(!clothing.contains("umbrella"));
    }

    #[test]
    fn test_clothing_snow_addendum() {
        let clothing = clothing_recommendation(-5.0, Condition::Snow);
        assert!(clothing.contains("waterproof boots"));
    }

    #[test]
    fn test_air_quality_levels() {
        assert_eq!(AirQualityLevel::from_aqi(1), Some(AirQualityLevel::Good));
        assert_eq!(AirQualityLevel::from_aqi(5), Some(AirQualityLevel::VeryPoor));
        assert_eq!(AirQualityLevel::from_aqi(0), None);
        assert_eq!(AirQualityLevel::from_aqi(6), None);
        assert_eq!(AirQualityLevel::from_aqi(4).unwrap().label(), "Poor");
    }

    #[test]
    fn test_daily_forecast_groups_by_day() {
        // Three entries on day one (midnight, 03:00, 06:00 UTC), two on day two
        let day1 = 1700006400; // 2023-11-15 00:00:00 UTC
        let day2 = day1 + 24 * 3600;
        let forecast = forecast_with_entries(serde_json::json!([
            entry(day1, 10.0, 800, 60, 2.0),
            entry(day1 + 3 * 3600, 14.0, 500, 70, 4.0),
            entry(day1 + 6 * 3600, 12.0, 500, 80, 3.0),
            entry(day2, 8.0, 600, 90, 5.0),
            entry(day2 + 3 * 3600, 9.0, 600, 90, 5.0),
        ]));

        let daily = daily_forecast(&forecast);
        assert_eq!(daily.len(), 2);

        assert!((daily[0].temp_min - 10.0).abs() < f64::EPSILON);
        assert!((daily[0].temp_max - 14.0).abs() < f64::EPSILON);
        // Rain appears twice, clear once
        assert_eq!(daily[0].condition, Condition::Rain);
        assert_eq!(daily[0].humidity, 70);

        assert_eq!(daily[1].condition, Condition::Snow);
    }

    #[test]
    fn test_daily_forecast_caps_at_seven_days() {
        let base = 1700006400;
        let entries: Vec<serde_json::Value> =
            (0..10).map(|d| entry(base + d * 24 * 3600, 10.0, 800, 50, 1.0)).collect();
        let forecast = forecast_with_entries(serde_json::json!(entries));

        assert_eq!(daily_forecast(&forecast).len(), 7);
    }

    #[test]
    fn test_hourly_forecast_rounds_steps_up() {
        let base = 1700006400;
        let entries: Vec<serde_json::Value> =
            (0..12).map(|i| entry(base + i * 3 * 3600, 10.0, 800, 50, 1.0)).collect();
        let forecast = forecast_with_entries(serde_json::json!(entries));

        assert_eq!(hourly_forecast(&forecast, 24).len(), 8);
        assert_eq!(hourly_forecast(&forecast, 4).len(), 2);
        // Never more entries than the provider returned
        assert_eq!(hourly_forecast(&forecast, 96).len(), 12);
    }

    #[test]
    fn test_is_night() {
        let mut current = conditions(10.0, 10.0, 800, 50, 1.0);
        // dt 1700000000 sits between sunrise and sunset in the fixture
        assert!(!is_night(&current));

        current.dt = current.sys.sunset + 3600;
        assert!(is_night(&current));
    }

    #[test]
    fn test_weather_story_is_deterministic() {
        let current = conditions(18.0, 18.0, 800, 50, 1.0);
        assert_eq!(weather_story(&current), weather_story(&current));
        assert!(weather_story(&current).contains("London"));
    }
}
