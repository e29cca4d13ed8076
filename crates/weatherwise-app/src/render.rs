//! Terminal rendering of weather records.

use chrono::DateTime;

use weatherwise_provider::{AirQuality, Forecast, GeoMatch};
use weatherwise_service::summary::{
    self, AirQualityLevel,
};
use weatherwise_store::{FavoriteCity, TemperatureUnit, UserSettings, WeatherSnapshot};

fn fmt_temp(celsius: f64, unit: TemperatureUnit) -> String {
    format!("{:.0}{}", unit.from_celsius(celsius), unit.suffix())
}

/// Clock time of a provider timestamp in the location's local time.
fn fmt_local_time(unix_secs: i64, tz_shift_secs: i32) -> String {
    DateTime::from_timestamp(unix_secs + i64::from(tz_shift_secs), 0)
        .unwrap_or_default()
        .format("%H:%M")
        .to_string()
}

pub fn print_current(snapshot: &WeatherSnapshot, settings: &UserSettings) {
    let current = &snapshot.current;
    let unit = settings.temperature_unit;
    let condition = current.condition();

    let country = current.sys.country.as_deref().unwrap_or("");
    println!(
        "{}{}  {} {}",
        current.name,
        if country.is_empty() { String::new() } else { format!(", {}", country) },
        condition.emoji(),
        condition.description(),
    );
    println!(
        "  {} (feels like {})",
        fmt_temp(current.main.temp, unit),
        fmt_temp(current.main.feels_like, unit),
    );
    println!(
        "  Humidity {}%  Wind {:.1} m/s  Pressure {} hPa",
        current.main.humidity, current.wind.speed, current.main.pressure,
    );
    println!(
        "  Sunrise {}  Sunset {}",
        fmt_local_time(current.sys.sunrise, current.timezone),
        fmt_local_time(current.sys.sunset, current.timezone),
    );
    println!("  Captured {}", snapshot.captured_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    println!("{}", summary::weather_story(current));
    println!("{}", summary::weather_advice(current));
    println!("Wear: {}", summary::clothing_recommendation(current.main.temp, condition));
}

pub fn print_forecast(forecast: &Forecast, settings: &UserSettings) {
    let unit = settings.temperature_unit;

    println!("Next hours in {}:", forecast.city.name);
    for entry in summary::hourly_forecast(forecast, 24) {
        let condition = entry.condition();
        println!(
            "  {}  {} {:<13} {:>5}  {:.0}% precip",
            fmt_local_time(entry.dt, forecast.city.timezone),
            condition.emoji(),
            condition.description(),
            fmt_temp(entry.main.temp, unit),
            entry.pop * 100.0,
        );
    }

    println!();
    println!("Daily outlook:");
    for day in summary::daily_forecast(forecast) {
        println!(
            "  {}  {} {:<13} {:>5} .. {:<5}  humidity {}%  wind {:.1} m/s",
            day.date.format("%a %b %d"),
            day.condition.emoji(),
            day.condition.description(),
            fmt_temp(day.temp_min, unit),
            fmt_temp(day.temp_max, unit),
            day.humidity,
            day.wind_speed,
        );
    }
}

pub fn print_search(matches: &[GeoMatch]) {
    if matches.is_empty() {
        println!("No matching cities.");
        return;
    }
    for (i, m) in matches.iter().enumerate() {
        println!("  {}. {}  ({:.4}, {:.4})", i + 1, m.label(), m.lat, m.lon);
    }
}

pub fn print_air(air: &AirQuality) {
    match air.current_aqi().and_then(AirQualityLevel::from_aqi) {
        Some(level) => {
            println!("Air quality: {} - {}", level.label(), level.description());
        }
        None => println!("Air quality: unknown"),
    }

    if let Some(entry) = air.list.first() {
        let c = &entry.components;
        println!(
            "  PM2.5 {:.1}  PM10 {:.1}  O3 {:.1}  NO2 {:.1} (μg/m³)",
            c.pm2_5, c.pm10, c.o3, c.no2,
        );
    }
}

pub fn print_favorites(favorites: &[FavoriteCity]) {
    if favorites.is_empty() {
        println!("No favorite cities yet. Add one with 'weatherwise favorites add <city>'.");
        return;
    }
    for fav in favorites {
        println!(
            "  {} ({})  {:.4}, {:.4}  added {}",
            fav.name,
            fav.country,
            fav.lat,
            fav.lon,
            fav.last_updated.format("%Y-%m-%d"),
        );
    }
}

pub fn print_settings(settings: &UserSettings) {
    println!("  dark_mode:     {}", settings.dark_mode);
    println!(
        "  unit:          {}",
        match settings.temperature_unit {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    );
    println!("  language:      {}", settings.language);
    println!("  notifications: {}", settings.notifications);
}
