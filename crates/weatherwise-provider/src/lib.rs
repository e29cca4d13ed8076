//! OpenWeatherMap client for WeatherWise
//!
//! Issues current-conditions, forecast, geocoding and air-quality requests
//! and translates provider responses into typed records. Also resolves the
//! device location through the platform location service.

pub mod client;
pub mod error;
pub mod location;
pub mod types;

pub use client::{IconSize, WeatherClient};
pub use error::{FetchError, LocationError};
pub use location::{Coordinates, DeviceLocator, LocationSource, SystemLocationSource};
pub use types::*;
