//! Core data types shared across the forecast panel

use crate::WeatherGridError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved place the panel shows weather for
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationData {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Display name (city or locality)
    pub city: String,
    /// Whether the user picked this place explicitly
    pub is_custom: bool,
}

impl LocationData {
    /// Create a detected (non-custom) location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, city: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            city: city.into(),
            is_custom: false,
        }
    }

    /// Create a user-selected location
    #[must_use]
    pub fn custom(latitude: f64, longitude: f64, city: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            city: city.into(),
            is_custom: true,
        }
    }

    /// Terminal fallback when every resolution path has failed
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(51.5074, -0.1278, "London")
    }

    /// Format coordinates for display, four decimal places
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A raw coordinate fix from a device-style source, before a city name
/// is attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// When the source produced this fix
    pub timestamp: DateTime<Utc>,
}

/// Forecast data as parallel arrays, index-aligned by hour or day of the
/// forecast horizon
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WeatherForecast {
    /// Temperature per hour, degrees Celsius
    pub hourly_temperatures: Vec<i32>,
    /// WMO weather code per hour
    pub hourly_weather_codes: Vec<i32>,
    /// Daily maximum temperature, degrees Celsius
    pub daily_max_temperatures: Vec<i32>,
    /// Daily minimum temperature, degrees Celsius
    pub daily_min_temperatures: Vec<i32>,
    /// WMO weather code per day
    pub daily_weather_codes: Vec<i32>,
}

impl WeatherForecast {
    /// True when no data points are present at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hourly_temperatures.is_empty() && self.daily_max_temperatures.is_empty()
    }

    /// Build forecast arrays from a raw API response
    ///
    /// Lengths follow the temperature arrays. A missing temperature or
    /// weather code becomes 0 instead of dropping the slot, temperatures
    /// are truncated toward zero, and the daily horizon is clamped to
    /// `max_days`.
    #[must_use]
    pub fn from_openmeteo(response: &openmeteo::ForecastResponse, max_days: usize) -> Self {
        let (hourly_temperatures, hourly_weather_codes) = match &response.hourly {
            Some(block) => {
                let hours = block.temperature_2m.len();
                (
                    fill_temperatures(&block.temperature_2m, hours),
                    fill_codes(&block.weather_code, hours),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        let (daily_max_temperatures, daily_min_temperatures, daily_weather_codes) =
            match &response.daily {
                Some(block) => {
                    let days = block.temperature_2m_max.len().min(max_days);
                    (
                        fill_temperatures(&block.temperature_2m_max, days),
                        fill_temperatures(&block.temperature_2m_min, days),
                        fill_codes(&block.weather_code, days),
                    )
                }
                None => (Vec::new(), Vec::new(), Vec::new()),
            };

        Self {
            hourly_temperatures,
            hourly_weather_codes,
            daily_max_temperatures,
            daily_min_temperatures,
            daily_weather_codes,
        }
    }
}

fn fill_temperatures(values: &[Option<f64>], len: usize) -> Vec<i32> {
    (0..len)
        .map(|i| values.get(i).copied().flatten().unwrap_or(0.0) as i32)
        .collect()
}

fn fill_codes(codes: &[Option<i32>], len: usize) -> Vec<i32> {
    (0..len)
        .map(|i| codes.get(i).copied().flatten().unwrap_or(0))
        .collect()
}

/// Raw response types for the Open-Meteo forecast API
pub mod openmeteo {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        #[serde(default)]
        pub hourly: Option<HourlyBlock>,
        #[serde(default)]
        pub daily: Option<DailyBlock>,
    }

    /// Hour-indexed arrays, starting at local midnight of the current day
    #[derive(Debug, Deserialize)]
    pub struct HourlyBlock {
        #[serde(default)]
        pub temperature_2m: Vec<Option<f64>>,
        #[serde(default)]
        pub weather_code: Vec<Option<i32>>,
    }

    /// Day-indexed arrays, starting at the current day
    #[derive(Debug, Deserialize)]
    pub struct DailyBlock {
        #[serde(default)]
        pub temperature_2m_max: Vec<Option<f64>>,
        #[serde(default)]
        pub temperature_2m_min: Vec<Option<f64>>,
        #[serde(default)]
        pub weather_code: Vec<Option<i32>>,
    }
}

/// One hit from the forward-geocoding search
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResult {
    /// Full display name as returned by the search service
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Country name, empty when the service omits it
    pub country: String,
}

/// Which grid the panel renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Hourly,
    Daily,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::Hourly
    }
}

impl DisplayMode {
    /// Stable string form used in the preference store
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Parse the stored string form, defaulting to hourly
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "daily" => Self::Daily,
            _ => Self::Hourly,
        }
    }
}

/// Reject coordinates outside the valid range
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(WeatherGridError::validation(format!(
            "Latitude {latitude} is out of range (-90 to 90)"
        ))
        .into());
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(WeatherGridError::validation(format!(
            "Longitude {longitude} is out of range (-180 to 180)"
        ))
        .into());
    }
    Ok(())
}

/// Curated city presets for pickers
#[must_use]
pub fn popular_cities() -> Vec<LocationData> {
    vec![
        LocationData::custom(51.5074, -0.1278, "London"),
        LocationData::custom(40.7128, -74.0060, "New York"),
        LocationData::custom(35.6762, 139.6503, "Tokyo"),
        LocationData::custom(48.8566, 2.3522, "Paris"),
        LocationData::custom(-33.8688, 151.2093, "Sydney"),
        LocationData::custom(52.5200, 13.4050, "Berlin"),
        LocationData::custom(55.7558, 37.6173, "Moscow"),
        LocationData::custom(39.9042, 116.4074, "Beijing"),
        LocationData::custom(19.0760, 72.8777, "Mumbai"),
        LocationData::custom(30.0444, 31.2357, "Cairo"),
        LocationData::custom(-22.9068, -43.1729, "Rio de Janeiro"),
        LocationData::custom(43.6532, -79.3832, "Toronto"),
        LocationData::custom(25.2048, 55.2708, "Dubai"),
        LocationData::custom(1.3521, 103.8198, "Singapore"),
        LocationData::custom(52.3676, 4.9041, "Amsterdam"),
        LocationData::custom(41.3851, 2.1734, "Barcelona"),
        LocationData::custom(48.2082, 16.3738, "Vienna"),
        LocationData::custom(50.0755, 14.4378, "Prague"),
        LocationData::custom(41.0082, 28.9784, "Istanbul"),
    ]
}
