//! Forecast API client for the Open-Meteo integration
//!
//! A single request fetches the whole horizon the panel can show:
//! hourly temperatures and weather codes plus daily minimum, maximum
//! and weather code arrays. No API key is required.

use crate::WeatherGridError;
use crate::config::ForecastConfig;
use crate::models::{WeatherForecast, openmeteo, validate_coordinates};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// HTTP client for the forecast API
pub struct ForecastClient {
    client: Client,
    config: ForecastConfig,
}

impl ForecastClient {
    /// Create a new forecast client
    pub fn new(config: ForecastConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Fetch the hourly and daily forecast for the given coordinates
    #[instrument(skip(self))]
    pub async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherForecast> {
        validate_coordinates(latitude, longitude)?;

        info!(
            "Fetching forecast for coordinates: {:.4}, {:.4}",
            latitude, longitude
        );
        let start_time = Instant::now();

        let url = format!(
            "{}/forecast?latitude={}&longitude={}&hourly=temperature_2m,weather_code&daily=temperature_2m_max,temperature_2m_min,weather_code&temperature_unit=celsius&windspeed_unit=kmh&precipitation_unit=mm&timezone=auto&forecast_days={}",
            self.config.base_url, latitude, longitude, self.config.forecast_days
        );

        debug!("Forecast request URL: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Forecast request failed: {}", e);
            WeatherGridError::api("Failed to reach the forecast API")
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Forecast API rate limit hit");
            return Err(WeatherGridError::api(
                "Forecast API rate limit exceeded. Please try again later.",
            )
            .into());
        }
        if !response.status().is_success() {
            return Err(WeatherGridError::api(format!(
                "Forecast API returned status {}",
                response.status()
            ))
            .into());
        }

        let parse_start = Instant::now();
        let raw: openmeteo::ForecastResponse = response.json().await.map_err(|e| {
            error!("Failed to parse forecast response: {}", e);
            WeatherGridError::api("Invalid forecast data received from the weather API")
        })?;

        let forecast = WeatherForecast::from_openmeteo(&raw, self.config.forecast_days as usize);

        let parse_duration = parse_start.elapsed();
        let total_duration = start_time.elapsed();

        info!(
            "Retrieved forecast with {} hourly and {} daily points in {:.3}s (parse: {:.3}s)",
            forecast.hourly_temperatures.len(),
            forecast.daily_max_temperatures.len(),
            total_duration.as_secs_f64(),
            parse_duration.as_secs_f64()
        );

        if total_duration.as_secs() > 5 {
            warn!(
                "Slow forecast API response: {:.3}s",
                total_duration.as_secs_f64()
            );
        }

        Ok(forecast)
    }
}
