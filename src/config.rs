//! Configuration management for the forecast panel
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherGridError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the forecast panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherGridConfig {
    /// Forecast API configuration
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Geocoding service configuration
    #[serde(default)]
    pub geocode: GeocodeConfig,
    /// Location resolution configuration
    #[serde(default)]
    pub location: LocationConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Forecast API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Base URL for the forecast API
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_forecast_timeout")]
    pub timeout_seconds: u32,
    /// Number of forecast days to request (the API caps this at 16)
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

/// Geocoding service configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Reverse geocoding endpoint (coordinates to city name)
    #[serde(default = "default_reverse_url")]
    pub reverse_url: String,
    /// Forward search endpoint (free text to places)
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// IP geolocation endpoint
    #[serde(default = "default_ip_url")]
    pub ip_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_geocode_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of search results to return
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// Location resolution configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// How long to wait for a fresh coordinate fix, in seconds
    #[serde(default = "default_fix_wait")]
    pub fix_wait_seconds: u32,
    /// Total resolution attempts before accepting a fallback result
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Pause between resolution attempts, in milliseconds
    #[serde(default = "default_retry_pause")]
    pub retry_pause_ms: u64,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory location
    #[serde(default = "default_cache_path")]
    pub path: String,
    /// How long a cached location stays usable, in hours
    #[serde(default = "default_location_ttl")]
    pub location_ttl_hours: u32,
    /// How long cached forecast data stays usable, in minutes
    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_minutes: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_forecast_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_forecast_timeout() -> u32 {
    10
}

fn default_forecast_days() -> u32 {
    16
}

fn default_reverse_url() -> String {
    "https://api.bigdatacloud.net/data/reverse-geocode-client".to_string()
}

fn default_search_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_ip_url() -> String {
    "https://geolocation-db.com/json/".to_string()
}

fn default_geocode_timeout() -> u32 {
    5
}

fn default_max_results() -> u32 {
    8
}

fn default_fix_wait() -> u32 {
    5
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_pause() -> u64 {
    1500
}

fn default_cache_path() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("weathergrid").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".weathergrid".to_string())
}

fn default_location_ttl() -> u32 {
    24
}

fn default_forecast_ttl() -> u32 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            timeout_seconds: default_forecast_timeout(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            reverse_url: default_reverse_url(),
            search_url: default_search_url(),
            ip_url: default_ip_url(),
            timeout_seconds: default_geocode_timeout(),
            max_results: default_max_results(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fix_wait_seconds: default_fix_wait(),
            retry_attempts: default_retry_attempts(),
            retry_pause_ms: default_retry_pause(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            location_ttl_hours: default_location_ttl(),
            forecast_ttl_minutes: default_forecast_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for WeatherGridConfig {
    fn default() -> Self {
        Self {
            forecast: ForecastConfig::default(),
            geocode: GeocodeConfig::default(),
            location: LocationConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WeatherGridConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with WEATHERGRID_ prefix
        builder = builder.add_source(
            Environment::with_prefix("WEATHERGRID")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: WeatherGridConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weathergrid").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.forecast.base_url.is_empty() {
            self.forecast.base_url = default_forecast_base_url();
        }
        if self.forecast.timeout_seconds == 0 {
            self.forecast.timeout_seconds = default_forecast_timeout();
        }
        if self.forecast.forecast_days == 0 {
            self.forecast.forecast_days = default_forecast_days();
        }
        if self.geocode.reverse_url.is_empty() {
            self.geocode.reverse_url = default_reverse_url();
        }
        if self.geocode.search_url.is_empty() {
            self.geocode.search_url = default_search_url();
        }
        if self.geocode.ip_url.is_empty() {
            self.geocode.ip_url = default_ip_url();
        }
        if self.geocode.timeout_seconds == 0 {
            self.geocode.timeout_seconds = default_geocode_timeout();
        }
        if self.geocode.max_results == 0 {
            self.geocode.max_results = default_max_results();
        }
        if self.location.fix_wait_seconds == 0 {
            self.location.fix_wait_seconds = default_fix_wait();
        }
        if self.location.retry_attempts == 0 {
            self.location.retry_attempts = default_retry_attempts();
        }
        if self.cache.path.is_empty() {
            self.cache.path = default_cache_path();
        }
        if self.cache.location_ttl_hours == 0 {
            self.cache.location_ttl_hours = default_location_ttl();
        }
        if self.cache.forecast_ttl_minutes == 0 {
            self.cache.forecast_ttl_minutes = default_forecast_ttl();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.forecast.timeout_seconds > 60 {
            return Err(WeatherGridError::config(
                "Forecast API timeout cannot exceed 60 seconds",
            )
            .into());
        }

        if self.forecast.forecast_days > 16 {
            return Err(WeatherGridError::config(
                "Forecast days cannot exceed 16 (the API cap)",
            )
            .into());
        }

        if self.geocode.timeout_seconds > 60 {
            return Err(WeatherGridError::config(
                "Geocoding timeout cannot exceed 60 seconds",
            )
            .into());
        }

        if self.geocode.max_results > 50 {
            return Err(WeatherGridError::config(
                "Geocoding max results cannot exceed 50",
            )
            .into());
        }

        if !(5..=10).contains(&self.location.fix_wait_seconds) {
            return Err(WeatherGridError::config(
                "Location fix wait must be between 5 and 10 seconds",
            )
            .into());
        }

        if self.location.retry_attempts > 5 {
            return Err(WeatherGridError::config(
                "Location retry attempts cannot exceed 5",
            )
            .into());
        }

        if self.location.retry_pause_ms > 10_000 {
            return Err(WeatherGridError::config(
                "Location retry pause cannot exceed 10000 ms",
            )
            .into());
        }

        if self.cache.location_ttl_hours > 168 {
            return Err(WeatherGridError::config(
                "Location cache TTL cannot exceed 168 hours (1 week)",
            )
            .into());
        }

        if self.cache.forecast_ttl_minutes > 1440 {
            return Err(WeatherGridError::config(
                "Forecast cache TTL cannot exceed 1440 minutes (1 day)",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherGridError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherGridError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Forecast base URL", &self.forecast.base_url),
            ("Reverse geocoding URL", &self.geocode.reverse_url),
            ("Search URL", &self.geocode.search_url),
            ("IP geolocation URL", &self.geocode.ip_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeatherGridError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Create configuration directory if it doesn't exist
    pub fn ensure_config_dir() -> Result<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let weathergrid_config_dir = config_dir.join("weathergrid");
            std::fs::create_dir_all(&weathergrid_config_dir).with_context(|| {
                format!(
                    "Failed to create config directory: {}",
                    weathergrid_config_dir.display()
                )
            })?;
            Ok(weathergrid_config_dir)
        } else {
            Err(WeatherGridError::config("Unable to determine config directory").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = WeatherGridConfig::default();
        assert_eq!(config.forecast.base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.forecast.timeout_seconds, 10);
        assert_eq!(config.forecast.forecast_days, 16);
        assert_eq!(config.location.fix_wait_seconds, 5);
        assert_eq!(config.location.retry_attempts, 2);
        assert_eq!(config.cache.location_ttl_hours, 24);
        assert_eq!(config.cache.forecast_ttl_minutes, 120);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = WeatherGridConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = WeatherGridConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = WeatherGridConfig::default();
        config.forecast.forecast_days = 20; // Invalid - beyond the API cap
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Forecast days cannot exceed")
        );
    }

    #[test]
    fn test_config_validation_fix_wait_bounds() {
        let mut config = WeatherGridConfig::default();
        config.location.fix_wait_seconds = 30;
        assert!(config.validate().is_err());

        config.location.fix_wait_seconds = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_url() {
        let mut config = WeatherGridConfig::default();
        config.geocode.ip_url = "geolocation-db.com/json/".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HTTP or HTTPS"));
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = WeatherGridConfig::default();
        config.forecast.base_url = String::new();
        config.forecast.timeout_seconds = 0;
        config.cache.forecast_ttl_minutes = 0;
        config.apply_defaults();
        assert_eq!(config.forecast.base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.forecast.timeout_seconds, 10);
        assert_eq!(config.cache.forecast_ttl_minutes, 120);
    }

    #[test]
    fn test_environment_variable_override() {
        // This test verifies that environment variables are handled correctly
        // Set minimal environment to test basic functionality

        // SAFETY: Test environment, setting test values only
        unsafe {
            env::set_var("WEATHERGRID_LOGGING__LEVEL", "debug");
        }

        // Test with basic config that should have defaults
        let mut config = WeatherGridConfig::default();
        config.logging.level = "debug".to_string(); // Simulate env override

        let result = config.validate();

        // SAFETY: Test cleanup
        unsafe {
            env::remove_var("WEATHERGRID_LOGGING__LEVEL");
        }

        assert!(result.is_ok());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_path_generation() {
        let path = WeatherGridConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("weathergrid"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
