//! Typed caches over the preference store
//!
//! The store itself only holds strings. This layer encodes and decodes
//! the cached location and forecast records, stamps them on write, and
//! enforces their freshness windows on read. A record that is missing,
//! unreadable, or past its TTL loads as `None`, never as an error.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{LocationData, WeatherForecast};
use crate::prefs::{PrefGroup, PrefStore, keys};

/// A location read back from the cache, with its write time
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLocation {
    pub location: LocationData,
    /// When the record was written
    pub stored_at: DateTime<Utc>,
}

/// Last-known location with a freshness window
pub struct LocationCache {
    prefs: PrefStore,
    ttl: Duration,
}

impl LocationCache {
    #[must_use]
    pub fn new(prefs: PrefStore, ttl: Duration) -> Self {
        Self { prefs, ttl }
    }

    /// Persist a location, stamped with the current time
    pub async fn store(&self, location: &LocationData) -> Result<()> {
        self.store_at(location, Utc::now()).await
    }

    async fn store_at(&self, location: &LocationData, stored_at: DateTime<Utc>) -> Result<()> {
        let group = PrefGroup::Location;
        self.prefs
            .put(group, keys::CACHED_LAT, location.latitude.to_string())
            .await?;
        self.prefs
            .put(group, keys::CACHED_LON, location.longitude.to_string())
            .await?;
        self.prefs
            .put(group, keys::CACHED_CITY, location.city.clone())
            .await?;
        self.prefs
            .put(
                group,
                keys::CACHED_IS_CUSTOM,
                if location.is_custom { "true" } else { "false" },
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::LOCATION_TIMESTAMP,
                stored_at.timestamp().to_string(),
            )
            .await?;
        debug!(city = %location.city, "Stored location in cache");
        Ok(())
    }

    /// Load the cached location if present and still fresh
    pub async fn load(&self) -> Result<Option<CachedLocation>> {
        let group = PrefGroup::Location;
        let lat = self.prefs.get(group, keys::CACHED_LAT).await?;
        let lon = self.prefs.get(group, keys::CACHED_LON).await?;
        let city = self.prefs.get(group, keys::CACHED_CITY).await?;
        let is_custom = self.prefs.get(group, keys::CACHED_IS_CUSTOM).await?;
        let timestamp = self.prefs.get(group, keys::LOCATION_TIMESTAMP).await?;

        let (Some(lat), Some(lon), Some(city), Some(timestamp)) = (lat, lon, city, timestamp)
        else {
            debug!("No cached location");
            return Ok(None);
        };

        let (Ok(latitude), Ok(longitude), Ok(stored_secs)) =
            (lat.parse::<f64>(), lon.parse::<f64>(), timestamp.parse::<i64>())
        else {
            debug!("Cached location is unreadable, ignoring it");
            return Ok(None);
        };

        let Some(stored_at) = DateTime::from_timestamp(stored_secs, 0) else {
            debug!("Cached location timestamp out of range, ignoring it");
            return Ok(None);
        };

        let age_seconds = Utc::now().timestamp() - stored_secs;
        if age_seconds >= self.ttl.as_secs() as i64 {
            debug!(age_seconds, "Cached location expired");
            return Ok(None);
        }

        let is_custom = is_custom.as_deref() == Some("true");
        let location = LocationData {
            latitude,
            longitude,
            city,
            is_custom,
        };
        info!(city = %location.city, "Using cached location");
        Ok(Some(CachedLocation {
            location,
            stored_at,
        }))
    }
}

/// Cached forecast arrays with a freshness window
pub struct ForecastCache {
    prefs: PrefStore,
    ttl: Duration,
}

impl ForecastCache {
    #[must_use]
    pub fn new(prefs: PrefStore, ttl: Duration) -> Self {
        Self { prefs, ttl }
    }

    /// Persist a forecast, stamped with the current time
    pub async fn store(&self, forecast: &WeatherForecast) -> Result<()> {
        self.store_at(forecast, Utc::now()).await
    }

    async fn store_at(&self, forecast: &WeatherForecast, stored_at: DateTime<Utc>) -> Result<()> {
        let group = PrefGroup::Forecast;
        self.prefs
            .put(
                group,
                keys::HOURLY_TEMPS,
                encode_values(&forecast.hourly_temperatures),
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::HOURLY_CODES,
                encode_values(&forecast.hourly_weather_codes),
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::DAILY_MAX_TEMPS,
                encode_values(&forecast.daily_max_temperatures),
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::DAILY_MIN_TEMPS,
                encode_values(&forecast.daily_min_temperatures),
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::DAILY_CODES,
                encode_values(&forecast.daily_weather_codes),
            )
            .await?;
        // The arrays are anchored to local midnight of the fetch day, so
        // the reader needs that day to know the record is still aligned.
        self.prefs
            .put(
                group,
                keys::FORECAST_DAY,
                stored_at.with_timezone(&Local).date_naive().to_string(),
            )
            .await?;
        self.prefs
            .put(
                group,
                keys::CACHE_TIMESTAMP,
                stored_at.timestamp().to_string(),
            )
            .await?;
        info!(
            hours = forecast.hourly_temperatures.len(),
            days = forecast.daily_max_temperatures.len(),
            "Stored forecast in cache"
        );
        Ok(())
    }

    /// Drop the cached forecast so the next refresh fetches again
    pub async fn clear(&self) -> Result<()> {
        let group = PrefGroup::Forecast;
        for key in [
            keys::HOURLY_TEMPS,
            keys::HOURLY_CODES,
            keys::DAILY_MAX_TEMPS,
            keys::DAILY_MIN_TEMPS,
            keys::DAILY_CODES,
            keys::FORECAST_DAY,
            keys::CACHE_TIMESTAMP,
        ] {
            self.prefs.remove(group, key).await?;
        }
        debug!("Cleared cached forecast");
        Ok(())
    }

    /// Load the cached forecast if present and still fresh
    pub async fn load(&self) -> Result<Option<WeatherForecast>> {
        let group = PrefGroup::Forecast;
        let timestamp = self.prefs.get(group, keys::CACHE_TIMESTAMP).await?;
        let forecast_day = self.prefs.get(group, keys::FORECAST_DAY).await?;
        let hourly_temps = self.prefs.get(group, keys::HOURLY_TEMPS).await?;
        let hourly_codes = self.prefs.get(group, keys::HOURLY_CODES).await?;
        let daily_max = self.prefs.get(group, keys::DAILY_MAX_TEMPS).await?;
        let daily_min = self.prefs.get(group, keys::DAILY_MIN_TEMPS).await?;
        let daily_codes = self.prefs.get(group, keys::DAILY_CODES).await?;

        let (
            Some(timestamp),
            Some(forecast_day),
            Some(hourly_temps),
            Some(hourly_codes),
            Some(daily_max),
            Some(daily_min),
            Some(daily_codes),
        ) = (
            timestamp,
            forecast_day,
            hourly_temps,
            hourly_codes,
            daily_max,
            daily_min,
            daily_codes,
        )
        else {
            debug!("No cached forecast");
            return Ok(None);
        };

        let Ok(stored_secs) = timestamp.parse::<i64>() else {
            debug!("Cached forecast timestamp is unreadable, ignoring it");
            return Ok(None);
        };

        let age_seconds = Utc::now().timestamp() - stored_secs;
        if age_seconds >= self.ttl.as_secs() as i64 {
            debug!(age_seconds, "Cached forecast expired");
            return Ok(None);
        }

        // The hourly grid indexes the arrays from today's local midnight.
        // A record fetched late yesterday can still be inside the TTL, but
        // its day 0 is yesterday, so it no longer lines up.
        let Ok(anchor) = forecast_day.parse::<NaiveDate>() else {
            debug!("Cached forecast day is unreadable, ignoring it");
            return Ok(None);
        };
        if anchor != Local::now().date_naive() {
            debug!(%anchor, "Cached forecast is anchored to a previous day");
            return Ok(None);
        }

        let (
            Some(hourly_temperatures),
            Some(hourly_weather_codes),
            Some(daily_max_temperatures),
            Some(daily_min_temperatures),
            Some(daily_weather_codes),
        ) = (
            decode_values(&hourly_temps),
            decode_values(&hourly_codes),
            decode_values(&daily_max),
            decode_values(&daily_min),
            decode_values(&daily_codes),
        )
        else {
            debug!("Cached forecast is unreadable, ignoring it");
            return Ok(None);
        };

        let forecast = WeatherForecast {
            hourly_temperatures,
            hourly_weather_codes,
            daily_max_temperatures,
            daily_min_temperatures,
            daily_weather_codes,
        };
        info!(
            hours = forecast.hourly_temperatures.len(),
            days = forecast.daily_max_temperatures.len(),
            "Serving forecast from cache"
        );
        Ok(Some(forecast))
    }
}

/// Encode a series as a comma-separated string
fn encode_values(values: &[i32]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a comma-separated series, `None` when any entry is malformed
fn decode_values(raw: &str) -> Option<Vec<i32>> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',').map(|part| part.trim().parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp_prefs() -> (TempDir, PrefStore) {
        let dir = TempDir::new().unwrap();
        let prefs = PrefStore::open(dir.path()).unwrap();
        (dir, prefs)
    }

    fn sample_forecast() -> WeatherForecast {
        WeatherForecast {
            hourly_temperatures: vec![12, 13, 15, 14],
            hourly_weather_codes: vec![0, 1, 61, 95],
            daily_max_temperatures: vec![15, 18],
            daily_min_temperatures: vec![8, -2],
            daily_weather_codes: vec![3, 71],
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let values = vec![-12, 0, 7, 100];
        assert_eq!(decode_values(&encode_values(&values)), Some(values));
        assert_eq!(encode_values(&[]), "");
        assert_eq!(decode_values(""), Some(Vec::new()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_values("1,x,3"), None);
        assert_eq!(decode_values("1,,3"), None);
        assert_eq!(decode_values("12.5"), None);
    }

    #[tokio::test]
    async fn test_location_round_trip() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = LocationCache::new(prefs, Duration::from_secs(24 * 3600));

        let location = LocationData::new(46.9481, 7.4474, "Bern");
        cache.store(&location).await.unwrap();

        let cached = cache.load().await.unwrap().unwrap();
        assert_eq!(cached.location, location);
        assert!((Utc::now() - cached.stored_at).num_seconds() < 5);
    }

    #[tokio::test]
    async fn test_location_empty_cache_is_none() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = LocationCache::new(prefs, Duration::from_secs(24 * 3600));

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_location_expires() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = LocationCache::new(prefs, Duration::from_secs(24 * 3600));

        let location = LocationData::new(46.9481, 7.4474, "Bern");
        let yesterday = Utc::now() - chrono::Duration::hours(25);
        cache.store_at(&location, yesterday).await.unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_location_unreadable_record_is_none() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = LocationCache::new(prefs.clone(), Duration::from_secs(24 * 3600));

        let location = LocationData::new(46.9481, 7.4474, "Bern");
        cache.store(&location).await.unwrap();
        prefs
            .put(PrefGroup::Location, keys::CACHED_LAT, "not-a-number")
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forecast_round_trip() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs, Duration::from_secs(120 * 60));

        let forecast = sample_forecast();
        cache.store(&forecast).await.unwrap();

        assert_eq!(cache.load().await.unwrap(), Some(forecast));
    }

    #[tokio::test]
    async fn test_forecast_empty_arrays_round_trip() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs, Duration::from_secs(120 * 60));

        cache.store(&WeatherForecast::default()).await.unwrap();

        assert_eq!(
            cache.load().await.unwrap(),
            Some(WeatherForecast::default())
        );
    }

    #[tokio::test]
    async fn test_forecast_expires() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs, Duration::from_secs(120 * 60));

        let three_hours_ago = Utc::now() - chrono::Duration::hours(3);
        cache
            .store_at(&sample_forecast(), three_hours_ago)
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forecast_from_previous_day_is_discarded() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs.clone(), Duration::from_secs(120 * 60));

        // Fetched late in the evening, read back after midnight: still
        // within the TTL, but day 0 of the arrays is no longer today
        cache.store(&sample_forecast()).await.unwrap();
        let yesterday = Local::now().date_naive() - chrono::Duration::days(1);
        prefs
            .put(PrefGroup::Forecast, keys::FORECAST_DAY, yesterday.to_string())
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forecast_clear_forces_miss() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs, Duration::from_secs(120 * 60));

        cache.store(&sample_forecast()).await.unwrap();
        cache.clear().await.unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forecast_partial_record_is_none() {
        let (_dir, prefs) = open_temp_prefs();
        let cache = ForecastCache::new(prefs.clone(), Duration::from_secs(120 * 60));

        cache.store(&sample_forecast()).await.unwrap();
        prefs
            .remove(PrefGroup::Forecast, keys::DAILY_CODES)
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap(), None);
    }
}
