//! Persistent preference store backing the panel
//!
//! A flat string-to-string store, split into a location group and a
//! forecast group. Parsing stored values into richer types happens in
//! the cache layer, not here.

use crate::WeatherGridError;
use anyhow::Result;
use fjall::Keyspace;
use std::path::Path;
use tokio::task;

/// Preference key names, grouped by keyspace
pub mod keys {
    // location group
    pub const USE_CUSTOM_LOCATION: &str = "use_custom_location";
    pub const CUSTOM_LAT: &str = "custom_lat";
    pub const CUSTOM_LON: &str = "custom_lon";
    pub const CUSTOM_CITY: &str = "custom_city";
    pub const DISPLAY_MODE: &str = "display_mode";
    pub const CACHED_LAT: &str = "cached_lat";
    pub const CACHED_LON: &str = "cached_lon";
    pub const CACHED_CITY: &str = "cached_city";
    pub const CACHED_IS_CUSTOM: &str = "cached_is_custom";
    pub const LOCATION_TIMESTAMP: &str = "location_timestamp";

    // forecast group
    pub const HOURLY_TEMPS: &str = "hourly_temps";
    pub const HOURLY_CODES: &str = "hourly_codes";
    pub const DAILY_MAX_TEMPS: &str = "daily_max_temps";
    pub const DAILY_MIN_TEMPS: &str = "daily_min_temps";
    pub const DAILY_CODES: &str = "daily_codes";
    pub const FORECAST_DAY: &str = "forecast_day";
    pub const CACHE_TIMESTAMP: &str = "cache_timestamp";
}

/// Which keyspace a preference lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefGroup {
    Location,
    Forecast,
}

/// Durable key-value store for panel preferences and cached data
#[derive(Clone)]
pub struct PrefStore {
    location: Keyspace,
    forecast: Keyspace,
}

impl std::fmt::Debug for PrefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefStore").finish_non_exhaustive()
    }
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl PrefStore {
    /// Open (or create) the store at the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path)
            .open()
            .map_err(|e| WeatherGridError::cache(format!("Failed to open preference store: {e}")))?;
        let location = db
            .keyspace("location_prefs", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| WeatherGridError::cache(format!("Failed to open the location group: {e}")))?;
        let forecast = db
            .keyspace("forecast_prefs", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| WeatherGridError::cache(format!("Failed to open the forecast group: {e}")))?;
        Ok(PrefStore { location, forecast })
    }

    fn store(&self, group: PrefGroup) -> &Keyspace {
        match group {
            PrefGroup::Location => &self.location,
            PrefGroup::Forecast => &self.forecast,
        }
    }

    /// Stores a string value under the given key.
    #[tracing::instrument(name = "put_pref", level = "debug", skip(self, value))]
    pub async fn put(&self, group: PrefGroup, key: &str, value: impl Into<String>) -> Result<()> {
        let store = self.store(group).clone();
        let key = key.as_bytes().to_vec();
        let bytes = value.into().into_bytes();

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    /// Retrieves a string value if the key exists.
    #[tracing::instrument(name = "query_pref", level = "debug", skip(self))]
    pub async fn get(&self, group: PrefGroup, key: &str) -> Result<Option<String>> {
        let store = self.store(group).clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        match maybe_bytes {
            Some(bytes) => {
                tracing::debug!("Key found");
                Ok(Some(String::from_utf8(bytes)?))
            }
            None => {
                tracing::debug!("Key not found");
                Ok(None)
            }
        }
    }

    /// Manually removes a key from the store.
    pub async fn remove(&self, group: PrefGroup, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store(group).clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}
