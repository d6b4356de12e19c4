//! Panel service
//!
//! Ties the pieces together for a widget host: resolves the location,
//! serves the forecast cache-first, and produces a complete snapshot
//! the host can draw. A refresh degrades instead of failing: the worst
//! case is the default city over a blank grid.

use crate::cache::{ForecastCache, LocationCache};
use crate::config::WeatherGridConfig;
use crate::forecast::ForecastClient;
use crate::geocode::{GeocodeClient, IpLocateClient};
use crate::grid::ForecastGrid;
use crate::location_resolver::{FixSource, LocationResolver};
use crate::models::{
    DisplayMode, LocationData, SearchResult, WeatherForecast, validate_coordinates,
};
use crate::prefs::{PrefGroup, PrefStore, keys};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Everything a widget host needs to draw the panel
#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub location: LocationData,
    /// Strategy that produced the location
    pub source: &'static str,
    pub mode: DisplayMode,
    pub grid: ForecastGrid,
    pub refreshed_at: DateTime<Utc>,
}

impl PanelSnapshot {
    /// Header line, city name with coordinates
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "{} ({})",
            self.location.city,
            self.location.format_coordinates()
        )
    }
}

impl fmt::Display for PanelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        writeln!(f)?;
        write!(f, "{}", self.grid)
    }
}

/// The panel's orchestration layer
pub struct PanelService {
    prefs: PrefStore,
    location_cache: LocationCache,
    forecast_cache: ForecastCache,
    resolver: LocationResolver,
    forecast: ForecastClient,
    geocode: GeocodeClient,
    retry_attempts: u32,
    retry_pause: Duration,
}

impl PanelService {
    /// Build the service from configuration
    pub fn new(config: &WeatherGridConfig) -> Result<Self> {
        debug!(path = %config.cache.path, "Opening preference store");
        let prefs = PrefStore::open(&config.cache.path)?;

        let location_cache = LocationCache::new(
            prefs.clone(),
            Duration::from_secs(u64::from(config.cache.location_ttl_hours) * 3600),
        );
        let forecast_cache = ForecastCache::new(
            prefs.clone(),
            Duration::from_secs(u64::from(config.cache.forecast_ttl_minutes) * 60),
        );

        let resolver = LocationResolver::new(
            GeocodeClient::new(config.geocode.clone())?,
            IpLocateClient::new(config.geocode.clone())?,
            Duration::from_secs(config.location.fix_wait_seconds.into()),
        );

        Ok(Self {
            prefs,
            location_cache,
            forecast_cache,
            resolver,
            forecast: ForecastClient::new(config.forecast.clone())?,
            geocode: GeocodeClient::new(config.geocode.clone())?,
            retry_attempts: config.location.retry_attempts.max(1),
            retry_pause: Duration::from_millis(config.location.retry_pause_ms),
        })
    }

    /// Register a coordinate fix source with the resolver
    #[must_use]
    pub fn with_fix_source(mut self, source: Box<dyn FixSource>) -> Self {
        self.resolver = self.resolver.with_source(source);
        self
    }

    /// Resolve the location, fetch or reuse the forecast, build the grid
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<PanelSnapshot> {
        let custom = self.load_custom_location().await?;
        let cached = self.location_cache.load().await.unwrap_or_else(|e| {
            warn!("Location cache unreadable: {:#}", e);
            None
        });

        let mut resolution = self.resolver.resolve(custom.as_ref(), cached.as_ref()).await;
        for attempt in 1..self.retry_attempts {
            if !resolution.is_fallback() {
                break;
            }
            debug!(attempt, "Resolution fell back to the default city, retrying");
            tokio::time::sleep(self.retry_pause).await;
            resolution = self.resolver.resolve(custom.as_ref(), cached.as_ref()).await;
        }

        if resolution.is_live() {
            if let Err(e) = self.location_cache.store(&resolution.location).await {
                warn!("Failed to cache resolved location: {:#}", e);
            }
        }

        let forecast = self.load_or_fetch_forecast(&resolution.location).await;

        let mode = self.display_mode().await?;
        let now = chrono::Local::now().naive_local();
        let grid = match mode {
            DisplayMode::Hourly => ForecastGrid::hourly(&forecast, now),
            DisplayMode::Daily => ForecastGrid::daily(&forecast, now.date()),
        };

        info!(
            city = %resolution.location.city,
            source = resolution.source,
            blank = grid.is_blank(),
            "Panel refreshed"
        );

        Ok(PanelSnapshot {
            location: resolution.location,
            source: resolution.source,
            mode,
            grid,
            refreshed_at: Utc::now(),
        })
    }

    /// Cached forecast when fresh, otherwise fetch and cache
    ///
    /// A failed fetch yields an empty forecast; the panel shows a blank
    /// grid rather than an error.
    async fn load_or_fetch_forecast(&self, location: &LocationData) -> WeatherForecast {
        let cached = self.forecast_cache.load().await.unwrap_or_else(|e| {
            warn!("Forecast cache unreadable: {:#}", e);
            None
        });
        if let Some(forecast) = cached {
            return forecast;
        }

        match self
            .forecast
            .fetch(location.latitude, location.longitude)
            .await
        {
            Ok(forecast) => {
                if let Err(e) = self.forecast_cache.store(&forecast).await {
                    warn!("Failed to cache forecast: {:#}", e);
                }
                forecast
            }
            Err(e) => {
                warn!("Forecast fetch failed, the panel will be blank: {:#}", e);
                WeatherForecast::default()
            }
        }
    }

    /// Which grid the panel renders
    pub async fn display_mode(&self) -> Result<DisplayMode> {
        let stored = self
            .prefs
            .get(PrefGroup::Location, keys::DISPLAY_MODE)
            .await?;
        Ok(stored
            .map(|value| DisplayMode::parse(&value))
            .unwrap_or_default())
    }

    /// Switch between the hourly and daily grid
    pub async fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        info!(mode = mode.as_str(), "Switching display mode");
        self.prefs
            .put(PrefGroup::Location, keys::DISPLAY_MODE, mode.as_str())
            .await
    }

    /// Search for city-like places matching the query
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.geocode.search(query).await
    }

    /// Pin the panel to an explicitly chosen place
    ///
    /// Also drops the cached forecast, so the next refresh fetches for
    /// the new place instead of serving data for the old one.
    pub async fn set_custom_location(
        &self,
        latitude: f64,
        longitude: f64,
        city: &str,
    ) -> Result<()> {
        validate_coordinates(latitude, longitude)?;

        info!(city, "Setting custom location");
        let group = PrefGroup::Location;
        self.prefs
            .put(group, keys::USE_CUSTOM_LOCATION, "true")
            .await?;
        self.prefs
            .put(group, keys::CUSTOM_LAT, latitude.to_string())
            .await?;
        self.prefs
            .put(group, keys::CUSTOM_LON, longitude.to_string())
            .await?;
        self.prefs.put(group, keys::CUSTOM_CITY, city).await?;

        self.forecast_cache.clear().await
    }

    /// Return to automatic location detection
    pub async fn clear_custom_location(&self) -> Result<()> {
        info!("Clearing custom location");
        let group = PrefGroup::Location;
        self.prefs
            .put(group, keys::USE_CUSTOM_LOCATION, "false")
            .await?;
        self.prefs.remove(group, keys::CUSTOM_LAT).await?;
        self.prefs.remove(group, keys::CUSTOM_LON).await?;
        self.prefs.remove(group, keys::CUSTOM_CITY).await?;

        self.forecast_cache.clear().await
    }

    /// The custom location, if one is set
    ///
    /// Unset coordinate preferences read as 0.0, which the resolver
    /// treats as "no custom location".
    pub async fn load_custom_location(&self) -> Result<Option<LocationData>> {
        let group = PrefGroup::Location;
        let enabled = self.prefs.get(group, keys::USE_CUSTOM_LOCATION).await?;
        if enabled.as_deref() != Some("true") {
            return Ok(None);
        }

        let latitude = self
            .prefs
            .get(group, keys::CUSTOM_LAT)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0);
        let longitude = self
            .prefs
            .get(group, keys::CUSTOM_LON)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0);
        let city = self
            .prefs
            .get(group, keys::CUSTOM_CITY)
            .await?
            .unwrap_or_default();

        Ok(Some(LocationData::custom(latitude, longitude, city)))
    }
}
