//! Location resolution
//!
//! Resolves where the panel should show weather for. The resolver walks
//! an ordered chain of providers: an explicit custom location, the most
//! recent last-known position, a fresh coordinate fix raced across all
//! registered sources, and IP geolocation. The first provider with an
//! answer wins; when all of them pass, a default city is used, so
//! resolution never fails.

use crate::cache::CachedLocation;
use crate::geocode::{GeocodeClient, IpLocateClient, UNKNOWN_CITY};
use crate::models::{Fix, LocationData};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, select_ok};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Stable names for where a resolution came from
pub mod source {
    pub const CUSTOM: &str = "custom";
    pub const LAST_KNOWN: &str = "last_known";
    pub const FRESH_FIX: &str = "fresh_fix";
    pub const IP_LOOKUP: &str = "ip_lookup";
    pub const FALLBACK: &str = "fallback";
}

/// A device-style source of coordinate fixes
///
/// Implementations may hold a previously delivered position and can
/// wait for a new one on request. Hosts register their own sources;
/// the resolver races all of them when it needs a fresh fix.
#[async_trait]
pub trait FixSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// The most recent fix this source already holds
    async fn last_known(&self) -> Option<Fix>;

    /// Wait for a new fix
    async fn fresh_fix(&self) -> Result<Fix>;
}

/// Fix source with a preset position, for hosts that already know
/// where the device is
pub struct StaticFixSource {
    fix: Fix,
}

impl StaticFixSource {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            fix: Fix {
                latitude,
                longitude,
                timestamp: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl FixSource for StaticFixSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn last_known(&self) -> Option<Fix> {
        Some(self.fix)
    }

    async fn fresh_fix(&self) -> Result<Fix> {
        Ok(Fix {
            timestamp: Utc::now(),
            ..self.fix
        })
    }
}

/// A resolved location together with the strategy that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub location: LocationData,
    /// One of the [`source`] constants
    pub source: &'static str,
}

impl Resolution {
    /// True when every strategy failed and the default city was used
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == source::FALLBACK
    }

    /// True when the location came from a live signal worth caching
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(
            self.source,
            source::CUSTOM | source::FRESH_FIX | source::IP_LOOKUP
        )
    }
}

/// One strategy in the resolution chain
///
/// Providers answer with a location or pass. They never error; failures
/// are logged inside the provider and surface as a pass.
#[async_trait]
trait LocationProvider: Send + Sync {
    /// One of the [`source`] constants
    fn name(&self) -> &'static str;

    async fn locate(&self) -> Option<LocationData>;
}

/// Works through the location provider chain
pub struct LocationResolver {
    sources: Vec<Box<dyn FixSource>>,
    geocode: GeocodeClient,
    ip_locate: IpLocateClient,
    fix_wait: Duration,
}

impl LocationResolver {
    #[must_use]
    pub fn new(geocode: GeocodeClient, ip_locate: IpLocateClient, fix_wait: Duration) -> Self {
        Self {
            sources: Vec::new(),
            geocode,
            ip_locate,
            fix_wait,
        }
    }

    /// Register a coordinate fix source
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn FixSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Resolve a location, never failing
    ///
    /// `custom` is an explicitly chosen place and wins outright unless
    /// it carries the 0.0/0.0 "unset" coordinates. `cached` competes
    /// with the sources' last-known fixes by recency.
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        custom: Option<&LocationData>,
        cached: Option<&CachedLocation>,
    ) -> Resolution {
        let providers: Vec<Box<dyn LocationProvider + '_>> = vec![
            Box::new(CustomProvider { custom }),
            Box::new(LastKnownProvider {
                sources: &self.sources,
                cached,
                geocode: &self.geocode,
            }),
            Box::new(FreshFixProvider {
                sources: &self.sources,
                fix_wait: self.fix_wait,
                geocode: &self.geocode,
            }),
            Box::new(IpProvider {
                client: &self.ip_locate,
            }),
        ];

        for provider in &providers {
            if let Some(location) = provider.locate().await {
                info!(source = provider.name(), city = %location.city, "Location resolved");
                return Resolution {
                    location,
                    source: provider.name(),
                };
            }
        }

        info!("Every location provider came up empty, using the default city");
        Resolution {
            location: LocationData::fallback(),
            source: source::FALLBACK,
        }
    }
}

struct CustomProvider<'a> {
    custom: Option<&'a LocationData>,
}

#[async_trait]
impl LocationProvider for CustomProvider<'_> {
    fn name(&self) -> &'static str {
        source::CUSTOM
    }

    async fn locate(&self) -> Option<LocationData> {
        let custom = self.custom?;
        if custom.latitude == 0.0 && custom.longitude == 0.0 {
            debug!("Custom location is unset");
            return None;
        }
        Some(custom.clone())
    }
}

enum LastKnown {
    Fix(Fix),
    Cached(LocationData),
}

struct LastKnownProvider<'a> {
    sources: &'a [Box<dyn FixSource>],
    cached: Option<&'a CachedLocation>,
    geocode: &'a GeocodeClient,
}

#[async_trait]
impl LocationProvider for LastKnownProvider<'_> {
    fn name(&self) -> &'static str {
        source::LAST_KNOWN
    }

    async fn locate(&self) -> Option<LocationData> {
        let (timestamp, last_known) = self.best().await?;
        let location = match last_known {
            LastKnown::Fix(fix) => {
                let city = city_for(self.geocode, fix.latitude, fix.longitude).await;
                LocationData::new(fix.latitude, fix.longitude, city)
            }
            LastKnown::Cached(location) => location,
        };
        debug!(
            age_seconds = (Utc::now() - timestamp).num_seconds(),
            "Using last-known position"
        );
        Some(location)
    }
}

impl LastKnownProvider<'_> {
    /// Most recent position already held by any source or the cache
    async fn best(&self) -> Option<(DateTime<Utc>, LastKnown)> {
        let mut best: Option<(DateTime<Utc>, LastKnown)> = None;

        for source in self.sources {
            if let Some(fix) = source.last_known().await {
                debug!(
                    source = source.name(),
                    age_seconds = (Utc::now() - fix.timestamp).num_seconds(),
                    "Last-known fix available"
                );
                if best.as_ref().is_none_or(|(ts, _)| fix.timestamp > *ts) {
                    best = Some((fix.timestamp, LastKnown::Fix(fix)));
                }
            }
        }

        if let Some(cached) = self.cached {
            if best.as_ref().is_none_or(|(ts, _)| cached.stored_at > *ts) {
                best = Some((cached.stored_at, LastKnown::Cached(cached.location.clone())));
            }
        }

        best
    }
}

struct FreshFixProvider<'a> {
    sources: &'a [Box<dyn FixSource>],
    fix_wait: Duration,
    geocode: &'a GeocodeClient,
}

#[async_trait]
impl LocationProvider for FreshFixProvider<'_> {
    fn name(&self) -> &'static str {
        source::FRESH_FIX
    }

    async fn locate(&self) -> Option<LocationData> {
        let fix = self.race().await?;
        let city = city_for(self.geocode, fix.latitude, fix.longitude).await;
        Some(LocationData::new(fix.latitude, fix.longitude, city))
    }
}

impl FreshFixProvider<'_> {
    /// Race every source for a fresh fix, first success wins
    async fn race(&self) -> Option<Fix> {
        if self.sources.is_empty() {
            debug!("No fix sources registered");
            return None;
        }

        let races: Vec<BoxFuture<'_, Result<Fix>>> = self
            .sources
            .iter()
            .map(|source| {
                let name = source.name();
                let race: BoxFuture<'_, Result<Fix>> = Box::pin(async move {
                    let fix = source.fresh_fix().await?;
                    debug!(source = name, "Fresh fix delivered");
                    Ok(fix)
                });
                race
            })
            .collect();

        match tokio::time::timeout(self.fix_wait, select_ok(races)).await {
            Ok(Ok((fix, _slower))) => Some(fix),
            Ok(Err(e)) => {
                warn!("Every fix source failed: {:#}", e);
                None
            }
            Err(_) => {
                warn!("No fresh fix within {:.1}s", self.fix_wait.as_secs_f64());
                None
            }
        }
    }
}

struct IpProvider<'a> {
    client: &'a IpLocateClient,
}

#[async_trait]
impl LocationProvider for IpProvider<'_> {
    fn name(&self) -> &'static str {
        source::IP_LOOKUP
    }

    async fn locate(&self) -> Option<LocationData> {
        match self.client.locate().await {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("IP geolocation failed: {:#}", e);
                None
            }
        }
    }
}

/// City name for a raw fix
///
/// Reverse-geocode failure degrades to a placeholder name rather than
/// failing resolution.
async fn city_for(geocode: &GeocodeClient, latitude: f64, longitude: f64) -> String {
    match geocode.reverse(latitude, longitude).await {
        Ok(city) => city,
        Err(e) => {
            warn!("Reverse geocoding failed: {:#}", e);
            UNKNOWN_CITY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocodeConfig;

    // Endpoints nothing listens on, so every network step fails fast
    fn dead_config() -> GeocodeConfig {
        GeocodeConfig {
            reverse_url: "http://127.0.0.1:9/reverse".to_string(),
            search_url: "http://127.0.0.1:9/search".to_string(),
            ip_url: "http://127.0.0.1:9/ip".to_string(),
            timeout_seconds: 1,
            max_results: 8,
        }
    }

    fn resolver(fix_wait: Duration) -> LocationResolver {
        LocationResolver::new(
            GeocodeClient::new(dead_config()).unwrap(),
            IpLocateClient::new(dead_config()).unwrap(),
            fix_wait,
        )
    }

    struct StaleSource {
        fix: Fix,
    }

    #[async_trait]
    impl FixSource for StaleSource {
        fn name(&self) -> &'static str {
            "stale"
        }

        async fn last_known(&self) -> Option<Fix> {
            Some(self.fix)
        }

        async fn fresh_fix(&self) -> Result<Fix> {
            futures::future::pending().await
        }
    }

    struct SlowFixSource {
        delay: Duration,
        fix: Fix,
    }

    #[async_trait]
    impl FixSource for SlowFixSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn last_known(&self) -> Option<Fix> {
            None
        }

        async fn fresh_fix(&self) -> Result<Fix> {
            tokio::time::sleep(self.delay).await;
            Ok(self.fix)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FixSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn last_known(&self) -> Option<Fix> {
            None
        }

        async fn fresh_fix(&self) -> Result<Fix> {
            Err(anyhow::anyhow!("no signal"))
        }
    }

    fn fix_at(latitude: f64, longitude: f64, age: chrono::Duration) -> Fix {
        Fix {
            latitude,
            longitude,
            timestamp: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_custom_location_wins() {
        let resolver = resolver(Duration::from_millis(100));
        let custom = LocationData::custom(52.52, 13.405, "Berlin");

        let resolution = resolver.resolve(Some(&custom), None).await;

        assert_eq!(resolution.source, source::CUSTOM);
        assert_eq!(resolution.location, custom);
        assert!(resolution.is_live());
        assert!(!resolution.is_fallback());
    }

    #[tokio::test]
    async fn test_unset_custom_sentinel_is_skipped() {
        let resolver = resolver(Duration::from_millis(100));
        let unset = LocationData::custom(0.0, 0.0, "");
        let cached = CachedLocation {
            location: LocationData::new(51.5074, -0.1278, "London"),
            stored_at: Utc::now(),
        };

        let resolution = resolver.resolve(Some(&unset), Some(&cached)).await;

        assert_eq!(resolution.source, source::LAST_KNOWN);
        assert_eq!(resolution.location.city, "London");
    }

    #[tokio::test]
    async fn test_most_recent_last_known_wins() {
        let resolver = resolver(Duration::from_millis(100))
            .with_source(Box::new(StaleSource {
                fix: fix_at(40.0, -70.0, chrono::Duration::minutes(10)),
            }))
            .with_source(Box::new(StaleSource {
                fix: fix_at(48.85, 2.35, chrono::Duration::minutes(5)),
            }));
        let cached = CachedLocation {
            location: LocationData::new(51.5074, -0.1278, "London"),
            stored_at: Utc::now() - chrono::Duration::hours(1),
        };

        let resolution = resolver.resolve(None, Some(&cached)).await;

        assert_eq!(resolution.source, source::LAST_KNOWN);
        assert_eq!(resolution.location.latitude, 48.85);
        // The reverse geocoder is unreachable in this test
        assert_eq!(resolution.location.city, UNKNOWN_CITY);
    }

    #[tokio::test]
    async fn test_fresh_fix_race_prefers_first_success() {
        let resolver = resolver(Duration::from_millis(500))
            .with_source(Box::new(FailingSource))
            .with_source(Box::new(SlowFixSource {
                delay: Duration::from_millis(20),
                fix: fix_at(46.94, 7.44, chrono::Duration::zero()),
            }));

        let resolution = resolver.resolve(None, None).await;

        assert_eq!(resolution.source, source::FRESH_FIX);
        assert_eq!(resolution.location.latitude, 46.94);
        assert!(resolution.is_live());
    }

    #[tokio::test]
    async fn test_fix_timeout_falls_through_to_fallback() {
        let resolver = resolver(Duration::from_millis(50)).with_source(Box::new(SlowFixSource {
            delay: Duration::from_secs(60),
            fix: fix_at(46.94, 7.44, chrono::Duration::zero()),
        }));

        let resolution = resolver.resolve(None, None).await;

        assert!(resolution.is_fallback());
        assert!(!resolution.is_live());
        assert_eq!(resolution.location, LocationData::fallback());
    }

    #[tokio::test]
    async fn test_no_sources_resolves_to_fallback() {
        let resolver = resolver(Duration::from_millis(50));

        let resolution = resolver.resolve(None, None).await;

        assert_eq!(resolution.source, source::FALLBACK);
        assert_eq!(resolution.location.city, "London");
    }
}
