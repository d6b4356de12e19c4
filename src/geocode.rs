//! Geocoding and IP lookup clients
//!
//! Three small services back the location flow: reverse geocoding turns
//! coordinates into a city name, forward search turns free text into
//! candidate places, and IP geolocation estimates a position when no
//! coordinate fix is available.

use crate::WeatherGridError;
use crate::config::GeocodeConfig;
use crate::models::{LocationData, SearchResult};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Shown when no usable city name is available
pub const UNKNOWN_CITY: &str = "Unknown Location";

/// Place kinds the search keeps, everything else is noise for a weather panel
const CITY_LIKE_KINDS: [&str; 6] = [
    "city",
    "town",
    "village",
    "municipality",
    "hamlet",
    "administrative",
];

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    locality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPlace {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    osm_type: String,
    #[serde(default)]
    address: Option<SearchAddress>,
}

#[derive(Debug, Deserialize)]
struct SearchAddress {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    #[serde(default)]
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Client for the reverse-geocoding and place-search services
pub struct GeocodeClient {
    client: Client,
    config: GeocodeConfig,
}

impl GeocodeClient {
    /// Create a new geocoding client
    pub fn new(config: GeocodeConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Resolve a city name for the given coordinates
    ///
    /// Falls back to the locality, then to [`UNKNOWN_CITY`] when the
    /// service knows nothing about the place.
    #[instrument(skip(self))]
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String> {
        debug!("Reverse geocoding {:.4}, {:.4}", latitude, longitude);

        let url = format!(
            "{}?latitude={}&longitude={}&localityLanguage=en",
            self.config.reverse_url, latitude, longitude
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Reverse geocoding request failed: {}", e);
            WeatherGridError::api("Failed to reach the reverse geocoding service")
        })?;
        if !response.status().is_success() {
            return Err(WeatherGridError::api(format!(
                "Reverse geocoding returned status {}",
                response.status()
            ))
            .into());
        }

        let raw: ReverseResponse = response.json().await.map_err(|e| {
            error!("Failed to parse reverse geocoding response: {}", e);
            WeatherGridError::api("Invalid reverse geocoding response")
        })?;

        let city = [raw.city, raw.locality]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());

        debug!(%city, "Reverse geocoding result");
        Ok(city)
    }

    /// Search for city-like places matching the query
    ///
    /// Streets and individual buildings are filtered out, and hits with
    /// unparseable coordinates are skipped.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Err(WeatherGridError::validation(
                "Search query must be at least 2 characters",
            )
            .into());
        }

        info!("Searching places for '{}'", query);
        let start_time = Instant::now();

        let url = format!(
            "{}?q={}&format=json&addressdetails=1&limit={}",
            self.config.search_url,
            urlencoding::encode(query),
            self.config.max_results
        );

        debug!("Search request URL: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Place search request failed: {}", e);
            WeatherGridError::api("Failed to reach the place search service")
        })?;
        if !response.status().is_success() {
            return Err(WeatherGridError::api(format!(
                "Place search returned status {}",
                response.status()
            ))
            .into());
        }

        let places: Vec<SearchPlace> = response.json().await.map_err(|e| {
            error!("Failed to parse place search response: {}", e);
            WeatherGridError::api("Invalid place search response")
        })?;

        let results: Vec<SearchResult> = places
            .into_iter()
            .filter(|place| is_city_like(&place.kind, &place.osm_type))
            .filter_map(|place| {
                let latitude = place.lat.parse().ok()?;
                let longitude = place.lon.parse().ok()?;
                let country = place
                    .address
                    .and_then(|address| address.country)
                    .unwrap_or_default();
                Some(SearchResult {
                    display_name: place.display_name,
                    latitude,
                    longitude,
                    country,
                })
            })
            .collect();

        if results.is_empty() {
            warn!("No city-like results for '{}'", query);
        } else {
            info!(
                "Found {} places for '{}' in {:.3}s",
                results.len(),
                query,
                start_time.elapsed().as_secs_f64()
            );
        }

        Ok(results)
    }
}

/// Keep settlements, drop streets and houses
fn is_city_like(kind: &str, osm_type: &str) -> bool {
    CITY_LIKE_KINDS.contains(&kind) && osm_type != "way"
}

/// Client for the IP geolocation service
pub struct IpLocateClient {
    client: Client,
    config: GeocodeConfig,
}

impl IpLocateClient {
    /// Create a new IP geolocation client
    pub fn new(config: GeocodeConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Estimate a location from the caller's public IP
    #[instrument(skip(self))]
    pub async fn locate(&self) -> Result<LocationData> {
        debug!("Looking up location by IP");

        let response = self
            .client
            .get(&self.config.ip_url)
            .send()
            .await
            .map_err(|e| {
                error!("IP geolocation request failed: {}", e);
                WeatherGridError::api("Failed to reach the IP geolocation service")
            })?;
        if !response.status().is_success() {
            return Err(WeatherGridError::api(format!(
                "IP geolocation returned status {}",
                response.status()
            ))
            .into());
        }

        let raw: IpResponse = response.json().await.map_err(|e| {
            error!("Failed to parse IP geolocation response: {}", e);
            WeatherGridError::api("Invalid IP geolocation response")
        })?;

        let (Some(latitude), Some(longitude)) = (raw.latitude, raw.longitude) else {
            return Err(WeatherGridError::api(
                "IP geolocation response did not include coordinates",
            )
            .into());
        };

        let city = raw
            .city
            .filter(|city| !city.trim().is_empty() && city.as_str() != "Not found")
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());

        info!(%city, "IP geolocation result");
        Ok(LocationData::new(latitude, longitude, city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("city", "node", true)]
    #[case("town", "relation", true)]
    #[case("village", "node", true)]
    #[case("municipality", "relation", true)]
    #[case("hamlet", "node", true)]
    #[case("administrative", "relation", true)]
    #[case("city", "way", false)]
    #[case("road", "node", false)]
    #[case("house", "way", false)]
    #[case("", "node", false)]
    fn test_city_like_filter(#[case] kind: &str, #[case] osm_type: &str, #[case] expected: bool) {
        assert_eq!(is_city_like(kind, osm_type), expected);
    }

    #[tokio::test]
    async fn test_search_rejects_short_queries() {
        let client = GeocodeClient::new(GeocodeConfig::default()).unwrap();

        for query in ["", "a", " a ", "\t"] {
            let err = client.search(query).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<WeatherGridError>(),
                Some(WeatherGridError::Validation { .. })
            ));
        }
    }

    #[test]
    fn test_search_place_parsing() {
        let json = r#"[{
            "display_name": "Bern, Switzerland",
            "lat": "46.9481",
            "lon": "7.4474",
            "type": "city",
            "osm_type": "relation",
            "address": {"country": "Switzerland"}
        }]"#;

        let places: Vec<SearchPlace> = serde_json::from_str(json).unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].kind, "city");
        assert_eq!(places[0].osm_type, "relation");
        assert_eq!(
            places[0].address.as_ref().unwrap().country.as_deref(),
            Some("Switzerland")
        );
    }

    #[test]
    fn test_ip_response_with_unknown_fields() {
        let json = r#"{"city": null, "latitude": 51.0, "longitude": -0.1}"#;
        let raw: IpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(raw.city, None);
        assert_eq!(raw.latitude, Some(51.0));

        // The service reports unknown coordinates as strings, which must
        // not silently parse into numbers
        let json = r#"{"city": "Not found", "latitude": "Not found", "longitude": "Not found"}"#;
        assert!(serde_json::from_str::<IpResponse>(json).is_err());
    }
}
