//! `WeatherGrid` - Glanceable hourly and daily weather forecast grid
//! for widget hosts
//!
//! This library resolves where the user is, fetches and caches the
//! forecast, and renders it as a fixed-shape grid a widget host can
//! draw directly.

pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod geocode;
pub mod grid;
pub mod icons;
pub mod location_resolver;
pub mod models;
pub mod prefs;
pub mod widget;

// Re-export core types for public API
pub use cache::{CachedLocation, ForecastCache, LocationCache};
pub use config::WeatherGridConfig;
pub use error::WeatherGridError;
pub use forecast::ForecastClient;
pub use geocode::{GeocodeClient, IpLocateClient, UNKNOWN_CITY};
pub use grid::{ForecastGrid, GridCell};
pub use icons::IconKind;
pub use location_resolver::{FixSource, LocationResolver, Resolution, StaticFixSource};
pub use models::{DisplayMode, Fix, LocationData, SearchResult, WeatherForecast};
pub use prefs::{PrefGroup, PrefStore};
pub use widget::{PanelSnapshot, PanelService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent string sent to every upstream service
pub const USER_AGENT: &str = concat!("weathergrid/", env!("CARGO_PKG_VERSION"));
