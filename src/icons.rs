//! WMO weather code to icon mapping
//!
//! See: <https://open-meteo.com/en/docs> for the WMO code reference.

use serde::{Deserialize, Serialize};

/// Icon shown in a forecast cell, derived from a WMO weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconKind {
    /// Clear sky (WMO 0)
    Sunny,
    /// Mainly clear through overcast (WMO 1-3)
    PartlyCloudy,
    /// Fog and depositing rime fog (WMO 45, 48)
    Fog,
    /// Drizzle (WMO 51, 53, 55)
    Drizzle,
    /// Freezing drizzle and freezing rain (WMO 56, 57, 66, 67)
    FreezingRain,
    /// Slight and moderate rain (WMO 61, 63)
    Rain,
    /// Heavy rain and rain showers (WMO 65, 80-82)
    HeavyRain,
    /// Slight and moderate snow (WMO 71, 73)
    Snow,
    /// Heavy snow and snow showers (WMO 75, 85, 86)
    HeavySnow,
    /// Snow grains and ice pellets (WMO 77)
    Hail,
    /// Thunderstorm, with or without hail (WMO 95, 96, 99)
    Thunderstorm,
    /// Any code outside the published WMO table
    Unknown,
}

/// Every icon kind, in legend order
pub const ALL: [IconKind; 12] = [
    IconKind::Sunny,
    IconKind::PartlyCloudy,
    IconKind::Fog,
    IconKind::Drizzle,
    IconKind::FreezingRain,
    IconKind::Rain,
    IconKind::HeavyRain,
    IconKind::Snow,
    IconKind::HeavySnow,
    IconKind::Hail,
    IconKind::Thunderstorm,
    IconKind::Unknown,
];

impl IconKind {
    /// Map a WMO weather code to its icon
    ///
    /// Unlisted codes map to [`IconKind::Unknown`] rather than failing,
    /// so a surprising upstream code never blanks the panel.
    #[must_use]
    pub const fn from_weather_code(code: i32) -> Self {
        match code {
            0 => Self::Sunny,
            1..=3 => Self::PartlyCloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 | 66 | 67 => Self::FreezingRain,
            61 | 63 => Self::Rain,
            65 | 80..=82 => Self::HeavyRain,
            71 | 73 => Self::Snow,
            75 | 85 | 86 => Self::HeavySnow,
            77 => Self::Hail,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Human-readable name of the condition
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::FreezingRain => "Freezing rain",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy rain",
            Self::Snow => "Snow",
            Self::HeavySnow => "Heavy snow",
            Self::Hail => "Hail",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    /// Single glyph used in grid cells
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Sunny => "☀️",
            Self::PartlyCloudy => "⛅",
            Self::Fog => "🌫️",
            Self::Drizzle => "🌦️",
            Self::FreezingRain => "🌨️",
            Self::Rain | Self::HeavyRain => "🌧️",
            Self::Snow | Self::HeavySnow => "❄️",
            Self::Hail => "🧊",
            Self::Thunderstorm => "⛈️",
            Self::Unknown => "❓",
        }
    }
}

impl std::fmt::Display for IconKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One line per icon kind, glyph then name
#[must_use]
pub fn legend() -> String {
    let mut out = String::new();
    for kind in ALL {
        out.push_str(&format!("{}  {}\n", kind.glyph(), kind.description()));
    }
    out
}
