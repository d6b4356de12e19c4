//! Fixed-shape forecast grids
//!
//! The panel always shows a full grid: 6 rows of 8 hourly cells or
//! 2 rows of 8 daily cells. When the forecast runs out of data the
//! remaining cells are blank, the grid itself never shrinks.

use crate::icons::IconKind;
use crate::models::{DisplayMode, WeatherForecast};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COLUMNS: usize = 8;
pub const HOURLY_ROWS: usize = 6;
pub const DAILY_ROWS: usize = 2;

const CELL_WIDTH: usize = 10;

/// One cell of the forecast grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Day the cell belongs to, `%d/%m`
    pub date: String,
    /// "Now"/"Today", a clock time, or a weekday
    pub label: String,
    /// Formatted temperature, `12°` hourly or `15°/8°` daily
    pub temperature: String,
    /// Icon for the cell's weather code, `None` for blank cells
    pub icon: Option<IconKind>,
}

impl GridCell {
    /// Padding cell shown where the forecast has no data
    #[must_use]
    pub fn blank() -> Self {
        Self {
            date: String::new(),
            label: String::new(),
            temperature: String::new(),
            icon: None,
        }
    }

    /// True when this is a padding cell
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.icon.is_none() && self.label.is_empty()
    }
}

/// A complete grid of forecast cells, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastGrid {
    pub mode: DisplayMode,
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<GridCell>,
}

impl ForecastGrid {
    /// Build the hourly grid, starting at the current hour
    ///
    /// The forecast's hourly arrays begin at local midnight of the
    /// current day, so the cell for "now" sits at index `now.hour()`.
    #[must_use]
    pub fn hourly(forecast: &WeatherForecast, now: NaiveDateTime) -> Self {
        let start = now.hour() as usize;
        let midnight = now.date().and_time(NaiveTime::MIN);

        let cells = (0..HOURLY_ROWS * COLUMNS)
            .map(|i| {
                let index = start + i;
                let Some(&temperature) = forecast.hourly_temperatures.get(index) else {
                    return GridCell::blank();
                };
                let code = forecast
                    .hourly_weather_codes
                    .get(index)
                    .copied()
                    .unwrap_or(0);
                let cell_time = midnight + chrono::Duration::hours(index as i64);

                GridCell {
                    date: cell_time.format("%d/%m").to_string(),
                    label: if i == 0 {
                        "Now".to_string()
                    } else {
                        cell_time.format("%H:%M").to_string()
                    },
                    temperature: format!("{temperature}°"),
                    icon: Some(IconKind::from_weather_code(code)),
                }
            })
            .collect();

        Self {
            mode: DisplayMode::Hourly,
            rows: HOURLY_ROWS,
            columns: COLUMNS,
            cells,
        }
    }

    /// Build the daily grid, starting today
    #[must_use]
    pub fn daily(forecast: &WeatherForecast, today: NaiveDate) -> Self {
        let cells = (0..DAILY_ROWS * COLUMNS)
            .map(|i| {
                let Some(&max) = forecast.daily_max_temperatures.get(i) else {
                    return GridCell::blank();
                };
                let min = forecast
                    .daily_min_temperatures
                    .get(i)
                    .copied()
                    .unwrap_or(0);
                let code = forecast.daily_weather_codes.get(i).copied().unwrap_or(0);
                let day = today + chrono::Duration::days(i as i64);

                GridCell {
                    date: day.format("%d/%m").to_string(),
                    label: if i == 0 {
                        "Today".to_string()
                    } else {
                        day.format("%a").to_string()
                    },
                    temperature: format!("{max}°/{min}°"),
                    icon: Some(IconKind::from_weather_code(code)),
                }
            })
            .collect();

        Self {
            mode: DisplayMode::Daily,
            rows: DAILY_ROWS,
            columns: COLUMNS,
            cells,
        }
    }

    /// Cells of one row
    #[must_use]
    pub fn row(&self, row: usize) -> &[GridCell] {
        let start = row * self.columns;
        &self.cells[start..start + self.columns]
    }

    /// True when every cell is padding
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(GridCell::is_blank)
    }
}

impl fmt::Display for ForecastGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            if row > 0 {
                writeln!(f)?;
            }
            for cell in self.row(row) {
                write!(f, "{:<CELL_WIDTH$}", cell.label)?;
            }
            writeln!(f)?;
            for cell in self.row(row) {
                let body = match cell.icon {
                    Some(icon) => format!("{} {}", cell.temperature, icon.glyph()),
                    None => String::new(),
                };
                write!(f, "{body:<CELL_WIDTH$}")?;
            }
            writeln!(f)?;
            for cell in self.row(row) {
                write!(f, "{:<CELL_WIDTH$}", cell.date)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
