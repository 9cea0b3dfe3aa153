use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchFailure;

/// Placeholder text shown in an empty search box. Submitting it is a no-op.
pub const PLACEHOLDER_QUERY: &str = "Search City";

/// One raw timestamped reading from a provider's forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub condition_code: String,
    pub condition_text: String,
}

/// Current conditions for a location, in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub location_label: String,
    pub temperature: f64,
    pub condition_text: String,
    pub condition_code: String,
    /// Meters per second.
    pub wind_speed: f64,
    pub humidity_pct: u8,
    /// `None` when the sun does not rise or set that day (polar day/night).
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// The representative sample chosen to stand for one future calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastEntry {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon".
    pub day_label: String,
    pub temperature: f64,
    pub condition_code: String,
}

/// A slot in the recent-locations panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentLocationEntry {
    pub location_label: String,
    pub last_snapshot: Option<CurrentSnapshot>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl RecentLocationEntry {
    pub fn new(location_label: impl Into<String>) -> Self {
        Self {
            location_label: location_label.into(),
            last_snapshot: None,
            last_refreshed: None,
        }
    }
}

/// Combined result of one user query.
///
/// `forecast` is `Err` when current conditions were fetched but the forecast
/// series was not; the display layer can still show the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: CurrentSnapshot,
    pub forecast: Result<Vec<DailyForecastEntry>, FetchFailure>,
}

impl WeatherReport {
    pub fn is_partial(&self) -> bool {
        self.forecast.is_err()
    }
}

/// Normalize free-text search input into a location label.
///
/// Returns `None` for input that must not trigger a fetch: blank text or the
/// search box placeholder.
pub fn normalize_query(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PLACEHOLDER_QUERY) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Identity key for a location label: labels differing only in case or
/// surrounding whitespace name the same location.
pub fn location_key(label: &str) -> String {
    label.trim().to_lowercase()
}
