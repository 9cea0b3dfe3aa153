use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    aggregate::DEFAULT_FORECAST_DAYS,
    error::FetchFailure,
    model::{CurrentSnapshot, SampleRecord},
    provider::{http_client, truncate_body},
};

use super::WeatherSource;

const WEATHERAPI_BASE: &str = "https://api.weatherapi.com";

/// WeatherAPI.com error code for "No matching location found."
const NO_LOCATION_FOUND: i64 = 1006;

/// Longest range `/forecast.json` serves.
const MAX_REQUEST_DAYS: usize = 14;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
    base_url: String,
    forecast_days: usize,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, WEATHERAPI_BASE, timeout)
    }

    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            forecast_days: DEFAULT_FORECAST_DAYS,
        })
    }

    /// Number of future days the sample request should cover.
    pub fn with_forecast_days(mut self, days: usize) -> Self {
        self.forecast_days = days;
        self
    }

    /// Today is part of the response but dropped by aggregation, so ask for
    /// one extra day.
    fn sample_request_days(&self) -> usize {
        (self.forecast_days + 1).min(MAX_REQUEST_DAYS)
    }

    async fn fetch_forecast(&self, location: &str, days: usize) -> Result<WaForecastResponse, FetchFailure> {
        let url = format!("{}/v1/forecast.json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("days", &days.to_string()),
                ("aqi", "no"),
                ("alerts", "no"),
            ])
            .send()
            .await
            .map_err(FetchFailure::from_reqwest)?;

        let status = res.status();
        let body = res.text().await.map_err(FetchFailure::from_reqwest)?;

        if !status.is_success() {
            return Err(classify_error(status, &body, location));
        }
        if body.trim().is_empty() {
            return Err(FetchFailure::Empty("WeatherAPI returned an empty body".into()));
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchFailure::Malformed(format!("Failed to parse WeatherAPI forecast JSON: {e}")))
    }
}

fn classify_error(status: StatusCode, body: &str, location: &str) -> FetchFailure {
    let api_code = serde_json::from_str::<WaErrorResponse>(body)
        .ok()
        .map(|e| e.error.code);

    if status == StatusCode::NOT_FOUND || api_code == Some(NO_LOCATION_FOUND) {
        return FetchFailure::NotFound(location.to_string());
    }

    FetchFailure::Unavailable(format!(
        "WeatherAPI request failed with status {status}: {}",
        truncate_body(body),
    ))
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    code: i64,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    tz_id: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    code: i64,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    humidity: u8,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaAstro {
    sunrise: String,
    sunset: String,
}

#[derive(Debug, Deserialize)]
struct WaForecastHour {
    time_epoch: i64,
    temp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    astro: WaAstro,
    #[serde(default)]
    hour: Vec<WaForecastHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    #[serde(default)]
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    current: WaCurrent,
    forecast: WaForecast,
}

#[async_trait]
impl WeatherSource for WeatherApiProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_current(&self, location: &str) -> Result<CurrentSnapshot, FetchFailure> {
        let parsed = self.fetch_forecast(location, 1).await?;

        let today = parsed.forecast.forecastday.first().ok_or_else(|| {
            FetchFailure::Empty("WeatherAPI response contained no forecastday data".into())
        })?;

        let tz: chrono_tz::Tz = parsed.location.tz_id.parse().map_err(|_| {
            FetchFailure::Malformed(format!("unknown time zone '{}'", parsed.location.tz_id))
        })?;
        let date = NaiveDate::parse_from_str(&today.date, "%Y-%m-%d")
            .map_err(|e| FetchFailure::Malformed(format!("bad forecast date '{}': {e}", today.date)))?;

        Ok(CurrentSnapshot {
            location_label: parsed.location.name.clone(),
            temperature: parsed.current.temp_c,
            condition_text: parsed.current.condition.text.clone(),
            condition_code: parsed.current.condition.code.to_string(),
            wind_speed: kph_to_mps(parsed.current.wind_kph),
            humidity_pct: parsed.current.humidity,
            sunrise: astro_event(&tz, date, &today.astro.sunrise)?,
            sunset: astro_event(&tz, date, &today.astro.sunset)?,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_forecast_samples(
        &self,
        location: &str,
    ) -> Result<Vec<SampleRecord>, FetchFailure> {
        let parsed = self.fetch_forecast(location, self.sample_request_days()).await?;

        let mut samples = Vec::new();
        for day in parsed.forecast.forecastday {
            for hour in day.hour {
                let timestamp = DateTime::from_timestamp(hour.time_epoch, 0).ok_or_else(|| {
                    FetchFailure::Malformed(format!("timestamp {} is out of range", hour.time_epoch))
                })?;
                samples.push(SampleRecord {
                    timestamp,
                    temperature: hour.temp_c,
                    condition_code: hour.condition.code.to_string(),
                    condition_text: hour.condition.text,
                });
            }
        }

        if samples.is_empty() {
            return Err(FetchFailure::Empty("WeatherAPI response contained no hourly data".into()));
        }

        debug!(count = samples.len(), "decoded hourly samples");
        Ok(samples)
    }
}

fn kph_to_mps(kph: f64) -> f64 {
    kph / 3.6
}

/// Astro times come back as "No sunrise" / "No sunset" during polar day and
/// night.
fn astro_event(
    tz: &chrono_tz::Tz,
    date: NaiveDate,
    clock: &str,
) -> Result<Option<DateTime<Utc>>, FetchFailure> {
    if clock.trim().starts_with("No ") {
        return Ok(None);
    }
    local_clock_to_utc(tz, date, clock).map(Some)
}

/// Resolve a provider clock string such as "06:45 AM" on `date` in `tz`.
fn local_clock_to_utc(
    tz: &chrono_tz::Tz,
    date: NaiveDate,
    clock: &str,
) -> Result<DateTime<Utc>, FetchFailure> {
    let time = NaiveTime::parse_from_str(clock.trim(), "%I:%M %p")
        .map_err(|e| FetchFailure::Malformed(format!("bad clock time '{clock}': {e}")))?;

    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| FetchFailure::Malformed(format!("'{clock}' does not exist on {date} in {tz}")))
}
