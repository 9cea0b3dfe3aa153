use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    error::FetchFailure,
    model::{CurrentSnapshot, SampleRecord},
    provider::{http_client, truncate_body},
};

use super::WeatherSource;

const OPENWEATHER_BASE: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, OPENWEATHER_BASE, timeout)
    }

    /// Point the client at a different host, e.g. a mock server.
    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &str,
    ) -> Result<T, FetchFailure> {
        let url = format!("{}/data/2.5/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(FetchFailure::from_reqwest)?;

        let status = res.status();
        let body = res.text().await.map_err(FetchFailure::from_reqwest)?;

        if status == StatusCode::NOT_FOUND {
            return Err(FetchFailure::NotFound(location.to_string()));
        }
        if !status.is_success() {
            return Err(FetchFailure::Unavailable(format!(
                "OpenWeather {endpoint} request failed with status {status}: {}",
                truncate_body(&body),
            )));
        }
        if body.trim().is_empty() {
            return Err(FetchFailure::Empty(format!("OpenWeather {endpoint} returned an empty body")));
        }

        serde_json::from_str(&body).map_err(|e| {
            FetchFailure::Malformed(format!("Failed to parse OpenWeather {endpoint} JSON: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherSource for OpenWeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_current(&self, location: &str) -> Result<CurrentSnapshot, FetchFailure> {
        let parsed: OwCurrentResponse = self.get_json("weather", location).await?;

        let weather = parsed.weather.first().ok_or_else(|| {
            FetchFailure::Empty("OpenWeather current response had no weather conditions".into())
        })?;

        let location_label = if parsed.name.trim().is_empty() {
            location.to_string()
        } else {
            parsed.name.clone()
        };

        Ok(CurrentSnapshot {
            location_label,
            temperature: parsed.main.temp,
            condition_text: weather.description.clone(),
            condition_code: weather.icon.clone(),
            wind_speed: parsed.wind.speed,
            humidity_pct: parsed.main.humidity,
            sunrise: sun_event(parsed.sys.sunrise)?,
            sunset: sun_event(parsed.sys.sunset)?,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_forecast_samples(
        &self,
        location: &str,
    ) -> Result<Vec<SampleRecord>, FetchFailure> {
        let parsed: OwForecastResponse = self.get_json("forecast", location).await?;
        let total = parsed.list.len();

        let mut samples = Vec::with_capacity(total);
        for entry in parsed.list {
            let Some(weather) = entry.weather.into_iter().next() else {
                continue;
            };
            samples.push(SampleRecord {
                timestamp: unix_to_utc(entry.dt)?,
                temperature: entry.main.temp,
                condition_code: weather.icon,
                condition_text: weather.description,
            });
        }

        if samples.is_empty() {
            return Err(FetchFailure::Empty("OpenWeather forecast contained no samples".into()));
        }

        debug!(total, usable = samples.len(), "decoded forecast samples");
        Ok(samples)
    }
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, FetchFailure> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| FetchFailure::Malformed(format!("timestamp {ts} is out of range")))
}

/// OpenWeather sends 0 (or omits the field) when there is no sunrise/sunset.
fn sun_event(ts: Option<i64>) -> Result<Option<DateTime<Utc>>, FetchFailure> {
    ts.filter(|ts| *ts > 0).map(unix_to_utc).transpose()
}
