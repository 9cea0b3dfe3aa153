//! Plain-text rendering of pipeline output.

use std::fmt::{Display, Write};

use chrono::{DateTime, TimeZone, Utc};
use weather_core::{
    CurrentSnapshot, DailyForecastEntry, FetchFailure, RecentLocationEntry, WeatherReport,
};

pub fn report<Tz>(report: &WeatherReport, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = current(&report.current, tz);
    out.push('\n');
    match &report.forecast {
        Ok(days) => out.push_str(&forecast(days)),
        Err(failure) => {
            let _ = writeln!(
                out,
                "Forecast unavailable: {}",
                failure.user_message(&report.current.location_label)
            );
        }
    }
    out
}

pub fn current<Tz>(snapshot: &CurrentSnapshot, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "{}", snapshot.location_label);
    let _ = writeln!(out, "  {}  {}", celsius(snapshot.temperature), snapshot.condition_text);
    let _ = writeln!(
        out,
        "  Wind {:.1} m/s   Humidity {} %",
        snapshot.wind_speed, snapshot.humidity_pct
    );
    let _ = writeln!(
        out,
        "  Sunrise {}   Sunset {}",
        clock(snapshot.sunrise, tz),
        clock(snapshot.sunset, tz)
    );
    out
}

pub fn forecast(days: &[DailyForecastEntry]) -> String {
    if days.is_empty() {
        return "No forecast data available.\n".to_string();
    }

    let mut out = format!("{}-Day Forecast\n", days.len());
    for day in days {
        let _ = writeln!(
            out,
            "  {:<4}{:>6}  {}",
            day.day_label,
            celsius(day.temperature),
            day.condition_code
        );
    }
    out
}

pub fn recent<Tz>(entries: &[RecentLocationEntry], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::from("Recent\n");
    if entries.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }

    let width = entries.iter().map(|e| e.location_label.chars().count()).max().unwrap_or(0);
    for entry in entries {
        match (&entry.last_snapshot, entry.last_refreshed) {
            (Some(snap), Some(at)) => {
                let _ = writeln!(
                    out,
                    "  {:<width$}  {:>6}  {}  (updated {})",
                    entry.location_label,
                    celsius(snap.temperature),
                    snap.condition_text,
                    at.with_timezone(tz).format("%H:%M"),
                );
            }
            _ => {
                let _ = writeln!(out, "  {:<width$}  --", entry.location_label);
            }
        }
    }
    out
}

pub fn failure(label: &str, failure: &FetchFailure) -> String {
    failure.user_message(label)
}

fn celsius(temp: f64) -> String {
    format!("{:.0}°C", temp)
}

fn clock<Tz>(at: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match at {
        Some(at) => at.with_timezone(tz).format("%-I:%M %p").to_string(),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot() -> CurrentSnapshot {
        CurrentSnapshot {
            location_label: "Paris".into(),
            temperature: 14.4,
            condition_text: "light rain".into(),
            condition_code: "10d".into(),
            wind_speed: 4.63,
            humidity_pct: 71,
            sunrise: Some("2024-03-05T06:12:00Z".parse().unwrap()),
            sunset: Some("2024-03-05T17:48:00Z".parse().unwrap()),
        }
    }

    fn day(d: u32, label: &str, temp: f64) -> DailyForecastEntry {
        DailyForecastEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            day_label: label.into(),
            temperature: temp,
            condition_code: "01d".into(),
        }
    }

    #[test]
    fn current_shows_highlights_in_display_zone() {
        let out = current(&snapshot(), &Utc);

        assert!(out.starts_with("Paris\n"));
        assert!(out.contains("14°C  light rain"));
        assert!(out.contains("Wind 4.6 m/s"));
        assert!(out.contains("Humidity 71 %"));
        assert!(out.contains("Sunrise 6:12 AM"));
        assert!(out.contains("Sunset 5:48 PM"));
    }

    #[test]
    fn missing_sun_times_render_as_dashes() {
        let mut snap = snapshot();
        snap.sunrise = None;
        snap.sunset = None;

        let out = current(&snap, &Utc);
        assert!(out.contains("Sunrise --   Sunset --"));
    }

    #[test]
    fn forecast_lists_each_day() {
        let out = forecast(&[day(6, "Wed", 11.6), day(7, "Thu", 9.0)]);

        assert!(out.starts_with("2-Day Forecast\n"));
        assert!(out.contains("Wed"));
        assert!(out.contains("12°C"));
        assert!(out.contains("Thu"));
    }

    #[test]
    fn partial_report_explains_missing_forecast() {
        let report = WeatherReport {
            current: snapshot(),
            forecast: Err(FetchFailure::Unavailable("timeout".into())),
        };

        let out = super::report(&report, &Utc);
        assert!(out.contains("Paris"));
        assert!(out.contains("Forecast unavailable"));
        assert!(out.contains("temporarily unavailable"));
    }

    #[test]
    fn recent_marks_entries_without_data() {
        let mut fresh = RecentLocationEntry::new("Paris");
        fresh.last_snapshot = Some(snapshot());
        fresh.last_refreshed = Some("2024-03-05T09:30:00Z".parse().unwrap());
        let pending = RecentLocationEntry::new("Tokyo");

        let out = recent(&[fresh, pending], &Utc);
        assert!(out.contains("Paris"));
        assert!(out.contains("(updated 09:30)"));
        assert!(out.contains("Tokyo  --"));
    }
}
