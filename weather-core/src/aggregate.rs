//! Reduce a multi-day sample series to one representative entry per day.

use chrono::{NaiveDate, NaiveTime, TimeZone, Timelike};

use crate::model::{DailyForecastEntry, SampleRecord};

pub const DEFAULT_FORECAST_DAYS: usize = 5;

const NOON_SECS: u32 = 12 * 3600;

/// Build the daily forecast for the days after `reference_date`.
///
/// Samples are grouped by their calendar date in `tz`; the reference day is
/// never included. Each day is represented by the sample at exactly noon,
/// else the first one after noon, else the earliest one. At most `max_days`
/// entries are returned, in ascending date order.
pub fn aggregate<Tz: TimeZone>(
    samples: &[SampleRecord],
    reference_date: NaiveDate,
    tz: &Tz,
    max_days: usize,
) -> Vec<DailyForecastEntry> {
    let mut ordered: Vec<&SampleRecord> = samples.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);

    let mut days: Vec<DayGroup<'_>> = Vec::new();
    for sample in ordered {
        let local = sample.timestamp.with_timezone(tz).naive_local();
        let date = local.date();
        if date == reference_date {
            continue;
        }

        // Sorted input keeps each date's samples contiguous.
        match days.last_mut().filter(|d| d.date == date) {
            Some(group) => group.push(local.time(), sample),
            None => {
                let mut group = DayGroup::new(date);
                group.push(local.time(), sample);
                days.push(group);
            }
        }
    }

    days.into_iter()
        .filter_map(|d| d.into_entry())
        .take(max_days)
        .collect()
}

struct DayGroup<'a> {
    date: NaiveDate,
    samples: Vec<(NaiveTime, &'a SampleRecord)>,
}

impl<'a> DayGroup<'a> {
    fn new(date: NaiveDate) -> Self {
        Self { date, samples: Vec::new() }
    }

    fn push(&mut self, time: NaiveTime, sample: &'a SampleRecord) {
        self.samples.push((time, sample));
    }

    fn representative(&self) -> Option<&'a SampleRecord> {
        let at_noon = self
            .samples
            .iter()
            .find(|(t, _)| t.num_seconds_from_midnight() == NOON_SECS && t.nanosecond() == 0);
        let after_noon = || {
            self.samples
                .iter()
                .find(|(t, _)| t.num_seconds_from_midnight() >= NOON_SECS)
        };

        at_noon
            .or_else(after_noon)
            .or_else(|| self.samples.first())
            .map(|(_, s)| *s)
    }

    fn into_entry(self) -> Option<DailyForecastEntry> {
        let sample = self.representative()?;
        Some(DailyForecastEntry {
            date: self.date,
            day_label: self.date.format("%a").to_string(),
            temperature: sample.temperature,
            condition_code: sample.condition_code.clone(),
        })
    }
}
