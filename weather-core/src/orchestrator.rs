//! Query coordination between the event loop and the weather source.
//!
//! The orchestrator is owned by a single event loop. Network fetches run on
//! spawned tasks and report back over a channel; only the event loop, through
//! [`RefreshOrchestrator::next_update`], mutates the recent-locations cache or
//! decides what becomes visible.
//!
//! Every fetch carries a generation number. Only the newest generation issued
//! for a location is applied; anything older is dropped on arrival.
//!
//! Bookkeeping is kept only for the primary location, cached locations and
//! locations with a user query in flight. Everything else is forgotten and
//! reads as [`QueryState::Idle`] again.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};

use chrono::{NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    aggregate::aggregate,
    cache::RecentLocationCache,
    config::RefreshConfig,
    error::FetchFailure,
    model::{
        CurrentSnapshot, RecentLocationEntry, SampleRecord, WeatherReport, location_key,
        normalize_query,
    },
    provider::WeatherSource,
};

/// Lifecycle of the latest user query for one location.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    Fetching,
    Ready,
    Failed(FetchFailure),
}

/// What [`RefreshOrchestrator::submit_query`] did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank or placeholder input; nothing fetched.
    Ignored,
    Started,
    /// A fetch for the same location is already in flight and will serve
    /// this request too.
    Coalesced,
}

/// A change the display layer should apply.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Fresh result for the location currently selected as primary.
    Primary {
        label: String,
        report: WeatherReport,
        recent: Vec<RecentLocationEntry>,
    },
    /// The primary query produced no data.
    Failed { label: String, failure: FetchFailure },
    /// Only the recent-locations panel changed.
    Recent(Vec<RecentLocationEntry>),
}

#[derive(Debug)]
struct Completion {
    label: String,
    generation: u64,
    outcome: FetchOutcome,
}

#[derive(Debug)]
enum FetchOutcome {
    Query {
        current: Result<CurrentSnapshot, FetchFailure>,
        samples: Result<Vec<SampleRecord>, FetchFailure>,
    },
    Background(Result<CurrentSnapshot, FetchFailure>),
}

pub struct RefreshOrchestrator<Tz: TimeZone> {
    source: Arc<dyn WeatherSource>,
    cache: RecentLocationCache,
    tz: Tz,
    forecast_days: usize,
    fetch_timeout: Duration,
    primary: Option<String>,
    states: HashMap<String, QueryState>,
    latest_generation: HashMap<String, u64>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl<Tz: TimeZone> RefreshOrchestrator<Tz> {
    pub fn new(source: Arc<dyn WeatherSource>, settings: &RefreshConfig, tz: Tz) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            cache: RecentLocationCache::new(settings.recent_capacity),
            tz,
            forecast_days: settings.forecast_days,
            fetch_timeout: settings.fetch_timeout(),
            primary: None,
            states: HashMap::new(),
            latest_generation: HashMap::new(),
            next_generation: 0,
            tx,
            rx,
        }
    }

    /// Location currently selected for the main view.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn state(&self, label: &str) -> QueryState {
        self.states.get(&location_key(label)).cloned().unwrap_or_default()
    }

    pub fn recent(&self) -> Vec<RecentLocationEntry> {
        self.cache.snapshot_all()
    }

    /// Start a query for `raw` and make it the primary location.
    ///
    /// Never blocks: the fetch runs on a spawned task and its result arrives
    /// through [`next_update`](Self::next_update). Must be called from within
    /// a tokio runtime.
    pub fn submit_query(&mut self, raw: &str) -> SubmitOutcome {
        let Some(label) = normalize_query(raw) else {
            return SubmitOutcome::Ignored;
        };
        let key = location_key(&label);
        self.primary = Some(label.clone());

        if self.states.get(&key) == Some(&QueryState::Fetching) {
            debug!(%label, "query coalesced with in-flight fetch");
            return SubmitOutcome::Coalesced;
        }

        let generation = self.issue_generation(&key);
        self.states.insert(key, QueryState::Fetching);
        self.forget_unreferenced();
        info!(%label, generation, "fetching weather");

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let limit = self.fetch_timeout;
        tokio::spawn(async move {
            let (current, samples) = tokio::join!(
                within(limit, source.fetch_current(&label)),
                within(limit, source.fetch_forecast_samples(&label)),
            );
            // A closed channel means the event loop is gone.
            let _ = tx.send(Completion {
                label,
                generation,
                outcome: FetchOutcome::Query { current, samples },
            });
        });

        SubmitOutcome::Started
    }

    /// Wait for the next fetch completion that changes what is displayed.
    ///
    /// Completions that change nothing (superseded results, background
    /// failures) are consumed silently. Stays pending while nothing is in
    /// flight.
    pub async fn next_update(&mut self) -> Option<DisplayUpdate> {
        loop {
            let completion = self.rx.recv().await?;
            let update = self.apply(completion);
            self.forget_unreferenced();
            if update.is_some() {
                return update;
            }
        }
    }

    fn apply(&mut self, completion: Completion) -> Option<DisplayUpdate> {
        let Completion { label, generation, outcome } = completion;
        let key = location_key(&label);

        if self.latest_generation.get(&key) != Some(&generation) {
            debug!(%label, generation, "dropping superseded result");
            return None;
        }

        match outcome {
            FetchOutcome::Query { current, samples } => {
                self.apply_query(label, key, current, samples)
            }
            FetchOutcome::Background(result) => self.apply_background(label, result),
        }
    }

    fn apply_query(
        &mut self,
        label: String,
        key: String,
        current: Result<CurrentSnapshot, FetchFailure>,
        samples: Result<Vec<SampleRecord>, FetchFailure>,
    ) -> Option<DisplayUpdate> {
        let is_primary = self.is_primary(&key);

        let current = match current {
            Ok(current) => current,
            Err(failure) => {
                self.states.insert(key, QueryState::Failed(failure.clone()));
                if !is_primary {
                    info!(%label, %failure, "query failed after selection moved on");
                    return None;
                }
                warn!(%label, %failure, "weather query failed");
                return Some(DisplayUpdate::Failed { label, failure });
            }
        };

        let forecast = samples.map(|samples| {
            aggregate(&samples, self.reference_date(), &self.tz, self.forecast_days)
        });
        if let Err(failure) = &forecast {
            warn!(%label, %failure, "forecast unavailable; showing current conditions only");
        }
        self.states.insert(key.clone(), QueryState::Ready);

        if !is_primary {
            // Selection moved on while this was in flight: keep the panel
            // fresh if the location is listed, but leave the main view alone.
            debug!(%label, "result arrived after primary changed");
            return self
                .cache
                .update_snapshot(&label, current)
                .then(|| DisplayUpdate::Recent(self.cache.snapshot_all()));
        }

        if let Some(evicted) = self.cache.touch(&label) {
            debug!(%evicted, "evicted from recent locations");
        }
        self.cache.update_snapshot(&label, current.clone());
        info!(%label, "weather ready");

        self.refresh_others(&key);

        Some(DisplayUpdate::Primary {
            label,
            report: WeatherReport { current, forecast },
            recent: self.cache.snapshot_all(),
        })
    }

    fn apply_background(
        &mut self,
        label: String,
        result: Result<CurrentSnapshot, FetchFailure>,
    ) -> Option<DisplayUpdate> {
        match result {
            Ok(snapshot) => {
                if self.cache.update_snapshot(&label, snapshot) {
                    Some(DisplayUpdate::Recent(self.cache.snapshot_all()))
                } else {
                    debug!(%label, "background result for evicted location");
                    None
                }
            }
            Err(failure) => {
                debug!(%label, %failure, "background refresh failed; keeping last snapshot");
                None
            }
        }
    }

    /// Fire-and-forget refresh of every cached location except `primary_key`.
    fn refresh_others(&mut self, primary_key: &str) {
        for label in self.cache.labels() {
            let key = location_key(&label);
            if key == primary_key || self.states.get(&key) == Some(&QueryState::Fetching) {
                continue;
            }

            let generation = self.issue_generation(&key);
            debug!(%label, generation, "background refresh");

            let source = Arc::clone(&self.source);
            let tx = self.tx.clone();
            let limit = self.fetch_timeout;
            tokio::spawn(async move {
                let result = within(limit, source.fetch_current(&label)).await;
                let _ = tx.send(Completion {
                    label,
                    generation,
                    outcome: FetchOutcome::Background(result),
                });
            });
        }
    }

    /// Drop state and generations for locations that are neither primary,
    /// cached, nor awaiting a user query. A result that arrives for a
    /// forgotten location has no generation to match and is discarded.
    fn forget_unreferenced(&mut self) {
        let primary = self.primary.as_deref().map(location_key);
        let cached: HashSet<String> = self.cache.labels().iter().map(|l| location_key(l)).collect();

        self.states.retain(|key, state| {
            *state == QueryState::Fetching
                || primary.as_deref() == Some(key.as_str())
                || cached.contains(key)
        });
        let states = &self.states;
        self.latest_generation
            .retain(|key, _| states.contains_key(key) || cached.contains(key));
    }

    fn issue_generation(&mut self, key: &str) -> u64 {
        self.next_generation += 1;
        self.latest_generation.insert(key.to_string(), self.next_generation);
        self.next_generation
    }

    fn is_primary(&self, key: &str) -> bool {
        self.primary.as_deref().map(location_key).as_deref() == Some(key)
    }

    fn reference_date(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

async fn within<T>(
    limit: Duration,
    fetch: impl Future<Output = Result<T, FetchFailure>>,
) -> Result<T, FetchFailure> {
    tokio::time::timeout(limit, fetch)
        .await
        .unwrap_or_else(|_| Err(FetchFailure::Unavailable(format!("timed out after {limit:?}"))))
}
