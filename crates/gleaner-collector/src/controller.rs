use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gleaner_core::{config::CollectorConfig, CollectionParams, StopReason};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::SourceError,
    item::{Item, Position},
    source::ItemSource,
};

/// Pacing and stop-policy knobs for one controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Consecutive iterations without a new accepted item before `NoNewItems`.
    pub empty_fetch_limit: u32,
    /// Iterations are never started closer together than this.
    pub min_interval: Duration,
    /// Probe the block signal before the first fetch and every N iterations.
    /// Zero disables probing.
    pub block_check_every: u32,
    /// Deadline for each individual source call.
    pub call_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

impl From<&CollectorConfig> for ControllerConfig {
    fn from(cfg: &CollectorConfig) -> Self {
        Self {
            empty_fetch_limit: cfg.empty_fetch_limit.max(1),
            min_interval: Duration::from_millis(cfg.min_interval_ms),
            block_check_every: cfg.block_check_every,
            call_timeout: Duration::from_secs(cfg.call_timeout_secs),
        }
    }
}

/// Everything one session produced.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    /// Accepted items in acceptance order. Ids are unique.
    pub items: Vec<Item>,
    pub stop_reason: StopReason,
    /// Non-fatal problems observed along the way.
    pub errors: Vec<String>,
    /// Set iff `stop_reason` is `Error`.
    pub fatal_error: Option<String>,
    pub iterations: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CollectionResult {
    pub fn item_count(&self) -> u32 {
        u32::try_from(self.items.len()).unwrap_or(u32::MAX)
    }

    pub fn has_soft_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-session mutable state. Never shared across sessions.
struct Session {
    seen: HashSet<String>,
    items: Vec<Item>,
    stop: Option<StopReason>,
    iterations: u32,
    consecutive_empty: u32,
    errors: Vec<String>,
    fatal: Option<String>,
}

impl Session {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            stop: None,
            iterations: 0,
            consecutive_empty: 0,
            errors: Vec::new(),
            fatal: None,
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.stop.get_or_insert(reason);
    }

    fn fatal(&mut self, err: SourceError) {
        warn!(error = %err, "collection session aborted");
        self.fatal = Some(err.to_string());
        self.stop(StopReason::Error);
    }

    fn soft(&mut self, err: SourceError) {
        warn!(error = %err, "recoverable source error");
        self.errors.push(err.to_string());
    }

    fn at_capacity(&self, params: &CollectionParams) -> bool {
        params
            .max_items
            .is_some_and(|max| self.items.len() >= max as usize)
    }

    /// Run one batch through dedup, filters and the age window.
    /// Returns how many items were accepted.
    fn absorb(
        &mut self,
        batch: Vec<Item>,
        params: &CollectionParams,
        cutoff: Option<DateTime<Utc>>,
    ) -> usize {
        let mut accepted = 0;
        for item in batch {
            if self.at_capacity(params) {
                self.stop(StopReason::MaxItemsReached);
                break;
            }
            if self.seen.contains(&item.id) || !item.passes_filters(params) {
                continue;
            }
            if cutoff.is_some_and(|c| item.is_older_than(c)) {
                self.stop(StopReason::DateLimitReached);
                break;
            }
            self.seen.insert(item.id.clone());
            self.items.push(item);
            accepted += 1;
        }
        if self.at_capacity(params) {
            self.stop(StopReason::MaxItemsReached);
        }
        accepted
    }
}

/// Drives a single [`ItemSource`] through one collection session.
#[derive(Debug, Clone, Default)]
pub struct CollectionController {
    config: ControllerConfig,
}

impl CollectionController {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Collect from `source` starting at `locator` until a stop condition fires.
    ///
    /// `started_at` anchors the age window. `progress` receives one
    /// human-readable line per notable step. Never returns an error: fatal
    /// problems end the session with [`StopReason::Error`].
    #[instrument(skip_all, fields(locator = %locator))]
    pub async fn run(
        &self,
        source: &mut dyn ItemSource,
        params: &CollectionParams,
        locator: &str,
        started_at: DateTime<Utc>,
        progress: &mut (dyn FnMut(String) + Send),
    ) -> CollectionResult {
        let clock = Instant::now();
        let cutoff = params.cutoff(started_at);
        let mut session = Session::new();

        progress(format!("opening {locator}"));
        let opened = self.call("open", source.open(locator)).await;
        match opened {
            Ok(start) => self.drive(source, params, cutoff, start, &mut session, progress).await,
            Err(e) => session.fatal(e),
        }

        let stop_reason = session.stop.unwrap_or(StopReason::Completed);
        progress(format!(
            "stopped: {stop_reason} after {} iterations with {} items",
            session.iterations,
            session.items.len()
        ));
        info!(
            %stop_reason,
            items = session.items.len(),
            iterations = session.iterations,
            soft_errors = session.errors.len(),
            "collection session finished"
        );

        let elapsed = chrono::Duration::from_std(clock.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        CollectionResult {
            items: session.items,
            stop_reason,
            errors: session.errors,
            fatal_error: session.fatal,
            iterations: session.iterations,
            started_at,
            finished_at: started_at + elapsed,
        }
    }

    async fn drive(
        &self,
        source: &mut dyn ItemSource,
        params: &CollectionParams,
        cutoff: Option<DateTime<Utc>>,
        mut position: Position,
        session: &mut Session,
        progress: &mut (dyn FnMut(String) + Send),
    ) {
        let mut last_iteration: Option<Instant> = None;

        loop {
            if self.block_check_due(session.iterations) {
                match self.call("has_block_signal", source.has_block_signal()).await {
                    Ok(true) => {
                        progress("block signal detected".to_string());
                        session.stop(StopReason::Blocked);
                        return;
                    }
                    Ok(false) => {}
                    Err(e) if e.is_fatal() => return session.fatal(e),
                    Err(e) => session.soft(e),
                }
            }

            self.pace(&mut last_iteration).await;
            session.iterations += 1;

            let batch = match self.call("fetch_visible", source.fetch_visible(position)).await {
                Ok(batch) => batch,
                Err(e) if e.is_fatal() => return session.fatal(e),
                Err(e) => {
                    session.soft(e);
                    Vec::new()
                }
            };
            let seen = batch.len();
            let accepted = session.absorb(batch, params, cutoff);
            debug!(
                iteration = session.iterations,
                seen,
                accepted,
                total = session.items.len(),
                "fetched batch"
            );
            progress(format!(
                "scroll #{}: {accepted} new, {} total",
                session.iterations,
                session.items.len()
            ));

            if session.stop.is_some() {
                return;
            }

            if accepted == 0 {
                session.consecutive_empty += 1;
                if session.consecutive_empty >= self.config.empty_fetch_limit {
                    session.stop(StopReason::NoNewItems);
                    return;
                }
            } else {
                session.consecutive_empty = 0;
            }

            match self.call("advance", source.advance(position)).await {
                Ok(Some(next)) => position = next,
                Ok(None) => {
                    progress("end of feed".to_string());
                    session.stop(StopReason::Completed);
                    return;
                }
                Err(e) if e.is_fatal() => return session.fatal(e),
                Err(e) => session.soft(e),
            }
        }
    }

    fn block_check_due(&self, iterations: u32) -> bool {
        self.config.block_check_every > 0 && iterations % self.config.block_check_every == 0
    }

    /// Sleep out whatever is left of the rate-limit floor since the last iteration.
    async fn pace(&self, last: &mut Option<Instant>) {
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.min_interval {
                tokio::time::sleep(self.config.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn call<T>(
        &self,
        name: &'static str,
        fut: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                call: name,
                ms: u64::try_from(self.config.call_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}
