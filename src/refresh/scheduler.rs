use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::retry::{BackoffPolicy, RetryState};
use super::snapshot::{headline_order, Article, Section, Snapshot, SnapshotBuilder};
use crate::feed::{FeedFetcher, FetchError, RawItem};
use crate::registry::FeedEntry;
use crate::state::NewsHandle;
use crate::util::{atomic_write, RewriteRules};

/// Source of the current time. Injected so retry deadlines can be tested
/// without real timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Sleep between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Budget for one feed fetch, including the body download
    pub fetch_timeout: Duration,
    /// Items kept per feed section
    pub max_items_per_feed: usize,
    /// Feeds fetched at once within a cycle (1 = one after another)
    pub concurrency: usize,
    pub backoff: BackoffPolicy,
    /// Applied in order to every item description
    pub rewrites: RewriteRules,
    /// Where to also write each published page
    pub export_path: Option<std::path::PathBuf>,
    /// Where to write the per-feed status as JSON after every cycle
    pub status_path: Option<std::path::PathBuf>,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(30),
            max_items_per_feed: 10,
            concurrency: 1,
            backoff: BackoffPolicy::default(),
            rewrites: RewriteRules::default(),
            export_path: None,
            status_path: None,
        }
    }
}

/// Counts from one pass over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub published: bool,
}

/// How long to hold off the first cycle after restoring a page published at
/// `published_at`. `None` when the page is at least one interval old.
pub fn warm_start_delay(
    published_at: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: Duration,
) -> Option<Duration> {
    let age = (now - published_at).to_std().unwrap_or(Duration::ZERO);
    interval.checked_sub(age).filter(|d| !d.is_zero())
}

/// Drives refresh cycles over the feeds registered in a [`NewsHandle`].
pub struct RefreshScheduler<F> {
    handle: NewsHandle,
    fetcher: Arc<F>,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
    builder: SnapshotBuilder,
}

struct FeedOutcome {
    name: String,
    prior: RetryState,
    result: Result<Vec<RawItem>, FetchError>,
}

impl<F: FeedFetcher> RefreshScheduler<F> {
    pub fn new(handle: NewsHandle, fetcher: F, settings: RefreshSettings) -> Self {
        Self::with_clock(handle, fetcher, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        handle: NewsHandle,
        fetcher: F,
        settings: RefreshSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let builder = SnapshotBuilder::new(settings.rewrites.clone());
        Self {
            handle,
            fetcher: Arc::new(fetcher),
            clock,
            settings,
            builder,
        }
    }

    pub fn handle(&self) -> &NewsHandle {
        &self.handle
    }

    /// Runs cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A cycle in progress always completes; shutdown is only observed while
    /// sleeping.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if let Some(snapshot) = self.handle.snapshot().await {
            self.export(&snapshot);
            if let Some(delay) =
                warm_start_delay(snapshot.published_at(), self.clock.now(), self.settings.interval)
            {
                tracing::info!(
                    delay_secs = delay.as_secs(),
                    "Stored snapshot is fresh, delaying first refresh"
                );
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    return;
                }
            }
        }

        loop {
            self.run_cycle().await;
            if !sleep_or_shutdown(self.settings.interval, &mut shutdown).await {
                break;
            }
        }
        tracing::info!("Refresh loop stopped");
    }

    /// One full pass over the registry, ending in at most one publication.
    pub async fn run_cycle(&self) -> CycleReport {
        if let Err(e) = self.handle.reload_registry().await {
            tracing::warn!(error = %e, "Failed to reload registered feeds, using loaded registry");
        }

        // Inputs are copied under a read lock, released before any fetch.
        let (feeds, retries) = self.handle.cycle_inputs().await;
        let now = self.clock.now();
        let mut report = CycleReport::default();

        let mut due: Vec<(FeedEntry, RetryState)> = Vec::with_capacity(feeds.len());
        for entry in feeds {
            let prior = retries.get(&entry.name).cloned().unwrap_or_default();
            if !prior.should_attempt(now) {
                tracing::debug!(
                    feed = %entry.name,
                    attempts = prior.attempts(),
                    until = ?prior.next_eligible_at(),
                    "Feed in backoff, skipping"
                );
                report.skipped += 1;
                continue;
            }
            if prior.attempts() > 0 {
                tracing::info!(feed = %entry.name, url = %entry.url, attempts = prior.attempts(), "Reattempting feed");
            }
            due.push((entry, prior));
        }
        report.attempted = due.len();

        let timeout = self.settings.fetch_timeout;
        // `buffered` keeps name order and fetches each feed at most once.
        let outcomes: Vec<FeedOutcome> = stream::iter(due)
            .map(|(entry, prior)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let result = fetcher.fetch(&entry.url, timeout).await;
                    FeedOutcome {
                        name: entry.name,
                        prior,
                        result,
                    }
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut updates = Vec::with_capacity(outcomes.len());
        let mut sections = Vec::new();
        let mut headlines = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(items) => {
                    report.succeeded += 1;
                    tracing::debug!(feed = %outcome.name, items = items.len(), "Fetched feed");
                    updates.push((outcome.name.clone(), outcome.prior.on_success()));

                    let (section, headline) =
                        collect_items(&outcome.name, items, self.settings.max_items_per_feed);
                    headlines.extend(headline);
                    sections.push(section);
                }
                Err(e) => {
                    report.failed += 1;
                    let next = outcome
                        .prior
                        .on_failure(self.clock.now(), e.to_string(), &self.settings.backoff);
                    tracing::warn!(
                        feed = %outcome.name,
                        error = %e,
                        attempts = next.attempts(),
                        until = ?next.next_eligible_at(),
                        "Feed fetch failed, backing off"
                    );
                    updates.push((outcome.name, next));
                }
            }
        }

        let snapshot = self.builder.build(sections, headlines, self.clock.now());
        if snapshot.is_none() {
            tracing::info!("No feed produced items this cycle, keeping previous snapshot");
        }

        let previous_digest = self
            .handle
            .snapshot()
            .await
            .map(|s| s.digest().to_string());
        let published = self.handle.commit(updates, snapshot).await;

        if let Some(snapshot) = &published {
            report.published = true;
            if previous_digest.as_deref() == Some(snapshot.digest()) {
                tracing::debug!("Published snapshot is unchanged from the previous one");
            }
            self.persist(snapshot).await;
        }
        self.export_status().await;

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            published = report.published,
            "Refresh cycle complete"
        );
        report
    }

    async fn persist(&self, snapshot: &Snapshot) {
        if let Err(e) = self.handle.database().save_snapshot(&snapshot.to_stored()).await {
            tracing::warn!(error = %e, "Failed to persist snapshot");
        }
        self.export(snapshot);
    }

    async fn export_status(&self) {
        let Some(path) = &self.settings.status_path else {
            return;
        };
        let status = self.handle.status().await;
        let written = serde_json::to_vec_pretty(&status)
            .map_err(std::io::Error::from)
            .and_then(|json| atomic_write(path, &json));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "Failed to export feed status");
        }
    }

    fn export(&self, snapshot: &Snapshot) {
        let Some(path) = &self.settings.export_path else {
            return;
        };
        if let Err(e) = atomic_write(path, snapshot.html()) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to export snapshot");
        }
    }
}

/// Splits one feed's items into its section (first `max_items`) and its
/// headline: the most recent dated item, or the first item when none is dated.
fn collect_items(name: &str, items: Vec<RawItem>, max_items: usize) -> (Section, Option<Article>) {
    let articles: Vec<Article> = items
        .into_iter()
        .map(|item| Article::from_raw(item, name))
        .collect();

    // Undated items order last, and `min_by` keeps the first of equals.
    let headline = articles.iter().min_by(|a, b| headline_order(a, b)).cloned();

    let section = Section {
        name: name.to_string(),
        articles: articles.into_iter().take(max_items).collect(),
    };
    (section, headline)
}

/// Returns `false` if shutdown was requested before `duration` elapsed.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = shutdown.changed() => match changed {
            Ok(()) => !*shutdown.borrow(),
            Err(_) => false,
        },
    }
}
