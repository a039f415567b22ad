//! Fixed-interval status polling.
//!
//! A [`StatusPoller`] calls a [`StatusFetcher`] right away and then once per
//! interval for as long as the last observed status is
//! [`PollStatus::Pending`]. Fetch failures are recorded and polling carries
//! on. Only a non-pending status, [`StatusPoller::stop`] or an optional
//! failure cap end it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::{PollError, ServiceError};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(5_000);
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Status of the tracked background job.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PollStatus {
    /// No job has been started.
    #[default]
    None,
    Pending,
    Completed,
    Failed,
}

impl PollStatus {
    pub fn is_pending(self) -> bool {
        self == PollStatus::Pending
    }
}

/// What one fetch observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub status: PollStatus,
    /// When the job last changed, as reported by the backend. The fetch time
    /// is used when absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<PollStatus> for StatusReport {
    fn from(status: PollStatus) -> Self {
        Self {
            status,
            updated_at: None,
        }
    }
}

/// Reads the current status of the tracked job.
#[async_trait]
pub trait StatusFetcher: Send + Sync + 'static {
    async fn fetch_status(&self) -> Result<StatusReport, ServiceError>;
}

#[async_trait]
impl<F, Fut, R> StatusFetcher for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ServiceError>> + Send + 'static,
    R: Into<StatusReport> + Send + 'static,
{
    async fn fetch_status(&self) -> Result<StatusReport, ServiceError> {
        (self)().await.map(Into::into)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Start polling as soon as the poller is built.
    pub auto_start: bool,
    /// Upper bound for one fetch. `None` lets a hanging fetch stall polling.
    pub fetch_timeout: Option<Duration>,
    /// Stop after this many failed fetches in a row. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            auto_start: false,
            fetch_timeout: None,
            max_consecutive_failures: None,
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_fetch_timeout(mut self, limit: Duration) -> Self {
        self.fetch_timeout = Some(limit);
        self
    }

    pub fn with_max_consecutive_failures(mut self, cap: u32) -> Self {
        self.max_consecutive_failures = Some(cap);
        self
    }
}

/// Observable poller state.
#[derive(Clone, Debug, Default)]
pub struct PollSnapshot {
    pub status: PollStatus,
    pub last_updated: Option<DateTime<Utc>>,
    /// Error of the latest fetch; cleared by the next successful one.
    pub last_error: Option<PollError>,
    pub consecutive_failures: u32,
    /// Whether the recurring timer is running.
    pub active: bool,
    /// Completed fetches, successful or not.
    pub fetch_count: u64,
}

struct Timer {
    token: CancellationToken,
    generation: u64,
}

struct Inner {
    fetcher: Arc<dyn StatusFetcher>,
    config: PollerConfig,
    state: watch::Sender<PollSnapshot>,
    timer: Mutex<Option<Timer>>,
    fetch_lock: tokio::sync::Mutex<()>,
    generations: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn snapshot(&self) -> PollSnapshot {
        self.state.borrow().clone()
    }

    /// Cancels the recurring timer. True if one was running.
    fn stop_timer(&self, reason: &str) -> bool {
        let mut timer = lock(&self.timer);
        match timer.take() {
            Some(running) => {
                running.token.cancel();
                self.state.send_modify(|s| s.active = false);
                debug!(generation = running.generation, %reason, "Polling stopped");
                true
            }
            None => false,
        }
    }

    /// One fetch with the fetch lock already held.
    async fn fetch_locked(&self) -> Result<PollSnapshot, PollError> {
        let outcome = match self.config.fetch_timeout {
            Some(limit) => match timeout(limit, self.fetcher.fetch_status()).await {
                Ok(result) => result.map_err(PollError::from),
                Err(_) => Err(PollError::TimedOut(limit)),
            },
            None => self.fetcher.fetch_status().await.map_err(PollError::from),
        };
        self.apply(outcome)
    }

    fn apply(
        &self,
        outcome: Result<StatusReport, PollError>,
    ) -> Result<PollSnapshot, PollError> {
        match outcome {
            Ok(report) => {
                let updated_at = report.updated_at.unwrap_or_else(Utc::now);
                self.state.send_modify(|s| {
                    s.status = report.status;
                    s.last_updated = Some(updated_at);
                    s.last_error = None;
                    s.consecutive_failures = 0;
                    s.fetch_count += 1;
                });
                if !report.status.is_pending() && self.stop_timer("status left pending") {
                    info!(status = %report.status, "Tracked job settled");
                }
                Ok(self.snapshot())
            }
            Err(err) => {
                let mut failures = 0;
                self.state.send_modify(|s| {
                    s.last_error = Some(err.clone());
                    s.consecutive_failures += 1;
                    s.fetch_count += 1;
                    failures = s.consecutive_failures;
                });
                warn!(error = %err, failures, "Status fetch failed");
                if let Some(cap) = self.config.max_consecutive_failures {
                    if failures >= cap && self.stop_timer("failure cap reached") {
                        warn!(cap, "Giving up polling after repeated failures");
                    }
                }
                Err(err)
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.token.cancel();
        }
    }
}

async fn run_timer(inner: Weak<Inner>, token: CancellationToken, generation: u64, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else { break };
        let _guard = inner.fetch_lock.lock().await;
        // stop() may have landed while a refresh held the lock
        if token.is_cancelled() {
            break;
        }
        // Errors are already recorded in the snapshot.
        let _ = inner.fetch_locked().await;
    }
    debug!(generation, "Polling timer exited");
}

/// Polls a job's status on a fixed interval while it is pending.
///
/// Cheap to clone; clones drive the same timer and share one state.
#[derive(Clone)]
pub struct StatusPoller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("config", &self.inner.config)
            .field("state", &self.inner.snapshot())
            .finish()
    }
}

impl StatusPoller {
    pub fn new(fetcher: impl StatusFetcher, config: PollerConfig) -> Self {
        Self::from_arc(Arc::new(fetcher), config)
    }

    pub fn from_arc(fetcher: Arc<dyn StatusFetcher>, config: PollerConfig) -> Self {
        let auto_start = config.auto_start;
        let (state, _) = watch::channel(PollSnapshot::default());
        let poller = Self {
            inner: Arc::new(Inner {
                fetcher,
                config,
                state,
                timer: Mutex::new(None),
                fetch_lock: tokio::sync::Mutex::new(()),
                generations: AtomicU64::new(0),
            }),
        };
        if auto_start {
            poller.start();
        }
        poller
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    /// Starts the recurring timer; the first fetch happens immediately.
    ///
    /// Returns false when polling was already active or no Tokio runtime is
    /// available.
    pub fn start(&self) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No Tokio runtime available; status polling not started");
                return false;
            }
        };

        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            debug!("Polling already active");
            return false;
        }

        let token = CancellationToken::new();
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        *timer = Some(Timer {
            token: token.clone(),
            generation,
        });
        self.inner.state.send_modify(|s| s.active = true);
        drop(timer);

        let period = self.inner.config.interval.max(MIN_INTERVAL);
        debug!(generation, interval_ms = period.as_millis() as u64, "Polling started");
        runtime.spawn(run_timer(
            Arc::downgrade(&self.inner),
            token,
            generation,
            period,
        ));
        true
    }

    /// Cancels future ticks. A fetch already in flight still completes and
    /// its result is applied. Returns false if polling was not active.
    pub fn stop(&self) -> bool {
        self.inner.stop_timer("stopped by caller")
    }

    /// Marks the job as pending and starts polling.
    pub fn begin(&self) -> bool {
        self.inner.state.send_modify(|s| {
            s.status = PollStatus::Pending;
            s.last_error = None;
            s.consecutive_failures = 0;
        });
        self.start()
    }

    /// One immediate fetch outside the cadence. The outcome is also recorded
    /// in the snapshot.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<PollSnapshot, PollError> {
        let _guard = self.inner.fetch_lock.lock().await;
        self.inner.fetch_locked().await
    }

    pub fn is_active(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.inner.snapshot()
    }

    /// Receiver that observes every applied update.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.inner.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_fetcher(
        status: PollStatus,
    ) -> (Arc<AtomicUsize>, impl StatusFetcher) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetcher = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ServiceError>(status)
            }
        };
        (calls, fetcher)
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PollerConfig::default();
        assert_eq!(cfg.interval, Duration::from_secs(5));
        assert!(!cfg.auto_start);
        assert_eq!(cfg.fetch_timeout, None);
        assert_eq!(cfg.max_consecutive_failures, None);
    }

    #[test]
    fn auto_start_without_runtime_stays_idle() {
        let (calls, fetcher) = counting_fetcher(PollStatus::Pending);
        let poller = StatusPoller::new(fetcher, PollerConfig::default().with_auto_start(true));
        assert!(!poller.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_poller_is_idle_with_no_status() {
        let (_, fetcher) = counting_fetcher(PollStatus::Pending);
        let poller = StatusPoller::new(fetcher, PollerConfig::default());
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.status, PollStatus::None);
        assert!(snapshot.last_updated.is_none());
        assert!(!snapshot.active);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_start_polls_immediately() {
        let (calls, fetcher) = counting_fetcher(PollStatus::Pending);
        let poller = StatusPoller::new(fetcher, PollerConfig::default().with_auto_start(true));
        settle().await;
        assert!(poller.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_records_error_without_panicking() {
        let poller = StatusPoller::new(
            || async { Err::<PollStatus, _>(ServiceError::DataStore("offline".into())) },
            PollerConfig::default(),
        );
        let result = poller.refresh().await;
        assert_matches!(result, Err(PollError::FetchFailed(_)));

        let snapshot = poller.snapshot();
        assert_matches!(snapshot.last_error, Some(PollError::FetchFailed(_)));
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(snapshot.status, PollStatus::None);
    }

    #[tokio::test(start_paused = true)]
    async fn begin_marks_pending_and_starts() {
        let (calls, fetcher) = counting_fetcher(PollStatus::Pending);
        let poller = StatusPoller::new(fetcher, PollerConfig::default());
        assert!(poller.begin());
        assert_eq!(poller.snapshot().status, PollStatus::Pending);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(poller.stop());
        assert!(!poller.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_last_handle_ends_the_timer() {
        let (calls, fetcher) = counting_fetcher(PollStatus::Pending);
        let poller = StatusPoller::new(fetcher, PollerConfig::default());
        poller.start();
        settle().await;
        drop(poller);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_string_forms() {
        assert_eq!(PollStatus::Completed.to_string(), "completed");
        assert_eq!("pending".parse::<PollStatus>().unwrap(), PollStatus::Pending);
        assert_eq!(
            serde_json::to_value(PollStatus::None).unwrap(),
            serde_json::json!("none")
        );
    }
}
