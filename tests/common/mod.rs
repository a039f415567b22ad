#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bizdesk::config::AppConfig;
use bizdesk::errors::ServiceError;
use bizdesk::models::{Invoice, InvoiceStatus, LineItem};
use bizdesk::notifications::RecordingNotifier;
use bizdesk::polling::{PollStatus, StatusFetcher, StatusReport};
use bizdesk::services::{ServiceContext, Services};
use bizdesk::store::InMemoryStore;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::time::Instant;

/// One scripted fetch outcome.
#[derive(Clone, Debug)]
pub enum Step {
    Status(PollStatus),
    Fail(&'static str),
}

/// Status fetcher that replays a script. The last step repeats once the
/// script runs out.
pub struct ScriptedFetcher {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

impl ScriptedFetcher {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self::build(steps, None))
    }

    /// Every fetch takes `delay` before it answers.
    pub fn slow(steps: impl IntoIterator<Item = Step>, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(steps, Some(delay)))
    }

    pub fn always(status: PollStatus) -> Arc<Self> {
        Self::new([Step::Status(status)])
    }

    fn build(steps: impl IntoIterator<Item = Step>, delay: Option<Duration>) -> Self {
        let steps: VecDeque<Step> = steps.into_iter().collect();
        let last = steps
            .back()
            .cloned()
            .unwrap_or(Step::Status(PollStatus::Pending));
        Self {
            steps: Mutex::new(steps),
            last: Mutex::new(last),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most fetches ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Elapsed time since `origin` at which each fetch began.
    pub fn started_at(&self, origin: Instant) -> Vec<Duration> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(origin))
            .collect()
    }

    fn next_step(&self) -> Step {
        match self.steps.lock().unwrap().pop_front() {
            Some(step) => step,
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(&self) -> Result<StatusReport, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(Instant::now());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let step = self.next_step();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match step {
            Step::Status(status) => Ok(status.into()),
            Step::Fail(reason) => Err(ServiceError::DataStore(reason.to_string())),
        }
    }
}

/// Lets spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock and lets woken tasks run.
pub async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

pub fn invoice(
    number: &str,
    customer: &str,
    amount: Decimal,
    status: InvoiceStatus,
    created_day: u32,
) -> Invoice {
    Invoice::new(
        number,
        customer,
        vec![LineItem::new("Services", Decimal::ONE, amount)],
        None,
    )
    .with_status(status)
    .with_created_at(at(created_day))
}

/// Services over a fresh in-memory store with a recording notifier.
pub fn services_with(config: AppConfig) -> (Services, ServiceContext, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = ServiceContext::new(Arc::new(InMemoryStore::new()), notifier.clone(), config);
    (Services::new(&ctx), ctx, notifier)
}

pub fn services() -> (Services, ServiceContext, Arc<RecordingNotifier>) {
    services_with(AppConfig::default())
}
