//! Business services over the data store.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::error;

use crate::auth::PermissionChecker;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{Invoice, NumberGenerator, ProformaInvoice, Product, Quotation, SalesOrder};
use crate::notifications::{notify_or_log, Notification, NotificationSink, TracingNotifier};
use crate::store::{DataStore, InMemoryStore};

pub mod documents;
pub mod workflow;

pub use documents::DocumentService;
pub use workflow::WorkflowService;

/// Collaborators and configuration shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn DataStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub numbers: Arc<NumberGenerator>,
    pub config: Arc<AppConfig>,
    pub(crate) locks: KeyedLocks,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn NotificationSink>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            numbers: Arc::new(NumberGenerator::new()),
            config: Arc::new(config),
            locks: KeyedLocks::default(),
        }
    }

    /// Process-local store with notifications going to the log.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(TracingNotifier),
            config,
        )
    }
}

/// Async mutexes handed out per key, so read-check-write sequences on the
/// same record run one at a time. Entries are dropped once nobody holds them.
#[derive(Clone, Default)]
pub(crate) struct KeyedLocks(Arc<DashMap<String, Arc<Mutex<()>>>>);

impl KeyedLocks {
    pub(crate) async fn run<F, R>(&self, key: String, work: F) -> R
    where
        F: Future<Output = R>,
    {
        let lock = self.0.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        self.0.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Sends the success notification built from `result`, or logs the error and
/// sends a failure titled `failure_title`. The result is returned unchanged.
pub(crate) async fn report<T>(
    notifier: &dyn NotificationSink,
    result: Result<T, ServiceError>,
    success: impl FnOnce(&T) -> Notification + Send,
    failure_title: &str,
) -> Result<T, ServiceError>
where
    T: Send + Sync,
{
    let notification = match &result {
        Ok(value) => success(value),
        Err(err) => {
            error!(error = %err, code = err.code(), "{}", failure_title);
            Notification::failure(failure_title, err)
        }
    };
    notify_or_log(notifier, notification).await;
    result
}

/// Every service, wired from one context.
#[derive(Clone)]
pub struct Services {
    pub invoices: DocumentService<Invoice>,
    pub quotations: DocumentService<Quotation>,
    pub sales_orders: DocumentService<SalesOrder>,
    pub proforma_invoices: DocumentService<ProformaInvoice>,
    pub products: DocumentService<Product>,
    pub workflow: WorkflowService,
    pub permissions: PermissionChecker,
}

impl Services {
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            invoices: DocumentService::new(ctx),
            quotations: DocumentService::new(ctx),
            sales_orders: DocumentService::new(ctx),
            proforma_invoices: DocumentService::new(ctx),
            products: DocumentService::new(ctx),
            workflow: WorkflowService::new(ctx),
            permissions: PermissionChecker::new(ctx.config.permission_table()),
        }
    }
}
