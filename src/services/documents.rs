use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{report, KeyedLocks, ServiceContext};
use crate::config::ListingConfig;
use crate::errors::ServiceError;
use crate::models::{HasLineItems, LineItem, NumberGenerator};
use crate::notifications::{Notification, NotificationSink};
use crate::queries::list_query::{
    distinct_counterparties, filter_and_sort_documents, filter_documents, paginate, summarize,
    ListQuery, ListSummary, Page,
};
use crate::store::{FilterSpec, Repository, StoredDocument};

/// CRUD and listing for one document collection.
///
/// Every mutation reports its outcome to the notification sink. A sink
/// that fails is logged and never fails the operation.
#[derive(Clone)]
pub struct DocumentService<T> {
    repo: Repository<T>,
    notifier: Arc<dyn NotificationSink>,
    numbers: Arc<NumberGenerator>,
    locks: KeyedLocks,
    prefix: String,
    listing: ListingConfig,
}

impl<T: StoredDocument> DocumentService<T> {
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            repo: Repository::new(ctx.store.clone()),
            notifier: ctx.notifier.clone(),
            numbers: ctx.numbers.clone(),
            locks: ctx.locks.clone(),
            prefix: ctx.config.documents.prefix_for(T::COLLECTION).to_string(),
            listing: ctx.config.listing.clone(),
        }
    }

    /// Next display number for this collection, e.g. `INV-1717171717171`.
    pub fn next_number(&self) -> String {
        self.numbers.next(&self.prefix)
    }

    #[instrument(skip(self, doc), fields(collection = %T::COLLECTION, number = %doc.number()))]
    pub async fn create(&self, doc: T) -> Result<T, ServiceError> {
        let label = T::COLLECTION.label();
        let result: Result<T, ServiceError> = async {
            doc.validate_record()?;
            let key = format!("{}/number/{}", T::COLLECTION, doc.number());
            self.locks
                .run(key, async {
                    let taken = FilterSpec::all().eq(T::NUMBER_FIELD, doc.number());
                    if !self.repo.find(&taken).await?.is_empty() {
                        warn!("Number already in use");
                        return Err(ServiceError::InvalidOperation(format!(
                            "{} {} already exists",
                            label,
                            doc.number()
                        )));
                    }
                    self.repo.insert(&doc).await
                })
                .await
        }
        .await;
        if let Ok(created) = &result {
            info!(id = %created.id(), "Document created");
        }
        report(
            self.notifier.as_ref(),
            result,
            |created| Notification::success(format!("{} created", label), created.number()),
            &format!("{} not created", label),
        )
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<T, ServiceError> {
        self.repo.get(id).await
    }

    /// Fetches the whole collection and filters, searches and sorts it in
    /// memory with the configured sort mode.
    #[instrument(skip(self, query), fields(collection = %T::COLLECTION))]
    pub async fn list(&self, query: &ListQuery<T::Status>) -> Result<Vec<T>, ServiceError> {
        let docs = self.repo.all().await?;
        let query = query.clone().with_sort_mode(self.listing.sort_mode);
        Ok(filter_and_sort_documents(&docs, &query))
    }

    /// One page of [`Self::list`]. `per_page` defaults to the configured
    /// page size and is capped at the configured maximum.
    pub async fn list_page(
        &self,
        query: &ListQuery<T::Status>,
        page: u64,
        per_page: Option<u64>,
    ) -> Result<Page<T>, ServiceError> {
        let docs = self.list(query).await?;
        let per_page = per_page.unwrap_or(u64::from(self.listing.default_page_size));
        Ok(paginate(
            docs,
            page,
            per_page,
            u64::from(self.listing.max_page_size),
        ))
    }

    /// Distinct counterparty names for the counterparty filter.
    pub async fn counterparties(&self) -> Result<Vec<String>, ServiceError> {
        let docs = self.repo.all().await?;
        Ok(distinct_counterparties(&docs))
    }

    pub async fn summary(
        &self,
        query: &ListQuery<T::Status>,
    ) -> Result<ListSummary<T::Status>, ServiceError> {
        let docs = self.repo.all().await?;
        Ok(summarize(&filter_documents(&docs, query)))
    }

    /// Sets any status; no transition rules apply.
    #[instrument(skip(self), fields(collection = %T::COLLECTION))]
    pub async fn set_status(&self, id: Uuid, status: T::Status) -> Result<T, ServiceError> {
        let label = T::COLLECTION.label();
        let result: Result<T, ServiceError> = async {
            let mut doc = self.repo.get(id).await?;
            doc.set_status(status);
            self.repo.save(&doc).await
        }
        .await;
        report(
            self.notifier.as_ref(),
            result,
            |updated| {
                Notification::success(
                    format!("{} updated", label),
                    format!("{} is now {}", updated.number(), updated.status()),
                )
            },
            &format!("{} status not changed", label),
        )
        .await
    }

    #[instrument(skip(self), fields(collection = %T::COLLECTION))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let label = T::COLLECTION.label();
        let result = self.repo.delete(id).await;
        report(
            self.notifier.as_ref(),
            result,
            |_| Notification::success(format!("{} deleted", label), id.to_string()),
            &format!("{} not deleted", label),
        )
        .await
    }
}

impl<T: StoredDocument + HasLineItems> DocumentService<T> {
    /// Replaces the line items and recomputes the amount.
    #[instrument(skip(self, items), fields(collection = %T::COLLECTION, items = items.len()))]
    pub async fn replace_items(&self, id: Uuid, items: Vec<LineItem>) -> Result<T, ServiceError> {
        let label = T::COLLECTION.label();
        let result: Result<T, ServiceError> = async {
            let mut doc = self.repo.get(id).await?;
            doc.set_items(items);
            doc.validate_record()?;
            self.repo.save(&doc).await
        }
        .await;
        report(
            self.notifier.as_ref(),
            result,
            |updated| {
                Notification::success(
                    format!("{} updated", label),
                    format!("{} now totals {}", updated.number(), updated.amount()),
                )
            },
            &format!("{} items not saved", label),
        )
        .await
    }
}
