//! Data store collaborator.
//!
//! Records travel as JSON objects, the way a hosted table store returns
//! them. [`Repository`] layers typed access on top of any [`DataStore`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::DocumentRecord;

pub mod memory;

pub use memory::InMemoryStore;

/// Tables known to the back office.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Invoices,
    Quotations,
    SalesOrders,
    ProformaInvoices,
    Products,
}

impl Collection {
    /// Singular name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Collection::Invoices => "Invoice",
            Collection::Quotations => "Quotation",
            Collection::SalesOrders => "Sales order",
            Collection::ProformaInvoices => "Proforma invoice",
            Collection::Products => "Product",
        }
    }
}

/// Equality conditions on top-level fields, all of which must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    conditions: Vec<(String, Value)>,
}

impl FilterSpec {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Select/insert/update/delete over JSON records.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, collection: Collection, filter: &FilterSpec)
        -> Result<Vec<Value>, ServiceError>;

    /// Stores a new record. A missing `id` is assigned.
    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, ServiceError>;

    /// Merges the top-level keys of `patch` into the stored record. `id` never changes.
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, ServiceError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), ServiceError>;
}

/// Record type persisted in one collection.
pub trait StoredDocument:
    DocumentRecord + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const COLLECTION: Collection;

    /// Stored field holding the display number, unique within the collection.
    const NUMBER_FIELD: &'static str = "number";

    /// Checks the record before it is written.
    fn validate_record(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

pub(crate) fn as_object(record: Value) -> Result<Map<String, Value>, ServiceError> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(ServiceError::InvalidInput(format!(
            "Records must be JSON objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Typed access to the collection of `T`.
pub struct Repository<T> {
    store: Arc<dyn DataStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: StoredDocument> Repository<T> {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> Collection {
        T::COLLECTION
    }

    fn decode(record: Value) -> Result<T, ServiceError> {
        Ok(serde_json::from_value(record)?)
    }

    pub async fn all(&self) -> Result<Vec<T>, ServiceError> {
        self.find(&FilterSpec::all()).await
    }

    #[instrument(skip(self), fields(collection = %T::COLLECTION))]
    pub async fn find(&self, filter: &FilterSpec) -> Result<Vec<T>, ServiceError> {
        let rows = self.store.select(T::COLLECTION, filter).await?;
        debug!(rows = rows.len(), "Selected records");
        rows.into_iter().map(Self::decode).collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<T, ServiceError> {
        let filter = FilterSpec::all().eq("id", id.to_string());
        self.store
            .select(T::COLLECTION, &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::record_not_found(T::COLLECTION, id))
            .and_then(Self::decode)
    }

    pub async fn insert(&self, doc: &T) -> Result<T, ServiceError> {
        let stored = self
            .store
            .insert(T::COLLECTION, serde_json::to_value(doc)?)
            .await?;
        Self::decode(stored)
    }

    /// Writes every field of `doc` over the stored record with the same id.
    pub async fn save(&self, doc: &T) -> Result<T, ServiceError> {
        let updated = self
            .store
            .update(T::COLLECTION, doc.id(), serde_json::to_value(doc)?)
            .await?;
        Self::decode(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.delete(T::COLLECTION, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, InvoiceStatus, LineItem};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn repo() -> Repository<Invoice> {
        Repository::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn collection_names_are_snake_case() {
        assert_eq!(Collection::SalesOrders.to_string(), "sales_orders");
        assert_eq!(Collection::ProformaInvoices.as_ref(), "proforma_invoices");
    }

    #[test]
    fn filter_spec_requires_every_condition() {
        let record = json!({"status": "paid", "customer_name": "TechCorp"});
        assert!(FilterSpec::all().matches(&record));
        assert!(FilterSpec::all().eq("status", "paid").matches(&record));
        assert!(!FilterSpec::all()
            .eq("status", "paid")
            .eq("customer_name", "CableCorp")
            .matches(&record));
        assert!(!FilterSpec::all().eq("missing", "x").matches(&record));
    }

    #[tokio::test]
    async fn typed_round_trip_through_store() {
        let repo = repo();
        let invoice = Invoice::new(
            "INV-1",
            "TechCorp",
            vec![LineItem::new("Audit", dec!(2), dec!(700))],
            None,
        );
        repo.insert(&invoice).await.unwrap();

        let loaded = repo.get(invoice.id).await.unwrap();
        assert_eq!(loaded, invoice);
        assert_eq!(loaded.amount(), dec!(1400));
    }

    #[tokio::test]
    async fn save_overwrites_fields() {
        let repo = repo();
        let mut invoice = Invoice::new("INV-2", "TechCorp", vec![], None);
        repo.insert(&invoice).await.unwrap();

        invoice.set_status(InvoiceStatus::Sent);
        let saved = repo.save(&invoice).await.unwrap();
        assert_eq!(saved.status, InvoiceStatus::Sent);

        let by_status = repo
            .find(&FilterSpec::all().eq("status", "sent"))
            .await
            .unwrap();
        assert_eq!(by_status.len(), 1);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let repo = repo();
        assert_matches!(
            repo.get(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
