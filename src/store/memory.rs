use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{as_object, Collection, DataStore, FilterSpec};
use crate::errors::ServiceError;

/// Process-local store. Each collection keeps its records in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: DashMap<Collection, Vec<Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.tables.get(&collection).map_or(0, |rows| rows.len())
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &FilterSpec,
    ) -> Result<Vec<Value>, ServiceError> {
        let rows = match self.tables.get(&collection) {
            Some(rows) => rows
                .iter()
                .filter(|row| filter.matches(row))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(rows)
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, ServiceError> {
        let mut object = as_object(record)?;
        let id = match object.get("id").cloned() {
            Some(Value::String(id)) => Uuid::parse_str(&id)
                .map_err(|e| ServiceError::InvalidInput(format!("Invalid record id: {}", e)))?,
            Some(other) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid record id: {}",
                    other
                )))
            }
            None => {
                let id = Uuid::new_v4();
                object.insert("id".to_string(), Value::String(id.to_string()));
                id
            }
        };

        let id_text = id.to_string();
        let mut rows = self.tables.entry(collection).or_default();
        if rows.iter().any(|row| record_id(row) == Some(id_text.as_str())) {
            return Err(ServiceError::InvalidOperation(format!(
                "{} record {} already exists",
                collection, id
            )));
        }

        let record = Value::Object(object);
        rows.push(record.clone());
        debug!(%id, "Inserted record");
        Ok(record)
    }

    #[instrument(skip_all, fields(collection = %collection, %id))]
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, ServiceError> {
        let patch = as_object(patch)?;
        let id_text = id.to_string();

        let mut rows = self
            .tables
            .get_mut(&collection)
            .ok_or_else(|| ServiceError::record_not_found(collection, id))?;
        let row = rows
            .iter_mut()
            .find(|row| record_id(row) == Some(id_text.as_str()))
            .ok_or_else(|| ServiceError::record_not_found(collection, id))?;

        if let Value::Object(stored) = row {
            for (key, value) in patch {
                if key != "id" {
                    stored.insert(key, value);
                }
            }
        }
        debug!("Updated record");
        Ok(row.clone())
    }

    #[instrument(skip_all, fields(collection = %collection, %id))]
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), ServiceError> {
        let id_text = id.to_string();
        let mut rows = self
            .tables
            .get_mut(&collection)
            .ok_or_else(|| ServiceError::record_not_found(collection, id))?;
        let position = rows
            .iter()
            .position(|row| record_id(row) == Some(id_text.as_str()))
            .ok_or_else(|| ServiceError::record_not_found(collection, id))?;
        rows.remove(position);
        debug!("Deleted record");
        Ok(())
    }
}
