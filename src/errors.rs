use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Data store error: {0}")]
    DataStore(String),

    #[error("Serialization error: {0}")]
    Serialization(
        #[from]
        #[serde(skip)]
        serde_json::Error,
    ),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Not-found error for a record of the given collection.
    pub fn record_not_found(collection: impl std::fmt::Display, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} record {} not found", collection, id))
    }

    /// Short machine-readable code, used as the notification title suffix
    /// and in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::Forbidden(_) => "forbidden",
            Self::DataStore(_) => "data_store_error",
            Self::Serialization(_) => "serialization_error",
            Self::Config(_) => "config_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// Returns the message suitable for user-facing notifications.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn user_message(&self) -> String {
        match self {
            Self::DataStore(_) => "The data store could not complete the request".to_string(),
            Self::Serialization(_) | Self::Config(_) | Self::Other(_) => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Errors surfaced by a status poller. Cloneable so the last one can live in
/// the published snapshot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PollError {
    #[error("Status fetch failed: {0}")]
    FetchFailed(#[source] Arc<ServiceError>),

    #[error("Status fetch timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<ServiceError> for PollError {
    fn from(err: ServiceError) -> Self {
        PollError::FetchFailed(Arc::new(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DataStore("connection reset by peer".into()).user_message(),
            "The data store could not complete the request"
        );
        assert_eq!(
            ServiceError::Config("missing key".into()).user_message(),
            "Internal error"
        );

        // caller mistakes keep their detail
        assert_eq!(
            ServiceError::NotFound("Invoice not found".into()).user_message(),
            "Not found: Invoice not found"
        );
        assert_eq!(
            ServiceError::InvalidOperation("already converted".into()).user_message(),
            "Invalid operation: already converted"
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::NotFound("x".into()).code(), "not_found");
        assert_eq!(ServiceError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("boom")).code(),
            "internal_error"
        );
    }

    #[test]
    fn record_not_found_names_collection_and_id() {
        let id = Uuid::nil();
        let err = ServiceError::record_not_found("invoices", id);
        assert_eq!(
            err.to_string(),
            format!("Not found: invoices record {} not found", id)
        );
    }

    #[test]
    fn poll_error_wraps_service_error_as_source() {
        use std::error::Error as _;

        let err: PollError = ServiceError::DataStore("timeout".into()).into();
        assert!(err.to_string().starts_with("Status fetch failed"));
        let source = err.source().expect("source expected");
        assert_eq!(source.to_string(), "Data store error: timeout");
    }
}
